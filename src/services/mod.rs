pub mod cache_storage;
pub mod lifecycle;
pub mod network;
pub mod offline_router;
pub mod push;
pub mod rent_to_own;
pub mod schedule;
