pub mod edge;
pub mod error;
pub mod push;
pub mod rent_to_own;
