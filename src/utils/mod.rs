pub mod store_key;

pub use store_key::*;
