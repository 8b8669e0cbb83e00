pub mod selector;
pub mod spin_service;

pub use selector::*;
pub use spin_service::*;
