pub mod firebase;
pub mod memory_store;
pub mod store;

pub use firebase::*;
pub use memory_store::*;
pub use store::{DocumentStore, SharedStore, build_store};
