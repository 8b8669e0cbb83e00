pub mod prize;
pub mod spin;

pub use prize::*;
pub use spin::*;
