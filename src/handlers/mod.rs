pub mod spin;

pub use spin::spin_config;
