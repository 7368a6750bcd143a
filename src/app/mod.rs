//! the application layer: config, logging and the cli on top of the engines
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod logging;

pub use core::LayeraApp;
