//! layera: a design-token theme engine, live CSS variable overrides, file checks and a chunked upload queue
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod files;
pub mod theme;
pub mod upload;

mod macros;
