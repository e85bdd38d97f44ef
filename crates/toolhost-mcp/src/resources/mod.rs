//! Built-in resources.

pub mod data_dir;
pub mod registry;
pub mod server_config;

pub use registry::builtin_resources;
