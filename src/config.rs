mod loader;
mod paths;
mod types;

pub use types::{ClientConfig, Config};
