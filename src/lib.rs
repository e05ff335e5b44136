pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use config::ConfigurationParameters;
pub use core::{Endpoint, NetilionClient};
pub use domain::ports::ApiObject;
pub use utils::error::{NetilionError, Result};
