pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{ApiClient, LocalStorage};
pub use app::{CommandOutput, TrackerApp};
pub use config::TomlConfig;
pub use core::accumulator::describe;
pub use core::coordinator::EnrollmentCoordinator;
pub use core::session::{SessionContext, SessionResolver};
pub use utils::error::{Result, TrackerError};
