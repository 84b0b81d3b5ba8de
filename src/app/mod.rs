pub mod tracker;

pub use tracker::{CommandOutput, TrackerApp};
