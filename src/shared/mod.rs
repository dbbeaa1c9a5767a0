pub mod config;
pub mod error;
pub mod state;
pub mod weight;

pub use config::AppConfig;
pub use error::{ErrorKind, PlanningError, Result};
pub use weight::Weight;
