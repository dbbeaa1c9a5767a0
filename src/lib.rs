//! planserver: planning and monitoring-&-evaluation engine.
//!
//! A national-scale planning platform core: organizations arranged in a
//! ministry hierarchy author weighted plans (objectives, initiatives,
//! performance measures, main activities, costed sub-activities), push them
//! through an approval workflow, then file periodic reports of achievement
//! and budget utilization against the approved targets.
//!
//! The crate is the engine only; HTTP transport, persistence and
//! authentication live in the surrounding platform.

pub mod analytics;
pub mod directory;
pub mod planning;
pub mod reporting;
pub mod shared;

pub use shared::config::AppConfig;
pub use shared::error::{ErrorKind, PlanningError, Result};
pub use shared::state::AppState;
