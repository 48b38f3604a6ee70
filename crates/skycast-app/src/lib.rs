//! Location resolution and refresh orchestration for skycast.
//!
//! Two independent state machines joined by an explicit channel: the
//! [`LocationResolver`] arbitrates fallible location sources into one
//! authoritative place, and the [`RefreshOrchestrator`] keeps the weather
//! snapshot for that place fresh with visibility-aware, single-flight
//! polling.

pub mod error;
pub mod geo;
pub mod heuristics;
pub mod orchestrator;
pub mod resolver;

pub use error::AppError;
pub use geo::{GeoSource, LocationError, SystemLocation};
pub use orchestrator::{RefreshOrchestrator, RefreshState};
pub use resolver::{LocationResolver, ResolverState, SearchStatus};
