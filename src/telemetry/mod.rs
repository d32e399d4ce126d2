pub mod aggregate;
mod service;

pub use aggregate::{DataPoint, ReadingQuery};
pub use service::TelemetryService;
