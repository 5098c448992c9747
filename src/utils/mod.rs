pub mod config_loader;
pub mod error;
pub mod telemetry;

pub use config_loader::*;
pub use error::MonitorError;
pub use telemetry::init_telemetry;
