pub mod config;
pub mod enrollment;
pub mod error;
pub mod telemetry;

pub use config::AppConfig;
pub use error::AppError;
