pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::SurveyCatalog;
pub use config::AppConfig;
pub use error::{SurveyError, SurveyResult};
