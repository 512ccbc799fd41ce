pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod state;
pub mod sync;
pub mod vector;

pub use config::AppConfig;
pub use error::PipelineError;
pub use pipeline::{Answer, SqlPipeline};
pub use state::AppState;
pub use sync::{JobReport, QueryLogSync, SchemaSync};
