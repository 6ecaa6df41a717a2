pub mod config;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod scrapers;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::Config;
pub use pipeline::Pipeline;
pub use scheduler::Scheduler;
