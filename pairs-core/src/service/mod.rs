pub mod errors;
pub mod pipeline;
pub mod types;

// Re-export main interfaces
pub use errors::PipelineError;
pub use pipeline::PairsPipeline;
pub use types::*;
