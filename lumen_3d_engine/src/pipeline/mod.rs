/// Pipeline module - pipeline builder, registry and built-in draw modes

pub mod pipeline;
pub mod pipeline_mode;
pub mod pipeline_registry;

pub use pipeline::{Pipeline, ShaderSources};
pub use pipeline_mode::{PipelineMode, ShaderLibrary, TEXT_PUSH_CONSTANT_SIZE, TRANSFORM_PUSH_CONSTANT_SIZE};
pub use pipeline_registry::PipelineRegistry;
