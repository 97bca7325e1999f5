/// Render pass module - main and offscreen passes

pub mod render_pass_registry;

pub use render_pass_registry::{RenderPassKind, RenderPassRegistry};
