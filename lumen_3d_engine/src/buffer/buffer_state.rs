/// Buffer lifecycle state shared by every buffer kind

use crate::error::Result;
use crate::graphics_device::GraphicsDevice;

/// Lifecycle state of a buffer
///
/// `None -> Initialized -> Disposed`, each transition exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Constructed, no GPU memory yet
    None,
    /// GPU memory allocated and usable
    Initialized,
    /// GPU memory released. Terminal.
    Disposed,
}

impl BufferState {
    /// Fail unless the buffer is usable
    pub(crate) fn require_initialized(self, kind: &str, operation: &str) -> Result<()> {
        if self != BufferState::Initialized {
            engine_bail_violation!(
                "lumen3d::Buffer",
                "{}: {} requires an Initialized buffer (state is {:?})",
                kind, operation, self
            );
        }
        Ok(())
    }

    /// Fail unless the buffer has never been created
    pub(crate) fn require_none(self, kind: &str) -> Result<()> {
        if self != BufferState::None {
            engine_bail_violation!(
                "lumen3d::Buffer",
                "{}: create called twice (state is {:?})",
                kind, self
            );
        }
        Ok(())
    }

    /// Decide whether a dispose call has work to do
    ///
    /// Returns `Ok(false)` for an already disposed buffer (idempotent),
    /// `Ok(true)` for an initialized one, and a violation for one never created.
    pub(crate) fn begin_dispose(self, kind: &str) -> Result<bool> {
        match self {
            BufferState::Initialized => Ok(true),
            BufferState::Disposed => Ok(false),
            BufferState::None => Err(engine_violation!(
                "lumen3d::Buffer",
                "{}: dispose called before create",
                kind
            )),
        }
    }
}

/// A registry-owned GPU resource with a lifecycle state
pub trait GpuResource {
    /// Resource kind used in diagnostics ("vertex buffer", "render target", ...)
    const KIND: &'static str;

    /// Current lifecycle state
    fn state(&self) -> BufferState;

    /// Release GPU memory. A no-op on an already disposed resource.
    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()>;
}
