/// Frame module - swapchain framebuffers and frames-in-flight synchronization

pub mod frame_sync;
pub mod swap_chain;

pub use frame_sync::{FrameSlot, FrameSync};
pub use swap_chain::SwapChain;
