/// Frames-in-flight synchronization
///
/// Each of the N frame slots owns an image-available semaphore, a
/// render-finished semaphore, an in-flight fence (created signaled so the
/// first wait returns at once) and the main command buffer of the frame.
///
/// The swapchain may hand out images in any order, so `images_in_flight`
/// remembers which slot's fence last rendered into each image. A frame that
/// acquires an image still owned by another slot waits on that fence first.
///
/// Also tracks GPU buffers retired while frames may still read them: a
/// buffer retired during frame `F` is destroyed at the top of frame `F + N`,
/// after that frame's fence wait proved frame `F` complete.

use crate::error::Result;
use crate::graphics_device::{CommandBufferId, FenceId, GpuBufferId, GraphicsDevice, SemaphoreId};

/// Synchronization objects of one frame in flight
#[derive(Debug, Clone, Copy)]
pub struct FrameSlot {
    pub image_available: SemaphoreId,
    pub render_finished: SemaphoreId,
    pub in_flight: FenceId,
    pub command_buffer: CommandBufferId,
}

#[derive(Debug)]
struct RetiredBuffer {
    buffer: GpuBufferId,
    destroy_at: u64,
}

pub struct FrameSync {
    slots: Vec<FrameSlot>,
    images_in_flight: Vec<Option<FenceId>>,
    cursor: usize,
    frame_number: u64,
    retired: Vec<RetiredBuffer>,
}

impl FrameSync {
    /// Create `frames_in_flight` slots and an owner table for `image_count` images
    pub fn new(device: &mut dyn GraphicsDevice, frames_in_flight: u32, image_count: u32) -> Result<Self> {
        if frames_in_flight == 0 {
            engine_bail_violation!("lumen3d::FrameSync", "At least one frame in flight is required");
        }
        let mut sync = Self {
            slots: Vec::with_capacity(frames_in_flight as usize),
            images_in_flight: vec![None; image_count as usize],
            cursor: 0,
            frame_number: 0,
            retired: Vec::new(),
        };
        for _ in 0..frames_in_flight {
            match Self::create_slot(device) {
                Ok(slot) => sync.slots.push(slot),
                Err(e) => {
                    sync.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(sync)
    }

    fn create_slot(device: &mut dyn GraphicsDevice) -> Result<FrameSlot> {
        Ok(FrameSlot {
            image_available: device.create_semaphore()?,
            render_finished: device.create_semaphore()?,
            in_flight: device.create_fence(true)?,
            command_buffer: device.allocate_command_buffer()?,
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Index of the current frame slot
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Frames advanced since creation
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn current(&self) -> FrameSlot {
        self.slots[self.cursor]
    }

    pub fn slot(&self, index: usize) -> Option<FrameSlot> {
        self.slots.get(index).copied()
    }

    // ===== IMAGE OWNERS =====

    /// Fence of the frame that last rendered into `image_index`
    pub fn image_owner(&self, image_index: u32) -> Option<FenceId> {
        self.images_in_flight.get(image_index as usize).copied().flatten()
    }

    pub fn set_image_owner(&mut self, image_index: u32, fence: FenceId) {
        let index = image_index as usize;
        if index >= self.images_in_flight.len() {
            self.images_in_flight.resize(index + 1, None);
        }
        self.images_in_flight[index] = Some(fence);
    }

    /// Forget every owner (after a swapchain recreation, with the device idle)
    pub fn reset_image_owners(&mut self, image_count: u32) {
        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count as usize, None);
    }

    // ===== FRAME PROGRESSION =====

    /// `cursor = (cursor + 1) mod N`
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.frame_number += 1;
    }

    // ===== RETIREMENT =====

    /// Hand over a GPU buffer that frames in flight may still read
    pub fn retire_buffer(&mut self, buffer: GpuBufferId) {
        let destroy_at = self.frame_number + self.slots.len() as u64;
        engine_trace!(
            "lumen3d::FrameSync",
            "Buffer retired at frame {}, destroyed at frame {}",
            self.frame_number, destroy_at
        );
        self.retired.push(RetiredBuffer { buffer, destroy_at });
    }

    /// Destroy retired buffers no frame can reference anymore
    ///
    /// Call after the current slot's fence wait.
    pub fn collect_retired(&mut self, device: &mut dyn GraphicsDevice) {
        let frame_number = self.frame_number;
        self.retired.retain(|retired| {
            if retired.destroy_at <= frame_number {
                device.destroy_buffer(retired.buffer);
                false
            } else {
                true
            }
        });
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Release everything. The device must be idle.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for retired in self.retired.drain(..) {
            device.destroy_buffer(retired.buffer);
        }
        for slot in self.slots.drain(..) {
            device.free_command_buffer(slot.command_buffer);
            device.destroy_fence(slot.in_flight);
            device.destroy_semaphore(slot.render_finished);
            device.destroy_semaphore(slot.image_available);
        }
        self.images_in_flight.clear();
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
