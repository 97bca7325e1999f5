/// Staging uploads into device-local memory
///
/// Four steps: host-visible staging buffer, copy of the caller data,
/// device-local destination, one-shot copy that blocks until the transfer
/// finished. The staging buffer is released on every path. Only used at
/// load time, never in the per-frame path.

use crate::error::Result;
use crate::graphics_device::{
    BufferDesc, BufferUsage, GpuBufferId, GpuImageId, GraphicsDevice, ImageDesc, MemoryLocation,
};

/// Upload `data` into a new device-local buffer with `usage`
pub(crate) fn upload_buffer(
    device: &mut dyn GraphicsDevice,
    data: &[u8],
    usage: BufferUsage,
) -> Result<GpuBufferId> {
    let size = data.len() as u64;
    let staging = create_filled_staging(device, data)?;

    let result = device
        .create_buffer(&BufferDesc {
            size,
            usage: usage | BufferUsage::TRANSFER_DST,
            location: MemoryLocation::DeviceLocal,
        })
        .and_then(|destination| {
            match device.copy_buffer_immediate(staging, destination, size) {
                Ok(()) => Ok(destination),
                Err(e) => {
                    device.destroy_buffer(destination);
                    Err(e)
                }
            }
        });

    device.destroy_buffer(staging);
    result
}

/// Upload tightly packed texels covering every layer of `desc` into a new image
pub(crate) fn upload_image(
    device: &mut dyn GraphicsDevice,
    data: &[u8],
    desc: &ImageDesc,
) -> Result<GpuImageId> {
    let staging = create_filled_staging(device, data)?;

    let result = device.create_image(desc).and_then(|image| {
        match device.copy_buffer_to_image_immediate(staging, image) {
            Ok(()) => Ok(image),
            Err(e) => {
                device.destroy_image(image);
                Err(e)
            }
        }
    });

    device.destroy_buffer(staging);
    result
}

fn create_filled_staging(device: &mut dyn GraphicsDevice, data: &[u8]) -> Result<GpuBufferId> {
    let staging = device.create_buffer(&BufferDesc::staging(data.len() as u64))?;
    if let Err(e) = device.write_buffer(staging, 0, data) {
        device.destroy_buffer(staging);
        return Err(e);
    }
    Ok(staging)
}
