/// Descriptor module - pools, layouts and append-only descriptor sets

pub mod descriptor_allocator;

pub use descriptor_allocator::{DescriptorAllocator, DescriptorKind};
