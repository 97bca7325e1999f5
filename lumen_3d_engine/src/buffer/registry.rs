/// Append-only registries of GPU resources addressed by typed handles
///
/// Entries are never removed: disposing one leaves a Disposed entry behind,
/// so an index handed out once stays resolvable and is never reused.
///
/// # Example
///
/// ```ignore
/// let mut registry = Registry::new();
/// let a = registry.insert(vertex_buffer);   // index 0
/// registry.dispose(a, device)?;             // entry 0 now Disposed
/// let b = registry.insert(other_buffer);    // index 1, never 0 again
/// ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::buffer::buffer_state::{BufferState, GpuResource};
use crate::error::Result;
use crate::graphics_device::GraphicsDevice;

/// Stable index of an entry in a `Registry<T>`
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Raw registry index
    pub fn index(self) -> u32 {
        self.index
    }
}

// Manual impls: derives would require `T: Copy`/`T: Eq`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Append-only owner of every resource of one kind
pub struct Registry<T: GpuResource> {
    entries: Vec<T>,
}

impl<T: GpuResource> Registry<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Take ownership of `resource` and return its permanent handle
    pub fn insert(&mut self, resource: T) -> Handle<T> {
        let index = self.entries.len() as u32;
        self.entries.push(resource);
        Handle::new(index)
    }

    /// Resolve a handle
    ///
    /// # Errors
    ///
    /// `ContractViolation` for an index this registry never handed out.
    pub fn get(&self, handle: Handle<T>) -> Result<&T> {
        match self.entries.get(handle.index as usize) {
            Some(entry) => Ok(entry),
            None => Err(self.out_of_range(handle)),
        }
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut T> {
        if handle.index as usize >= self.entries.len() {
            return Err(self.out_of_range(handle));
        }
        Ok(&mut self.entries[handle.index as usize])
    }

    /// Entries with their handles, in creation order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (Handle::new(index as u32), entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.entries
            .iter_mut()
            .enumerate()
            .map(|(index, entry)| (Handle::new(index as u32), entry))
    }

    /// Entries ever inserted (disposed ones included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dispose one entry. The handle stays resolvable.
    pub fn dispose(&mut self, handle: Handle<T>, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.get_mut(handle)?.dispose(device)
    }

    /// Dispose every entry not already Disposed
    ///
    /// Entries still in the `None` state own no GPU memory and are skipped.
    pub fn dispose_all(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        for entry in &mut self.entries {
            if entry.state() == BufferState::Initialized {
                entry.dispose(device)?;
            }
        }
        Ok(())
    }

    fn out_of_range(&self, handle: Handle<T>) -> crate::error::Error {
        engine_violation!(
            "lumen3d::Registry",
            "{} handle {} out of range (registry holds {})",
            T::KIND, handle.index, self.entries.len()
        )
    }
}

impl<T: GpuResource> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
