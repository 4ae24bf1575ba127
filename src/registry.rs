//! # Task Registry
//!
//! Fixed-capacity arena of [`TaskDescriptor`]s addressed by slot. Slots are
//! handed out in creation order, never reused and never freed: the task set
//! is static once the scheduler starts.

use crate::error::KernelError;
use crate::task::TaskDescriptor;

pub struct TaskRegistry<const N: usize> {
    slots: [Option<TaskDescriptor>; N],
    len: usize,
}

impl<const N: usize> TaskRegistry<N> {
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            len: 0,
        }
    }

    /// Store a descriptor in the next free slot and stamp it with its
    /// sequence number (equal to the slot index).
    ///
    /// # Errors
    /// [`KernelError::CapacityExceeded`] once `N` tasks are registered.
    pub fn register(&mut self, mut descriptor: TaskDescriptor) -> Result<usize, KernelError> {
        if self.len >= N {
            return Err(KernelError::CapacityExceeded);
        }
        let slot = self.len;
        descriptor.set_sequence(slot as u32);
        self.slots[slot] = Some(descriptor);
        self.len += 1;
        Ok(slot)
    }

    pub fn lookup(&self, slot: usize) -> Result<&TaskDescriptor, KernelError> {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(KernelError::InvalidSlot(slot))
    }

    pub(crate) fn lookup_mut(&mut self, slot: usize) -> Result<&mut TaskDescriptor, KernelError> {
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(KernelError::InvalidSlot(slot))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= N
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Registered tasks with their slots, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TaskDescriptor)> {
        self.slots[..self.len]
            .iter()
            .enumerate()
            .filter_map(|(slot, task)| task.as_ref().map(|task| (slot, task)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut TaskDescriptor)> {
        self.slots[..self.len]
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, task)| task.as_mut().map(|task| (slot, task)))
    }
}

impl<const N: usize> Default for TaskRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
