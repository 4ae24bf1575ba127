//! # Task Stacks
//!
//! All task stacks, plus the idle context's, are carved out of one static
//! pool by a bump allocator. Nothing is ever freed: the task set is fixed
//! at startup, so the only failure mode is running out of pool at creation
//! time, which surfaces as [`KernelError::OutOfMemory`].
//!
//! ## Initial Frame
//!
//! A new task is entered through the same exception return path as a
//! preempted one, so its stack is pre-loaded with a fake context
//! (top = high address, growing down):
//!
//! ```text
//! [Hardware stacked frame]
//!   xPSR  (Thumb bit set)
//!   PC    (task entry point)
//!   LR    (exit trap)
//!   R12, R3, R2, R1 (0)
//!   R0    (task parameter)
//! [Software saved context]
//!   R11 .. R4 (0)           <- initial stack pointer
//! ```

use crate::error::KernelError;

/// Words in one full saved context: 8 software-saved + 8 hardware-stacked.
pub const FRAME_WORDS: usize = 16;

/// xPSR with only the Thumb bit set.
const INITIAL_XPSR: u32 = 0x0100_0000;

/// A contiguous range of words in the pool, identified by offset so the
/// descriptor never holds a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    offset: usize,
    words: usize,
}

impl StackRegion {
    #[inline]
    pub fn words(&self) -> usize {
        self.words
    }

    #[inline]
    pub fn bytes(&self) -> usize {
        self.words * 4
    }
}

/// Bump allocator over a `WORDS`-word array.
#[repr(C, align(8))]
pub struct StackPool<const WORDS: usize> {
    memory: [u32; WORDS],
    next: usize,
}

impl<const WORDS: usize> StackPool<WORDS> {
    pub const fn new() -> Self {
        Self {
            memory: [0; WORDS],
            next: 0,
        }
    }

    /// Reserve `bytes` of stack, rounded up to keep 8-byte alignment.
    ///
    /// # Errors
    /// [`KernelError::OutOfMemory`] if the request is too small to hold an
    /// initial frame or the pool cannot satisfy it.
    pub fn allocate(&mut self, bytes: usize) -> Result<StackRegion, KernelError> {
        let words = bytes.div_ceil(8) * 2;
        if words < FRAME_WORDS {
            return Err(KernelError::OutOfMemory);
        }
        let end = self
            .next
            .checked_add(words)
            .filter(|&end| end <= WORDS)
            .ok_or(KernelError::OutOfMemory)?;
        let region = StackRegion {
            offset: self.next,
            words,
        };
        self.next = end;
        Ok(region)
    }

    /// Forget every allocation. Only valid before any task has run.
    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        (WORDS - self.next) * 4
    }

    pub fn region_mut(&mut self, region: StackRegion) -> &mut [u32] {
        &mut self.memory[region.offset..region.offset + region.words]
    }

    /// Address of the word at `index` within `region`. Used by the context
    /// switch to turn a frame offset into a stack pointer.
    pub fn address_of(&self, region: StackRegion, index: usize) -> usize {
        self.memory[region.offset..].as_ptr() as usize + index * 4
    }

    /// Write the initial context for a task into `region` and return the
    /// word index its stack pointer must start at.
    pub fn prepare_frame(&mut self, region: StackRegion, entry: u32, exit: u32, parameter: u32) -> usize {
        let stack = self.region_mut(region);
        let sp = stack.len() - FRAME_WORDS;
        let frame = &mut stack[sp..];
        frame.fill(0);
        // frame[0..8]: R4-R11
        frame[8] = parameter; // R0
        frame[13] = exit; // LR
        frame[14] = entry; // PC
        frame[15] = INITIAL_XPSR;
        sp
    }
}

impl<const WORDS: usize> Default for StackPool<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_rounds_to_double_words() {
        let mut pool = StackPool::<256>::new();
        let region = pool.allocate(100).unwrap();
        assert_eq!(region.bytes(), 104);
        assert_eq!(pool.remaining(), 1024 - 104);
    }

    #[test]
    fn test_out_of_memory() {
        let mut pool = StackPool::<72>::new();
        pool.allocate(200).unwrap();
        assert_eq!(pool.allocate(96), Err(KernelError::OutOfMemory));
        // A failed request leaves the pool untouched.
        assert_eq!(pool.remaining(), 88);
        assert!(pool.allocate(88).is_ok());
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn test_stack_must_hold_a_frame() {
        let mut pool = StackPool::<64>::new();
        assert_eq!(pool.allocate(32), Err(KernelError::OutOfMemory));
        assert!(pool.allocate(FRAME_WORDS * 4).is_ok());
    }

    #[test]
    fn test_initial_frame_layout() {
        let mut pool = StackPool::<64>::new();
        let region = pool.allocate(128).unwrap();
        let sp = pool.prepare_frame(region, 0x0800_1001, 0x0800_2001, 42);
        assert_eq!(sp, 32 - FRAME_WORDS);

        let stack = pool.region_mut(region);
        assert_eq!(&stack[sp..sp + 8], &[0; 8]);
        assert_eq!(stack[sp + 8], 42);
        assert_eq!(stack[sp + 13], 0x0800_2001);
        assert_eq!(stack[sp + 14], 0x0800_1001);
        assert_eq!(stack[sp + 15], INITIAL_XPSR);
    }
}
