//! Static pipe storage

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::slot::Slot;

#[repr(align(4))]
struct Aligned<const SIZE: usize>([u8; SIZE]);

/// Slot and buffer storage for one pipe
///
/// `COUNT` is the number of slots, and `SIZE` is the buffer size in bytes. The
/// buffer is word aligned. Declare a `PipeMemory` as a `static`, then
/// [`take()`](PipeMemory::take) its storage to create a [`Pipe`](crate::Pipe).
///
/// ```
/// use ft90x_usbd_pipe::PipeMemory;
///
/// static CDC_IN: PipeMemory<4, 256> = PipeMemory::new();
///
/// let (slots, buffer) = CDC_IN.take().unwrap();
/// assert_eq!(slots.len(), 4);
/// assert_eq!(buffer.len(), 256);
/// assert!(CDC_IN.take().is_none());
/// ```
pub struct PipeMemory<const COUNT: usize, const SIZE: usize> {
    slots: UnsafeCell<[Slot; COUNT]>,
    buffer: UnsafeCell<Aligned<SIZE>>,
    taken: AtomicBool,
}

impl<const COUNT: usize, const SIZE: usize> PipeMemory<COUNT, SIZE> {
    pub const fn new() -> Self {
        PipeMemory {
            slots: UnsafeCell::new([Slot::new(); COUNT]),
            buffer: UnsafeCell::new(Aligned([0; SIZE])),
            taken: AtomicBool::new(false),
        }
    }

    /// Take the storage
    ///
    /// Returns `None` if the storage was already taken.
    #[allow(clippy::mut_from_ref)]
    pub fn take(&self) -> Option<(&mut [Slot], &mut [u8])> {
        if self.taken.swap(true, Ordering::SeqCst) {
            return None;
        }
        // Safety: the flag guarantees that this is the only reference.
        let (slots, buffer) = unsafe { (&mut *self.slots.get(), &mut *self.buffer.get()) };
        Some((&mut slots[..], &mut buffer.0[..]))
    }
}

impl<const COUNT: usize, const SIZE: usize> Default for PipeMemory<COUNT, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: storage is handed out at most once, behind the atomic flag.
unsafe impl<const COUNT: usize, const SIZE: usize> Sync for PipeMemory<COUNT, SIZE> {}
