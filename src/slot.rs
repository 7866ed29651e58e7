//! Pipe slots (URBs) and application ownership tokens
//!
//! A [`Slot`] describes one fixed-size chunk of a pipe's linear buffer. Its
//! cursors are byte offsets into that buffer, never pointers. Each slot
//! belongs to exactly one side at a time, tracked by [`Owner`].

use core::marker::PhantomData;

/// Which side may touch a slot's bytes and cursors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum Owner {
    /// Queued for, or being serviced by, the endpoint FIFO
    Hardware,
    /// Being filled, or drained, by the class driver
    Application,
}

/// Ring position of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub struct SlotId(pub(crate) u8);

impl SlotId {
    /// Returns the index of this slot in the ring
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A chunk of a pipe buffer
///
/// Applications only allocate storage for slots, usually with
/// [`PipeMemory`](crate::PipeMemory) or an array of [`Slot::new()`]. The pipe
/// initializes them.
///
/// For an IN pipe, `start..ptr` is data that the application has filled, and
/// `ptr..end` is free space. For an OUT pipe, `start..ptr` is data that the
/// application has already read, and `ptr..end` is host data still to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub struct Slot {
    pub(crate) start: usize,
    pub(crate) ptr: usize,
    pub(crate) end: usize,
    pub(crate) owner: Owner,
    pub(crate) id: u8,
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}

impl Slot {
    /// Storage for a slot that's not yet part of a ring
    pub const fn new() -> Self {
        Slot {
            start: 0,
            ptr: 0,
            end: 0,
            owner: Owner::Application,
            id: 0,
        }
    }

    /// Resets the slot to describe `start..start + len` of the ring buffer
    pub(crate) fn reset(&mut self, id: u8, start: usize, len: usize, owner: Owner) {
        self.id = id;
        self.start = start;
        self.ptr = start;
        self.end = start + len;
        self.owner = owner;
    }

    /// Slot position in the ring, for diagnostics
    pub fn id(&self) -> SlotId {
        SlotId(self.id)
    }

    /// Returns the side that currently owns this slot
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Indicates if the application is free to use the slot
    pub fn is_owned_by_app(&self) -> bool {
        self.owner == Owner::Application
    }

    /// Indicates if the slot is queued for the hardware
    pub fn is_owned_by_hardware(&self) -> bool {
        self.owner == Owner::Hardware
    }

    /// Length still to be processed by the application
    ///
    /// IN: free space to fill. OUT: host data to read.
    pub fn to_process(&self) -> usize {
        self.end - self.ptr
    }

    /// Length already processed by the application
    pub fn consumed(&self) -> usize {
        self.ptr - self.start
    }

    /// An IN slot with no free space left
    pub fn is_full(&self) -> bool {
        self.ptr == self.end
    }

    /// Nothing has been processed since the last transfer
    pub fn is_empty(&self) -> bool {
        self.ptr == self.start
    }

    /// Offset of the application cursor in the ring buffer
    pub fn offset(&self) -> usize {
        self.ptr
    }
}

/// Proof that the application owns the pipe's current slot
///
/// You receive an `AppSlot` from [`Pipe::acquire()`](crate::Pipe::acquire) or
/// [`Pipe::force_acquire()`](crate::Pipe::force_acquire), and you give it back
/// with [`Pipe::submit()`](crate::Pipe::submit). The token is neither `Copy`
/// nor `Clone`, and submitting consumes it.
///
/// A token only stays valid until the pipe's application slot is handed to
/// the hardware. After that, every other token for the slot is stale. The
/// pipe's slot methods ignore stale tokens: writes and reads copy nothing,
/// and a stale submit is rejected.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an acquired slot does nothing until it's submitted"]
pub struct AppSlot<'a> {
    pub(crate) index: u8,
    pub(crate) generation: u32,
    _pipe: PhantomData<&'a ()>,
}

impl AppSlot<'_> {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        AppSlot {
            index: index as u8,
            generation,
            _pipe: PhantomData,
        }
    }

    /// Ring position of the acquired slot
    pub fn id(&self) -> SlotId {
        SlotId(self.index)
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}

#[cfg(test)]
mod tests {
    use super::{Owner, Slot};

    #[test]
    fn cursors() {
        let mut slot = Slot::new();
        slot.reset(3, 128, 64, Owner::Application);
        assert_eq!(slot.id().index(), 3);
        assert_eq!(slot.to_process(), 64);
        assert_eq!(slot.consumed(), 0);
        assert!(slot.is_empty());
        assert!(!slot.is_full());

        slot.ptr += 64;
        assert!(slot.is_full());
        assert_eq!(slot.consumed(), 64);
        assert_eq!(slot.to_process(), 0);
        assert_eq!(slot.offset(), 192);
    }

    #[test]
    fn ownership_is_exclusive() {
        let mut slot = Slot::new();
        slot.reset(0, 0, 8, Owner::Hardware);
        assert!(slot.is_owned_by_hardware() ^ slot.is_owned_by_app());
        slot.owner = Owner::Application;
        assert!(slot.is_owned_by_hardware() ^ slot.is_owned_by_app());
    }
}
