//! A fixed ring of slots over one linear buffer
//!
//! Slots are stored in an arena and addressed by index. The slot following
//! index `i` is `(i + 1) % count`. Every slot covers `max_packet_len` bytes of
//! the linear buffer, in ring order, so consecutive slots are adjacent in
//! memory until the ring wraps back to offset zero.

use core::ops::Range;

use crate::slot::{Owner, Slot};

pub(crate) struct Ring<'a> {
    slots: &'a mut [Slot],
    buffer: &'a mut [u8],
    max_packet_len: usize,
}

impl<'a> Ring<'a> {
    /// Carve `slots.len()` chunks of `max_packet_len` out of `buffer`
    ///
    /// OUT slots start owned by the hardware, with no data. IN slots start
    /// owned by the application, with a full packet of free space.
    ///
    /// Caller guarantees that `buffer` is exactly `slots.len() * max_packet_len`
    /// bytes, and that there are no more than 256 slots.
    pub(crate) fn new(
        slots: &'a mut [Slot],
        buffer: &'a mut [u8],
        max_packet_len: usize,
        out_direction: bool,
    ) -> Self {
        debug_assert_eq!(buffer.len(), slots.len() * max_packet_len);
        for (idx, slot) in slots.iter_mut().enumerate() {
            let start = idx * max_packet_len;
            if out_direction {
                slot.reset(idx as u8, start, 0, Owner::Hardware);
            } else {
                slot.reset(idx as u8, start, max_packet_len, Owner::Application);
            }
        }
        Ring {
            slots,
            buffer,
            max_packet_len,
        }
    }

    /// Number of slots in the ring
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn max_packet_len(&self) -> usize {
        self.max_packet_len
    }

    /// Size of the linear buffer
    pub(crate) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn next(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    pub(crate) fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut Slot {
        &mut self.slots[index]
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        self.slots
    }

    /// Returns the slot, and the bytes covered by `range` within the buffer
    pub(crate) fn slot_and_bytes_mut(
        &mut self,
        index: usize,
        range: Range<usize>,
    ) -> (&mut Slot, &mut [u8]) {
        (&mut self.slots[index], &mut self.buffer[range])
    }

    pub(crate) fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.buffer[range]
    }

    /// Split `len` bytes starting at `offset` into the linear piece, and the
    /// piece that wrapped around to the start of the buffer
    ///
    /// # Panics
    ///
    /// Panics if `offset` is beyond the buffer, or if `len` exceeds the buffer.
    fn split(&self, offset: usize, len: usize) -> (Range<usize>, Range<usize>) {
        let capacity = self.capacity();
        assert!(
            offset <= capacity && len <= capacity,
            "{} bytes at offset {} exceed a {} byte ring",
            len,
            offset,
            capacity
        );
        let linear = (capacity - offset).min(len);
        (offset..offset + linear, 0..len - linear)
    }

    /// Copy `src` into the ring at `offset`, wrapping at the end of the buffer
    pub(crate) fn buf_write(&mut self, offset: usize, src: &[u8]) {
        let (head, tail) = self.split(offset, src.len());
        let (src_head, src_tail) = src.split_at(head.len());
        self.buffer[head].copy_from_slice(src_head);
        self.buffer[tail].copy_from_slice(src_tail);
    }

    /// Copy from the ring at `offset` into `dst`, wrapping at the end of the buffer
    pub(crate) fn buf_read(&self, offset: usize, dst: &mut [u8]) {
        let (head, tail) = self.split(offset, dst.len());
        let (dst_head, dst_tail) = dst.split_at_mut(head.len());
        dst_head.copy_from_slice(&self.buffer[head]);
        dst_tail.copy_from_slice(&self.buffer[tail]);
    }

    /// Let `source` fill `len` bytes of the ring at `offset`, one linear
    /// piece at a time
    pub(crate) fn stream_write(
        &mut self,
        offset: usize,
        len: usize,
        mut source: impl FnMut(&mut [u8]),
    ) {
        let (head, tail) = self.split(offset, len);
        source(&mut self.buffer[head]);
        if !tail.is_empty() {
            source(&mut self.buffer[tail]);
        }
    }

    /// Hand `len` bytes of the ring at `offset` to `sink`, one linear piece
    /// at a time
    pub(crate) fn stream_read(&self, offset: usize, len: usize, mut sink: impl FnMut(&[u8])) {
        let (head, tail) = self.split(offset, len);
        sink(&self.buffer[head]);
        if !tail.is_empty() {
            sink(&self.buffer[tail]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Ring;
    use crate::slot::{Owner, Slot};

    #[test]
    fn initial_ownership() {
        let mut slots = [Slot::new(); 3];
        let mut buffer = [0; 24];
        let ring = Ring::new(&mut slots, &mut buffer, 8, true);
        for (idx, slot) in ring.slots().iter().enumerate() {
            assert_eq!(slot.owner(), Owner::Hardware);
            assert_eq!(slot.to_process(), 0);
            assert_eq!(slot.offset(), idx * 8);
        }

        let mut slots = [Slot::new(); 3];
        let mut buffer = [0; 24];
        let ring = Ring::new(&mut slots, &mut buffer, 8, false);
        for slot in ring.slots() {
            assert_eq!(slot.owner(), Owner::Application);
            assert_eq!(slot.to_process(), 8);
        }
    }

    #[test]
    fn next_wraps() {
        let mut slots = [Slot::new(); 4];
        let mut buffer = [0; 16];
        let ring = Ring::new(&mut slots, &mut buffer, 4, false);
        assert_eq!(ring.next(0), 1);
        assert_eq!(ring.next(3), 0);
    }

    #[test]
    fn buf_write_wraps() {
        let mut slots = [Slot::new(); 2];
        let mut buffer = [0; 8];
        let mut ring = Ring::new(&mut slots, &mut buffer, 4, false);
        ring.buf_write(6, &[1, 2, 3, 4]);
        assert_eq!(ring.bytes(0..8), &[3, 4, 0, 0, 0, 0, 1, 2]);

        let mut out = [0; 4];
        ring.buf_read(6, &mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn wraparound_matches_linear() {
        let payload: [u8; 20] = core::array::from_fn(|i| i as u8 + 1);

        let mut slots = [Slot::new(); 4];
        let mut buffer = [0; 64];
        let mut ring = Ring::new(&mut slots, &mut buffer, 16, false);
        let mut src = payload.iter().copied();
        ring.stream_write(54, payload.len(), |chunk| {
            chunk.iter_mut().for_each(|b| *b = src.next().unwrap())
        });

        let mut wrapped = [0; 20];
        let mut dst = wrapped.iter_mut();
        ring.stream_read(54, payload.len(), |chunk| {
            chunk.iter().for_each(|b| *dst.next().unwrap() = *b)
        });

        let mut slots = [Slot::new(); 4];
        let mut buffer = [0; 64];
        let mut ring = Ring::new(&mut slots, &mut buffer, 16, false);
        let mut src = payload.iter().copied();
        ring.stream_write(4, payload.len(), |chunk| {
            chunk.iter_mut().for_each(|b| *b = src.next().unwrap())
        });
        let mut linear = [0; 20];
        ring.buf_read(4, &mut linear);

        assert_eq!(wrapped, payload);
        assert_eq!(wrapped, linear);
    }

    #[test]
    fn stream_calls_once_without_wrap() {
        let mut slots = [Slot::new(); 2];
        let mut buffer = [0; 16];
        let ring = Ring::new(&mut slots, &mut buffer, 8, false);
        let mut calls = 0;
        ring.stream_read(0, 16, |chunk| {
            calls += 1;
            assert_eq!(chunk.len(), 16);
        });
        assert_eq!(calls, 1);
    }

    #[test]
    #[should_panic]
    fn oversized_write() {
        let mut slots = [Slot::new(); 2];
        let mut buffer = [0; 8];
        let mut ring = Ring::new(&mut slots, &mut buffer, 4, false);
        ring.buf_write(0, &[0; 9]);
    }
}
