//! Endpoint pipes
//!
//! A [`Pipe`] coordinates one endpoint direction. The application produces
//! (IN) or consumes (OUT) bytes through slots that it owns. The hardware, by
//! way of [`Pipe::process()`] in the endpoint interrupt, moves one slot at a
//! time through the FIFO. Ownership of a slot alternates between the two
//! sides; neither side ever waits on the other.
//!
//! When a side runs out of work it pauses. The hardware pauses on underrun,
//! when its next slot is still owned by the application. The next
//! [`submit()`](Pipe::submit) resumes it by performing the transfer right
//! away. The application pauses itself with
//! [`set_app_paused()`](Pipe::set_app_paused); the pipe calls the `on_ready`
//! handler after the next transfer so that it can resume.
//!
//! # Example
//!
//! An IN pipe that sends a short report.
//!
//! ```
//! use ft90x_usbd_pipe::{FifoTransport, Pipe, PipeMemory};
//! use usb_device::{endpoint::EndpointAddress, UsbDirection};
//!
//! # struct Fifo;
//! # impl FifoTransport for Fifo {
//! #     fn max_packet_len(&self, _: usize) -> usize { 64 }
//! #     fn is_ready(&self, _: EndpointAddress) -> bool { true }
//! #     fn write_packet(&mut self, _: usize, _: &[u8]) {}
//! #     fn read_packet(&mut self, _: usize, _: &mut [u8]) -> usize { 0 }
//! # }
//! static MEMORY: PipeMemory<4, 256> = PipeMemory::new();
//!
//! let (slots, buffer) = MEMORY.take().unwrap();
//! let address = EndpointAddress::from_parts(1, UsbDirection::In);
//! let mut pipe = Pipe::new(address, slots, buffer, 4, Fifo).unwrap();
//!
//! let mut slot = pipe.force_acquire();
//! assert_eq!(pipe.write(&mut slot, b"report"), 6);
//! pipe.submit(slot);
//! ```

use core::fmt;

use crate::{
    fifo::FifoTransport,
    isr::Isr,
    ring::Ring,
    slot::{AppSlot, Owner, Slot, SlotId},
};
use usb_device::{endpoint::EndpointAddress, UsbDirection};

/// The largest number of slots in one pipe
pub const MAX_SLOTS: usize = 256;

/// Errors when creating a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub enum PipeError {
    /// The slot count is zero
    NoSlots,
    /// The buffer isn't aligned to a word
    Misaligned,
    /// The slot count exceeds the slot storage, or [`MAX_SLOTS`]
    TooManySlots,
    /// The buffer can't hold every slot
    BufferTooSmall,
    /// The endpoint reports a zero max packet length
    ZeroPacketSize,
}

impl fmt::Display for PipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeError::NoSlots => f.write_str("pipe needs at least one slot"),
            PipeError::Misaligned => f.write_str("pipe buffer is not word aligned"),
            PipeError::TooManySlots => f.write_str("too many slots for the slot storage"),
            PipeError::BufferTooSmall => f.write_str("pipe buffer is too small for its slots"),
            PipeError::ZeroPacketSize => f.write_str("endpoint max packet length is zero"),
        }
    }
}

/// Called by the ISR after a transfer, once the application has paused
///
/// Return `true` if you queued more work. The application stays paused
/// otherwise.
///
/// Handlers run in the endpoint interrupt. They must not block. They may
/// call back into the pipe.
pub trait ReadyHandler<'a, F> {
    /// Handle the ready event. Returns `true` if more work was queued.
    fn on_ready(&mut self, pipe: &mut Pipe<'a, F>) -> bool;
}

impl<'a, F, C> ReadyHandler<'a, F> for C
where
    C: FnMut(&mut Pipe<'a, F>) -> bool,
{
    fn on_ready(&mut self, pipe: &mut Pipe<'a, F>) -> bool {
        self(pipe)
    }
}

/// Called by the ISR when the hardware's next slot is still owned by the
/// application
///
/// Return `true` if you submitted the slot. The transfer proceeds whenever the
/// slot was submitted, and the hardware pauses otherwise. The same rules as
/// [`ReadyHandler`] apply.
pub trait UnderrunHandler<'a, F> {
    /// Handle the underrun event. Returns `true` if the slot was submitted.
    fn on_underrun(&mut self, pipe: &mut Pipe<'a, F>) -> bool;
}

impl<'a, F, C> UnderrunHandler<'a, F> for C
where
    C: FnMut(&mut Pipe<'a, F>) -> bool,
{
    fn on_underrun(&mut self, pipe: &mut Pipe<'a, F>) -> bool {
        self(pipe)
    }
}

type OnReady<'a, F> = &'a mut (dyn ReadyHandler<'a, F> + Send + 'a);
type OnUnderrun<'a, F> = &'a mut (dyn UnderrunHandler<'a, F> + Send + 'a);

/// A pipe for one endpoint direction
///
/// See the [module documentation](crate::pipe) for an overview.
///
/// A `Pipe` isn't internally synchronized. If you share a pipe between task
/// code and the endpoint interrupt, access it through a
/// [`SharedPipe`](crate::SharedPipe).
pub struct Pipe<'a, F> {
    ring: Ring<'a>,
    address: EndpointAddress,
    /// Next slot for the hardware
    hw: usize,
    /// Next slot for the application
    app: usize,
    /// Counts handoffs of the application's slot, so that stale tokens are
    /// detected
    generation: u32,
    hw_paused: bool,
    app_paused: bool,
    on_ready: Option<OnReady<'a, F>>,
    on_underrun: Option<OnUnderrun<'a, F>>,
    transport: F,
}

impl<'a, F: FifoTransport> Pipe<'a, F> {
    /// Create a pipe for the endpoint at `address`
    ///
    /// The first `count` entries of `slots` divide `buffer` into chunks
    /// of the endpoint's max packet length, as reported by the `transport`.
    /// `buffer` must be word aligned.
    ///
    /// OUT slots start owned by the hardware, so the endpoint can receive
    /// right away. IN slots start owned by the application, and the hardware
    /// starts paused until the first submit.
    ///
    /// If this returns an error, `slots` and `buffer` have not been modified.
    pub fn new(
        address: EndpointAddress,
        slots: &'a mut [Slot],
        buffer: &'a mut [u8],
        count: usize,
        transport: F,
    ) -> Result<Self, PipeError> {
        let max_packet_len = transport.max_packet_len(address.index());

        if count == 0 {
            return Err(PipeError::NoSlots);
        }
        if buffer.as_ptr() as usize % core::mem::align_of::<u32>() != 0 {
            return Err(PipeError::Misaligned);
        }
        if max_packet_len == 0 {
            return Err(PipeError::ZeroPacketSize);
        }
        if count > slots.len() || count > MAX_SLOTS {
            return Err(PipeError::TooManySlots);
        }
        let size = count
            .checked_mul(max_packet_len)
            .filter(|size| *size <= buffer.len())
            .ok_or(PipeError::BufferTooSmall)?;

        let out_direction = address.direction() == UsbDirection::Out;
        let ring = Ring::new(
            &mut slots[..count],
            &mut buffer[..size],
            max_packet_len,
            out_direction,
        );

        debug!(
            "PIPE EP{} {} SLOTS OF {}",
            address.index(),
            count,
            max_packet_len
        );

        Ok(Pipe {
            ring,
            address,
            hw: 0,
            app: 0,
            generation: 0,
            hw_paused: !out_direction,
            app_paused: out_direction,
            on_ready: None,
            on_underrun: None,
            transport,
        })
    }

    /// Tear down the pipe, returning the transport
    ///
    /// The slot and buffer storage can be used for a new pipe after this call.
    pub fn release(self) -> F {
        self.transport
    }

    fn is_in(&self) -> bool {
        self.address.direction() == UsbDirection::In
    }

    /// Reset `index` cursors to "nothing processed"
    ///
    /// IN keeps a full packet of free space; OUT holds no data.
    fn reset_cursors(&mut self, index: usize) {
        let is_in = self.is_in();
        let slot = self.ring.slot_mut(index);
        slot.ptr = slot.start;
        if !is_in {
            slot.end = slot.start;
        }
    }

    /// Return the hardware's slot to the application, and move on
    fn release_slot(&mut self, index: usize) {
        debug_assert_eq!(index, self.hw, "released slot isn't the hardware slot");
        self.ring.slot_mut(index).owner = Owner::Application;
        self.hw = self.ring.next(index);
    }

    /// Move one slot through the FIFO, then release it to the application
    fn transfer(&mut self, index: usize) {
        let endpoint = self.address.index();
        let slot = *self.ring.slot(index);
        if self.is_in() {
            self.transport
                .write_packet(endpoint, self.ring.bytes(slot.start..slot.ptr));
            self.ring.slot_mut(index).ptr = slot.start;
            trace!("EP{} IN SLOT {} LEN {}", endpoint, slot.id, slot.consumed());
        } else {
            let range = slot.start..slot.start + self.ring.max_packet_len();
            let (slot, bytes) = self.ring.slot_and_bytes_mut(index, range);
            let len = self.transport.read_packet(endpoint, bytes);
            slot.end = slot.start + len;
            slot.ptr = slot.start;
            trace!("EP{} OUT SLOT {} LEN {}", endpoint, slot.id, len);
        }
        self.release_slot(index);
    }

    fn submit_index(&mut self, index: usize) {
        debug_assert_eq!(index, self.app, "submitted slot isn't the application slot");
        debug_assert!(
            self.ring.slot(index).is_owned_by_app(),
            "submitted slot is owned by the hardware"
        );
        if self.hw_paused {
            debug!("EP{} RESUME FROM APP", self.address.index());
            self.hw_paused = false;
            self.transfer(index);
        } else {
            self.ring.slot_mut(index).owner = Owner::Hardware;
        }
        self.app = self.ring.next(self.app);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Indicates if `slot` names the application's slot, and the application
    /// still owns it
    fn is_current(&self, slot: &AppSlot<'a>) -> bool {
        slot.generation == self.generation
            && slot.index() == self.app
            && self.ring.slot(self.app).is_owned_by_app()
    }

    /// Hand the application's slot to the hardware
    ///
    /// If the hardware is paused, the transfer happens now. Otherwise, it
    /// happens in a later [`process()`](Pipe::process). Either way, the
    /// application moves on to the next slot.
    ///
    /// Submitting an IN slot with nothing in it sends a zero length packet.
    ///
    /// A stale `slot` is rejected, and nothing changes. That's a contract
    /// violation, checked in debug builds.
    pub fn submit(&mut self, slot: AppSlot<'a>) {
        let current = self.is_current(&slot);
        debug_assert!(current, "submitted a stale slot token");
        if !current {
            warn!("EP{} STALE SUBMIT SLOT {}", self.address.index(), slot.index());
            return;
        }
        self.submit_index(slot.index());
    }

    /// Acquire the application's slot if the application owns it
    pub fn acquire(&self) -> Option<AppSlot<'a>> {
        self.ring
            .slot(self.app)
            .is_owned_by_app()
            .then(|| AppSlot::new(self.app, self.generation))
    }

    /// Always acquire the application's slot
    ///
    /// If the hardware still owns the slot, the slot is reclaimed and its
    /// contents are discarded. Use this when you need a fresh buffer no matter
    /// what's in flight, for instance when re-arming after a stall.
    pub fn force_acquire(&mut self) -> AppSlot<'a> {
        let index = self.app;
        if self.ring.slot(index).is_owned_by_hardware() {
            warn!("EP{} RECLAIM SLOT {}", self.address.index(), index);
            self.reset_cursors(index);
            self.release_slot(index);
        }
        AppSlot::new(index, self.generation)
    }

    /// Look for `len` bytes across the application's slots
    ///
    /// IN counts free space, and OUT counts received data. Returns the buffer
    /// offset of the application's cursor if there's enough, or `None` if the
    /// hardware owns a slot first. Use the offset with the `buf_*` and
    /// `stream_*` methods, then commit with [`submit_urbs()`](Pipe::submit_urbs).
    ///
    /// OUT data is only contiguous when every slot but the last holds a full
    /// packet.
    pub fn get_app_urbs(&self, len: usize) -> Option<usize> {
        let mut index = self.app;
        let offset = self.ring.slot(index).offset();
        let mut total = 0;
        for _ in 0..self.ring.len() {
            let slot = self.ring.slot(index);
            if slot.is_owned_by_hardware() {
                break;
            }
            total += slot.to_process();
            if total >= len {
                return Some(offset);
            }
            index = self.ring.next(index);
        }
        None
    }

    /// Commit `len` bytes across the application's slots
    ///
    /// Every slot that's fully consumed is submitted. The last, partial slot
    /// only has its cursor advanced. Returns the slot that holds the
    /// remainder.
    ///
    /// `len` must not exceed what [`get_app_urbs()`](Pipe::get_app_urbs)
    /// confirmed; this is checked in debug builds.
    pub fn submit_urbs(&mut self, len: usize) -> SlotId {
        debug_assert!(
            self.get_app_urbs(len).is_some(),
            "{} bytes exceed the application's slots",
            len
        );
        let mut remaining = len;
        let mut index = self.app;
        loop {
            let slot = self.ring.slot_mut(index);
            let available = slot.to_process();
            if remaining < available {
                slot.ptr += remaining;
                break;
            }
            slot.ptr += available;
            remaining -= available;
            self.submit_index(index);
            index = self.ring.next(index);
            if remaining == 0 {
                break;
            }
        }
        SlotId(index as u8)
    }

    /// Perform the hardware side of the pipe
    ///
    /// Call this from the endpoint interrupt, once per FIFO ready event, and
    /// only while the hardware isn't paused.
    pub fn process(&mut self, _: &Isr) {
        debug_assert!(!self.hw_paused, "processed a paused pipe");
        if self.underrun() {
            return;
        }

        self.transfer(self.hw);

        if self.app_paused {
            if let Some(queued) = self.notify_ready() {
                self.app_paused = !queued;
            }
        }
    }

    /// Returns `true` if the hardware paused
    fn underrun(&mut self) -> bool {
        let index = self.hw;
        if self.ring.slot(index).is_owned_by_hardware() {
            return false;
        }

        let submitted = match self.on_underrun.take() {
            Some(handler) => {
                let submitted = handler.on_underrun(self);
                if self.on_underrun.is_none() {
                    self.on_underrun = Some(handler);
                }
                submitted
            }
            None => false,
        };
        if self.ring.slot(self.hw).is_owned_by_hardware() {
            if !submitted {
                debug!("EP{} UNDERRUN HANDLER SUBMITTED ANYWAY", self.address.index());
            }
            return false;
        }

        self.hw_paused = true;
        debug!("EP{} PAUSED AT SLOT {}", self.address.index(), index);
        true
    }

    fn notify_ready(&mut self) -> Option<bool> {
        let handler = self.on_ready.take()?;
        let queued = handler.on_ready(self);
        if self.on_ready.is_none() {
            self.on_ready = Some(handler);
        }
        Some(queued)
    }

    /// Discard the application's unsubmitted data
    ///
    /// For IN, the bytes filled in the application's slot are dropped. For OUT,
    /// the unread bytes are dropped. If the hardware owns the application's
    /// slot, the slot is reclaimed. Other slots are untouched.
    pub fn purge(&mut self) {
        let index = self.app;
        self.reset_cursors(index);
        if self.ring.slot(index).is_owned_by_hardware() {
            self.release_slot(index);
        }
        debug!("EP{} PURGE SLOT {}", self.address.index(), index);
    }

    /// Register the handler for the ready event
    ///
    /// This replaces any existing handler.
    pub fn register_on_ready(&mut self, handler: OnReady<'a, F>) {
        self.on_ready = Some(handler);
    }

    /// Register the handler for the underrun event
    ///
    /// This replaces any existing handler.
    pub fn register_on_underrun(&mut self, handler: OnUnderrun<'a, F>) {
        self.on_underrun = Some(handler);
    }

    /// Remove the ready handler
    pub fn unregister_on_ready(&mut self) {
        self.on_ready = None;
    }

    /// Remove the underrun handler
    pub fn unregister_on_underrun(&mut self) {
        self.on_underrun = None;
    }

    /// Pause the application until the next ready event
    pub fn set_app_paused(&mut self) {
        self.app_paused = true;
    }

    /// Indicates if the application is waiting for a ready event
    pub fn is_app_paused(&self) -> bool {
        self.app_paused
    }

    /// Indicates if the hardware is paused, waiting for a submit
    pub fn is_engine_paused(&self) -> bool {
        self.hw_paused
    }

    /// Indicates if the endpoint FIFO is ready for the next packet
    pub fn hardware_ready(&self) -> bool {
        self.transport.is_ready(self.address)
    }

    /// Returns the endpoint address of this pipe
    pub fn address(&self) -> EndpointAddress {
        self.address
    }

    /// Returns the size of every slot
    pub fn max_packet_len(&self) -> usize {
        self.ring.max_packet_len()
    }

    /// Returns the number of slots in the ring
    pub fn slot_count(&self) -> usize {
        self.ring.len()
    }

    /// All slots in ring order
    pub fn slots(&self) -> &[Slot] {
        self.ring.slots()
    }

    /// Look up a slot by its ring position, for diagnostics
    pub fn slot_by_id(&self, id: SlotId) -> Option<&Slot> {
        self.ring.slots().get(id.index())
    }

    /// The application's next slot. The hardware may own it.
    pub fn app_slot_id(&self) -> SlotId {
        SlotId(self.app as u8)
    }

    /// The hardware's next slot. The application may own it.
    pub fn hw_slot_id(&self) -> SlotId {
        SlotId(self.hw as u8)
    }

    /// Access the FIFO transport
    pub fn transport(&self) -> &F {
        &self.transport
    }

    /// Mutably access the FIFO transport
    pub fn transport_mut(&mut self) -> &mut F {
        &mut self.transport
    }

    /// Describes an acquired slot
    pub fn slot(&self, slot: &AppSlot<'a>) -> &Slot {
        self.ring.slot(slot.index())
    }

    /// Unprocessed bytes of an acquired slot
    ///
    /// IN: free space to fill. OUT: received data to read. Call
    /// [`advance()`](Pipe::advance) after processing. Empty if `slot` is stale.
    pub fn unprocessed_mut(&mut self, slot: &mut AppSlot<'a>) -> &mut [u8] {
        if !self.is_current(slot) {
            return &mut [];
        }
        let Slot { ptr, end, .. } = *self.ring.slot(slot.index());
        self.ring.slot_and_bytes_mut(slot.index(), ptr..end).1
    }

    /// Advance an acquired slot's cursor by `len`, up to the end of the slot
    ///
    /// Does nothing if `slot` is stale.
    pub fn advance(&mut self, slot: &mut AppSlot<'a>, len: usize) {
        if !self.is_current(slot) {
            return;
        }
        let slot = self.ring.slot_mut(slot.index());
        slot.ptr += len.min(slot.to_process());
    }

    /// Copy `data` into the free space of an acquired IN slot
    ///
    /// Returns the number of bytes copied, which is zero for a stale `slot`.
    pub fn write(&mut self, slot: &mut AppSlot<'a>, data: &[u8]) -> usize {
        let space = self.unprocessed_mut(slot);
        let len = space.len().min(data.len());
        space[..len].copy_from_slice(&data[..len]);
        self.advance(slot, len);
        len
    }

    /// Copy received data out of an acquired OUT slot
    ///
    /// Returns the number of bytes copied, which is zero for a stale `slot`.
    pub fn read(&mut self, slot: &mut AppSlot<'a>, data: &mut [u8]) -> usize {
        let received = self.unprocessed_mut(slot);
        let len = received.len().min(data.len());
        data[..len].copy_from_slice(&received[..len]);
        self.advance(slot, len);
        len
    }

    /// Copy `src` into the buffer at `offset`, wrapping at the end of the buffer
    ///
    /// # Panics
    ///
    /// Panics if `offset` or `src` don't fit in the buffer.
    pub fn buf_write(&mut self, offset: usize, src: &[u8]) {
        self.ring.buf_write(offset, src);
    }

    /// Copy from the buffer at `offset` into `dst`, wrapping at the end of the buffer
    ///
    /// # Panics
    ///
    /// Panics if `offset` or `dst` don't fit in the buffer.
    pub fn buf_read(&self, offset: usize, dst: &mut [u8]) {
        self.ring.buf_read(offset, dst);
    }

    /// Fill `len` bytes of the buffer at `offset` from a stream
    ///
    /// `source` is called with each linear piece of the buffer, in order. This
    /// is called twice if the range wraps.
    pub fn stream_write(&mut self, offset: usize, len: usize, source: impl FnMut(&mut [u8])) {
        self.ring.stream_write(offset, len, source);
    }

    /// Drain `len` bytes of the buffer at `offset` into a stream
    pub fn stream_read(&self, offset: usize, len: usize, sink: impl FnMut(&[u8])) {
        self.ring.stream_read(offset, len, sink);
    }
}
