//! Endpoint FIFO access
//!
//! [`FifoTransport`] is everything a [`Pipe`](crate::Pipe) needs from the USB
//! device controller. The FT90x implementation is [`Usbd`](crate::Usbd). You
//! can provide your own transports for other controllers, or for simulation.
//!
//! [`stream_out`] and [`stream_in`] are portable copy loops for controllers
//! that expose each endpoint FIFO as a single data register. They move whole
//! words first, then the unaligned tail one byte at a time.

use usb_device::endpoint::EndpointAddress;

/// Moves packets between endpoint FIFOs and memory
///
/// All methods take the endpoint number; the direction is implied by the pipe
/// that makes the call. Transports are only called from the context that has
/// exclusive access to the pipe.
pub trait FifoTransport {
    /// Returns the maximum packet length configured for `endpoint`
    ///
    /// Pipes use this once, to size their slots.
    fn max_packet_len(&self, endpoint: usize) -> usize;

    /// Indicates if the FIFO is ready for the next packet
    ///
    /// For IN, the FIFO can take another packet. For OUT, the FIFO holds a
    /// received packet.
    fn is_ready(&self, address: EndpointAddress) -> bool;

    /// Stream `data` into the IN FIFO, then mark the packet ready to send
    ///
    /// An empty `data` sends a zero length packet.
    fn write_packet(&mut self, endpoint: usize, data: &[u8]);

    /// Stream the received OUT packet into `data`, then release the FIFO
    ///
    /// Returns the number of bytes received, which is no larger than `data`.
    fn read_packet(&mut self, endpoint: usize, data: &mut [u8]) -> usize;
}

/// A FIFO data register that accepts word and byte accesses
pub trait FifoWindow {
    /// Push four bytes, in memory order
    fn write_word(&self, word: u32);
    /// Push one byte
    fn write_byte(&self, byte: u8);
    /// Pop four bytes, in memory order
    fn read_word(&self) -> u32;
    /// Pop one byte
    fn read_byte(&self) -> u8;
}

/// Copy `data` into `window`
pub fn stream_out<W: FifoWindow + ?Sized>(window: &W, data: &[u8]) {
    let mut words = data.chunks_exact(4);
    for word in &mut words {
        window.write_word(u32::from_ne_bytes([word[0], word[1], word[2], word[3]]));
    }
    for byte in words.remainder() {
        window.write_byte(*byte);
    }
}

/// Fill `data` from `window`
pub fn stream_in<W: FifoWindow + ?Sized>(window: &W, data: &mut [u8]) {
    let mut words = data.chunks_exact_mut(4);
    for word in &mut words {
        word.copy_from_slice(&window.read_word().to_ne_bytes());
    }
    for byte in words.into_remainder() {
        *byte = window.read_byte();
    }
}
