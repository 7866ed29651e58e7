//! FT90x USBD endpoint FIFOs

use crate::{
    fifo::{self, FifoTransport},
    isr::PendingEndpoints,
    ral::{self, EndpointStatus},
};
use usb_device::{endpoint::EndpointAddress, UsbDirection};

/// A type that provides the USBD register block
///
/// # Safety
///
/// `Peripherals` should only be implemented on a type that's allowed to use
/// the USB device registers. The pointer returned by `usbd()` is assumed to be
/// valid for the lifetime of the implementer, and will be cast to a register
/// definition.
///
/// A pipe only touches the registers of its own endpoint. You may hand out
/// more than one implementer, one per pipe, as long as each endpoint is used
/// by at most one pipe.
///
/// # Example
///
/// ```
/// use ft90x_usbd_pipe::Peripherals;
///
/// #[derive(Clone, Copy)]
/// struct Ft900Usbd;
///
/// unsafe impl Peripherals for Ft900Usbd {
///     fn usbd(&self) -> *const () {
///         0x10180 as *const ()
///     }
/// }
///
/// assert_eq!(Ft900Usbd.usbd(), 0x10180 as *const ());
/// ```
pub unsafe trait Peripherals {
    /// Returns the address of the USBD registers
    fn usbd(&self) -> *const ();
}

/// FT90x endpoint FIFO transport
///
/// Implements [`FifoTransport`] with word-then-byte streaming through each
/// endpoint's EPxFIFO register.
#[derive(Clone, Copy)]
pub struct Usbd<P> {
    peripherals: P,
}

impl<P: Peripherals> Usbd<P> {
    /// Wrap the USBD register block
    pub fn new(peripherals: P) -> Self {
        Usbd { peripherals }
    }

    /// Release the register block
    pub fn release(self) -> P {
        self.peripherals
    }

    fn registers(&self) -> &ral::RegisterBlock {
        // Safety: implementers of Peripherals guarantee a valid register block.
        unsafe { &*self.peripherals.usbd().cast() }
    }

    /// # Panics
    ///
    /// Panics if `endpoint` isn't one of the [`ENDPOINT_COUNT`](crate::ENDPOINT_COUNT) endpoints.
    fn endpoint(&self, endpoint: usize) -> &ral::EndpointRegisters {
        &self.registers().EP[endpoint]
    }

    /// Read the status of `endpoint`
    pub fn status(&self, endpoint: usize) -> EndpointStatus {
        EndpointStatus::from_bits_truncate(ral::read_reg!(ral, self.endpoint(endpoint), EPxSR))
    }

    /// Acquire and acknowledge the stream endpoints that are signaling an
    /// interrupt
    ///
    /// Call this from your USBD interrupt handler. The control endpoint's flag
    /// is never acknowledged here; that's left to the control transfer code.
    pub fn pending(&self) -> PendingEndpoints {
        let usbd = self.registers();
        let pending = PendingEndpoints::new(ral::read_reg!(ral, usbd, EPIF, IRQ));
        ral::write_reg!(ral, usbd, EPIF, IRQ: pending.bits());
        trace!("EPIF {:X}", pending.bits());
        pending
    }
}

impl<P: Peripherals> FifoTransport for Usbd<P> {
    fn max_packet_len(&self, endpoint: usize) -> usize {
        8 << ral::read_reg!(ral, self.endpoint(endpoint), EPxCR, SIZE)
    }

    fn is_ready(&self, address: EndpointAddress) -> bool {
        let status = self.status(address.index());
        match address.direction() {
            UsbDirection::In => !status.contains(EndpointStatus::INPRDY),
            UsbDirection::Out => status.contains(EndpointStatus::OPRDY),
        }
    }

    fn write_packet(&mut self, endpoint: usize, data: &[u8]) {
        let ep = self.endpoint(endpoint);
        fifo::stream_out(&ep.EPxFIFO, data);
        ral::write_reg!(ral, ep, EPxSR, EndpointStatus::INPRDY.bits());
    }

    fn read_packet(&mut self, endpoint: usize, data: &mut [u8]) -> usize {
        let ep = self.endpoint(endpoint);
        let received = ral::read_reg!(ral, ep, EPxCNT, COUNT) as usize;
        if received > data.len() {
            warn!("EP{} OUT {} BYTES TRUNCATED TO {}", endpoint, received, data.len());
        }
        let len = received.min(data.len());
        fifo::stream_in(&ep.EPxFIFO, &mut data[..len]);
        ral::write_reg!(ral, ep, EPxSR, EndpointStatus::OPRDY.bits());
        len
    }
}

#[cfg(test)]
mod tests {
    use super::{Peripherals, Usbd};
    use crate::{
        fifo::{FifoTransport, FifoWindow},
        ral,
    };
    use std::boxed::Box;
    use usb_device::{endpoint::EndpointAddress, UsbDirection};

    struct Block(Box<ral::RegisterBlock>);

    unsafe impl Peripherals for &Block {
        fn usbd(&self) -> *const () {
            (&*self.0 as *const ral::RegisterBlock).cast()
        }
    }

    fn block() -> Block {
        // Safety: all registers are plain integers.
        Block(unsafe { Box::new(core::mem::zeroed()) })
    }

    #[test]
    fn max_packet_len() {
        let block = block();
        ral::write_reg!(ral, &block.0.EP[1], EPxCR, SIZE: 3);
        ral::write_reg!(ral, &block.0.EP[2], EPxCR, SIZE: 6);
        let usbd = Usbd::new(&block);
        assert_eq!(usbd.max_packet_len(1), 64);
        assert_eq!(usbd.max_packet_len(2), 512);
        assert_eq!(usbd.max_packet_len(3), 8);
    }

    #[test]
    fn readiness() {
        let block = block();
        let usbd = Usbd::new(&block);
        let ep_in = EndpointAddress::from_parts(1, UsbDirection::In);
        let ep_out = EndpointAddress::from_parts(2, UsbDirection::Out);

        assert!(usbd.is_ready(ep_in));
        assert!(!usbd.is_ready(ep_out));

        ral::write_reg!(ral, &block.0.EP[1], EPxSR, 0b10);
        ral::write_reg!(ral, &block.0.EP[2], EPxSR, 0b01);
        assert!(!usbd.is_ready(ep_in));
        assert!(usbd.is_ready(ep_out));
    }

    #[test]
    fn write_signals_inprdy() {
        let block = block();
        let mut usbd = Usbd::new(&block);
        usbd.write_packet(1, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        // The register model holds the last word, then the last byte over its low lane
        assert_eq!(
            FifoWindow::read_word(&block.0.EP[1].EPxFIFO),
            u32::from_ne_bytes([0xEE, 0xBB, 0xCC, 0xDD])
        );
        assert_eq!(ral::read_reg!(ral, &block.0.EP[1], EPxSR), 0b10);
    }

    #[test]
    fn pending_acknowledges() {
        let block = block();
        ral::write_reg!(ral, &*block.0, EPIF, 0b0000_0111);
        let usbd = Usbd::new(&block);
        let mut pending = usbd.pending();
        assert_eq!(pending.next(), Some(1));
        assert_eq!(pending.next(), Some(2));
        assert_eq!(pending.next(), None);
        // Memory, not hardware, so the register holds the write-one-to-clear
        // value. EP0 was written as zero.
        assert_eq!(ral::read_reg!(ral, &*block.0, EPIF), 0b0000_0110);
    }

    fn set_count(block: &Block, endpoint: usize, count: u16) {
        let cnt = core::ptr::addr_of!(block.0.EP[endpoint].EPxCNT);
        // Safety: the register is an UnsafeCell over a u16.
        unsafe { cnt.cast::<u16>().cast_mut().write_volatile(count) };
    }

    #[test]
    fn read_packet_words_then_bytes() {
        let block = block();
        set_count(&block, 2, 5);
        FifoWindow::write_word(&block.0.EP[2].EPxFIFO, u32::from_ne_bytes([1, 2, 3, 4]));
        let mut usbd = Usbd::new(&block);

        let mut data = [0; 8];
        assert_eq!(usbd.read_packet(2, &mut data), 5);
        // The register model returns the low lane for a byte read
        assert_eq!(data, [1, 2, 3, 4, 1, 0, 0, 0]);
        assert_eq!(ral::read_reg!(ral, &block.0.EP[2], EPxSR), 0b01);
    }

    #[test]
    fn read_packet_truncates() {
        let block = block();
        set_count(&block, 3, 10);
        FifoWindow::write_word(&block.0.EP[3].EPxFIFO, u32::from_ne_bytes([9, 8, 7, 6]));
        let mut usbd = Usbd::new(&block);

        let mut data = [0; 4];
        assert_eq!(usbd.read_packet(3, &mut data), 4);
        assert_eq!(data, [9, 8, 7, 6]);
        assert_eq!(ral::read_reg!(ral, &block.0.EP[3], EPxSR), 0b01);
    }
}
