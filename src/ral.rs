//! FT90x USB device (USBD) registers
//!
//! The module implements a RAL-compatible interface for the USBD register
//! block, so that we can use the `ral-registers` macros. Every register
//! sits on a 32 bit boundary, even if it's only 8 or 16 bits wide.
//!
//! Only the registers that the pipes need are described.

#![allow(non_snake_case, non_upper_case_globals)]

pub use ral_registers::{modify_reg, read_reg, write_reg, RORegister, RWRegister};

use crate::vcell::FifoCell;

/// Number of USBD endpoints, including the control endpoint
#[cfg(not(feature = "ft930"))]
pub const ENDPOINT_COUNT: usize = 8;
/// Number of USBD endpoints, including the control endpoint
#[cfg(feature = "ft930")]
pub const ENDPOINT_COUNT: usize = 16;

#[repr(C)]
pub struct RegisterBlock {
    pub CMIF: RWRegister<u8>,
    _reserved0: [u8; 3],
    pub EPIF: RWRegister<u16>,
    _reserved1: [u8; 2],
    pub CMIE: RWRegister<u8>,
    _reserved2: [u8; 3],
    pub EPIE: RWRegister<u16>,
    _reserved3: [u8; 2],
    pub FCTRL: RWRegister<u8>,
    _reserved4: [u8; 3],
    pub FRAME: RORegister<u16>,
    _reserved5: [u8; 2],
    pub FADDR: RWRegister<u8>,
    _reserved6: [u8; 3],
    pub EP: [EndpointRegisters; ENDPOINT_COUNT],
}

/// Registers for one endpoint
#[repr(C)]
pub struct EndpointRegisters {
    pub EPxCR: RWRegister<u8>,
    _reserved0: [u8; 3],
    pub EPxSR: RWRegister<u8>,
    _reserved1: [u8; 3],
    pub EPxCNT: RORegister<u16>,
    _reserved2: [u8; 2],
    pub EPxFIFO: FifoCell,
}

/// Endpoint interrupt flags, one bit per endpoint. Write one to clear.
pub mod EPIF {
    pub mod IRQ {
        pub const offset: u16 = 0;
        pub const mask: u16 = (((1u32 << super::super::ENDPOINT_COUNT) - 1) as u16) << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

/// Endpoint control, for endpoints other than EP0
pub mod EPxCR {
    pub mod DIR {
        pub const offset: u8 = 0;
        pub const mask: u8 = 1 << offset;
        pub mod RW {
            pub const OUT: u8 = 0;
            pub const IN: u8 = 1;
        }
        pub mod R {}
        pub mod W {}
    }
    pub mod SDSTL {
        pub const offset: u8 = 3;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    /// Max packet size, encoded as `8 << SIZE`
    pub mod SIZE {
        pub const offset: u8 = 4;
        pub const mask: u8 = 0b111 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod DB {
        pub const offset: u8 = 7;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

/// Endpoint byte count of the received OUT packet
pub mod EPxCNT {
    pub mod COUNT {
        pub const offset: u16 = 0;
        pub const mask: u16 = 0x7FF << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

bitflags::bitflags! {
    /// Endpoint status (EPxSR)
    ///
    /// Software sets `INPRDY` once an IN packet is in the FIFO; the hardware
    /// clears it after the host takes the packet. The hardware sets `OPRDY`
    /// once an OUT packet arrives; software writes one to release the FIFO.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EndpointStatus : u8 {
        const OPRDY = 1 << 0;
        const INPRDY = 1 << 1;
        const OVER_RUN = 1 << 2;
        const UNDER_RUN = 1 << 3;
        const SEND_STALL = 1 << 4;
        const DATA_ERR = 1 << 5;
        const FIFO_FLUSH = 1 << 6;
        const CLR_TOGGLE = 1 << 7;
    }
}

const _: [(); 1] = [(); (core::mem::size_of::<EndpointRegisters>() == 16) as usize];

#[cfg(test)]
mod tests {
    use super::{EndpointRegisters, EndpointStatus, RegisterBlock};
    use crate::ral;
    use std::boxed::Box;

    fn zeroed() -> Box<RegisterBlock> {
        // Safety: all registers are plain integers.
        unsafe { Box::new(core::mem::zeroed()) }
    }

    fn ep(block: &RegisterBlock, idx: usize) -> &EndpointRegisters {
        &block.EP[idx]
    }

    #[test]
    fn size_field() {
        let block = zeroed();
        ral::write_reg!(ral, ep(&block, 1), EPxCR, SIZE: 3, DIR: IN);
        assert_eq!(ep(&block, 1).EPxCR.read(), 0b0011_0001);
        assert_eq!(ral::read_reg!(ral, ep(&block, 1), EPxCR, SIZE), 3);
        assert!(ral::read_reg!(ral, ep(&block, 1), EPxCR, DIR == IN));
    }

    #[test]
    fn modify_keeps_other_fields() {
        let block = zeroed();
        ral::write_reg!(ral, ep(&block, 2), EPxCR, SIZE: 6);
        ral::modify_reg!(ral, ep(&block, 2), EPxCR, SDSTL: 1);
        assert_eq!(ral::read_reg!(ral, ep(&block, 2), EPxCR, SIZE), 6);
        assert_eq!(ral::read_reg!(ral, ep(&block, 2), EPxCR, SDSTL), 1);
    }

    #[test]
    fn status_bits() {
        let status = EndpointStatus::from_bits_truncate(0b0000_0011);
        assert!(status.contains(EndpointStatus::OPRDY | EndpointStatus::INPRDY));
        assert!(!status.contains(EndpointStatus::SEND_STALL));
    }
}
