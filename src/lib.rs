//! Interrupt-driven USB endpoint pipes for FT90x processors
//!
//! `ft90x-usbd-pipe` moves bulk and interrupt endpoint data between your class
//! driver and the USB device controller's endpoint FIFOs. Each endpoint
//! direction gets a [`Pipe`]: a ring of fixed-size slots over one linear
//! buffer. Your code fills (IN) or drains (OUT) slots in task context, and
//! the USBD interrupt handler moves one slot per FIFO event. Neither side
//! blocks on the other. See the [`pipe`] module for the full protocol.
//!
//! Control endpoint zero isn't handled here. Service it in your interrupt
//! handler before the stream endpoints.
//!
//! To interface the FT90x USBD, you must define a safe implementation of
//! [`Peripherals`], and wrap it in a [`Usbd`]. Other controllers, or
//! simulations, can implement [`FifoTransport`] instead.
//!
//! # Example
//!
//! An OUT pipe, drained by task code, and serviced by the USBD interrupt.
//!
//! ```no_run
//! use ft90x_usbd_pipe::{Isr, Peripherals, Pipe, PipeMemory, SharedPipe, Usbd};
//! use usb_device::{endpoint::EndpointAddress, UsbDirection};
//!
//! #[derive(Clone, Copy)]
//! struct Ft900Usbd;
//!
//! unsafe impl Peripherals for Ft900Usbd {
//!     fn usbd(&self) -> *const () {
//!         0x10180 as *const ()
//!     }
//! }
//!
//! static MEMORY: PipeMemory<4, 256> = PipeMemory::new();
//! static CDC_OUT: SharedPipe<'static, Usbd<Ft900Usbd>> = SharedPipe::new();
//!
//! let (slots, buffer) = MEMORY.take().unwrap();
//! let address = EndpointAddress::from_parts(2, UsbDirection::Out);
//! let pipe = Pipe::new(address, slots, buffer, 4, Usbd::new(Ft900Usbd)).unwrap();
//! cortex_m::interrupt::free(|cs| CDC_OUT.install(cs, pipe));
//!
//! // In the USBD interrupt handler...
//! let usbd = Usbd::new(Ft900Usbd);
//! let isr = unsafe { Isr::new() };
//! for endpoint in usbd.pending() {
//!     if endpoint == 2 {
//!         CDC_OUT.isr(&isr, |pipe| {
//!             if !pipe.is_engine_paused() {
//!                 pipe.process(&isr);
//!             }
//!         });
//!     }
//! }
//!
//! // In task code...
//! let mut command = [0; 64];
//! CDC_OUT.with_masked(|pipe| {
//!     if let Some(mut slot) = pipe.acquire() {
//!         let _len = pipe.read(&mut slot, &mut command);
//!         pipe.submit(slot);
//!         // Handle command[.._len]...
//!     }
//! });
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

mod buffer;
mod ral;
mod ring;
mod shared;
mod slot;
mod usbd;
mod vcell;

pub mod fifo;
pub mod isr;
pub mod pipe;

#[cfg(test)]
mod mock;

pub use buffer::PipeMemory;
pub use fifo::{FifoTransport, FifoWindow};
pub use isr::{Isr, PendingEndpoints};
pub use pipe::{Pipe, PipeError, ReadyHandler, UnderrunHandler, MAX_SLOTS};
pub use ral::{EndpointStatus, ENDPOINT_COUNT};
pub use shared::SharedPipe;
pub use slot::{AppSlot, Owner, Slot, SlotId};
pub use usbd::{Peripherals, Usbd};
