//! Endpoint interrupt context
//!
//! The USB endpoint interrupt handler creates an [`Isr`] on entry, then
//! services every pending endpoint's pipe.
//!
//! ```no_run
//! use ft90x_usbd_pipe::{Isr, Pipe, Usbd};
//! # struct Ps;
//! # unsafe impl ft90x_usbd_pipe::Peripherals for Ps { fn usbd(&self) -> *const () { panic!() } }
//! # fn pipe_for(ep: usize) -> Option<&'static mut Pipe<'static, Usbd<Ps>>> { None }
//! # let usbd = Usbd::new(Ps);
//!
//! // Inside your USBD interrupt handler...
//! let isr = unsafe { Isr::new() };
//! for endpoint in usbd.pending() {
//!     if let Some(pipe) = pipe_for(endpoint) {
//!         if !pipe.is_engine_paused() {
//!             pipe.process(&isr);
//!         }
//!     }
//! }
//! ```

use core::marker::PhantomData;

/// Proof that the caller is executing the USB endpoint interrupt
///
/// ISR-only pipe operations, like [`Pipe::process()`](crate::Pipe::process),
/// require an `Isr`. It's neither `Send` nor `Sync`, so it can't escape the
/// handler that created it. You may drop it before returning from the handler.
#[derive(Debug)]
pub struct Isr {
    _not_send: PhantomData<*const ()>,
}

impl Isr {
    /// Enter the endpoint interrupt context
    ///
    /// # Safety
    ///
    /// Call this only from the USB endpoint interrupt handler. No other, higher
    /// priority, interrupt may access the pipes serviced by this handler.
    /// Task code that shares those pipes must only do so with the USB
    /// interrupt masked; [`SharedPipe`](crate::SharedPipe) handles that.
    pub unsafe fn new() -> Self {
        Isr {
            _not_send: PhantomData,
        }
    }
}

/// Endpoint numbers with a pending interrupt
///
/// Produced from the endpoint interrupt flags. Endpoint 0 belongs to the
/// control transfer state machine, so it's never yielded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt_03::Format))]
pub struct PendingEndpoints(u16);

impl PendingEndpoints {
    /// Interpret the endpoint interrupt bitfield, one bit per endpoint
    pub const fn new(bitfield: u16) -> Self {
        PendingEndpoints(bitfield & !1)
    }

    /// Returns the bitfield, one bit per pending stream endpoint
    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// Indicates if no stream endpoint is pending
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Indicates if `endpoint` is pending
    pub const fn contains(&self, endpoint: usize) -> bool {
        endpoint != 0 && endpoint < 16 && (self.0 & (1 << endpoint)) != 0
    }
}

impl Iterator for PendingEndpoints {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let endpoint = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::PendingEndpoints;
    use std::vec::Vec;

    #[test]
    fn skips_control_endpoint() {
        let pending = PendingEndpoints::new(0b1000_0000_0010_0111);
        assert!(!pending.contains(0));
        assert!(pending.contains(1));
        assert!(!pending.contains(3));
        assert_eq!(pending.bits(), 0b1000_0000_0010_0110);
        assert_eq!(pending.collect::<Vec<_>>(), std::vec![1, 2, 5, 15]);
    }

    #[test]
    fn only_control() {
        let mut pending = PendingEndpoints::new(1);
        assert!(pending.is_empty());
        assert_eq!(pending.next(), None);
    }
}
