//! Pipes shared between task code and the endpoint interrupt

use core::cell::RefCell;

use cortex_m::interrupt::{self, CriticalSection, Mutex};

use crate::{isr::Isr, pipe::Pipe};

/// A pipe that task code and the endpoint interrupt can both reach
///
/// Task code locks the pipe with the USB interrupt masked. The interrupt
/// handler locks the pipe with its [`Isr`] token. Handlers registered on the
/// pipe receive the pipe directly, so they never need to lock it.
///
/// ```no_run
/// use ft90x_usbd_pipe::{Isr, SharedPipe, Usbd};
/// # #[derive(Clone, Copy)] struct Ps;
/// # unsafe impl ft90x_usbd_pipe::Peripherals for Ps { fn usbd(&self) -> *const () { panic!() } }
///
/// static CDC_IN: SharedPipe<'static, Usbd<Ps>> = SharedPipe::new();
///
/// fn send(report: &[u8]) -> Option<usize> {
///     CDC_IN.with_masked(|pipe| {
///         let mut slot = pipe.acquire()?;
///         let written = pipe.write(&mut slot, report);
///         pipe.submit(slot);
///         Some(written)
///     })?
/// }
///
/// fn on_usbd_interrupt(usbd: &Usbd<Ps>) {
///     let isr = unsafe { Isr::new() };
///     if usbd.pending().contains(1) {
///         CDC_IN.isr(&isr, |pipe| {
///             if !pipe.is_engine_paused() {
///                 pipe.process(&isr);
///             }
///         });
///     }
/// }
/// ```
pub struct SharedPipe<'a, F> {
    pipe: Mutex<RefCell<Option<Pipe<'a, F>>>>,
}

impl<'a, F> SharedPipe<'a, F> {
    /// An empty slot for a pipe
    pub const fn new() -> Self {
        SharedPipe {
            pipe: Mutex::new(RefCell::new(None)),
        }
    }

    /// Install `pipe`, returning the pipe it replaces
    pub fn install(&self, cs: &CriticalSection, pipe: Pipe<'a, F>) -> Option<Pipe<'a, F>> {
        self.pipe.borrow(cs).replace(Some(pipe))
    }

    /// Remove the pipe
    ///
    /// Use this to tear the pipe down, or to reconfigure the endpoint.
    pub fn take(&self, cs: &CriticalSection) -> Option<Pipe<'a, F>> {
        self.pipe.borrow(cs).take()
    }

    /// Run `f` with the pipe, if one is installed
    ///
    /// # Panics
    ///
    /// Panics if called from within another `lock` on the same pipe.
    pub fn lock<R>(&self, cs: &CriticalSection, f: impl FnOnce(&mut Pipe<'a, F>) -> R) -> Option<R> {
        self.pipe.borrow(cs).borrow_mut().as_mut().map(f)
    }

    /// Mask interrupts, then run `f` with the pipe
    pub fn with_masked<R>(&self, f: impl FnOnce(&mut Pipe<'a, F>) -> R) -> Option<R> {
        interrupt::free(|cs| self.lock(cs, f))
    }

    /// Run `f` with the pipe from the endpoint interrupt
    pub fn isr<R>(&self, _: &Isr, f: impl FnOnce(&mut Pipe<'a, F>) -> R) -> Option<R> {
        // Safety: the Isr token proves that task code, which only locks with
        // the USB interrupt masked, can't be holding the pipe.
        let cs = unsafe { CriticalSection::new() };
        self.lock(&cs, f)
    }
}

impl<F> Default for SharedPipe<'_, F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SharedPipe;
    use crate::{mock::MockFifo, Isr, Pipe, Slot};
    use cortex_m::interrupt::CriticalSection;
    use usb_device::{endpoint::EndpointAddress, UsbDirection};

    #[repr(align(4))]
    struct Aligned([u8; 32]);

    #[test]
    fn task_then_isr() {
        let mut slots = [Slot::new(); 2];
        let mut buffer = Aligned([0; 32]);
        let address = EndpointAddress::from_parts(3, UsbDirection::In);
        let pipe = Pipe::new(address, &mut slots, &mut buffer.0, 2, MockFifo::new(16)).unwrap();

        let shared = SharedPipe::new();
        let cs = unsafe { CriticalSection::new() };
        assert!(shared.lock(&cs, |_| ()).is_none());
        assert!(shared.install(&cs, pipe).is_none());

        let written = shared.lock(&cs, |pipe| {
            let mut slot = pipe.force_acquire();
            let written = pipe.write(&mut slot, b"hello");
            pipe.submit(slot);
            written
        });
        assert_eq!(written, Some(5));

        let isr = unsafe { Isr::new() };
        shared.isr(&isr, |pipe| pipe.process(&isr));
        assert_eq!(shared.lock(&cs, |pipe| pipe.is_engine_paused()), Some(true));

        let pipe = shared.take(&cs).unwrap();
        assert_eq!(pipe.transport().sent, std::vec![b"hello".to_vec()]);
        assert!(shared.take(&cs).is_none());
    }
}
