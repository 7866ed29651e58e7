//! Volatile FIFO data register

use core::cell::UnsafeCell;

use crate::fifo::FifoWindow;

/// An endpoint FIFO data register
///
/// A word access moves four bytes through the FIFO. A byte access, through the
/// lowest address of the register, moves one.
#[repr(transparent)]
pub struct FifoCell(UnsafeCell<u32>);

impl FifoCell {
    fn byte(&self) -> *mut u8 {
        self.0.get().cast()
    }
}

impl FifoWindow for FifoCell {
    fn write_word(&self, word: u32) {
        unsafe { self.0.get().write_volatile(word) }
    }
    fn write_byte(&self, byte: u8) {
        unsafe { self.byte().write_volatile(byte) }
    }
    fn read_word(&self) -> u32 {
        unsafe { self.0.get().read_volatile() }
    }
    fn read_byte(&self) -> u8 {
        unsafe { self.byte().read_volatile() }
    }
}
