//! ISA Port I/O Bus Trait

/// Byte-wide I/O port access.
///
/// Implementations wrap whatever port access the hosting environment
/// provides (`in`/`out` instructions, an emulator's port map, an ioperm'd
/// process). Accesses must not be reordered or elided; the 8237 flip-flop
/// and DSP handshake protocols depend on every access happening exactly
/// once and in order.
pub trait IsaBus {
    /// Read a byte from an I/O port.
    fn inb(&mut self, port: u16) -> u8;

    /// Write a byte to an I/O port.
    fn outb(&mut self, port: u16, value: u8);
}

impl<T: IsaBus + ?Sized> IsaBus for &mut T {
    #[inline]
    fn inb(&mut self, port: u16) -> u8 {
        T::inb(self, port)
    }

    #[inline]
    fn outb(&mut self, port: u16, value: u8) {
        T::outb(self, port, value)
    }
}
