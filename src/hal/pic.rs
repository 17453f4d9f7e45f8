//! 8259 Interrupt Controller Operations
//!
//! The IRQ probe needs to silence every line, watch the interrupt request
//! register, and then put the mask registers back exactly as it found them
//! no matter how it exits. [`PicMaskSnapshot`] captures the state and
//! [`InterruptMaskGuard`] ties the restore to scope exit so an early
//! return cannot leave lines masked.

use crate::hal::IsaBus;
use crate::register::pic;

/// Saved state of both interrupt mask registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PicMaskSnapshot {
    /// Master controller mask (lines 0-7)
    pub master: u8,
    /// Slave controller mask (lines 8-15)
    pub slave: u8,
}

impl PicMaskSnapshot {
    /// Read both mask registers.
    pub fn capture(bus: &mut impl IsaBus) -> Self {
        Self {
            master: bus.inb(pic::MASTER_DATA),
            slave: bus.inb(pic::SLAVE_DATA),
        }
    }

    /// Write both mask registers back.
    pub fn restore(self, bus: &mut impl IsaBus) {
        bus.outb(pic::MASTER_DATA, self.master);
        bus.outb(pic::SLAVE_DATA, self.slave);
    }
}

/// Masks every interrupt line for the duration of a closure and restores
/// the saved masks on every exit path, including `?` and early returns.
pub struct InterruptMaskGuard;

impl InterruptMaskGuard {
    /// Run `f` with all lines masked. Masks are restored before this
    /// returns, whatever `f` did to them in the meantime.
    pub fn with_all_masked<B: IsaBus, R>(bus: &mut B, f: impl FnOnce(&mut B) -> R) -> R {
        let saved = PicMaskSnapshot::capture(bus);
        bus.outb(pic::MASTER_DATA, 0xFF);
        bus.outb(pic::SLAVE_DATA, 0xFF);
        let result = f(bus);
        saved.restore(bus);
        result
    }
}

/// Read the interrupt request register of the controller owning `irq` and
/// report whether that line is pending.
pub fn irq_pending(bus: &mut impl IsaBus, irq: u8) -> bool {
    let cmd = pic::cmd_port(irq);
    bus.outb(cmd, pic::OCW3_READ_IRR);
    let irr = bus.inb(cmd);
    irr & (1 << (irq & 7)) != 0
}

/// Read the raw IRR of the controller owning `irq`.
pub fn read_irr(bus: &mut impl IsaBus, irq: u8) -> u8 {
    let cmd = pic::cmd_port(irq);
    bus.outb(cmd, pic::OCW3_READ_IRR);
    bus.inb(cmd)
}

/// Unmask a single line, leaving all others untouched.
pub fn unmask_irq(bus: &mut impl IsaBus, irq: u8) {
    let data = pic::data_port(irq);
    let mask = bus.inb(data);
    bus.outb(data, mask & !(1 << (irq & 7)));
}

/// Mask a single line, leaving all others untouched.
pub fn mask_irq(bus: &mut impl IsaBus, irq: u8) {
    let data = pic::data_port(irq);
    let mask = bus.inb(data);
    bus.outb(data, mask | (1 << (irq & 7)));
}

/// Issue a non-specific end-of-interrupt for `irq`. Lines on the slave
/// controller need an EOI at both controllers.
pub fn send_eoi(bus: &mut impl IsaBus, irq: u8) {
    if irq >= 8 {
        bus.outb(pic::SLAVE_CMD, pic::OCW2_NONSPECIFIC_EOI);
    }
    bus.outb(pic::MASTER_CMD, pic::OCW2_NONSPECIFIC_EOI);
}
