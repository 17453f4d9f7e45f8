//! 8259 Interrupt Controller Register Definitions
//!
//! Two cascaded 8259s serve lines 0-7 (master) and 8-15 (slave). Probing
//! needs three operations: reading/writing the interrupt mask register,
//! reading the interrupt request register (IRR) via OCW3, and issuing a
//! non-specific end-of-interrupt via OCW2.

/// Master PIC command port (lines 0-7)
pub const MASTER_CMD: u16 = 0x20;
/// Master PIC data port (mask register)
pub const MASTER_DATA: u16 = 0x21;
/// Slave PIC command port (lines 8-15)
pub const SLAVE_CMD: u16 = 0xA0;
/// Slave PIC data port (mask register)
pub const SLAVE_DATA: u16 = 0xA1;

/// OCW3: select IRR for the next status read
pub const OCW3_READ_IRR: u8 = 0x0A;
/// OCW3: select ISR for the next status read
pub const OCW3_READ_ISR: u8 = 0x0B;
/// OCW2: non-specific end of interrupt
pub const OCW2_NONSPECIFIC_EOI: u8 = 0x20;

/// Command port of the controller owning `irq`
#[inline]
pub const fn cmd_port(irq: u8) -> u16 {
    if irq < 8 { MASTER_CMD } else { SLAVE_CMD }
}

/// Data (mask) port of the controller owning `irq`
#[inline]
pub const fn data_port(irq: u8) -> u16 {
    if irq < 8 { MASTER_DATA } else { SLAVE_DATA }
}
