//! DSP Command/Response Protocol
//!
//! Everything the DSP does goes through a two-port handshake: poll the
//! write port until bit 7 clears before writing a byte, poll the read
//! status port until bit 7 sets before reading one. [`DspPort`] wraps
//! that handshake with bounded waits and builds the handful of compound
//! exchanges on top (reset, version query, copyright string, the ESS
//! register window).

use embedded_hal::delay::DelayNs;

use crate::error::{IoError, IoResult};
use crate::hal::IsaBus;
use crate::register::dsp;

/// Polls of the write-busy bit before giving up, at 1 us apart.
const WRITE_PATIENCE: u32 = 1000;

/// Polls of the data-available bit before giving up, at 10 us apart.
const READ_PATIENCE: u32 = 1000;

/// Polls for the reset ready byte, at 10 us apart.
const RESET_PATIENCE: u32 = 100;

/// Reset attempts when the version query keeps answering 0xAA 0xAA.
const VERSION_RETRIES: u32 = 3;

/// Width of the reset pulse in microseconds. The DSP wants at least 3.
const RESET_PULSE_US: u32 = 20;

/// One card's DSP behind its base I/O address.
#[derive(Debug, Clone, Copy)]
pub struct DspPort {
    base: u16,
}

impl DspPort {
    /// DSP at the given base I/O address.
    #[must_use]
    pub const fn new(base: u16) -> Self {
        Self { base }
    }

    /// Base I/O address.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> u16 {
        self.base
    }

    #[inline]
    const fn port(&self, offset: u16) -> u16 {
        self.base + offset
    }

    // -------------------------------------------------------------------------
    // Core handshake
    // -------------------------------------------------------------------------

    /// Reset the DSP and wait for the ready byte.
    pub fn reset(&self, bus: &mut impl IsaBus, delay: &mut impl DelayNs) -> IoResult<()> {
        bus.outb(self.port(dsp::RESET), 1);
        delay.delay_us(RESET_PULSE_US);
        bus.outb(self.port(dsp::RESET), 0);

        for _ in 0..RESET_PATIENCE {
            if bus.inb(self.port(dsp::READ_STATUS)) & dsp::DATA_AVAILABLE != 0 {
                return if bus.inb(self.port(dsp::READ_DATA)) == dsp::RESET_READY {
                    Ok(())
                } else {
                    Err(IoError::ResetFailed)
                };
            }
            delay.delay_us(10);
        }
        Err(IoError::ResetFailed)
    }

    /// Write one command or argument byte.
    pub fn write(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        value: u8,
    ) -> IoResult<()> {
        for _ in 0..WRITE_PATIENCE {
            if bus.inb(self.port(dsp::WRITE)) & dsp::WRITE_BUSY == 0 {
                bus.outb(self.port(dsp::WRITE), value);
                return Ok(());
            }
            delay.delay_us(1);
        }
        Err(IoError::Timeout)
    }

    /// Read one response byte.
    pub fn read(&self, bus: &mut impl IsaBus, delay: &mut impl DelayNs) -> IoResult<u8> {
        for _ in 0..READ_PATIENCE {
            if bus.inb(self.port(dsp::READ_STATUS)) & dsp::DATA_AVAILABLE != 0 {
                return Ok(bus.inb(self.port(dsp::READ_DATA)));
            }
            delay.delay_us(10);
        }
        Err(IoError::Timeout)
    }

    /// Whether a response byte is waiting, without consuming anything
    /// beyond the status read itself.
    pub fn data_available(&self, bus: &mut impl IsaBus) -> bool {
        bus.inb(self.port(dsp::READ_STATUS)) & dsp::DATA_AVAILABLE != 0
    }

    /// Acknowledge the 8-bit transfer interrupt latch.
    pub fn ack_interrupt(&self, bus: &mut impl IsaBus) {
        let _ = bus.inb(self.port(dsp::READ_STATUS));
    }

    /// Acknowledge the 16-bit transfer interrupt latch.
    pub fn ack_interrupt_16(&self, bus: &mut impl IsaBus) {
        let _ = bus.inb(self.port(dsp::READ_STATUS16));
    }

    // -------------------------------------------------------------------------
    // Compound exchanges
    // -------------------------------------------------------------------------

    /// Query the DSP version.
    ///
    /// A freshly reset DSP sometimes still has the reset ready byte in
    /// its output register, which makes the query read back 0xAA 0xAA.
    /// That pair is no real version, so it triggers a reset and a
    /// bounded retry.
    pub fn version(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
    ) -> IoResult<(u8, u8)> {
        for _ in 0..=VERSION_RETRIES {
            self.write(bus, delay, dsp::CMD_GET_VERSION)?;
            let major = self.read(bus, delay)?;
            let minor = self.read(bus, delay)?;
            if (major, minor) != (dsp::RESET_READY, dsp::RESET_READY) {
                return Ok((major, minor));
            }
            self.reset(bus, delay)?;
        }
        Err(IoError::VersionImplausible)
    }

    /// Read the copyright string into `buf`, returning its length without
    /// the terminator.
    ///
    /// Only safe on DSP 3.xx and later; older and emulated DSPs take the
    /// command destructively. The caller gates on the version. A timeout
    /// waiting for the next byte ends the string, since short responses
    /// are how clones answer.
    pub fn copyright(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        buf: &mut [u8],
    ) -> IoResult<usize> {
        self.write(bus, delay, dsp::CMD_GET_COPYRIGHT)?;
        let mut len = 0;
        while len < buf.len() {
            match self.read(bus, delay) {
                Ok(0) | Err(IoError::Timeout) => break,
                Ok(b) => {
                    buf[len] = b;
                    len += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(len)
    }

    /// Ask the card to raise its interrupt line.
    pub fn force_irq(&self, bus: &mut impl IsaBus, delay: &mut impl DelayNs) -> IoResult<()> {
        self.write(bus, delay, dsp::CMD_FORCE_IRQ)
    }

    // -------------------------------------------------------------------------
    // Mixer window
    // -------------------------------------------------------------------------

    /// Read a mixer register.
    pub fn mixer_read(&self, bus: &mut impl IsaBus, index: u8) -> u8 {
        bus.outb(self.port(dsp::MIXER_INDEX), index);
        bus.inb(self.port(dsp::MIXER_DATA))
    }

    /// Write a mixer register.
    pub fn mixer_write(&self, bus: &mut impl IsaBus, index: u8, value: u8) {
        bus.outb(self.port(dsp::MIXER_INDEX), index);
        bus.outb(self.port(dsp::MIXER_DATA), value);
    }

    // -------------------------------------------------------------------------
    // ESS extended register window
    // -------------------------------------------------------------------------

    /// Write an ESS extended register.
    pub fn ess_write(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        reg: u8,
        value: u8,
    ) -> IoResult<()> {
        self.write(bus, delay, reg)?;
        self.write(bus, delay, value)
    }

    /// Read an ESS extended register.
    pub fn ess_read(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        reg: u8,
    ) -> IoResult<u8> {
        self.write(bus, delay, dsp::ESS_READ_PREFIX)?;
        self.write(bus, delay, reg)?;
        self.read(bus, delay)
    }

    /// Read-modify-write an ESS extended register.
    pub fn ess_update(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        reg: u8,
        set: u8,
        clear: u8,
    ) -> IoResult<()> {
        let cur = self.ess_read(bus, delay, reg)?;
        self.ess_write(bus, delay, reg, (cur | set) & !clear)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
