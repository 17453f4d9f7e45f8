//! 8237 DMA Channel Management
//!
//! Programs ISA DMA channels for streaming audio transfers: base address,
//! page register, transfer count, mode, and masking. The module also owns
//! the one genuinely tricky read on this controller, the live transfer
//! counter, which has no atomic 16-bit access and must be sampled through
//! a byte flip-flop while it counts down underneath the reads.
//!
//! Nothing here is Sound Blaster specific; the driver layer decides which
//! channel to program and when.

mod buffer;

pub use buffer::{alloc_buffer, DmaBuffer};

use crate::error::{DmaError, DmaResult};
use crate::hal::IsaBus;
use crate::register::dma;

/// Resample budget for the transfer counter read. Each retry is two port
/// reads, so the worst case stays well under a microsecond of bus time.
const COUNT_READ_PATIENCE: u8 = 32;

// =============================================================================
// Bus Capabilities
// =============================================================================

/// Static facts about the DMA subsystem of the host machine.
///
/// Channel geometry differs between machine generations: XT-class machines
/// have only the primary controller and a different page register map,
/// and some chipsets give 16-bit channels a full 128 KiB reach by wiring
/// the page register's low bit around the word shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusCapabilities {
    /// Page register port per channel.
    page_ports: [u16; 8],
    /// Bitmask of channels whose address and count are programmed in
    /// 16-bit words rather than bytes.
    word_channels: u8,
    /// Whether word channels can span 128 KiB without a page carry.
    wide_word_reach: bool,
}

impl BusCapabilities {
    /// Capabilities of a standard AT-class machine: both controllers,
    /// channels 4-7 word-wide with a 64 KiB word (128 KiB byte) reach
    /// left off until detected.
    #[must_use]
    pub const fn at() -> Self {
        Self {
            page_ports: dma::PAGE_PORT_AT,
            word_channels: 0xF0,
            wide_word_reach: false,
        }
    }

    /// Capabilities of an XT-class machine: primary controller only.
    #[must_use]
    pub const fn xt() -> Self {
        Self {
            page_ports: dma::PAGE_PORT_XT,
            word_channels: 0x00,
            wide_word_reach: false,
        }
    }

    /// Detect the DMA subsystem.
    ///
    /// The secondary controller is probed by writing a pattern to one of
    /// its count registers and reading it back; address decode that is
    /// not there returns bus float (0xFF) for both bytes.
    pub fn detect(bus: &mut impl IsaBus) -> Self {
        let port = dma::count_port(6);
        bus.outb(dma::SECONDARY_FLIPFLOP, 0);
        bus.outb(port, 0x55);
        bus.outb(port, 0x1A);
        bus.outb(dma::SECONDARY_FLIPFLOP, 0);
        let lo = bus.inb(port);
        let hi = bus.inb(port);
        if lo == 0x55 && hi == 0x1A {
            Self::at()
        } else {
            Self::xt()
        }
    }

    /// Mark word channels as having a 128 KiB reach.
    #[must_use]
    pub const fn with_wide_word_reach(mut self) -> Self {
        self.wide_word_reach = true;
        self
    }

    /// Whether `ch` is programmed in words.
    #[inline]
    #[must_use]
    pub const fn is_word_channel(&self, ch: u8) -> bool {
        self.word_channels & (1 << ch) != 0
    }

    /// Address shift for `ch`: 1 for word channels, 0 for byte channels.
    #[inline]
    #[must_use]
    pub const fn shift(&self, ch: u8) -> u8 {
        if self.is_word_channel(ch) { 1 } else { 0 }
    }

    /// Span `ch` can transfer across without carrying into the page
    /// register, as a byte-address mask.
    #[inline]
    #[must_use]
    pub const fn limit_mask(&self, ch: u8) -> u32 {
        if self.is_word_channel(ch) && self.wide_word_reach {
            dma::LIMIT_MASK_16BIT_128K
        } else {
            dma::LIMIT_MASK_8BIT
        }
    }

    /// Page register port of `ch`.
    #[inline]
    #[must_use]
    pub const fn page_port(&self, ch: u8) -> u16 {
        self.page_ports[ch as usize & 7]
    }

    /// Whether `ch` exists and can carry data on this machine.
    #[must_use]
    pub const fn has_channel(&self, ch: u8) -> bool {
        if ch >= 8 || ch == 4 {
            return false;
        }
        // Channels 5-7 need the secondary controller, whose presence is
        // what the word mask records.
        ch < 4 || self.word_channels != 0
    }
}

// =============================================================================
// Transfer Direction
// =============================================================================

/// Direction of a DMA transfer relative to memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaDirection {
    /// Memory to device (playback).
    MemoryToDevice,
    /// Device to memory (recording).
    DeviceToMemory,
}

// =============================================================================
// Channel Programming
// =============================================================================

/// Programming interface for one controller pair.
///
/// Stateless apart from the bus capabilities; every method takes the bus
/// explicitly so the caller controls interleaving with DSP commands.
#[derive(Debug, Clone, Copy)]
pub struct DmaController {
    caps: BusCapabilities,
}

impl DmaController {
    /// Create a controller interface over the given capabilities.
    #[must_use]
    pub const fn new(caps: BusCapabilities) -> Self {
        Self { caps }
    }

    /// Capabilities this interface was built with.
    #[must_use]
    pub const fn capabilities(&self) -> &BusCapabilities {
        &self.caps
    }

    fn check_channel(&self, ch: u8) -> DmaResult<()> {
        if self.caps.has_channel(ch) {
            Ok(())
        } else {
            Err(DmaError::InvalidChannel)
        }
    }

    /// Mask (disable) a channel.
    pub fn mask(&self, bus: &mut impl IsaBus, ch: u8) -> DmaResult<()> {
        self.check_channel(ch)?;
        bus.outb(dma::single_mask_port(ch), dma::mask_channel(ch) | dma::MASK_SET);
        Ok(())
    }

    /// Unmask (enable) a channel.
    pub fn unmask(&self, bus: &mut impl IsaBus, ch: u8) -> DmaResult<()> {
        self.check_channel(ch)?;
        bus.outb(dma::single_mask_port(ch), dma::mask_channel(ch));
        Ok(())
    }

    /// Program single-transfer mode on a channel.
    pub fn set_single_mode(
        &self,
        bus: &mut impl IsaBus,
        ch: u8,
        direction: DmaDirection,
        autoinit: bool,
        decrement: bool,
    ) -> DmaResult<()> {
        self.check_channel(ch)?;
        let mut mode = dma::mode_channel(ch) | dma::MODE_SEL_SINGLE;
        mode |= match direction {
            DmaDirection::MemoryToDevice => dma::MODE_XFER_READ,
            DmaDirection::DeviceToMemory => dma::MODE_XFER_WRITE,
        };
        if autoinit {
            mode |= dma::MODE_AUTOINIT;
        }
        if decrement {
            mode |= dma::MODE_ADDR_DECREMENT;
        }
        bus.outb(dma::mode_port(ch), mode);
        Ok(())
    }

    /// Program the base address and page register from a physical byte
    /// address. Word channels store the address in words; the page
    /// register always holds the byte-address page.
    pub fn write_base(&self, bus: &mut impl IsaBus, ch: u8, phys: u32) -> DmaResult<()> {
        self.check_channel(ch)?;
        let addr = (phys >> self.caps.shift(ch)) as u16;
        bus.outb(self.caps.page_port(ch), (phys >> 16) as u8);
        bus.outb(dma::flipflop_port(ch), 0);
        let port = dma::base_port(ch);
        bus.outb(port, addr as u8);
        bus.outb(port, (addr >> 8) as u8);
        Ok(())
    }

    /// Program the transfer count from a length in bytes.
    ///
    /// The register convention is units minus one, where a unit is a byte
    /// or a word depending on the channel.
    pub fn write_count(&self, bus: &mut impl IsaBus, ch: u8, bytes: u32) -> DmaResult<()> {
        self.check_channel(ch)?;
        let shift = self.caps.shift(ch);
        let units = bytes >> shift;
        if units == 0 || units > 0x1_0000 {
            return Err(DmaError::InvalidLength);
        }
        let reg = (units - 1) as u16;
        bus.outb(dma::flipflop_port(ch), 0);
        let port = dma::count_port(ch);
        bus.outb(port, reg as u8);
        bus.outb(port, (reg >> 8) as u8);
        Ok(())
    }

    /// Read the live transfer count register.
    ///
    /// The two byte halves cannot be latched together and the counter
    /// keeps running between reads, so a single sample can tear across a
    /// low-byte wraparound. The counter only ever decreases (or jumps to
    /// 0xFFFF at terminal count), which gives a consistency rule: sample
    /// pairs until two consecutive samples agree in the high byte and do
    /// not increase, or the budget runs out, in which case the last
    /// sample is taken as-is.
    pub fn read_count_register(&self, bus: &mut impl IsaBus, ch: u8) -> DmaResult<u16> {
        self.check_channel(ch)?;
        let port = dma::count_port(ch);
        bus.outb(dma::flipflop_port(ch), 0);

        let sample = |bus: &mut dyn IsaBus| -> u16 {
            let lo = bus.inb(port);
            let hi = bus.inb(port);
            u16::from(lo) | (u16::from(hi) << 8)
        };

        let mut prev = sample(bus);
        let mut patience = COUNT_READ_PATIENCE;
        loop {
            let cur = sample(bus);
            if cur == dma::TERMINAL_COUNT {
                return Ok(cur);
            }
            let consistent = (cur >> 8) == (prev >> 8) && cur <= prev;
            if consistent {
                return Ok(cur);
            }
            prev = cur;
            patience -= 1;
            if patience == 0 {
                // Counter is moving faster than we can sample it. The
                // last sample is as good as any.
                return Ok(cur);
            }
        }
    }

    /// Bytes left in the current transfer. Terminal count reads as zero.
    pub fn remaining_bytes(&self, bus: &mut impl IsaBus, ch: u8) -> DmaResult<u32> {
        let reg = self.read_count_register(bus, ch)?;
        if reg == dma::TERMINAL_COUNT {
            return Ok(0);
        }
        Ok((u32::from(reg) + 1) << self.caps.shift(ch))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
