//! Sound Blaster DSP Register and Command Definitions
//!
//! The DSP is a command/response protocol behind a handful of ports at an
//! offset from the card's base I/O address. Commands span six incompatible
//! hardware generations; which family is usable is decided by the
//! capability negotiator in [`crate::driver::caps`], never here.

// =============================================================================
// Port Offsets (from base I/O address, e.g. 0x220)
// =============================================================================

/// Mixer index register
pub const MIXER_INDEX: u16 = 0x4;
/// Mixer data register
pub const MIXER_DATA: u16 = 0x5;
/// DSP reset port
pub const RESET: u16 = 0x6;
/// DSP read data port
pub const READ_DATA: u16 = 0xA;
/// DSP write command/data port; reading it yields write-busy status
pub const WRITE: u16 = 0xC;
/// DSP read status port; bit 7 = data available. Reading also acknowledges
/// the 8-bit interrupt latch.
pub const READ_STATUS: u16 = 0xE;
/// 16-bit interrupt acknowledge port (DSP 4.xx)
pub const READ_STATUS16: u16 = 0xF;

/// Write port busy bit (in the value read back from [`WRITE`])
pub const WRITE_BUSY: u8 = 0x80;
/// Read data available bit (in the value read from [`READ_STATUS`])
pub const DATA_AVAILABLE: u8 = 0x80;
/// Byte the DSP returns from the read data port after a successful reset
pub const RESET_READY: u8 = 0xAA;

// =============================================================================
// Command Bytes
// =============================================================================

/// Direct 8-bit DAC output (one sample per command)
pub const CMD_DIRECT_DAC_OUT: u8 = 0x10;
/// Direct 8-bit ADC input
pub const CMD_DIRECT_ADC_IN: u8 = 0x20;
/// 8-bit single-cycle DMA output
pub const CMD_SINGLE_OUT: u8 = 0x14;
/// 8-bit single-cycle DMA input
pub const CMD_SINGLE_IN: u8 = 0x24;
/// 8-bit auto-init DMA output (DSP 2.00+)
pub const CMD_AUTOINIT_OUT: u8 = 0x1C;
/// 8-bit auto-init DMA input (DSP 2.00+)
pub const CMD_AUTOINIT_IN: u8 = 0x2C;

/// High-speed auto-init output (DSP 2.01-3.xx)
pub const CMD_HISPEED_AUTOINIT_OUT: u8 = 0x90;
/// High-speed single-cycle output (DSP 2.01-3.xx)
pub const CMD_HISPEED_SINGLE_OUT: u8 = 0x91;
/// High-speed auto-init input (DSP 2.01-3.xx)
pub const CMD_HISPEED_AUTOINIT_IN: u8 = 0x98;
/// High-speed single-cycle input (DSP 2.01-3.xx)
pub const CMD_HISPEED_SINGLE_IN: u8 = 0x99;

/// 2-bit ADPCM single-cycle
pub const CMD_ADPCM_2BIT: u8 = 0x16;
/// 2-bit ADPCM single-cycle with reference byte
pub const CMD_ADPCM_2BIT_REF: u8 = 0x17;
/// 2-bit ADPCM auto-init with reference byte
pub const CMD_ADPCM_2BIT_AUTOINIT: u8 = 0x1F;
/// 4-bit ADPCM single-cycle
pub const CMD_ADPCM_4BIT: u8 = 0x74;
/// 4-bit ADPCM single-cycle with reference byte
pub const CMD_ADPCM_4BIT_REF: u8 = 0x75;
/// 4-bit ADPCM auto-init with reference byte
pub const CMD_ADPCM_4BIT_AUTOINIT: u8 = 0x7D;
/// 2.6-bit ADPCM single-cycle
pub const CMD_ADPCM_26BIT: u8 = 0x76;
/// 2.6-bit ADPCM single-cycle with reference byte
pub const CMD_ADPCM_26BIT_REF: u8 = 0x77;
/// 2.6-bit ADPCM auto-init with reference byte
pub const CMD_ADPCM_26BIT_AUTOINIT: u8 = 0x7F;

/// Set time constant (followed by one byte)
pub const CMD_SET_TIME_CONSTANT: u8 = 0x40;
/// Set output sample rate in Hz, high byte first (DSP 4.xx)
pub const CMD_SET_OUTPUT_RATE: u8 = 0x41;
/// Set input sample rate in Hz, high byte first (DSP 4.xx)
pub const CMD_SET_INPUT_RATE: u8 = 0x42;
/// Set DMA block transfer size, low byte first
pub const CMD_SET_BLOCK_SIZE: u8 = 0x48;

/// DSP 4.xx 16-bit transfer command base; OR in [`fifo4xx`] bits
pub const CMD_4XX_16BIT: u8 = 0xB0;
/// DSP 4.xx 8-bit transfer command base; OR in [`fifo4xx`] bits
pub const CMD_4XX_8BIT: u8 = 0xC0;

/// Modifier bits for the DSP 4.xx command/mode pair
pub mod fifo4xx {
    /// Command bit: enable the FIFO
    pub const CMD_FIFO: u8 = 0x02;
    /// Command bit: auto-init transfer
    pub const CMD_AUTOINIT: u8 = 0x04;
    /// Command bit: record (A/D) instead of playback (D/A)
    pub const CMD_RECORD: u8 = 0x08;
    /// Mode byte bit: signed samples
    pub const MODE_SIGNED: u8 = 0x10;
    /// Mode byte bit: stereo
    pub const MODE_STEREO: u8 = 0x20;
}

/// Pause 8-bit DMA
pub const CMD_PAUSE_DMA: u8 = 0xD0;
/// Speaker on
pub const CMD_SPEAKER_ON: u8 = 0xD1;
/// Speaker off
pub const CMD_SPEAKER_OFF: u8 = 0xD3;
/// Continue 8-bit DMA
pub const CMD_CONTINUE_DMA: u8 = 0xD4;
/// Exit 16-bit auto-init (DSP 4.xx)
pub const CMD_EXIT_AUTOINIT_16: u8 = 0xD9;
/// Exit 8-bit auto-init (DSP 2.00+)
pub const CMD_EXIT_AUTOINIT_8: u8 = 0xDA;

/// Query DSP version; returns major then minor
pub const CMD_GET_VERSION: u8 = 0xE1;
/// Read copyright string; returns NUL-terminated ASCII
pub const CMD_GET_COPYRIGHT: u8 = 0xE3;
/// Vendor command: raise the card's interrupt line (used for IRQ probing)
pub const CMD_FORCE_IRQ: u8 = 0xF2;

/// Set record source mono (Sound Blaster Pro)
pub const CMD_RECORD_MONO: u8 = 0xA0;
/// Set record source stereo (Sound Blaster Pro)
pub const CMD_RECORD_STEREO: u8 = 0xA8;

// =============================================================================
// Mixer Registers
// =============================================================================

/// Pro-mixer output control: bit 1 = stereo, bit 5 = output filter bypass
pub const MIXER_OUTPUT_CONTROL: u8 = 0x0E;

// =============================================================================
// ESS Extended Register Window
// =============================================================================

/// ESS chipsets expose an indexed configuration window behind the DSP
/// command port: registers 0xA0-0xBF are written as `reg, value` command
/// pairs and read back by prefixing the register with [`ESS_READ_PREFIX`].
pub const ESS_READ_PREFIX: u8 = 0xC0;

/// ESS register indices used by the extended-register playback path
pub mod ess {
    /// Sample rate divisor
    pub const SAMPLE_RATE: u8 = 0xA1;
    /// Filter divisor (roughly 80% of half the sample rate)
    pub const FILTER_RATE: u8 = 0xA2;
    /// DMA transfer count, low byte (two's complement of length)
    pub const XFER_COUNT_LO: u8 = 0xA4;
    /// DMA transfer count, high byte
    pub const XFER_COUNT_HI: u8 = 0xA5;
    /// Analog control: mono/stereo select and record monitor
    pub const ANALOG_CONTROL: u8 = 0xA8;
    /// IRQ control
    pub const IRQ_CONTROL: u8 = 0xB1;
    /// DRQ control
    pub const DRQ_CONTROL: u8 = 0xB2;
    /// Audio format: FIFO load, sign, stereo, width
    pub const AUDIO_FORMAT: u8 = 0xB7;
    /// Audio control: DMA/FIFO enable (bit 0), auto-init (bit 2),
    /// ADC direction (bits 1,3)
    pub const AUDIO_CONTROL: u8 = 0xB8;
    /// DMA demand-transfer burst length select
    pub const DEMAND_BURST: u8 = 0xB9;
}

// =============================================================================
// Rate Conversion
// =============================================================================

/// Time constant for a total byte rate (rate x channels), pre-4.xx DSPs.
///
/// The hardware convention is `256 - 1_000_000 / rate`, computed here the
/// way the DSP documentation states it to keep rounding identical.
#[inline]
pub const fn time_constant(total_rate: u32) -> u8 {
    ((65_536u32.wrapping_sub(256_000_000 / total_rate)) >> 8) as u8
}

/// Sample rate a time constant decodes back to
#[inline]
pub const fn time_constant_to_rate(tc: u8) -> u32 {
    1_000_000 / (256 - tc as u32)
}
