//! Driver configuration and shared public types

use crate::driver::caps::DspVariant;

/// Default base I/O address for the card.
pub const DEFAULT_BASE_PORT: u16 = 0x220;

/// Lowest sample rate any DSP generation accepts.
pub const MIN_SAMPLE_RATE: u32 = 4000;

// =============================================================================
// Engine State
// =============================================================================

/// Lifecycle state of the transfer engine.
///
/// Transitions are linear: `Idle -> Prepared -> Running -> Stopping -> Idle`.
/// Operations check the state and refuse out-of-order calls instead of
/// trusting callers to sequence correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// No transfer configured.
    Idle,
    /// Transfer parameters validated and the DSP primed; DMA not armed.
    Prepared,
    /// DMA armed and the DSP streaming.
    Running,
    /// Shutdown in progress; interrupts may still arrive.
    Stopping,
}

// =============================================================================
// Transfer Format
// =============================================================================

/// Sample width of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleWidth {
    /// 8-bit samples (unsigned by hardware convention).
    Eight,
    /// 16-bit samples (signed by hardware convention).
    Sixteen,
}

impl SampleWidth {
    /// Bytes per sample.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            SampleWidth::Eight => 1,
            SampleWidth::Sixteen => 2,
        }
    }
}

/// Direction of a streaming transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Memory to DAC.
    Playback,
    /// ADC to memory.
    Record,
}

/// ADPCM compression formats the DSP can decode in hardware.
///
/// All of them are 8-bit mono playback only. The first block of a
/// transfer carries a reference byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdpcmFormat {
    /// 2 bits per sample.
    Bits2,
    /// 2.6 bits per sample.
    Bits26,
    /// 4 bits per sample.
    Bits4,
}

/// Complete description of a requested transfer.
///
/// Built with `with_*` methods from a playback or record base:
///
/// ```ignore
/// let fmt = TransferFormat::playback(22_050)
///     .with_width(SampleWidth::Sixteen)
///     .with_stereo(true);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferFormat {
    /// Sample rate in Hz (per channel).
    pub rate: u32,
    /// Sample width.
    pub width: SampleWidth,
    /// Stereo interleaved samples.
    pub stereo: bool,
    /// Override the hardware's native signedness for this width.
    /// `None` keeps the native convention (8-bit unsigned, 16-bit signed).
    pub signed: Option<bool>,
    /// Transfer direction.
    pub direction: Direction,
    /// Hardware ADPCM decode.
    pub compression: Option<AdpcmFormat>,
    /// Play the buffer back to front (address-decrement DMA).
    pub backwards: bool,
}

impl TransferFormat {
    /// Mono 8-bit playback at the given rate.
    #[must_use]
    pub const fn playback(rate: u32) -> Self {
        Self {
            rate,
            width: SampleWidth::Eight,
            stereo: false,
            signed: None,
            direction: Direction::Playback,
            compression: None,
            backwards: false,
        }
    }

    /// Mono 8-bit recording at the given rate.
    #[must_use]
    pub const fn record(rate: u32) -> Self {
        Self {
            direction: Direction::Record,
            ..Self::playback(rate)
        }
    }

    /// Set the sample width.
    #[must_use]
    pub const fn with_width(mut self, width: SampleWidth) -> Self {
        self.width = width;
        self
    }

    /// Set stereo.
    #[must_use]
    pub const fn with_stereo(mut self, stereo: bool) -> Self {
        self.stereo = stereo;
        self
    }

    /// Force signed or unsigned samples regardless of width convention.
    #[must_use]
    pub const fn with_signed(mut self, signed: bool) -> Self {
        self.signed = Some(signed);
        self
    }

    /// Select hardware ADPCM decode.
    #[must_use]
    pub const fn with_compression(mut self, fmt: AdpcmFormat) -> Self {
        self.compression = Some(fmt);
        self
    }

    /// Play the buffer back to front.
    #[must_use]
    pub const fn with_backwards(mut self, backwards: bool) -> Self {
        self.backwards = backwards;
        self
    }

    /// Bytes per sample frame (all channels).
    #[inline]
    #[must_use]
    pub const fn frame_bytes(&self) -> u32 {
        self.width.bytes() * if self.stereo { 2 } else { 1 }
    }

    /// Total byte rate of the stream.
    #[inline]
    #[must_use]
    pub const fn byte_rate(&self) -> u32 {
        self.rate * self.frame_bytes()
    }

    /// Whether the hardware should treat samples as signed, combining the
    /// width convention with any override.
    #[inline]
    #[must_use]
    pub const fn effective_signed(&self) -> bool {
        match self.signed {
            Some(s) => s,
            None => matches!(self.width, SampleWidth::Sixteen),
        }
    }
}

// =============================================================================
// Environment Quirks
// =============================================================================

/// Host environment bugs the driver works around.
///
/// These describe the environment the driver runs under, not the card.
/// They are set by the integrator (or an external detection layer) and
/// change capability negotiation and probe behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quirks {
    /// SBOS emulation is resident. Auto-init DMA does not work under it.
    pub sbos: bool,
    /// MEGA-EM emulation is resident. Auto-init DMA does not work under it.
    pub mega_em: bool,
    /// Running under VirtualBox, whose DMA counter snaps back to the
    /// programmed value at terminal count instead of holding 0xFFFF.
    pub virtualbox: bool,
    /// Running under NTVDM, which mishandles non-power-of-two IRQ
    /// intervals on auto-init transfers.
    pub ntvdm: bool,
}

impl Quirks {
    /// No quirks.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            sbos: false,
            mega_em: false,
            virtualbox: false,
            ntvdm: false,
        }
    }

    /// Whether a resident emulator forbids auto-init DMA.
    #[inline]
    #[must_use]
    pub const fn forbids_autoinit_dma(&self) -> bool {
        self.sbos || self.mega_em
    }
}

// =============================================================================
// Driver Configuration
// =============================================================================

/// Static resource assignment and environment description for one card.
///
/// IRQ and DMA assignments left as `None` can be filled in later from the
/// probe results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SbConfig {
    /// Base I/O address.
    pub base: u16,
    /// Interrupt line.
    pub irq: Option<u8>,
    /// 8-bit DMA channel.
    pub dma8: Option<u8>,
    /// 16-bit DMA channel.
    pub dma16: Option<u8>,
    /// Environment quirks.
    pub quirks: Quirks,
    /// Force the vendor variant instead of detecting it. Needed for
    /// cards that cannot be told apart from the version pair alone
    /// (SC-6600 in particular).
    pub variant: Option<DspVariant>,
}

impl Default for SbConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SbConfig {
    /// Configuration with the default base port and nothing assigned.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base: DEFAULT_BASE_PORT,
            irq: None,
            dma8: None,
            dma16: None,
            quirks: Quirks::none(),
            variant: None,
        }
    }

    /// Set the base I/O address.
    #[must_use]
    pub const fn with_base(mut self, base: u16) -> Self {
        self.base = base;
        self
    }

    /// Assign the interrupt line.
    #[must_use]
    pub const fn with_irq(mut self, irq: u8) -> Self {
        self.irq = Some(irq);
        self
    }

    /// Assign the 8-bit DMA channel.
    #[must_use]
    pub const fn with_dma8(mut self, ch: u8) -> Self {
        self.dma8 = Some(ch);
        self
    }

    /// Assign the 16-bit DMA channel.
    #[must_use]
    pub const fn with_dma16(mut self, ch: u8) -> Self {
        self.dma16 = Some(ch);
        self
    }

    /// Set environment quirks.
    #[must_use]
    pub const fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Force the vendor variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: DspVariant) -> Self {
        self.variant = Some(variant);
        self
    }
}
