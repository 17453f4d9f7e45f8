//! Capability Negotiation
//!
//! Six DSP generations, three vendor variants, and a handful of resident
//! emulators all change what a given card can actually do. This module
//! turns the version pair, the detected variant, and the environment
//! quirks into one [`DspCapabilities`] record, and resolves the single
//! [`PlaybackMethod`] a transfer will use. Both are computed once at
//! init; nothing downstream re-derives them.

use crate::driver::config::Quirks;

/// Vendor variant of the DSP, beyond the plain version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DspVariant {
    /// Creative (or faithful clone) DSP.
    Standard,
    /// ESS AudioDrive: 3.xx version report with the extended register
    /// window and higher rate limits.
    Ess,
    /// Aztech SC-6600: 3.xx version report with the 4.xx command family.
    Sc6600,
}

/// Strategy for driving a playback or record transfer, resolved once
/// from the capability record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackMethod {
    /// No DMA channel; samples go out one direct-DAC command at a time.
    Direct,
    /// Single-cycle DMA and single-cycle DSP commands, re-issued per
    /// block (DSP 1.xx, and anything under an emulator that breaks
    /// auto-init).
    SingleCycle,
    /// Auto-init DMA with single-cycle DSP commands re-armed on each
    /// block interrupt (DSP 2.00, which lacks the auto-init command).
    ReArmed,
    /// Auto-init DMA and auto-init DSP commands (DSP 2.01+).
    AutoInit,
    /// Auto-init with the high-speed command family above the rate
    /// threshold (DSP 3.xx).
    HighSpeed,
    /// ESS extended-register programming.
    ExtendedRegister,
    /// DSP 4.xx FIFO command family.
    FifoAutoInit,
}

/// Everything a transfer request is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DspCapabilities {
    /// DSP version (major, minor).
    pub version: (u8, u8),
    /// Vendor variant.
    pub variant: DspVariant,
    /// Highest playback sample rate.
    pub max_play_rate: u32,
    /// Highest record sample rate.
    pub max_rec_rate: u32,
    /// Playback rate at or above which the high-speed command family is
    /// required (3.xx and older).
    pub hispeed_play_threshold: u32,
    /// Record rate at or above which the high-speed family is required.
    pub hispeed_rec_threshold: u32,
    /// The high-speed family changes behavior on this DSP at all; the
    /// 4.xx rate commands and the ESS window cover their whole range
    /// without it.
    pub hispeed_matters: bool,
    /// A high-speed transfer leaves the DSP deaf to further commands
    /// until reset.
    pub hispeed_blocking: bool,
    /// Highest rate the direct-DAC path can keep up with.
    pub max_direct_rate: u32,
    /// The DSP understands the auto-init transfer commands.
    pub has_autoinit_command: bool,
    /// Auto-init DMA is usable in this environment.
    pub autoinit_dma_allowed: bool,
    /// The DSP has a 16-bit transfer path.
    pub can_16bit: bool,
    /// The DSP has a stereo path.
    pub can_stereo: bool,
    /// ADPCM decode can run under auto-init.
    pub adpcm_autoinit: bool,
}

impl DspCapabilities {
    /// Build the capability record for a detected DSP.
    #[must_use]
    pub fn negotiate(version: (u8, u8), variant: DspVariant, quirks: &Quirks) -> Self {
        let (major, minor) = version;

        let mut caps = Self {
            version,
            variant,
            max_play_rate: 23_000,
            max_rec_rate: 13_000,
            hispeed_play_threshold: 23_000,
            hispeed_rec_threshold: 13_000,
            hispeed_matters: true,
            hispeed_blocking: true,
            max_direct_rate: 24_000,
            has_autoinit_command: !(major < 2 || (major == 2 && minor == 0)),
            autoinit_dma_allowed: true,
            can_16bit: false,
            can_stereo: false,
            adpcm_autoinit: true,
        };

        match (major, variant) {
            (4.., _) => {
                let top = if minor > 5 { 48_000 } else { 44_100 };
                caps.max_play_rate = top;
                caps.max_rec_rate = top;
                caps.can_16bit = true;
                caps.can_stereo = true;
                // The 4.xx family takes literal rates; no high-speed
                // switchover exists.
                caps.hispeed_play_threshold = u32::MAX;
                caps.hispeed_rec_threshold = u32::MAX;
                caps.hispeed_matters = false;
                caps.hispeed_blocking = false;
            }
            (3, DspVariant::Ess) => {
                caps.max_play_rate = 48_000;
                caps.max_rec_rate = 48_000;
                caps.can_16bit = true;
                caps.can_stereo = true;
                caps.hispeed_play_threshold = u32::MAX;
                caps.hispeed_rec_threshold = u32::MAX;
                caps.hispeed_matters = false;
                caps.hispeed_blocking = false;
                caps.adpcm_autoinit = false;
            }
            (3, DspVariant::Sc6600) => {
                caps.max_play_rate = 44_100;
                caps.max_rec_rate = 44_100;
                caps.can_16bit = true;
                caps.can_stereo = true;
                caps.hispeed_play_threshold = 25_000;
                caps.hispeed_rec_threshold = 25_000;
            }
            (3, DspVariant::Standard) => {
                caps.max_play_rate = 44_100;
                caps.max_rec_rate = 15_000;
                caps.can_stereo = true;
            }
            (2, _) if minor > 0 => {
                caps.max_play_rate = 44_100;
                caps.max_rec_rate = 15_000;
                // The 2.2 chip switches to high-speed earlier.
                if minor == 2 {
                    caps.hispeed_play_threshold = 16_000;
                    caps.hispeed_rec_threshold = 8_000;
                }
            }
            _ => {
                // 2.00 and 1.xx: no high-speed family at all.
                caps.hispeed_play_threshold = u32::MAX;
                caps.hispeed_rec_threshold = u32::MAX;
                caps.hispeed_matters = false;
                caps.hispeed_blocking = false;
            }
        }

        if quirks.forbids_autoinit_dma() {
            caps.autoinit_dma_allowed = false;
        }

        caps
    }

    /// Resolve the transfer strategy, fixed for the life of the session.
    #[must_use]
    pub fn resolve_method(&self, has_dma: bool) -> PlaybackMethod {
        let (major, _) = self.version;
        if !has_dma {
            return PlaybackMethod::Direct;
        }
        if major >= 4 || self.variant == DspVariant::Sc6600 {
            return PlaybackMethod::FifoAutoInit;
        }
        if major == 3 {
            return if self.variant == DspVariant::Ess {
                PlaybackMethod::ExtendedRegister
            } else {
                PlaybackMethod::HighSpeed
            };
        }
        if self.has_autoinit_command {
            // 2.01+, unless the environment breaks auto-init DMA, in
            // which case everything falls back to single-cycle.
            if self.autoinit_dma_allowed {
                return PlaybackMethod::AutoInit;
            }
            return PlaybackMethod::SingleCycle;
        }
        if major == 2 && self.autoinit_dma_allowed {
            return PlaybackMethod::ReArmed;
        }
        PlaybackMethod::SingleCycle
    }

    /// Whether a playback at `rate` needs the high-speed command family.
    #[inline]
    #[must_use]
    pub const fn needs_hispeed_play(&self, rate: u32) -> bool {
        self.hispeed_matters && rate >= self.hispeed_play_threshold
    }

    /// Whether a record at `rate` needs the high-speed command family.
    #[inline]
    #[must_use]
    pub const fn needs_hispeed_rec(&self, rate: u32) -> bool {
        self.hispeed_matters && rate >= self.hispeed_rec_threshold
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
