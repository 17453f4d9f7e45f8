//! Sound Blaster DSP Driver
//!
//! A `no_std`, `no_alloc` Rust driver for Sound Blaster family cards:
//! DSP streaming playback and record over 8237 ISA DMA, covering every
//! DSP generation from 1.xx through 4.xx plus the ESS AudioDrive and
//! Aztech SC-6600 variants.
//!
//! # Architecture
//!
//! The driver is organized into three layers:
//!
//! 1. **Driver Layer** ([`driver`]): the [`Blaster`] transfer engine,
//!    DSP protocol, capability negotiation, and resource probing
//! 2. **DMA Layer** ([`dma`]): 8237 channel programming, live counter
//!    reads, and boundary-safe buffer placement
//! 3. **HAL Layer** ([`hal`]): port I/O, DMA-capable memory, and 8259
//!    interrupt controller access as traits the host implements
//!
//! The crate performs no port I/O of its own: the host supplies an
//! [`IsaBus`] for `in`/`out`, a [`DmaMemory`] allocator for buffers
//! below the ISA address horizon, and an `embedded_hal` `DelayNs` for
//! every bounded wait. That keeps the driver testable on any host and
//! portable across real mode, protected mode, and emulated targets.
//!
//! # Transfer Lifecycle
//!
//! ```ignore
//! use sb_dsp::{Blaster, BusCapabilities, DmaController, SbConfig, TransferFormat};
//!
//! let config = SbConfig::new().with_irq(5).with_dma8(1).with_dma16(5);
//! let mut card = Blaster::new(config, DmaController::new(BusCapabilities::detect(&mut bus)));
//!
//! card.init(&mut bus, &mut delay)?;
//!
//! let fmt = TransferFormat::playback(22_050);
//! card.prepare(&mut bus, &mut delay, &mut mem, fmt, 0x8000, Some(0x2000))?;
//! card.begin(&mut bus, &mut delay)?;
//!
//! // From the IRQ handler:
//! card.on_block_interrupt(&mut bus, &mut delay)?;
//!
//! // Shutdown:
//! card.stop(&mut bus, &mut delay)?;
//! card.release(&mut mem)?;
//! ```
//!
//! Unknown resource assignments can be discovered first with
//! [`Blaster::probe_irq`], [`Blaster::probe_dma`], and
//! [`Blaster::probe_high_dma`].
//!
//! # Features
//!
//! - `defmt`: defmt formatting for error and configuration types
//! - `critical-section`: the ISR-safe [`sync::SharedBlaster`] wrapper

#![no_std]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// =============================================================================
// Modules
// =============================================================================

pub mod dma;
pub mod driver;
pub mod error;
pub mod hal;
pub mod register;

#[cfg(feature = "critical-section")]
#[cfg_attr(docsrs, doc(cfg(feature = "critical-section")))]
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use dma::{alloc_buffer, BusCapabilities, DmaBuffer, DmaController, DmaDirection};
pub use driver::blaster::Blaster;
pub use driver::caps::{DspCapabilities, DspVariant, PlaybackMethod};
pub use driver::config::{
    AdpcmFormat, Direction, EngineState, Quirks, SampleWidth, SbConfig, TransferFormat,
};
pub use driver::dsp::DspPort;
pub use driver::probe::{probe_dma16, probe_dma8, probe_irq, probe_irq_lite};
pub use error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, IoError, IoResult, Result,
};
pub use hal::{DmaMemory, DmaRegion, IsaBus};

#[cfg(feature = "critical-section")]
pub use sync::SharedBlaster;
