//! Driver Layer
//!
//! Everything above the raw bus: the DSP protocol, capability
//! negotiation, resource probing, and the transfer engine facade.
//!
//! - [`blaster`]: the [`Blaster`](blaster::Blaster) facade and transfer
//!   lifecycle
//! - [`caps`]: version/variant capability negotiation
//! - [`config`]: resource assignment, transfer formats, environment
//!   quirks
//! - [`dsp`]: the DSP command/response handshake
//! - [`probe`]: IRQ and DMA channel discovery

pub mod blaster;
pub mod caps;
pub mod config;
pub mod dsp;
pub mod probe;
