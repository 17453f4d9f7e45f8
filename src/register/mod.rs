//! I/O port and command maps for the devices this driver programs.
//!
//! Three port-mapped devices are involved in a streaming transfer:
//!
//! 1. **8237 DMA controller** ([`dma`]): per-channel base/count registers,
//!    page registers, mask and mode ports.
//! 2. **8259 interrupt controller** ([`pic`]): mask registers and the
//!    interrupt request register used during probing.
//! 3. **Sound Blaster DSP** ([`dsp`]): the command/data protocol, the mixer
//!    window, and the ESS extended-register window.
//!
//! All constants here are raw port numbers or command bytes; the access
//! protocols built on top of them live in [`crate::dma`] and
//! [`crate::driver`].

pub mod dma;
pub mod dsp;
pub mod pic;
