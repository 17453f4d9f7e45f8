//! Hardware Abstraction Layer
//!
//! The driver core never touches I/O ports or physical memory directly.
//! Every access goes through one of three traits supplied by the host
//! environment:
//!
//! - [`IsaBus`]: byte-wide port I/O.
//! - [`DmaMemory`]: allocation of physical memory reachable by the 8237.
//! - `embedded_hal::delay::DelayNs`: bounded waits.
//!
//! This keeps the driver core testable off-target and portable across
//! hosting environments (real mode, protected mode with port access,
//! emulators).

pub mod bus;
pub mod memory;
pub mod pic;

pub use bus::IsaBus;
pub use memory::{DmaMemory, DmaRegion};
pub use pic::{InterruptMaskGuard, PicMaskSnapshot};
