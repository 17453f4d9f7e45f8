//! ISR-Safe Synchronization Wrapper
//!
//! [`SharedBlaster`] wraps a [`Blaster`] in a `critical-section` mutex so
//! the driver can be reached from both mainline code and the interrupt
//! handler that services block completions. All access goes through
//! [`with`](SharedBlaster::with), which holds a critical section for the
//! duration of the closure.
//!
//! For single-context use (polling, no ISR touching the driver), a plain
//! `Blaster` in a `static mut` is simpler and has no overhead.
//!
//! # Example
//!
//! ```ignore
//! use sb_dsp::sync::SharedBlaster;
//! use sb_dsp::{Blaster, BusCapabilities, DmaController, SbConfig};
//!
//! static CARD: SharedBlaster = SharedBlaster::new(Blaster::new(
//!     SbConfig::new().with_irq(5).with_dma8(1),
//!     DmaController::new(BusCapabilities::at()),
//! ));
//!
//! fn irq_handler() {
//!     CARD.with(|card| {
//!         card.on_block_interrupt(&mut bus(), &mut delay()).ok();
//!     });
//! }
//! ```
//!
//! # Implementation Note
//!
//! The critical section implementation comes from the host environment;
//! enable the matching `critical-section` provider there. Under DOS-style
//! hosts this is typically a CLI/STI pair.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::driver::blaster::Blaster;

/// Interrupt-safe [`Blaster`] wrapper.
pub struct SharedBlaster {
    inner: Mutex<RefCell<Blaster>>,
}

impl SharedBlaster {
    /// Wrap a driver for shared access. Const, suitable for statics.
    #[must_use]
    pub const fn new(blaster: Blaster) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(blaster)),
        }
    }

    /// Run a closure with exclusive access to the driver.
    ///
    /// Interrupts are disabled for the duration, so keep the closure
    /// short; a full probe inside `with` stalls the machine for its
    /// whole watch period.
    pub fn with<R>(&self, f: impl FnOnce(&mut Blaster) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}
