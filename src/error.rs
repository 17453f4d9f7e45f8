//! Error types for the Sound Blaster DSP/DMA driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Parameter validation and capability mismatches
//! - [`DmaError`]: Channel programming and buffer placement issues
//! - [`IoError`]: DSP handshake and probing failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and capability errors
///
/// These errors occur when a requested transfer format cannot be
/// satisfied by the detected DSP generation, or when driver state does
/// not admit the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Sample rate outside the limits of the detected DSP
    RateUnsupported,
    /// 16-bit samples requested on a DSP without a 16-bit path
    WidthUnsupported,
    /// Stereo requested on a DSP without a stereo path
    StereoUnsupported,
    /// Recording requested but the configuration cannot record
    RecordUnsupported,
    /// ADPCM requested in a mode the DSP cannot combine it with
    CompressionUnsupported,
    /// No DMA channel assigned for the requested sample width
    NoDmaChannel,
    /// No interrupt line assigned
    NoInterrupt,
    /// Operation not valid in the current engine state
    InvalidState,
    /// Invalid configuration parameter
    InvalidConfig,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::RateUnsupported => "sample rate unsupported",
            ConfigError::WidthUnsupported => "16-bit samples unsupported",
            ConfigError::StereoUnsupported => "stereo unsupported",
            ConfigError::RecordUnsupported => "recording unsupported",
            ConfigError::CompressionUnsupported => "ADPCM mode unsupported",
            ConfigError::NoDmaChannel => "no DMA channel assigned",
            ConfigError::NoInterrupt => "no interrupt line assigned",
            ConfigError::InvalidState => "invalid state for operation",
            ConfigError::InvalidConfig => "invalid configuration",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// DMA channel and buffer placement errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// Channel number outside 0-7 or the cascade channel
    InvalidChannel,
    /// Allocator could not provide a region of the requested size
    OutOfMemory,
    /// No placement avoiding the channel's address boundary was found
    /// within the retry budget
    BoundaryUnsatisfiable,
    /// Transfer length is zero or exceeds what the channel can address
    InvalidLength,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::InvalidChannel => "invalid DMA channel",
            DmaError::OutOfMemory => "DMA memory exhausted",
            DmaError::BoundaryUnsatisfiable => "no boundary-safe buffer placement",
            DmaError::InvalidLength => "invalid transfer length",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// DSP handshake and probing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// DSP handshake timed out
    Timeout,
    /// DSP reset did not produce the ready byte
    ResetFailed,
    /// DSP version query kept returning an implausible pair
    VersionImplausible,
    /// Probe eliminated every candidate
    ProbeExhausted,
    /// Probe could not narrow the candidates to one
    ProbeAmbiguous,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Timeout => "DSP handshake timed out",
            IoError::ResetFailed => "DSP reset failed",
            IoError::VersionImplausible => "DSP version implausible",
            IoError::ProbeExhausted => "probe eliminated all candidates",
            IoError::ProbeAmbiguous => "probe could not isolate a candidate",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::RateUnsupported)) => { /* ... */ }
///     Err(Error::Dma(DmaError::BoundaryUnsatisfiable)) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA error
    Dma(DmaError),
    /// I/O error
    Io(IoError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Dma(e) => write!(f, "dma: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for DMA operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================
