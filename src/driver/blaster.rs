//! Transfer Engine
//!
//! [`Blaster`] is the driver facade: it owns the negotiated capability
//! record, the resource assignment, and the state of the one streaming
//! transfer a card can run. A transfer moves through a fixed lifecycle:
//!
//! 1. [`prepare`](Blaster::prepare): validate the request against the
//!    capabilities, place a boundary-safe buffer, settle the block
//!    interval, and prime the DSP (speaker, rate, input routing).
//! 2. [`begin`](Blaster::begin): arm the DMA channel and issue the
//!    transfer commands for the resolved method.
//! 3. [`on_block_interrupt`](Blaster::on_block_interrupt): acknowledge
//!    the card, advance the block cursor, and re-arm whatever the method
//!    does not re-arm by itself.
//! 4. [`stop`](Blaster::stop): shut the stream down in an order that
//!    leaves the card quiet, then [`release`](Blaster::release) the
//!    buffer.
//!
//! All hardware access goes through the caller's bus and delay handles;
//! the struct itself holds no I/O resources and can live in a static.

use embedded_hal::delay::DelayNs;

use crate::dma::{alloc_buffer, DmaBuffer, DmaController, DmaDirection};
use crate::driver::caps::{DspCapabilities, DspVariant, PlaybackMethod};
use crate::driver::config::{
    AdpcmFormat, Direction, EngineState, SampleWidth, SbConfig, TransferFormat, MIN_SAMPLE_RATE,
};
use crate::driver::dsp::DspPort;
use crate::driver::probe;
use crate::error::{ConfigError, IoResult, Result};
use crate::hal::{DmaMemory, IsaBus};
use crate::register::dsp;

/// Samples of the DMA counter that must agree before the channel is
/// considered quiet during shutdown.
const STOP_QUIET_SAMPLES: u32 = 3;

/// Total counter samples taken while waiting for quiet, at 10 ms apart.
const STOP_PATIENCE: u32 = 30;

/// Smallest block interval the NTVDM workaround will pick.
const NTVDM_MIN_INTERVAL: u32 = 4096;

/// ESS demand-mode burst length encoding for 4-byte bursts.
const ESS_DEMAND_4BYTE: u8 = 2;

// =============================================================================
// Active Transfer Bookkeeping
// =============================================================================

#[derive(Debug)]
struct ActiveTransfer {
    format: TransferFormat,
    method: PlaybackMethod,
    channel: Option<u8>,
    buffer: Option<DmaBuffer>,
    /// Block interval in bytes.
    interval: u32,
    /// Byte offset of the block the hardware is currently working.
    cursor: u32,
    autoinit_dma: bool,
    autoinit_dsp: bool,
    hispeed: bool,
    /// ADPCM reference byte still owed on the next single-cycle block.
    adpcm_ref_pending: bool,
    /// Completed block interrupts.
    blocks: u32,
    /// Hardware position at the last timer tick, for polled servicing.
    poll_pos: u32,
    /// Bytes the hardware has moved since the last polled service.
    poll_fill: u32,
}

impl ActiveTransfer {
    fn buffer_len(&self) -> u32 {
        self.buffer.as_ref().map_or(0, DmaBuffer::len)
    }
}

// =============================================================================
// Driver Facade
// =============================================================================

/// One Sound Blaster card: DSP, DMA channel assignment, and the state of
/// its single streaming transfer.
#[derive(Debug)]
pub struct Blaster {
    config: SbConfig,
    port: DspPort,
    dma: DmaController,
    caps: Option<DspCapabilities>,
    state: EngineState,
    xfer: Option<ActiveTransfer>,
}

impl Blaster {
    /// Driver over a configured card on the given DMA subsystem.
    #[must_use]
    pub const fn new(config: SbConfig, dma: DmaController) -> Self {
        Self {
            port: DspPort::new(config.base),
            config,
            dma,
            caps: None,
            state: EngineState::Idle,
            xfer: None,
        }
    }

    /// Current engine state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Capability record, once [`init`](Self::init) has run.
    #[must_use]
    pub const fn capabilities(&self) -> Option<&DspCapabilities> {
        self.caps.as_ref()
    }

    /// Resource assignment as currently known.
    #[must_use]
    pub const fn config(&self) -> &SbConfig {
        &self.config
    }

    /// The DSP protocol handle, for diagnostics.
    #[must_use]
    pub const fn dsp(&self) -> &DspPort {
        &self.port
    }

    /// Method the active or prepared transfer uses.
    #[must_use]
    pub fn method(&self) -> Option<PlaybackMethod> {
        self.xfer.as_ref().map(|x| x.method)
    }

    /// Byte offset of the block the hardware is currently working.
    #[must_use]
    pub fn buffer_cursor(&self) -> Option<u32> {
        self.xfer.as_ref().map(|x| x.cursor)
    }

    /// Completed block interrupts of the active transfer.
    #[must_use]
    pub fn blocks_completed(&self) -> Option<u32> {
        self.xfer.as_ref().map(|x| x.blocks)
    }

    fn caps_ref(&self) -> core::result::Result<&DspCapabilities, ConfigError> {
        self.caps.as_ref().ok_or(ConfigError::InvalidState)
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Reset the DSP, read its version, detect the vendor variant, and
    /// negotiate the capability record.
    pub fn init(&mut self, bus: &mut impl IsaBus, delay: &mut impl DelayNs) -> Result<()> {
        self.port.reset(bus, delay)?;
        let version = self.port.version(bus, delay)?;

        let variant = match self.config.variant {
            Some(v) => v,
            None => self.detect_variant(bus, delay, version),
        };

        self.caps = Some(DspCapabilities::negotiate(
            version,
            variant,
            &self.config.quirks,
        ));

        // Drop configured channels the controller cannot serve, such as
        // a 16-bit channel on a machine without the secondary 8237.
        let bus_caps = *self.dma.capabilities();
        if self.config.dma8.is_some_and(|ch| !bus_caps.has_channel(ch)) {
            self.config.dma8 = None;
        }
        if self.config.dma16.is_some_and(|ch| !bus_caps.has_channel(ch)) {
            self.config.dma16 = None;
        }

        self.state = EngineState::Idle;
        Ok(())
    }

    /// Variant detection from the copyright string. Only 3.xx DSPs are
    /// queried; the command is destructive on older and emulated parts.
    fn detect_variant(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        version: (u8, u8),
    ) -> DspVariant {
        if version.0 != 3 {
            return DspVariant::Standard;
        }
        let mut buf = [0u8; 64];
        let len = match self.port.copyright(bus, delay, &mut buf) {
            Ok(len) => len,
            Err(_) => return DspVariant::Standard,
        };
        if buf[..len].windows(3).any(|w| w == b"ESS") {
            DspVariant::Ess
        } else {
            DspVariant::Standard
        }
    }

    // =========================================================================
    // Resource Probing
    // =========================================================================

    /// Probe the interrupt line and record the result.
    pub fn probe_irq(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
    ) -> IoResult<u8> {
        let irq = probe::probe_irq(bus, delay, &self.port)?;
        self.config.irq = Some(irq);
        Ok(irq)
    }

    /// Probe the interrupt line with the short-transfer fallback, using
    /// the already-known 8-bit DMA channel.
    pub fn probe_irq_lite(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        mem: &mut impl DmaMemory,
    ) -> Result<u8> {
        let ch = self.config.dma8.ok_or(ConfigError::NoDmaChannel)?;
        let irq = probe::probe_irq_lite(bus, delay, &self.port, &self.dma, mem, ch)?;
        self.config.irq = Some(irq);
        Ok(irq)
    }

    /// Probe the 8-bit DMA channel and record the result.
    pub fn probe_dma(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        mem: &mut impl DmaMemory,
    ) -> Result<u8> {
        let ch = probe::probe_dma8(
            bus,
            delay,
            &self.port,
            &self.dma,
            mem,
            &self.config.quirks,
        )?;
        self.config.dma8 = Some(ch);
        Ok(ch)
    }

    /// Probe the 16-bit DMA channel and record the result.
    pub fn probe_high_dma(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        mem: &mut impl DmaMemory,
    ) -> Result<u8> {
        let ch = probe::probe_dma16(
            bus,
            delay,
            &self.port,
            &self.dma,
            mem,
            &self.config.quirks,
        )?;
        self.config.dma16 = Some(ch);
        Ok(ch)
    }

    // =========================================================================
    // Prepare
    // =========================================================================

    /// Validate a transfer request, place its buffer, and prime the DSP.
    ///
    /// `buffer_bytes` is a request; the placed buffer can come out
    /// smaller when the allocator has to dodge an address boundary.
    /// `interval` is the block interrupt spacing in bytes and defaults
    /// to the whole buffer.
    pub fn prepare(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        mem: &mut impl DmaMemory,
        format: TransferFormat,
        buffer_bytes: u32,
        interval: Option<u32>,
    ) -> Result<()> {
        if self.state != EngineState::Idle || self.xfer.is_some() {
            return Err(ConfigError::InvalidState.into());
        }
        let caps = *self.caps_ref()?;

        self.validate(&caps, &format)?;

        let channel = match format.width {
            SampleWidth::Sixteen => self.config.dma16.or(self.config.dma8),
            SampleWidth::Eight => self.config.dma8,
        };
        let method = caps.resolve_method(channel.is_some());

        if method == PlaybackMethod::Direct {
            if format.direction == Direction::Record {
                return Err(ConfigError::RecordUnsupported.into());
            }
            if format.width == SampleWidth::Sixteen || format.stereo {
                return Err(ConfigError::NoDmaChannel.into());
            }
            if format.rate > caps.max_direct_rate {
                // One command per sample caps out well below the DMA
                // ceiling.
                return Err(ConfigError::RateUnsupported.into());
            }
            self.port.write(bus, delay, dsp::CMD_SPEAKER_ON)?;
            self.xfer = Some(ActiveTransfer {
                format,
                method,
                channel: None,
                buffer: None,
                interval: 0,
                cursor: 0,
                autoinit_dma: false,
                autoinit_dsp: false,
                hispeed: false,
                adpcm_ref_pending: false,
                blocks: 0,
                poll_pos: 0,
                poll_fill: 0,
            });
            self.state = EngineState::Prepared;
            return Ok(());
        }

        // No assigned interrupt line is fine: the transfer then runs off
        // on_timer_tick polling instead of on_block_interrupt.
        let channel = channel.ok_or(ConfigError::NoDmaChannel)?;

        let buffer = alloc_buffer(mem, buffer_bytes, self.dma.capabilities().limit_mask(channel))?;
        let interval = self.settle_interval(&caps, &format, buffer.len(), interval);

        let hispeed = match format.direction {
            Direction::Playback => caps.needs_hispeed_play(format.rate),
            Direction::Record => caps.needs_hispeed_rec(format.rate),
        };

        let autoinit_dma = caps.autoinit_dma_allowed
            && !matches!(method, PlaybackMethod::SingleCycle | PlaybackMethod::Direct);
        let mut autoinit_dsp = autoinit_dma && caps.has_autoinit_command;
        if format.compression.is_some() && !caps.adpcm_autoinit {
            autoinit_dsp = false;
        }
        if method == PlaybackMethod::ReArmed {
            autoinit_dsp = false;
        }

        self.prime_dsp(bus, delay, &caps, &format, method)?;

        let cursor = if format.backwards {
            buffer.len().saturating_sub(interval)
        } else {
            0
        };
        let poll_pos = if format.backwards {
            buffer.len().saturating_sub(1)
        } else {
            0
        };
        self.xfer = Some(ActiveTransfer {
            format,
            method,
            channel: Some(channel),
            buffer: Some(buffer),
            interval,
            cursor,
            autoinit_dma,
            autoinit_dsp,
            hispeed,
            adpcm_ref_pending: format.compression.is_some(),
            blocks: 0,
            poll_pos,
            poll_fill: 0,
        });
        self.state = EngineState::Prepared;
        Ok(())
    }

    fn validate(&self, caps: &DspCapabilities, format: &TransferFormat) -> Result<()> {
        let max = match format.direction {
            Direction::Playback => caps.max_play_rate,
            Direction::Record => caps.max_rec_rate,
        };
        if format.rate < MIN_SAMPLE_RATE || format.rate > max {
            return Err(ConfigError::RateUnsupported.into());
        }
        if format.width == SampleWidth::Sixteen && !caps.can_16bit {
            return Err(ConfigError::WidthUnsupported.into());
        }
        if format.stereo && !caps.can_stereo {
            return Err(ConfigError::StereoUnsupported.into());
        }
        if format.direction == Direction::Record && self.config.quirks.forbids_autoinit_dma() {
            // The resident emulators only cover the output path.
            return Err(ConfigError::RecordUnsupported.into());
        }
        if format.compression.is_some()
            && (format.stereo
                || format.width == SampleWidth::Sixteen
                || format.direction == Direction::Record)
        {
            return Err(ConfigError::CompressionUnsupported.into());
        }
        Ok(())
    }

    /// Settle the block interval: default to the whole buffer, keep it
    /// frame-aligned, and apply environment workarounds.
    fn settle_interval(
        &self,
        caps: &DspCapabilities,
        format: &TransferFormat,
        buffer_len: u32,
        interval: Option<u32>,
    ) -> u32 {
        let mut iv = interval.unwrap_or(buffer_len).min(buffer_len);

        if self.config.quirks.ntvdm && (!iv.is_power_of_two() || iv == buffer_len) {
            // NTVDM loses auto-init interrupts on odd intervals, and a
            // block spanning the entire buffer confuses its auto-init
            // handling outright. Walk down from a sixteenth of the
            // buffer to a half until the block is big enough to be
            // worth taking.
            let lm = buffer_len;
            iv = if lm / 16 >= NTVDM_MIN_INTERVAL {
                lm / 16
            } else if lm / 8 >= NTVDM_MIN_INTERVAL {
                lm / 8
            } else if lm / 4 >= NTVDM_MIN_INTERVAL {
                lm / 4
            } else {
                lm / 2
            };
        }

        if caps.variant == DspVariant::Ess {
            // ESS demand transfers move four bytes at a time.
            iv &= !3;
        }

        let frame = format.frame_bytes();
        iv -= iv % frame;
        iv.max(frame)
    }

    /// Speaker, rate, and routing commands that precede any transfer.
    fn prime_dsp(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        caps: &DspCapabilities,
        format: &TransferFormat,
        method: PlaybackMethod,
    ) -> Result<()> {
        match format.direction {
            Direction::Playback => self.port.write(bus, delay, dsp::CMD_SPEAKER_ON)?,
            Direction::Record => self.port.write(bus, delay, dsp::CMD_SPEAKER_OFF)?,
        }

        match method {
            PlaybackMethod::FifoAutoInit => {
                let cmd = match format.direction {
                    Direction::Playback => dsp::CMD_SET_OUTPUT_RATE,
                    Direction::Record => dsp::CMD_SET_INPUT_RATE,
                };
                self.port.write(bus, delay, cmd)?;
                self.port.write(bus, delay, (format.rate >> 8) as u8)?;
                self.port.write(bus, delay, format.rate as u8)?;
            }
            PlaybackMethod::ExtendedRegister => {
                // Rate goes through the extended registers in begin().
            }
            _ => {
                self.port.write(bus, delay, dsp::CMD_SET_TIME_CONSTANT)?;
                self.port
                    .write(bus, delay, dsp::time_constant(format.byte_rate()))?;
            }
        }

        if caps.version.0 == 3 && caps.variant == DspVariant::Standard {
            if format.stereo && format.direction == Direction::Playback {
                let ctl = self.port.mixer_read(bus, dsp::MIXER_OUTPUT_CONTROL);
                self.port
                    .mixer_write(bus, dsp::MIXER_OUTPUT_CONTROL, ctl | 0x02);
            }
            if format.direction == Direction::Record {
                let cmd = if format.stereo {
                    dsp::CMD_RECORD_STEREO
                } else {
                    dsp::CMD_RECORD_MONO
                };
                self.port.write(bus, delay, cmd)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Begin
    // =========================================================================

    /// Arm the DMA channel and start the stream.
    pub fn begin(&mut self, bus: &mut impl IsaBus, delay: &mut impl DelayNs) -> Result<()> {
        if self.state != EngineState::Prepared {
            return Err(ConfigError::InvalidState.into());
        }
        let Some(xfer) = self.xfer.take() else {
            return Err(ConfigError::InvalidState.into());
        };

        let outcome = self.begin_inner(bus, delay, &xfer);
        self.xfer = Some(xfer);
        outcome?;
        self.state = EngineState::Running;
        Ok(())
    }

    fn begin_inner(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        xfer: &ActiveTransfer,
    ) -> Result<()> {
        if xfer.method == PlaybackMethod::Direct {
            return Ok(());
        }
        let (Some(channel), Some(buffer)) = (xfer.channel, xfer.buffer.as_ref()) else {
            return Err(ConfigError::InvalidState.into());
        };

        self.arm_dma(bus, xfer, channel, buffer.phys(), buffer.len(), xfer.cursor)?;

        match xfer.method {
            PlaybackMethod::FifoAutoInit => self.start_fifo(bus, delay, xfer),
            PlaybackMethod::ExtendedRegister => self.start_ess(bus, delay, xfer),
            _ => self.start_classic(bus, delay, xfer, true),
        }
    }

    /// Program the DMA side of a transfer block.
    fn arm_dma(
        &self,
        bus: &mut impl IsaBus,
        xfer: &ActiveTransfer,
        channel: u8,
        phys: u32,
        len: u32,
        cursor: u32,
    ) -> Result<()> {
        let direction = match xfer.format.direction {
            Direction::Playback => DmaDirection::MemoryToDevice,
            Direction::Record => DmaDirection::DeviceToMemory,
        };

        self.dma.mask(bus, channel)?;
        self.dma
            .set_single_mode(bus, channel, direction, xfer.autoinit_dma, xfer.format.backwards)?;

        let (base, count) = if xfer.autoinit_dma {
            // Hardware wraps the whole buffer by itself.
            if xfer.format.backwards {
                (phys + len - 1, len)
            } else {
                (phys, len)
            }
        } else {
            // One block at a time, starting at the cursor.
            let block = xfer.interval.min(len);
            if xfer.format.backwards {
                (phys + cursor + block - 1, block)
            } else {
                (phys + cursor, block)
            }
        };
        self.dma.write_base(bus, channel, base)?;
        self.dma.write_count(bus, channel, count)?;
        self.dma.unmask(bus, channel)?;
        Ok(())
    }

    /// DSP 4.xx FIFO command pair.
    fn start_fifo(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        xfer: &ActiveTransfer,
    ) -> Result<()> {
        let fmt = &xfer.format;
        let mut cmd = match fmt.width {
            SampleWidth::Sixteen => dsp::CMD_4XX_16BIT,
            SampleWidth::Eight => dsp::CMD_4XX_8BIT,
        };
        cmd |= dsp::fifo4xx::CMD_FIFO;
        if xfer.autoinit_dsp {
            cmd |= dsp::fifo4xx::CMD_AUTOINIT;
        }
        if fmt.direction == Direction::Record {
            cmd |= dsp::fifo4xx::CMD_RECORD;
        }

        let mut mode = 0u8;
        if fmt.effective_signed() {
            mode |= dsp::fifo4xx::MODE_SIGNED;
        }
        if fmt.stereo {
            mode |= dsp::fifo4xx::MODE_STEREO;
        }

        // Length is in samples, less one.
        let samples = (xfer.interval / fmt.width.bytes()).max(1) - 1;
        self.port.write(bus, delay, cmd)?;
        self.port.write(bus, delay, mode)?;
        self.port.write(bus, delay, samples as u8)?;
        self.port.write(bus, delay, (samples >> 8) as u8)?;
        Ok(())
    }

    /// Pre-4.xx command families: plain, auto-init, high-speed, ADPCM.
    fn start_classic(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        xfer: &ActiveTransfer,
        first_block: bool,
    ) -> Result<()> {
        let record = xfer.format.direction == Direction::Record;
        let len = xfer.interval.max(1) - 1;

        if let Some(adpcm) = xfer.format.compression {
            return self.start_adpcm(bus, delay, xfer, adpcm, first_block);
        }

        if xfer.autoinit_dsp {
            self.port.write(bus, delay, dsp::CMD_SET_BLOCK_SIZE)?;
            self.port.write(bus, delay, len as u8)?;
            self.port.write(bus, delay, (len >> 8) as u8)?;
            let cmd = match (xfer.hispeed, record) {
                (true, false) => dsp::CMD_HISPEED_AUTOINIT_OUT,
                (true, true) => dsp::CMD_HISPEED_AUTOINIT_IN,
                (false, false) => dsp::CMD_AUTOINIT_OUT,
                (false, true) => dsp::CMD_AUTOINIT_IN,
            };
            self.port.write(bus, delay, cmd)?;
        } else if xfer.hispeed {
            // High-speed single-cycle takes the length via the block
            // size command.
            self.port.write(bus, delay, dsp::CMD_SET_BLOCK_SIZE)?;
            self.port.write(bus, delay, len as u8)?;
            self.port.write(bus, delay, (len >> 8) as u8)?;
            let cmd = if record {
                dsp::CMD_HISPEED_SINGLE_IN
            } else {
                dsp::CMD_HISPEED_SINGLE_OUT
            };
            self.port.write(bus, delay, cmd)?;
        } else {
            let cmd = if record {
                dsp::CMD_SINGLE_IN
            } else {
                dsp::CMD_SINGLE_OUT
            };
            self.port.write(bus, delay, cmd)?;
            self.port.write(bus, delay, len as u8)?;
            self.port.write(bus, delay, (len >> 8) as u8)?;
        }
        Ok(())
    }

    fn start_adpcm(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        xfer: &ActiveTransfer,
        adpcm: AdpcmFormat,
        first_block: bool,
    ) -> Result<()> {
        let len = xfer.interval.max(1) - 1;
        if xfer.autoinit_dsp {
            self.port.write(bus, delay, dsp::CMD_SET_BLOCK_SIZE)?;
            self.port.write(bus, delay, len as u8)?;
            self.port.write(bus, delay, (len >> 8) as u8)?;
            let cmd = match adpcm {
                AdpcmFormat::Bits2 => dsp::CMD_ADPCM_2BIT_AUTOINIT,
                AdpcmFormat::Bits26 => dsp::CMD_ADPCM_26BIT_AUTOINIT,
                AdpcmFormat::Bits4 => dsp::CMD_ADPCM_4BIT_AUTOINIT,
            };
            self.port.write(bus, delay, cmd)?;
        } else {
            // The reference byte rides only on the first block.
            let with_ref = first_block && xfer.adpcm_ref_pending;
            let cmd = match (adpcm, with_ref) {
                (AdpcmFormat::Bits2, true) => dsp::CMD_ADPCM_2BIT_REF,
                (AdpcmFormat::Bits2, false) => dsp::CMD_ADPCM_2BIT,
                (AdpcmFormat::Bits26, true) => dsp::CMD_ADPCM_26BIT_REF,
                (AdpcmFormat::Bits26, false) => dsp::CMD_ADPCM_26BIT,
                (AdpcmFormat::Bits4, true) => dsp::CMD_ADPCM_4BIT_REF,
                (AdpcmFormat::Bits4, false) => dsp::CMD_ADPCM_4BIT,
            };
            self.port.write(bus, delay, cmd)?;
            self.port.write(bus, delay, len as u8)?;
            self.port.write(bus, delay, (len >> 8) as u8)?;
        }
        Ok(())
    }

    /// ESS AudioDrive extended-register start sequence.
    fn start_ess(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        xfer: &ActiveTransfer,
    ) -> Result<()> {
        let fmt = &xfer.format;
        let record = fmt.direction == Direction::Record;

        let mut b8 = 0u8;
        if record {
            b8 |= 0x0A;
        }
        if xfer.autoinit_dsp {
            b8 |= 0x04;
        }
        self.port.ess_write(bus, delay, dsp::ess::AUDIO_CONTROL, b8)?;

        let a8 = self.port.ess_read(bus, delay, dsp::ess::ANALOG_CONTROL)?;
        let a8 = (a8 & !0x03) | if fmt.stereo { 0x01 } else { 0x02 };
        self.port.ess_write(bus, delay, dsp::ess::ANALOG_CONTROL, a8)?;

        self.port
            .ess_write(bus, delay, dsp::ess::DEMAND_BURST, ESS_DEMAND_4BYTE)?;

        self.port
            .ess_write(bus, delay, dsp::ess::SAMPLE_RATE, ess_rate_divisor(fmt.rate))?;
        self.port
            .ess_write(bus, delay, dsp::ess::FILTER_RATE, ess_filter_divisor(fmt.rate))?;

        // Transfer count is the two's complement of the length.
        let count = (!(xfer.interval.max(1) - 1)) as u16;
        self.port
            .ess_write(bus, delay, dsp::ess::XFER_COUNT_LO, count as u8)?;
        self.port
            .ess_write(bus, delay, dsp::ess::XFER_COUNT_HI, (count >> 8) as u8)?;

        self.port
            .ess_update(bus, delay, dsp::ess::IRQ_CONTROL, 0x50, 0xA0)?;
        self.port
            .ess_update(bus, delay, dsp::ess::DRQ_CONTROL, 0x50, 0xA0)?;

        self.port.ess_write(bus, delay, dsp::ess::AUDIO_FORMAT, 0x51)?;
        let mut b7 = 0x90;
        if fmt.effective_signed() {
            b7 |= 0x20;
        }
        b7 |= if fmt.stereo { 0x08 } else { 0x40 };
        if fmt.width == SampleWidth::Sixteen {
            b7 |= 0x04;
        }
        self.port.ess_write(bus, delay, dsp::ess::AUDIO_FORMAT, b7)?;

        // DMA enable bit last; everything above must be settled first.
        self.port
            .ess_update(bus, delay, dsp::ess::AUDIO_CONTROL, 0x01, 0x00)?;
        Ok(())
    }

    // =========================================================================
    // Direct Output
    // =========================================================================

    /// Push one sample through the direct DAC path.
    ///
    /// Only valid for a running transfer resolved to
    /// [`PlaybackMethod::Direct`].
    pub fn direct_output(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        sample: u8,
    ) -> Result<()> {
        if self.state != EngineState::Running
            || self.method() != Some(PlaybackMethod::Direct)
        {
            return Err(ConfigError::InvalidState.into());
        }
        self.port.write(bus, delay, dsp::CMD_DIRECT_DAC_OUT)?;
        self.port.write(bus, delay, sample)?;
        Ok(())
    }

    // =========================================================================
    // Block Interrupts
    // =========================================================================

    /// Service a block interrupt: acknowledge the card, advance the
    /// cursor, and re-arm whatever the method does not keep going by
    /// itself. Call from the interrupt handler (after EOI handling is
    /// the host's business).
    pub fn on_block_interrupt(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
    ) -> Result<()> {
        let Some(mut xfer) = self.xfer.take() else {
            return Err(ConfigError::InvalidState.into());
        };
        let outcome = self.service_block(bus, delay, &mut xfer);
        self.xfer = Some(xfer);
        outcome
    }

    fn service_block(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        xfer: &mut ActiveTransfer,
    ) -> Result<()> {
        if xfer.format.width == SampleWidth::Sixteen
            && xfer.method == PlaybackMethod::FifoAutoInit
        {
            self.port.ack_interrupt_16(bus);
        } else {
            self.port.ack_interrupt(bus);
        }
        xfer.blocks += 1;

        if self.state != EngineState::Running {
            return Ok(());
        }

        let len = xfer.buffer_len();
        if len == 0 {
            return Ok(());
        }

        // Advance to the block the hardware is working now.
        xfer.cursor = if xfer.format.backwards {
            (xfer.cursor + len - (xfer.interval % len)) % len
        } else {
            (xfer.cursor + xfer.interval) % len
        };
        xfer.adpcm_ref_pending = false;

        if xfer.autoinit_dma && xfer.autoinit_dsp {
            // Hardware keeps itself fed.
            return Ok(());
        }

        let (Some(channel), Some(buffer)) = (xfer.channel, xfer.buffer.as_ref()) else {
            return Ok(());
        };

        if xfer.hispeed && self.caps.is_some_and(|c| c.hispeed_blocking) {
            // A finished high-speed block leaves the DSP deaf until
            // reset, which also drops the time constant.
            self.port.reset(bus, delay)?;
            self.port.write(bus, delay, dsp::CMD_SET_TIME_CONSTANT)?;
            self.port
                .write(bus, delay, dsp::time_constant(xfer.format.byte_rate()))?;
        }
        if !xfer.autoinit_dma {
            self.arm_dma(bus, xfer, channel, buffer.phys(), buffer.len(), xfer.cursor)?;
        }
        self.start_classic(bus, delay, xfer, false)
    }

    /// Service the stream from a periodic timer tick instead of an
    /// interrupt line.
    ///
    /// Reads the live DMA counter and, when the hardware has left the
    /// block the cursor tracks, runs the same servicing an interrupt
    /// would. Returns whether a block was completed. Cheap when nothing
    /// has happened; call it at a few hundred hertz.
    pub fn on_timer_tick(
        &mut self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
    ) -> Result<bool> {
        if self.state != EngineState::Running {
            return Ok(false);
        }
        let Some(mut xfer) = self.xfer.take() else {
            return Err(ConfigError::InvalidState.into());
        };
        let outcome = self.tick_inner(bus, delay, &mut xfer);
        self.xfer = Some(xfer);
        outcome
    }

    fn tick_inner(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        xfer: &mut ActiveTransfer,
    ) -> Result<bool> {
        let Some(channel) = xfer.channel else {
            // Direct streams have no counter to watch.
            return Ok(false);
        };
        let remaining = self.dma.remaining_bytes(bus, channel)?;

        if xfer.autoinit_dma {
            let len = xfer.buffer_len();
            if len == 0 {
                return Ok(false);
            }
            let consumed = (len - remaining.min(len)) % len;
            let pos = if xfer.format.backwards {
                (len - 1 - consumed) % len
            } else {
                consumed
            };
            // Accumulate ring progress since the last tick; the tick
            // rate must outpace one buffer lap or a full wrap reads as
            // no movement.
            let advanced = if xfer.format.backwards {
                (xfer.poll_pos + len - pos) % len
            } else {
                (pos + len - xfer.poll_pos) % len
            };
            xfer.poll_pos = pos;
            xfer.poll_fill += advanced;
            if xfer.poll_fill < xfer.interval {
                return Ok(false);
            }
            xfer.poll_fill -= xfer.interval;
        } else if remaining != 0 {
            return Ok(false);
        }

        self.service_block(bus, delay, xfer)?;
        Ok(true)
    }

    // =========================================================================
    // Stop
    // =========================================================================

    /// Shut the stream down. Idempotent; calling with nothing running is
    /// a no-op.
    ///
    /// A DSP failure mid-shutdown does not strand the engine: the
    /// channel is masked and the state returns to Idle either way, so
    /// the caller can [`release`](Self::release) or prepare afresh. The
    /// transfer buffer stays allocated until `release`.
    pub fn stop(&mut self, bus: &mut impl IsaBus, delay: &mut impl DelayNs) -> Result<()> {
        if self.state == EngineState::Idle {
            return Ok(());
        }
        self.state = EngineState::Stopping;
        let outcome = self.quiesce(bus, delay);

        if let Some(channel) = self.xfer.as_ref().and_then(|x| x.channel) {
            // Whatever the DSP did or did not do, the channel must not
            // keep feeding it.
            let _ = self.dma.mask(bus, channel);
        }
        self.port.ack_interrupt(bus);
        self.port.ack_interrupt_16(bus);
        self.state = EngineState::Idle;
        outcome
    }

    fn quiesce(&self, bus: &mut impl IsaBus, delay: &mut impl DelayNs) -> Result<()> {
        let caps = self.caps_ref().copied();
        if let Some(xfer) = self.xfer.as_ref() {
            if xfer.method == PlaybackMethod::ExtendedRegister {
                // Stop the ESS DMA engine before yanking the DSP out
                // from under it.
                let _ = self
                    .port
                    .ess_update(bus, delay, dsp::ess::AUDIO_CONTROL, 0x00, 0x01);
            }
        }

        self.port.reset(bus, delay)?;

        if let (Ok(caps), Some(xfer)) = (caps, self.xfer.as_ref()) {
            if caps.version.0 == 3
                && caps.variant == DspVariant::Standard
                && xfer.format.direction == Direction::Record
            {
                // A 3.xx left in record mode keeps requesting DMA until
                // told otherwise.
                self.port.write(bus, delay, dsp::CMD_RECORD_MONO)?;
            }

            if let Some(channel) = xfer.channel {
                self.wait_channel_quiet(bus, delay, channel)?;
            }

            if caps.version.0 == 3 && caps.variant == DspVariant::Standard && xfer.format.stereo
            {
                self.port.mixer_write(bus, dsp::MIXER_OUTPUT_CONTROL, 0);
            }
        }

        self.port.write(bus, delay, dsp::CMD_SPEAKER_OFF)?;
        Ok(())
    }

    /// Wait until the channel's counter holds still for
    /// [`STOP_QUIET_SAMPLES`] consecutive reads.
    fn wait_channel_quiet(
        &self,
        bus: &mut impl IsaBus,
        delay: &mut impl DelayNs,
        channel: u8,
    ) -> Result<()> {
        let mut last = self.dma.read_count_register(bus, channel)?;
        let mut quiet = 0;
        for _ in 0..STOP_PATIENCE {
            delay.delay_ms(10);
            let cur = self.dma.read_count_register(bus, channel)?;
            if cur == last {
                quiet += 1;
                if quiet >= STOP_QUIET_SAMPLES {
                    return Ok(());
                }
            } else {
                quiet = 0;
                last = cur;
            }
        }
        // Counter never settled; the mask below stops it regardless.
        Ok(())
    }

    /// Return the transfer buffer to the allocator and clear the
    /// transfer record. Only valid once stopped.
    pub fn release(&mut self, mem: &mut impl DmaMemory) -> Result<()> {
        if self.state != EngineState::Idle {
            return Err(ConfigError::InvalidState.into());
        }
        if let Some(mut xfer) = self.xfer.take() {
            if let Some(buf) = xfer.buffer.as_mut() {
                buf.free(mem);
            }
        }
        Ok(())
    }
}

// =============================================================================
// ESS Rate Encoding
// =============================================================================

/// ESS sample rate divisor. Two clock sources cover the range; the
/// faster one takes over above 22050 Hz.
const fn ess_rate_divisor(rate: u32) -> u8 {
    if rate > 22_050 {
        (256 - 795_500 / rate) as u8
    } else {
        (128 - 397_700 / rate) as u8
    }
}

/// ESS low-pass filter divisor for a sample rate.
const fn ess_filter_divisor(rate: u32) -> u8 {
    (256 - 7_160_000 / (rate * 32)) as u8
}

// =============================================================================
// Unit Tests
// =============================================================================
