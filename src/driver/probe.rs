//! IRQ and DMA Resource Probing
//!
//! Finds which interrupt line and DMA channels the card is jumpered to
//! without trusting configuration files. Both probes work the same way:
//! start from a candidate set, eliminate candidates that misbehave
//! (pending before any trigger, moving on their own, not responding),
//! and accept only an unambiguous survivor.
//!
//! The IRQ probe runs with every interrupt line masked at the 8259 and
//! watches the request register directly, so no handler is installed and
//! nothing is delivered. The mask registers are restored on every exit
//! path by [`InterruptMaskGuard`].

use embedded_hal::delay::DelayNs;

use crate::dma::{alloc_buffer, DmaController, DmaDirection};
use crate::driver::config::Quirks;
use crate::driver::dsp::DspPort;
use crate::error::{Error, IoError, IoResult, Result};
use crate::hal::{pic, DmaMemory, InterruptMaskGuard, IsaBus};
use crate::register::dsp;

/// Interrupt lines a Sound Blaster can be jumpered to.
pub const IRQ_CANDIDATES: [u8; 5] = [2, 3, 5, 7, 10];

/// Lines tried by the lite probe (the two lines virtually every card
/// since the 2.0 ships on).
pub const IRQ_CANDIDATES_LITE: [u8; 2] = [5, 7];

/// 8-bit DMA channels a Sound Blaster can be jumpered to.
pub const DMA8_CANDIDATES: [u8; 3] = [0, 1, 3];

/// 16-bit DMA channels a Sound Blaster 16 can be jumpered to.
pub const DMA16_CANDIDATES: [u8; 3] = [5, 6, 7];

/// Length of the passive watch before any triggering, in 10 ms steps.
const PASSIVE_WATCH_STEPS: u32 = 25;

/// Polls of the request register after a trigger, at 1 ms apart.
const TRIGGER_PATIENCE_MS: u32 = 10;

/// Times a line must answer the trigger before it counts.
const CONFIRMATIONS: u32 = 2;

/// Elimination rounds before the probe gives up narrowing.
const MAX_ROUNDS: u32 = 8;

/// Counter samples taken per channel during the passive DMA watch.
const PASSIVE_COUNTER_SAMPLES: u32 = 500;

/// Sample rate of the active-probe test transfer.
const PROBE_RATE: u32 = 22_050;

fn candidate_mask(candidates: &[u8]) -> u16 {
    candidates.iter().fold(0u16, |m, &c| m | (1 << c))
}

fn sole_survivor(mask: u16) -> IoResult<u8> {
    match mask.count_ones() {
        0 => Err(IoError::ProbeExhausted),
        1 => Ok(mask.trailing_zeros() as u8),
        _ => Err(IoError::ProbeAmbiguous),
    }
}

// =============================================================================
// IRQ Probing
// =============================================================================

/// Probe the interrupt line by forcing the card to raise it.
///
/// Equivalent to [`probe_irq_candidates`] over [`IRQ_CANDIDATES`].
pub fn probe_irq(
    bus: &mut impl IsaBus,
    delay: &mut impl DelayNs,
    port: &DspPort,
) -> IoResult<u8> {
    probe_irq_candidates(bus, delay, port, &IRQ_CANDIDATES)
}

/// Probe the interrupt line over an explicit candidate set.
///
/// With all lines masked, candidates showing requests during a passive
/// watch are dropped as noisy. Each survivor is then tested with the
/// force-IRQ command: the line must be quiet before the trigger and
/// answer [`CONFIRMATIONS`] triggers in a row. Rounds repeat while more
/// than one candidate stands, up to a budget.
pub fn probe_irq_candidates<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    port: &DspPort,
    candidates: &[u8],
) -> IoResult<u8> {
    InterruptMaskGuard::with_all_masked(bus, |bus| {
        let mut possible = candidate_mask(candidates);

        for _ in 0..PASSIVE_WATCH_STEPS {
            delay.delay_ms(10);
            for &irq in candidates {
                if possible & (1 << irq) != 0 && pic::irq_pending(bus, irq) {
                    possible &= !(1 << irq);
                }
            }
        }
        if possible == 0 {
            return Err(IoError::ProbeExhausted);
        }

        let mut rounds = 0;
        loop {
            for &irq in candidates {
                if possible & (1 << irq) == 0 {
                    continue;
                }
                // Drop any stale latch, then demand a quiet line.
                port.ack_interrupt(bus);
                if pic::irq_pending(bus, irq) {
                    possible &= !(1 << irq);
                    continue;
                }
                if !confirm_line(bus, delay, port, irq)? {
                    possible &= !(1 << irq);
                }
            }
            rounds += 1;
            if possible.count_ones() <= 1 || rounds >= MAX_ROUNDS {
                break;
            }
        }
        sole_survivor(possible)
    })
}

fn confirm_line<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    port: &DspPort,
    irq: u8,
) -> IoResult<bool> {
    for _ in 0..CONFIRMATIONS {
        port.force_irq(bus, delay)?;
        let mut seen = false;
        for _ in 0..TRIGGER_PATIENCE_MS {
            if pic::irq_pending(bus, irq) {
                seen = true;
                break;
            }
            delay.delay_ms(1);
        }
        port.ack_interrupt(bus);
        if !seen {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Probe the interrupt line with a short DMA playback block instead of
/// the force-IRQ command, for DSPs and clones where that command is
/// unreliable. Tries [`IRQ_CANDIDATES_LITE`] only.
///
/// Needs a working 8-bit DMA channel and a scratch allocation; the
/// transfer is a block of whatever the buffer happens to contain, played
/// for about 1/20 s at a low rate.
pub fn probe_irq_lite<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    port: &DspPort,
    ctl: &DmaController,
    mem: &mut impl DmaMemory,
    channel: u8,
) -> Result<u8> {
    let testlen = PROBE_RATE / 20;
    let mask = ctl.capabilities().limit_mask(channel);
    let mut buf = alloc_buffer(mem, testlen, mask)?;

    let outcome = InterruptMaskGuard::with_all_masked(bus, |bus| -> Result<u8> {
        let mut possible = candidate_mask(&IRQ_CANDIDATES_LITE);
        for &irq in &IRQ_CANDIDATES_LITE {
            delay.delay_ms(10);
            if pic::irq_pending(bus, irq) {
                possible &= !(1 << irq);
            }
        }

        for &irq in &IRQ_CANDIDATES_LITE {
            if possible & (1 << irq) == 0 {
                continue;
            }
            port.ack_interrupt(bus);

            start_test_block(bus, delay, port, ctl, channel, buf.phys(), testlen, false)?;

            let patience = testlen * 1500 / PROBE_RATE;
            let mut seen = false;
            for _ in 0..patience {
                if pic::irq_pending(bus, irq) {
                    seen = true;
                    break;
                }
                delay.delay_ms(1);
            }
            port.ack_interrupt(bus);
            port.reset(bus, delay)?;
            ctl.mask(bus, channel)?;
            if !seen {
                possible &= !(1 << irq);
            }
        }
        sole_survivor(possible).map_err(Error::from)
    });

    buf.free(mem);
    outcome
}

// =============================================================================
// DMA Probing
// =============================================================================

/// Probe the 8-bit DMA channel over [`DMA8_CANDIDATES`].
pub fn probe_dma8<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    port: &DspPort,
    ctl: &DmaController,
    mem: &mut impl DmaMemory,
    quirks: &Quirks,
) -> Result<u8> {
    probe_dma_candidates(bus, delay, port, ctl, mem, quirks, &DMA8_CANDIDATES, false)
}

/// Probe the 16-bit DMA channel over [`DMA16_CANDIDATES`].
pub fn probe_dma16<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    port: &DspPort,
    ctl: &DmaController,
    mem: &mut impl DmaMemory,
    quirks: &Quirks,
) -> Result<u8> {
    probe_dma_candidates(bus, delay, port, ctl, mem, quirks, &DMA16_CANDIDATES, true)
}

/// Probe a DMA channel over an explicit candidate set.
///
/// Candidates whose counters move during a passive watch are in use by
/// something else and get dropped. Each survivor is then programmed with
/// a short test transfer and watched: the channel the card is wired to
/// is the one whose counter moves (or hits terminal count) while the
/// DSP streams.
pub fn probe_dma_candidates<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    port: &DspPort,
    ctl: &DmaController,
    mem: &mut impl DmaMemory,
    quirks: &Quirks,
    candidates: &[u8],
    sixteen_bit: bool,
) -> Result<u8> {
    // VirtualBox completes short blocks so fast the watch can miss them;
    // a longer block keeps the counter observable.
    let test_samples = if quirks.virtualbox {
        PROBE_RATE / 5
    } else {
        PROBE_RATE / 20
    };
    let test_bytes = test_samples << u32::from(sixteen_bit);

    let mut possible = candidate_mask(candidates);
    for &ch in candidates {
        if !ctl.capabilities().has_channel(ch) {
            possible &= !(1 << ch);
            continue;
        }
        let first = ctl.read_count_register(bus, ch)?;
        for _ in 0..PASSIVE_COUNTER_SAMPLES {
            if ctl.read_count_register(bus, ch)? != first {
                possible &= !(1 << ch);
                break;
            }
        }
    }

    for &ch in candidates {
        if possible & (1 << ch) == 0 {
            continue;
        }
        let mut buf = alloc_buffer(mem, test_bytes, ctl.capabilities().limit_mask(ch))?;

        let started = start_test_block(
            bus,
            delay,
            port,
            ctl,
            ch,
            buf.phys(),
            test_samples,
            sixteen_bit,
        );

        let hit = match started {
            Ok(()) => watch_counter(bus, delay, ctl, ch, test_bytes, quirks)?,
            Err(_) => false,
        };

        port.reset(bus, delay)?;
        ctl.mask(bus, ch)?;
        buf.free(mem);

        if hit {
            return Ok(ch);
        }
    }

    Err(IoError::ProbeExhausted.into())
}

/// Kick off a short test transfer on an already-programmed channel.
#[allow(clippy::too_many_arguments)]
fn start_test_block<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    port: &DspPort,
    ctl: &DmaController,
    ch: u8,
    phys: u32,
    samples: u32,
    sixteen_bit: bool,
) -> Result<()> {
    // The channel may not be armed yet when called from the IRQ probe.
    ctl.mask(bus, ch)?;
    ctl.set_single_mode(bus, ch, DmaDirection::MemoryToDevice, false, false)?;
    ctl.write_base(bus, ch, phys)?;
    ctl.write_count(bus, ch, samples << u32::from(sixteen_bit))?;
    ctl.unmask(bus, ch)?;

    let len = (samples - 1) as u16;
    if sixteen_bit {
        port.write(bus, delay, dsp::CMD_SET_OUTPUT_RATE)?;
        port.write(bus, delay, (PROBE_RATE >> 8) as u8)?;
        port.write(bus, delay, PROBE_RATE as u8)?;
        port.write(bus, delay, dsp::CMD_4XX_16BIT | dsp::fifo4xx::CMD_FIFO)?;
        port.write(bus, delay, dsp::fifo4xx::MODE_SIGNED)?;
        port.write(bus, delay, len as u8)?;
        port.write(bus, delay, (len >> 8) as u8)?;
    } else {
        port.write(bus, delay, dsp::CMD_SET_TIME_CONSTANT)?;
        port.write(bus, delay, dsp::time_constant(PROBE_RATE))?;
        port.write(bus, delay, dsp::CMD_SINGLE_OUT)?;
        port.write(bus, delay, len as u8)?;
        port.write(bus, delay, (len >> 8) as u8)?;
    }
    Ok(())
}

/// Watch a channel's counter for signs of the test transfer.
fn watch_counter<B: IsaBus>(
    bus: &mut B,
    delay: &mut impl DelayNs,
    ctl: &DmaController,
    ch: u8,
    programmed_bytes: u32,
    quirks: &Quirks,
) -> Result<bool> {
    let patience = programmed_bytes * 1500 / PROBE_RATE;
    let mut moved = false;
    for _ in 0..patience.max(1) {
        let rem = ctl.remaining_bytes(bus, ch)?;
        if rem <= 2 {
            return Ok(true);
        }
        if rem < programmed_bytes {
            moved = true;
        } else if moved && quirks.virtualbox {
            // VirtualBox snaps the counter back to the programmed value
            // at terminal count.
            return Ok(true);
        }
        delay.delay_ms(1);
    }
    Ok(moved)
}

// =============================================================================
// Unit Tests
// =============================================================================
