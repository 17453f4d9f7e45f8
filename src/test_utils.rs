//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the driver on the
//! host without hardware access: a port-level simulation of the 8237, the
//! 8259 pair, and the DSP command protocol, plus a DMA memory allocator
//! with controllable placements.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use std::collections::VecDeque;
use std::vec::Vec;

use crate::hal::{DmaMemory, DmaRegion, IsaBus};
use crate::register::{dma, dsp, pic};

// =============================================================================
// Mock ISA Bus
// =============================================================================

/// Port-level simulation of the hardware the driver programs.
///
/// Models enough of each device for protocol-level testing:
///
/// - 8237 pair: base/page/count/mode/mask registers, the shared byte
///   flip-flop, and a live transfer counter per channel that can be set
///   statically or scripted one value per 16-bit sample.
/// - 8259 pair: mask registers and the IRR, with OCW3 read selection.
///   Lines can be made "noisy" (re-asserting on every IRR read).
/// - DSP: reset handshake, command parsing with per-command argument
///   counts, version/copyright responses, the mixer window, the ESS
///   extended-register window, and an interrupt line raised by the
///   force-IRQ command and cleared by the acknowledge read.
#[derive(Debug)]
pub struct MockIsaBus {
    // 8237
    secondary_present: bool,
    flipflop: [bool; 2],
    base: [u16; 8],
    page: [u8; 8],
    count_programmed: [u16; 8],
    counter: [u16; 8],
    counter_script: [VecDeque<u16>; 8],
    auto_decrement: [u16; 8],
    arm_on_transfer: Option<(u8, u16)>,
    irq_on_transfer: bool,
    virtualbox_counter: bool,
    latched: [u16; 8],
    masked: [bool; 8],
    mode: [u8; 8],

    // 8259
    master_mask: u8,
    slave_mask: u8,
    master_irr: u8,
    slave_irr: u8,
    noisy_master: u8,
    noisy_slave: u8,
    read_isr: [bool; 2],

    // DSP
    dsp_base: u16,
    dsp_present: bool,
    reset_high: bool,
    resets: usize,
    out_queue: VecDeque<u8>,
    version: (u8, u8),
    version_script: VecDeque<(u8, u8)>,
    copyright: &'static [u8],
    ess_mode: bool,
    ess_regs: [u8; 0x20],
    cur_cmd: u8,
    pending_args: u8,
    cur_args: Vec<u8>,
    commands: Vec<(u8, Vec<u8>)>,
    sb_irq: Option<u8>,
    sb_irq_extra: Option<u8>,
    irq_asserted: bool,
    ack8: usize,
    ack16: usize,
    write_busy: bool,
    mixer_index: u8,
    mixer: [u8; 256],

    /// Every outb in order, for raw sequence assertions.
    pub write_log: Vec<(u16, u8)>,
}

impl Default for MockIsaBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIsaBus {
    pub fn new() -> Self {
        Self {
            secondary_present: true,
            flipflop: [false; 2],
            base: [0; 8],
            page: [0; 8],
            count_programmed: [0; 8],
            counter: [0; 8],
            counter_script: Default::default(),
            auto_decrement: [0; 8],
            arm_on_transfer: None,
            irq_on_transfer: false,
            virtualbox_counter: false,
            latched: [0; 8],
            masked: [true; 8],
            mode: [0; 8],
            master_mask: 0xFF,
            slave_mask: 0xFF,
            master_irr: 0,
            slave_irr: 0,
            noisy_master: 0,
            noisy_slave: 0,
            read_isr: [false; 2],
            dsp_base: 0x220,
            dsp_present: true,
            reset_high: false,
            resets: 0,
            out_queue: VecDeque::new(),
            version: (4, 5),
            version_script: VecDeque::new(),
            copyright: b"COPYRIGHT (C) CREATIVE TECHNOLOGY LTD, 1992.\0",
            ess_mode: false,
            ess_regs: [0; 0x20],
            cur_cmd: 0,
            pending_args: 0,
            cur_args: Vec::new(),
            commands: Vec::new(),
            sb_irq: None,
            sb_irq_extra: None,
            irq_asserted: false,
            ack8: 0,
            ack16: 0,
            write_busy: false,
            mixer_index: 0,
            mixer: [0; 256],
            write_log: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Pretend the secondary 8237 is absent (XT-class machine).
    pub fn remove_secondary_dma(&mut self) {
        self.secondary_present = false;
    }

    /// Make the DSP not respond to resets.
    pub fn remove_dsp(&mut self) {
        self.dsp_present = false;
    }

    pub fn set_dsp_base(&mut self, base: u16) {
        self.dsp_base = base;
    }

    pub fn set_version(&mut self, major: u8, minor: u8) {
        self.version = (major, minor);
    }

    /// Queue version responses consumed one per version query before
    /// falling back to the fixed version.
    pub fn script_versions(&mut self, versions: &[(u8, u8)]) {
        self.version_script.extend(versions.iter().copied());
    }

    pub fn set_copyright(&mut self, text: &'static [u8]) {
        self.copyright = text;
    }

    /// Parse ESS extended-register command pairs instead of the 4.xx
    /// command family.
    pub fn set_ess_mode(&mut self, ess: bool) {
        self.ess_mode = ess;
    }

    /// Interrupt line the DSP raises on the force-IRQ command.
    pub fn set_sb_irq(&mut self, irq: Option<u8>) {
        self.sb_irq = irq;
    }

    /// Wire a second line that also answers the trigger, as when another
    /// device shares the jumper setting.
    pub fn wire_extra_irq(&mut self, irq: u8) {
        self.sb_irq_extra = Some(irq);
    }

    pub fn set_write_busy(&mut self, busy: bool) {
        self.write_busy = busy;
    }

    pub fn set_pic_masks(&mut self, master: u8, slave: u8) {
        self.master_mask = master;
        self.slave_mask = slave;
    }

    pub fn set_pic_irr(&mut self, master: u8, slave: u8) {
        self.master_irr = master;
        self.slave_irr = slave;
    }

    /// Make a line re-assert itself on every IRR read.
    pub fn set_noisy_irq(&mut self, irq: u8) {
        if irq < 8 {
            self.noisy_master |= 1 << irq;
        } else {
            self.noisy_slave |= 1 << (irq - 8);
        }
    }

    pub fn set_dma_counter(&mut self, ch: u8, value: u16) {
        self.counter[ch as usize] = value;
    }

    /// Queue counter samples, consumed one per 16-bit counter read. The
    /// last value sticks once the script runs dry.
    pub fn script_dma_counter(&mut self, ch: u8, values: Vec<u16>) {
        self.counter_script[ch as usize] = values.into();
    }

    /// Make a channel's counter count down by `step` units per sample,
    /// as if something were driving it right now.
    pub fn set_dma_auto_decrement(&mut self, ch: u8, step: u16) {
        self.auto_decrement[ch as usize] = step;
    }

    /// Start counting down on `ch` only once the DSP receives a
    /// transfer-start command (the channel a working card is wired to).
    pub fn arm_counter_on_transfer(&mut self, ch: u8, step: u16) {
        self.arm_on_transfer = Some((ch, step));
    }

    /// Model the VirtualBox counter bug: at terminal count the register
    /// snaps back to the programmed value instead of holding 0xFFFF.
    pub fn set_virtualbox_counter(&mut self, on: bool) {
        self.virtualbox_counter = on;
    }

    /// Raise the configured interrupt line as soon as the DSP receives a
    /// transfer-start command, as if the short block completed at once.
    pub fn set_irq_on_transfer(&mut self, on: bool) {
        self.irq_on_transfer = on;
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn pic_masks(&self) -> (u8, u8) {
        (self.master_mask, self.slave_mask)
    }

    pub fn dma_base(&self, ch: u8) -> u16 {
        self.base[ch as usize]
    }

    pub fn dma_page(&self, ch: u8) -> u8 {
        self.page[ch as usize]
    }

    pub fn dma_count(&self, ch: u8) -> u16 {
        self.count_programmed[ch as usize]
    }

    pub fn dma_mode(&self, ch: u8) -> u8 {
        self.mode[ch as usize]
    }

    pub fn dma_masked(&self, ch: u8) -> bool {
        self.masked[ch as usize]
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn irq_asserted(&self) -> bool {
        self.irq_asserted
    }

    pub fn ack8_count(&self) -> usize {
        self.ack8
    }

    pub fn ack16_count(&self) -> usize {
        self.ack16
    }

    /// Parsed DSP commands with their argument bytes, in order.
    pub fn dsp_commands(&self) -> &[(u8, Vec<u8>)] {
        &self.commands
    }

    /// How many times `cmd` was issued.
    pub fn dsp_command_count(&self, cmd: u8) -> usize {
        self.commands.iter().filter(|(c, _)| *c == cmd).count()
    }

    /// Arguments of the last occurrence of `cmd`, if any.
    pub fn dsp_last_args(&self, cmd: u8) -> Option<&[u8]> {
        self.commands
            .iter()
            .rev()
            .find(|(c, _)| *c == cmd)
            .map(|(_, args)| args.as_slice())
    }

    pub fn clear_dsp_log(&mut self) {
        self.commands.clear();
        self.write_log.clear();
    }

    pub fn mixer_reg(&self, index: u8) -> u8 {
        self.mixer[index as usize]
    }

    pub fn set_mixer_reg(&mut self, index: u8, value: u8) {
        self.mixer[index as usize] = value;
    }

    pub fn ess_reg(&self, index: u8) -> u8 {
        self.ess_regs[(index as usize) & 0x1F]
    }

    pub fn set_ess_reg(&mut self, index: u8, value: u8) {
        self.ess_regs[(index as usize) & 0x1F] = value;
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn controller(port: u16) -> usize {
        usize::from(port >= 0xC0)
    }

    fn counter_sample(&mut self, ch: usize) -> u16 {
        if let Some(v) = self.counter_script[ch].pop_front() {
            self.counter[ch] = v;
            return self.counter[ch];
        }
        let step = self.auto_decrement[ch];
        if step > 0 && self.counter[ch] != dma::TERMINAL_COUNT {
            self.counter[ch] = match self.counter[ch].checked_sub(step) {
                Some(v) => v,
                None => {
                    self.auto_decrement[ch] = 0;
                    if self.virtualbox_counter {
                        self.count_programmed[ch]
                    } else {
                        dma::TERMINAL_COUNT
                    }
                }
            };
        }
        self.counter[ch]
    }

    fn dma_outb(&mut self, port: u16, value: u8) {
        if !self.secondary_present && (0xC0..=0xDF).contains(&port) {
            return;
        }
        match port {
            dma::PRIMARY_FLIPFLOP => self.flipflop[0] = false,
            dma::SECONDARY_FLIPFLOP => self.flipflop[1] = false,
            dma::PRIMARY_SINGLE_MASK | dma::SECONDARY_SINGLE_MASK => {
                let ch = usize::from(value & 3) + if port >= 0xC0 { 4 } else { 0 };
                self.masked[ch] = value & dma::MASK_SET != 0;
            }
            dma::PRIMARY_MODE | dma::SECONDARY_MODE => {
                let ch = usize::from(value & 3) + if port >= 0xC0 { 4 } else { 0 };
                self.mode[ch] = value;
            }
            _ => {
                // Base or count register of some channel.
                let (ch, is_count) = if port < 0x08 {
                    ((port / 2) as usize, port % 2 == 1)
                } else if (0xC0..=0xCF).contains(&port) {
                    let off = port - dma::SECONDARY_BASE;
                    ((4 + off / 4) as usize, off % 4 == 2)
                } else {
                    return;
                };
                let ctl = Self::controller(port);
                let reg = if is_count {
                    &mut self.count_programmed[ch]
                } else {
                    &mut self.base[ch]
                };
                if self.flipflop[ctl] {
                    *reg = (*reg & 0x00FF) | (u16::from(value) << 8);
                } else {
                    *reg = (*reg & 0xFF00) | u16::from(value);
                }
                self.flipflop[ctl] = !self.flipflop[ctl];
                if is_count && !self.flipflop[ctl] {
                    // Full count written; the live counter restarts there.
                    self.counter[ch] = self.count_programmed[ch];
                }
            }
        }
    }

    fn dma_inb(&mut self, port: u16) -> u8 {
        if !self.secondary_present && (0xC0..=0xDF).contains(&port) {
            return 0xFF;
        }
        let (ch, is_count) = if port < 0x08 {
            ((port / 2) as usize, port % 2 == 1)
        } else if (0xC0..=0xCF).contains(&port) {
            let off = port - dma::SECONDARY_BASE;
            ((4 + off / 4) as usize, off % 4 == 2)
        } else {
            return 0xFF;
        };
        let ctl = Self::controller(port);
        let value = if self.flipflop[ctl] {
            (self.latched[ch] >> 8) as u8
        } else {
            self.latched[ch] = if is_count {
                self.counter_sample(ch)
            } else {
                self.base[ch]
            };
            self.latched[ch] as u8
        };
        self.flipflop[ctl] = !self.flipflop[ctl];
        value
    }

    fn pic_outb(&mut self, port: u16, value: u8) {
        match port {
            pic::MASTER_DATA => self.master_mask = value,
            pic::SLAVE_DATA => self.slave_mask = value,
            pic::MASTER_CMD | pic::SLAVE_CMD => {
                let i = usize::from(port == pic::SLAVE_CMD);
                match value {
                    pic::OCW3_READ_IRR => self.read_isr[i] = false,
                    pic::OCW3_READ_ISR => self.read_isr[i] = true,
                    _ => {} // EOI and friends
                }
            }
            _ => unreachable!(),
        }
    }

    fn pic_inb(&mut self, port: u16) -> u8 {
        match port {
            pic::MASTER_DATA => self.master_mask,
            pic::SLAVE_DATA => self.slave_mask,
            pic::MASTER_CMD => {
                self.master_irr |= self.noisy_master;
                if self.read_isr[0] { 0 } else { self.master_irr }
            }
            pic::SLAVE_CMD => {
                self.slave_irr |= self.noisy_slave;
                if self.read_isr[1] { 0 } else { self.slave_irr }
            }
            _ => unreachable!(),
        }
    }

    fn raise_sb_irq(&mut self) {
        for irq in [self.sb_irq, self.sb_irq_extra].into_iter().flatten() {
            if irq < 8 {
                self.master_irr |= 1 << irq;
            } else {
                self.slave_irr |= 1 << (irq - 8);
            }
            self.irq_asserted = true;
        }
    }

    fn clear_sb_irq(&mut self) {
        for irq in [self.sb_irq, self.sb_irq_extra].into_iter().flatten() {
            if irq < 8 {
                self.master_irr &= !(1 << irq);
            } else {
                self.slave_irr &= !(1 << (irq - 8));
            }
        }
        self.irq_asserted = false;
    }

    fn arg_count(&self, cmd: u8) -> u8 {
        if self.ess_mode && (0xA0..=0xC0).contains(&cmd) {
            return 1;
        }
        match cmd {
            dsp::CMD_DIRECT_DAC_OUT | dsp::CMD_SET_TIME_CONSTANT => 1,
            dsp::CMD_SINGLE_OUT
            | dsp::CMD_SINGLE_IN
            | dsp::CMD_ADPCM_2BIT
            | dsp::CMD_ADPCM_2BIT_REF
            | dsp::CMD_ADPCM_4BIT
            | dsp::CMD_ADPCM_4BIT_REF
            | dsp::CMD_ADPCM_26BIT
            | dsp::CMD_ADPCM_26BIT_REF
            | dsp::CMD_SET_OUTPUT_RATE
            | dsp::CMD_SET_INPUT_RATE
            | dsp::CMD_SET_BLOCK_SIZE => 2,
            0xB0..=0xBF | 0xC0..=0xCF => 3,
            _ => 0,
        }
    }

    fn is_transfer_start(&self, cmd: u8, args: &[u8]) -> bool {
        if self.ess_mode {
            return cmd == 0xB8 && args.first().is_some_and(|v| v & 1 != 0);
        }
        matches!(
            cmd,
            0x14 | 0x24
                | 0x1C
                | 0x2C
                | 0x90
                | 0x91
                | 0x98
                | 0x99
                | 0x16
                | 0x17
                | 0x1F
                | 0x74..=0x77
                | 0x7D
                | 0x7F
                | 0xB0..=0xCF
        )
    }

    fn finish_dsp_command(&mut self) {
        let cmd = self.cur_cmd;
        let args = core::mem::take(&mut self.cur_args);
        if self.is_transfer_start(cmd, &args) {
            if let Some((ch, step)) = self.arm_on_transfer {
                self.auto_decrement[ch as usize] = step;
            }
            if self.irq_on_transfer {
                self.raise_sb_irq();
            }
        }
        match cmd {
            dsp::CMD_GET_VERSION => {
                let (maj, min) = self.version_script.pop_front().unwrap_or(self.version);
                self.out_queue.push_back(maj);
                self.out_queue.push_back(min);
            }
            dsp::CMD_GET_COPYRIGHT => {
                self.out_queue.extend(self.copyright.iter().copied());
            }
            dsp::CMD_FORCE_IRQ => self.raise_sb_irq(),
            _ if self.ess_mode && (0xA0..=0xBF).contains(&cmd) => {
                self.ess_regs[(cmd as usize) & 0x1F] = args[0];
            }
            _ if self.ess_mode && cmd == dsp::ESS_READ_PREFIX => {
                let v = self.ess_regs[(args[0] as usize) & 0x1F];
                self.out_queue.push_back(v);
            }
            _ => {}
        }
        self.commands.push((cmd, args));
    }

    fn dsp_outb(&mut self, offset: u16, value: u8) {
        match offset {
            dsp::RESET => {
                if value != 0 {
                    self.reset_high = true;
                } else {
                    if self.reset_high && self.dsp_present {
                        self.out_queue.clear();
                        self.out_queue.push_back(dsp::RESET_READY);
                        self.pending_args = 0;
                        self.cur_args.clear();
                        self.auto_decrement = [0; 8];
                        self.resets += 1;
                    }
                    self.reset_high = false;
                }
            }
            dsp::WRITE => {
                if self.pending_args > 0 {
                    self.cur_args.push(value);
                    self.pending_args -= 1;
                    if self.pending_args == 0 {
                        self.finish_dsp_command();
                    }
                } else {
                    self.cur_cmd = value;
                    self.pending_args = self.arg_count(value);
                    if self.pending_args == 0 {
                        self.finish_dsp_command();
                    }
                }
            }
            dsp::MIXER_INDEX => self.mixer_index = value,
            dsp::MIXER_DATA => self.mixer[self.mixer_index as usize] = value,
            _ => {}
        }
    }

    fn dsp_inb(&mut self, offset: u16) -> u8 {
        match offset {
            dsp::READ_DATA => self.out_queue.pop_front().unwrap_or(0xFF),
            dsp::WRITE => {
                if self.write_busy {
                    dsp::WRITE_BUSY
                } else {
                    0x00
                }
            }
            dsp::READ_STATUS => {
                self.ack8 += 1;
                self.clear_sb_irq();
                if self.out_queue.is_empty() {
                    0x00
                } else {
                    dsp::DATA_AVAILABLE
                }
            }
            dsp::READ_STATUS16 => {
                self.ack16 += 1;
                self.clear_sb_irq();
                0x00
            }
            dsp::MIXER_DATA => self.mixer[self.mixer_index as usize],
            _ => 0xFF,
        }
    }
}

impl IsaBus for MockIsaBus {
    fn inb(&mut self, port: u16) -> u8 {
        if port >= self.dsp_base && port < self.dsp_base + 0x10 {
            return self.dsp_inb(port - self.dsp_base);
        }
        match port {
            0x00..=0x0C | 0xC0..=0xD8 => self.dma_inb(port),
            pic::MASTER_CMD | pic::MASTER_DATA | pic::SLAVE_CMD | pic::SLAVE_DATA => {
                self.pic_inb(port)
            }
            _ => 0xFF,
        }
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.write_log.push((port, value));
        if port >= self.dsp_base && port < self.dsp_base + 0x10 {
            return self.dsp_outb(port - self.dsp_base, value);
        }
        match port {
            0x00..=0x0C | 0xC0..=0xD8 => self.dma_outb(port, value),
            pic::MASTER_CMD | pic::MASTER_DATA | pic::SLAVE_CMD | pic::SLAVE_DATA => {
                self.pic_outb(port, value);
            }
            _ => {
                if let Some(ch) = dma::PAGE_PORT_AT.iter().position(|&p| p == port) {
                    self.page[ch] = value;
                }
            }
        }
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay for testing without actual timing
///
/// Records delays for verification without actually waiting.
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total nanoseconds that were "delayed"
    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    /// Get total milliseconds that were "delayed"
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }

    pub fn reset(&mut self) {
        self.total_ns = 0;
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// =============================================================================
// Mock DMA Memory
// =============================================================================

#[derive(Debug)]
enum PlacementPolicy {
    /// Successive allocations land at these addresses; exhausted = refuse.
    Scripted(VecDeque<u32>),
    /// Every allocation lands at the same address.
    Fixed(u32),
    /// Every allocation straddles `boundary` (last byte before, rest after).
    Straddle(u32),
    /// Every allocation refused.
    Empty,
}

/// DMA memory allocator with controllable placements.
#[derive(Debug)]
pub struct MockDmaMemory {
    policy: PlacementPolicy,
    live: Vec<DmaRegion>,
    free_calls: usize,
    alloc_live_flags: Vec<bool>,
}

impl MockDmaMemory {
    fn with_policy(policy: PlacementPolicy) -> Self {
        Self {
            policy,
            live: Vec::new(),
            free_calls: 0,
            alloc_live_flags: Vec::new(),
        }
    }

    pub fn with_placements(placements: Vec<u32>) -> Self {
        Self::with_policy(PlacementPolicy::Scripted(placements.into()))
    }

    pub fn fixed_at(phys: u32) -> Self {
        Self::with_policy(PlacementPolicy::Fixed(phys))
    }

    /// Allocator that places every region across the boundary ending at
    /// `boundary` (inclusive byte-address mask).
    pub fn straddle_always(boundary: u32) -> Self {
        Self::with_policy(PlacementPolicy::Straddle(boundary))
    }

    pub fn empty() -> Self {
        Self::with_policy(PlacementPolicy::Empty)
    }

    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    pub fn free_calls(&self) -> usize {
        self.free_calls
    }

    /// Whether the second allocation request arrived while the first
    /// region was still held.
    pub fn second_alloc_overlapped_first(&self) -> bool {
        self.alloc_live_flags.get(1).copied().unwrap_or(false)
    }
}

impl DmaMemory for MockDmaMemory {
    fn alloc(&mut self, len: u32) -> Option<DmaRegion> {
        let phys = match &mut self.policy {
            PlacementPolicy::Scripted(q) => q.pop_front()?,
            PlacementPolicy::Fixed(p) => *p,
            PlacementPolicy::Straddle(boundary) => *boundary, // last byte before the line
            PlacementPolicy::Empty => return None,
        };
        self.alloc_live_flags.push(!self.live.is_empty());
        let region = DmaRegion { phys, len };
        self.live.push(region);
        Some(region)
    }

    fn free(&mut self, region: DmaRegion) {
        self.free_calls += 1;
        if let Some(i) = self.live.iter().position(|r| *r == region) {
            self.live.swap_remove(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::dsp as dspreg;

    #[test]
    fn dsp_reset_handshake() {
        let mut bus = MockIsaBus::new();
        bus.outb(0x226, 1);
        bus.outb(0x226, 0);
        assert_eq!(bus.resets(), 1);
        assert_ne!(bus.inb(0x22E) & dspreg::DATA_AVAILABLE, 0);
        assert_eq!(bus.inb(0x22A), dspreg::RESET_READY);
        assert_eq!(bus.inb(0x22E) & dspreg::DATA_AVAILABLE, 0);
    }

    #[test]
    fn dsp_version_query() {
        let mut bus = MockIsaBus::new();
        bus.set_version(3, 2);
        bus.outb(0x22C, dspreg::CMD_GET_VERSION);
        assert_eq!(bus.inb(0x22A), 3);
        assert_eq!(bus.inb(0x22A), 2);
    }

    #[test]
    fn dsp_command_argument_grouping() {
        let mut bus = MockIsaBus::new();
        bus.outb(0x22C, dspreg::CMD_SET_TIME_CONSTANT);
        bus.outb(0x22C, 0xD2);
        bus.outb(0x22C, dspreg::CMD_SINGLE_OUT);
        bus.outb(0x22C, 0xFF);
        bus.outb(0x22C, 0x0F);

        let cmds = bus.dsp_commands();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].0, dspreg::CMD_SET_TIME_CONSTANT);
        assert_eq!(cmds[0].1, std::vec![0xD2]);
        assert_eq!(cmds[1].1, std::vec![0xFF, 0x0F]);
    }

    #[test]
    fn force_irq_raises_and_ack_clears() {
        let mut bus = MockIsaBus::new();
        bus.set_sb_irq(Some(5));
        bus.outb(0x22C, dspreg::CMD_FORCE_IRQ);
        assert!(bus.irq_asserted());
        assert!(crate::hal::pic::irq_pending(&mut bus, 5));
        let _ = bus.inb(0x22E);
        assert!(!bus.irq_asserted());
    }

    #[test]
    fn ess_register_window() {
        let mut bus = MockIsaBus::new();
        bus.set_ess_mode(true);
        bus.outb(0x22C, 0xB8);
        bus.outb(0x22C, 0x05);
        assert_eq!(bus.ess_reg(0xB8), 0x05);

        bus.outb(0x22C, dspreg::ESS_READ_PREFIX);
        bus.outb(0x22C, 0xB8);
        assert_eq!(bus.inb(0x22A), 0x05);
    }

    #[test]
    fn mixer_window() {
        let mut bus = MockIsaBus::new();
        bus.outb(0x224, 0x0E);
        bus.outb(0x225, 0x22);
        assert_eq!(bus.mixer_reg(0x0E), 0x22);
        bus.outb(0x224, 0x0E);
        assert_eq!(bus.inb(0x225), 0x22);
    }
}
