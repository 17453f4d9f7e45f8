//! 8237 DMA Controller Register Definitions
//!
//! Two cascaded 8237 controllers serve the ISA bus: the primary controller
//! handles 8-bit channels 0-3, the secondary handles 16-bit channels 4-7.
//! Channel 4 is the cascade link between the two and never carries data.
//!
//! The secondary controller's registers are spaced two ports apart and its
//! channels transfer 16-bit words, so their base address and count are
//! programmed in words with the low address bit dropped.

// =============================================================================
// Controller Ports
// =============================================================================

/// Primary controller (channels 0-3) register base
pub const PRIMARY_BASE: u16 = 0x00;
/// Primary controller single channel mask port
pub const PRIMARY_SINGLE_MASK: u16 = 0x0A;
/// Primary controller mode port
pub const PRIMARY_MODE: u16 = 0x0B;
/// Primary controller byte flip-flop reset port
pub const PRIMARY_FLIPFLOP: u16 = 0x0C;

/// Secondary controller (channels 4-7) register base
pub const SECONDARY_BASE: u16 = 0xC0;
/// Secondary controller single channel mask port
pub const SECONDARY_SINGLE_MASK: u16 = 0xD4;
/// Secondary controller mode port
pub const SECONDARY_MODE: u16 = 0xD6;
/// Secondary controller byte flip-flop reset port
pub const SECONDARY_FLIPFLOP: u16 = 0xD8;

/// Page register port for each channel (AT mapping, channels 0-7)
pub const PAGE_PORT_AT: [u16; 8] = [0x87, 0x83, 0x81, 0x82, 0x8F, 0x8B, 0x89, 0x8A];

/// Page register port for each channel (XT mapping; the secondary
/// controller does not exist and its slots all alias channel 4's port)
pub const PAGE_PORT_XT: [u16; 8] = [0x87, 0x83, 0x81, 0x82, 0x8F, 0x8F, 0x8F, 0x8F];

/// Base address port for a channel
#[inline]
pub const fn base_port(ch: u8) -> u16 {
    if ch < 4 {
        PRIMARY_BASE + (ch as u16) * 2
    } else {
        SECONDARY_BASE + ((ch as u16) - 4) * 4
    }
}

/// Count port for a channel
#[inline]
pub const fn count_port(ch: u8) -> u16 {
    if ch < 4 {
        PRIMARY_BASE + (ch as u16) * 2 + 1
    } else {
        SECONDARY_BASE + ((ch as u16) - 4) * 4 + 2
    }
}

/// Single channel mask port for the controller owning `ch`
#[inline]
pub const fn single_mask_port(ch: u8) -> u16 {
    if ch < 4 { PRIMARY_SINGLE_MASK } else { SECONDARY_SINGLE_MASK }
}

/// Mode port for the controller owning `ch`
#[inline]
pub const fn mode_port(ch: u8) -> u16 {
    if ch < 4 { PRIMARY_MODE } else { SECONDARY_MODE }
}

/// Byte flip-flop reset port for the controller owning `ch`
#[inline]
pub const fn flipflop_port(ch: u8) -> u16 {
    if ch < 4 { PRIMARY_FLIPFLOP } else { SECONDARY_FLIPFLOP }
}

// =============================================================================
// Single Mask Register Bits
// =============================================================================

/// Channel select field (low two bits)
#[inline]
pub const fn mask_channel(ch: u8) -> u8 {
    ch & 3
}

/// Set bit: 1 = mask (disable) the channel, 0 = unmask
pub const MASK_SET: u8 = 1 << 2;

// =============================================================================
// Mode Register Bits
// =============================================================================

/// Channel select field (low two bits)
#[inline]
pub const fn mode_channel(ch: u8) -> u8 {
    ch & 3
}

/// Transfer type: verify (no transfer)
pub const MODE_XFER_VERIFY: u8 = 0 << 2;
/// Transfer type: write to memory (device -> memory, i.e. record)
pub const MODE_XFER_WRITE: u8 = 1 << 2;
/// Transfer type: read from memory (memory -> device, i.e. playback)
pub const MODE_XFER_READ: u8 = 2 << 2;

/// Auto-initialize: reload base/count and restart at terminal count
pub const MODE_AUTOINIT: u8 = 1 << 4;
/// Address decrement instead of increment
pub const MODE_ADDR_DECREMENT: u8 = 1 << 5;

/// Mode select: demand transfer
pub const MODE_SEL_DEMAND: u8 = 0 << 6;
/// Mode select: single transfer
pub const MODE_SEL_SINGLE: u8 = 1 << 6;
/// Mode select: block transfer
pub const MODE_SEL_BLOCK: u8 = 2 << 6;
/// Mode select: cascade (controller linkage, never used for data)
pub const MODE_SEL_CASCADE: u8 = 3 << 6;

// =============================================================================
// Counter Semantics
// =============================================================================

/// Value the count register returns at terminal count on conforming hardware
pub const TERMINAL_COUNT: u16 = 0xFFFF;

/// Transfer boundary mask for 8-bit channels (64 KiB)
pub const LIMIT_MASK_8BIT: u32 = 0xFFFF;

/// Transfer boundary mask for 128K-capable 16-bit channels
pub const LIMIT_MASK_16BIT_128K: u32 = 0x1_FFFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_channel_ports() {
        assert_eq!(base_port(0), 0x00);
        assert_eq!(count_port(0), 0x01);
        assert_eq!(base_port(1), 0x02);
        assert_eq!(count_port(3), 0x07);
        assert_eq!(single_mask_port(1), 0x0A);
        assert_eq!(mode_port(2), 0x0B);
        assert_eq!(flipflop_port(3), 0x0C);
    }

    #[test]
    fn secondary_channel_ports() {
        assert_eq!(base_port(5), 0xC4);
        assert_eq!(count_port(5), 0xC6);
        assert_eq!(base_port(7), 0xCC);
        assert_eq!(count_port(7), 0xCE);
        assert_eq!(single_mask_port(6), 0xD4);
        assert_eq!(mode_port(5), 0xD6);
        assert_eq!(flipflop_port(7), 0xD8);
    }

    #[test]
    fn page_ports_unique_on_at() {
        for (i, a) in PAGE_PORT_AT.iter().enumerate() {
            for (j, b) in PAGE_PORT_AT.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "page ports {i} and {j} collide");
                }
            }
        }
    }

    #[test]
    fn mode_bits_compose() {
        let mode = mode_channel(5) | MODE_XFER_READ | MODE_SEL_SINGLE;
        assert_eq!(mode, 0x49);
    }
}
