//! Note-to-period derivation and period-to-increment conversion.
//!
//! Notes index a fixed 64-entry Amiga period table. The period is scaled by
//! the channel finetune plus a per-op detune with a fixed-point
//! multiply-shift; vibrato is applied on top of the result at commit time.

/// PAL Paula clock in Hz.
pub const PAULA_CLOCK: u32 = 3_546_895;

/// Period table indexed by note (0-63). The top octave repeats.
pub const PERIOD_TABLE: [u16; 64] = [
    0x6AE, 0x64E, 0x5F4, 0x59E, 0x54D, 0x501, 0x4B9, 0x475, 0x435, 0x3F9, 0x3C0, 0x38C,
    0x358, 0x32A, 0x2FC, 0x2D0, 0x2A8, 0x282, 0x25E, 0x23B, 0x21B, 0x1FD, 0x1E0, 0x1C6,
    0x1AC, 0x194, 0x17D, 0x168, 0x154, 0x140, 0x12F, 0x11E, 0x10E, 0x0FE, 0x0F0, 0x0E3,
    0x0D6, 0x0CA, 0x0BF, 0x0B4, 0x0AA, 0x0A0, 0x097, 0x08F, 0x087, 0x07F, 0x078, 0x071,
    0x0D6, 0x0CA, 0x0BF, 0x0B4, 0x0AA, 0x0A0, 0x097, 0x08F, 0x087, 0x07F, 0x078, 0x071,
    0x0D6, 0x0CA, 0x0BF, 0x0B4,
];

/// Wrap a (possibly out-of-range) note into the table.
pub fn wrap_note(note: i16) -> u8 {
    (note & 0x3F) as u8
}

/// Derive the period for `note` scaled by `finetune + detune` (in 1/256ths).
///
/// A zero scale offset returns the table value unchanged.
pub fn note_period(note: i16, finetune: i8, detune: i8) -> u16 {
    let base = PERIOD_TABLE[wrap_note(note) as usize] as i32;
    let scale = (0x100 + finetune as i32 + detune as i32).max(1);
    ((base * scale) >> 8) as u16
}

/// Apply a vibrato offset (in 1/2048ths) to a period without changing it.
pub fn vibrato_period(period: u16, offset: i16) -> u16 {
    let scaled = (period as i32 * (0x800 + offset as i32)) >> 11;
    scaled.clamp(0, u16::MAX as i32) as u16
}

/// One multiplicative glide step from `current` toward `target`.
///
/// Moves by `rate / 256` of the current period, at least one unit, and never
/// past the target.
pub fn glide_step(current: u16, target: u16, rate: u16) -> u16 {
    let cur = current as i32;
    let tgt = target as i32;
    let r = rate.min(0xFF) as i32;
    if cur < tgt {
        ((cur * (0x100 + r)) >> 8).max(cur + 1).min(tgt) as u16
    } else if cur > tgt {
        ((cur * (0x100 - r)) >> 8).min(cur - 1).max(tgt) as u16
    } else {
        target
    }
}

/// Convert a period to a 16.16 fixed-point increment at `sample_rate`.
pub fn period_to_increment(period: u16, sample_rate: u32) -> u32 {
    if period == 0 || sample_rate == 0 {
        return 0;
    }
    ((PAULA_CLOCK as u64 * 65536) / (period as u64 * sample_rate as u64)) as u32
}
