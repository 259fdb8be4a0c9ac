//! Channel register sink and the per-tick two-phase commit.
//!
//! During a tick every component writes into per-channel shadow registers.
//! `commit` then pushes them to the sink in one pass: start/length only while
//! the channel's DMA is idle, period and volume always, and a single
//! enable-mask write at the end.

use mt_ir::Address;

use crate::channel::ChannelState;

/// Write ports of N hardware playback channels.
///
/// The engine only ever borrows a sink for the duration of one tick.
pub trait ChannelRegisters {
    /// Whether the channel's buffer is currently being read.
    fn dma_active(&self, channel: usize) -> bool;
    fn write_start(&mut self, channel: usize, start: Address);
    /// Length in words.
    fn write_length(&mut self, channel: usize, words: u16);
    fn write_period(&mut self, channel: usize, period: u16);
    /// Volume 0-64.
    fn write_volume(&mut self, channel: usize, volume: u8);
    /// Bit N set enables channel N.
    fn write_dma_mask(&mut self, mask: u8);
}

/// Pending register values for one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowRegisters {
    pub start: Address,
    /// Length in words
    pub length: u16,
    /// Start/length changed since the last successful commit
    pub dirty: bool,
    /// Clear this channel's enable bit at the next commit
    pub deferred_off: bool,
    /// Set this channel's enable bit at the next commit
    pub enable: bool,
}

impl Default for ShadowRegisters {
    fn default() -> Self {
        Self {
            start: Address::SILENCE,
            length: 1,
            dirty: false,
            deferred_off: false,
            enable: false,
        }
    }
}

impl ShadowRegisters {
    pub fn set_start(&mut self, start: Address) {
        self.start = start;
        self.dirty = true;
    }

    pub fn set_length(&mut self, words: u16) {
        self.length = words;
        self.dirty = true;
    }

    /// Point the channel at the single-word silence buffer.
    pub fn point_at_silence(&mut self) {
        self.set_start(Address::SILENCE);
        self.set_length(1);
    }
}

/// Enable-mask bookkeeping across ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DmaMask {
    /// Mask written by the last commit
    pub current: u8,
    /// Channels turned off and on within one tick, re-enabled next commit
    pub reassert: u8,
}

/// Push all shadow registers to `sink`.
///
/// `ducked` holds channels whose volume is halved for this tick.
pub(crate) fn commit<S: ChannelRegisters + ?Sized>(
    sink: &mut S,
    channels: &mut [ChannelState],
    mask: &mut DmaMask,
    master_volume: u8,
    ducked: u8,
) {
    let mut next = mask.current | mask.reassert;
    mask.reassert = 0;

    for (i, ch) in channels.iter_mut().enumerate() {
        let bit = 1u8 << i;
        let shadow = &mut ch.shadow;

        if shadow.dirty && !sink.dma_active(i) {
            sink.write_start(i, shadow.start);
            sink.write_length(i, shadow.length);
            shadow.dirty = false;
        }

        let turned_off = core::mem::take(&mut shadow.deferred_off);
        if turned_off {
            next &= !bit;
        }
        if core::mem::take(&mut shadow.enable) {
            if turned_off && mask.current & bit != 0 {
                mask.reassert |= bit;
            } else {
                next |= bit;
            }
        }

        sink.write_period(i, ch.committed_period());
        let mut volume = ((ch.volume as u16 * master_volume as u16) >> 6) as u8;
        if ducked & bit != 0 {
            volume >>= 1;
        }
        sink.write_volume(i, volume);
    }

    sink.write_dma_mask(next);
    mask.current = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSink, Write};

    fn channels(n: usize) -> Vec<ChannelState> {
        (0..n).map(|_| ChannelState::new()).collect()
    }

    #[test]
    fn start_waits_for_idle_dma() {
        let mut sink = RecordingSink::new(4);
        let mut chans = channels(4);
        let mut mask = DmaMask::default();
        chans[0].shadow.set_start(Address(0x100));
        sink.busy[0] = true;

        commit(&mut sink, &mut chans, &mut mask, 64, 0);
        assert!(!sink.writes.iter().any(|w| matches!(w, Write::Start(0, _))));
        assert!(chans[0].shadow.dirty);

        sink.busy[0] = false;
        commit(&mut sink, &mut chans, &mut mask, 64, 0);
        assert!(sink.writes.contains(&Write::Start(0, Address(0x100))));
        assert!(!chans[0].shadow.dirty);
    }

    #[test]
    fn period_and_volume_always_written() {
        let mut sink = RecordingSink::new(4);
        let mut chans = channels(4);
        sink.busy = [true; 8];
        chans[2].volume = 40;
        chans[2].period = 428;
        commit(&mut sink, &mut chans, &mut DmaMask::default(), 64, 0);
        assert!(sink.writes.contains(&Write::Period(2, 428)));
        assert!(sink.writes.contains(&Write::Volume(2, 40)));
    }

    #[test]
    fn one_mask_write_per_commit() {
        let mut sink = RecordingSink::new(4);
        let mut chans = channels(4);
        chans[0].shadow.enable = true;
        chans[3].shadow.enable = true;
        let mut mask = DmaMask::default();
        commit(&mut sink, &mut chans, &mut mask, 64, 0);
        let masks: Vec<_> = sink.writes.iter().filter(|w| matches!(w, Write::Mask(_))).collect();
        assert_eq!(masks, [&Write::Mask(0b1001)]);
        assert_eq!(mask.current, 0b1001);
    }

    #[test]
    fn deferred_off_clears_bit() {
        let mut sink = RecordingSink::new(4);
        let mut chans = channels(4);
        let mut mask = DmaMask { current: 0b0011, reassert: 0 };
        chans[1].shadow.deferred_off = true;
        commit(&mut sink, &mut chans, &mut mask, 64, 0);
        assert_eq!(sink.last_mask(), Some(0b0001));
    }

    #[test]
    fn off_then_on_in_one_tick_retriggers_next_tick() {
        let mut sink = RecordingSink::new(4);
        let mut chans = channels(4);
        let mut mask = DmaMask { current: 0b0001, reassert: 0 };
        chans[0].shadow.deferred_off = true;
        chans[0].shadow.enable = true;
        commit(&mut sink, &mut chans, &mut mask, 64, 0);
        assert_eq!(sink.last_mask(), Some(0));
        commit(&mut sink, &mut chans, &mut mask, 64, 0);
        assert_eq!(sink.last_mask(), Some(1));
    }

    #[test]
    fn master_volume_and_duck_scale_output() {
        let mut sink = RecordingSink::new(4);
        let mut chans = channels(4);
        chans[0].volume = 64;
        chans[1].volume = 64;
        commit(&mut sink, &mut chans, &mut DmaMask::default(), 32, 0b10);
        assert!(sink.writes.contains(&Write::Volume(0, 32)));
        assert!(sink.writes.contains(&Write::Volume(1, 16)));
    }
}
