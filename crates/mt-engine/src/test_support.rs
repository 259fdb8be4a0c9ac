//! Shared helpers for engine unit tests.

use alloc::vec::Vec;
use mt_ir::{Address, MacroOp, Module, PatternOp, Program, SongEntry, TrackSlot, TrackStep};

use crate::registers::ChannelRegisters;

/// One register write seen by [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Write {
    Start(usize, Address),
    Length(usize, u16),
    Period(usize, u16),
    Volume(usize, u8),
    Mask(u8),
}

/// A sink that records every write and panics on a start/length write while
/// the channel is marked busy.
pub struct RecordingSink {
    pub busy: [bool; 8],
    pub writes: Vec<Write>,
    channels: usize,
}

impl RecordingSink {
    pub fn new(channels: usize) -> Self {
        Self {
            busy: [false; 8],
            writes: Vec::new(),
            channels,
        }
    }

    pub fn last_mask(&self) -> Option<u8> {
        self.writes.iter().rev().find_map(|w| match w {
            Write::Mask(m) => Some(*m),
            _ => None,
        })
    }

    pub fn last_period(&self, channel: usize) -> Option<u16> {
        self.writes.iter().rev().find_map(|w| match w {
            Write::Period(c, p) if *c == channel => Some(*p),
            _ => None,
        })
    }

    pub fn last_volume(&self, channel: usize) -> Option<u8> {
        self.writes.iter().rev().find_map(|w| match w {
            Write::Volume(c, v) if *c == channel => Some(*v),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl ChannelRegisters for RecordingSink {
    fn dma_active(&self, channel: usize) -> bool {
        self.busy[channel]
    }

    fn write_start(&mut self, channel: usize, start: Address) {
        assert!(channel < self.channels);
        assert!(!self.busy[channel], "start written while DMA active on {channel}");
        self.writes.push(Write::Start(channel, start));
    }

    fn write_length(&mut self, channel: usize, words: u16) {
        assert!(!self.busy[channel], "length written while DMA active on {channel}");
        self.writes.push(Write::Length(channel, words));
    }

    fn write_period(&mut self, channel: usize, period: u16) {
        self.writes.push(Write::Period(channel, period));
    }

    fn write_volume(&mut self, channel: usize, volume: u8) {
        self.writes.push(Write::Volume(channel, volume));
    }

    fn write_dma_mask(&mut self, mask: u8) {
        self.writes.push(Write::Mask(mask));
    }
}

/// A 4-channel module with one song over the given track steps.
pub fn module_with(steps: Vec<TrackStep>, patterns: &[&[PatternOp]], macros: &[&[MacroOp]]) -> Module {
    let mut module = Module::new("test", 4);
    let last = steps.len().saturating_sub(1) as u16;
    module.songs.push(SongEntry {
        first_step: 0,
        last_step: last,
        tempo: 0,
        timer: 0,
    });
    module.track_steps = steps;
    module.patterns = patterns.iter().map(|ops| Program::from_pattern_ops(ops)).collect();
    module.macros = macros.iter().map(|ops| Program::from_macro_ops(ops)).collect();
    module.sample_data = (0..256).map(|i| (i as i8).wrapping_mul(3)).collect();
    module
}

/// A track step playing `pattern` on track 0 only.
pub fn single_track(pattern: u8) -> TrackStep {
    TrackStep::patterns(&[TrackSlot::Play { pattern, transpose: 0 }])
}
