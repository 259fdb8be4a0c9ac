//! Software channel sink: a sample-accurate model of the Paula DMA voices.

use mt_engine::{period_to_increment, ChannelRegisters, Memory};
use mt_ir::{Address, MAX_CHANNELS};

use crate::frame::Frame;

/// One DMA voice: programmed registers plus the values latched for the
/// pass currently playing.
#[derive(Clone, Debug)]
struct Voice {
    start: Address,
    /// Length in words
    length: u16,
    period: u16,
    volume: u8,
    latched_start: Address,
    /// Latched length in bytes
    latched_len: u32,
    /// Byte position in 16.16 fixed point
    pos: u32,
    enabled: bool,
    pass_done: bool,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            start: Address::SILENCE,
            length: 1,
            period: 0,
            volume: 0,
            latched_start: Address::SILENCE,
            latched_len: 2,
            pos: 0,
            enabled: false,
            pass_done: false,
        }
    }
}

impl Voice {
    fn latch(&mut self) {
        self.latched_start = self.start;
        self.latched_len = self.length as u32 * 2;
    }

    fn restart(&mut self) {
        self.latch();
        self.pos = 0;
        self.pass_done = false;
    }

    fn next_sample(&mut self, memory: &Memory<'_>, sample_rate: u32) -> i32 {
        if !self.enabled || self.latched_len == 0 {
            return 0;
        }
        let data = memory.slice(self.latched_start, self.latched_len as usize);
        let index = (self.pos >> 16) as usize;
        let value = data.get(index).copied().unwrap_or(0) as i32 * self.volume as i32;

        self.pos = self
            .pos
            .wrapping_add(period_to_increment(self.period, sample_rate));
        let end = self.latched_len << 16;
        if self.pos >= end {
            self.pos -= end;
            self.latch();
            if self.latched_len == 0 || self.pos >= self.latched_len << 16 {
                self.pos = 0;
            }
            self.pass_done = true;
        }
        value
    }
}

/// Stereo software mixer driven through [`ChannelRegisters`].
pub struct SoftPaula {
    voices: [Voice; MAX_CHANNELS],
    channels: usize,
    sample_rate: u32,
    mask: u8,
}

impl SoftPaula {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            voices: Default::default(),
            channels: channels.min(MAX_CHANNELS),
            sample_rate,
            mask: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Last enable mask written by the engine.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Mix one stereo frame. Channels 0 and 3 of each group of four sit on
    /// the left, 1 and 2 on the right.
    pub fn render_frame(&mut self, memory: &Memory<'_>) -> Frame {
        let mut left = 0i32;
        let mut right = 0i32;
        for (i, voice) in self.voices[..self.channels].iter_mut().enumerate() {
            let sample = voice.next_sample(memory, self.sample_rate);
            match i % 4 {
                0 | 3 => left += sample,
                _ => right += sample,
            }
        }
        Frame::from_wide(left, right)
    }
}

impl ChannelRegisters for SoftPaula {
    fn dma_active(&self, channel: usize) -> bool {
        self.voices
            .get(channel)
            .is_some_and(|v| v.enabled && !v.pass_done)
    }

    fn write_start(&mut self, channel: usize, start: Address) {
        if let Some(v) = self.voices.get_mut(channel) {
            v.start = start;
            v.pass_done = false;
        }
    }

    fn write_length(&mut self, channel: usize, words: u16) {
        if let Some(v) = self.voices.get_mut(channel) {
            v.length = words;
            v.pass_done = false;
        }
    }

    fn write_period(&mut self, channel: usize, period: u16) {
        if let Some(v) = self.voices.get_mut(channel) {
            v.period = period;
        }
    }

    fn write_volume(&mut self, channel: usize, volume: u8) {
        if let Some(v) = self.voices.get_mut(channel) {
            v.volume = volume.min(64);
        }
    }

    fn write_dma_mask(&mut self, mask: u8) {
        let rising = mask & !self.mask;
        for (i, voice) in self.voices.iter_mut().enumerate() {
            let bit = 1u8 << i;
            if rising & bit != 0 {
                voice.restart();
            }
            voice.enabled = mask & bit != 0;
        }
        self.mask = mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_ir::FILTER_BUFFER_LEN;

    const RATE: u32 = 44_100;

    fn filters() -> [[i8; FILTER_BUFFER_LEN]; MAX_CHANNELS] {
        [[0; FILTER_BUFFER_LEN]; MAX_CHANNELS]
    }

    fn program(paula: &mut SoftPaula, channel: usize, words: u16, period: u16) {
        paula.write_start(channel, Address(0));
        paula.write_length(channel, words);
        paula.write_period(channel, period);
        paula.write_volume(channel, 64);
    }

    #[test]
    fn rising_edge_starts_voice_and_pans_left() {
        let data = [100i8; 64];
        let filters = filters();
        let memory = Memory::new(&data, &filters);
        let mut paula = SoftPaula::new(4, RATE);
        program(&mut paula, 0, 32, 428);

        assert!(paula.render_frame(&memory).is_silent());
        paula.write_dma_mask(0b0001);
        let frame = paula.render_frame(&memory);
        assert_eq!(frame.left, 100 * 64);
        assert_eq!(frame.right, 0);
        assert!(paula.dma_active(0));
    }

    #[test]
    fn channel_one_pans_right() {
        let data = [-50i8; 16];
        let filters = filters();
        let memory = Memory::new(&data, &filters);
        let mut paula = SoftPaula::new(4, RATE);
        program(&mut paula, 1, 8, 428);
        paula.write_dma_mask(0b0010);
        let frame = paula.render_frame(&memory);
        assert_eq!(frame.left, 0);
        assert_eq!(frame.right, -50 * 64);
    }

    #[test]
    fn pass_end_relatches_and_reports_idle() {
        let data: Vec<i8> = (0..8).map(|i| i as i8).collect();
        let filters = filters();
        let memory = Memory::new(&data, &filters);
        let mut paula = SoftPaula::new(4, RATE);
        // Lowest period gives the fastest step; a one-word pass ends quickly.
        program(&mut paula, 0, 1, 113);
        paula.write_dma_mask(0b0001);
        for _ in 0..4 {
            paula.render_frame(&memory);
        }
        assert!(!paula.dma_active(0));

        paula.write_start(0, Address(4));
        assert!(paula.dma_active(0));
    }

    #[test]
    fn falling_edge_silences() {
        let data = [100i8; 64];
        let filters = filters();
        let memory = Memory::new(&data, &filters);
        let mut paula = SoftPaula::new(4, RATE);
        program(&mut paula, 0, 32, 428);
        paula.write_dma_mask(0b0001);
        paula.write_dma_mask(0);
        assert!(paula.render_frame(&memory).is_silent());
        assert!(!paula.dma_active(0));
        assert_eq!(paula.mask(), 0);
    }

    #[test]
    fn out_of_range_writes_are_ignored() {
        let mut paula = SoftPaula::new(4, RATE);
        paula.write_start(12, Address(0));
        paula.write_volume(12, 64);
        assert!(!paula.dma_active(12));
    }
}
