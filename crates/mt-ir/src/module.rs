//! The immutable module table set.

use alloc::vec::Vec;
use arrayvec::{ArrayString, ArrayVec};

use crate::program::Program;

/// Maximum number of hardware channels a module can address.
pub const MAX_CHANNELS: usize = 8;
/// Minimum number of hardware channels.
pub const MIN_CHANNELS: usize = 4;
/// Number of externally visible cue slots.
pub const CUE_SLOTS: usize = 4;
/// First word of a track step that holds a song command.
pub const COMMAND_MARKER: u16 = 0xEFFE;

/// One entry of the song directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SongEntry {
    /// First track-table step
    pub first_step: u16,
    /// Last track-table step (inclusive)
    pub last_step: u16,
    /// Sequencer divisor: the track sequencer runs every `tempo + 1` ticks
    pub tempo: u16,
    /// Host cadence hint in BPM-style units (0 = default 50 Hz)
    pub timer: u16,
}

/// What one track does at a track-table step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackSlot {
    /// Start `pattern` from step 0 with a transpose
    Play { pattern: u8, transpose: i8 },
    /// Keep running whatever the track was playing
    Hold,
    /// Silence a hardware channel and stop the track
    Silence { channel: u8 },
    /// Stop the track
    #[default]
    Stop,
}

impl TrackSlot {
    pub fn from_word(word: u16) -> Self {
        let [pattern, low] = word.to_be_bytes();
        match pattern {
            0x00..=0x7F => TrackSlot::Play {
                pattern,
                transpose: low as i8,
            },
            0x80..=0x8F => TrackSlot::Hold,
            0xFE => TrackSlot::Silence { channel: low & 0x0F },
            _ => TrackSlot::Stop,
        }
    }

    pub fn to_word(self) -> u16 {
        match self {
            TrackSlot::Play { pattern, transpose } => {
                u16::from_be_bytes([pattern & 0x7F, transpose as u8])
            }
            TrackSlot::Hold => 0x8000,
            TrackSlot::Silence { channel } => u16::from_be_bytes([0xFE, channel]),
            TrackSlot::Stop => 0xFF00,
        }
    }
}

/// A command embedded in the track table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SongCommand {
    Stop,
    Loop { step: u16, count: u16 },
    Tempo(u16),
    Timer(u16),
    Fade { speed: u8, target: u8 },
    Unknown(u16),
}

/// One row of the track table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackStep {
    Patterns([TrackSlot; MAX_CHANNELS]),
    Command(SongCommand),
}

impl Default for TrackStep {
    fn default() -> Self {
        TrackStep::Patterns([TrackSlot::Stop; MAX_CHANNELS])
    }
}

impl TrackStep {
    /// Build a pattern step from the first few slots; the rest stop.
    pub fn patterns(slots: &[TrackSlot]) -> Self {
        let mut all = [TrackSlot::Stop; MAX_CHANNELS];
        for (dst, src) in all.iter_mut().zip(slots) {
            *dst = *src;
        }
        TrackStep::Patterns(all)
    }

    pub fn from_words(words: [u16; MAX_CHANNELS]) -> Self {
        if words[0] != COMMAND_MARKER {
            return TrackStep::Patterns(words.map(TrackSlot::from_word));
        }
        let command = match words[1] {
            0 => SongCommand::Stop,
            1 => SongCommand::Loop {
                step: words[2],
                count: words[3],
            },
            2 => SongCommand::Tempo(words[2]),
            3 => SongCommand::Timer(words[2]),
            4 => SongCommand::Fade {
                speed: words[2] as u8,
                target: words[3] as u8,
            },
            other => SongCommand::Unknown(other),
        };
        TrackStep::Command(command)
    }

    pub fn to_words(&self) -> [u16; MAX_CHANNELS] {
        let command = match self {
            TrackStep::Patterns(slots) => return slots.map(TrackSlot::to_word),
            TrackStep::Command(command) => *command,
        };
        let (code, a, b) = match command {
            SongCommand::Stop => (0, 0, 0),
            SongCommand::Loop { step, count } => (1, step, count),
            SongCommand::Tempo(t) => (2, t, 0),
            SongCommand::Timer(t) => (3, t, 0),
            SongCommand::Fade { speed, target } => (4, speed as u16, target as u16),
            SongCommand::Unknown(code) => (code, 0, 0),
        };
        let mut words = [0; MAX_CHANNELS];
        words[..4].copy_from_slice(&[COMMAND_MARKER, code, a, b]);
        words
    }
}

/// A note forwarded to a channel's macro interpreter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteEvent {
    /// Note index into the period table (0-63)
    pub note: u8,
    /// Macro to start, or `None` to restart the channel's current macro
    pub program: Option<u8>,
    /// Velocity (0-15)
    pub velocity: u8,
    /// Target hardware channel
    pub channel: u8,
    /// Finetune applied to every period derived for this note
    pub detune: i8,
}

/// A one-shot sound effect definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SfxEntry {
    pub program: u8,
    pub note: u8,
    pub channel: u8,
    pub priority: u8,
    pub lock_ticks: u16,
    pub velocity: u8,
    pub detune: i8,
}

/// A sample directory entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleInfo {
    pub name: ArrayString<22>,
    /// Byte offset into the module's sample data
    pub start: u32,
    /// Length in words
    pub length: u16,
    /// Loop start in bytes relative to `start`
    pub loop_start: u16,
    /// Loop length in words
    pub loop_length: u16,
}

/// Semitone offsets stepped through by the arpeggio effect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArpeggioTable {
    pub offsets: ArrayVec<i8, 16>,
}

impl ArpeggioTable {
    pub fn new(offsets: &[i8]) -> Self {
        Self {
            offsets: offsets.iter().copied().take(16).collect(),
        }
    }
}

/// A loaded, relocated module.
///
/// Produced once by a loader (or built in code) and never mutated by the
/// replay engine. Every lookup clamps its index to the last valid entry.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// Module title
    pub title: ArrayString<40>,
    /// Number of hardware channels (4-8)
    pub channels: u8,
    /// Song directory
    pub songs: Vec<SongEntry>,
    /// Track table
    pub track_steps: Vec<TrackStep>,
    /// Pattern programs
    pub patterns: Vec<Program>,
    /// Macro programs
    pub macros: Vec<Program>,
    /// Sound effect table
    pub sfx: Vec<SfxEntry>,
    /// Sample directory
    pub samples: Vec<SampleInfo>,
    /// Arpeggio tables
    pub arpeggios: Vec<ArpeggioTable>,
    /// Signed 8-bit sample memory
    pub sample_data: Vec<i8>,
}

/// Append as many whole characters of `src` as fit.
pub fn push_truncated<const N: usize>(dst: &mut ArrayString<N>, src: &str) {
    for c in src.chars() {
        if dst.try_push(c).is_err() {
            break;
        }
    }
}

fn clamped<T>(items: &[T], index: usize) -> Option<&T> {
    items.get(index.min(items.len().saturating_sub(1)))
}

impl Module {
    /// Create an empty module for `channels` hardware channels.
    pub fn new(title: &str, channels: u8) -> Self {
        let mut module = Self {
            channels,
            ..Default::default()
        };
        push_truncated(&mut module.title, title);
        module
    }

    /// Channel count clamped to the supported range.
    pub fn channel_count(&self) -> usize {
        (self.channels as usize).clamp(MIN_CHANNELS, MAX_CHANNELS)
    }

    pub fn song(&self, index: usize) -> Option<&SongEntry> {
        clamped(&self.songs, index)
    }

    pub fn track_step(&self, index: usize) -> Option<&TrackStep> {
        clamped(&self.track_steps, index)
    }

    pub fn pattern(&self, index: usize) -> Option<&Program> {
        clamped(&self.patterns, index)
    }

    pub fn macro_program(&self, index: usize) -> Option<&Program> {
        clamped(&self.macros, index)
    }

    pub fn sfx_entry(&self, index: usize) -> Option<&SfxEntry> {
        clamped(&self.sfx, index)
    }

    pub fn sample(&self, index: usize) -> Option<&SampleInfo> {
        clamped(&self.samples, index)
    }

    pub fn arpeggio(&self, index: usize) -> Option<&ArpeggioTable> {
        clamped(&self.arpeggios, index)
    }
}
