//! Pattern program opcodes.
//!
//! Bytes below `0xF0` are notes; the top two bits select the note kind.
//! Bytes `0xF0..=0xFF` are sequencer commands.

use crate::module::NoteEvent;
use crate::program::Instruction;

/// Macro byte meaning "keep the channel's current macro".
const KEEP_PROGRAM: u8 = 0xFF;

/// One decoded pattern instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternOp {
    /// Plain note. `exempt` notes ignore the track transpose.
    Note { event: NoteEvent, exempt: bool },
    /// Note followed by a wait of `wait` activations.
    NoteWait { event: NoteEvent, wait: u8 },
    /// Glide the channel to `note` without restarting its macro.
    Glide { note: u8, channel: u8, ticks: u8, rate: u8 },
    End,
    Loop { count: u8, step: u16 },
    Continue { pattern: u8, step: u16 },
    Wait(u8),
    Stop,
    KeyUp { channel: u8 },
    Vibrato { speed: u8, channel: u8, intensity: i8 },
    Envelope { rate: u8, ticks: u8, channel: u8, target: u8 },
    GotoSub { pattern: u8, step: u16 },
    Return,
    Fade { speed: u8, target: u8 },
    PlayPattern { pattern: u8, transpose: i8 },
    Lock { priority: u8, channel: u8, ticks: u8 },
    Cue { slot: u8, value: u16 },
    CueStop { slot: u8, value: u16 },
    Nop,
}

fn note_event(ins: Instruction, detune: i8) -> NoteEvent {
    NoteEvent {
        note: ins.opcode() & 0x3F,
        program: (ins.b1() != KEEP_PROGRAM).then_some(ins.b1()),
        velocity: ins.b2() >> 4,
        channel: ins.b2() & 0x0F,
        detune,
    }
}

fn note_bytes(kind: u8, event: &NoteEvent, b3: u8) -> Instruction {
    Instruction::from_parts(
        kind | (event.note & 0x3F),
        event.program.unwrap_or(KEEP_PROGRAM),
        (event.velocity << 4) | (event.channel & 0x0F),
        b3,
    )
}

impl PatternOp {
    pub fn decode(ins: Instruction) -> Self {
        let (t, b1, b2, b3) = (ins.opcode(), ins.b1(), ins.b2(), ins.b3());
        match t {
            0x00..=0x7F => PatternOp::Note {
                event: note_event(ins, b3 as i8),
                exempt: t & 0x40 != 0,
            },
            0x80..=0xBF => PatternOp::NoteWait {
                event: note_event(ins, 0),
                wait: b3,
            },
            0xC0..=0xEF => PatternOp::Glide {
                note: t & 0x3F,
                channel: b2 & 0x0F,
                ticks: b1,
                rate: b3,
            },
            0xF0 => PatternOp::End,
            0xF1 => PatternOp::Loop { count: b1, step: ins.hi() },
            0xF2 => PatternOp::Continue { pattern: b1, step: ins.hi() },
            0xF3 => PatternOp::Wait(b1),
            0xF4 => PatternOp::Stop,
            0xF5 => PatternOp::KeyUp { channel: b2 & 0x0F },
            0xF6 => PatternOp::Vibrato {
                speed: b1,
                channel: b2 & 0x0F,
                intensity: b3 as i8,
            },
            0xF7 => PatternOp::Envelope {
                rate: b1,
                ticks: b2 >> 4,
                channel: b2 & 0x0F,
                target: b3,
            },
            0xF8 => PatternOp::GotoSub { pattern: b1, step: ins.hi() },
            0xF9 => PatternOp::Return,
            0xFA => PatternOp::Fade { speed: b1, target: b3 },
            0xFB => PatternOp::PlayPattern { pattern: b1, transpose: b3 as i8 },
            0xFC => PatternOp::Lock {
                priority: b1,
                channel: b2 & 0x0F,
                ticks: b3,
            },
            0xFD => PatternOp::Cue { slot: b1, value: ins.hi() },
            0xFE => PatternOp::CueStop { slot: b1, value: ins.hi() },
            0xFF => PatternOp::Nop,
        }
    }

    pub fn encode(&self) -> Instruction {
        use Instruction as I;
        match *self {
            PatternOp::Note { ref event, exempt } => {
                note_bytes(if exempt { 0x40 } else { 0x00 }, event, event.detune as u8)
            }
            PatternOp::NoteWait { ref event, wait } => note_bytes(0x80, event, wait),
            PatternOp::Glide { note, channel, ticks, rate } => {
                // 0xC0 | 0x30.. would collide with the command range.
                I::from_parts(0xC0 | (note % 0x30), ticks, channel & 0x0F, rate)
            }
            PatternOp::End => I::from_parts(0xF0, 0, 0, 0),
            PatternOp::Loop { count, step } => I::with_hi(0xF1, count, step),
            PatternOp::Continue { pattern, step } => I::with_hi(0xF2, pattern, step),
            PatternOp::Wait(n) => I::from_parts(0xF3, n, 0, 0),
            PatternOp::Stop => I::from_parts(0xF4, 0, 0, 0),
            PatternOp::KeyUp { channel } => I::from_parts(0xF5, 0, channel, 0),
            PatternOp::Vibrato { speed, channel, intensity } => {
                I::from_parts(0xF6, speed, channel, intensity as u8)
            }
            PatternOp::Envelope { rate, ticks, channel, target } => {
                I::from_parts(0xF7, rate, (ticks << 4) | (channel & 0x0F), target)
            }
            PatternOp::GotoSub { pattern, step } => I::with_hi(0xF8, pattern, step),
            PatternOp::Return => I::from_parts(0xF9, 0, 0, 0),
            PatternOp::Fade { speed, target } => I::from_parts(0xFA, speed, 0, target),
            PatternOp::PlayPattern { pattern, transpose } => {
                I::from_parts(0xFB, pattern, 0, transpose as u8)
            }
            PatternOp::Lock { priority, channel, ticks } => {
                I::from_parts(0xFC, priority, channel, ticks)
            }
            PatternOp::Cue { slot, value } => I::with_hi(0xFD, slot, value),
            PatternOp::CueStop { slot, value } => I::with_hi(0xFE, slot, value),
            PatternOp::Nop => I::from_parts(0xFF, 0, 0, 0),
        }
    }
}
