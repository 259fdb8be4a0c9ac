//! Macro program opcodes.
//!
//! A macro is the per-instrument program a channel runs: it sets up the
//! sample pointer, derives the period from the note, configures modulation
//! and decides when the channel waits.

use crate::program::Instruction;

/// Payload byte 2 value that turns a volume op into "note two back + value".
const NOTE_RELATIVE_VOLUME: u8 = 0xFE;

/// How a DMA-off instruction silences the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaOffMode {
    /// Point the shadow registers at the silence word.
    Immediate,
    /// Clear the channel's bit in the next enable-mask write and yield.
    Deferred,
}

/// Volume operand of `AddVolume` / `SetVolume`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeArg {
    Value(u8),
    /// The note played two events ago, plus the value.
    NoteRelative(u8),
}

/// Arpeggio option flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArpeggioMode {
    /// Randomly hold the current step instead of advancing.
    pub hold: bool,
    /// Duck the partner channel on step 0.
    pub echo: bool,
}

impl ArpeggioMode {
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            hold: bits & 1 != 0,
            echo: bits & 2 != 0,
        }
    }

    pub const fn bits(self) -> u8 {
        self.hold as u8 | (self.echo as u8) << 1
    }
}

/// One decoded macro instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacroOp {
    DmaOff { mode: DmaOffMode, reset_effects: bool },
    /// Request DMA enable. Negative disables the effect pass, zero arms it
    /// for the next tick, positive runs it immediately.
    DmaOn { effects: i8 },
    SetStart(u32),
    /// Length in words.
    SetLength(u16),
    Wait(u16),
    Loop { count: u8, step: u16 },
    Continue { program: u8, step: u16 },
    Stop,
    AddNote { semitones: i8, detune: i8 },
    SetNote { note: u8, detune: i8 },
    ResetEffects,
    Portamento { ticks: u8, rate: u16 },
    Vibrato { speed: u8, intensity: i8 },
    AddVolume(VolumeArg),
    SetVolume(VolumeArg),
    Envelope { rate: u8, ticks: u8, target: u8 },
    LoopUntilKeyUp { count: u8, step: u16 },
    AddStart { reverse_after: u8, delta: i16 },
    AddLength(i16),
    WaitKeyUp { max_ticks: u8 },
    Gosub { program: u8, step: u16 },
    Return,
    SetPeriod(u16),
    SampleLoop(u16),
    OneShot,
    SplitKey { threshold: u8, step: u16 },
    SplitVolume { threshold: u8, step: u16 },
    AddPreviousNote { semitones: i8, detune: i8 },
    Cue { slot: u8, value: u16 },
    StartMacro { program: u8, velocity: u8, detune: i8 },
    FilterSource(u32),
    FilterLength(u16),
    FilterSweepA(i16),
    FilterSweepB(i16),
    FilterCutoff { coefficient: u8, sweep: i16 },
    FilterStop,
    Arpeggio { table: u8, speed: u8, mode: ArpeggioMode },
    SetSample(u16),
    Unknown(Instruction),
}

impl MacroOp {
    pub fn decode(ins: Instruction) -> Self {
        let (b1, b2, b3) = (ins.b1(), ins.b2(), ins.b3());
        let volume = || {
            if b2 == NOTE_RELATIVE_VOLUME {
                VolumeArg::NoteRelative(b3)
            } else {
                VolumeArg::Value(b3)
            }
        };
        let off_mode = if b1 == 0 {
            DmaOffMode::Immediate
        } else {
            DmaOffMode::Deferred
        };
        match ins.opcode() {
            0x00 => MacroOp::DmaOff { mode: off_mode, reset_effects: true },
            0x01 => MacroOp::DmaOn { effects: b1 as i8 },
            0x02 => MacroOp::SetStart(ins.addr()),
            0x03 => MacroOp::SetLength(ins.hi()),
            0x04 => MacroOp::Wait(ins.hi()),
            0x05 => MacroOp::Loop { count: b1, step: ins.hi() },
            0x06 => MacroOp::Continue { program: b1, step: ins.hi() },
            0x07 => MacroOp::Stop,
            0x08 => MacroOp::AddNote { semitones: b1 as i8, detune: b3 as i8 },
            0x09 => MacroOp::SetNote { note: b1, detune: b3 as i8 },
            0x0A => MacroOp::ResetEffects,
            0x0B => MacroOp::Portamento { ticks: b1, rate: ins.hi() },
            0x0C => MacroOp::Vibrato { speed: b1, intensity: b3 as i8 },
            0x0D => MacroOp::AddVolume(volume()),
            0x0E => MacroOp::SetVolume(volume()),
            0x0F => MacroOp::Envelope { rate: b1, ticks: b2, target: b3 },
            0x10 => MacroOp::LoopUntilKeyUp { count: b1, step: ins.hi() },
            0x11 => MacroOp::AddStart { reverse_after: b1, delta: ins.hi_signed() },
            0x12 => MacroOp::AddLength(ins.hi_signed()),
            0x13 => MacroOp::DmaOff { mode: off_mode, reset_effects: false },
            0x14 => MacroOp::WaitKeyUp { max_ticks: b3 },
            0x15 => MacroOp::Gosub { program: b1, step: ins.hi() },
            0x16 => MacroOp::Return,
            0x17 => MacroOp::SetPeriod(ins.hi()),
            0x18 => MacroOp::SampleLoop(ins.hi()),
            0x19 => MacroOp::OneShot,
            0x1C => MacroOp::SplitKey { threshold: b1, step: ins.hi() },
            0x1D => MacroOp::SplitVolume { threshold: b1, step: ins.hi() },
            0x1F => MacroOp::AddPreviousNote { semitones: b1 as i8, detune: b3 as i8 },
            0x20 => MacroOp::Cue { slot: b1, value: ins.hi() },
            0x21 => MacroOp::StartMacro { program: b1, velocity: b2, detune: b3 as i8 },
            0x22 => MacroOp::FilterSource(ins.addr()),
            0x23 => MacroOp::FilterLength(ins.hi()),
            0x24 => MacroOp::FilterSweepA(ins.hi_signed()),
            0x25 => MacroOp::FilterSweepB(ins.hi_signed()),
            0x26 => MacroOp::FilterCutoff { coefficient: b1, sweep: ins.hi_signed() },
            0x27 => MacroOp::FilterStop,
            0x28 => MacroOp::Arpeggio { table: b1, speed: b2, mode: ArpeggioMode::from_bits(b3) },
            0x29 => MacroOp::SetSample(ins.hi()),
            _ => MacroOp::Unknown(ins),
        }
    }

    pub fn encode(&self) -> Instruction {
        use Instruction as I;
        let volume = |op: u8, arg: &VolumeArg| match *arg {
            VolumeArg::Value(v) => I::from_parts(op, 0, 0, v),
            VolumeArg::NoteRelative(v) => I::from_parts(op, 0, NOTE_RELATIVE_VOLUME, v),
        };
        let off = |op: u8, mode: DmaOffMode| {
            I::from_parts(op, (mode == DmaOffMode::Deferred) as u8, 0, 0)
        };
        match *self {
            MacroOp::DmaOff { mode, reset_effects: true } => off(0x00, mode),
            MacroOp::DmaOff { mode, reset_effects: false } => off(0x13, mode),
            MacroOp::DmaOn { effects } => I::from_parts(0x01, effects as u8, 0, 0),
            MacroOp::SetStart(addr) => I::with_addr(0x02, addr),
            MacroOp::SetLength(len) => I::with_hi(0x03, 0, len),
            MacroOp::Wait(ticks) => I::with_hi(0x04, 0, ticks),
            MacroOp::Loop { count, step } => I::with_hi(0x05, count, step),
            MacroOp::Continue { program, step } => I::with_hi(0x06, program, step),
            MacroOp::Stop => I::from_parts(0x07, 0, 0, 0),
            MacroOp::AddNote { semitones, detune } => {
                I::from_parts(0x08, semitones as u8, 0, detune as u8)
            }
            MacroOp::SetNote { note, detune } => I::from_parts(0x09, note, 0, detune as u8),
            MacroOp::ResetEffects => I::from_parts(0x0A, 0, 0, 0),
            MacroOp::Portamento { ticks, rate } => I::with_hi(0x0B, ticks, rate),
            MacroOp::Vibrato { speed, intensity } => {
                I::from_parts(0x0C, speed, 0, intensity as u8)
            }
            MacroOp::AddVolume(ref arg) => volume(0x0D, arg),
            MacroOp::SetVolume(ref arg) => volume(0x0E, arg),
            MacroOp::Envelope { rate, ticks, target } => I::from_parts(0x0F, rate, ticks, target),
            MacroOp::LoopUntilKeyUp { count, step } => I::with_hi(0x10, count, step),
            MacroOp::AddStart { reverse_after, delta } => {
                I::with_hi(0x11, reverse_after, delta as u16)
            }
            MacroOp::AddLength(delta) => I::with_hi(0x12, 0, delta as u16),
            MacroOp::WaitKeyUp { max_ticks } => I::from_parts(0x14, 0, 0, max_ticks),
            MacroOp::Gosub { program, step } => I::with_hi(0x15, program, step),
            MacroOp::Return => I::from_parts(0x16, 0, 0, 0),
            MacroOp::SetPeriod(period) => I::with_hi(0x17, 0, period),
            MacroOp::SampleLoop(offset) => I::with_hi(0x18, 0, offset),
            MacroOp::OneShot => I::from_parts(0x19, 0, 0, 0),
            MacroOp::SplitKey { threshold, step } => I::with_hi(0x1C, threshold, step),
            MacroOp::SplitVolume { threshold, step } => I::with_hi(0x1D, threshold, step),
            MacroOp::AddPreviousNote { semitones, detune } => {
                I::from_parts(0x1F, semitones as u8, 0, detune as u8)
            }
            MacroOp::Cue { slot, value } => I::with_hi(0x20, slot, value),
            MacroOp::StartMacro { program, velocity, detune } => {
                I::from_parts(0x21, program, velocity, detune as u8)
            }
            MacroOp::FilterSource(addr) => I::with_addr(0x22, addr),
            MacroOp::FilterLength(len) => I::with_hi(0x23, 0, len),
            MacroOp::FilterSweepA(speed) => I::with_hi(0x24, 0, speed as u16),
            MacroOp::FilterSweepB(speed) => I::with_hi(0x25, 0, speed as u16),
            MacroOp::FilterCutoff { coefficient, sweep } => {
                I::with_hi(0x26, coefficient, sweep as u16)
            }
            MacroOp::FilterStop => I::from_parts(0x27, 0, 0, 0),
            MacroOp::Arpeggio { table, speed, mode } => {
                I::from_parts(0x28, table, speed, mode.bits())
            }
            MacroOp::SetSample(index) => I::with_hi(0x29, 0, index),
            MacroOp::Unknown(ins) => ins,
        }
    }
}
