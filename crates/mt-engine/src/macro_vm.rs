//! Per-channel macro interpreter.
//!
//! Each tick a channel whose macro is running either counts down its wait or
//! decodes instructions until one yields. Decoding is bounded by the op
//! budget so a malformed program can never stall a tick.

use mt_ir::{Address, DmaOffMode, MacroOp, Module, NoteEvent, VolumeArg, CUE_SLOTS};

use crate::channel::{ChannelState, EffectsGate};
use crate::loop_counter::ReturnPoint;

/// What happens after one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Next,
    Yield,
    Stop,
}

/// Everything outside the channel that an instruction may touch.
pub(crate) struct MacroContext<'a> {
    pub module: &'a Module,
    pub cues: &'a mut [u16; CUE_SLOTS],
    pub channel: usize,
    pub max_ops: u16,
}

/// Run one tick of the interpreter for `ch`.
pub(crate) fn run(ch: &mut ChannelState, ctx: &mut MacroContext<'_>) {
    if !ch.cursor.running {
        return;
    }
    if ch.cursor.wait > 0 {
        ch.cursor.wait -= 1;
        return;
    }
    for _ in 0..ctx.max_ops {
        let ins = ctx
            .module
            .macro_program(ch.cursor.program as usize)
            .and_then(|p| p.fetch(ch.cursor.step));
        let Some(ins) = ins else {
            ch.cursor.running = false;
            return;
        };
        ch.cursor.step = ch.cursor.step.wrapping_add(1);
        match execute(ch, MacroOp::decode(ins), ctx) {
            Flow::Next => {}
            Flow::Yield => return,
            Flow::Stop => {
                ch.cursor.running = false;
                return;
            }
        }
    }
    tracing::trace!(channel = ctx.channel, program = ch.cursor.program, "macro op budget exhausted");
}

fn jump(ch: &mut ChannelState, program: u8, step: u16) {
    ch.cursor.program = program;
    ch.cursor.step = step;
    ch.cursor.loop_counter.reset();
}

fn volume_operand(ch: &ChannelState, arg: VolumeArg) -> (u16, bool) {
    match arg {
        VolumeArg::Value(v) => (v as u16, false),
        VolumeArg::NoteRelative(v) => (ch.older_note as u16 + v as u16, true),
    }
}

fn execute(ch: &mut ChannelState, op: MacroOp, ctx: &mut MacroContext<'_>) -> Flow {
    match op {
        MacroOp::DmaOff { mode, reset_effects } => {
            if reset_effects {
                ch.reset_effects();
            }
            match mode {
                DmaOffMode::Immediate => ch.shadow.point_at_silence(),
                DmaOffMode::Deferred => {
                    ch.shadow.deferred_off = true;
                    return Flow::Yield;
                }
            }
        }
        MacroOp::DmaOn { effects } => {
            ch.effects = match effects {
                e if e < 0 => EffectsGate::Off,
                0 => EffectsGate::Arming,
                _ => EffectsGate::Running,
            };
            ch.shadow.enable = true;
        }
        MacroOp::SetStart(addr) => {
            ch.start_sweep.reverse_after = 0;
            ch.shadow.set_start(Address(addr));
        }
        MacroOp::SetLength(words) => ch.shadow.set_length(words),
        MacroOp::Wait(ticks) => {
            ch.cursor.wait = ticks;
            return Flow::Yield;
        }
        MacroOp::Loop { count, step } => {
            if ch.cursor.loop_counter.hit(count as u16) {
                ch.cursor.step = step;
            }
        }
        MacroOp::Continue { program, step } => jump(ch, program, step),
        MacroOp::Stop => return Flow::Stop,
        MacroOp::AddNote { semitones, detune } => {
            ch.set_note_period(ch.note as i16 + semitones as i16, detune);
        }
        MacroOp::SetNote { note, detune } => ch.set_note_period(note as i16, detune),
        MacroOp::AddPreviousNote { semitones, detune } => {
            ch.set_note_period(ch.previous_note as i16 + semitones as i16, detune);
        }
        MacroOp::SetPeriod(period) => ch.set_period(period),
        MacroOp::ResetEffects => ch.reset_effects(),
        MacroOp::Portamento { ticks, rate } => ch.start_glide(ticks, rate),
        MacroOp::Vibrato { speed, intensity } => ch.start_vibrato(speed, intensity),
        MacroOp::AddVolume(arg) => {
            let (value, relative) = volume_operand(ch, arg);
            let base = if relative { 0 } else { ch.velocity as u16 * 3 };
            ch.set_volume(base + value);
        }
        MacroOp::SetVolume(arg) => {
            let (value, _) = volume_operand(ch, arg);
            ch.set_volume(value);
        }
        MacroOp::Envelope { rate, ticks, target } => ch.start_envelope(rate, ticks, target),
        MacroOp::LoopUntilKeyUp { count, step } => {
            if !ch.key_down {
                ch.cursor.loop_counter.reset();
            } else if ch.cursor.loop_counter.hit(count as u16) {
                ch.cursor.step = step;
            }
        }
        MacroOp::AddStart { reverse_after, delta } => ch.add_start(delta, reverse_after),
        MacroOp::AddLength(delta) => {
            let len = (ch.shadow.length as i32 + delta as i32).clamp(0, u16::MAX as i32);
            ch.shadow.set_length(len as u16);
        }
        MacroOp::WaitKeyUp { max_ticks } => {
            if !ch.key_down {
                ch.cursor.loop_counter.reset();
            } else if ch.cursor.loop_counter.hit(max_ticks as u16) {
                ch.cursor.step = ch.cursor.step.wrapping_sub(1);
                return Flow::Yield;
            }
        }
        MacroOp::Gosub { program, step } => {
            ch.cursor.ret = Some(ReturnPoint {
                program: ch.cursor.program,
                step: ch.cursor.step,
            });
            jump(ch, program, step);
        }
        MacroOp::Return => {
            if let Some(ret) = ch.cursor.ret {
                ch.cursor.program = ret.program;
                ch.cursor.step = ret.step;
            }
        }
        MacroOp::SampleLoop(offset) => {
            ch.start_sweep.reverse_after = 0;
            let start = ch.shadow.start.offset((offset & !1) as i32);
            ch.shadow.set_start(start);
            ch.shadow.set_length(ch.shadow.length.saturating_sub(offset / 2));
        }
        MacroOp::OneShot => {
            ch.start_sweep.reverse_after = 0;
            ch.shadow.point_at_silence();
        }
        MacroOp::SplitKey { threshold, step } => {
            if ch.note > threshold {
                ch.cursor.step = step;
            }
        }
        MacroOp::SplitVolume { threshold, step } => {
            if ch.volume > threshold {
                ch.cursor.step = step;
            }
        }
        MacroOp::Cue { slot, value } => ctx.cues[slot as usize % CUE_SLOTS] = value,
        MacroOp::StartMacro { program, velocity, detune } => {
            let event = NoteEvent {
                note: ch.note,
                program: Some(program),
                velocity,
                channel: ctx.channel as u8,
                detune,
            };
            ch.trigger(&event);
        }
        MacroOp::FilterSource(addr) => ch.start_filter(ctx.channel, addr),
        MacroOp::FilterLength(bytes) => ch.set_filter_length(bytes),
        MacroOp::FilterSweepA(speed) => ch.filter.speed_a = speed,
        MacroOp::FilterSweepB(speed) => ch.filter.speed_b = speed,
        MacroOp::FilterCutoff { coefficient, sweep } => ch.filter.set_cutoff(coefficient, sweep),
        MacroOp::FilterStop => ch.filter.stop(),
        MacroOp::Arpeggio { table, speed, mode } => {
            ch.start_arpeggio(ctx.module, table, speed, mode);
        }
        MacroOp::SetSample(index) => {
            if let Some(sample) = ctx.module.sample(index as usize) {
                ch.start_sweep.reverse_after = 0;
                ch.shadow.set_start(Address(sample.start));
                ch.shadow.set_length(sample.length);
            }
        }
        MacroOp::Unknown(ins) => {
            tracing::trace!(channel = ctx.channel, opcode = ins.opcode(), "skipping unknown macro op");
        }
    }
    Flow::Next
}
