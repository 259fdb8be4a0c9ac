//! Per-channel replay state and the per-tick effect pass.

use mt_ir::{Address, ArpeggioMode, Module, NoteEvent, FILTER_BUFFER_LEN};

use crate::filter_sim::FilterSim;
use crate::frequency::{glide_step, note_period, vibrato_period};
use crate::loop_counter::{LoopCounter, ReturnPoint};
use crate::registers::ShadowRegisters;
use crate::sfx::SfxSlot;

/// Maximum channel volume.
pub const MAX_VOLUME: u8 = 64;

/// Whether the effect pass runs for a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EffectsGate {
    #[default]
    Off,
    /// Skip one tick, then run.
    Arming,
    Running,
}

/// Position of a channel's macro interpreter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacroCursor {
    pub program: u8,
    pub step: u16,
    /// Ticks left before decoding resumes
    pub wait: u16,
    /// Decode is live (cleared by STOP)
    pub running: bool,
    pub loop_counter: LoopCounter,
    pub ret: Option<ReturnPoint>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Glide {
    /// Step size in 1/256ths of the period; 0 means inactive
    pub rate: u16,
    /// Ticks between steps
    pub ticks: u8,
    pub timer: u8,
}

impl Glide {
    pub fn is_active(&self) -> bool {
        self.rate != 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vibrato {
    /// Ticks per half cycle; 0 means inactive
    pub speed: u8,
    pub timer: u8,
    pub width: i8,
    /// Current offset in 1/2048ths of the period
    pub offset: i16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub active: bool,
    pub rate: u8,
    pub ticks: u8,
    pub timer: u8,
    pub target: u8,
}

/// Auto-reversing start-address sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StartSweep {
    pub delta: i16,
    /// Ticks between reversals; 0 means inactive
    pub reverse_after: u8,
    pub timer: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Arpeggio {
    pub active: bool,
    pub table: u8,
    pub step: u8,
    pub speed: u8,
    pub timer: u8,
    pub mode: ArpeggioMode,
    /// Semitone offset of the current step
    pub offset: i8,
}

/// Replay state for one hardware channel.
#[derive(Clone, Debug, Default)]
pub struct ChannelState {
    pub cursor: MacroCursor,

    // Note state
    /// Current note
    pub note: u8,
    /// Note before the current one
    pub previous_note: u8,
    /// Note two events back
    pub older_note: u8,
    /// Velocity of the last note event (0-15)
    pub velocity: u8,
    /// Finetune of the last note event
    pub finetune: i8,
    /// Cleared by key-up
    pub key_down: bool,
    /// Volume (0-64)
    pub volume: u8,
    /// Current base period, moved by glides
    pub period: u16,
    /// Period the channel settles on
    pub target_period: u16,

    // Effects
    pub glide: Glide,
    pub vibrato: Vibrato,
    pub envelope: Envelope,
    pub start_sweep: StartSweep,
    pub arpeggio: Arpeggio,
    pub filter: FilterSim,
    pub effects: EffectsGate,

    pub shadow: ShadowRegisters,
    pub sfx: SfxSlot,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a note: record it and restart the macro from step 0.
    pub fn trigger(&mut self, event: &NoteEvent) {
        self.older_note = self.previous_note;
        self.previous_note = self.note;
        self.note = event.note & 0x3F;
        self.velocity = event.velocity;
        self.finetune = event.detune;
        self.key_down = true;
        self.effects = EffectsGate::Arming;
        if let Some(program) = event.program {
            self.cursor.program = program;
        }
        self.cursor.step = 0;
        self.cursor.wait = 0;
        self.cursor.running = true;
        self.cursor.loop_counter.reset();
    }

    pub fn key_up(&mut self) {
        self.key_down = false;
    }

    /// Stop the macro and silence the channel.
    pub fn silence(&mut self) {
        self.cursor.running = false;
        self.reset_effects();
        self.filter.stop();
        self.volume = 0;
        self.shadow.point_at_silence();
        self.shadow.deferred_off = true;
    }

    pub fn reset_effects(&mut self) {
        self.glide = Glide::default();
        self.vibrato = Vibrato::default();
        self.envelope = Envelope::default();
        self.start_sweep = StartSweep::default();
        self.arpeggio = Arpeggio::default();
    }

    /// Set the period, or only the glide target while a glide runs.
    pub fn set_period(&mut self, period: u16) {
        self.target_period = period;
        if !self.glide.is_active() {
            self.period = period;
        }
    }

    /// Derive the period from `note` with the channel finetune plus `detune`.
    pub fn set_note_period(&mut self, note: i16, detune: i8) {
        self.set_period(note_period(note, self.finetune, detune));
    }

    pub fn set_volume(&mut self, volume: u16) {
        self.volume = volume.min(MAX_VOLUME as u16) as u8;
    }

    /// Start a glide from the current period.
    pub fn start_glide(&mut self, ticks: u8, rate: u16) {
        self.glide = Glide { rate, ticks, timer: 1 };
        if rate == 0 {
            self.period = self.target_period;
        }
    }

    /// Glide toward `note` without restarting the macro.
    pub fn glide_to(&mut self, note: u8, ticks: u8, rate: u8) {
        self.note = note & 0x3F;
        self.target_period = note_period(self.note as i16, self.finetune, 0);
        self.start_glide(ticks, rate as u16);
    }

    pub fn start_vibrato(&mut self, speed: u8, intensity: i8) {
        self.vibrato = Vibrato {
            speed,
            timer: (speed / 2).max(1),
            width: intensity,
            offset: 0,
        };
    }

    pub fn start_envelope(&mut self, rate: u8, ticks: u8, target: u8) {
        self.envelope = Envelope {
            active: true,
            rate,
            ticks,
            timer: ticks,
            target: target.min(MAX_VOLUME),
        };
    }

    /// Add `delta` to the start address, repeating every tick and reversing
    /// after `reverse_after` ticks when non-zero.
    pub fn add_start(&mut self, delta: i16, reverse_after: u8) {
        self.shadow.set_start(self.shadow.start.offset(delta as i32));
        self.start_sweep = StartSweep {
            delta,
            reverse_after,
            timer: reverse_after,
        };
    }

    /// Configure the arpeggio; table `0xFF` or speed 0 switches it off.
    pub fn start_arpeggio(&mut self, module: &Module, table: u8, speed: u8, mode: ArpeggioMode) {
        let first = module
            .arpeggio(table as usize)
            .and_then(|t| t.offsets.first().copied());
        self.arpeggio = match first {
            Some(offset) if table != 0xFF && speed != 0 => Arpeggio {
                active: true,
                table,
                step: 0,
                speed,
                timer: speed,
                mode,
                offset,
            },
            _ => Arpeggio::default(),
        };
    }

    /// Point the channel at its filter buffer and enable the filter.
    pub fn start_filter(&mut self, channel: usize, source: u32) {
        self.filter.set_source(source);
        self.shadow.set_start(Address::filter_buffer(channel));
        self.shadow.set_length((self.filter.block_len() / 2) as u16);
    }

    pub fn set_filter_length(&mut self, bytes: u16) {
        self.filter.length = bytes;
        if self.filter.enabled {
            self.shadow.set_length((self.filter.block_len() / 2) as u16);
        }
    }

    /// Period to commit this tick: arpeggio and vibrato applied on top.
    pub fn committed_period(&self) -> u16 {
        let base = if self.arpeggio.active {
            note_period(self.note as i16 + self.arpeggio.offset as i16, self.finetune, 0)
        } else {
            self.period
        };
        if self.vibrato.speed != 0 {
            vibrato_period(base, self.vibrato.offset)
        } else {
            base
        }
    }

    /// Run the per-tick effect pass. Returns `true` when the partner channel
    /// should be ducked this tick.
    pub fn run_effects(
        &mut self,
        module: &Module,
        filter_out: &mut [i8; FILTER_BUFFER_LEN],
        rng: &mut fastrand::Rng,
    ) -> bool {
        match self.effects {
            EffectsGate::Off => return false,
            EffectsGate::Arming => {
                self.effects = EffectsGate::Running;
                return false;
            }
            EffectsGate::Running => {}
        }
        self.step_start_sweep();
        self.step_vibrato();
        self.step_glide();
        self.step_envelope();
        if self.filter.enabled {
            self.filter.render(&module.sample_data, filter_out);
        }
        self.step_arpeggio(module, rng)
    }

    fn step_start_sweep(&mut self) {
        let sweep = &mut self.start_sweep;
        if sweep.reverse_after == 0 {
            return;
        }
        self.shadow.set_start(self.shadow.start.offset(sweep.delta as i32));
        sweep.timer = sweep.timer.saturating_sub(1);
        if sweep.timer == 0 {
            sweep.delta = -sweep.delta;
            sweep.timer = sweep.reverse_after;
        }
    }

    fn step_vibrato(&mut self) {
        let v = &mut self.vibrato;
        if v.speed == 0 {
            return;
        }
        v.offset = v.offset.saturating_add(v.width as i16);
        v.timer = v.timer.saturating_sub(1);
        if v.timer == 0 {
            v.timer = v.speed;
            v.width = v.width.wrapping_neg();
        }
    }

    fn step_glide(&mut self) {
        if !self.glide.is_active() {
            return;
        }
        self.glide.timer = self.glide.timer.saturating_sub(1);
        if self.glide.timer != 0 {
            return;
        }
        self.glide.timer = self.glide.ticks.max(1);
        self.period = glide_step(self.period, self.target_period, self.glide.rate);
        if self.period == self.target_period {
            self.glide.rate = 0;
        }
    }

    fn step_envelope(&mut self) {
        let env = &mut self.envelope;
        if !env.active {
            return;
        }
        if env.timer > 0 {
            env.timer -= 1;
            return;
        }
        env.timer = env.ticks;
        let rate = env.rate.max(1) as i16;
        let (vol, target) = (self.volume as i16, env.target as i16);
        let next = if vol < target {
            (vol + rate).min(target)
        } else {
            (vol - rate).max(target)
        };
        self.volume = next as u8;
        if next == target {
            env.active = false;
        }
    }

    fn step_arpeggio(&mut self, module: &Module, rng: &mut fastrand::Rng) -> bool {
        let arp = &mut self.arpeggio;
        if !arp.active {
            return false;
        }
        let Some(table) = module.arpeggio(arp.table as usize) else {
            arp.active = false;
            return false;
        };
        let len = table.offsets.len();
        if len == 0 {
            arp.active = false;
            return false;
        }

        arp.timer = arp.timer.saturating_sub(1);
        if arp.timer != 0 {
            return false;
        }
        arp.timer = arp.speed.max(1);
        let held = arp.mode.hold && rng.u8(..4) == 0;
        if !held {
            arp.step = ((arp.step as usize + 1) % len) as u8;
        }
        arp.offset = table.offsets[arp.step as usize % len];
        arp.mode.echo && arp.step == 0
    }
}
