//! Track sequencer: walks the track table and runs one pattern per track.
//!
//! The sequencer only runs when the tempo divisor elapses. Each activation
//! visits every music track, then the override slot when it is live.

use mt_ir::{
    Module, NoteEvent, PatternOp, SongCommand, TrackSlot, TrackStep, CUE_SLOTS, MAX_CHANNELS,
};

use crate::channel::ChannelState;
use crate::loop_counter::{LoopCounter, ReturnPoint};
use crate::master::MasterState;

/// Index of the override track, after the music tracks.
pub const OVERRIDE_TRACK: usize = MAX_CHANNELS;
/// Music tracks plus the override slot.
pub const TRACK_SLOTS: usize = MAX_CHANNELS + 1;

/// Restarts after `End` allowed within one activation.
const MAX_RESTARTS: u8 = 4;

/// Scheduling state of one track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackStatus {
    /// Decodes on the next activation
    Running,
    /// Skips this many more activations
    Waiting(u8),
    /// Idle until the track is reloaded
    #[default]
    Stopped,
}

/// Pattern cursor for one track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackState {
    /// Pattern being played; `None` when the track has nothing loaded
    pub pattern: Option<u8>,
    pub step: u16,
    pub transpose: i8,
    pub loop_counter: LoopCounter,
    pub status: TrackStatus,
    pub ret: Option<ReturnPoint>,
}

impl TrackState {
    /// Start `pattern` from its first step.
    pub fn load(&mut self, pattern: u8, transpose: i8) {
        *self = TrackState {
            pattern: Some(pattern),
            transpose,
            status: TrackStatus::Running,
            ..Default::default()
        };
    }

    pub fn stop(&mut self) {
        self.status = TrackStatus::Stopped;
    }

    pub fn is_stopped(&self) -> bool {
        self.status == TrackStatus::Stopped
    }
}

enum Flow {
    Next,
    Yield,
    /// The pattern hit `End`; the song advanced.
    Ended,
}

/// Borrowed view over the engine state one activation touches.
pub(crate) struct Sequencer<'a> {
    pub module: &'a Module,
    pub master: &'a mut MasterState,
    pub tracks: &'a mut [TrackState; TRACK_SLOTS],
    pub channels: &'a mut [ChannelState],
    pub cues: &'a mut [u16; CUE_SLOTS],
    pub max_ops: u16,
    pub stop_at_song_end: bool,
}

impl Sequencer<'_> {
    /// Run one sequencer activation.
    pub fn activate(&mut self) {
        let tracks = self.channels.len();
        let mut restarts = 0;
        let mut t = 0;
        while t <= tracks {
            let index = if t < tracks { t } else { OVERRIDE_TRACK };
            if index == OVERRIDE_TRACK && !self.master.override_active {
                break;
            }
            match self.run_track(index) {
                Flow::Ended => {
                    if !self.master.enabled || restarts == MAX_RESTARTS {
                        return;
                    }
                    restarts += 1;
                    t = 0;
                }
                Flow::Next | Flow::Yield => t += 1,
            }
        }
    }

    fn run_track(&mut self, t: usize) -> Flow {
        let track = &mut self.tracks[t];
        match track.status {
            TrackStatus::Stopped => return Flow::Yield,
            TrackStatus::Waiting(0) => track.status = TrackStatus::Running,
            TrackStatus::Waiting(n) => {
                track.status = TrackStatus::Waiting(n - 1);
                return Flow::Yield;
            }
            TrackStatus::Running => {}
        }

        for _ in 0..self.max_ops {
            let track = &mut self.tracks[t];
            let ins = track
                .pattern
                .and_then(|p| self.module.pattern(p as usize))
                .and_then(|p| p.fetch(track.step));
            let Some(ins) = ins else {
                track.stop();
                return Flow::Yield;
            };
            track.step = track.step.wrapping_add(1);
            match self.execute(t, PatternOp::decode(ins)) {
                Flow::Next => {}
                flow => return flow,
            }
        }
        tracing::trace!(track = t, "pattern op budget exhausted");
        Flow::Yield
    }

    fn transposed(&self, t: usize, note: u8) -> u8 {
        (note as i16 + self.tracks[t].transpose as i16).rem_euclid(64) as u8
    }

    /// The channel a music event targets, or `None` while an SFX owns it.
    fn music_channel(&mut self, channel: u8) -> Option<&mut ChannelState> {
        let last = self.channels.len().saturating_sub(1);
        let ch = self.channels.get_mut((channel as usize).min(last))?;
        (!ch.sfx.is_active()).then_some(ch)
    }

    fn play_note(&mut self, mut event: NoteEvent) {
        let last = self.channels.len().saturating_sub(1) as u8;
        event.channel = event.channel.min(last);
        if let Some(ch) = self.music_channel(event.channel) {
            ch.trigger(&event);
        }
    }

    fn execute(&mut self, t: usize, op: PatternOp) -> Flow {
        match op {
            PatternOp::Note { mut event, exempt } => {
                if !exempt {
                    event.note = self.transposed(t, event.note);
                }
                self.play_note(event);
            }
            PatternOp::NoteWait { mut event, wait } => {
                event.note = self.transposed(t, event.note);
                self.play_note(event);
                self.tracks[t].status = TrackStatus::Waiting(wait);
                return Flow::Yield;
            }
            PatternOp::Glide { note, channel, ticks, rate } => {
                let note = self.transposed(t, note);
                if let Some(ch) = self.music_channel(channel) {
                    ch.glide_to(note, ticks, rate);
                }
            }
            PatternOp::End => {
                if t == OVERRIDE_TRACK {
                    self.tracks[t].stop();
                    self.master.override_active = false;
                    return Flow::Yield;
                }
                self.advance_song();
                return Flow::Ended;
            }
            PatternOp::Loop { count, step } => {
                let track = &mut self.tracks[t];
                if track.loop_counter.hit(count as u16) {
                    track.step = step;
                }
            }
            PatternOp::Continue { pattern, step } => {
                let track = &mut self.tracks[t];
                track.pattern = Some(pattern);
                track.step = step;
                track.loop_counter.reset();
            }
            PatternOp::Wait(n) => {
                self.tracks[t].status = TrackStatus::Waiting(n);
                return Flow::Yield;
            }
            PatternOp::Stop => {
                self.tracks[t].stop();
                return Flow::Yield;
            }
            PatternOp::KeyUp { channel } => {
                if let Some(ch) = self.music_channel(channel) {
                    ch.key_up();
                }
            }
            PatternOp::Vibrato { speed, channel, intensity } => {
                if let Some(ch) = self.music_channel(channel) {
                    ch.start_vibrato(speed, intensity);
                }
            }
            PatternOp::Envelope { rate, ticks, channel, target } => {
                if let Some(ch) = self.music_channel(channel) {
                    ch.start_envelope(rate, ticks, target);
                }
            }
            PatternOp::GotoSub { pattern, step } => {
                let track = &mut self.tracks[t];
                if let Some(current) = track.pattern {
                    track.ret = Some(ReturnPoint {
                        program: current,
                        step: track.step,
                    });
                }
                track.pattern = Some(pattern);
                track.step = step;
                track.loop_counter.reset();
            }
            PatternOp::Return => {
                let track = &mut self.tracks[t];
                if let Some(ret) = track.ret {
                    track.pattern = Some(ret.program);
                    track.step = ret.step;
                }
            }
            PatternOp::Fade { speed, target } => {
                if !self.master.fade_running() {
                    self.master.start_fade(target, speed);
                }
            }
            PatternOp::PlayPattern { pattern, transpose } => {
                self.tracks[OVERRIDE_TRACK].load(pattern, transpose);
                self.master.override_active = true;
                if t == OVERRIDE_TRACK {
                    return Flow::Yield;
                }
            }
            PatternOp::Lock { priority, channel, ticks } => {
                let last = self.channels.len().saturating_sub(1);
                if let Some(ch) = self.channels.get_mut((channel as usize).min(last)) {
                    ch.sfx.lock(priority, ticks as u16);
                }
            }
            PatternOp::Cue { slot, value } => {
                self.cues[slot as usize % CUE_SLOTS] = value;
            }
            PatternOp::CueStop { slot, value } => {
                self.cues[slot as usize % CUE_SLOTS] = value;
                self.master.override_active = false;
                self.tracks[t].stop();
                return Flow::Yield;
            }
            PatternOp::Nop => {}
        }
        Flow::Next
    }

    /// Move to the next track-table step after a pattern ended.
    fn advance_song(&mut self) {
        if self.step_forward() {
            self.load_step(self.master.position);
        }
    }

    /// Advance the song position by one, wrapping at the end of the song.
    /// Returns `false` when playback stopped at the song end.
    fn step_forward(&mut self) -> bool {
        let master = &mut *self.master;
        if master.position >= master.last_step {
            master.position = master.first_step;
            master.song_end = true;
            tracing::debug!(song = master.song, "song end");
            if self.stop_at_song_end {
                master.halt();
                return false;
            }
        } else {
            master.position += 1;
        }
        true
    }

    /// Load the track-table step at `step`, running any command steps on the
    /// way to the next pattern step.
    pub fn load_step(&mut self, step: u16) {
        self.master.position = step;
        for _ in 0..=self.module.track_steps.len() {
            let Some(entry) = self.module.track_step(self.master.position as usize) else {
                self.stop_music_tracks();
                return;
            };
            let command = match *entry {
                TrackStep::Patterns(slots) => {
                    self.load_slots(&slots);
                    return;
                }
                TrackStep::Command(command) => command,
            };
            match command {
                SongCommand::Stop => {
                    tracing::debug!(position = self.master.position, "song stop command");
                    self.stop_music_tracks();
                    self.master.halt();
                    return;
                }
                SongCommand::Loop { step, count } => {
                    if self.master.step_loop.hit(count) {
                        self.master.position =
                            step.clamp(self.master.first_step, self.master.last_step);
                        continue;
                    }
                }
                SongCommand::Tempo(tempo) => self.master.tempo = tempo,
                SongCommand::Timer(timer) => self.master.timer = timer,
                SongCommand::Fade { speed, target } => self.master.start_fade(target, speed),
                SongCommand::Unknown(code) => {
                    tracing::trace!(code, "skipping unknown song command");
                }
            }
            if !self.step_forward() {
                return;
            }
        }
        tracing::trace!("track table holds only commands");
        self.stop_music_tracks();
    }

    fn load_slots(&mut self, slots: &[TrackSlot; MAX_CHANNELS]) {
        let last = self.channels.len().saturating_sub(1);
        for (t, slot) in slots.iter().enumerate().take(self.channels.len()) {
            match *slot {
                TrackSlot::Play { pattern, transpose } => self.tracks[t].load(pattern, transpose),
                TrackSlot::Hold => {}
                TrackSlot::Silence { channel } => {
                    self.channels[(channel as usize).min(last)].silence();
                    self.tracks[t].stop();
                }
                TrackSlot::Stop => self.tracks[t].stop(),
            }
        }
    }

    fn stop_music_tracks(&mut self) {
        for track in &mut self.tracks[..OVERRIDE_TRACK] {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::PERIOD_TABLE;
    use crate::test_support::{module_with, single_track};
    use mt_ir::{MacroOp, VolumeArg};

    struct Rig {
        module: Module,
        master: MasterState,
        tracks: [TrackState; TRACK_SLOTS],
        channels: Vec<ChannelState>,
        cues: [u16; CUE_SLOTS],
    }

    impl Rig {
        fn new(module: Module) -> Self {
            let song = module.songs[0];
            let mut rig = Self {
                module,
                master: MasterState {
                    enabled: true,
                    first_step: song.first_step,
                    last_step: song.last_step,
                    ..Default::default()
                },
                tracks: [TrackState::default(); TRACK_SLOTS],
                channels: (0..4).map(|_| ChannelState::new()).collect(),
                cues: [0; CUE_SLOTS],
            };
            rig.seq().load_step(song.first_step);
            rig
        }

        fn seq(&mut self) -> Sequencer<'_> {
            Sequencer {
                module: &self.module,
                master: &mut self.master,
                tracks: &mut self.tracks,
                channels: &mut self.channels,
                cues: &mut self.cues,
                max_ops: 64,
                stop_at_song_end: false,
            }
        }

        fn activate(&mut self) {
            self.seq().activate();
        }
    }

    fn note(n: u8, channel: u8) -> PatternOp {
        PatternOp::Note {
            event: NoteEvent {
                note: n,
                program: Some(0),
                velocity: 15,
                channel,
                detune: 0,
            },
            exempt: false,
        }
    }

    const SILENT: &[MacroOp] = &[MacroOp::SetVolume(VolumeArg::Value(0)), MacroOp::Stop];

    #[test]
    fn wait_suspends_further_activations() {
        let module = module_with(
            vec![single_track(0)],
            &[&[note(60, 0), PatternOp::Wait(2), PatternOp::End]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.activate();
        assert_eq!(rig.channels[0].note, 60);
        assert_eq!(rig.tracks[0].status, TrackStatus::Waiting(2));
        rig.activate();
        assert_eq!(rig.tracks[0].status, TrackStatus::Waiting(1));
        rig.activate();
        assert_eq!(rig.tracks[0].status, TrackStatus::Waiting(0));
        assert!(!rig.master.song_end);
        rig.activate();
        // End wrapped the one-step song and reloaded the pattern.
        assert!(rig.master.song_end);
        assert_eq!(rig.tracks[0].status, TrackStatus::Waiting(2));
    }

    #[test]
    fn transpose_wraps_and_exempt_notes_ignore_it() {
        let mut module = module_with(
            vec![TrackStep::patterns(&[TrackSlot::Play { pattern: 0, transpose: 10 }])],
            &[&[note(60, 0), PatternOp::Stop]],
            &[SILENT],
        );
        module.patterns.push(mt_ir::Program::from_pattern_ops(&[
            PatternOp::Note {
                event: NoteEvent { note: 60, channel: 1, ..Default::default() },
                exempt: true,
            },
            PatternOp::Stop,
        ]));
        module.track_steps[0] = TrackStep::patterns(&[
            TrackSlot::Play { pattern: 0, transpose: 10 },
            TrackSlot::Play { pattern: 1, transpose: 10 },
        ]);
        let mut rig = Rig::new(module);
        rig.activate();
        assert_eq!(rig.channels[0].note, 6);
        assert_eq!(rig.channels[1].note, 60);
    }

    #[test]
    fn pattern_loop_runs_body_count_plus_one_times() {
        let module = module_with(
            vec![single_track(0)],
            &[&[
                PatternOp::Cue { slot: 0, value: 1 },
                PatternOp::Wait(0),
                PatternOp::Loop { count: 2, step: 0 },
                PatternOp::Cue { slot: 1, value: 1 },
                PatternOp::Stop,
            ]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        let mut activations = 0;
        while rig.cues[1] == 0 {
            rig.activate();
            activations += 1;
            assert!(activations < 20);
        }
        // One pass plus two jumps, each ending on a wait.
        assert_eq!(activations, 4);
    }

    #[test]
    fn goto_sub_returns_to_next_step() {
        let module = module_with(
            vec![single_track(0)],
            &[
                &[
                    PatternOp::GotoSub { pattern: 1, step: 0 },
                    PatternOp::Cue { slot: 1, value: 2 },
                    PatternOp::Stop,
                ],
                &[PatternOp::Cue { slot: 0, value: 1 }, PatternOp::Return],
            ],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.activate();
        assert_eq!(rig.cues[..2], [1, 2]);
        assert_eq!(rig.tracks[0].ret, Some(ReturnPoint { program: 0, step: 1 }));
        assert_eq!(rig.tracks[0].pattern, Some(0));
        assert!(rig.tracks[0].is_stopped());
    }

    #[test]
    fn notes_to_sfx_channel_are_dropped() {
        let module = module_with(
            vec![single_track(0)],
            &[&[note(20, 2), PatternOp::KeyUp { channel: 2 }, PatternOp::Stop]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.channels[2].sfx.offer(crate::sfx::SfxRequest::new(2, 1, 0, 10));
        rig.channels[2].sfx.advance();
        rig.channels[2].key_down = true;
        rig.activate();
        assert_eq!(rig.channels[2].note, 0);
        assert!(rig.channels[2].key_down);
    }

    #[test]
    fn channel_index_clamps() {
        let module = module_with(vec![single_track(0)], &[&[note(5, 9), PatternOp::Stop]], &[SILENT]);
        let mut rig = Rig::new(module);
        rig.activate();
        assert_eq!(rig.channels[3].note, 5);
    }

    #[test]
    fn play_pattern_runs_override_until_cue_stop() {
        let module = module_with(
            vec![single_track(0)],
            &[
                &[PatternOp::PlayPattern { pattern: 1, transpose: 0 }, PatternOp::Stop],
                &[note(7, 1), PatternOp::Wait(0), PatternOp::CueStop { slot: 3, value: 9 }],
            ],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.activate();
        assert!(rig.master.override_active);
        assert_eq!(rig.channels[1].note, 7);
        rig.activate();
        assert!(!rig.master.override_active);
        assert_eq!(rig.cues[3], 9);
        assert!(rig.tracks[OVERRIDE_TRACK].is_stopped());
    }

    #[test]
    fn pattern_fade_is_edge_triggered() {
        let module = module_with(
            vec![single_track(0)],
            &[&[
                PatternOp::Fade { speed: 4, target: 0 },
                PatternOp::Fade { speed: 1, target: 64 },
                PatternOp::Stop,
            ]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.activate();
        assert_eq!(rig.master.fade.target, 0);
        assert_eq!(rig.master.fade.reset, 4);
    }

    #[test]
    fn glide_transposes_target_without_restarting_macro() {
        let module = module_with(
            vec![TrackStep::patterns(&[TrackSlot::Play { pattern: 0, transpose: 10 }])],
            &[&[
                note(20, 0),
                PatternOp::Wait(0),
                PatternOp::Glide { note: 30, channel: 0, ticks: 1, rate: 8 },
                PatternOp::Stop,
            ]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.activate();
        assert_eq!(rig.channels[0].note, 30);
        rig.channels[0].cursor.step = 5;

        rig.activate();
        let ch = &rig.channels[0];
        assert_eq!(ch.note, 40);
        assert_eq!(ch.target_period, PERIOD_TABLE[40]);
        assert_eq!(ch.glide.rate, 8);
        assert_eq!(ch.cursor.step, 5);
    }

    #[test]
    fn glide_is_dropped_while_sfx_owns_channel() {
        let module = module_with(
            vec![single_track(0)],
            &[&[PatternOp::Glide { note: 30, channel: 0, ticks: 1, rate: 8 }, PatternOp::Stop]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.channels[0].sfx.lock(1, 10);
        let before = rig.channels[0].note;
        rig.activate();
        assert_eq!(rig.channels[0].note, before);
        assert_eq!(rig.channels[0].glide.rate, 0);
    }

    #[test]
    fn vibrato_and_envelope_reach_their_channels() {
        let module = module_with(
            vec![single_track(0)],
            &[&[
                PatternOp::Vibrato { speed: 6, channel: 1, intensity: -4 },
                PatternOp::Envelope { rate: 2, ticks: 3, channel: 2, target: 70 },
                PatternOp::Vibrato { speed: 6, channel: 3, intensity: 4 },
                PatternOp::Stop,
            ]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.channels[3].sfx.lock(1, 10);
        rig.activate();

        assert_eq!(rig.channels[1].vibrato.speed, 6);
        assert_eq!(rig.channels[1].vibrato.width, -4);
        let env = rig.channels[2].envelope;
        assert!(env.active);
        assert_eq!((env.rate, env.ticks, env.target), (2, 3, 64));
        assert_eq!(rig.channels[3].vibrato.speed, 0);
        assert_eq!(rig.channels[0].vibrato.speed, 0);
    }

    #[test]
    fn song_fade_overrides_running_fade() {
        let module = module_with(
            vec![
                TrackStep::Command(SongCommand::Fade { speed: 4, target: 0 }),
                TrackStep::Command(SongCommand::Fade { speed: 1, target: 32 }),
                single_track(0),
            ],
            &[&[PatternOp::Stop]],
            &[SILENT],
        );
        let rig = Rig::new(module);
        assert_eq!(rig.master.fade.target, 32);
        assert_eq!(rig.master.fade.reset, 1);
        assert_eq!(rig.master.fade.slope, -1);
    }

    #[test]
    fn song_commands_run_on_load() {
        let module = module_with(
            vec![
                TrackStep::Command(SongCommand::Tempo(5)),
                TrackStep::Command(SongCommand::Timer(125)),
                single_track(0),
            ],
            &[&[PatternOp::Stop]],
            &[SILENT],
        );
        let rig = Rig::new(module);
        assert_eq!(rig.master.tempo, 5);
        assert_eq!(rig.master.timer, 125);
        assert_eq!(rig.master.position, 2);
        assert_eq!(rig.tracks[0].status, TrackStatus::Running);
    }

    #[test]
    fn song_loop_command_repeats_section() {
        let module = module_with(
            vec![
                single_track(0),
                TrackStep::Command(SongCommand::Loop { step: 0, count: 1 }),
                single_track(0),
            ],
            &[&[PatternOp::Wait(0), PatternOp::End]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        let mut positions = Vec::new();
        for _ in 0..3 {
            rig.activate();
            rig.activate();
            positions.push(rig.master.position);
        }
        assert_eq!(positions, [0, 2, 0]);
        assert!(rig.master.song_end);
    }

    #[test]
    fn song_stop_command_halts_playback() {
        let module = module_with(
            vec![single_track(0), TrackStep::Command(SongCommand::Stop)],
            &[&[PatternOp::End]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.activate();
        assert!(!rig.master.enabled);
        assert!(rig.master.silence_pending);
        assert!(rig.tracks[0].is_stopped());
    }

    #[test]
    fn silence_slot_silences_channel() {
        let module = module_with(
            vec![TrackStep::patterns(&[TrackSlot::Silence { channel: 2 }])],
            &[&[PatternOp::Stop]],
            &[SILENT],
        );
        let rig = Rig::new(module);
        assert!(rig.tracks[0].is_stopped());
        assert!(rig.channels[2].shadow.deferred_off);
    }

    #[test]
    fn end_loop_is_bounded() {
        let module = module_with(vec![single_track(0)], &[&[PatternOp::End]], &[SILENT]);
        let mut rig = Rig::new(module);
        rig.activate();
        assert!(rig.master.song_end);
    }

    #[test]
    fn running_off_pattern_end_stops_track() {
        let module = module_with(vec![single_track(0)], &[&[note(1, 0)]], &[SILENT]);
        let mut rig = Rig::new(module);
        rig.activate();
        assert!(rig.tracks[0].is_stopped());
    }

    #[test]
    fn lock_reserves_channel() {
        let module = module_with(
            vec![single_track(0)],
            &[&[PatternOp::Lock { priority: 3, channel: 1, ticks: 5 }, PatternOp::Stop]],
            &[SILENT],
        );
        let mut rig = Rig::new(module);
        rig.activate();
        assert!(rig.channels[1].sfx.is_active());
        assert_eq!(rig.channels[1].sfx.priority(), 3);
    }
}
