//! Main replay engine.

use mt_ir::{Module, NoteEvent, CUE_SLOTS, FILTER_BUFFER_LEN, MAX_CHANNELS};

use crate::channel::ChannelState;
use crate::config::EngineConfig;
use crate::macro_vm::{self, MacroContext};
use crate::master::MasterState;
use crate::memory::Memory;
use crate::registers::{commit, ChannelRegisters, DmaMask};
use crate::sequencer::{Sequencer, TrackState, OVERRIDE_TRACK, TRACK_SLOTS};
use crate::sfx::SfxRequest;

/// The replay engine for one loaded module.
///
/// The host calls [`tick`](Engine::tick) at a fixed cadence and uses the
/// control methods between ticks. Nothing inside a tick allocates.
pub struct Engine {
    /// The module being played
    module: Module,
    config: EngineConfig,
    master: MasterState,
    /// Music tracks followed by the override slot
    tracks: [TrackState; TRACK_SLOTS],
    channels: heapless::Vec<ChannelState, MAX_CHANNELS>,
    /// Cue slots written by patterns and macros
    cues: [u16; CUE_SLOTS],
    /// Filter-sim output, one block per channel
    filter_buffers: [[i8; FILTER_BUFFER_LEN]; MAX_CHANNELS],
    rng: fastrand::Rng,
    mask: DmaMask,
}

impl Engine {
    /// Create an engine for `module` with song 0 loaded and playback stopped.
    pub fn new(module: Module, config: EngineConfig) -> Self {
        let channels = (0..module.channel_count())
            .map(|_| ChannelState::new())
            .collect();
        let rng = fastrand::Rng::with_seed(config.rng_seed);

        let mut engine = Self {
            module,
            config,
            master: MasterState::default(),
            tracks: [TrackState::default(); TRACK_SLOTS],
            channels,
            cues: [0; CUE_SLOTS],
            filter_buffers: [[0; FILTER_BUFFER_LEN]; MAX_CHANNELS],
            rng,
            mask: DmaMask::default(),
        };
        engine.load_song(0);
        engine
    }

    /// Run one tick and push the resulting register state to `sink`.
    pub fn tick<S: ChannelRegisters + ?Sized>(&mut self, sink: &mut S) {
        if !self.master.enabled {
            if core::mem::take(&mut self.master.silence_pending) {
                sink.write_dma_mask(0);
                self.mask = DmaMask::default();
            }
            return;
        }

        self.master.tick_count += 1;
        let ducked = self.run_channels();
        if self.master.tempo_elapsed() {
            self.sequencer().activate();
        }
        self.run_sfx();
        commit(
            sink,
            self.channels.as_mut_slice(),
            &mut self.mask,
            self.master.volume,
            ducked,
        );
        self.master.step_fade();
    }

    /// Macro decode and effect pass for every channel. Returns the mask of
    /// channels ducked by a partner's arpeggio echo.
    fn run_channels(&mut self) -> u8 {
        let mut ducked = 0u8;
        let max_ops = self.config.max_ops_per_activation;
        for (i, ch) in self.channels.iter_mut().enumerate() {
            let mut ctx = MacroContext {
                module: &self.module,
                cues: &mut self.cues,
                channel: i,
                max_ops,
            };
            macro_vm::run(ch, &mut ctx);
            if ch.run_effects(&self.module, &mut self.filter_buffers[i], &mut self.rng) {
                ducked |= 1 << (i ^ 1);
            }
        }
        ducked
    }

    /// Expire locks and start pending sound effects.
    fn run_sfx(&mut self) {
        for (i, ch) in self.channels.iter_mut().enumerate() {
            if let Some(request) = ch.sfx.advance() {
                ch.trigger(&NoteEvent {
                    note: request.note,
                    program: Some(request.program),
                    velocity: request.velocity,
                    channel: i as u8,
                    detune: request.detune,
                });
            }
        }
    }

    fn sequencer(&mut self) -> Sequencer<'_> {
        Sequencer {
            module: &self.module,
            master: &mut self.master,
            tracks: &mut self.tracks,
            channels: self.channels.as_mut_slice(),
            cues: &mut self.cues,
            max_ops: self.config.max_ops_per_activation,
            stop_at_song_end: self.config.stop_at_song_end,
        }
    }

    fn clamp_channel(&self, channel: u8) -> usize {
        (channel as usize).min(self.channels.len() - 1)
    }

    // Control surface

    /// Reset all replay state and cue up song `index` (clamped).
    /// Playback stays enabled or disabled as it was.
    pub fn load_song(&mut self, index: usize) {
        let index = index.min(self.module.songs.len().saturating_sub(1));
        let song = self.module.song(index).copied().unwrap_or_default();

        self.master = MasterState {
            song: index,
            enabled: self.master.enabled,
            silence_pending: self.master.silence_pending,
            tempo: song.tempo,
            timer: song.timer,
            first_step: song.first_step,
            last_step: song.last_step.max(song.first_step),
            ..Default::default()
        };
        self.tracks = [TrackState::default(); TRACK_SLOTS];
        for ch in self.channels.iter_mut() {
            *ch = ChannelState::new();
            ch.silence();
        }
        self.cues = [0; CUE_SLOTS];
        self.rng = fastrand::Rng::with_seed(self.config.rng_seed);
        self.sequencer().load_step(song.first_step);

        tracing::debug!(
            song = index,
            first = song.first_step,
            last = song.last_step,
            tempo = song.tempo,
            "song loaded"
        );
    }

    /// Enable playback.
    pub fn play(&mut self) {
        self.master.enabled = true;
        self.master.silence_pending = false;
    }

    /// Disable playback. The next tick writes one all-off enable mask.
    pub fn stop(&mut self) {
        tracing::debug!(tick = self.master.tick_count, "playback stopped");
        self.master.halt();
    }

    /// Fade the master volume to `target`, one unit every `ticks` ticks.
    /// Replaces any fade in progress.
    pub fn set_fade(&mut self, target: u8, ticks: u8) {
        self.master.start_fade(target, ticks);
    }

    /// Queue a sound effect. Returns `false` if the channel's active effect
    /// outranks it.
    pub fn request_sfx(&mut self, mut request: SfxRequest) -> bool {
        let channel = self.clamp_channel(request.channel);
        request.channel = channel as u8;
        let accepted = self.channels[channel].sfx.offer(request);
        tracing::debug!(
            channel,
            priority = request.priority,
            program = request.program,
            accepted,
            "sfx request"
        );
        accepted
    }

    /// Queue the sound effect at `index` of the module's SFX table.
    pub fn request_sfx_entry(&mut self, index: usize) -> bool {
        match self.module.sfx_entry(index) {
            Some(entry) => self.request_sfx(SfxRequest::from_entry(entry)),
            None => false,
        }
    }

    /// Restart the song at track-table `step`, clamped to the song's range.
    /// The sequencer fires on the next tick.
    pub fn jump_to_pattern_step(&mut self, step: u16) {
        let step = step.clamp(self.master.first_step, self.master.last_step);
        for track in &mut self.tracks[..OVERRIDE_TRACK] {
            *track = TrackState::default();
        }
        self.master.step_loop.reset();
        self.master.speed_counter = 0;
        self.sequencer().load_step(step);
    }

    /// Play `pattern` on the override track alongside the song.
    pub fn play_override_pattern(&mut self, pattern: u8, transpose: i8) {
        self.tracks[OVERRIDE_TRACK].load(pattern, transpose);
        self.master.override_active = true;
    }

    /// Trigger a note directly. Returns `false` if an effect owns the channel.
    pub fn note_on(&mut self, mut event: NoteEvent) -> bool {
        let channel = self.clamp_channel(event.channel);
        event.channel = channel as u8;
        let ch = &mut self.channels[channel];
        if ch.sfx.is_active() {
            return false;
        }
        ch.trigger(&event);
        true
    }

    pub fn key_up(&mut self, channel: u8) {
        let channel = self.clamp_channel(channel);
        self.channels[channel].key_up();
    }

    // Queries

    pub fn cues(&self) -> [u16; CUE_SLOTS] {
        self.cues
    }

    /// Whether the song wrapped since the last call.
    pub fn take_song_end(&mut self) -> bool {
        core::mem::take(&mut self.master.song_end)
    }

    pub fn is_playing(&self) -> bool {
        self.master.enabled
    }

    /// Current track-table step.
    pub fn position(&self) -> u16 {
        self.master.position
    }

    pub fn master(&self) -> &MasterState {
        &self.master
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn track(&self, index: usize) -> Option<&TrackState> {
        self.tracks.get(index)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Everything the channel start registers can address.
    pub fn memory(&self) -> Memory<'_> {
        Memory::new(&self.module.sample_data, &self.filter_buffers)
    }

    /// Host tick rate hint from the song (0 means the default 50 Hz).
    pub fn cadence_hint(&self) -> u16 {
        self.master.timer
    }
}
