//! Headless controller for macrotracker.
//!
//! Owns an [`Engine`] together with a software channel sink and turns the
//! engine's tick stream into stereo frames, for tests and the CLI.

mod frame;
mod paula;
mod wav;

use mt_engine::{Engine, EngineConfig};
use mt_ir::Module;

pub use frame::Frame;
pub use mt_formats::FormatError;
pub use paula::SoftPaula;
pub use wav::{frames_to_wav, write_wav};

/// Default host tick rate in Hz.
pub const DEFAULT_TICK_HZ: u32 = 50;

/// Upper bound on frames reserved up front by `render_frames`.
const MAX_PREALLOC_FRAMES: usize = 1 << 22;

/// Rendering parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub engine: EngineConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            engine: EngineConfig::default(),
        }
    }
}

/// Engine plus software sink, clocked in output samples.
pub struct Controller {
    engine: Engine,
    paula: SoftPaula,
    sample_counter: u32,
    samples_per_tick: u32,
}

impl Controller {
    pub fn new(module: Module, config: RenderConfig) -> Self {
        let paula = SoftPaula::new(module.channel_count(), config.sample_rate);
        let engine = Engine::new(module, config.engine);
        let mut controller = Self {
            engine,
            paula,
            sample_counter: 0,
            samples_per_tick: 1,
        };
        controller.update_cadence();
        controller
    }

    /// Parse a module image and build a controller for it.
    pub fn load(data: &[u8], config: RenderConfig) -> Result<Self, FormatError> {
        let module = mt_formats::load_module(data)?;
        Ok(Self::new(module, config))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn sample_rate(&self) -> u32 {
        self.paula.sample_rate()
    }

    // --- Playback ---

    pub fn start_song(&mut self, index: usize) {
        self.engine.load_song(index);
        self.engine.play();
        self.sample_counter = 0;
        self.update_cadence();
        tracing::debug!(song = index, samples_per_tick = self.samples_per_tick, "song started");
    }

    /// Stop playback. The next rendered frame ticks so the sink is silenced.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.sample_counter = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    /// Output samples between two engine ticks.
    pub fn samples_per_tick(&self) -> u32 {
        self.samples_per_tick
    }

    /// The song's timer is a tempo value where 125 means 50 Hz.
    fn update_cadence(&mut self) {
        let rate = self.paula.sample_rate();
        let samples = match self.engine.cadence_hint() {
            0 => rate / DEFAULT_TICK_HZ,
            timer => {
                let samples = rate as u64 * 5 / (2 * timer as u64);
                u32::try_from(samples).unwrap_or(u32::MAX)
            }
        };
        self.samples_per_tick = samples.max(1);
    }

    // --- Rendering ---

    pub fn render_frame(&mut self) -> Frame {
        if self.sample_counter == 0 {
            self.engine.tick(&mut self.paula);
            self.update_cadence();
            self.sample_counter = self.samples_per_tick;
        }
        self.sample_counter -= 1;
        self.paula.render_frame(&self.engine.memory())
    }

    /// Number of frames in `seconds` of output, saturating.
    pub fn frames_for_seconds(&self, seconds: u32) -> usize {
        let frames = self.sample_rate() as u64 * seconds as u64;
        usize::try_from(frames).unwrap_or(usize::MAX)
    }

    /// Render up to `max_frames`, ending early once playback stops.
    pub fn render_frames(&mut self, max_frames: usize) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(max_frames.min(MAX_PREALLOC_FRAMES));
        while self.engine.is_playing() && frames.len() < max_frames {
            frames.push(self.render_frame());
        }
        frames
    }

    pub fn render_to_wav(&mut self, max_seconds: u32) -> Result<Vec<u8>, hound::Error> {
        let frames = self.render_frames(self.frames_for_seconds(max_seconds));
        frames_to_wav(&frames, self.sample_rate())
    }
}
