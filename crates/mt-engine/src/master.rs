//! Song-wide playback state: position, tempo and master fade.

use crate::loop_counter::LoopCounter;

/// Maximum master volume.
pub const MASTER_VOLUME_MAX: u8 = 64;

/// Master fade toward a target volume, one unit every `reset` ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fade {
    pub target: u8,
    /// -1, 0 or +1
    pub slope: i8,
    pub reset: u8,
    pub timer: u8,
}

/// Global replay state owned by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterState {
    /// Index of the loaded song
    pub song: usize,
    /// Playback enabled; `tick` is a no-op otherwise
    pub enabled: bool,
    /// Ticks processed while enabled
    pub tick_count: u64,
    /// Sequencer divisor
    pub tempo: u16,
    /// Counts down to the next sequencer activation
    pub speed_counter: u16,
    /// Master volume (0-64)
    pub volume: u8,
    pub fade: Fade,
    pub first_step: u16,
    pub last_step: u16,
    /// Current track-table step
    pub position: u16,
    /// Counter for track-table loop commands
    pub step_loop: LoopCounter,
    /// Set when the song wrapped; cleared by the host
    pub song_end: bool,
    /// The override track slot is live
    pub override_active: bool,
    /// Cadence hint from the song (0 = default)
    pub timer: u16,
    /// One silencing mask write is owed to the sink
    pub silence_pending: bool,
}

impl Default for MasterState {
    fn default() -> Self {
        Self {
            song: 0,
            enabled: false,
            tick_count: 0,
            tempo: 0,
            speed_counter: 0,
            volume: MASTER_VOLUME_MAX,
            fade: Fade {
                target: MASTER_VOLUME_MAX,
                ..Default::default()
            },
            first_step: 0,
            last_step: 0,
            position: 0,
            step_loop: LoopCounter::unset(),
            song_end: false,
            override_active: false,
            timer: 0,
            silence_pending: false,
        }
    }
}

impl MasterState {
    /// Count down the tempo divisor; `true` when the sequencer should run.
    pub fn tempo_elapsed(&mut self) -> bool {
        if self.speed_counter == 0 {
            self.speed_counter = self.tempo;
            true
        } else {
            self.speed_counter -= 1;
            false
        }
    }

    /// Disable playback and owe the sink one silencing write.
    pub fn halt(&mut self) {
        if self.enabled {
            self.enabled = false;
            self.silence_pending = true;
        }
    }

    pub fn fade_running(&self) -> bool {
        self.fade.slope != 0
    }

    /// Start fading toward `target`, one unit every `speed` ticks.
    /// A speed of 0 jumps straight to the target.
    pub fn start_fade(&mut self, target: u8, speed: u8) {
        let target = target.min(MASTER_VOLUME_MAX);
        self.fade.target = target;
        self.fade.reset = speed;
        self.fade.timer = speed;
        if speed == 0 || self.volume == target {
            self.volume = target;
            self.fade.slope = 0;
        } else if self.volume > target {
            self.fade.slope = -1;
        } else {
            self.fade.slope = 1;
        }
    }

    pub fn step_fade(&mut self) {
        if self.fade.slope == 0 {
            return;
        }
        self.fade.timer = self.fade.timer.saturating_sub(1);
        if self.fade.timer != 0 {
            return;
        }
        self.fade.timer = self.fade.reset;
        self.volume = (self.volume as i16 + self.fade.slope as i16)
            .clamp(0, MASTER_VOLUME_MAX as i16) as u8;
        if self.volume == self.fade.target {
            self.fade.slope = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_period_is_divisor_plus_one() {
        let mut m = MasterState { tempo: 6, ..Default::default() };
        let fired: Vec<u64> = (1..=20).filter(|_| m.tempo_elapsed()).collect();
        assert_eq!(fired, [1, 8, 15]);
    }

    #[test]
    fn fade_steps_once_per_tick_to_zero() {
        let mut m = MasterState::default();
        m.start_fade(0, 1);
        assert_eq!(m.fade.slope, -1);
        for expected in (0..64).rev() {
            m.step_fade();
            assert_eq!(m.volume, expected);
        }
        assert_eq!(m.fade.slope, 0);
        m.step_fade();
        assert_eq!(m.volume, 0);
    }

    #[test]
    fn fade_is_monotonic_and_never_overshoots() {
        for (start, target, speed) in [(64u8, 10u8, 3u8), (0, 64, 1), (30, 31, 7), (50, 0, 2)] {
            let mut m = MasterState { volume: start, ..Default::default() };
            m.start_fade(target, speed);
            let mut last = m.volume;
            for _ in 0..1000 {
                m.step_fade();
                if start > target {
                    assert!(m.volume <= last && m.volume >= target);
                } else {
                    assert!(m.volume >= last && m.volume <= target);
                }
                last = m.volume;
            }
            assert_eq!(m.volume, target);
            assert_eq!(m.fade.slope, 0);
        }
    }

    #[test]
    fn slope_is_zero_iff_at_target() {
        let mut m = MasterState::default();
        assert_eq!(m.fade.slope == 0, m.volume == m.fade.target);
        m.start_fade(20, 2);
        while m.fade_running() {
            assert_ne!(m.volume, m.fade.target);
            m.step_fade();
        }
        assert_eq!(m.volume, m.fade.target);
    }

    #[test]
    fn zero_speed_fade_jumps() {
        let mut m = MasterState::default();
        m.start_fade(12, 0);
        assert_eq!(m.volume, 12);
        assert!(!m.fade_running());
    }

    #[test]
    fn halt_owes_one_silence_write() {
        let mut m = MasterState { enabled: true, ..Default::default() };
        m.halt();
        assert!(!m.enabled && m.silence_pending);
        m.silence_pending = false;
        m.halt();
        assert!(!m.silence_pending);
    }
}
