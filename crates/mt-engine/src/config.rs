//! Engine configuration.

/// Tunables fixed for the lifetime of an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Seed for the arpeggio hold sequence
    pub rng_seed: u64,
    /// Stop playback when the song wraps instead of looping
    pub stop_at_song_end: bool,
    /// Upper bound on instructions decoded per track or channel per tick
    pub max_ops_per_activation: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0x5EED_7F3A,
            stop_at_song_end: false,
            max_ops_per_activation: 64,
        }
    }
}
