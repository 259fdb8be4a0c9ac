//! Replay engine for macrotracker modules.
//!
//! A tick-driven two-level sequencer: tracks step through patterns that
//! start per-channel macro programs, and every tick the resulting register
//! state is committed to a [`ChannelRegisters`] sink.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod config;
mod engine;
mod filter_sim;
mod frequency;
mod loop_counter;
mod macro_vm;
mod master;
mod memory;
mod registers;
mod sequencer;
mod sfx;

#[cfg(test)]
mod test_support;

pub use channel::{ChannelState, EffectsGate, MacroCursor, MAX_VOLUME};
pub use config::EngineConfig;
pub use engine::Engine;
pub use filter_sim::FilterSim;
pub use frequency::{note_period, period_to_increment, PAULA_CLOCK, PERIOD_TABLE};
pub use loop_counter::{LoopCounter, ReturnPoint};
pub use master::{Fade, MasterState, MASTER_VOLUME_MAX};
pub use memory::Memory;
pub use registers::{ChannelRegisters, ShadowRegisters};
pub use sequencer::{TrackState, TrackStatus, OVERRIDE_TRACK};
pub use sfx::{SfxRequest, SfxSlot};
