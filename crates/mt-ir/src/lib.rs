//! Core IR types for macrotracker.
//!
//! This crate defines the immutable module tables a loader produces and the
//! fixed-width bytecode the replay engine interprets: track steps, pattern
//! programs and per-channel macro programs.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod address;
mod macro_op;
mod module;
mod pattern_op;
mod program;

pub use address::{Address, Region, FILTER_BUFFER_LEN, RESERVED_BASE};
pub use macro_op::{ArpeggioMode, DmaOffMode, MacroOp, VolumeArg};
pub use module::{
    push_truncated, ArpeggioTable, Module, NoteEvent, SampleInfo, SfxEntry, SongCommand, SongEntry, TrackSlot,
    TrackStep, COMMAND_MARKER, CUE_SLOTS, MAX_CHANNELS, MIN_CHANNELS,
};
pub use pattern_op::PatternOp;
pub use program::{Instruction, Program};
