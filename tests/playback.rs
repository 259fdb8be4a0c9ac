//! Integration test: image → controller → rendered frames.

use mt_formats::save_module;
use mt_ir::{
    MacroOp, Module, NoteEvent, PatternOp, Program, SongCommand, SongEntry, TrackSlot, TrackStep,
    VolumeArg,
};
use mt_master::{Controller, Frame, RenderConfig};

const RATE: u32 = 22_050;

fn two_voice_module() -> Module {
    let mut module = Module::new("two voices", 4);
    module.songs.push(SongEntry { first_step: 0, last_step: 0, tempo: 2, timer: 0 });
    module.songs.push(SongEntry { first_step: 1, last_step: 2, tempo: 0, timer: 0 });
    module.track_steps.push(TrackStep::patterns(&[
        TrackSlot::Play { pattern: 0, transpose: 0 },
        TrackSlot::Play { pattern: 1, transpose: 0 },
    ]));
    module.track_steps.push(TrackStep::patterns(&[TrackSlot::Play { pattern: 0, transpose: 0 }]));
    module.track_steps.push(TrackStep::Command(SongCommand::Stop));

    module.patterns.push(Program::from_pattern_ops(&[
        PatternOp::Note {
            event: NoteEvent { note: 24, program: Some(0), velocity: 15, channel: 0, detune: 0 },
            exempt: false,
        },
        PatternOp::Wait(30),
        PatternOp::End,
    ]));
    module.patterns.push(Program::from_pattern_ops(&[
        PatternOp::Note {
            event: NoteEvent { note: 31, program: Some(0), velocity: 15, channel: 1, detune: 0 },
            exempt: false,
        },
        PatternOp::Wait(30),
        PatternOp::End,
    ]));
    module.macros.push(Program::from_macro_ops(&[
        MacroOp::SetStart(0),
        MacroOp::SetLength(16),
        MacroOp::AddNote { semitones: 0, detune: 0 },
        MacroOp::SetVolume(VolumeArg::Value(64)),
        MacroOp::DmaOn { effects: 0 },
        MacroOp::Stop,
    ]));
    module.sample_data = (0..32).map(|i| if i < 16 { 80 } else { -80 }).collect();
    module
}

fn controller() -> Controller {
    let bytes = save_module(&two_voice_module()).unwrap();
    Controller::load(&bytes, RenderConfig { sample_rate: RATE, ..Default::default() }).unwrap()
}

#[test]
fn loaded_image_renders_audible_stereo() {
    let mut ctrl = controller();
    ctrl.start_song(0);
    let frames = ctrl.render_frames(RATE as usize);
    assert_eq!(frames.len(), RATE as usize);
    assert!(frames.iter().any(|f| f.left != 0), "left voice silent");
    assert!(frames.iter().any(|f| f.right != 0), "right voice silent");
}

#[test]
fn stop_goes_silent() {
    let mut ctrl = controller();
    ctrl.start_song(0);
    ctrl.render_frames(RATE as usize / 2);
    ctrl.stop();
    assert!(!ctrl.is_playing());
    assert!(ctrl.render_frames(1000).is_empty());

    // The owed silencing write reaches the sink on the next frame.
    let after: Vec<Frame> = (0..100).map(|_| ctrl.render_frame()).collect();
    assert!(after.iter().all(Frame::is_silent));
}

#[test]
fn song_stop_command_ends_rendering() {
    let mut ctrl = controller();
    ctrl.start_song(1);
    let frames = ctrl.render_frames(RATE as usize * 10);
    assert!(frames.len() < RATE as usize * 10);
    assert!(!ctrl.is_playing());
}

#[test]
fn wav_export_has_expected_length() {
    let mut ctrl = controller();
    ctrl.start_song(0);
    let wav = ctrl.render_to_wav(1).unwrap();
    assert_eq!(&wav[..4], b"RIFF");
    assert_eq!(wav.len(), 44 + RATE as usize * 4);
}
