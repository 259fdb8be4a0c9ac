//! macrotracker CLI: module info and offline WAV export.
//!
//! Usage:
//!   mt-cli path/to/module.mtrk
//!   mt-cli path/to/module.mtrk --song 1 --wav output.wav --seconds 60 --rate 48000

use mt_master::{Controller, RenderConfig};
use std::{env, fs};
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "Usage: mt-cli <module> [--song N] [--wav output.wav] [--seconds N] [--rate HZ]";

struct Args {
    path: String,
    song: usize,
    wav: Option<String>,
    seconds: u32,
    rate: u32,
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn numeric<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    match flag(args, name) {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            eprintln!("Invalid value for {}: {}", name, v);
            std::process::exit(1);
        }),
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let path = args.get(1).filter(|a| !a.starts_with("--")).cloned().unwrap_or_else(|| {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    });
    Args {
        path,
        song: numeric(&args, "--song", 0),
        wav: flag(&args, "--wav").map(str::to_owned),
        seconds: numeric(&args, "--seconds", 300),
        rate: numeric(&args, "--rate", 44_100),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let data = fs::read(&args.path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", args.path, e);
        std::process::exit(1);
    });

    let config = RenderConfig {
        sample_rate: args.rate.max(1),
        ..Default::default()
    };
    let mut ctrl = Controller::load(&data, config).unwrap_or_else(|e| {
        eprintln!("Failed to parse module: {}", e);
        std::process::exit(1);
    });

    let module = ctrl.engine().module();
    println!("Title:    {}", module.title);
    println!("Channels: {}", module.channel_count());
    println!("Songs:    {}", module.songs.len());
    println!("Steps:    {}", module.track_steps.len());
    println!("Patterns: {}", module.patterns.len());
    println!("Macros:   {}", module.macros.len());
    println!("SFX:      {}", module.sfx.len());
    println!("Samples:  {} ({} bytes)", module.samples.len(), module.sample_data.len());
    for (i, song) in module.songs.iter().enumerate() {
        println!(
            "  song {:2}: steps {:3}..={:3} tempo {} timer {}",
            i, song.first_step, song.last_step, song.tempo, song.timer
        );
    }
    println!();

    if args.song >= module.songs.len() {
        eprintln!("Song {} out of range, using the last song", args.song);
    }
    ctrl.start_song(args.song);

    match args.wav {
        Some(wav) => render_to_wav(&mut ctrl, &wav, args.seconds),
        None => preview(&mut ctrl, args.seconds),
    }
}

/// Render without writing anything and report how the song behaves.
fn preview(ctrl: &mut Controller, seconds: u32) {
    let frames = ctrl.render_frames(ctrl.frames_for_seconds(seconds));
    let peak = frames.iter().map(|f| f.peak()).max().unwrap_or(0);
    let ticks = ctrl.engine().master().tick_count;
    println!(
        "Rendered {:.1}s ({} ticks), peak {}, position {}",
        frames.len() as f32 / ctrl.sample_rate() as f32,
        ticks,
        peak,
        ctrl.engine().position()
    );
    if ctrl.engine_mut().take_song_end() {
        println!("Song wrapped at least once.");
    }
}

fn render_to_wav(ctrl: &mut Controller, path: &str, seconds: u32) {
    println!("Rendering to {} at {} Hz...", path, ctrl.sample_rate());

    let wav = ctrl.render_to_wav(seconds).unwrap_or_else(|e| {
        eprintln!("Failed to encode WAV: {}", e);
        std::process::exit(1);
    });
    fs::write(path, &wav).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {}", path, e);
        std::process::exit(1);
    });

    let frame_count = (wav.len().saturating_sub(44)) / 4;
    let duration = frame_count as f32 / ctrl.sample_rate() as f32;
    println!("Wrote {:.1}s ({} bytes)", duration, wav.len());
}
