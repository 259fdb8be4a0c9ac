//! The "MTRK" binary module image.
//!
//! Big-endian throughout. Patterns and macros are stored as one word pool
//! each plus a table of word offsets; a program runs from its offset to the
//! next larger offset, or to the end of the pool.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use mt_ir::{
    push_truncated, ArpeggioTable, Module, Program, SampleInfo, SfxEntry, SongEntry, TrackStep,
    MAX_CHANNELS, MIN_CHANNELS,
};

use crate::FormatError;

/// Image layout version written by [`save_module`].
pub const IMAGE_VERSION: u16 = 1;

const TITLE_LEN: usize = 40;
const SAMPLE_NAME_LEN: usize = 22;
const ARPEGGIO_LEN: usize = 16;

#[binrw]
#[brw(big, magic = b"MTRK")]
#[derive(Debug)]
struct Preamble {
    version: u16,
}

#[binrw]
#[brw(big, magic = b"MTRK")]
#[derive(Debug)]
struct RawImage {
    version: u16,
    channels: u8,
    reserved: u8,
    song_count: u16,
    step_count: u16,
    pattern_count: u16,
    macro_count: u16,
    sfx_count: u16,
    sample_count: u16,
    arpeggio_count: u16,
    pattern_words: u32,
    macro_words: u32,
    sample_bytes: u32,
    title: [u8; TITLE_LEN],

    #[br(count = song_count)]
    songs: Vec<RawSong>,
    #[br(count = step_count)]
    steps: Vec<[u16; MAX_CHANNELS]>,
    #[br(count = pattern_count)]
    pattern_offsets: Vec<u32>,
    #[br(count = pattern_words)]
    pattern_pool: Vec<u32>,
    #[br(count = macro_count)]
    macro_offsets: Vec<u32>,
    #[br(count = macro_words)]
    macro_pool: Vec<u32>,
    #[br(count = sfx_count)]
    sfx: Vec<RawSfx>,
    #[br(count = sample_count)]
    samples: Vec<RawSample>,
    #[br(count = arpeggio_count)]
    arpeggios: Vec<RawArpeggio>,
    #[br(count = sample_bytes)]
    sample_data: Vec<i8>,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawSong {
    first: u16,
    last: u16,
    tempo: u16,
    timer: u16,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawSfx {
    program: u8,
    note: u8,
    channel: u8,
    priority: u8,
    lock: u16,
    velocity: u8,
    detune: i8,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawSample {
    name: [u8; SAMPLE_NAME_LEN],
    start: u32,
    length: u16,
    loop_start: u16,
    loop_length: u16,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawArpeggio {
    len: u8,
    offsets: [i8; ARPEGGIO_LEN],
}

/// Parse a module image.
pub fn load_module(data: &[u8]) -> Result<Module, FormatError> {
    let mut cursor = Cursor::new(data);
    let preamble = Preamble::read(&mut cursor)?;
    if preamble.version != IMAGE_VERSION {
        return Err(FormatError::UnsupportedVersion(preamble.version));
    }
    cursor.set_position(0);
    let raw = RawImage::read(&mut cursor)?;

    let channels = raw.channels as usize;
    if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&channels) {
        return Err(FormatError::ChannelCount(raw.channels));
    }
    if raw.songs.is_empty() {
        return Err(FormatError::NoSongs);
    }

    let mut module = Module::new("", raw.channels);
    push_truncated(&mut module.title, &parse_string(&raw.title));
    module.songs = raw
        .songs
        .iter()
        .map(|s| SongEntry {
            first_step: s.first,
            last_step: s.last,
            tempo: s.tempo,
            timer: s.timer,
        })
        .collect();
    module.track_steps = raw.steps.iter().map(|w| TrackStep::from_words(*w)).collect();
    module.patterns = relocate(&raw.pattern_offsets, &raw.pattern_pool);
    module.macros = relocate(&raw.macro_offsets, &raw.macro_pool);
    module.sfx = raw
        .sfx
        .iter()
        .map(|s| SfxEntry {
            program: s.program,
            note: s.note,
            channel: s.channel,
            priority: s.priority,
            lock_ticks: s.lock,
            velocity: s.velocity,
            detune: s.detune,
        })
        .collect();
    module.samples = raw
        .samples
        .iter()
        .map(|s| {
            let mut info = SampleInfo {
                start: s.start,
                length: s.length,
                loop_start: s.loop_start,
                loop_length: s.loop_length,
                ..Default::default()
            };
            push_truncated(&mut info.name, &parse_string(&s.name));
            info
        })
        .collect();
    module.arpeggios = raw
        .arpeggios
        .iter()
        .map(|a| ArpeggioTable::new(&a.offsets[..(a.len as usize).min(ARPEGGIO_LEN)]))
        .collect();
    module.sample_data = raw.sample_data;

    tracing::debug!(
        title = module.title.as_str(),
        channels,
        songs = module.songs.len(),
        steps = module.track_steps.len(),
        patterns = module.patterns.len(),
        macros = module.macros.len(),
        samples = module.samples.len(),
        sample_bytes = module.sample_data.len(),
        "module loaded"
    );
    Ok(module)
}

/// Serialize a module into an image that [`load_module`] reads back.
pub fn save_module(module: &Module) -> Result<Vec<u8>, FormatError> {
    let (pattern_offsets, pattern_pool) = pack(&module.patterns)?;
    let (macro_offsets, macro_pool) = pack(&module.macros)?;

    let mut title = [0u8; TITLE_LEN];
    copy_str(&mut title, &module.title);

    let raw = RawImage {
        version: IMAGE_VERSION,
        channels: module.channels,
        reserved: 0,
        song_count: count("songs", module.songs.len())?,
        step_count: count("track steps", module.track_steps.len())?,
        pattern_count: count("patterns", module.patterns.len())?,
        macro_count: count("macros", module.macros.len())?,
        sfx_count: count("sfx", module.sfx.len())?,
        sample_count: count("samples", module.samples.len())?,
        arpeggio_count: count("arpeggios", module.arpeggios.len())?,
        pattern_words: pattern_pool.len() as u32,
        macro_words: macro_pool.len() as u32,
        sample_bytes: u32::try_from(module.sample_data.len()).map_err(|_| {
            FormatError::TableTooLarge {
                table: "sample data",
                len: module.sample_data.len(),
            }
        })?,
        title,
        songs: module
            .songs
            .iter()
            .map(|s| RawSong {
                first: s.first_step,
                last: s.last_step,
                tempo: s.tempo,
                timer: s.timer,
            })
            .collect(),
        steps: module.track_steps.iter().map(TrackStep::to_words).collect(),
        pattern_offsets,
        pattern_pool,
        macro_offsets,
        macro_pool,
        sfx: module
            .sfx
            .iter()
            .map(|s| RawSfx {
                program: s.program,
                note: s.note,
                channel: s.channel,
                priority: s.priority,
                lock: s.lock_ticks,
                velocity: s.velocity,
                detune: s.detune,
            })
            .collect(),
        samples: module
            .samples
            .iter()
            .map(|s| {
                let mut name = [0u8; SAMPLE_NAME_LEN];
                copy_str(&mut name, &s.name);
                RawSample {
                    name,
                    start: s.start,
                    length: s.length,
                    loop_start: s.loop_start,
                    loop_length: s.loop_length,
                }
            })
            .collect(),
        arpeggios: module
            .arpeggios
            .iter()
            .map(|a| {
                let mut offsets = [0i8; ARPEGGIO_LEN];
                offsets[..a.offsets.len()].copy_from_slice(&a.offsets);
                RawArpeggio {
                    len: a.offsets.len() as u8,
                    offsets,
                }
            })
            .collect(),
        sample_data: module.sample_data.clone(),
    };

    let mut out = Cursor::new(Vec::new());
    raw.write(&mut out)?;
    Ok(out.into_inner())
}

fn count(table: &'static str, len: usize) -> Result<u16, FormatError> {
    u16::try_from(len).map_err(|_| FormatError::TableTooLarge { table, len })
}

/// Split a word pool into programs at the given offsets.
fn relocate(offsets: &[u32], pool: &[u32]) -> Vec<Program> {
    let end = pool.len() as u32;
    offsets
        .iter()
        .map(|&offset| {
            let start = offset.min(end);
            let stop = offsets
                .iter()
                .copied()
                .filter(|&o| o > start)
                .min()
                .unwrap_or(end)
                .min(end);
            Program::new(pool[start as usize..stop as usize].to_vec())
        })
        .collect()
}

/// Concatenate programs into one pool plus their offsets.
fn pack(programs: &[Program]) -> Result<(Vec<u32>, Vec<u32>), FormatError> {
    let mut offsets = Vec::with_capacity(programs.len());
    let mut pool = Vec::new();
    for program in programs {
        let offset = u32::try_from(pool.len()).map_err(|_| FormatError::TableTooLarge {
            table: "program pool",
            len: pool.len(),
        })?;
        offsets.push(offset);
        pool.extend_from_slice(program.words());
    }
    Ok((offsets, pool))
}

/// Parse a null-terminated string from bytes.
fn parse_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

fn copy_str(dst: &mut [u8], src: &str) {
    let len = src.len().min(dst.len());
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
}
