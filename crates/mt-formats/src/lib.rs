//! Module image loader for macrotracker.
//!
//! Reads and writes the "MTRK" binary image and relocates its program pools
//! into a [`mt_ir::Module`].

mod image;

pub use image::{load_module, save_module, IMAGE_VERSION};

/// Error type for module image parsing and writing.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// Bad magic bytes, truncated data or a malformed table
    #[error("parse error: {0}")]
    Parse(#[from] binrw::Error),

    /// Image layout version this loader does not know
    #[error("unsupported image version {0}")]
    UnsupportedVersion(u16),

    /// Channel count outside 4..=8
    #[error("unsupported channel count {0}")]
    ChannelCount(u8),

    /// The song directory is empty
    #[error("module has no songs")]
    NoSongs,

    /// A table has more entries than the image can index
    #[error("{table} table too large ({len} entries)")]
    TableTooLarge { table: &'static str, len: usize },
}
