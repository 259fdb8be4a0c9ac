//! Read-only view of everything a channel start register can point at.

use mt_ir::{Address, Region, FILTER_BUFFER_LEN, MAX_CHANNELS};

static SILENCE_WORD: [i8; 2] = [0, 0];

/// Module sample data plus the engine's reserved buffers.
#[derive(Clone, Copy)]
pub struct Memory<'a> {
    pub(crate) samples: &'a [i8],
    pub(crate) filters: &'a [[i8; FILTER_BUFFER_LEN]; MAX_CHANNELS],
}

impl<'a> Memory<'a> {
    pub fn new(
        samples: &'a [i8],
        filters: &'a [[i8; FILTER_BUFFER_LEN]; MAX_CHANNELS],
    ) -> Self {
        Self { samples, filters }
    }

    /// Up to `len` bytes starting at `start`, clamped to the backing region.
    pub fn slice(&self, start: Address, len: usize) -> &'a [i8] {
        let (region, offset): (&'a [i8], usize) = match start.region() {
            Region::Module(off) => (self.samples, off as usize),
            Region::Silence => (&SILENCE_WORD[..], 0),
            Region::FilterBuffer { channel, offset } if channel < MAX_CHANNELS => {
                (&self.filters[channel][..], offset)
            }
            Region::FilterBuffer { .. } | Region::Unmapped => (&[][..], 0),
        };
        let begin = offset.min(region.len());
        let end = begin.saturating_add(len).min(region.len());
        &region[begin..end]
    }
}
