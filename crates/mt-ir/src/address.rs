//! Addresses as seen by a channel's start register.
//!
//! Module sample memory occupies `0..len`. Engine-owned buffers live in a
//! reserved region starting at [`RESERVED_BASE`], so a sink can resolve any
//! register value without knowing who owns the bytes.

/// Start of the engine-reserved address region.
pub const RESERVED_BASE: u32 = 0xFF00_0000;

/// Size in bytes of one channel's filter-sim output buffer.
pub const FILTER_BUFFER_LEN: usize = 256;

const FILTER_BASE: u32 = RESERVED_BASE + 0x0001_0000;

/// A byte address in the replay engine's memory space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u32);

/// Where an [`Address`] points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// Offset into the module's sample data.
    Module(u32),
    /// The single-word silence buffer.
    Silence,
    /// A channel's filter-sim output buffer.
    FilterBuffer { channel: usize, offset: usize },
    /// Reserved space with nothing behind it.
    Unmapped,
}

impl Address {
    /// The fixed single-word silence buffer, the "no instrument" default.
    pub const SILENCE: Address = Address(RESERVED_BASE);

    /// Address of the filter-sim output buffer owned by `channel`.
    pub const fn filter_buffer(channel: usize) -> Address {
        Address(FILTER_BASE + (channel * FILTER_BUFFER_LEN) as u32)
    }

    /// Offset the address by a signed byte delta, wrapping.
    pub const fn offset(self, delta: i32) -> Address {
        Address(self.0.wrapping_add_signed(delta))
    }

    pub fn region(self) -> Region {
        if self.0 < RESERVED_BASE {
            return Region::Module(self.0);
        }
        if self.0 < FILTER_BASE {
            return if self.0 - RESERVED_BASE < 2 {
                Region::Silence
            } else {
                Region::Unmapped
            };
        }
        let rel = (self.0 - FILTER_BASE) as usize;
        Region::FilterBuffer {
            channel: rel / FILTER_BUFFER_LEN,
            offset: rel % FILTER_BUFFER_LEN,
        }
    }
}
