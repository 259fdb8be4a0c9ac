//! Analog filter-sweep emulation rendered into a per-channel buffer.
//!
//! A one-pole low-pass `y += ((x - y) * k) >> 8` runs over the average of
//! two taps read at independently sweeping phases of a source region. One
//! block is produced per tick; the channel plays the buffer it is written to.

use mt_ir::FILTER_BUFFER_LEN;

const K_MIN: i32 = 1 << 8;
const K_MAX: i32 = 255 << 8;
const DEFAULT_K: u8 = 0x80;

/// Filter-sim configuration and recurrence state for one channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSim {
    pub enabled: bool,
    /// Byte offset of the source region in module memory
    pub source: u32,
    /// Block length in bytes
    pub length: u16,
    pub phase_a: u16,
    pub speed_a: i16,
    pub phase_b: u16,
    pub speed_b: i16,
    /// Time constant in 8.8 fixed point
    pub coefficient: i32,
    /// Per-tick change of `coefficient`, bouncing at the range limits
    pub sweep: i16,
    /// Recurrence output
    pub state: i32,
}

impl FilterSim {
    /// Enable the filter reading from `source`.
    pub fn set_source(&mut self, source: u32) {
        self.enabled = true;
        self.source = source;
        self.phase_a = 0;
        self.phase_b = 0;
        self.state = 0;
        if self.length == 0 {
            self.length = FILTER_BUFFER_LEN as u16;
        }
        if self.coefficient == 0 {
            self.coefficient = (DEFAULT_K as i32) << 8;
        }
    }

    pub fn set_cutoff(&mut self, coefficient: u8, sweep: i16) {
        self.coefficient = (coefficient.max(1) as i32) << 8;
        self.sweep = sweep;
    }

    pub fn stop(&mut self) {
        self.enabled = false;
    }

    /// Current time constant (1-255).
    pub fn k(&self) -> i32 {
        (self.coefficient >> 8).clamp(1, 255)
    }

    /// Bytes produced per block, even and within the output buffer.
    pub fn block_len(&self) -> usize {
        (self.length as usize).clamp(2, FILTER_BUFFER_LEN) & !1
    }

    /// Run one block of the recurrence from `memory` into `out`.
    pub fn render(&mut self, memory: &[i8], out: &mut [i8; FILTER_BUFFER_LEN]) {
        let len = self.block_len();
        let start = (self.source as usize).min(memory.len());
        let src = &memory[start..];
        let src = &src[..src.len().min(len)];
        if src.is_empty() {
            out[..len].fill(0);
            return;
        }

        let k = self.k();
        let (pa, pb) = (self.phase_a as usize, self.phase_b as usize);
        for (i, o) in out[..len].iter_mut().enumerate() {
            let a = src[(pa + i) % src.len()] as i32;
            let b = src[(pb + i) % src.len()] as i32;
            let x = (a + b) / 2;
            self.state += ((x - self.state) * k) >> 8;
            *o = self.state.clamp(-128, 127) as i8;
        }

        let wrap = src.len() as i32;
        self.phase_a = (self.phase_a as i32 + self.speed_a as i32).rem_euclid(wrap) as u16;
        self.phase_b = (self.phase_b as i32 + self.speed_b as i32).rem_euclid(wrap) as u16;
        self.sweep_coefficient();
    }

    fn sweep_coefficient(&mut self) {
        self.coefficient += self.sweep as i32;
        if self.coefficient > K_MAX {
            self.coefficient = K_MAX;
            self.sweep = -self.sweep;
        } else if self.coefficient < K_MIN {
            self.coefficient = K_MIN;
            self.sweep = -self.sweep;
        }
    }
}
