//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Build a frame from wide accumulators, clamping each side.
    pub fn from_wide(left: i32, right: i32) -> Self {
        Self {
            left: left.clamp(-32768, 32767) as i16,
            right: right.clamp(-32768, 32767) as i16,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0 && self.right == 0
    }

    /// Peak absolute amplitude across both sides.
    pub fn peak(&self) -> u16 {
        self.left.unsigned_abs().max(self.right.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_values_clamp() {
        let f = Frame::from_wide(40_000, -40_000);
        assert_eq!(f, Frame { left: 32767, right: -32768 });
        assert_eq!(f.peak(), 32768);
        assert!(Frame::silence().is_silent());
    }
}
