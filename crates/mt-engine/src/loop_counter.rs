//! Loop counters and single-level return slots.

/// A loop counter shared by every looping opcode.
///
/// The first hit seeds the counter with `count - 1` and jumps; each later
/// hit decrements and jumps; a hit at zero clears the counter and falls
/// through. A count of zero loops forever.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopCounter(Option<u16>);

impl LoopCounter {
    pub const fn unset() -> Self {
        Self(None)
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_none()
    }

    pub fn remaining(&self) -> Option<u16> {
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = None;
    }

    /// Register a hit; returns `true` when the loop should jump.
    pub fn hit(&mut self, count: u16) -> bool {
        match self.0 {
            Some(0) => {
                self.0 = None;
                false
            }
            Some(n) => {
                self.0 = Some(n - 1);
                true
            }
            None if count == 0 => true,
            None => {
                self.0 = Some(count - 1);
                true
            }
        }
    }
}

/// A saved `{program, step}` pair. Calls overwrite it rather than nest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReturnPoint {
    pub program: u8,
    pub step: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jumps_until_skip(count: u16) -> u32 {
        let mut counter = LoopCounter::unset();
        let mut jumps = 0;
        while counter.hit(count) {
            jumps += 1;
        }
        jumps
    }

    #[test]
    fn exactly_k_jumps_before_skip() {
        for k in 1..=300u16 {
            assert_eq!(jumps_until_skip(k), k as u32);
        }
    }

    #[test]
    fn counter_clears_after_fall_through() {
        let mut counter = LoopCounter::unset();
        assert!(counter.hit(2));
        assert_eq!(counter.remaining(), Some(1));
        assert!(counter.hit(2));
        assert_eq!(counter.remaining(), Some(0));
        assert!(!counter.hit(2));
        assert!(counter.is_unset());
        // A fresh pass loops again.
        assert!(counter.hit(2));
    }

    #[test]
    fn counter_is_strictly_decreasing() {
        let mut counter = LoopCounter::unset();
        let mut last = u16::MAX;
        while counter.hit(50) {
            let now = counter.remaining().unwrap();
            assert!(now < last);
            last = now;
        }
    }

    #[test]
    fn zero_count_loops_forever() {
        let mut counter = LoopCounter::unset();
        for _ in 0..1000 {
            assert!(counter.hit(0));
        }
        assert!(counter.is_unset());
    }
}
