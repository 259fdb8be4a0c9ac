//! Fixed-width bytecode programs shared by patterns and macros.

use alloc::vec::Vec;

use crate::macro_op::MacroOp;
use crate::pattern_op::PatternOp;

/// One 32-bit instruction: an opcode byte followed by three payload bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Instruction(pub [u8; 4]);

impl Instruction {
    pub const fn from_word(word: u32) -> Self {
        Self(word.to_be_bytes())
    }

    pub const fn from_parts(opcode: u8, b1: u8, b2: u8, b3: u8) -> Self {
        Self([opcode, b1, b2, b3])
    }

    /// Opcode byte with a 24-bit payload.
    pub const fn with_addr(opcode: u8, addr: u32) -> Self {
        let a = addr.to_be_bytes();
        Self([opcode, a[1], a[2], a[3]])
    }

    /// Opcode byte, one payload byte and a 16-bit payload.
    pub const fn with_hi(opcode: u8, b1: u8, hi: u16) -> Self {
        let h = hi.to_be_bytes();
        Self([opcode, b1, h[0], h[1]])
    }

    pub const fn word(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub const fn opcode(self) -> u8 {
        self.0[0]
    }

    pub const fn b1(self) -> u8 {
        self.0[1]
    }

    pub const fn b2(self) -> u8 {
        self.0[2]
    }

    pub const fn b3(self) -> u8 {
        self.0[3]
    }

    /// Bytes 2-3 as an unsigned big-endian value.
    pub const fn hi(self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }

    /// Bytes 2-3 as a signed big-endian value.
    pub const fn hi_signed(self) -> i16 {
        i16::from_be_bytes([self.0[2], self.0[3]])
    }

    /// Bytes 1-3 as a 24-bit address.
    pub const fn addr(self) -> u32 {
        self.word() & 0x00FF_FFFF
    }
}

/// A relocated bytecode program (one pattern or one macro).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    words: Vec<u32>,
}

impl Program {
    pub fn new(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Assemble a macro program.
    pub fn from_macro_ops(ops: &[MacroOp]) -> Self {
        Self::new(ops.iter().map(|op| op.encode().word()).collect())
    }

    /// Assemble a pattern program.
    pub fn from_pattern_ops(ops: &[PatternOp]) -> Self {
        Self::new(ops.iter().map(|op| op.encode().word()).collect())
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Instruction at `step`, or `None` past the end of the program.
    pub fn fetch(&self, step: u16) -> Option<Instruction> {
        self.words
            .get(step as usize)
            .map(|&w| Instruction::from_word(w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accessors() {
        let ins = Instruction::from_word(0x0512_FFFE);
        assert_eq!(ins.opcode(), 0x05);
        assert_eq!(ins.b1(), 0x12);
        assert_eq!(ins.hi(), 0xFFFE);
        assert_eq!(ins.hi_signed(), -2);
        assert_eq!(ins.addr(), 0x12_FFFE);
    }

    #[test]
    fn builders_match_word_layout() {
        assert_eq!(Instruction::with_addr(0x02, 0x0001_2345).word(), 0x0201_2345);
        assert_eq!(Instruction::with_hi(0x05, 3, 0x0010).word(), 0x0503_0010);
        assert_eq!(Instruction::from_parts(1, 2, 3, 4).word(), 0x0102_0304);
    }

    #[test]
    fn fetch_past_end_is_none() {
        let p = Program::new(alloc::vec![0x0700_0000]);
        assert!(p.fetch(0).is_some());
        assert!(p.fetch(1).is_none());
        assert!(Program::default().fetch(0).is_none());
    }
}
