//! Dynamic truth tables packed into 64-bit blocks.
//!
//! A [`TruthTable`] stores the output column of a Boolean function of up to
//! [`TruthTable::MAX_VARS`] variables, one bit per input assignment, packed
//! into `u64` blocks. Bit `b` of the table is the function value on the
//! assignment whose `i`-th variable equals bit `i` of `b`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Per-variable bit patterns within a single 64-bit block.
const VAR_MASKS: [u64; 6] = [
    0xAAAA_AAAA_AAAA_AAAA,
    0xCCCC_CCCC_CCCC_CCCC,
    0xF0F0_F0F0_F0F0_F0F0,
    0xFF00_FF00_FF00_FF00,
    0xFFFF_0000_FFFF_0000,
    0xFFFF_FFFF_0000_0000,
];

/// The output column of a Boolean function, one bit per input assignment.
///
/// Unused high bits of the last block are always kept zero, so equality and
/// hashing can operate directly on the block vector.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthTable {
    n_vars: usize,
    blocks: Vec<u64>,
}

impl TruthTable {
    /// Maximum supported number of variables.
    pub const MAX_VARS: usize = 16;

    /// Creates the constant-zero function of `n_vars` variables.
    pub fn zeros(n_vars: usize) -> Self {
        assert!(n_vars <= Self::MAX_VARS, "too many variables: {n_vars}");
        Self {
            n_vars,
            blocks: vec![0; block_count(n_vars)],
        }
    }

    /// Creates the constant-one function of `n_vars` variables.
    pub fn ones(n_vars: usize) -> Self {
        let mut tt = Self::zeros(n_vars);
        for b in &mut tt.blocks {
            *b = u64::MAX;
        }
        tt.mask();
        tt
    }

    /// Creates the projection function of variable `i` over `n_vars` variables.
    pub fn var(i: usize, n_vars: usize) -> Self {
        assert!(i < n_vars, "variable {i} out of range for {n_vars} vars");
        let mut tt = Self::zeros(n_vars);
        if i < 6 {
            for b in &mut tt.blocks {
                *b = VAR_MASKS[i];
            }
        } else {
            for (j, b) in tt.blocks.iter_mut().enumerate() {
                if (j >> (i - 6)) & 1 == 1 {
                    *b = u64::MAX;
                }
            }
        }
        tt.mask();
        tt
    }

    /// Creates a table of `n_vars` variables from the low bits of `bits`.
    ///
    /// Only meaningful for `n_vars <= 6`.
    pub fn from_u64(bits: u64, n_vars: usize) -> Self {
        assert!(n_vars <= 6);
        let mut tt = Self::zeros(n_vars);
        tt.blocks[0] = bits;
        tt.mask();
        tt
    }

    /// Returns the table as a `u64` (for `n_vars <= 6`).
    pub fn as_u64(&self) -> u64 {
        assert!(self.n_vars <= 6);
        self.blocks[0]
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.n_vars
    }

    /// Number of bits in the output column (`2^n_vars`).
    pub fn num_bits(&self) -> usize {
        1usize << self.n_vars
    }

    /// Returns the function value on assignment `b`.
    pub fn get_bit(&self, b: usize) -> bool {
        assert!(b < self.num_bits());
        (self.blocks[b >> 6] >> (b & 63)) & 1 == 1
    }

    /// Sets the function value on assignment `b`.
    pub fn set_bit(&mut self, b: usize, value: bool) {
        assert!(b < self.num_bits());
        let mask = 1u64 << (b & 63);
        if value {
            self.blocks[b >> 6] |= mask;
        } else {
            self.blocks[b >> 6] &= !mask;
        }
    }

    /// Returns `true` if the function is constant zero.
    pub fn is_zero(&self) -> bool {
        self.blocks.iter().all(|&b| b == 0)
    }

    /// Bitwise complement.
    pub fn not(&self) -> Self {
        let mut tt = self.clone();
        for b in &mut tt.blocks {
            *b = !*b;
        }
        tt.mask();
        tt
    }

    /// Bitwise conjunction. Both tables must have the same variable count.
    pub fn and(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a & b)
    }

    /// Bitwise disjunction. Both tables must have the same variable count.
    pub fn or(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a | b)
    }

    /// Bitwise exclusive or. Both tables must have the same variable count.
    pub fn xor(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a ^ b)
    }

    fn zip(&self, other: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        assert_eq!(self.n_vars, other.n_vars, "variable counts differ");
        let blocks = self
            .blocks
            .iter()
            .zip(&other.blocks)
            .map(|(&a, &b)| f(a, b))
            .collect();
        let mut tt = Self {
            n_vars: self.n_vars,
            blocks,
        };
        tt.mask();
        tt
    }

    /// Clears the unused high bits of the last block.
    fn mask(&mut self) {
        if self.n_vars < 6 {
            self.blocks[0] &= (1u64 << (1 << self.n_vars)) - 1;
        }
    }
}

fn block_count(n_vars: usize) -> usize {
    if n_vars < 6 {
        1
    } else {
        1 << (n_vars - 6)
    }
}

impl Hash for TruthTable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut bytes = Vec::with_capacity(self.blocks.len() * 8 + 8);
        bytes.extend_from_slice(&(self.n_vars as u64).to_le_bytes());
        for b in &self.blocks {
            bytes.extend_from_slice(&b.to_le_bytes());
        }
        state.write_u64(xxhash_rust::xxh3::xxh3_64(&bytes));
    }
}

impl fmt::Debug for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TruthTable({}v:", self.n_vars)?;
        for b in self.blocks.iter().rev() {
            write!(f, "{b:016x}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn constants() {
        assert!(TruthTable::zeros(3).is_zero());
        assert_eq!(TruthTable::ones(3).as_u64(), 0xFF);
        assert_eq!(TruthTable::ones(6).as_u64(), u64::MAX);
    }

    #[test]
    fn projections() {
        assert_eq!(TruthTable::var(0, 2).as_u64(), 0b1010);
        assert_eq!(TruthTable::var(1, 2).as_u64(), 0b1100);
        let x7 = TruthTable::var(7, 8);
        assert!(!x7.get_bit(0));
        assert!(x7.get_bit(1 << 7));
    }

    #[test]
    fn and2_table() {
        let a = TruthTable::var(0, 2);
        let b = TruthTable::var(1, 2);
        assert_eq!(a.and(&b).as_u64(), 0b1000);
        assert_eq!(a.or(&b).as_u64(), 0b1110);
        assert_eq!(a.xor(&b).as_u64(), 0b0110);
    }

    #[test]
    fn complement_keeps_mask() {
        let a = TruthTable::var(0, 2);
        assert_eq!(a.not().as_u64(), 0b0101);
    }

    #[test]
    fn bit_access() {
        let mut tt = TruthTable::zeros(7);
        tt.set_bit(100, true);
        assert!(tt.get_bit(100));
        assert!(!tt.get_bit(99));
        tt.set_bit(100, false);
        assert!(tt.is_zero());
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(TruthTable::from_u64(0b1000, 2), "and");
        map.insert(TruthTable::from_u64(0b0111, 2), "nand");
        assert_eq!(map.get(&TruthTable::from_u64(0b1000, 2)), Some(&"and"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn multi_block_ops() {
        let a = TruthTable::var(6, 7);
        let b = TruthTable::var(0, 7);
        let both = a.and(&b);
        assert!(both.get_bit((1 << 6) | 1));
        assert!(!both.get_bit(1 << 6));
    }

    #[test]
    fn serde_roundtrip() {
        let tt = TruthTable::from_u64(0b0110, 2);
        let json = serde_json::to_string(&tt).unwrap();
        let restored: TruthTable = serde_json::from_str(&json).unwrap();
        assert_eq!(tt, restored);
    }
}
