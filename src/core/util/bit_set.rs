// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use core::util::Bits;

use error::Result;

/// Fixed size bit set backed by an array of longs.
#[derive(Clone, Debug, Default)]
pub struct FixedBitSet {
    pub bits: Vec<i64>,
    pub num_bits: usize,
    pub num_words: usize,
}

impl FixedBitSet {
    pub fn new(num_bits: usize) -> FixedBitSet {
        let num_words = bits2words(num_bits);
        let bits = vec![0; num_words];
        FixedBitSet {
            num_bits,
            bits,
            num_words,
        }
    }

    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.num_bits);
        let word_num = index >> 6;
        let mask = 1i64 << (index & 0x3fusize);
        self.bits[word_num] |= mask;
    }

    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.num_bits);
        let word = index >> 6;
        let mask = !(1i64 << (index & 0x3fusize));
        self.bits[word] &= mask;
    }

    /// Returns the number of bits that are set.
    pub fn cardinality(&self) -> usize {
        self.bits[..self.num_words]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }
}

impl Bits for FixedBitSet {
    #[inline]
    fn get(&self, index: usize) -> Result<bool> {
        debug_assert!(index < self.num_bits);
        let i = index >> 6;
        let mask = 1i64 << (index & 0x3fusize);
        Ok(self.bits[i] & mask != 0)
    }

    fn len(&self) -> usize {
        self.num_bits
    }
}

/// Returns the number of 64 bit words needed to hold `num_bits`.
pub fn bits2words(num_bits: usize) -> usize {
    if num_bits == 0 {
        0
    } else {
        ((num_bits - 1) >> 6) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut bits = FixedBitSet::new(130);
        assert_eq!(bits.num_words, 3);
        bits.set(0);
        bits.set(64);
        bits.set(129);
        assert!(bits.get(64).unwrap());
        assert!(!bits.get(65).unwrap());
        assert_eq!(bits.cardinality(), 3);
        bits.clear(64);
        assert!(!bits.get(64).unwrap());
        assert_eq!(bits.cardinality(), 2);
    }

    #[test]
    fn test_bits2words() {
        assert_eq!(bits2words(0), 0);
        assert_eq!(bits2words(1), 1);
        assert_eq!(bits2words(64), 1);
        assert_eq!(bits2words(65), 2);
    }
}
