//! Distance kernels for the two descriptor families

use dmatch_core::Distance;
use std::fmt::Debug;

/// A distance function over descriptor rows of one element type.
pub trait Metric: Send + Sync + 'static {
    type Elem: Copy + Send + Sync;
    type Dist: Copy + PartialOrd + Debug + Send + Sync;

    fn distance(a: &[Self::Elem], b: &[Self::Elem]) -> Self::Dist;

    fn wrap(d: Self::Dist) -> Distance;

    /// `best / second` as used by the nearest-neighbour distance ratio test
    fn ratio(best: Self::Dist, second: Self::Dist) -> f32;
}

/// Hamming distance over bit-packed bytes
#[derive(Debug, Clone, Copy)]
pub struct Hamming;

/// Euclidean (L2) distance over floats
#[derive(Debug, Clone, Copy)]
pub struct Euclidean;

impl Metric for Hamming {
    type Elem = u8;
    type Dist = u32;

    #[inline]
    fn distance(a: &[u8], b: &[u8]) -> u32 {
        hamming_distance(a, b)
    }

    fn wrap(d: u32) -> Distance {
        Distance::Hamming(d)
    }

    fn ratio(best: u32, second: u32) -> f32 {
        best as f32 / second as f32
    }
}

impl Metric for Euclidean {
    type Elem = f32;
    type Dist = f32;

    #[inline]
    fn distance(a: &[f32], b: &[f32]) -> f32 {
        l2_distance(a, b)
    }

    fn wrap(d: f32) -> Distance {
        Distance::Euclidean(d)
    }

    fn ratio(best: f32, second: f32) -> f32 {
        best / second
    }
}

/// Number of differing bits, eight bytes at a time with a byte-wise tail.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    let mut a_words = a.chunks_exact(8);
    let mut b_words = b.chunks_exact(8);
    let mut distance = 0;

    for (wa, wb) in (&mut a_words).zip(&mut b_words) {
        let x = u64::from_ne_bytes(wa.try_into().unwrap_or([0; 8]));
        let y = u64::from_ne_bytes(wb.try_into().unwrap_or([0; 8]));
        distance += (x ^ y).count_ones();
    }
    for (x, y) in a_words.remainder().iter().zip(b_words.remainder()) {
        distance += (x ^ y).count_ones();
    }
    distance
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_hamming(a: &[u8], b: &[u8]) -> u32 {
        a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
    }

    #[test]
    fn test_hamming_simple() {
        assert_eq!(hamming_distance(&[0b1010_1010], &[0b0101_0101]), 8);
        assert_eq!(hamming_distance(&[0xFF, 0x00], &[0xFF, 0x00]), 0);
        assert_eq!(hamming_distance(&[0b0000_0111], &[0b0000_0001]), 2);
    }

    #[test]
    fn test_hamming_word_path_matches_bytewise() {
        // 32-byte (ORB) and 64-byte (BRISK) rows plus an odd length hitting the tail
        for len in [32usize, 64, 13] {
            let a: Vec<u8> = (0..len).map(|i| (i * 37 % 251) as u8).collect();
            let b: Vec<u8> = (0..len).map(|i| (i * 91 % 241) as u8).collect();
            assert_eq!(hamming_distance(&a, &b), naive_hamming(&a, &b), "len={}", len);
        }
    }

    #[test]
    fn test_l2_distance() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(l2_distance(&[1.5, -2.0, 7.0], &[1.5, -2.0, 7.0]), 0.0);
    }

    #[test]
    fn test_ratio() {
        assert!(Hamming::ratio(4, 6) < 0.8);
        assert!(Hamming::ratio(5, 6) >= 0.8);
        // 0/0 never passes a `<` comparison
        assert!(!(Hamming::ratio(0, 0) < 0.8));
        assert!(Euclidean::ratio(1.0, 2.0) < 0.8);
    }
}
