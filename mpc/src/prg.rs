//! AES-128-CTR pseudorandom generator driving the DPF tree.
//!
//! A 256-bit seed is split into an AES key (words 0..3) and an IV (words
//! 4..6 plus a counter word). Left-child, right-child, control-bit and leaf
//! streams are separated by XORing a domain constant into the first IV word,
//! so one seed yields four independent keystreams.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;
use ctr::Ctr128BE;
use rand::Rng;
use serde::{Deserialize, Serialize};

type Aes128Ctr = Ctr128BE<Aes128>;

/// Domain constant for left child seeds.
pub const DOMAIN_SL: u32 = 0xC001_5E5A;
/// Domain constant for right child seeds.
pub const DOMAIN_SR: u32 = 0xC001_5255;
/// Domain constant for child control bits.
pub const DOMAIN_T: u32 = 0xC001_7455;
/// Domain constant for leaf outputs.
pub const DOMAIN_OUT: u32 = 0x0BAD_F00D;

/// 256-bit PRG seed as eight 32-bit words.
///
/// The low two bits of word 0 are protocol-reserved: they are cleared
/// before every expansion and on every child seed, keeping them free to
/// carry control bits elsewhere in the key material.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed256(pub [u32; 8]);

impl Seed256 {
    /// Sample a fresh seed from the given generator.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut words = [0u32; 8];
        for word in &mut words {
            *word = rng.gen();
        }
        Seed256(words)
    }

    /// XOR another seed into this one, word by word.
    pub fn xor_assign(&mut self, other: &Seed256) {
        for (word, rhs) in self.0.iter_mut().zip(&other.0) {
            *word ^= rhs;
        }
    }

    /// XOR of two seeds.
    pub fn xor(&self, other: &Seed256) -> Seed256 {
        let mut out = *self;
        out.xor_assign(other);
        out
    }

    /// Low bit of word 0, used as the initial control bit of a key pair.
    pub fn low_bit(&self) -> u8 {
        (self.0[0] & 1) as u8
    }

    /// Clear the two protocol-reserved bits.
    pub fn clear_reserved_bits(&mut self) {
        self.0[0] &= !0x3;
    }
}

/// Fill `out` with keystream words from the seed under the given domain.
///
/// The AES key is the low half of the seed; the IV mixes the domain
/// constant into word 4 and places `counter_start` in the final word, with
/// every word laid out little-endian.
pub fn keystream_words(seed: &Seed256, domain: u32, counter_start: u32, out: &mut [u32]) {
    let mut key = [0u8; 16];
    for (chunk, word) in key.chunks_exact_mut(4).zip(&seed.0[..4]) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }

    let iv_words = [seed.0[4] ^ domain, seed.0[5], seed.0[6], counter_start];
    let mut iv = [0u8; 16];
    for (chunk, word) in iv.chunks_exact_mut(4).zip(&iv_words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }

    let mut cipher = Aes128Ctr::new(&GenericArray::from(key), &GenericArray::from(iv));
    let mut buf = vec![0u8; out.len() * 4];
    cipher.apply_keystream(&mut buf);

    for (word, chunk) in out.iter_mut().zip(buf.chunks_exact(4)) {
        *word = u32::from_le_bytes(chunk.try_into().unwrap());
    }
}

/// Expand a seed into `(left seed, left bit, right seed, right bit)`.
///
/// The reserved bits of the input are cleared before keying AES, and the
/// reserved bits of both children are cleared on the way out.
pub fn expand(seed: &Seed256) -> (Seed256, u8, Seed256, u8) {
    let mut seed = *seed;
    seed.clear_reserved_bits();

    let mut left = Seed256::default();
    let mut right = Seed256::default();
    let mut bits = [0u32; 2];
    keystream_words(&seed, DOMAIN_SL, 0, &mut left.0);
    keystream_words(&seed, DOMAIN_SR, 0, &mut right.0);
    keystream_words(&seed, DOMAIN_T, 0, &mut bits);

    left.clear_reserved_bits();
    right.clear_reserved_bits();
    (left, (bits[0] & 1) as u8, right, (bits[1] & 1) as u8)
}

/// Stretch a leaf seed into the 64-bit output contribution.
pub fn leaf(seed: &Seed256) -> u64 {
    let mut words = [0u32; 2];
    keystream_words(seed, DOMAIN_OUT, 0, &mut words);
    words[0] as u64 | (words[1] as u64) << 32
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn expansion_is_deterministic() {
        let mut rng = SmallRng::from_seed([3; 32]);
        let seed = Seed256::random(&mut rng);
        assert_eq!(expand(&seed), expand(&seed));
        assert_eq!(leaf(&seed), leaf(&seed));
    }

    #[test]
    fn keystreams_depend_on_domain_and_counter() {
        let mut rng = SmallRng::from_seed([2; 32]);
        let seed = Seed256::random(&mut rng);

        let mut first = [0u32; 12];
        let mut second = [0u32; 12];
        keystream_words(&seed, DOMAIN_SL, 3, &mut first);
        keystream_words(&seed, DOMAIN_SL, 3, &mut second);
        assert_eq!(first, second);

        keystream_words(&seed, DOMAIN_SR, 3, &mut second);
        assert_ne!(first, second);
        keystream_words(&seed, DOMAIN_SL, 4, &mut second);
        assert_ne!(first, second);
    }

    #[test]
    fn reserved_bits_do_not_change_expansion() {
        let mut rng = SmallRng::from_seed([4; 32]);
        let seed = Seed256::random(&mut rng);
        let mut flipped = seed;
        flipped.0[0] ^= 0x3;
        assert_eq!(expand(&seed), expand(&flipped));
    }

    #[test]
    fn children_are_separated_and_normalized() {
        let mut rng = SmallRng::from_seed([5; 32]);
        let seed = Seed256::random(&mut rng);
        let (left, _, right, _) = expand(&seed);
        assert_ne!(left, right);
        assert_eq!(left.0[0] & 0x3, 0);
        assert_eq!(right.0[0] & 0x3, 0);
    }

    #[test]
    fn leaf_differs_between_seeds() {
        let mut rng = SmallRng::from_seed([6; 32]);
        let a = Seed256::random(&mut rng);
        let b = Seed256::random(&mut rng);
        assert_ne!(leaf(&a), leaf(&b));
    }
}
