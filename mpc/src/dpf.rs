//! Tree-based distributed point function.
//!
//! A key pair hides one location in a power-of-two domain: the two keys
//! expand to identical PRG trees except along the path to the location,
//! where per-level correction words keep exactly one party "inside" the
//! programmed path. XORing the two parties' leaf outputs yields `value` at
//! the hidden location and zero everywhere else.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::prg::{self, Seed256};

/// Failure of a DPF operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DpfError {
    /// Domain size is not a power of two.
    InvalidDomain(u64),
    /// Index lies outside the key's domain.
    OutOfRange { index: u64, size: u64 },
}

impl fmt::Display for DpfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InvalidDomain(size) => {
                write!(f, "domain size {} is not a power of two", size)
            }
            Self::OutOfRange { index, size } => {
                write!(f, "index {} out of range for domain of size {}", index, size)
            }
        }
    }
}

impl std::error::Error for DpfError {}

/// One compute party's half of a key pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpfKey {
    pub root_seed: Seed256,
    pub root_t: u8,
    pub cw_seed: Vec<Seed256>,
    pub cw_t_left: Vec<u8>,
    pub cw_t_right: Vec<u8>,
    pub cw_out: u64,
    pub size: u64,
    pub depth: usize,
}

/// Both halves of a generated key pair. The correction words are shared;
/// only the root seed and root control bit differ.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DpfKeyPair {
    pub key0: DpfKey,
    pub key1: DpfKey,
}

fn is_power_of_two(x: u64) -> bool {
    x != 0 && x & (x - 1) == 0
}

fn domain_depth(size: u64) -> usize {
    let mut depth = 0;
    while 1u64 << depth < size {
        depth += 1;
    }
    depth
}

/// MSB-first bit of `index` at `level`, with level 0 as the tree root.
fn path_bit(index: u64, depth: usize, level: usize) -> u8 {
    (index >> (depth - 1 - level) & 1) as u8
}

/// Generate a key pair for the point function mapping `location` to `value`.
pub fn generate(
    size: u64,
    location: u64,
    value: u64,
    rng: &mut impl Rng,
) -> Result<DpfKeyPair, DpfError> {
    if !is_power_of_two(size) {
        return Err(DpfError::InvalidDomain(size));
    }
    if location >= size {
        return Err(DpfError::OutOfRange {
            index: location,
            size,
        });
    }

    let depth = domain_depth(size);

    let root0 = Seed256::random(rng);
    let root1 = Seed256::random(rng);
    let t0 = root0.low_bit();
    let t1 = t0 ^ 1;

    let mut cw_seed = Vec::with_capacity(depth);
    let mut cw_t_left = Vec::with_capacity(depth);
    let mut cw_t_right = Vec::with_capacity(depth);

    let mut cur = [root0, root1];
    let mut tau = [t0, t1];

    for level in 0..depth {
        let (s0l, t0l, s0r, t0r) = prg::expand(&cur[0]);
        let (s1l, t1l, s1r, t1r) = prg::expand(&cur[1]);

        let bit = path_bit(location, depth, level);
        let keep = bit;

        let cwt_left = t0l ^ t1l ^ bit ^ 1;
        let cwt_right = t0r ^ t1r ^ bit;
        cw_t_left.push(cwt_left);
        cw_t_right.push(cwt_right);

        // Correct the branch the location does not take, so both parties'
        // trees collapse to the same seeds off the programmed path.
        let correction = if keep == 1 {
            s0l.xor(&s1l)
        } else {
            s0r.xor(&s1r)
        };
        cw_seed.push(correction);

        let children = [[s0l, s0r], [s1l, s1r]];
        let child_bits = [[t0l, t0r], [t1l, t1r]];
        for party in 0..2 {
            let mut child = children[party][keep as usize];
            let t_child = child_bits[party][keep as usize];
            if tau[party] == 0 {
                child.xor_assign(&correction);
            }
            let cwt = if keep == 0 { cwt_left } else { cwt_right };
            tau[party] = t_child ^ (tau[party] & cwt);
            child.clear_reserved_bits();
            cur[party] = child;
        }
    }

    let cw_out = value ^ prg::leaf(&cur[0]) ^ prg::leaf(&cur[1]);

    let key0 = DpfKey {
        root_seed: root0,
        root_t: t0,
        cw_seed: cw_seed.clone(),
        cw_t_left: cw_t_left.clone(),
        cw_t_right: cw_t_right.clone(),
        cw_out,
        size,
        depth,
    };
    let key1 = DpfKey {
        root_seed: root1,
        root_t: t1,
        cw_seed,
        cw_t_left,
        cw_t_right,
        cw_out,
        size,
        depth,
    };
    Ok(DpfKeyPair { key0, key1 })
}

/// Walk the tree from the root to the leaf selected by `index`.
fn walk(key: &DpfKey, index: u64) -> u64 {
    let mut seed = key.root_seed;
    let mut t = key.root_t;
    for level in 0..key.depth {
        let (left, t_left, right, t_right) = prg::expand(&seed);
        let bit = path_bit(index, key.depth, level);
        let (mut child, tau, cwt) = if bit == 1 {
            (right, t_right, key.cw_t_right[level])
        } else {
            (left, t_left, key.cw_t_left[level])
        };
        let next_t = tau ^ (t & cwt);
        if t == 0 {
            child.xor_assign(&key.cw_seed[level]);
        }
        child.clear_reserved_bits();
        seed = child;
        t = next_t;
    }
    let mut output = prg::leaf(&seed);
    if t == 1 {
        output ^= key.cw_out;
    }
    output
}

/// Evaluate one party's output share at a single index.
pub fn eval(key: &DpfKey, index: u64) -> Result<u64, DpfError> {
    if index >= key.size {
        return Err(DpfError::OutOfRange {
            index,
            size: key.size,
        });
    }
    Ok(walk(key, index))
}

/// Evaluate one party's output shares over the whole domain.
pub fn eval_full(key: &DpfKey) -> Vec<u64> {
    (0..key.size).map(|index| walk(key, index)).collect()
}

/// Compact binary encoding of a key.
pub fn to_bytes(key: &DpfKey) -> io::Result<Vec<u8>> {
    bincode::serialize(key).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

/// Decode a key from its binary encoding.
pub fn from_bytes(bytes: &[u8]) -> io::Result<DpfKey> {
    let key: DpfKey =
        bincode::deserialize(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    validate(&key)?;
    Ok(key)
}

/// Write a key in the whitespace text format used by query files:
/// `size depth`, the eight root seed words, the root control bit, the final
/// correction, one line of eight words per level, then the per-level left
/// and right control bits.
pub fn write_text<W: Write>(out: &mut W, key: &DpfKey) -> io::Result<()> {
    writeln!(out, "{} {}", key.size, key.depth)?;
    write_seed(out, &key.root_seed)?;
    writeln!(out, "{}", key.root_t)?;
    writeln!(out, "{}", key.cw_out)?;
    for seed in &key.cw_seed {
        write_seed(out, seed)?;
    }
    write_bits(out, &key.cw_t_left)?;
    write_bits(out, &key.cw_t_right)?;
    Ok(())
}

fn write_seed<W: Write>(out: &mut W, seed: &Seed256) -> io::Result<()> {
    for (i, word) in seed.0.iter().enumerate() {
        let sep = if i + 1 < seed.0.len() { ' ' } else { '\n' };
        write!(out, "{}{}", word, sep)?;
    }
    Ok(())
}

fn write_bits<W: Write>(out: &mut W, bits: &[u8]) -> io::Result<()> {
    for (i, bit) in bits.iter().enumerate() {
        let sep = if i + 1 < bits.len() { " " } else { "" };
        write!(out, "{}{}", bit, sep)?;
    }
    writeln!(out)?;
    Ok(())
}

/// Parse a key from a whitespace token stream, consuming exactly the tokens
/// produced by [`write_text`].
pub fn read_text<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> io::Result<DpfKey> {
    let size: u64 = take(tokens)?;
    let depth: usize = take(tokens)?;
    let root_seed = read_seed(tokens)?;
    let root_t: u8 = take(tokens)?;
    let root_t = root_t & 1;
    let cw_out: u64 = take(tokens)?;
    let mut cw_seed = Vec::with_capacity(depth);
    for _ in 0..depth {
        cw_seed.push(read_seed(tokens)?);
    }
    let cw_t_left = read_bits(tokens, depth)?;
    let cw_t_right = read_bits(tokens, depth)?;

    let key = DpfKey {
        root_seed,
        root_t,
        cw_seed,
        cw_t_left,
        cw_t_right,
        cw_out,
        size,
        depth,
    };
    validate(&key)?;
    Ok(key)
}

fn validate(key: &DpfKey) -> io::Result<()> {
    let consistent = is_power_of_two(key.size)
        && domain_depth(key.size) == key.depth
        && key.cw_seed.len() == key.depth
        && key.cw_t_left.len() == key.depth
        && key.cw_t_right.len() == key.depth;
    if consistent {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "inconsistent DPF key dimensions",
        ))
    }
}

fn take<'a, T: FromStr>(tokens: &mut impl Iterator<Item = &'a str>) -> io::Result<T> {
    let token = tokens
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated DPF key"))?;
    token
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed DPF key"))
}

fn read_seed<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> io::Result<Seed256> {
    let mut seed = Seed256::default();
    for word in &mut seed.0 {
        *word = take(tokens)?;
    }
    Ok(seed)
}

fn read_bits<'a>(tokens: &mut impl Iterator<Item = &'a str>, depth: usize) -> io::Result<Vec<u8>> {
    let mut bits = Vec::with_capacity(depth);
    for _ in 0..depth {
        let bit: u8 = take(tokens)?;
        bits.push(bit & 1);
    }
    Ok(bits)
}
