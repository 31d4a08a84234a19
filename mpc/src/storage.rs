//! File contracts shared with the generator and verifier tooling.
//!
//! Everything on disk is whitespace-separated decimal text: share vectors
//! are one value per line, the config is a single line of three integers,
//! and query files carry a header followed by `user_id` + serialized key
//! records. Malformed content surfaces as `InvalidData` I/O errors.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::dpf::{self, DpfKey};
use crate::fields::RingElem;

/// Run parameters: `num_users num_items num_queries`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProgramConfig {
    pub num_users: usize,
    pub num_items: usize,
    pub num_queries: usize,
}

impl ProgramConfig {
    /// Load and validate the three-integer config file.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut tokens = text.split_whitespace();
        let config = ProgramConfig {
            num_users: take(&mut tokens)?,
            num_items: take(&mut tokens)?,
            num_queries: take(&mut tokens)?,
        };
        if config.num_users == 0 || config.num_items == 0 || config.num_queries == 0 {
            return Err(invalid("config values must be positive"));
        }
        if !config.num_items.is_power_of_two() {
            return Err(invalid("num_items must be a power of two"));
        }
        Ok(config)
    }

    /// Write the config file consumed by [`ProgramConfig::load`].
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(
            path,
            format!("{} {} {}\n", self.num_users, self.num_items, self.num_queries),
        )
    }
}

/// One private update request: the user index in the clear, the item index
/// hidden inside the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub user_id: u32,
    pub key: DpfKey,
}

/// Load a share vector of exactly `len` elements.
pub fn load_share_vector(path: impl AsRef<Path>, len: usize) -> io::Result<Vec<RingElem>> {
    let text = fs::read_to_string(path)?;
    let mut tokens = text.split_whitespace();
    let mut shares = Vec::with_capacity(len);
    for _ in 0..len {
        shares.push(take(&mut tokens)?);
    }
    Ok(shares)
}

/// Persist a share vector, one decimal value per line.
pub fn save_share_vector(path: impl AsRef<Path>, shares: &[RingElem]) -> io::Result<()> {
    let mut text = String::new();
    for share in shares {
        let _ = writeln!(text, "{}", share);
    }
    fs::write(path, text)
}

/// Load a query file. A header domain that disagrees with `expected_domain`
/// is reported but does not fail the load; the per-query check happens when
/// the stream is processed.
pub fn load_queries(path: impl AsRef<Path>, expected_domain: u64) -> io::Result<Vec<Query>> {
    let text = fs::read_to_string(path)?;
    let mut tokens = text.split_whitespace();

    let count: u32 = take(&mut tokens)?;
    let domain: u64 = take(&mut tokens)?;
    if domain != expected_domain {
        warn!(
            "query file declares domain {} but {} was expected",
            domain, expected_domain
        );
    }

    let mut queries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let user_id = take(&mut tokens)?;
        let key = dpf::read_text(&mut tokens)?;
        queries.push(Query { user_id, key });
    }
    Ok(queries)
}

/// Write a query file consumed by [`load_queries`].
pub fn save_queries(
    path: impl AsRef<Path>,
    queries: &[Query],
    domain_size: u64,
) -> io::Result<()> {
    let mut out = Vec::new();
    use io::Write as _;
    writeln!(out, "{} {}", queries.len(), domain_size)?;
    for query in queries {
        writeln!(out, "{}", query.user_id)?;
        dpf::write_text(&mut out, &query.key)?;
        writeln!(out)?;
    }
    fs::write(path, out)
}

fn take<'a, T: FromStr>(tokens: &mut impl Iterator<Item = &'a str>) -> io::Result<T> {
    let token = tokens.next().ok_or_else(|| invalid("unexpected end of file"))?;
    token.parse().map_err(|_| invalid("malformed value"))
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}
