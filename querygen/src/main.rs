use std::error::Error;
use std::fs;
use std::io;
use std::path::PathBuf;

use argh::FromArgs;
use mpc::dpf;
use mpc::fields::RingElem;
use mpc::storage::{self, ProgramConfig, Query};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

/// Generator of share files and private update queries.
#[derive(FromArgs, Debug)]
struct Options {
    /// number of users
    #[argh(positional)]
    num_users: usize,

    /// number of items (must be a power of two)
    #[argh(positional)]
    num_items: usize,

    /// number of queries to generate
    #[argh(positional)]
    num_queries: usize,

    /// output directory for generated files
    #[argh(option, default = "String::from(\"data\")")]
    data_dir: String,
}

/// Split `len` small secrets into two additive share vectors.
///
/// Secrets and first shares come from the small range so reconstructed
/// values stay far from the ring modulus over many updates.
fn share_small_secrets(
    len: usize,
    rng: &mut impl Rng,
) -> (Vec<RingElem>, Vec<RingElem>) {
    (0..len)
        .map(|_| {
            let secret = RingElem::small_random(rng);
            let share0 = RingElem::small_random(rng);
            (share0, secret - share0)
        })
        .unzip()
}

fn main() {
    tracing_subscriber::fmt::init();
    let options: Options = argh::from_env();

    if let Err(err) = run(&options) {
        error!("query generation failed: {}", err);
        std::process::exit(1);
    }
}

fn run(options: &Options) -> Result<(), Box<dyn Error>> {
    if options.num_users == 0 || options.num_queries == 0 {
        return Err("num_users and num_queries must be positive".into());
    }
    if !options.num_items.is_power_of_two() {
        return Err("num_items must be a power of two".into());
    }

    let data_dir = PathBuf::from(&options.data_dir);
    fs::create_dir_all(&data_dir)?;

    let mut rng = StdRng::from_entropy();

    let (users0, users1) = share_small_secrets(options.num_users, &mut rng);
    let (items0, items1) = share_small_secrets(options.num_items, &mut rng);
    storage::save_share_vector(data_dir.join("U0_shares.txt"), &users0)?;
    storage::save_share_vector(data_dir.join("U1_shares.txt"), &users1)?;
    storage::save_share_vector(data_dir.join("V0_shares.txt"), &items0)?;
    storage::save_share_vector(data_dir.join("V1_shares.txt"), &items1)?;

    let config = ProgramConfig {
        num_users: options.num_users,
        num_items: options.num_items,
        num_queries: options.num_queries,
    };
    config.save(data_dir.join("config.txt"))?;

    let domain = options.num_items as u64;
    let mut queries_p0 = Vec::with_capacity(options.num_queries);
    let mut queries_p1 = Vec::with_capacity(options.num_queries);

    for _ in 0..options.num_queries {
        let user_id = rng.gen_range(0..options.num_users) as u32;
        let item_index = rng.gen_range(0..domain);
        let pair = dpf::generate(domain, item_index, 1, &mut rng)?;
        check_key_pair(&pair, item_index)?;

        queries_p0.push(Query {
            user_id,
            key: pair.key0,
        });
        queries_p1.push(Query {
            user_id,
            key: pair.key1,
        });
    }

    storage::save_queries(data_dir.join("queries_p0.txt"), &queries_p0, domain)?;
    storage::save_queries(data_dir.join("queries_p1.txt"), &queries_p1, domain)?;

    info!(
        "generated {} queries for {} users and {} items",
        options.num_queries, options.num_users, options.num_items
    );
    Ok(())
}

/// Evaluate a fresh key pair over its whole domain and reject it unless it
/// encodes exactly the intended indicator.
fn check_key_pair(pair: &dpf::DpfKeyPair, location: u64) -> io::Result<()> {
    let out0 = dpf::eval_full(&pair.key0);
    let out1 = dpf::eval_full(&pair.key1);
    for (index, (a, b)) in out0.iter().zip(&out1).enumerate() {
        let expected = if index as u64 == location { 1 } else { 0 };
        if a ^ b != expected {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("generated key pair fails self-check at index {}", index),
            ));
        }
    }
    Ok(())
}
