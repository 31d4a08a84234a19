use std::error::Error;
use std::path::PathBuf;

use argh::FromArgs;
use mpc::engine::PartyEngine;
use mpc::preprocessing::RemoteDealer;
use mpc::session::UpdateSession;
use mpc::storage::{self, ProgramConfig};
use mpc::transport;
use mpc::Role;
use tracing::{error, info};

/// Compute party for the private recommender update protocol.
#[derive(FromArgs, Debug)]
struct Options {
    /// party role: 0 or 1
    #[argh(option)]
    role: u64,

    /// dealer endpoint
    #[argh(option, default = "String::from(\"p2:9002\")")]
    dealer_addr: String,

    /// peer endpoint dialed by P0
    #[argh(option, default = "String::from(\"p1:9001\")")]
    peer_addr: String,

    /// listen address used by P1 to accept P0
    #[argh(option, default = "String::from(\"0.0.0.0:9001\")")]
    listen_addr: String,

    /// directory holding config, share and query files
    #[argh(option, default = "String::from(\"data\")")]
    data_dir: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();
    let options: Options = argh::from_env();

    let role = match Role::from_index(options.role) {
        Some(role) => role,
        None => {
            error!("role must be 0 or 1");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(role, &options).await {
        error!("{:?} failed: {}", role, err);
        std::process::exit(1);
    }
}

async fn run(role: Role, options: &Options) -> Result<(), Box<dyn Error>> {
    let data_dir = PathBuf::from(&options.data_dir);
    let party = role.index();

    let config = ProgramConfig::load(data_dir.join("config.txt"))?;
    let user_shares = storage::load_share_vector(
        data_dir.join(format!("U{}_shares.txt", party)),
        config.num_users,
    )?;
    let item_shares = storage::load_share_vector(
        data_dir.join(format!("V{}_shares.txt", party)),
        config.num_items,
    )?;
    let queries = storage::load_queries(
        data_dir.join(format!("queries_p{}.txt", party)),
        config.num_items as u64,
    )?;

    let dealer_socket = transport::connect_to_dealer(&options.dealer_addr, role).await?;
    let peer_socket =
        transport::connect_peers(role, &options.peer_addr, &options.listen_addr).await?;
    info!("{:?}: sessions established", role);

    let engine = PartyEngine::new(role, peer_socket, RemoteDealer::new(dealer_socket));
    let mut session = UpdateSession::new(engine, user_shares, item_shares);

    info!(
        "{:?}: starting query processing for {} queries",
        role,
        queries.len()
    );
    session.run(&queries).await?;

    storage::save_share_vector(
        data_dir.join(format!("V{}_shares_updated.txt", party)),
        session.item_shares(),
    )?;
    info!("{:?}: completed all queries", role);
    Ok(())
}
