use std::cell::RefCell;

use argh::FromArgs;
use futures::join;
use mpc::dealer::BundleQueues;
use mpc::transport;
use mpc::Role;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

/// Correlated-randomness dealer (P2).
#[derive(FromArgs, Debug)]
struct Options {
    /// address to listen on for the two compute parties
    #[argh(option, default = "String::from(\"0.0.0.0:9002\")")]
    listen_addr: String,
}

/// Serve one compute party until it closes its session.
///
/// Both handlers run in the same task, so the shared queues only ever see
/// one request at a time and need no lock. A read or write failure simply
/// ends this client; the other party will stall until the run is restarted.
async fn handle_client(
    mut socket: TcpStream,
    role: Role,
    queues: &RefCell<BundleQueues>,
    rng: &RefCell<StdRng>,
) {
    loop {
        let dimension = match transport::recv_elem(&mut socket).await {
            Ok(elem) => elem.to_u64() as usize,
            Err(_) => break,
        };
        let share = queues
            .borrow_mut()
            .serve(role, dimension, &mut *rng.borrow_mut());

        let sent = async {
            transport::send_elem(&mut socket, share.correction).await?;
            transport::send_vector(&mut socket, &share.x).await?;
            transport::send_vector(&mut socket, &share.y).await
        }
        .await;
        if sent.is_err() {
            break;
        }
    }
    info!("client {:?} disconnected", role);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();
    let options: Options = argh::from_env();

    if let Err(err) = run(&options).await {
        error!("dealer failed: {}", err);
        std::process::exit(1);
    }
}

async fn run(options: &Options) -> std::io::Result<()> {
    let listener = TcpListener::bind(&options.listen_addr).await?;
    info!("listening on {}", options.listen_addr);

    let (socket_p0, socket_p1) = transport::accept_compute_parties(&listener).await?;
    info!("both compute parties connected");

    let queues = RefCell::new(BundleQueues::new());
    let rng = RefCell::new(StdRng::from_entropy());
    join!(
        handle_client(socket_p0, Role::P0, &queues, &rng),
        handle_client(socket_p1, Role::P1, &queues, &rng),
    );
    Ok(())
}
