//! Sources of correlated randomness for the online protocol.

use std::io;

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::dealer::{BundleQueues, MaskShare};
use crate::fields::RingElem;
use crate::transport;
use crate::Role;

/// Per-inner-product masks handed out by a dealer.
#[async_trait(?Send)]
pub trait CorrelatedRandomness {
    /// Fetch this party's mask share for one inner product of the given
    /// dimension.
    async fn request_masks(&mut self, dimension: usize) -> io::Result<MaskShare>;
}

/// Masks served by the dealer process over its persistent TCP session.
pub struct RemoteDealer<S> {
    socket: S,
}

impl<S> RemoteDealer<S> {
    /// Wrap an established dealer connection (role handshake already sent).
    pub fn new(socket: S) -> Self {
        Self { socket }
    }
}

#[async_trait(?Send)]
impl<S> CorrelatedRandomness for RemoteDealer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn request_masks(&mut self, dimension: usize) -> io::Result<MaskShare> {
        transport::send_elem(&mut self.socket, RingElem::new(dimension as u64)).await?;
        let correction = transport::recv_elem(&mut self.socket).await?;
        let x = transport::recv_vector(&mut self.socket, dimension).await?;
        let y = transport::recv_vector(&mut self.socket, dimension).await?;
        Ok(MaskShare { correction, x, y })
    }
}

/// Insecure local dealer for tests.
///
/// Two instances constructed with the same seed produce identical bundle
/// streams and hand out complementary halves, so a pair of engines can run
/// the full online protocol without a dealer process.
pub struct FakeDealer {
    role: Role,
    queues: BundleQueues,
    rng: SmallRng,
}

impl FakeDealer {
    pub fn new(role: Role, seed: u8) -> Self {
        Self {
            role,
            queues: BundleQueues::new(),
            rng: SmallRng::from_seed([seed; 32]),
        }
    }
}

#[async_trait(?Send)]
impl CorrelatedRandomness for FakeDealer {
    async fn request_masks(&mut self, dimension: usize) -> io::Result<MaskShare> {
        // Both halves are drawn in a fixed order so the bundle stream stays
        // identical across the two mirrored instances; the peer half is
        // discarded locally.
        let p0 = self.queues.serve(Role::P0, dimension, &mut self.rng);
        let p1 = self.queues.serve(Role::P1, dimension, &mut self.rng);
        Ok(match self.role {
            Role::P0 => p0,
            Role::P1 => p1,
        })
    }
}
