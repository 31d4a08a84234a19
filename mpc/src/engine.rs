//! Online two-party protocol: share conversion and masked inner products.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::fields::RingElem;
use crate::preprocessing::CorrelatedRandomness;
use crate::transport;
use crate::Role;

/// Failure of an online protocol step.
#[derive(Debug)]
pub enum EngineError {
    /// Peer or dealer channel failed mid-protocol.
    Io(io::Error),
    /// The two operand vectors of an inner product differ in length.
    DimensionMismatch { left: usize, right: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Io(ref err) => write!(f, "protocol channel error: {}", err),
            Self::DimensionMismatch { left, right } => {
                write!(f, "operand dimensions {} and {} differ", left, right)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        EngineError::Io(err)
    }
}

/// One compute party's view of the online protocol: the peer link plus a
/// source of correlated randomness.
///
/// Both parties must issue the same sequence of calls with matching
/// dimensions; the exchanges below use a fixed send/receive order so the
/// lock-step never deadlocks.
pub struct PartyEngine<C, D> {
    role: Role,
    peer: C,
    dealer: D,
}

impl<C, D> PartyEngine<C, D>
where
    C: AsyncRead + AsyncWrite + Unpin,
    D: CorrelatedRandomness,
{
    pub fn new(role: Role, peer: C, dealer: D) -> Self {
        Self { role, peer, dealer }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Lift XOR shares of a one-hot vector into additive shares in the ring.
    ///
    /// XOR shares of 0 are equal, and XOR shares of 1 differ exactly in the
    /// low bit, so the signed difference of the two parties' values is the
    /// secret up to one global sign. One symmetric sum exchange decides that
    /// sign; if the reconstructed total would be negative both parties flip,
    /// which preserves the shared secret. This assumes the underlying
    /// plaintext vector has a nonnegative total, which holds for the
    /// indicator vectors produced by point-function evaluation.
    pub async fn xor_to_additive(&mut self, xor_shares: &[u64]) -> io::Result<Vec<RingElem>> {
        let mut signed: Vec<i64> = xor_shares
            .iter()
            .map(|&value| {
                let value = value as i64;
                match self.role {
                    Role::P0 => value,
                    Role::P1 => value.wrapping_neg(),
                }
            })
            .collect();

        let local_sum = signed
            .iter()
            .fold(0i64, |acc, &value| acc.wrapping_add(value));
        let peer_sum = match self.role {
            Role::P0 => {
                transport::send_int64(&mut self.peer, local_sum).await?;
                transport::recv_int64(&mut self.peer).await?
            }
            Role::P1 => {
                let sum = transport::recv_int64(&mut self.peer).await?;
                transport::send_int64(&mut self.peer, local_sum).await?;
                sum
            }
        };

        if local_sum.wrapping_add(peer_sum) < 0 {
            for value in &mut signed {
                *value = value.wrapping_neg();
            }
        }

        Ok(signed.into_iter().map(RingElem::from_signed).collect())
    }

    /// Secure inner product of two additively shared vectors.
    ///
    /// Returns this party's additive share of `<a, b>`.
    pub async fn inner_product(
        &mut self,
        a: &[RingElem],
        b: &[RingElem],
    ) -> Result<RingElem, EngineError> {
        if a.len() != b.len() {
            return Err(EngineError::DimensionMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        let dimension = a.len();
        let masks = self.dealer.request_masks(dimension).await?;

        let masked_a: Vec<RingElem> = a.iter().zip(&masks.x).map(|(&ai, &xi)| ai + xi).collect();
        let masked_b: Vec<RingElem> = b.iter().zip(&masks.y).map(|(&bi, &yi)| bi + yi).collect();

        transport::send_vector(&mut self.peer, &masked_a).await?;
        transport::send_vector(&mut self.peer, &masked_b).await?;
        let peer_masked_a = transport::recv_vector(&mut self.peer, dimension).await?;
        let peer_masked_b = transport::recv_vector(&mut self.peer, dimension).await?;

        let mut share = RingElem::ZERO;
        for i in 0..dimension {
            share = share + a[i] * (b[i] + peer_masked_b[i]);
        }
        for i in 0..dimension {
            share = share - masks.y[i] * peer_masked_a[i];
        }
        Ok(share + masks.correction)
    }

    /// Secure product of two shared scalars, as a one-dimensional inner
    /// product.
    pub async fn multiply(
        &mut self,
        left: RingElem,
        right: RingElem,
    ) -> Result<RingElem, EngineError> {
        self.inner_product(&[left], &[right]).await
    }
}

#[cfg(test)]
mod tests {
    use futures::join;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use tokio::io::DuplexStream;

    use super::*;
    use crate::fields::dot;
    use crate::preprocessing::FakeDealer;

    type TestEngine = PartyEngine<DuplexStream, FakeDealer>;

    fn engine_pair(seed: u8) -> (TestEngine, TestEngine) {
        let (end0, end1) = tokio::io::duplex(1 << 20);
        (
            PartyEngine::new(Role::P0, end0, FakeDealer::new(Role::P0, seed)),
            PartyEngine::new(Role::P1, end1, FakeDealer::new(Role::P1, seed)),
        )
    }

    fn share_vector(
        values: &[u64],
        rng: &mut impl Rng,
    ) -> (Vec<RingElem>, Vec<RingElem>) {
        values
            .iter()
            .map(|&value| {
                let share0 = RingElem::random(rng);
                (share0, RingElem::new(value) - share0)
            })
            .unzip()
    }

    #[tokio::test]
    async fn inner_product_shares_sum_to_plaintext() {
        let mut rng = SmallRng::from_seed([21; 32]);
        for dimension in [1usize, 4, 16, 64] {
            let a_plain: Vec<u64> = (0..dimension).map(|_| rng.gen()).collect();
            let b_plain: Vec<u64> = (0..dimension).map(|_| rng.gen()).collect();
            let (a0, a1) = share_vector(&a_plain, &mut rng);
            let (b0, b1) = share_vector(&b_plain, &mut rng);

            let (mut party0, mut party1) = engine_pair(33);
            let (share0, share1) = join!(
                party0.inner_product(&a0, &b0),
                party1.inner_product(&a1, &b1)
            );

            let a_full: Vec<RingElem> = a_plain.iter().map(|&v| RingElem::new(v)).collect();
            let b_full: Vec<RingElem> = b_plain.iter().map(|&v| RingElem::new(v)).collect();
            assert_eq!(
                share0.unwrap() + share1.unwrap(),
                dot(&a_full, &b_full),
                "dimension {}",
                dimension
            );
        }
    }

    #[tokio::test]
    async fn multiply_shares_sum_to_product() {
        let mut rng = SmallRng::from_seed([22; 32]);
        let (x0, x1) = (RingElem::random(&mut rng), RingElem::new(12345));
        let (y0, y1) = (RingElem::random(&mut rng), RingElem::new(678));

        let (mut party0, mut party1) = engine_pair(44);
        let (share0, share1) = join!(party0.multiply(x0, y0), party1.multiply(x1, y1));

        assert_eq!(
            share0.unwrap() + share1.unwrap(),
            (x0 + x1) * (y0 + y1)
        );
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() {
        let (mut party0, _party1) = engine_pair(55);
        let err = party0
            .inner_product(&[RingElem::ONE], &[RingElem::ONE, RingElem::ONE])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DimensionMismatch { left: 1, right: 2 }
        ));
    }

    #[tokio::test]
    async fn xor_shares_of_indicator_become_additive() {
        let mut rng = SmallRng::from_seed([23; 32]);

        // XOR shares of the vector [0, 1, 0, 0]: equal everywhere except a
        // low-bit flip at the hot index.
        let base: Vec<u64> = (0..4).map(|_| rng.gen()).collect();
        let mut flipped = base.clone();
        flipped[1] ^= 1;

        let (mut party0, mut party1) = engine_pair(66);
        let (out0, out1) = join!(
            party0.xor_to_additive(&base),
            party1.xor_to_additive(&flipped)
        );
        let (out0, out1) = (out0.unwrap(), out1.unwrap());

        let reconstructed: Vec<RingElem> =
            out0.iter().zip(&out1).map(|(&a, &b)| a + b).collect();
        assert_eq!(
            reconstructed,
            vec![
                RingElem::ZERO,
                RingElem::ONE,
                RingElem::ZERO,
                RingElem::ZERO
            ]
        );
    }

    #[tokio::test]
    async fn conversion_flips_a_negative_total() {
        // Arrange shares so the raw signed difference at the hot index is
        // -1; the sign exchange must flip both parties to keep the secret 1.
        let base = vec![0u64, 7, 0];
        let mut flipped = base.clone();
        flipped[1] ^= 1; // party 0 holds 7, party 1 holds 6: difference -1 at index 1

        let (mut party0, mut party1) = engine_pair(77);
        let (out0, out1) = join!(
            party0.xor_to_additive(&flipped),
            party1.xor_to_additive(&base)
        );
        let (out0, out1) = (out0.unwrap(), out1.unwrap());

        let reconstructed: Vec<RingElem> =
            out0.iter().zip(&out1).map(|(&a, &b)| a + b).collect();
        assert_eq!(
            reconstructed,
            vec![RingElem::ZERO, RingElem::ONE, RingElem::ZERO]
        );
    }
}
