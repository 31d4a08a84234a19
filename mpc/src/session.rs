//! Per-query orchestration for a compute party.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::dpf;
use crate::engine::{EngineError, PartyEngine};
use crate::fields::RingElem;
use crate::preprocessing::CorrelatedRandomness;
use crate::storage::Query;
use crate::Role;

/// Failure while processing the query stream.
#[derive(Debug)]
pub enum SessionError {
    Engine(EngineError),
    Dpf(dpf::DpfError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Engine(ref err) => err.fmt(f),
            Self::Dpf(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        SessionError::Engine(err)
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError::Engine(EngineError::Io(err))
    }
}

impl From<dpf::DpfError> for SessionError {
    fn from(err: dpf::DpfError) -> Self {
        SessionError::Dpf(err)
    }
}

/// One party's long-lived state: the protocol engine plus its share vectors,
/// mutated in place by the query stream.
pub struct UpdateSession<C, D> {
    engine: PartyEngine<C, D>,
    user_shares: Vec<RingElem>,
    item_shares: Vec<RingElem>,
}

impl<C, D> UpdateSession<C, D>
where
    C: AsyncRead + AsyncWrite + Unpin,
    D: CorrelatedRandomness,
{
    pub fn new(
        engine: PartyEngine<C, D>,
        user_shares: Vec<RingElem>,
        item_shares: Vec<RingElem>,
    ) -> Self {
        Self {
            engine,
            user_shares,
            item_shares,
        }
    }

    pub fn item_shares(&self) -> &[RingElem] {
        &self.item_shares
    }

    pub fn into_item_shares(self) -> Vec<RingElem> {
        self.item_shares
    }

    /// Apply one private update to the item shares.
    ///
    /// The hidden item never appears in the clear: the key expands to XOR
    /// shares of its indicator vector, the indicator is lifted to additive
    /// shares, and every arithmetic step that mixes the two parties' data
    /// runs through the masked protocol. Only the scalar `1` in the update
    /// rule `v <- v + u * (1 - u * v)` is public, and it is contributed by
    /// P0 alone.
    pub async fn process_query(&mut self, query: &Query) -> Result<(), SessionError> {
        let user_idx = query.user_id as usize % self.user_shares.len();
        let ui_share = self.user_shares[user_idx];

        let indicator_xor = dpf::eval_full(&query.key);
        let indicator = self.engine.xor_to_additive(&indicator_xor).await?;

        let vj_share = self
            .engine
            .inner_product(&self.item_shares, &indicator)
            .await?;
        let dot_share = self.engine.multiply(ui_share, vj_share).await?;

        let delta_share = match self.engine.role() {
            Role::P0 => RingElem::ONE - dot_share,
            Role::P1 => RingElem::ZERO - dot_share,
        };
        let m_share = self.engine.multiply(ui_share, delta_share).await?;

        for i in 0..self.item_shares.len() {
            let update = self.engine.multiply(indicator[i], m_share).await?;
            self.item_shares[i] = self.item_shares[i] + update;
        }
        Ok(())
    }

    /// Process queries strictly in input order.
    ///
    /// A query whose key domain disagrees with the item count is not
    /// evaluated; it is reported and the stream stops there, leaving the
    /// shares in their state after the last good query.
    pub async fn run(&mut self, queries: &[Query]) -> Result<(), SessionError> {
        for (index, query) in queries.iter().enumerate() {
            if query.key.size != self.item_shares.len() as u64 {
                warn!(
                    "query {} has domain {} but {} items are loaded; stopping",
                    index,
                    query.key.size,
                    self.item_shares.len()
                );
                break;
            }
            self.process_query(query).await?;
            info!("processed query {}/{}", index + 1, queries.len());
        }
        Ok(())
    }
}
