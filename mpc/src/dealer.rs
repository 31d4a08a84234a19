//! Correlated-randomness bundles and the per-dimension pairing queues.
//!
//! The dealer never coordinates the two compute parties directly; it only
//! guarantees that the n-th request for dimension `k` from one party is
//! answered out of the same bundle as the n-th request for `k` from the
//! other. The queues below implement exactly that matching.

use std::collections::{HashMap, VecDeque};

use rand::Rng;

use crate::fields::{dot, RingElem};
use crate::Role;

/// One party's half of a preprocessing bundle, as sent on the wire:
/// the correction scalar followed by the two mask vectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskShare {
    pub correction: RingElem,
    pub x: Vec<RingElem>,
    pub y: Vec<RingElem>,
}

/// A full bundle of correlated masks, known only to the dealer.
///
/// The corrections derived from it satisfy
/// `corr0 + corr1 = <X0, Y1> + <X1, Y0>`, which is what makes the masked
/// inner-product finalization come out additively shared.
#[derive(Clone, Debug)]
struct Bundle {
    x0: Vec<RingElem>,
    x1: Vec<RingElem>,
    y0: Vec<RingElem>,
    y1: Vec<RingElem>,
    alpha: RingElem,
    served_p0: bool,
    served_p1: bool,
}

impl Bundle {
    /// Sample a fresh bundle. Masks and alpha deliberately come from the
    /// small-random distribution; see the threat-model note in DESIGN.md.
    fn generate(dimension: usize, rng: &mut impl Rng) -> Self {
        let mut sample = |_| RingElem::small_random(rng);
        Bundle {
            x0: (0..dimension).map(&mut sample).collect(),
            x1: (0..dimension).map(&mut sample).collect(),
            y0: (0..dimension).map(&mut sample).collect(),
            y1: (0..dimension).map(&mut sample).collect(),
            alpha: RingElem::small_random(rng),
            served_p0: false,
            served_p1: false,
        }
    }

    fn served(&self, role: Role) -> bool {
        match role {
            Role::P0 => self.served_p0,
            Role::P1 => self.served_p1,
        }
    }

    fn mark_served(&mut self, role: Role) {
        match role {
            Role::P0 => self.served_p0 = true,
            Role::P1 => self.served_p1 = true,
        }
    }

    fn share_for(&self, role: Role) -> MaskShare {
        match role {
            Role::P0 => MaskShare {
                correction: dot(&self.x0, &self.y1) + self.alpha,
                x: self.x0.clone(),
                y: self.y0.clone(),
            },
            Role::P1 => MaskShare {
                correction: dot(&self.x1, &self.y0) - self.alpha,
                x: self.x1.clone(),
                y: self.y1.clone(),
            },
        }
    }
}

/// Pending bundles keyed by dimension, each queue FIFO in creation order.
///
/// Touched by a single thread only; the head of a queue is always the
/// oldest bundle still waiting for its second party.
#[derive(Default)]
pub struct BundleQueues {
    pending_by_dim: HashMap<usize, VecDeque<Bundle>>,
}

impl BundleQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer one dimension request from `role`.
    ///
    /// Binds to the queue head if the other party has already drawn from it,
    /// otherwise creates a fresh bundle at the tail. A bundle drawn by both
    /// parties is dropped once it reaches the head.
    pub fn serve(&mut self, role: Role, dimension: usize, rng: &mut impl Rng) -> MaskShare {
        let queue = self.pending_by_dim.entry(dimension).or_default();

        let head_binds = queue
            .front()
            .map_or(false, |bundle| bundle.served(role.peer()) && !bundle.served(role));
        let index = if head_binds {
            0
        } else {
            queue.push_back(Bundle::generate(dimension, rng));
            queue.len() - 1
        };

        let bundle = &mut queue[index];
        bundle.mark_served(role);
        let share = bundle.share_for(role);

        if index == 0 && bundle.served_p0 && bundle.served_p1 {
            queue.pop_front();
        }
        share
    }

    /// Total number of bundles still waiting for their second party.
    pub fn pending(&self) -> usize {
        self.pending_by_dim.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> SmallRng {
        SmallRng::from_seed([17; 32])
    }

    #[test]
    fn complementary_halves_of_one_bundle() {
        let mut queues = BundleQueues::new();
        let mut rng = rng();

        let p0 = queues.serve(Role::P0, 5, &mut rng);
        let p1 = queues.serve(Role::P1, 5, &mut rng);

        assert_eq!(
            p0.correction + p1.correction,
            dot(&p0.x, &p1.y) + dot(&p1.x, &p0.y)
        );
        assert_eq!(queues.pending(), 0);
    }

    #[test]
    fn masks_come_from_the_small_range() {
        let mut queues = BundleQueues::new();
        let mut rng = rng();
        let share = queues.serve(Role::P0, 8, &mut rng);
        for value in share.x.iter().chain(&share.y) {
            assert!((1..=5).contains(&value.to_u64()));
        }
    }

    #[test]
    fn pairs_interleaved_request_streams_in_order() {
        let mut queues = BundleQueues::new();
        let mut rng = rng();

        // P0 asks for [3, 7, 3], P1 for [7, 3, 3]; each dimension must be
        // matched in arrival order and nothing may outlive its second draw.
        let p0_first = queues.serve(Role::P0, 3, &mut rng);
        let p1_first = queues.serve(Role::P1, 7, &mut rng);
        assert_eq!(queues.pending(), 2);

        let p0_second = queues.serve(Role::P0, 7, &mut rng);
        assert_eq!(
            p0_second.correction + p1_first.correction,
            dot(&p0_second.x, &p1_first.y) + dot(&p1_first.x, &p0_second.y)
        );

        let p1_second = queues.serve(Role::P1, 3, &mut rng);
        assert_eq!(
            p0_first.correction + p1_second.correction,
            dot(&p0_first.x, &p1_second.y) + dot(&p1_second.x, &p0_first.y)
        );
        assert_eq!(queues.pending(), 0);

        let p0_third = queues.serve(Role::P0, 3, &mut rng);
        let p1_third = queues.serve(Role::P1, 3, &mut rng);
        assert_eq!(
            p0_third.correction + p1_third.correction,
            dot(&p0_third.x, &p1_third.y) + dot(&p1_third.x, &p0_third.y)
        );
        assert_eq!(queues.pending(), 0);
    }

    #[test]
    fn repeated_requests_from_one_party_stack_up() {
        let mut queues = BundleQueues::new();
        let mut rng = rng();

        let first = queues.serve(Role::P0, 2, &mut rng);
        let second = queues.serve(Role::P0, 2, &mut rng);
        assert_eq!(queues.pending(), 2);

        // The other party drains them oldest-first.
        let other_first = queues.serve(Role::P1, 2, &mut rng);
        assert_eq!(
            first.correction + other_first.correction,
            dot(&first.x, &other_first.y) + dot(&other_first.x, &first.y)
        );
        assert_eq!(queues.pending(), 1);

        let other_second = queues.serve(Role::P1, 2, &mut rng);
        assert_eq!(
            second.correction + other_second.correction,
            dot(&second.x, &other_second.y) + dot(&other_second.x, &second.y)
        );
        assert_eq!(queues.pending(), 0);
    }
}
