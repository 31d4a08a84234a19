//! Plaintext reference semantics.
//!
//! Used by tests and by the query generator's self-checks: reconstruct
//! secrets from share pairs and apply the update rule in the clear, so
//! protocol runs can be compared against the intended arithmetic.

use crate::fields::RingElem;

/// Reconstruct a secret from its two additive shares.
pub fn reconstruct(share0: RingElem, share1: RingElem) -> RingElem {
    share0 + share1
}

/// Reconstruct a vector of secrets elementwise.
pub fn reconstruct_vector(shares0: &[RingElem], shares1: &[RingElem]) -> Vec<RingElem> {
    shares0
        .iter()
        .zip(shares1)
        .map(|(&a, &b)| reconstruct(a, b))
        .collect()
}

/// Apply one update in the clear: `items[j] += u * (1 - u * items[j])`
/// for `u = users[i]`, everything reduced in the ring.
pub fn apply_update(users: &[RingElem], items: &mut [RingElem], user_idx: usize, item_idx: usize) {
    let u = users[user_idx];
    let v = items[item_idx];
    let m = u * (RingElem::ONE - u * v);
    items[item_idx] = v + m;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruction_wraps_in_the_ring() {
        let a = RingElem::new(u32::MAX as u64);
        let b = RingElem::new(2);
        assert_eq!(reconstruct(a, b), RingElem::new(1));
    }

    #[test]
    fn update_rule_worked_example() {
        let users = [1u64, 2, 3, 4].map(RingElem::new);
        let mut items = [5u64, 6, 7, 8].map(RingElem::new).to_vec();
        apply_update(&users, &mut items, 2, 3);
        assert_eq!(items[3], RingElem::from_signed(-61));
        assert_eq!(items[..3], [5u64, 6, 7].map(RingElem::new));
    }
}
