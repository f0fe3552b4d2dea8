//! `jiggle_amounts`: split a total into `n` positive integers that sum
//! exactly to the total, with bounded variance around the average.
//!
//! Used by the execution engine's `momentum` strategy mode to compute
//! per-wallet shares that still sum exactly to the operation's total.

use alloy::primitives::U256;
use rand::Rng;

/// Split `total` into `n` positive amounts summing exactly to `total`.
///
/// Every amount (except possibly the last, which absorbs rounding) is drawn
/// within `[(1 - factor) * avg, (1 + factor) * avg]` where `avg = total / n`.
/// With `factor == 0.0`, every amount equals `floor(total / n)` and the
/// remainder is placed entirely on the last element.
///
/// # Panics
///
/// Panics if `n == 0`, `factor` is outside `[0.0, 1.0)`, or `total < n`
/// (every wallet needs at least one unit) — all programmer errors, never
/// caller-supplied runtime data in this codebase.
pub fn jiggle_amounts<R: Rng + ?Sized>(total: U256, n: usize, factor: f64, rng: &mut R) -> Vec<U256> {
    assert!(n > 0, "jiggle_amounts: n must be positive");
    assert!(
        (0.0..1.0).contains(&factor),
        "jiggle_amounts: factor must be in [0.0, 1.0)"
    );

    let n_u256 = U256::from(n as u64);
    assert!(
        total >= n_u256,
        "jiggle_amounts: total must be at least n so every wallet gets a positive share"
    );
    let avg = total / n_u256;

    if factor == 0.0 {
        let mut amounts = vec![avg; n];
        let remainder = total - avg * n_u256;
        amounts[n - 1] += remainder;
        return amounts;
    }

    let avg_f64 = u256_to_f64(avg);
    let low = (avg_f64 * (1.0 - factor)).max(1.0);
    let high = (avg_f64 * (1.0 + factor)).max(low);

    // Draw n-1 amounts, each clamped so enough remains (>= 1 per wallet) for
    // every slot still to be filled; the last amount absorbs what's left.
    let mut amounts = Vec::with_capacity(n);
    let mut remaining = total;
    for i in 0..n - 1 {
        let slots_after = (n - 1 - i) as u64;
        let max_for_this = remaining.saturating_sub(U256::from(slots_after));
        let sampled = f64_to_u256(rng.random_range(low..=high).round().max(1.0));
        let clamped = sampled.clamp(U256::from(1u64), max_for_this.max(U256::from(1u64)));
        amounts.push(clamped);
        remaining -= clamped;
    }
    amounts.push(remaining);
    amounts
}

/// The `factor == 0.0` case of [`jiggle_amounts`], without requiring an RNG:
/// every amount equals `floor(total / n)`, remainder on the last. Used for
/// drip sub-payment splitting, which has no variance to draw.
///
/// # Panics
///
/// Panics if `n == 0` or `total < n`.
#[must_use]
pub fn jiggle_amounts_uniform(total: U256, n: usize) -> Vec<U256> {
    assert!(n > 0, "jiggle_amounts_uniform: n must be positive");
    let n_u256 = U256::from(n as u64);
    assert!(
        total >= n_u256,
        "jiggle_amounts_uniform: total must be at least n so every share is positive"
    );
    let avg = total / n_u256;
    let mut amounts = vec![avg; n];
    let remainder = total - avg * n_u256;
    amounts[n - 1] += remainder;
    amounts
}

fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(0.0)
}

fn f64_to_u256(value: f64) -> U256 {
    U256::from(value.max(0.0) as u128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn factor_zero_is_even_split_with_remainder_on_last() {
        let mut rng = StdRng::seed_from_u64(1);
        let amounts = jiggle_amounts(U256::from(103u64), 5, 0.0, &mut rng);
        assert_eq!(amounts.len(), 5);
        assert_eq!(amounts[..4], vec![U256::from(20u64); 4]);
        assert_eq!(amounts[4], U256::from(23u64));
        assert_eq!(
            amounts.iter().copied().fold(U256::ZERO, |a, b| a + b),
            U256::from(103u64)
        );
    }

    #[test]
    fn invariants_hold_across_many_seeds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let amounts = jiggle_amounts(U256::from(10u64).pow(U256::from(18u64)), 5, 0.15, &mut rng);
            assert_eq!(amounts.len(), 5);
            let sum = amounts.iter().copied().fold(U256::ZERO, |a, b| a + b);
            assert_eq!(sum, U256::from(10u64).pow(U256::from(18u64)));
            assert!(amounts.iter().all(|a| *a > U256::ZERO));
        }
    }

    #[test]
    fn uniform_split_matches_factor_zero() {
        let amounts = jiggle_amounts_uniform(U256::from(103u64), 5);
        assert_eq!(amounts[..4], vec![U256::from(20u64); 4]);
        assert_eq!(amounts[4], U256::from(23u64));
    }

    #[test]
    fn single_wallet_gets_the_whole_total() {
        let mut rng = StdRng::seed_from_u64(7);
        let amounts = jiggle_amounts(U256::from(1_000u64), 1, 0.2, &mut rng);
        assert_eq!(amounts, vec![U256::from(1_000u64)]);
    }

    #[test]
    fn small_totals_still_produce_positive_amounts() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..1_000 {
            let amounts = jiggle_amounts(U256::from(7u64), 5, 0.2, &mut rng);
            assert_eq!(amounts.iter().copied().fold(U256::ZERO, |a, b| a + b), U256::from(7u64));
            assert!(amounts.iter().all(|a| *a > U256::ZERO));
        }
    }
}
