use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Master seed for the whole benchmark. Fixed so that re-running the same
/// configuration regenerates bit-identical synthetic data.
const MASTER_SEED: u64 = 0x5eed_1ab5;

/// Produces `n` per-thread seeds by drawing successive outputs from one
/// generator seeded with [`MASTER_SEED`]. The stream is not indexable:
/// `generate_seeds(n)` and `generate_seeds(m)` only agree on the shorter
/// prefix because the underlying generator happens to be drawn in order, and
/// callers must not rely on that.
pub fn generate_seeds(n: usize) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(MASTER_SEED);
    (0..n).map(|_| rng.random::<u32>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproducible_within_process() {
        let a = generate_seeds(16);
        let b = generate_seeds(16);
        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
    }

    #[test]
    fn seeds_are_not_all_identical() {
        let seeds = generate_seeds(8);
        assert!(seeds.iter().any(|s| *s != seeds[0]));
    }

    #[test]
    fn empty_request() {
        assert!(generate_seeds(0).is_empty());
    }
}
