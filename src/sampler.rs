//! Categorical sampling over weight matrices

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::corpus::Cell;
use crate::matrix::WeightMatrix;

pub use crate::matrix::DistributionError;

/// Draw one cell from `weights`.
///
/// The matrix must already be a distribution: finite, non-negative and
/// summing to one. Anything else is returned as an error.
pub fn sample_cell<R: Rng + ?Sized>(
    weights: &WeightMatrix,
    rng: &mut R,
) -> Result<Cell, DistributionError> {
    weights.validate_distribution()?;
    let dist = WeightedIndex::<f64>::new(weights.as_slice())
        .map_err(|_| DistributionError::Degenerate(weights.sum()))?;
    let index = dist.sample(rng);
    weights
        .cell_at(index)
        .ok_or(DistributionError::Degenerate(weights.sum()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Tier;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_point_mass() {
        let weights = WeightMatrix::from_rows([&[0.0, 0.0], &[0.0, 1.0], &[], &[]]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(
                sample_cell(&weights, &mut rng).unwrap(),
                Cell::new(Tier::B, 1)
            );
        }
    }

    #[test]
    fn test_never_draws_zero_cells() {
        let weights = WeightMatrix::from_rows([&[0.5, 0.0], &[0.0], &[0.0, 0.25], &[0.25]]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = [0usize; 4];
        for _ in 0..2000 {
            let cell = sample_cell(&weights, &mut rng).unwrap();
            assert!(weights.get(cell) > 0.0, "drew empty cell {}", cell);
            seen[cell.tier.index()] += 1;
        }
        assert_eq!(seen[1], 0);
        // Roughly half the mass sits in tier A
        assert!(seen[0] > 800 && seen[0] < 1200, "tier A draws: {}", seen[0]);
    }

    #[test]
    fn test_seeded_draws_repeat() {
        let weights = WeightMatrix::from_rows([&[0.1, 0.2], &[0.3], &[0.1], &[0.3]]);
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..20)
                .map(|_| sample_cell(&weights, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn test_rejects_invalid_distributions() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let unnormalized = WeightMatrix::from_rows([&[0.2], &[0.2], &[], &[]]);
        assert!(matches!(
            sample_cell(&unnormalized, &mut rng),
            Err(DistributionError::NotNormalized(_))
        ));

        let negative = WeightMatrix::from_rows([&[1.2], &[-0.2], &[], &[]]);
        assert!(matches!(
            sample_cell(&negative, &mut rng),
            Err(DistributionError::NegativeWeight { .. })
        ));

        let empty = WeightMatrix::zeros(3);
        assert!(sample_cell(&empty, &mut rng).is_err());
    }
}
