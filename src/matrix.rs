//! Presence and weight matrices
//!
//! Both matrices are `TIER_COUNT x width` grids stored row-major, where
//! `width` is the length of the longest tier. The presence matrix is a
//! 0/1 mask built once per corpus; weight matrices are derived from it
//! every dialogue round and hold a joint distribution over cells.

use std::ops::Deref;
use thiserror::Error;

use crate::corpus::{Cell, Corpus, CorpusError, Tier, TIER_COUNT};

/// Tolerance used when checking that a distribution sums to one
pub const SUM_TOLERANCE: f64 = 1e-8;

/// Invalid probability distribution
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DistributionError {
    /// Total mass is zero, negative or not finite, so it cannot be normalized
    #[error("weight matrix cannot be normalized (total mass {0})")]
    Degenerate(f64),

    #[error("negative or non-finite weight {weight} at {cell}")]
    NegativeWeight { cell: Cell, weight: f64 },

    #[error("weights sum to {0}, expected 1")]
    NotNormalized(f64),

    #[error("cell {0} is outside the weight matrix")]
    OutOfBounds(Cell),
}

/// Dense `TIER_COUNT x width` grid of non-negative weights
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    width: usize,
    data: Vec<f64>,
}

impl WeightMatrix {
    /// All-zero matrix
    pub fn zeros(width: usize) -> Self {
        Self {
            width,
            data: vec![0.0; TIER_COUNT * width],
        }
    }

    /// Build from explicit rows (A, B, C, Z). Shorter rows are zero-padded.
    pub fn from_rows(rows: [&[f64]; TIER_COUNT]) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut matrix = Self::zeros(width);
        for (tier, row) in Tier::ALL.into_iter().zip(rows) {
            matrix.row_mut(tier)[..row.len()].copy_from_slice(row);
        }
        matrix
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (TIER_COUNT, self.width)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether `cell` lies inside the matrix
    pub fn contains(&self, cell: Cell) -> bool {
        cell.slot < self.width
    }

    /// Weight at `cell`.
    ///
    /// # Panics
    ///
    /// Panics if `cell.slot` is not below [`width`](Self::width).
    pub fn get(&self, cell: Cell) -> f64 {
        self.row(cell.tier)[cell.slot]
    }

    /// Overwrite the weight at `cell`.
    ///
    /// # Panics
    ///
    /// Panics if `cell.slot` is not below [`width`](Self::width).
    pub fn set(&mut self, cell: Cell, value: f64) {
        self.row_mut(cell.tier)[cell.slot] = value;
    }

    pub fn row(&self, tier: Tier) -> &[f64] {
        let start = tier.index() * self.width;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, tier: Tier) -> &mut [f64] {
        let start = tier.index() * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Row-major view of every cell
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Inverse of the row-major flattening
    pub fn cell_at(&self, flat_index: usize) -> Option<Cell> {
        if self.width == 0 {
            return None;
        }
        let tier = Tier::from_index(flat_index / self.width)?;
        Some(Cell::new(tier, flat_index % self.width))
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Total mass of one tier row
    pub fn row_sum(&self, tier: Tier) -> f64 {
        self.row(tier).iter().sum()
    }

    /// Copy scaled so all cells sum to one.
    pub fn normalized(&self) -> Result<Self, DistributionError> {
        let total = self.sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(DistributionError::Degenerate(total));
        }
        let mut out = self.clone();
        out.data.iter_mut().for_each(|w| *w /= total);
        Ok(out)
    }

    /// Check the matrix is a valid distribution (finite, non-negative,
    /// summing to one within [`SUM_TOLERANCE`]).
    pub fn validate_distribution(&self) -> Result<(), DistributionError> {
        for (i, &weight) in self.data.iter().enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                let cell = self.cell_at(i).unwrap_or(Cell::new(Tier::A, 0));
                return Err(DistributionError::NegativeWeight { cell, weight });
            }
        }
        let total = self.sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(DistributionError::NotNormalized(total));
        }
        Ok(())
    }
}

/// Static 0/1 mask of the cells that hold a record
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceMatrix(WeightMatrix);

impl PresenceMatrix {
    /// Build the mask for `corpus`; every tier must be populated.
    pub fn from_corpus(corpus: &Corpus) -> Result<Self, CorpusError> {
        corpus.ensure_populated()?;
        let mut matrix = WeightMatrix::zeros(corpus.max_tier_len());
        for tier in Tier::ALL {
            let len = corpus.tier(tier).len();
            matrix.row_mut(tier)[..len].fill(1.0);
        }
        Ok(Self(matrix))
    }

    /// Number of populated cells in a row
    pub fn active_count(&self, tier: Tier) -> usize {
        self.0.row(tier).iter().filter(|&&v| v != 0.0).count()
    }

    pub fn is_present(&self, cell: Cell) -> bool {
        cell.slot < self.0.width() && self.0.get(cell) != 0.0
    }

    pub fn as_matrix(&self) -> &WeightMatrix {
        &self.0
    }
}

impl Deref for PresenceMatrix {
    type Target = WeightMatrix;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
