//! Per-round weight composition
//!
//! A dialogue round's distribution is derived from the static presence
//! matrix by chaining independent operators, each of which takes a matrix
//! by reference and returns a new one:
//!
//! 1. [`level_weighting`]: spread a tier prior uniformly over each tier's
//!    populated cells
//! 2. [`punish`]: discourage repeating the previous cell
//! 3. [`child_reward`]: favor follow-ups of the previous record, or its
//!    whole tier when it is a leaf
//! 4. [`tier_extra_reward`]: push long dialogues toward the terminal tier
//!
//! [`WeightComposer`] applies them according to the walk's [`WalkState`].

use serde::{Deserialize, Serialize};

use crate::config::WeightingConfig;
use crate::corpus::{Cell, Corpus, Tier, TIER_COUNT};
use crate::matrix::{DistributionError, PresenceMatrix, WeightMatrix};

/// Allowed deviation of a prior row's sum from one
pub const PRIOR_ROW_TOLERANCE: f64 = 1e-6;

/// Tier-to-tier transition probabilities, indexed `[from][to]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionPrior(pub [[f64; TIER_COUNT]; TIER_COUNT]);

impl Default for TransitionPrior {
    fn default() -> Self {
        Self([
            [0.05, 0.80, 0.10, 0.05], // A
            [0.05, 0.25, 0.40, 0.30], // B
            [0.05, 0.05, 0.05, 0.85], // C
            [0.50, 0.40, 0.10, 0.00], // Z
        ])
    }
}

impl TransitionPrior {
    /// Probabilities of the next tier given the previous one
    pub fn row(&self, from: Tier) -> [f64; TIER_COUNT] {
        self.0[from.index()]
    }

    /// Every entry must be finite and non-negative and every row must sum
    /// to one.
    pub fn check(&self) -> Result<(), String> {
        for from in Tier::ALL {
            let row = self.row(from);
            if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(format!("row {} has invalid probability {}", from, bad));
            }
            let total: f64 = row.iter().sum();
            if (total - 1.0).abs() > PRIOR_ROW_TOLERANCE {
                return Err(format!("row {} sums to {}, expected 1", from, total));
            }
        }
        Ok(())
    }
}

/// Where the walk stands before composing the next round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// No draw yet in this dialogue
    Opening,
    /// The previous round drew this (non-terminal) cell
    Following(Cell),
    /// The previous round drew from the terminal tier; history is cleared
    AfterTerminal,
}

impl WalkState {
    /// State after drawing `cell`
    pub fn after(cell: Cell) -> Self {
        if cell.tier.is_terminal() {
            Self::AfterTerminal
        } else {
            Self::Following(cell)
        }
    }
}

/// Diagonal tier weights for a round.
///
/// Round zero uses the opening weights; later rounds use the prior row of
/// the previous tier.
pub fn level_weights(
    round: usize,
    last_tier: Tier,
    config: &WeightingConfig,
    prior: &TransitionPrior,
) -> [f64; TIER_COUNT] {
    if round == 0 {
        config.opening_weights()
    } else {
        prior.row(last_tier)
    }
}

/// `diag(level) * presence`, with every populated row divided by its
/// populated-cell count. Unpopulated rows stay zero.
pub fn level_weighting(presence: &PresenceMatrix, level: &[f64; TIER_COUNT]) -> WeightMatrix {
    let mut out = presence.as_matrix().clone();
    for tier in Tier::ALL {
        let row = out.row_mut(tier);
        row.iter_mut().for_each(|w| *w *= level[tier.index()]);
        let non_zero = row.iter().filter(|&&w| w != 0.0).count();
        if non_zero > 0 {
            row.iter_mut().for_each(|w| *w /= non_zero as f64);
        }
    }
    out
}

/// Scale the previously drawn cell by `factor` and renormalize.
///
/// Fails with [`DistributionError::OutOfBounds`] when `last` is outside
/// the matrix.
pub fn punish(
    last: Cell,
    weights: &WeightMatrix,
    factor: f64,
) -> Result<WeightMatrix, DistributionError> {
    if !weights.contains(last) {
        return Err(DistributionError::OutOfBounds(last));
    }
    let mut out = weights.clone();
    out.set(last, out.get(last) * factor);
    out.normalized()
}

/// Reward the children of the record at `last` by `1 + reward`.
///
/// Leaves have no children to steer toward, so their whole tier is boosted
/// by `1 + reward / 10` instead. `last` and every child must lie inside
/// `weights`, otherwise [`DistributionError::OutOfBounds`] is returned.
pub fn child_reward(
    last: Cell,
    weights: &WeightMatrix,
    reward: f64,
    corpus: &Corpus,
) -> Result<WeightMatrix, DistributionError> {
    if !weights.contains(last) {
        return Err(DistributionError::OutOfBounds(last));
    }
    let children = corpus.children_of(last);
    if children.is_empty() {
        return tier_extra_reward(last.tier, weights, reward / 10.0);
    }
    if let Some(&outside) = children.iter().find(|c| !weights.contains(**c)) {
        return Err(DistributionError::OutOfBounds(outside));
    }
    let mut out = weights.clone();
    for &child in children {
        out.set(child, out.get(child) * (1.0 + reward));
    }
    out.normalized()
}

/// Scale a whole tier row by `1 + reward` and renormalize.
pub fn tier_extra_reward(
    tier: Tier,
    weights: &WeightMatrix,
    reward: f64,
) -> Result<WeightMatrix, DistributionError> {
    let mut out = weights.clone();
    out.row_mut(tier).iter_mut().for_each(|w| *w *= 1.0 + reward);
    out.normalized()
}

/// Chains the weighting operators for one dialogue round
#[derive(Debug, Clone)]
pub struct WeightComposer {
    config: WeightingConfig,
}

impl WeightComposer {
    pub fn new(config: WeightingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeightingConfig {
        &self.config
    }

    /// Whether the terminal boost is active at `round`
    pub fn terminal_boost_active(&self, round: usize) -> bool {
        round > self.config.final_weighting_threshold
    }

    /// Build the distribution for `round` given the walk state.
    pub fn compose(
        &self,
        presence: &PresenceMatrix,
        corpus: &Corpus,
        round: usize,
        state: WalkState,
    ) -> Result<WeightMatrix, DistributionError> {
        let cfg = &self.config;
        let prior = &cfg.transition_prior;

        let weights = match state {
            WalkState::Opening => {
                let level = level_weights(0, Tier::A, cfg, prior);
                return level_weighting(presence, &level).normalized();
            }
            WalkState::AfterTerminal => {
                let level = level_weights(round.max(1), Tier::TERMINAL, cfg, prior);
                level_weighting(presence, &level).normalized()?
            }
            WalkState::Following(last) => {
                let level = level_weights(round.max(1), last.tier, cfg, prior);
                let weights = level_weighting(presence, &level).normalized()?;
                let weights = punish(last, &weights, cfg.current_punish)?;
                child_reward(last, &weights, cfg.child_reward, corpus)?
            }
        };

        if self.terminal_boost_active(round) {
            tier_extra_reward(Tier::TERMINAL, &weights, cfg.final_level_reward)
        } else {
            Ok(weights)
        }
    }
}
