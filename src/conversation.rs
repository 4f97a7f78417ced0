//! Conversation assembly
//!
//! Drives the per-dialogue walk: draw a depth, then repeatedly compose a
//! weight matrix, sample a cell and append its question/answer pair.
//! Finished paths are formatted into training records.
//!
//! # Usage
//!
//! ```rust
//! use chatgen::config::ChatgenConfig;
//! use chatgen::conversation::ConversationGenerator;
//! use chatgen::corpus::{Corpus, Record};
//!
//! let corpus = Corpus::new([
//!     vec![Record::new("a1", "", "Hi?", "Hello!")],
//!     vec![Record::new("b1", "a1", "Prices?", "From $5.")],
//!     vec![Record::new("c1", "b1", "Discounts?", "On Mondays.")],
//!     vec![Record::new("z1", "", "Thanks!", "Goodbye.")],
//! ]);
//!
//! let mut config = ChatgenConfig::default();
//! config.generation.generate_times = 10;
//! config.generation.seed = Some(42);
//!
//! let generator = ConversationGenerator::new(&corpus, &config).unwrap();
//! let output = generator.run().unwrap();
//! assert_eq!(output.conversations.len(), 10);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::config::{ChatgenConfig, ConfigError};
use crate::corpus::{Cell, Corpus, CorpusError, Record, Tier, TIER_COUNT};
use crate::matrix::{DistributionError, PresenceMatrix};
use crate::sampler::sample_cell;
use crate::weighting::{WalkState, WeightComposer};

/// Dialogues between progress log lines
pub const PROGRESS_INTERVAL: usize = 1000;

/// A `[question, answer]` pair
pub type QaPair = [String; 2];

/// Generation errors.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid corpus: {0}")]
    Corpus(#[from] CorpusError),

    #[error("dialogue {dialogue}, round {round}: {source}")]
    Distribution {
        dialogue: usize,
        round: usize,
        #[source]
        source: DistributionError,
    },

    #[error("dialogue {dialogue}, round {round}: sampled cell {cell} holds no record")]
    MissingRecord {
        dialogue: usize,
        round: usize,
        cell: Cell,
    },

    #[error("generation worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Training record for one synthetic conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// System prompt
    pub instruction: String,
    /// Final question
    pub input: String,
    /// Final answer
    pub output: String,
    /// Earlier rounds, oldest first
    pub history: Vec<QaPair>,
}

impl ConversationRecord {
    /// Number of question/answer rounds
    pub fn rounds(&self) -> usize {
        self.history.len() + 1
    }
}

/// Question/answer pairs drawn for one dialogue, oldest first.
///
/// Always holds at least one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialoguePath {
    history: Vec<QaPair>,
    last: QaPair,
}

impl DialoguePath {
    /// Path holding only its opening pair
    pub fn new(first: QaPair) -> Self {
        Self {
            history: Vec::new(),
            last: first,
        }
    }

    /// Append the pair drawn in the next round.
    pub fn push(&mut self, pair: QaPair) {
        let previous = std::mem::replace(&mut self.last, pair);
        self.history.push(previous);
    }

    pub fn len(&self) -> usize {
        self.history.len() + 1
    }

    /// Never true; a path starts with its opening pair.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every pair in draw order
    pub fn pairs(&self) -> impl Iterator<Item = &QaPair> {
        self.history.iter().chain(std::iter::once(&self.last))
    }

    /// Format as a training record: the last pair becomes input/output.
    pub fn into_record(self, instruction: &str) -> ConversationRecord {
        let [input, output] = self.last;
        ConversationRecord {
            instruction: instruction.to_string(),
            input,
            output,
            history: self.history,
        }
    }
}

/// Per-tier draw counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounters([usize; TIER_COUNT]);

impl TierCounters {
    pub fn record(&mut self, tier: Tier) {
        self.0[tier.index()] += 1;
    }

    pub fn get(&self, tier: Tier) -> usize {
        self.0[tier.index()]
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    pub fn merge(&mut self, other: &TierCounters) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0) {
            *mine += theirs;
        }
    }

    /// Fraction of draws per tier (all zero when nothing was drawn)
    pub fn proportions(&self) -> [f64; TIER_COUNT] {
        let total = self.total();
        if total == 0 {
            return [0.0; TIER_COUNT];
        }
        self.0.map(|count| count as f64 / total as f64)
    }
}

impl fmt::Display for TierCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = Tier::ALL
            .iter()
            .zip(self.proportions())
            .map(|(tier, p)| format!("{}: {:.3}", tier, p))
            .collect();
        f.write_str(&parts.join(" | "))
    }
}

/// Result of a generation run
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub conversations: Vec<ConversationRecord>,
    pub counters: TierCounters,
}

/// Synthesizes conversations from a corpus
///
/// The corpus, presence matrix and composer are read-only after
/// construction; all per-dialogue state lives on the stack of
/// [`ConversationGenerator::dialogue`].
#[derive(Debug, Clone)]
pub struct ConversationGenerator<'a> {
    corpus: &'a Corpus,
    presence: PresenceMatrix,
    composer: WeightComposer,
    system_prompt: String,
    max_depth: usize,
    generate_times: usize,
    seed: Option<u64>,
    workers: usize,
}

impl<'a> ConversationGenerator<'a> {
    /// Validate `config` and build the presence matrix for `corpus`.
    pub fn new(corpus: &'a Corpus, config: &ChatgenConfig) -> Result<Self, GenerateError> {
        config.validate()?;
        let presence = PresenceMatrix::from_corpus(corpus)?;
        let generation = &config.generation;
        Ok(Self {
            corpus,
            presence,
            composer: WeightComposer::new(config.weighting.clone()),
            system_prompt: generation.effective_system_prompt().to_string(),
            max_depth: generation.max_depth,
            generate_times: generation.generate_times,
            seed: generation.seed,
            workers: generation.workers,
        })
    }

    pub fn presence(&self) -> &PresenceMatrix {
        &self.presence
    }

    pub fn composer(&self) -> &WeightComposer {
        &self.composer
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Walk one dialogue and return its path.
    ///
    /// `dialogue` only labels errors.
    pub fn walk<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        dialogue: usize,
        counters: &mut TierCounters,
    ) -> Result<DialoguePath, GenerateError> {
        let depth = rng.gen_range(1..=self.max_depth);
        let mut state = WalkState::Opening;

        let mut path = DialoguePath::new(self.step(rng, dialogue, 0, &mut state, counters)?);
        for round in 1..depth {
            path.push(self.step(rng, dialogue, round, &mut state, counters)?);
        }
        Ok(path)
    }

    /// Draw one round and advance `state` past it.
    fn step<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        dialogue: usize,
        round: usize,
        state: &mut WalkState,
        counters: &mut TierCounters,
    ) -> Result<QaPair, GenerateError> {
        let cell = self
            .draw(rng, round, *state)
            .map_err(|source| GenerateError::Distribution {
                dialogue,
                round,
                source,
            })?;
        let record = self.record_at(cell, dialogue, round)?;
        counters.record(cell.tier);
        *state = WalkState::after(cell);
        Ok(record.qa_pair())
    }

    fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        round: usize,
        state: WalkState,
    ) -> Result<Cell, DistributionError> {
        let weights = self
            .composer
            .compose(&self.presence, self.corpus, round, state)?;
        sample_cell(&weights, rng)
    }

    fn record_at(&self, cell: Cell, dialogue: usize, round: usize) -> Result<&Record, GenerateError> {
        self.corpus
            .record(cell)
            .ok_or(GenerateError::MissingRecord {
                dialogue,
                round,
                cell,
            })
    }

    /// Walk and format one conversation.
    pub fn dialogue<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        dialogue: usize,
        counters: &mut TierCounters,
    ) -> Result<ConversationRecord, GenerateError> {
        let path = self.walk(rng, dialogue, counters)?;
        Ok(path.into_record(&self.system_prompt))
    }

    /// Generate `count` conversations on the calling thread.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Result<GenerationOutput, GenerateError> {
        let mut output = GenerationOutput {
            conversations: Vec::with_capacity(count),
            counters: TierCounters::default(),
        };
        for dialogue in 0..count {
            let record = self.dialogue(rng, dialogue, &mut output.counters)?;
            output.conversations.push(record);
            log_progress(dialogue + 1, count);
        }
        Ok(output)
    }

    /// Generate `count` conversations across `workers` threads.
    ///
    /// Dialogue `i` runs on worker `i % workers`, each worker with its own
    /// generator seeded from `rng`. Output keeps dialogue order, so a fixed
    /// seed and worker count reproduce the same conversations. Progress is
    /// counted across all workers and logged through the caller's
    /// subscriber.
    pub fn generate_parallel<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        workers: usize,
    ) -> Result<GenerationOutput, GenerateError> {
        let workers = workers.clamp(1, count.max(1));
        if workers == 1 {
            return self.generate(rng, count);
        }
        let seeds: Vec<u64> = (0..workers).map(|_| rng.gen()).collect();
        let finished = AtomicUsize::new(0);
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());

        type Share = (Vec<(usize, ConversationRecord)>, TierCounters);
        let shares: Vec<Result<Share, GenerateError>> = crossbeam::thread::scope(|scope| {
            let finished = &finished;
            let dispatch = &dispatch;
            let handles: Vec<_> = seeds
                .iter()
                .enumerate()
                .map(|(worker, &seed)| {
                    scope.spawn(move |_| {
                        tracing::dispatcher::with_default(dispatch, || -> Result<Share, GenerateError> {
                            let mut rng = ChaCha8Rng::seed_from_u64(seed);
                            let mut counters = TierCounters::default();
                            let mut records = Vec::new();
                            for dialogue in (worker..count).step_by(workers) {
                                records.push((dialogue, self.dialogue(&mut rng, dialogue, &mut counters)?));
                                log_progress(finished.fetch_add(1, Ordering::Relaxed) + 1, count);
                            }
                            tracing::debug!(worker, dialogues = records.len(), "worker finished");
                            Ok((records, counters))
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(worker, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(GenerateError::WorkerPanicked(worker)))
                })
                .collect()
        })
        .map_err(|_| GenerateError::WorkerPanicked(0))?;

        let mut indexed = Vec::with_capacity(count);
        let mut counters = TierCounters::default();
        let mut first_error: Option<GenerateError> = None;
        for share in shares {
            match share {
                Ok((records, worker_counters)) => {
                    indexed.extend(records);
                    counters.merge(&worker_counters);
                }
                Err(err) => {
                    if first_error
                        .as_ref()
                        .map_or(true, |prev| dialogue_of(&err) < dialogue_of(prev))
                    {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        indexed.sort_by_key(|(dialogue, _)| *dialogue);
        Ok(GenerationOutput {
            conversations: indexed.into_iter().map(|(_, record)| record).collect(),
            counters,
        })
    }

    /// Run with the configured count, seed and worker count.
    pub fn run(&self) -> Result<GenerationOutput, GenerateError> {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        tracing::info!(
            dialogues = self.generate_times,
            max_depth = self.max_depth,
            workers = self.workers,
            seed = ?self.seed,
            "starting generation"
        );
        self.generate_parallel(&mut rng, self.generate_times, self.workers)
    }
}

/// Log every [`PROGRESS_INTERVAL`] finished dialogues.
fn log_progress(generated: usize, total: usize) {
    if generated % PROGRESS_INTERVAL == 0 {
        tracing::info!(generated, total, "generating conversations");
    }
}

fn dialogue_of(err: &GenerateError) -> usize {
    match err {
        GenerateError::Distribution { dialogue, .. }
        | GenerateError::MissingRecord { dialogue, .. } => *dialogue,
        _ => usize::MAX,
    }
}
