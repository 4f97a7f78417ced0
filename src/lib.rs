//! Chatgen - Synthetic Conversation Generator
//!
//! Builds multi-turn training conversations from a corpus of question/answer
//! records split into four role tiers (A, B, C and the terminal tier Z).
//!
//! # How a conversation is sampled
//!
//! Every dialogue draws a random depth, then walks that many rounds. Each
//! round builds a fresh probability distribution over every record and
//! samples one:
//!
//! - **Tier prior**: opening weights on the first round, afterwards the
//!   transition prior row of the previous tier
//! - **Repeat penalty**: the previous record is scaled down
//! - **Follow-up reward**: children of the previous record (records whose
//!   parent id is its id) are scaled up; a leaf boosts its own tier instead
//! - **Closing pressure**: past a round threshold the terminal tier is boosted
//!
//! Drawing from tier Z clears the walk's history; the dialogue itself
//! continues until its depth is used up.
//!
//! # Example
//!
//! ```rust
//! use chatgen::{ChatgenConfig, ConversationGenerator, Corpus, Record};
//!
//! let corpus = Corpus::new([
//!     vec![Record::new("greet", "", "Hello?", "Hi, how can I help?")],
//!     vec![Record::new("hours", "greet", "When do you open?", "At nine.")],
//!     vec![Record::new("late", "hours", "And on Sundays?", "At eleven.")],
//!     vec![Record::new("bye", "", "Thanks!", "You're welcome.")],
//! ]);
//!
//! let mut config = ChatgenConfig::default();
//! config.generation.generate_times = 5;
//! config.generation.max_depth = 3;
//! config.generation.seed = Some(7);
//!
//! let output = ConversationGenerator::new(&corpus, &config)
//!     .unwrap()
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(output.conversations.len(), 5);
//! assert!(output.conversations.iter().all(|c| c.history.len() < 3));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Corpus rows    │  JSON / JSONL (dataset)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Presence matrix │  built once (matrix)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐      ┌─────────────┐
//! │ Weight composer │ ───▶ │   Sampler   │  per round
//! └─────────────────┘      └──────┬──────┘
//!          ▲                      │
//!          └──── walk state ──────┘
//!          ▼
//! ┌─────────────────┐
//! │  Conversations  │  JSON / JSONL (export)
//! └─────────────────┘
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod conversation;
pub mod corpus;
pub mod dataset;
pub mod export;
pub mod matrix;
pub mod report;
pub mod sampler;
pub mod weighting;

// Re-export commonly used types
pub use config::{ChatgenConfig, ConfigError, GenerationConfig, WeightingConfig};
pub use conversation::{
    ConversationGenerator, ConversationRecord, DialoguePath, GenerateError, GenerationOutput,
    QaPair, TierCounters,
};
pub use corpus::{Cell, Corpus, CorpusError, Record, Tier, TIER_COUNT};
pub use dataset::{load_corpus, DatasetError};
pub use export::{write_conversations, write_json, write_jsonl, ExportError, ExportFormat};
pub use matrix::{DistributionError, PresenceMatrix, WeightMatrix};
pub use sampler::sample_cell;
pub use weighting::{TransitionPrior, WalkState, WeightComposer};
