//! Human-readable run reports

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt::Write;

use crate::conversation::{ConversationRecord, TierCounters};
use crate::corpus::{Corpus, Tier, TIER_COUNT};

const RULE: &str = "---------";

/// `Levels reach total:  A: 0.512 | B: ...`
pub fn summary_line(counters: &TierCounters) -> String {
    format!("Levels reach total:  {}", counters)
}

/// Render one conversation as a Q/A transcript.
pub fn render_conversation(record: &ConversationRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Instructions: {}", record.instruction);
    let _ = writeln!(out, "{}", RULE);
    for [question, answer] in &record.history {
        let _ = writeln!(out, "Q: {}\nA: {}", question, answer);
    }
    let _ = writeln!(out, "Q: {}\nA: {}", record.input, record.output);
    let _ = writeln!(out, "{}", RULE);
    let _ = write!(out, "Total Rounds: {}", record.rounds());
    out
}

/// Pick a random conversation and render it.
pub fn sample_conversation<R: Rng + ?Sized>(
    conversations: &[ConversationRecord],
    rng: &mut R,
) -> Option<String> {
    conversations.choose(rng).map(render_conversation)
}

/// Shape of a loaded corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    pub tier_sizes: [usize; TIER_COUNT],
    pub max_tier_len: usize,
    pub leaves: usize,
    /// Records whose parent id does not resolve
    pub orphans: usize,
}

impl CorpusStats {
    pub fn collect(corpus: &Corpus) -> Self {
        Self {
            tier_sizes: Tier::ALL.map(|t| corpus.tier(t).len()),
            max_tier_len: corpus.max_tier_len(),
            leaves: corpus.cells().filter(|(cell, _)| corpus.is_leaf(*cell)).count(),
            orphans: corpus.orphans().len(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for tier in Tier::ALL {
            let _ = writeln!(out, "  Tier {}: {} records", tier, self.tier_sizes[tier.index()]);
        }
        let _ = writeln!(out, "  Matrix width: {}", self.max_tier_len);
        let _ = writeln!(out, "  Leaf records: {}", self.leaves);
        let _ = write!(out, "  Unresolved parents: {}", self.orphans);
        out
    }
}
