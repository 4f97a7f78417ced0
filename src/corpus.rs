//! Tiered question/answer corpus
//!
//! A corpus is exactly four ordered tiers (A, B, C, Z). Each tier holds
//! records in source order; a record's position inside its tier is its
//! slot. Z is the terminal tier.
//!
//! Parent/child links are resolved once at construction into an
//! `id -> child cells` index, so lookups during sampling are O(1).

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Number of tiers in every corpus
pub const TIER_COUNT: usize = 4;

/// Corpus construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("tier {0} has no records")]
    EmptyTier(Tier),
}

/// Conversation role level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    A,
    B,
    C,
    /// Terminal tier; drawing from it resets the walk's history
    Z,
}

impl Tier {
    /// All tiers in row order
    pub const ALL: [Tier; TIER_COUNT] = [Tier::A, Tier::B, Tier::C, Tier::Z];

    /// The terminal tier
    pub const TERMINAL: Tier = Tier::Z;

    /// Row index of this tier
    pub fn index(self) -> usize {
        match self {
            Tier::A => 0,
            Tier::B => 1,
            Tier::C => 2,
            Tier::Z => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parse a level label (`"a"`, `" Z "`, ...)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            "Z" => Some(Tier::Z),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::Z => "Z",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A (tier, slot) coordinate in the presence / weight matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub tier: Tier,
    pub slot: usize,
}

impl Cell {
    pub fn new(tier: Tier, slot: usize) -> Self {
        Self { tier, slot }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.tier, self.slot)
    }
}

/// One question/answer entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Unique identifier
    pub id: String,
    /// Identifier of the record this one follows up on (empty = none)
    pub parent_id: String,
    pub question: String,
    pub answer: String,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// The `[question, answer]` pair appended to a dialogue path
    pub fn qa_pair(&self) -> [String; 2] {
        [self.question.clone(), self.answer.clone()]
    }

    pub fn has_parent(&self) -> bool {
        !self.parent_id.is_empty()
    }
}

/// Four tiers of records plus the resolved child index
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    tiers: [Vec<Record>; TIER_COUNT],
    children: HashMap<String, Vec<Cell>>,
}

impl Corpus {
    /// Build a corpus from per-tier record lists (A, B, C, Z order).
    ///
    /// Empty tiers are accepted here; they are rejected when the
    /// presence matrix is built.
    pub fn new(tiers: [Vec<Record>; TIER_COUNT]) -> Self {
        let mut children: HashMap<String, Vec<Cell>> = HashMap::new();
        for tier in Tier::ALL {
            for (slot, record) in tiers[tier.index()].iter().enumerate() {
                if record.has_parent() {
                    children
                        .entry(record.parent_id.clone())
                        .or_default()
                        .push(Cell::new(tier, slot));
                }
            }
        }
        Self { tiers, children }
    }

    /// Records of one tier
    pub fn tier(&self, tier: Tier) -> &[Record] {
        &self.tiers[tier.index()]
    }

    pub fn record(&self, cell: Cell) -> Option<&Record> {
        self.tiers[cell.tier.index()].get(cell.slot)
    }

    /// Cells of every record whose `parent_id` is the id of the record at
    /// `cell`, in (tier, slot) order. Empty for leaves and unknown cells.
    pub fn children_of(&self, cell: Cell) -> &[Cell] {
        self.record(cell)
            .and_then(|record| self.children.get(&record.id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_leaf(&self, cell: Cell) -> bool {
        self.children_of(cell).is_empty()
    }

    /// Length of the longest tier (the matrix width)
    pub fn max_tier_len(&self) -> usize {
        self.tiers.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail with [`CorpusError::EmptyTier`] on the first empty tier
    pub fn ensure_populated(&self) -> Result<(), CorpusError> {
        match Tier::ALL.into_iter().find(|t| self.tier(*t).is_empty()) {
            Some(tier) => Err(CorpusError::EmptyTier(tier)),
            None => Ok(()),
        }
    }

    /// Iterate over every record with its cell
    pub fn cells(&self) -> impl Iterator<Item = (Cell, &Record)> {
        Tier::ALL.into_iter().flat_map(move |tier| {
            self.tier(tier)
                .iter()
                .enumerate()
                .map(move |(slot, record)| (Cell::new(tier, slot), record))
        })
    }

    /// Records whose parent id matches no record in the corpus
    pub fn orphans(&self) -> Vec<Cell> {
        let ids: std::collections::HashSet<&str> =
            self.cells().map(|(_, r)| r.id.as_str()).collect();
        self.cells()
            .filter(|(_, r)| r.has_parent() && !ids.contains(r.parent_id.as_str()))
            .map(|(cell, _)| cell)
            .collect()
    }
}
