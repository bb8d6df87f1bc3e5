//! Weighted rarity selection.
//!
//! A [`RarityTable`] is an ascending list of cumulative upper bounds over
//! `[0, table_size)`. Bucket `i` covers `bounds[i-1] <= r < bounds[i]`, with
//! an implicit lower bound of zero for the first bucket. A value equal to a
//! cumulative bound therefore belongs to the next bucket.

use serde::Serialize;

use crate::errors::{MintError, MintResult};
use crate::oracle::RandomWord;
use crate::state::Category;

/// Table size used by the default policy.
pub const DEFAULT_TABLE_SIZE: u64 = 100;

/// Cumulative bounds of the default policy: 10% / 20% / 70%.
pub const DEFAULT_BOUNDS: [u64; 3] = [10, 30, DEFAULT_TABLE_SIZE];

/// One rarity bucket. `upper_bound` is cumulative and exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RarityBucket {
    pub upper_bound: u64,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RarityTable {
    buckets: Vec<RarityBucket>,
    table_size: u64,
}

impl RarityTable {
    /// Build a table from cumulative bounds. Categories are assigned by
    /// position (first bucket = category 0).
    ///
    /// Bounds must be strictly ascending and non-zero. Coverage of the full
    /// `[0, table_size)` range is checked separately by [`validate`](Self::validate)
    /// so that a short table can still be built and exercised.
    pub fn from_bounds(bounds: &[u64], table_size: u64) -> MintResult<Self> {
        if table_size == 0 {
            return Err(MintError::InvalidRarityTable("table size must be non-zero".into()));
        }
        if bounds.is_empty() {
            return Err(MintError::InvalidRarityTable("no buckets".into()));
        }

        let mut previous = 0u64;
        let mut buckets = Vec::with_capacity(bounds.len());
        for (index, &bound) in bounds.iter().enumerate() {
            if bound <= previous {
                return Err(MintError::InvalidRarityTable(format!(
                    "bound {bound} at position {index} does not exceed {previous}"
                )));
            }
            let category = u32::try_from(index)
                .map_err(|_| MintError::InvalidRarityTable("too many buckets".into()))?;
            buckets.push(RarityBucket {
                upper_bound: bound,
                category: Category(category),
            });
            previous = bound;
        }

        Ok(Self { buckets, table_size })
    }

    /// Build and validate in one step.
    pub fn new(bounds: &[u64], table_size: u64) -> MintResult<Self> {
        let table = Self::from_bounds(bounds, table_size)?;
        table.validate()?;
        Ok(table)
    }

    /// Check that the buckets cover exactly `[0, table_size)`.
    pub fn validate(&self) -> MintResult<()> {
        let last = self.buckets.last().map(|b| b.upper_bound).unwrap_or(0);
        if last < self.table_size {
            return Err(MintError::RangeExceeded {
                value: last,
                table_size: self.table_size,
            });
        }
        if last > self.table_size {
            return Err(MintError::InvalidRarityTable(format!(
                "final bound {last} exceeds table size {}",
                self.table_size
            )));
        }
        Ok(())
    }

    pub fn table_size(&self) -> u64 {
        self.table_size
    }

    pub fn buckets(&self) -> &[RarityBucket] {
        &self.buckets
    }

    pub fn category_count(&self) -> usize {
        self.buckets.len()
    }

    /// Reduce `word` modulo the table size and map the residue to a category.
    pub fn resolve(&self, word: &RandomWord) -> MintResult<Category> {
        self.resolve_modded(word.residue(self.table_size))
    }

    /// Map an already-reduced value to its category.
    pub fn resolve_modded(&self, value: u64) -> MintResult<Category> {
        if value >= self.table_size {
            return Err(MintError::RangeExceeded {
                value,
                table_size: self.table_size,
            });
        }
        self.buckets
            .iter()
            .find(|bucket| value < bucket.upper_bound)
            .map(|bucket| bucket.category)
            .ok_or(MintError::RangeExceeded {
                value,
                table_size: self.table_size,
            })
    }
}

impl Default for RarityTable {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BOUNDS
                .iter()
                .zip(0u32..)
                .map(|(&upper_bound, index)| RarityBucket {
                    upper_bound,
                    category: Category(index),
                })
                .collect(),
            table_size: DEFAULT_TABLE_SIZE,
        }
    }
}
