//! Worklist ownership for a single shard

use crate::config::ShardConfig;
use std::fmt;

/// The slice of the worklist one shard process is responsible for
///
/// Index `i` is owned iff `range_start <= i <= range_end` and
/// `i % shard_step == shard_index`. For a fixed step, the assignments for every
/// `shard_index` in `[0, shard_step)` partition the range: each index has exactly one
/// owner, which is what lets shards run with no coordination between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardAssignment {
    pub shard_index: u32,
    pub shard_step: u32,
    pub range_start: usize,
    /// Inclusive upper bound; unbounded when `None`
    pub range_end: Option<usize>,
}

impl ShardAssignment {
    /// Creates an assignment
    ///
    /// A zero step is treated as a single shard so `owns` never divides by zero;
    /// configuration validation rejects it before this point in practice.
    pub fn new(shard_index: u32, shard_step: u32, range_start: usize, range_end: Option<usize>) -> Self {
        Self {
            shard_index,
            shard_step: shard_step.max(1),
            range_start,
            range_end,
        }
    }

    /// Builds the assignment described by the `[shard]` config section
    pub fn from_config(config: &ShardConfig) -> Self {
        Self::new(
            config.index,
            config.step,
            config.start_index,
            config.end_index,
        )
    }

    /// Returns true if `index` falls inside `[range_start, range_end]`
    pub fn in_range(&self, index: usize) -> bool {
        index >= self.range_start && self.range_end.map_or(true, |end| index <= end)
    }

    /// Returns true if this shard owns `index`
    pub fn owns(&self, index: usize) -> bool {
        self.in_range(index) && index % self.shard_step as usize == self.shard_index as usize
    }

    /// Iterates the owned indices of a worklist with `len` items, ascending
    pub fn owned_indices(&self, len: usize) -> impl Iterator<Item = usize> + '_ {
        (0..len).filter(move |&index| self.owns(index))
    }

    /// Counts the owned indices of a worklist with `len` items
    pub fn owned_count(&self, len: usize) -> usize {
        self.owned_indices(len).count()
    }
}

impl fmt::Display for ShardAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range_end {
            Some(end) => write!(
                f,
                "shard {}/{} over [{}, {}]",
                self.shard_index, self.shard_step, self.range_start, end
            ),
            None => write!(
                f,
                "shard {}/{} from {}",
                self.shard_index, self.shard_step, self.range_start
            ),
        }
    }
}
