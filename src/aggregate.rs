//! Pipeline-wide aggregates.
//!
//! The user-data limit, spill threshold and pipeline hash are fed by many
//! per-stage calls but written to the document exactly once. Each is held in
//! a [`Latch`] that moves `Unset -> Accumulating -> Finalized` and never
//! reopens.

use crate::error::{ConfigError, Result};

/// Single-shot accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latch<T> {
    #[default]
    Unset,
    Accumulating(T),
    Finalized(T),
}

impl<T: Copy> Latch<T> {
    /// Merge `value` into the running state with `merge`.
    pub fn update(
        &mut self,
        name: &'static str,
        value: T,
        merge: impl FnOnce(T, T) -> T,
    ) -> Result<()> {
        *self = match *self {
            Latch::Unset => Latch::Accumulating(value),
            Latch::Accumulating(current) => Latch::Accumulating(merge(current, value)),
            Latch::Finalized(_) => return Err(ConfigError::LatchFinalized(name)),
        };
        Ok(())
    }

    /// Close the latch, yielding the accumulated value or `default`.
    pub fn finalize(&mut self, name: &'static str, default: T) -> Result<T> {
        let value = match *self {
            Latch::Unset => default,
            Latch::Accumulating(value) => value,
            Latch::Finalized(_) => return Err(ConfigError::LatchFinalized(name)),
        };
        *self = Latch::Finalized(value);
        Ok(value)
    }

    pub fn current(&self) -> Option<T> {
        match *self {
            Latch::Unset => None,
            Latch::Accumulating(value) | Latch::Finalized(value) => Some(value),
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Latch::Finalized(_))
    }
}

/// Mix a stage hash before folding so that equal or correlated stage hashes
/// do not cancel out.
fn mix(hash: u64) -> u64 {
    // splitmix64 finalizer
    let mut z = hash.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Fold one stage hash into a running pipeline hash.
///
/// Wrapping addition of mixed values is commutative and associative, so the
/// result does not depend on the order stages are visited in.
pub fn fold_hash(acc: u64, stage_hash: u64) -> u64 {
    acc.wrapping_add(mix(stage_hash))
}

/// Values flushed to the document at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedAggregates {
    pub user_data_limit: u32,
    pub spill_threshold: u32,
    pub pipeline_hash: u64,
}

#[derive(Debug, Default, Clone)]
pub struct PipelineAggregator {
    user_data_limit: Latch<u32>,
    spill_threshold: Latch<u32>,
    pipeline_hash: Latch<u64>,
}

impl PipelineAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_user_data_limit(&mut self, value: u32) -> Result<()> {
        self.user_data_limit
            .update("user data limit", value, u32::max)
    }

    pub fn update_spill_threshold(&mut self, value: u32) -> Result<()> {
        self.spill_threshold
            .update("spill threshold", value, u32::max)
    }

    pub fn fold_shader_hash(&mut self, stage_hash: u64) -> Result<()> {
        self.pipeline_hash
            .update("pipeline hash", mix(stage_hash), u64::wrapping_add)
    }

    pub fn user_data_limit(&self) -> Option<u32> {
        self.user_data_limit.current()
    }

    pub fn spill_threshold(&self) -> Option<u32> {
        self.spill_threshold.current()
    }

    pub fn pipeline_hash(&self) -> Option<u64> {
        self.pipeline_hash.current()
    }

    pub fn is_finalized(&self) -> bool {
        self.pipeline_hash.is_finalized()
    }

    /// Close all three latches.
    ///
    /// Nothing is changed when an error is returned.
    pub fn finalize(&mut self, default_spill_threshold: u32) -> Result<FinalizedAggregates> {
        if self.user_data_limit.is_finalized()
            || self.spill_threshold.is_finalized()
            || self.pipeline_hash.is_finalized()
        {
            return Err(ConfigError::AlreadyFinalized);
        }

        let aggregates = FinalizedAggregates {
            user_data_limit: self.user_data_limit.finalize("user data limit", 0)?,
            spill_threshold: self
                .spill_threshold
                .finalize("spill threshold", default_spill_threshold)?,
            pipeline_hash: self.pipeline_hash.finalize("pipeline hash", 0)?,
        };
        log::debug!(
            "Finalized pipeline aggregates: user data limit {}, spill threshold {:#x}, hash {:#018x}",
            aggregates.user_data_limit,
            aggregates.spill_threshold,
            aggregates.pipeline_hash
        );
        Ok(aggregates)
    }
}
