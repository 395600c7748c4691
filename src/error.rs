//! Error type shared by every builder operation.

use thiserror::Error;

use crate::abi::{HardwareStage, HwStageMask, ShaderStage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PAL metadata has already been written for this pipeline")]
    AlreadyFinalized,
    #[error("{api:?} is already mapped to {existing:?}, refusing remap to {requested:?}")]
    ConflictingMapping {
        api: ShaderStage,
        existing: HwStageMask,
        requested: HwStageMask,
    },
    #[error("hardware stage {hw:?} already belongs to {owner:?}, cannot add {requested:?}")]
    SharedHardwareStage {
        hw: HardwareStage,
        owner: ShaderStage,
        requested: ShaderStage,
    },
    #[error("{0:?} mapped to an empty hardware stage mask")]
    EmptyMapping(ShaderStage),
    #[error("invalid hardware stage index {0}")]
    InvalidHardwareStage(u32),
    #[error("invalid shader stage index {0}")]
    InvalidShaderStage(u32),
    #[error("{0} was updated after it had been finalized")]
    LatchFinalized(&'static str),
    #[error("Failed to encode metadata document: {0}")]
    Encode(String),
    #[error("Failed to decode metadata document: {0}")]
    Decode(String),
    #[error("Truncated note blob: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
