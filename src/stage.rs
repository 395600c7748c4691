//! Mapping between API shader stages and the hardware stages they lower to.
//!
//! One API stage may occupy several hardware stages (a geometry shader runs
//! on GS plus a VS copy shader). Whether a hardware stage may receive more
//! than one API stage is decided by [`StageOwnership`]. When several API
//! stages share a hardware stage, the lowest [`ShaderStage`] among them is
//! its owner, whatever order the mappings arrived in.

use crate::abi::{HardwareStage, HwStageMask, ShaderStage, ShaderStageMask};
use crate::config::StageOwnership;
use crate::error::{ConfigError, Result};

/// Outcome of registering a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingChange {
    /// The mapping is new.
    Added,
    /// The identical mapping was already recorded.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct StageMapper {
    ownership: StageOwnership,
    /// Hardware stages per API stage
    api_to_hw: [Option<HwStageMask>; ShaderStage::NATIVE_COUNT],
    /// Contributing API stages per hardware stage
    hw_to_api: [ShaderStageMask; HardwareStage::COUNT],
}

impl StageMapper {
    pub fn new(ownership: StageOwnership) -> Self {
        Self {
            ownership,
            api_to_hw: [None; ShaderStage::NATIVE_COUNT],
            hw_to_api: [ShaderStageMask::empty(); HardwareStage::COUNT],
        }
    }

    /// Record that `api` lowers to the hardware stages in `hw_stages`.
    ///
    /// Nothing is changed when an error is returned.
    pub fn add_mapping(&mut self, api: ShaderStage, hw_stages: HwStageMask) -> Result<MappingChange> {
        if hw_stages.is_empty() {
            return Err(ConfigError::EmptyMapping(api));
        }

        if let Some(existing) = self.api_to_hw[api.index()] {
            if existing == hw_stages {
                return Ok(MappingChange::Unchanged);
            }
            return Err(ConfigError::ConflictingMapping {
                api,
                existing,
                requested: hw_stages,
            });
        }

        for hw in hw_stages.stages() {
            if let Some(owner) = self.owner(hw) {
                match self.ownership {
                    StageOwnership::Exclusive => {
                        return Err(ConfigError::SharedHardwareStage {
                            hw,
                            owner,
                            requested: api,
                        });
                    }
                    StageOwnership::Shared => {
                        log::warn!("{:?} shares hardware stage {:?} with {:?}", api, hw, owner);
                    }
                }
            }
        }

        self.api_to_hw[api.index()] = Some(hw_stages);
        for hw in hw_stages.stages() {
            self.hw_to_api[hw.index()] |= api.mask();
        }

        Ok(MappingChange::Added)
    }

    /// Hardware stages `api` lowers to, if mapped.
    pub fn hw_stages(&self, api: ShaderStage) -> Option<HwStageMask> {
        self.api_to_hw[api.index()]
    }

    /// API stage owning `hw`: the lowest contributing stage, if any.
    pub fn owner(&self, hw: HardwareStage) -> Option<ShaderStage> {
        self.hw_to_api[hw.index()].stages().next()
    }

    /// Every API stage contributing to `hw`.
    pub fn contributors(&self, hw: HardwareStage) -> ShaderStageMask {
        self.hw_to_api[hw.index()]
    }

    /// Union of every mapped hardware stage.
    pub fn mapped_hw_stages(&self) -> HwStageMask {
        self.api_to_hw
            .iter()
            .flatten()
            .fold(HwStageMask::empty(), |acc, mask| acc | *mask)
    }
}

impl Default for StageMapper {
    fn default() -> Self {
        Self::new(StageOwnership::default())
    }
}
