//! Builder configuration.

/// Policy for hardware stages that more than one API stage lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageOwnership {
    /// Each hardware stage belongs to exactly one API stage; a second
    /// claimant is a configuration error.
    #[default]
    Exclusive,
    /// Merged hardware stages are allowed. Every claimant is recorded as a
    /// contributor and the lowest API stage among them is the owner.
    Shared,
}

/// Settings fixed for the lifetime of a [`ConfigBuilder`](crate::ConfigBuilder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataConfig {
    /// PAL metadata ABI version written as `amdpal.version`
    pub abi_version: (u32, u32),
    pub stage_ownership: StageOwnership,
    /// Spill threshold written when no stage reported one
    pub default_spill_threshold: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            abi_version: (2, 3),
            stage_ownership: StageOwnership::Exclusive,
            default_spill_threshold: u32::MAX,
        }
    }
}

impl MetadataConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abi_version(mut self, major: u32, minor: u32) -> Self {
        self.abi_version = (major, minor);
        self
    }

    pub fn stage_ownership(mut self, ownership: StageOwnership) -> Self {
        self.stage_ownership = ownership;
        self
    }

    pub fn default_spill_threshold(mut self, value: u32) -> Self {
        self.default_spill_threshold = value;
        self
    }
}
