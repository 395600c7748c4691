//! Enumerations and key names of the PAL pipeline ABI.
//!
//! The discriminants and the metadata key strings are part of the binary
//! contract with the driver, so they must not be reordered.

use std::fmt;

use crate::error::ConfigError;

/// Physical shader stages the GPU executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum HardwareStage {
    /// Local shader (vertex shader feeding tessellation)
    Ls = 0,
    /// Hull shader
    Hs = 1,
    /// Export shader (stage feeding geometry)
    Es = 2,
    /// Geometry shader
    Gs = 3,
    /// Vertex shader (last stage before rasterization)
    Vs = 4,
    /// Pixel shader
    Ps = 5,
    /// Compute shader
    Cs = 6,
}

impl HardwareStage {
    /// Number of hardware stages.
    pub const COUNT: usize = 7;

    pub const ALL: [HardwareStage; Self::COUNT] = [
        HardwareStage::Ls,
        HardwareStage::Hs,
        HardwareStage::Es,
        HardwareStage::Gs,
        HardwareStage::Vs,
        HardwareStage::Ps,
        HardwareStage::Cs,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Key of this stage inside `.hardware_stages`.
    pub fn metadata_name(self) -> &'static str {
        match self {
            HardwareStage::Ls => ".ls",
            HardwareStage::Hs => ".hs",
            HardwareStage::Es => ".es",
            HardwareStage::Gs => ".gs",
            HardwareStage::Vs => ".vs",
            HardwareStage::Ps => ".ps",
            HardwareStage::Cs => ".cs",
        }
    }

    pub fn mask(self) -> HwStageMask {
        HwStageMask::from_bits_retain(1 << self as u32)
    }
}

impl TryFrom<u32> for HardwareStage {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(ConfigError::InvalidHardwareStage(value))
    }
}

/// API-visible shader stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ShaderStage {
    Vertex = 0,
    TessControl = 1,
    TessEval = 2,
    Geometry = 3,
    Fragment = 4,
    Compute = 5,
}

impl ShaderStage {
    /// Number of native API stages (internal copy shaders are not included).
    pub const NATIVE_COUNT: usize = 6;

    pub const ALL: [ShaderStage; Self::NATIVE_COUNT] = [
        ShaderStage::Vertex,
        ShaderStage::TessControl,
        ShaderStage::TessEval,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Key of this stage inside `.shaders`.
    pub fn metadata_name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => ".vertex",
            ShaderStage::TessControl => ".hull",
            ShaderStage::TessEval => ".domain",
            ShaderStage::Geometry => ".geometry",
            ShaderStage::Fragment => ".pixel",
            ShaderStage::Compute => ".compute",
        }
    }

    pub fn mask(self) -> ShaderStageMask {
        ShaderStageMask::from_bits_retain(1 << self as u32)
    }
}

impl TryFrom<u32> for ShaderStage {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(ConfigError::InvalidShaderStage(value))
    }
}

bitflags::bitflags! {
    /// Set of hardware stages, one bit per [`HardwareStage`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HwStageMask: u32 {
        const LS = 1 << 0;
        const HS = 1 << 1;
        const ES = 1 << 2;
        const GS = 1 << 3;
        const VS = 1 << 4;
        const PS = 1 << 5;
        const CS = 1 << 6;
    }
}

impl HwStageMask {
    /// Hardware stages in this mask, in enumeration order.
    pub fn stages(self) -> impl Iterator<Item = HardwareStage> {
        HardwareStage::ALL
            .into_iter()
            .filter(move |stage| self.contains(stage.mask()))
    }
}

impl From<HardwareStage> for HwStageMask {
    fn from(stage: HardwareStage) -> Self {
        stage.mask()
    }
}

bitflags::bitflags! {
    /// Set of API shader stages, one bit per [`ShaderStage`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageMask: u32 {
        const VERTEX = 1 << 0;
        const TESS_CONTROL = 1 << 1;
        const TESS_EVAL = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
    }
}

impl ShaderStageMask {
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |stage| self.contains(stage.mask()))
    }
}

impl From<ShaderStage> for ShaderStageMask {
    fn from(stage: ShaderStage) -> Self {
        stage.mask()
    }
}

/// Hardware pipeline configuration the driver must program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineType {
    #[default]
    VsPs,
    Gs,
    Cs,
    Ngg,
    Tess,
    GsTess,
    NggTess,
}

impl PipelineType {
    pub fn metadata_name(self) -> &'static str {
        match self {
            PipelineType::VsPs => "VsPs",
            PipelineType::Gs => "Gs",
            PipelineType::Cs => "Cs",
            PipelineType::Ngg => "Ngg",
            PipelineType::Tess => "Tess",
            PipelineType::GsTess => "GsTess",
            PipelineType::NggTess => "NggTess",
        }
    }
}

/// Graphics IP version triple of the target GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GfxIpVersion {
    pub major: u32,
    pub minor: u32,
    pub stepping: u32,
}

impl GfxIpVersion {
    pub const fn new(major: u32, minor: u32, stepping: u32) -> Self {
        Self {
            major,
            minor,
            stepping,
        }
    }
}

impl fmt::Display for GfxIpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gfx{}.{}.{}", self.major, self.minor, self.stepping)
    }
}

/// Metadata key strings.
pub mod keys {
    pub const VERSION: &str = "amdpal.version";
    pub const PIPELINES: &str = "amdpal.pipelines";

    // Pipeline
    pub const HARDWARE_STAGES: &str = ".hardware_stages";
    pub const SHADERS: &str = ".shaders";
    pub const INTERNAL_PIPELINE_HASH: &str = ".internal_pipeline_hash";
    pub const USER_DATA_LIMIT: &str = ".user_data_limit";
    pub const SPILL_THRESHOLD: &str = ".spill_threshold";
    pub const API: &str = ".api";
    pub const TYPE: &str = ".type";
    pub const USES_VIEWPORT_ARRAY_INDEX: &str = ".uses_viewport_array_index";
    pub const CALC_WAVE_BREAK_SIZE_AT_DRAW_TIME: &str = ".calc_wave_break_size_at_draw_time";
    pub const ES_GS_LDS_SIZE: &str = ".es_gs_lds_size";

    // API shader
    pub const API_SHADER_HASH: &str = ".api_shader_hash";
    pub const HARDWARE_MAPPING: &str = ".hardware_mapping";
    pub const FLOAT_MODE: &str = ".float_mode";

    // Hardware stage
    pub const SGPR_LIMIT: &str = ".sgpr_limit";
    pub const VGPR_LIMIT: &str = ".vgpr_limit";
    pub const WAVEFRONT_SIZE: &str = ".wavefront_size";
    pub const LDS_SIZE: &str = ".lds_size";
    pub const API_SHADERS: &str = ".api_shaders";
    pub const USES_UAVS: &str = ".uses_uavs";
    pub const WRITES_UAVS: &str = ".writes_uavs";
    pub const WRITES_DEPTH: &str = ".writes_depth";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_stage_round_trips_through_index() {
        for stage in HardwareStage::ALL {
            assert_eq!(HardwareStage::try_from(stage as u32), Ok(stage));
        }
        assert_eq!(
            HardwareStage::try_from(7),
            Err(ConfigError::InvalidHardwareStage(7))
        );
    }

    #[test]
    fn shader_stage_rejects_out_of_range() {
        assert_eq!(
            ShaderStage::try_from(6),
            Err(ConfigError::InvalidShaderStage(6))
        );
        assert_eq!(ShaderStage::try_from(4), Ok(ShaderStage::Fragment));
    }

    #[test]
    fn hw_mask_iterates_in_enum_order() {
        let mask = HwStageMask::VS | HwStageMask::GS;
        let stages: Vec<_> = mask.stages().collect();
        assert_eq!(stages, vec![HardwareStage::Gs, HardwareStage::Vs]);
    }

    #[test]
    fn stage_masks_match_flag_constants() {
        assert_eq!(HardwareStage::Ps.mask(), HwStageMask::PS);
        assert_eq!(HardwareStage::Cs.mask(), HwStageMask::CS);
        assert_eq!(ShaderStage::Geometry.mask(), ShaderStageMask::GEOMETRY);
        assert_eq!(ShaderStage::Compute.mask(), ShaderStageMask::COMPUTE);
    }

    #[test]
    fn gfx_ip_display() {
        assert_eq!(GfxIpVersion::new(10, 3, 0).to_string(), "gfx10.3.0");
    }
}
