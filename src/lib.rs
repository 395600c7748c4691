//! PAL ABI metadata builder.
//!
//! After code generation, a GPU pipeline compiler describes the compiled
//! pipeline's hardware configuration to the driver: per-stage register
//! limits, resource usage and identifying hashes. [`ConfigBuilder`] collects
//! that description as a msgpack document plus a flat list of raw register
//! writes, and emits both as [`PalMetadataNotes`] once every stage has been
//! built.
//!
//! # Example
//! ```
//! use palmeta::prelude::*;
//!
//! let state = PipelineSnapshot::new(GfxIpVersion::new(10, 3, 0))
//!     .stage(ShaderStage::Vertex, 0xa)
//!     .stage(ShaderStage::Fragment, 0xb);
//! let mut notes: Option<PalMetadataNotes> = None;
//!
//! let mut builder = ConfigBuilder::new(&mut notes, &state);
//! builder.add_api_hw_shader_mapping(ShaderStage::Vertex, HwStageMask::VS)?;
//! builder.add_api_hw_shader_mapping(ShaderStage::Fragment, HwStageMask::PS)?;
//! builder.set_shader_hash(ShaderStage::Vertex)?;
//! builder.set_shader_hash(ShaderStage::Fragment)?;
//! builder.append_register(0x10, 0x20);
//! builder.write_pal_metadata()?;
//! drop(builder);
//!
//! assert_eq!(notes.map(|n| n.registers.len()), Some(1));
//! # Ok::<(), palmeta::ConfigError>(())
//! ```

// Lets the derive macro's `::palmeta` paths resolve inside this crate.
extern crate self as palmeta;

pub mod abi;
pub mod aggregate;
pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod register;
pub mod stage;

pub use builder::ConfigBuilder;
pub use config::{MetadataConfig, StageOwnership};
pub use document::{Document, Node, NodeId};
pub use error::{ConfigError, Result};
pub use palmeta_macros::PalMetadata;
pub use pipeline::{MetadataSink, PalMetadataNotes, PipelineSnapshot, PipelineState};
pub use register::{
    MetadataOnly, PalMetadataNoteEntry, RegisterConfig, INVALID_METADATA_KEY,
    INVALID_METADATA_VALUE,
};

pub mod prelude {
    pub use crate::abi::{
        GfxIpVersion, HardwareStage, HwStageMask, PipelineType, ShaderStage, ShaderStageMask,
    };
    pub use crate::{
        ConfigBuilder, ConfigError, MetadataConfig, MetadataSink, PalMetadata,
        PalMetadataNoteEntry, PalMetadataNotes, PipelineSnapshot, PipelineState, StageOwnership,
    };
}
