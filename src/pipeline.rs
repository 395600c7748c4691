//! Collaborators of the config builder.
//!
//! [`PipelineState`] is the read-only view of the pipeline being compiled.
//! [`MetadataSink`] is the module the finished notes get attached to.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::abi::{GfxIpVersion, ShaderStage, ShaderStageMask};
use crate::error::{ConfigError, Result};
use crate::register::PalMetadataNoteEntry;

/// Read-only queries against the pipeline being compiled.
pub trait PipelineState {
    fn has_shader_stage(&self, stage: ShaderStage) -> bool;

    fn gfx_ip_version(&self) -> GfxIpVersion;

    /// Hash of the API shader bound to `stage`.
    fn shader_hash(&self, stage: ShaderStage) -> u64;

    /// Packed floating-point control value for `stage`.
    fn floating_point_mode(&self, stage: ShaderStage) -> u32;
}

/// In-memory [`PipelineState`] built up with setters.
#[derive(Debug, Clone, Default)]
pub struct PipelineSnapshot {
    stages: ShaderStageMask,
    gfx_ip: GfxIpVersion,
    hashes: [u64; ShaderStage::NATIVE_COUNT],
    float_modes: [u32; ShaderStage::NATIVE_COUNT],
}

impl PipelineSnapshot {
    pub fn new(gfx_ip: GfxIpVersion) -> Self {
        Self {
            gfx_ip,
            ..Self::default()
        }
    }

    /// Add a stage with its shader hash.
    pub fn stage(mut self, stage: ShaderStage, hash: u64) -> Self {
        self.stages |= stage.mask();
        self.hashes[stage.index()] = hash;
        self
    }

    pub fn float_mode(mut self, stage: ShaderStage, mode: u32) -> Self {
        self.float_modes[stage.index()] = mode;
        self
    }

    pub fn stages(&self) -> ShaderStageMask {
        self.stages
    }
}

impl PipelineState for PipelineSnapshot {
    fn has_shader_stage(&self, stage: ShaderStage) -> bool {
        self.stages.contains(stage.mask())
    }

    fn gfx_ip_version(&self) -> GfxIpVersion {
        self.gfx_ip
    }

    fn shader_hash(&self, stage: ShaderStage) -> u64 {
        self.hashes[stage.index()]
    }

    fn floating_point_mode(&self, stage: ShaderStage) -> u32 {
        self.float_modes[stage.index()]
    }
}

/// Serialized PAL metadata: register writes plus the msgpack document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PalMetadataNotes {
    pub registers: Vec<PalMetadataNoteEntry>,
    pub document: Vec<u8>,
}

impl PalMetadataNotes {
    /// Encode as a single blob.
    ///
    /// ```text
    /// [u32_le count][(u32_le key, u32_le value) * count][u32_le length][msgpack document]
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer =
            Vec::with_capacity(8 + self.registers.len() * 8 + self.document.len());
        Self::write_into(&mut buffer, self)
            .map_err(|e| ConfigError::Encode(e.to_string()))?;
        Ok(buffer)
    }

    fn write_into(buffer: &mut Vec<u8>, notes: &Self) -> std::io::Result<()> {
        buffer.write_u32::<LittleEndian>(notes.registers.len() as u32)?;
        for entry in &notes.registers {
            buffer.write_u32::<LittleEndian>(entry.key)?;
            buffer.write_u32::<LittleEndian>(entry.value)?;
        }
        buffer.write_u32::<LittleEndian>(notes.document.len() as u32)?;
        buffer.write_all(&notes.document)
    }

    /// Decode a blob produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let count = read_u32(&mut cursor)? as usize;
        ensure_available(&cursor, count.saturating_mul(8))?;
        let mut registers = Vec::with_capacity(count);
        for _ in 0..count {
            let key = read_u32(&mut cursor)?;
            let value = read_u32(&mut cursor)?;
            registers.push(PalMetadataNoteEntry::new(key, value));
        }

        let length = read_u32(&mut cursor)? as usize;
        ensure_available(&cursor, length)?;
        let mut document = vec![0; length];
        cursor
            .read_exact(&mut document)
            .map_err(|e| ConfigError::Decode(e.to_string()))?;

        Ok(Self {
            registers,
            document,
        })
    }
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor
        .get_ref()
        .len()
        .saturating_sub(cursor.position() as usize)
}

fn ensure_available(cursor: &Cursor<&[u8]>, needed: usize) -> Result<()> {
    let available = remaining(cursor);
    if needed > available {
        return Err(ConfigError::Truncated { needed, available });
    }
    Ok(())
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    ensure_available(cursor, 4)?;
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| ConfigError::Decode(e.to_string()))
}

/// Receiver of the finished notes, typically the module being compiled.
pub trait MetadataSink {
    fn attach_pal_metadata(&mut self, notes: PalMetadataNotes);
}

impl MetadataSink for Vec<PalMetadataNotes> {
    fn attach_pal_metadata(&mut self, notes: PalMetadataNotes) {
        self.push(notes);
    }
}

impl MetadataSink for Option<PalMetadataNotes> {
    fn attach_pal_metadata(&mut self, notes: PalMetadataNotes) {
        *self = Some(notes);
    }
}
