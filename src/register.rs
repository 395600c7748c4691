//! Flat register configuration list.
//!
//! Raw hardware register writes travel next to the structured document as an
//! ordered list of `(key, value)` pairs. Register-layout structs built from
//! [`PalMetadataNoteEntry`] fields can be appended whole through
//! [`RegisterConfig::append_struct`], provided they derive
//! [`PalMetadata`](crate::PalMetadata).

use std::mem::size_of;

/// Key marking an entry that must not be exported.
pub const INVALID_METADATA_KEY: u32 = 0xFFFF_FFFF;
/// Value paired with [`INVALID_METADATA_KEY`] in unused register slots.
pub const INVALID_METADATA_VALUE: u32 = 0xBAAD_BEEF;

/// A single register write.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PalMetadataNoteEntry {
    pub key: u32,
    pub value: u32,
}

impl PalMetadataNoteEntry {
    pub const INVALID: Self = Self {
        key: INVALID_METADATA_KEY,
        value: INVALID_METADATA_VALUE,
    };

    pub const fn new(key: u32, value: u32) -> Self {
        Self { key, value }
    }

    /// Whether this entry is a real register write.
    pub fn is_valid(&self) -> bool {
        self.key != INVALID_METADATA_KEY
    }
}

impl Default for PalMetadataNoteEntry {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Marker for types whose memory is nothing but [`PalMetadataNoteEntry`]
/// values.
///
/// # Safety
///
/// The implementing type must be `#[repr(C)]` and consist solely of
/// `PalMetadataNoteEntry` fields (directly, in arrays, or in nested
/// `MetadataOnly` structs), so that it can be viewed as a slice of entries.
/// Use `#[derive(PalMetadata)]` rather than implementing this by hand.
pub unsafe trait MetadataOnly: bytemuck::Pod {}

unsafe impl MetadataOnly for PalMetadataNoteEntry {}

unsafe impl<T: MetadataOnly, const N: usize> MetadataOnly for [T; N] {}

/// Ordered, append-only list of register writes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterConfig {
    entries: Vec<PalMetadataNoteEntry>,
}

impl RegisterConfig {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(128),
        }
    }

    /// Append entries in order, dropping invalid slots.
    pub fn append(&mut self, config: &[PalMetadataNoteEntry]) {
        for entry in config {
            self.push(*entry);
        }
    }

    /// Append a single register write.
    pub fn append_register(&mut self, key: u32, value: u32) {
        self.push(PalMetadataNoteEntry::new(key, value));
    }

    /// Append every entry of a register-layout struct.
    pub fn append_struct<T: MetadataOnly>(&mut self, config: &T) {
        const {
            assert!(
                size_of::<T>() % size_of::<PalMetadataNoteEntry>() == 0,
                "type claims to be metadata-only, but its size contradicts that"
            );
        }
        self.append(bytemuck::cast_slice(std::slice::from_ref(config)));
    }

    fn push(&mut self, entry: PalMetadataNoteEntry) {
        if entry.is_valid() {
            self.entries.push(entry);
        } else {
            log::trace!("Dropping unused register slot {:#x}", entry.value);
        }
    }

    pub fn entries(&self) -> &[PalMetadataNoteEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PalMetadataNoteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
