use palmeta::prelude::*;
use palmeta::{RegisterConfig, INVALID_METADATA_KEY};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, PalMetadata)]
struct LsHsRegs {
    spi_shader_pgm_rsrc1_hs: PalMetadataNoteEntry,
    spi_shader_pgm_rsrc2_hs: PalMetadataNoteEntry,
    vgt_tf_param: PalMetadataNoteEntry,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, PalMetadata)]
struct PipelineRegs(LsHsRegs, [PalMetadataNoteEntry; 2]);

impl Default for LsHsRegs {
    fn default() -> Self {
        Self {
            spi_shader_pgm_rsrc1_hs: PalMetadataNoteEntry::INVALID,
            spi_shader_pgm_rsrc2_hs: PalMetadataNoteEntry::INVALID,
            vgt_tf_param: PalMetadataNoteEntry::INVALID,
        }
    }
}

#[test]
fn derived_struct_appends_only_set_registers() {
    let mut regs = LsHsRegs::default();
    regs.spi_shader_pgm_rsrc1_hs = PalMetadataNoteEntry::new(0x2d0a, 0x00af_0000);
    regs.vgt_tf_param = PalMetadataNoteEntry::new(0xa2db, 0x5);

    let mut config = RegisterConfig::new();
    config.append_struct(&regs);

    assert_eq!(
        config.entries(),
        &[
            PalMetadataNoteEntry::new(0x2d0a, 0x00af_0000),
            PalMetadataNoteEntry::new(0xa2db, 0x5),
        ]
    );
}

#[test]
fn builder_accepts_nested_tuple_struct() {
    let regs = PipelineRegs(
        LsHsRegs::default(),
        [
            PalMetadataNoteEntry::new(0x2c0a, 1),
            PalMetadataNoteEntry::new(INVALID_METADATA_KEY, 7),
        ],
    );

    let state = PipelineSnapshot::new(GfxIpVersion::new(9, 0, 0));
    let mut notes: Option<PalMetadataNotes> = None;
    {
        let mut builder = ConfigBuilder::new(&mut notes, &state);
        builder.append_struct(&regs);
        assert_eq!(builder.registers().len(), 1);
        builder.write_pal_metadata().unwrap();
    }

    assert_eq!(
        notes.unwrap().registers,
        vec![PalMetadataNoteEntry::new(0x2c0a, 1)]
    );
}
