use palmeta::abi::keys;
use palmeta::aggregate::fold_hash;
use palmeta::prelude::*;
use palmeta::{Document, NodeId, INVALID_METADATA_KEY, INVALID_METADATA_VALUE};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn vs_ps_state() -> PipelineSnapshot {
    PipelineSnapshot::new(GfxIpVersion::new(10, 3, 0))
        .stage(ShaderStage::Vertex, 0xA)
        .stage(ShaderStage::Fragment, 0xB)
}

fn build_vertex(builder: &mut ConfigBuilder<'_>) {
    builder
        .add_api_hw_shader_mapping(ShaderStage::Vertex, HwStageMask::VS)
        .unwrap();
    builder.set_shader_hash(ShaderStage::Vertex).unwrap();
    builder.set_num_avail_sgprs(HardwareStage::Vs, 4);
}

fn build_fragment(builder: &mut ConfigBuilder<'_>) {
    builder
        .add_api_hw_shader_mapping(ShaderStage::Fragment, HwStageMask::PS)
        .unwrap();
    builder.set_shader_hash(ShaderStage::Fragment).unwrap();
    builder.set_num_avail_sgprs(HardwareStage::Ps, 8);
}

fn build_vs_ps(state: &PipelineSnapshot, fragment_first: bool) -> PalMetadataNotes {
    let mut notes: Option<PalMetadataNotes> = None;
    {
        let mut builder = ConfigBuilder::new(&mut notes, state);
        builder.set_api_name("Vulkan");
        builder.set_pipeline_type(PipelineType::VsPs);

        if fragment_first {
            build_fragment(&mut builder);
            build_vertex(&mut builder);
        } else {
            build_vertex(&mut builder);
            build_fragment(&mut builder);
        }

        builder.append_register(INVALID_METADATA_KEY, INVALID_METADATA_VALUE);
        builder.append_register(0x10, 0x20);
        builder.append_config(&[PalMetadataNoteEntry::INVALID]);
        builder.write_pal_metadata().unwrap();
    }
    notes.expect("notes attached to module")
}

fn pipeline(doc: &Document) -> NodeId {
    let pipelines = doc.get(doc.root(), keys::PIPELINES).unwrap();
    doc.element(pipelines, 0).unwrap()
}

fn uint(doc: &Document, start: NodeId, path: &[&str]) -> u64 {
    let id = doc.find(start, path).unwrap();
    doc.node(id).as_uint().unwrap()
}

#[test]
fn vertex_fragment_pipeline_serializes_expected_document() {
    init_logging();
    let state = vs_ps_state();
    let notes = build_vs_ps(&state, false);

    // Blob framing survives a round trip through bytes
    let bytes = notes.to_bytes().unwrap();
    let notes = PalMetadataNotes::from_bytes(&bytes).unwrap();

    assert_eq!(notes.registers, vec![PalMetadataNoteEntry::new(0x10, 0x20)]);

    let doc = Document::from_msgpack(&notes.document).unwrap();
    let pipeline = pipeline(&doc);

    let shaders = doc.get(pipeline, keys::SHADERS).unwrap();
    assert_eq!(doc.keys(shaders), vec![".pixel", ".vertex"]);
    let hw_stages = doc.get(pipeline, keys::HARDWARE_STAGES).unwrap();
    assert_eq!(doc.keys(hw_stages), vec![".ps", ".vs"]);

    assert_eq!(uint(&doc, hw_stages, &[".vs", keys::SGPR_LIMIT]), 4);
    assert_eq!(uint(&doc, hw_stages, &[".ps", keys::SGPR_LIMIT]), 8);

    let vertex_hash = doc
        .find(shaders, &[".vertex", keys::API_SHADER_HASH])
        .unwrap();
    let lower = doc.element(vertex_hash, 0).unwrap();
    assert_eq!(doc.node(lower).as_uint(), Some(0xA));

    let expected = fold_hash(fold_hash(0, 0xA), 0xB);
    let pipeline_hash = doc.get(pipeline, keys::INTERNAL_PIPELINE_HASH).unwrap();
    let lanes: Vec<_> = doc
        .elements(pipeline_hash)
        .iter()
        .map(|id| doc.node(*id).as_uint().unwrap())
        .collect();
    assert_eq!(lanes, vec![expected, expected]);

    let api = doc.get(pipeline, keys::API).unwrap();
    assert_eq!(doc.node(api).as_str(), Some("Vulkan"));
    let version = doc.get(doc.root(), keys::VERSION).unwrap();
    assert_eq!(doc.elements(version).len(), 2);
}

#[test]
fn pipeline_hash_does_not_depend_on_stage_order() {
    init_logging();
    let state = vs_ps_state();

    let hash_of = |notes: PalMetadataNotes| {
        let doc = Document::from_msgpack(&notes.document).unwrap();
        let pipeline = pipeline(&doc);
        let lanes = doc.get(pipeline, keys::INTERNAL_PIPELINE_HASH).unwrap();
        let first = doc.element(lanes, 0).unwrap();
        doc.node(first).as_uint().unwrap()
    };

    assert_eq!(
        hash_of(build_vs_ps(&state, false)),
        hash_of(build_vs_ps(&state, true))
    );
}

#[test]
fn document_bytes_do_not_depend_on_stage_order() {
    init_logging();
    let state = vs_ps_state();

    let vertex_first = build_vs_ps(&state, false);
    let fragment_first = build_vs_ps(&state, true);

    assert_eq!(vertex_first.document, fragment_first.document);
    assert_eq!(vertex_first.to_bytes().unwrap(), fragment_first.to_bytes().unwrap());
}

#[test]
fn aggregates_are_written_once_as_maxima() {
    init_logging();
    let state = vs_ps_state();
    let mut notes: Option<PalMetadataNotes> = None;
    {
        let mut builder = ConfigBuilder::new(&mut notes, &state);
        for value in [5, 12, 3] {
            builder.update_user_data_limit(value).unwrap();
        }
        builder.update_spill_threshold(20).unwrap();
        builder.update_spill_threshold(10).unwrap();
        builder.write_pal_metadata().unwrap();

        assert_eq!(
            builder.write_pal_metadata(),
            Err(ConfigError::AlreadyFinalized)
        );
        assert!(builder.update_user_data_limit(40).is_err());
    }

    let notes = notes.unwrap();
    let doc = Document::from_msgpack(&notes.document).unwrap();
    let pipeline = pipeline(&doc);
    assert_eq!(uint(&doc, pipeline, &[keys::USER_DATA_LIMIT]), 12);
    assert_eq!(uint(&doc, pipeline, &[keys::SPILL_THRESHOLD]), 20);
}

#[test]
fn geometry_stage_maps_to_two_hardware_stages() {
    init_logging();
    let state = PipelineSnapshot::new(GfxIpVersion::new(8, 0, 0))
        .stage(ShaderStage::Vertex, 1)
        .stage(ShaderStage::Geometry, 2)
        .stage(ShaderStage::Fragment, 3);
    let mut notes: Option<PalMetadataNotes> = None;
    let mut builder = ConfigBuilder::new(&mut notes, &state);

    builder
        .add_api_hw_shader_mapping(ShaderStage::Vertex, HwStageMask::ES)
        .unwrap();
    builder
        .add_api_hw_shader_mapping(ShaderStage::Geometry, HwStageMask::GS | HwStageMask::VS)
        .unwrap();
    builder
        .add_api_hw_shader_mapping(ShaderStage::Fragment, HwStageMask::PS)
        .unwrap();

    let mapper = builder.mapper();
    assert_eq!(mapper.owner(HardwareStage::Gs), Some(ShaderStage::Geometry));
    assert_eq!(mapper.owner(HardwareStage::Vs), Some(ShaderStage::Geometry));
    assert_eq!(mapper.owner(HardwareStage::Es), Some(ShaderStage::Vertex));
    assert_eq!(mapper.owner(HardwareStage::Hs), None);

    let err = builder
        .add_api_hw_shader_mapping(ShaderStage::TessEval, HwStageMask::VS)
        .unwrap_err();
    assert!(matches!(err, ConfigError::SharedHardwareStage { .. }));
}
