//! PAL metadata config builder.
//!
//! A [`ConfigBuilder`] is created once per pipeline, receives one round of
//! setter calls per compiled shader stage (in any stage order), and is spent
//! by a single [`write_pal_metadata`](ConfigBuilder::write_pal_metadata) call
//! that flushes the pipeline-wide aggregates and hands the serialized notes
//! to the module.
//!
//! Once the notes are written the builder is read-only. Fallible operations
//! return [`ConfigError::AlreadyFinalized`]; the infallible setters and
//! register appends log a warning and are ignored, since the notes the
//! module already holds could no longer reflect them.

use crate::abi::{
    keys, GfxIpVersion, HardwareStage, HwStageMask, PipelineType, ShaderStage, ShaderStageMask,
};
use crate::aggregate::PipelineAggregator;
use crate::config::MetadataConfig;
use crate::document::{Document, Node, NodeId};
use crate::error::{ConfigError, Result};
use crate::pipeline::{MetadataSink, PalMetadataNotes, PipelineState};
use crate::register::{MetadataOnly, PalMetadataNoteEntry, RegisterConfig};
use crate::stage::{MappingChange, StageMapper};

/// Collects the PAL metadata of one pipeline.
///
/// Borrows the module that receives the finished [`PalMetadataNotes`] and the
/// read-only [`PipelineState`] that answers stage presence, hash and float
/// mode queries. Stage nodes are created lazily and cached by handle, so the
/// per-stage setters may be called in any stage order.
pub struct ConfigBuilder<'a> {
    /// Module the finished notes are attached to
    module: &'a mut dyn MetadataSink,
    pipeline_state: &'a dyn PipelineState,
    config: MetadataConfig,
    gfx_ip: GfxIpVersion,

    has_vs: bool,
    has_tcs: bool,
    has_tes: bool,
    has_gs: bool,

    document: Document,
    /// `amdpal.pipelines[0]`
    pipeline_node: NodeId,
    /// Nodes under `.shaders`, created on first use
    api_shader_nodes: [Option<NodeId>; ShaderStage::NATIVE_COUNT],
    /// Nodes under `.hardware_stages`, created on first use
    hw_shader_nodes: [Option<NodeId>; HardwareStage::COUNT],

    mapper: StageMapper,
    aggregator: PipelineAggregator,
    /// API stages whose hash has been folded into the pipeline hash
    hashed_stages: ShaderStageMask,
    registers: RegisterConfig,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(module: &'a mut dyn MetadataSink, pipeline_state: &'a dyn PipelineState) -> Self {
        Self::with_config(module, pipeline_state, MetadataConfig::default())
    }

    pub fn with_config(
        module: &'a mut dyn MetadataSink,
        pipeline_state: &'a dyn PipelineState,
        config: MetadataConfig,
    ) -> Self {
        let gfx_ip = pipeline_state.gfx_ip_version();

        let mut document = Document::new();
        let root = document.root();
        let version = document.map_entry(root, keys::VERSION);
        document.push(version, config.abi_version.0);
        document.push(version, config.abi_version.1);
        let pipelines = document.map_entry(root, keys::PIPELINES);
        let pipeline_node = document.array_element(pipelines, 0);
        document.make_map(pipeline_node);

        log::debug!("Building PAL metadata for {}", gfx_ip);

        Self {
            module,
            pipeline_state,
            mapper: StageMapper::new(config.stage_ownership),
            config,
            gfx_ip,
            has_vs: pipeline_state.has_shader_stage(ShaderStage::Vertex),
            has_tcs: pipeline_state.has_shader_stage(ShaderStage::TessControl),
            has_tes: pipeline_state.has_shader_stage(ShaderStage::TessEval),
            has_gs: pipeline_state.has_shader_stage(ShaderStage::Geometry),
            document,
            pipeline_node,
            api_shader_nodes: [None; ShaderStage::NATIVE_COUNT],
            hw_shader_nodes: [None; HardwareStage::COUNT],
            aggregator: PipelineAggregator::new(),
            hashed_stages: ShaderStageMask::empty(),
            registers: RegisterConfig::new(),
        }
    }

    pub fn gfx_ip(&self) -> GfxIpVersion {
        self.gfx_ip
    }

    pub fn has_vs(&self) -> bool {
        self.has_vs
    }

    pub fn has_tcs(&self) -> bool {
        self.has_tcs
    }

    pub fn has_tes(&self) -> bool {
        self.has_tes
    }

    pub fn has_gs(&self) -> bool {
        self.has_gs
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn pipeline_node(&self) -> NodeId {
        self.pipeline_node
    }

    pub fn registers(&self) -> &RegisterConfig {
        &self.registers
    }

    pub fn mapper(&self) -> &StageMapper {
        &self.mapper
    }

    pub fn aggregator(&self) -> &PipelineAggregator {
        &self.aggregator
    }

    /// Whether `write_pal_metadata` has run.
    pub fn is_finalized(&self) -> bool {
        self.aggregator.is_finalized()
    }

    /// Node for `stage` in `.shaders`; created on first call.
    pub fn api_shader_node(&mut self, stage: ShaderStage) -> NodeId {
        if let Some(node) = self.api_shader_nodes[stage.index()] {
            return node;
        }
        let shaders = self.document.map_entry(self.pipeline_node, keys::SHADERS);
        let node = self.document.map_entry(shaders, stage.metadata_name());
        self.document.make_map(node);
        log::trace!("Created API shader node {}", stage.metadata_name());
        self.api_shader_nodes[stage.index()] = Some(node);
        node
    }

    /// Node for `stage` in `.hardware_stages`; created on first call.
    pub fn hw_shader_node(&mut self, stage: HardwareStage) -> NodeId {
        if let Some(node) = self.hw_shader_nodes[stage.index()] {
            return node;
        }
        let stages = self
            .document
            .map_entry(self.pipeline_node, keys::HARDWARE_STAGES);
        let node = self.document.map_entry(stages, stage.metadata_name());
        self.document.make_map(node);
        log::trace!("Created hardware stage node {}", stage.metadata_name());
        self.hw_shader_nodes[stage.index()] = Some(node);
        node
    }

    /// Record that `api_stage` lowers to `hw_stages`, cross-referencing the
    /// API shader node and every hardware stage node.
    pub fn add_api_hw_shader_mapping(
        &mut self,
        api_stage: ShaderStage,
        hw_stages: HwStageMask,
    ) -> Result<()> {
        if self.is_finalized() {
            return Err(ConfigError::AlreadyFinalized);
        }
        if self.mapper.add_mapping(api_stage, hw_stages)? == MappingChange::Unchanged {
            return Ok(());
        }
        log::debug!("Mapped {:?} to hardware stages {:?}", api_stage, hw_stages);

        let api_node = self.api_shader_node(api_stage);
        let mapping = self.document.map_entry(api_node, keys::HARDWARE_MAPPING);
        for hw in hw_stages.stages() {
            self.document.push(mapping, hw.metadata_name());

            // Rebuilt from the mapper so shared stages list contributors in
            // stage order regardless of mapping order.
            let hw_node = self.hw_shader_node(hw);
            let api_shaders = self.document.map_entry(hw_node, keys::API_SHADERS);
            self.document.set(api_shaders, Node::Array(Vec::new()));
            for api in self.mapper.contributors(hw).stages() {
                self.document.push(api_shaders, api.metadata_name());
            }
        }
        Ok(())
    }

    /// Write the API shader hash of `api_stage` and fold it into the
    /// pipeline hash. Returns the stage hash.
    pub fn set_shader_hash(&mut self, api_stage: ShaderStage) -> Result<u64> {
        if self.is_finalized() {
            return Err(ConfigError::AlreadyFinalized);
        }

        let hash = self.pipeline_state.shader_hash(api_stage);
        let api_node = self.api_shader_node(api_stage);
        let hash_node = self.document.map_entry(api_node, keys::API_SHADER_HASH);
        let lower = self.document.array_element(hash_node, 0);
        self.document.set(lower, hash);
        let upper = self.document.array_element(hash_node, 1);
        self.document.set(upper, 0u64);

        if self.hashed_stages.contains(api_stage.mask()) {
            log::warn!("Shader hash of {:?} set more than once", api_stage);
        } else {
            self.aggregator.fold_shader_hash(hash)?;
            self.hashed_stages |= api_stage.mask();
        }
        Ok(hash)
    }

    /// Raise the pipeline user data limit to at least `value`.
    pub fn update_user_data_limit(&mut self, value: u32) -> Result<()> {
        self.aggregator.update_user_data_limit(value)
    }

    /// Raise the pipeline spill threshold to at least `value`.
    pub fn update_spill_threshold(&mut self, value: u32) -> Result<()> {
        self.aggregator.update_spill_threshold(value)
    }

    pub fn set_num_avail_sgprs(&mut self, hw_stage: HardwareStage, value: u32) {
        self.set_hw_field(hw_stage, keys::SGPR_LIMIT, value);
    }

    pub fn set_num_avail_vgprs(&mut self, hw_stage: HardwareStage, value: u32) {
        self.set_hw_field(hw_stage, keys::VGPR_LIMIT, value);
    }

    pub fn set_wave_front_size(&mut self, hw_stage: HardwareStage, value: u32) {
        self.set_hw_field(hw_stage, keys::WAVEFRONT_SIZE, value);
    }

    pub fn set_lds_size_byte_size(&mut self, hw_stage: HardwareStage, value: u32) {
        self.set_hw_field(hw_stage, keys::LDS_SIZE, value);
    }

    pub fn set_ps_uses_uavs(&mut self, value: bool) {
        self.set_hw_field(HardwareStage::Ps, keys::USES_UAVS, value);
    }

    pub fn set_ps_writes_uavs(&mut self, value: bool) {
        self.set_hw_field(HardwareStage::Ps, keys::WRITES_UAVS, value);
    }

    pub fn set_ps_writes_depth(&mut self, value: bool) {
        self.set_hw_field(HardwareStage::Ps, keys::WRITES_DEPTH, value);
    }

    /// ES-GS LDS size in bytes, on the GS hardware stage.
    pub fn set_es_gs_lds_byte_size(&mut self, value: u32) {
        self.set_hw_field(HardwareStage::Gs, keys::ES_GS_LDS_SIZE, value);
    }

    /// ES-GS LDS size for the whole pipeline.
    pub fn set_es_gs_lds_size(&mut self, value: u32) {
        self.set_pipeline_field(keys::ES_GS_LDS_SIZE, value);
    }

    pub fn set_uses_viewport_array_index(&mut self, value: bool) {
        self.set_pipeline_field(keys::USES_VIEWPORT_ARRAY_INDEX, value);
    }

    pub fn set_calc_wave_break_size_at_draw_time(&mut self, value: bool) {
        self.set_pipeline_field(keys::CALC_WAVE_BREAK_SIZE_AT_DRAW_TIME, value);
    }

    pub fn set_api_name(&mut self, value: &str) {
        self.set_pipeline_field(keys::API, value);
    }

    pub fn set_pipeline_type(&mut self, value: PipelineType) {
        self.set_pipeline_field(keys::TYPE, value.metadata_name());
    }

    /// Fetch the packed floating-point mode of `stage`, record it on the API
    /// shader node and return it for the caller's mode register.
    pub fn setup_floating_point_mode(&mut self, stage: ShaderStage) -> u32 {
        let mode = self.pipeline_state.floating_point_mode(stage);
        if !self.accepts_writes("setup_floating_point_mode") {
            return mode;
        }
        let api_node = self.api_shader_node(stage);
        self.document.set_entry(api_node, keys::FLOAT_MODE, mode);
        mode
    }

    pub fn append_config(&mut self, config: &[PalMetadataNoteEntry]) {
        if !self.accepts_writes("append_config") {
            return;
        }
        self.registers.append(config);
    }

    pub fn append_register(&mut self, key: u32, value: u32) {
        if !self.accepts_writes("append_register") {
            return;
        }
        self.registers.append_register(key, value);
    }

    /// Append a register-layout struct deriving `PalMetadata`.
    pub fn append_struct<T: MetadataOnly>(&mut self, config: &T) {
        if !self.accepts_writes("append_struct") {
            return;
        }
        self.registers.append_struct(config);
    }

    /// Flush the pipeline-wide aggregates, serialize the document and
    /// register list, and attach them to the module.
    ///
    /// May only succeed once; later calls return
    /// [`ConfigError::AlreadyFinalized`] without touching the document.
    pub fn write_pal_metadata(&mut self) -> Result<()> {
        let aggregates = self
            .aggregator
            .finalize(self.config.default_spill_threshold)?;

        self.set_user_data_limit(aggregates.user_data_limit);
        self.set_spill_threshold(aggregates.spill_threshold);
        self.set_pipeline_hash(aggregates.pipeline_hash);

        let notes = PalMetadataNotes {
            registers: self.registers.entries().to_vec(),
            document: self.document.to_msgpack()?,
        };
        log::debug!(
            "Writing PAL metadata: {} register entries, {} document bytes",
            notes.registers.len(),
            notes.document.len()
        );
        self.module.attach_pal_metadata(notes);
        Ok(())
    }

    // The aggregate writers run after finalization, so they bypass the
    // read-only check of `set_pipeline_field`.
    fn set_user_data_limit(&mut self, value: u32) {
        self.document
            .set_entry(self.pipeline_node, keys::USER_DATA_LIMIT, value);
    }

    fn set_spill_threshold(&mut self, value: u32) {
        self.document
            .set_entry(self.pipeline_node, keys::SPILL_THRESHOLD, value);
    }

    fn set_pipeline_hash(&mut self, value: u64) {
        let hash_node = self
            .document
            .map_entry(self.pipeline_node, keys::INTERNAL_PIPELINE_HASH);
        self.document.make_array(hash_node);
        self.document.push(hash_node, value);
        self.document.push(hash_node, value);
    }

    fn accepts_writes(&self, operation: &str) -> bool {
        if self.is_finalized() {
            log::warn!("{} ignored: PAL metadata already written", operation);
            return false;
        }
        true
    }

    fn set_hw_field(&mut self, hw_stage: HardwareStage, key: &str, value: impl Into<Node>) {
        if !self.accepts_writes(key) {
            return;
        }
        let node = self.hw_shader_node(hw_stage);
        self.document.set_entry(node, key, value);
    }

    fn set_pipeline_field(&mut self, key: &str, value: impl Into<Node>) {
        if !self.accepts_writes(key) {
            return;
        }
        self.document.set_entry(self.pipeline_node, key, value);
    }
}
