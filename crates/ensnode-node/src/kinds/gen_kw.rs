//! Named scalar keyword set.
//!
//! Internal values are N(0, 1) draws; each element's output transform maps
//! them to the prior the simulator sees. The forward model receives a
//! `<name>.txt` listing plus the optional template.

use std::path::Path;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::Result;
use ensnode_types::{ActiveList, ImplKind, gather_active, scatter_active};
use rand::RngCore;
use tracing::debug;

use super::scalar::{check_len, fill_standard_normal, load_values, scalar_get};
use crate::config::NodeConfig;
use crate::forward_model::ForwardModelWriter;
use crate::ops::{Capability, NodeOps};
use crate::payload::{Payload, PayloadVariant, downcast, downcast_mut};

#[derive(Debug, Clone, PartialEq)]
pub struct GenKw {
    values: Vec<f64>,
}

impl GenKw {
    #[must_use]
    pub const fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GenKwOps;

impl NodeOps for GenKwOps {
    fn kind(&self) -> ImplKind {
        ImplKind::GenKw
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::Sample
                | Capability::Clear
                | Capability::EclWrite
                | Capability::MatrixSerialize
                | Capability::MatrixDeserialize
                | Capability::UserGet
        )
    }

    fn alloc(&self, config: &NodeConfig) -> Result<Payload> {
        let size = config.gen_kw()?.scalars.data_size();
        Ok(GenKw::new(vec![0.0; size]).into_payload())
    }

    fn store(&self, payload: &Payload, writer: &mut BufferWriter) -> Result<()> {
        writer.write_f64_slice(&downcast::<GenKw>(payload, "store")?.values)
    }

    fn load(&self, config: &NodeConfig, reader: &mut BufferReader<'_>) -> Result<Payload> {
        let size = config.gen_kw()?.scalars.data_size();
        let values = load_values(reader, size, ImplKind::GenKw)?;
        Ok(GenKw::new(values).into_payload())
    }

    fn validate(&self, payload: &Payload, config: &NodeConfig) -> Result<()> {
        let gen_kw = downcast::<GenKw>(payload, "validate")?;
        check_len(&gen_kw.values, config.data_size(), ImplKind::GenKw)
    }

    fn sample(
        &self,
        payload: &mut Payload,
        _config: &NodeConfig,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        fill_standard_normal(&mut downcast_mut::<GenKw>(payload, "sample")?.values, rng);
        Ok(())
    }

    fn clear(&self, payload: &mut Payload) -> Result<()> {
        downcast_mut::<GenKw>(payload, "clear")?.values.fill(0.0);
        Ok(())
    }

    fn ecl_write(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        run_path: &Path,
        writer: &mut dyn ForwardModelWriter,
    ) -> Result<()> {
        let gen_kw = downcast::<GenKw>(payload, "ecl_write")?;
        let cfg = config.gen_kw()?;
        let values = cfg.scalars.output_pairs(&gen_kw.values);
        debug!(parameter = config.name(), elements = values.len(), "writing gen_kw");
        writer.write_scalars(run_path, config.name(), &values, cfg.template.as_slice())
    }

    fn matrix_serialize(
        &self,
        payload: &Payload,
        active: &ActiveList,
        column: &mut [f64],
        row_offset: usize,
    ) -> Result<usize> {
        let gen_kw = downcast::<GenKw>(payload, "matrix_serialize")?;
        scatter_active(&gen_kw.values, active, column, row_offset)
    }

    fn matrix_deserialize(
        &self,
        payload: &mut Payload,
        active: &ActiveList,
        column: &[f64],
        row_offset: usize,
    ) -> Result<usize> {
        let gen_kw = downcast_mut::<GenKw>(payload, "matrix_deserialize")?;
        gather_active(&mut gen_kw.values, active, column, row_offset)
    }

    fn user_get(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        key: &str,
        internal: bool,
    ) -> Result<Option<f64>> {
        let gen_kw = downcast::<GenKw>(payload, "user_get")?;
        Ok(scalar_get(&config.gen_kw()?.scalars, &gen_kw.values, key, internal))
    }
}
