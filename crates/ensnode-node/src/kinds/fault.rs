//! Structural fault parameters.
//!
//! Same internal layout as a scalar keyword set, but the forward model gets
//! every configured template instantiated with the transformed multipliers.

use std::path::Path;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};
use ensnode_types::{ActiveList, ImplKind, gather_active, scatter_active};
use rand::RngCore;
use tracing::debug;

use super::scalar::{check_len, fill_standard_normal, load_values, scalar_get};
use crate::config::NodeConfig;
use crate::forward_model::ForwardModelWriter;
use crate::ops::{Capability, NodeOps};
use crate::payload::{Payload, PayloadVariant, downcast, downcast_mut};

#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    multipliers: Vec<f64>,
}

impl Fault {
    #[must_use]
    pub const fn new(multipliers: Vec<f64>) -> Self {
        Self { multipliers }
    }

    #[must_use]
    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    pub fn multipliers_mut(&mut self) -> &mut [f64] {
        &mut self.multipliers
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FaultOps;

impl NodeOps for FaultOps {
    fn kind(&self) -> ImplKind {
        ImplKind::Fault
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
        let size = config.fault()?.scalars.data_size();
        Ok(Fault::new(vec![0.0; size]).into_payload())
    }

    fn store(&self, payload: &Payload, writer: &mut BufferWriter) -> Result<()> {
        writer.write_f64_slice(&downcast::<Fault>(payload, "store")?.multipliers)
    }

    fn load(&self, config: &NodeConfig, reader: &mut BufferReader<'_>) -> Result<Payload> {
        let size = config.fault()?.scalars.data_size();
        let multipliers = load_values(reader, size, ImplKind::Fault)?;
        Ok(Fault::new(multipliers).into_payload())
    }

    fn validate(&self, payload: &Payload, config: &NodeConfig) -> Result<()> {
        let fault = downcast::<Fault>(payload, "validate")?;
        check_len(&fault.multipliers, config.data_size(), ImplKind::Fault)
    }

    fn sample(
        &self,
        payload: &mut Payload,
        _config: &NodeConfig,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        let fault = downcast_mut::<Fault>(payload, "sample")?;
        fill_standard_normal(&mut fault.multipliers, rng);
        Ok(())
    }

    fn clear(&self, payload: &mut Payload) -> Result<()> {
        downcast_mut::<Fault>(payload, "clear")?.multipliers.fill(0.0);
        Ok(())
    }

    fn ecl_write(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        run_path: &Path,
        writer: &mut dyn ForwardModelWriter,
    ) -> Result<()> {
        let fault = downcast::<Fault>(payload, "ecl_write")?;
        let cfg = config.fault()?;
        if cfg.templates.is_empty() {
            return Err(EnsError::config(format!(
                "fault parameter {} has no templates to write",
                config.name()
            )));
        }
        let values = cfg.scalars.output_pairs(&fault.multipliers);
        debug!(
            parameter = config.name(),
            templates = cfg.templates.len(),
            "writing fault multipliers"
        );
        writer.write_scalars(run_path, config.name(), &values, &cfg.templates)
    }

    fn matrix_serialize(
        &self,
        payload: &Payload,
        active: &ActiveList,
        column: &mut [f64],
        row_offset: usize,
    ) -> Result<usize> {
        let fault = downcast::<Fault>(payload, "matrix_serialize")?;
        scatter_active(&fault.multipliers, active, column, row_offset)
    }

    fn matrix_deserialize(
        &self,
        payload: &mut Payload,
        active: &ActiveList,
        column: &[f64],
        row_offset: usize,
    ) -> Result<usize> {
        let fault = downcast_mut::<Fault>(payload, "matrix_deserialize")?;
        gather_active(&mut fault.multipliers, active, column, row_offset)
    }

    fn user_get(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        key: &str,
        internal: bool,
    ) -> Result<Option<f64>> {
        let fault = downcast::<Fault>(payload, "user_get")?;
        Ok(scalar_get(&config.fault()?.scalars, &fault.multipliers, key, internal))
    }
}
