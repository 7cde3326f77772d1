//! One scalar simulator result.
//!
//! Empty until read from the run directory. Result files are plain
//! `KEY value` listings, see [`crate::forward_model::RunPathIo`].

use std::path::Path;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};
use ensnode_types::{ActiveList, ImplKind, gather_active, scatter_active};

use crate::config::NodeConfig;
use crate::forward_model::ForwardModelReader;
use crate::ops::{Capability, NodeOps};
use crate::payload::{Payload, PayloadVariant, downcast, downcast_mut};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    value: Option<f64>,
}

impl Summary {
    #[must_use]
    pub const fn empty() -> Self {
        Self { value: None }
    }

    #[must_use]
    pub const fn with_value(value: f64) -> Self {
        Self { value: Some(value) }
    }

    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        self.value
    }

    fn loaded(&self) -> Result<f64> {
        self.value
            .ok_or_else(|| EnsError::invalid_state("summary value has not been read"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryOps;

impl NodeOps for SummaryOps {
    fn kind(&self) -> ImplKind {
        ImplKind::Summary
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::EclRead
                | Capability::MatrixSerialize
                | Capability::MatrixDeserialize
                | Capability::UserGet
        )
    }

    fn alloc(&self, config: &NodeConfig) -> Result<Payload> {
        config.summary()?;
        Ok(Summary::empty().into_payload())
    }

    fn store(&self, payload: &Payload, writer: &mut BufferWriter) -> Result<()> {
        let summary = downcast::<Summary>(payload, "store")?;
        writer.write_f64_slice(summary.value.as_slice())
    }

    fn load(&self, config: &NodeConfig, reader: &mut BufferReader<'_>) -> Result<Payload> {
        config.summary()?;
        let values = reader.read_f64_vec("summary")?;
        match values.as_slice() {
            [] => Ok(Summary::empty().into_payload()),
            [value] => Ok(Summary::with_value(*value).into_payload()),
            more => Err(EnsError::corrupt(format!(
                "summary record holds {} values",
                more.len()
            ))),
        }
    }

    fn ecl_read(
        &self,
        config: &NodeConfig,
        run_path: &Path,
        reader: &dyn ForwardModelReader,
    ) -> Result<Payload> {
        let cfg = config.summary()?;
        let value = reader.read_scalar(run_path, &cfg.file, &cfg.key)?;
        Ok(Summary::with_value(value).into_payload())
    }

    fn matrix_serialize(
        &self,
        payload: &Payload,
        active: &ActiveList,
        column: &mut [f64],
        row_offset: usize,
    ) -> Result<usize> {
        let value = downcast::<Summary>(payload, "matrix_serialize")?.loaded()?;
        scatter_active(&[value], active, column, row_offset)
    }

    fn matrix_deserialize(
        &self,
        payload: &mut Payload,
        active: &ActiveList,
        column: &[f64],
        row_offset: usize,
    ) -> Result<usize> {
        let summary = downcast_mut::<Summary>(payload, "matrix_deserialize")?;
        let mut values = [summary.loaded()?];
        let rows = gather_active(&mut values, active, column, row_offset)?;
        summary.value = Some(values[0]);
        Ok(rows)
    }

    fn user_get(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        key: &str,
        _internal: bool,
    ) -> Result<Option<f64>> {
        let summary = downcast::<Summary>(payload, "user_get")?;
        if key != config.summary()?.key {
            return Ok(None);
        }
        summary.loaded().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::config::{KindConfig, SummaryConfig};
    use crate::forward_model::RunPathIo;

    fn config() -> NodeConfig {
        NodeConfig::new(
            "WOPR:OP1",
            KindConfig::Summary(SummaryConfig {
                key: "WOPR:OP1".into(),
                file: "summary.txt".into(),
            }),
        )
        .unwrap()
    }

    #[test]
    fn read_from_result_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("summary.txt"), "WOPR:OP1 812.5\n").unwrap();
        let cfg = config();
        let payload = SummaryOps.ecl_read(&cfg, dir.path(), &RunPathIo::new()).unwrap();
        assert_eq!(SummaryOps.user_get(&payload, &cfg, "WOPR:OP1", false).unwrap(), Some(812.5));
        assert_eq!(SummaryOps.user_get(&payload, &cfg, "FOPT", false).unwrap(), None);
    }

    #[test]
    fn unread_value_cannot_enter_matrix() {
        let cfg = config();
        let payload = SummaryOps.alloc(&cfg).unwrap();
        let mut column = [0.0; 2];
        let err = SummaryOps
            .matrix_serialize(&payload, &ActiveList::all(), &mut column, 0)
            .unwrap_err();
        assert!(matches!(err, EnsError::InvalidState { .. }));
    }

    #[test]
    fn matrix_round_trip() {
        let mut payload = Summary::with_value(4.0).into_payload();
        let mut column = [0.0; 3];
        assert_eq!(
            SummaryOps
                .matrix_serialize(&payload, &ActiveList::all(), &mut column, 2)
                .unwrap(),
            1
        );
        assert_eq!(column, [0.0, 0.0, 4.0]);
        column[2] = 9.0;
        SummaryOps
            .matrix_deserialize(&mut payload, &ActiveList::all(), &column, 2)
            .unwrap();
        assert_eq!(payload, Summary::with_value(9.0).into_payload());
    }

    #[test]
    fn ecl_write_is_unsupported() {
        let dir = tempdir().unwrap();
        let payload = Summary::with_value(1.0).into_payload();
        let err = SummaryOps
            .ecl_write(&payload, &config(), dir.path(), &mut RunPathIo::new())
            .unwrap_err();
        assert!(err.is_contract_violation());
    }
}
