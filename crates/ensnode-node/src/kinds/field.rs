//! Grid field over an `nx * ny * nz` box.

use std::path::Path;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};
use ensnode_types::{ActiveList, ImplKind, gather_active, scatter_active};
use tracing::debug;

use super::scalar::{check_len, load_values};
use crate::config::NodeConfig;
use crate::forward_model::{ForwardModelReader, ForwardModelWriter};
use crate::keyword::{EclKeyword, KeywordData};
use crate::ops::{Capability, NodeOps};
use crate::payload::{Payload, PayloadVariant, downcast, downcast_mut};

/// Cell values in `i + j*nx + k*nx*ny` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    cells: Vec<f64>,
}

impl Field {
    #[must_use]
    pub const fn new(cells: Vec<f64>) -> Self {
        Self { cells }
    }

    #[must_use]
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [f64] {
        &mut self.cells
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FieldOps;

/// Parse a 1-based `"i,j,k"` cell key into 0-based coordinates.
fn parse_cell_key(key: &str) -> Option<(usize, usize, usize)> {
    let mut parts = key.split(',').map(|p| p.trim().parse::<usize>().ok());
    let (Some(Some(i)), Some(Some(j)), Some(Some(k)), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    Some((i.checked_sub(1)?, j.checked_sub(1)?, k.checked_sub(1)?))
}

impl NodeOps for FieldOps {
    fn kind(&self) -> ImplKind {
        ImplKind::Field
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::Clear
                | Capability::EclWrite
                | Capability::EclRead
                | Capability::MatrixSerialize
                | Capability::MatrixDeserialize
                | Capability::UserGet
        )
    }

    fn alloc(&self, config: &NodeConfig) -> Result<Payload> {
        let size = config.field()?.data_size();
        Ok(Field::new(vec![0.0; size]).into_payload())
    }

    fn store(&self, payload: &Payload, writer: &mut BufferWriter) -> Result<()> {
        writer.write_f64_slice(&downcast::<Field>(payload, "store")?.cells)
    }

    fn load(&self, config: &NodeConfig, reader: &mut BufferReader<'_>) -> Result<Payload> {
        let size = config.field()?.data_size();
        let cells = load_values(reader, size, ImplKind::Field)?;
        Ok(Field::new(cells).into_payload())
    }

    fn validate(&self, payload: &Payload, config: &NodeConfig) -> Result<()> {
        let field = downcast::<Field>(payload, "validate")?;
        check_len(&field.cells, config.data_size(), ImplKind::Field)
    }

    fn clear(&self, payload: &mut Payload) -> Result<()> {
        downcast_mut::<Field>(payload, "clear")?.cells.fill(0.0);
        Ok(())
    }

    fn ecl_write(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        run_path: &Path,
        writer: &mut dyn ForwardModelWriter,
    ) -> Result<()> {
        let field = downcast::<Field>(payload, "ecl_write")?;
        let cfg = config.field()?;
        let output: Vec<f32> = field.cells.iter().map(|&x| cfg.output(x) as f32).collect();
        let keyword = EclKeyword::new(cfg.keyword.clone(), KeywordData::Float(output))?;
        debug!(
            parameter = config.name(),
            cells = field.cells.len(),
            file = %cfg.file,
            "writing field"
        );
        writer.write_keyword(run_path, &cfg.file, &keyword)
    }

    fn ecl_read(
        &self,
        config: &NodeConfig,
        run_path: &Path,
        reader: &dyn ForwardModelReader,
    ) -> Result<Payload> {
        let cfg = config.field()?;
        let keyword = reader.read_keyword(run_path, &cfg.file, &cfg.keyword)?;
        if keyword.len() != cfg.data_size() {
            return Err(EnsError::dimension(format!(
                "field {} read {} cells from {}, grid {:?} has {}",
                config.name(),
                keyword.len(),
                cfg.file,
                cfg.dims,
                cfg.data_size()
            )));
        }
        Ok(Field::new(keyword.data().to_f64_vec()).into_payload())
    }

    fn matrix_serialize(
        &self,
        payload: &Payload,
        active: &ActiveList,
        column: &mut [f64],
        row_offset: usize,
    ) -> Result<usize> {
        let field = downcast::<Field>(payload, "matrix_serialize")?;
        scatter_active(&field.cells, active, column, row_offset)
    }

    fn matrix_deserialize(
        &self,
        payload: &mut Payload,
        active: &ActiveList,
        column: &[f64],
        row_offset: usize,
    ) -> Result<usize> {
        let field = downcast_mut::<Field>(payload, "matrix_deserialize")?;
        gather_active(&mut field.cells, active, column, row_offset)
    }

    fn user_get(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        key: &str,
        internal: bool,
    ) -> Result<Option<f64>> {
        let field = downcast::<Field>(payload, "user_get")?;
        let cfg = config.field()?;
        let value = parse_cell_key(key)
            .and_then(|(i, j, k)| cfg.cell_index(i, j, k))
            .and_then(|index| field.cells.get(index).copied());
        Ok(value.map(|x| if internal { x } else { cfg.output(x) }))
    }
}
