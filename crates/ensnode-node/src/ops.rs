//! The per-kind capability table.
//!
//! Every concrete kind implements [`NodeOps`] once. The required methods
//! are the capabilities every kind has; the provided methods default to
//! `UnsupportedOperation` and are overridden only by kinds that support
//! them. A default never touches the payload, so an unsupported call leaves
//! the node exactly as it was.
//!
//! [`NodeOps::supports`] names the optional capabilities a kind overrides.
//! The node asks it before looking at the payload, so a lazily populated
//! node reports `UnsupportedOperation` rather than a missing payload.

use std::fmt::Debug;
use std::path::Path;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};
use ensnode_types::{ActiveList, ImplKind};
use rand::RngCore;

use crate::config::NodeConfig;
use crate::forward_model::{ForwardModelReader, ForwardModelWriter};
use crate::payload::{Payload, kind_mismatch};

/// Optional rows of the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Sample,
    Clear,
    EclWrite,
    EclRead,
    MatrixSerialize,
    MatrixDeserialize,
    UserGet,
}

impl Capability {
    pub const ALL: [Self; 7] = [
        Self::Sample,
        Self::Clear,
        Self::EclWrite,
        Self::EclRead,
        Self::MatrixSerialize,
        Self::MatrixDeserialize,
        Self::UserGet,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sample => "sample",
            Self::Clear => "clear",
            Self::EclWrite => "ecl_write",
            Self::EclRead => "ecl_read",
            Self::MatrixSerialize => "matrix_serialize",
            Self::MatrixDeserialize => "matrix_deserialize",
            Self::UserGet => "user_get",
        }
    }
}

/// `UnsupportedOperation` for `operation` on `kind`.
#[must_use]
pub const fn unsupported(kind: ImplKind, operation: &'static str) -> EnsError {
    EnsError::UnsupportedOperation {
        kind: kind.name(),
        operation,
    }
}

/// Capability table of one concrete kind.
///
/// Implementations are stateless; all state lives in the [`Payload`] and
/// the shared [`NodeConfig`]. The node has already checked that `payload`
/// is of this kind before any method is called.
pub trait NodeOps: Send + Sync + Debug {
    fn kind(&self) -> ImplKind;

    /// Whether this kind overrides the method behind `capability`.
    fn supports(&self, _capability: Capability) -> bool {
        false
    }

    /// Fresh payload sized from `config`.
    fn alloc(&self, config: &NodeConfig) -> Result<Payload>;

    /// Append the payload encoding (without the kind tag).
    fn store(&self, payload: &Payload, writer: &mut BufferWriter) -> Result<()>;

    /// Decode a payload written by [`NodeOps::store`].
    fn load(&self, config: &NodeConfig, reader: &mut BufferReader<'_>) -> Result<Payload>;

    /// Duplicate `source` into a new payload.
    fn copy(&self, source: &Payload) -> Result<Payload> {
        if source.kind() != self.kind() {
            return Err(kind_mismatch("copy", self.kind(), source.kind()));
        }
        Ok(source.clone())
    }

    /// Check that `payload` is consistent with `config`.
    fn validate(&self, _payload: &Payload, _config: &NodeConfig) -> Result<()> {
        Ok(())
    }

    /// Draw the payload from its prior.
    fn sample(
        &self,
        _payload: &mut Payload,
        _config: &NodeConfig,
        _rng: &mut dyn RngCore,
    ) -> Result<()> {
        Err(unsupported(self.kind(), "sample"))
    }

    /// Reset every element to zero.
    fn clear(&self, _payload: &mut Payload) -> Result<()> {
        Err(unsupported(self.kind(), "clear"))
    }

    /// Write output-transformed values into the run directory.
    fn ecl_write(
        &self,
        _payload: &Payload,
        _config: &NodeConfig,
        _run_path: &Path,
        _writer: &mut dyn ForwardModelWriter,
    ) -> Result<()> {
        Err(unsupported(self.kind(), "ecl_write"))
    }

    /// Build a payload from simulator output in the run directory.
    fn ecl_read(
        &self,
        _config: &NodeConfig,
        _run_path: &Path,
        _reader: &dyn ForwardModelReader,
    ) -> Result<Payload> {
        Err(unsupported(self.kind(), "ecl_read"))
    }

    /// Copy active elements into `column` from `row_offset`; returns rows
    /// written.
    fn matrix_serialize(
        &self,
        _payload: &Payload,
        _active: &ActiveList,
        _column: &mut [f64],
        _row_offset: usize,
    ) -> Result<usize> {
        Err(unsupported(self.kind(), "matrix_serialize"))
    }

    /// Inverse of [`NodeOps::matrix_serialize`].
    fn matrix_deserialize(
        &self,
        _payload: &mut Payload,
        _active: &ActiveList,
        _column: &[f64],
        _row_offset: usize,
    ) -> Result<usize> {
        Err(unsupported(self.kind(), "matrix_deserialize"))
    }

    /// Look up one value by key. `Ok(None)` means the key is not known.
    fn user_get(
        &self,
        _payload: &Payload,
        _config: &NodeConfig,
        _key: &str,
        _internal: bool,
    ) -> Result<Option<f64>> {
        Err(unsupported(self.kind(), "user_get"))
    }
}
