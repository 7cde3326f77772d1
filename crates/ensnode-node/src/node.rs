//! The type-erased node.
//!
//! A [`Node`] binds a kind tag, a shared configuration, the kind's
//! capability table and an optional payload. Every dispatch checks that the
//! table and the payload both belong to the node's kind before calling into
//! the table; a mismatch is a `KindMismatch` logged at error level. Optional
//! capabilities are checked next, before the payload is looked at.
//!
//! At-rest record layout (little-endian):
//!
//! ```text
//! [kind tag: i32][present: i32, 0 or 1][payload bytes, if present]
//! ```
//!
//! Records are self-delimiting, so several can share one buffer.

use std::path::Path;
use std::sync::Arc;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};
use ensnode_types::{ActiveList, EnsMatrix, ImplKind};
use rand::RngCore;
use tracing::{debug, error};

use crate::config::NodeConfig;
use crate::forward_model::{ForwardModelReader, ForwardModelWriter};
use crate::ops::{Capability, NodeOps, unsupported};
use crate::payload::{Payload, PayloadVariant, downcast, downcast_mut, kind_mismatch};
use crate::registry::NodeRegistry;

const PAYLOAD_ABSENT: i32 = 0;
const PAYLOAD_PRESENT: i32 = 1;

/// Read the kind tag at the front of a stored record without consuming it.
pub fn peek_kind(bytes: &[u8]) -> Result<ImplKind> {
    let tag = BufferReader::new(bytes).read_i32("kind tag")?;
    ImplKind::from_tag(tag).ok_or(EnsError::UnknownKind { tag })
}

#[derive(Debug)]
pub struct Node {
    kind: ImplKind,
    config: Arc<NodeConfig>,
    ops: Arc<dyn NodeOps>,
    payload: Option<Payload>,
}

impl Node {
    /// A node with no payload.
    pub fn new(registry: &NodeRegistry, config: Arc<NodeConfig>) -> Result<Self> {
        let kind = config.kind();
        let ops = registry.ops(kind)?;
        if ops.kind() != kind {
            return Err(kind_mismatch("construct", kind, ops.kind()));
        }
        Ok(Self {
            kind,
            config,
            ops,
            payload: None,
        })
    }

    /// A node with a freshly allocated payload.
    pub fn alloc(registry: &NodeRegistry, config: Arc<NodeConfig>) -> Result<Self> {
        let mut node = Self::new(registry, config)?;
        node.realloc_payload()?;
        Ok(node)
    }

    /// Construct a node and load it from `reader`.
    pub fn load_new(
        registry: &NodeRegistry,
        config: Arc<NodeConfig>,
        reader: &mut BufferReader<'_>,
    ) -> Result<Self> {
        let mut node = Self::new(registry, config)?;
        node.load(reader)?;
        Ok(node)
    }

    #[must_use]
    pub const fn kind(&self) -> ImplKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.config.name()
    }

    #[must_use]
    pub const fn config(&self) -> &Arc<NodeConfig> {
        &self.config
    }

    #[must_use]
    pub const fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Borrow the payload as its concrete type.
    pub fn payload_as<T: PayloadVariant>(&self) -> Result<&T> {
        downcast(self.present("payload_as")?, "payload_as")
    }

    pub fn payload_as_mut<T: PayloadVariant>(&mut self) -> Result<&mut T> {
        let payload = self
            .payload
            .as_mut()
            .ok_or_else(|| missing_payload("payload_as_mut", self.config.name()))?;
        downcast_mut(payload, "payload_as_mut")
    }

    /// Install `payload`, returning the previous one.
    pub fn replace_payload(&mut self, payload: Payload) -> Result<Option<Payload>> {
        let ops = self.checked_ops("replace_payload")?;
        if payload.kind() != self.kind {
            return Err(kind_mismatch("replace_payload", self.kind, payload.kind()));
        }
        ops.validate(&payload, &self.config)?;
        Ok(self.payload.replace(payload))
    }

    /// Replace the payload with a fresh allocation.
    pub fn realloc_payload(&mut self) -> Result<()> {
        let ops = self.checked_ops("realloc_payload")?;
        self.payload = Some(ops.alloc(&self.config)?);
        Ok(())
    }

    /// Drop the payload; the node stays usable.
    pub fn free_payload(&mut self) {
        self.payload = None;
    }

    /// Release the node and whatever it holds.
    pub fn free(self) {
        debug!(parameter = self.name(), kind = %self.kind, "node freed");
    }

    /// Draw the payload from its prior.
    pub fn sample(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let ops = self.capable(Capability::Sample)?;
        let payload = self
            .payload
            .as_mut()
            .ok_or_else(|| missing_payload("sample", self.config.name()))?;
        ops.sample(payload, &self.config, rng)?;
        debug!(parameter = self.name(), kind = %self.kind, "node sampled");
        Ok(())
    }

    /// Reset every element of the payload to zero.
    pub fn clear(&mut self) -> Result<()> {
        let ops = self.capable(Capability::Clear)?;
        let payload = self
            .payload
            .as_mut()
            .ok_or_else(|| missing_payload("clear", self.config.name()))?;
        ops.clear(payload)
    }

    /// Overwrite this node's payload with a copy of `source`'s.
    pub fn copy_from(&mut self, source: &Self) -> Result<()> {
        if source.kind != self.kind {
            return Err(kind_mismatch("copy", self.kind, source.kind));
        }
        let ops = self.checked_ops("copy")?;
        let copied = ops.copy(source.present("copy")?)?;
        ops.validate(&copied, &self.config)?;
        self.payload = Some(copied);
        Ok(())
    }

    /// Independent node with the same configuration and a copied payload.
    pub fn try_clone(&self) -> Result<Self> {
        let ops = self.checked_ops("clone")?;
        let payload = self.payload.as_ref().map(|p| ops.copy(p)).transpose()?;
        Ok(Self {
            kind: self.kind,
            config: Arc::clone(&self.config),
            ops,
            payload,
        })
    }

    /// Append the record: kind tag, presence flag, then the payload.
    pub fn store(&self, writer: &mut BufferWriter) -> Result<()> {
        let ops = self.checked_ops("store")?;
        writer.write_i32(self.kind.tag());
        match &self.payload {
            Some(payload) => {
                writer.write_i32(PAYLOAD_PRESENT);
                ops.store(payload, writer)
            }
            None => {
                writer.write_i32(PAYLOAD_ABSENT);
                Ok(())
            }
        }
    }

    /// Replace the payload from the next record in `reader`.
    ///
    /// Reading stops at the end of this node's record. On error the node
    /// is left unchanged.
    pub fn load(&mut self, reader: &mut BufferReader<'_>) -> Result<()> {
        let payload = self.read_record(reader)?;
        self.install_loaded(payload);
        Ok(())
    }

    /// Replace the payload from `bytes`, which must hold exactly one record.
    pub fn load_record(&mut self, bytes: &[u8]) -> Result<()> {
        let mut reader = BufferReader::new(bytes);
        let payload = self.read_record(&mut reader)?;
        reader.expect_end()?;
        self.install_loaded(payload);
        Ok(())
    }

    fn read_record(&self, reader: &mut BufferReader<'_>) -> Result<Option<Payload>> {
        let ops = self.checked_ops("load")?;
        let tag = reader.read_i32("kind tag")?;
        if tag != self.kind.tag() {
            return match ImplKind::from_tag(tag) {
                Some(found) => Err(kind_mismatch("load", self.kind, found)),
                None => {
                    error!(parameter = self.name(), tag, "record has an unknown kind tag");
                    Err(EnsError::UnknownKind { tag })
                }
            };
        }
        match reader.read_i32("payload flag")? {
            PAYLOAD_ABSENT => Ok(None),
            PAYLOAD_PRESENT => Ok(Some(ops.load(&self.config, reader)?)),
            flag => Err(EnsError::corrupt(format!(
                "{} record has payload flag {flag}",
                self.kind
            ))),
        }
    }

    fn install_loaded(&mut self, payload: Option<Payload>) {
        debug!(
            parameter = self.name(),
            kind = %self.kind,
            present = payload.is_some(),
            "node loaded"
        );
        self.payload = payload;
    }

    /// Hand output values to the forward model.
    pub fn ecl_write(&self, run_path: &Path, writer: &mut dyn ForwardModelWriter) -> Result<()> {
        let ops = self.capable(Capability::EclWrite)?;
        ops.ecl_write(self.present("ecl_write")?, &self.config, run_path, writer)
    }

    /// Replace the payload with simulator output from `run_path`. Works on
    /// a node without a payload.
    pub fn ecl_read(&mut self, run_path: &Path, reader: &dyn ForwardModelReader) -> Result<()> {
        let ops = self.capable(Capability::EclRead)?;
        let payload = ops.ecl_read(&self.config, run_path, reader)?;
        ops.validate(&payload, &self.config)?;
        self.payload = Some(payload);
        Ok(())
    }

    /// Write the active elements into `column` of `matrix` from
    /// `row_offset`. Returns the number of rows written.
    pub fn matrix_serialize(
        &self,
        active: &ActiveList,
        matrix: &mut EnsMatrix,
        row_offset: usize,
        column: usize,
    ) -> Result<usize> {
        self.serialize_into(active, matrix.column_mut(column)?, row_offset)
    }

    /// Column-slice form of [`Node::matrix_serialize`].
    pub fn serialize_into(
        &self,
        active: &ActiveList,
        column: &mut [f64],
        row_offset: usize,
    ) -> Result<usize> {
        let ops = self.capable(Capability::MatrixSerialize)?;
        ops.matrix_serialize(self.present("matrix_serialize")?, active, column, row_offset)
    }

    /// Inverse of [`Node::matrix_serialize`]; inactive elements are kept.
    pub fn matrix_deserialize(
        &mut self,
        active: &ActiveList,
        matrix: &EnsMatrix,
        row_offset: usize,
        column: usize,
    ) -> Result<usize> {
        self.deserialize_from(active, matrix.column(column)?, row_offset)
    }

    /// Column-slice form of [`Node::matrix_deserialize`].
    pub fn deserialize_from(
        &mut self,
        active: &ActiveList,
        column: &[f64],
        row_offset: usize,
    ) -> Result<usize> {
        let ops = self.capable(Capability::MatrixDeserialize)?;
        let payload = self
            .payload
            .as_mut()
            .ok_or_else(|| missing_payload("matrix_deserialize", self.config.name()))?;
        ops.matrix_deserialize(payload, active, column, row_offset)
    }

    /// Look up one value by key; `Ok(None)` if the key is unknown.
    pub fn user_get(&self, key: &str, internal: bool) -> Result<Option<f64>> {
        let ops = self.capable(Capability::UserGet)?;
        ops.user_get(self.present("user_get")?, &self.config, key, internal)
    }

    fn checked_ops(&self, operation: &'static str) -> Result<Arc<dyn NodeOps>> {
        if self.ops.kind() != self.kind {
            return Err(kind_mismatch(operation, self.kind, self.ops.kind()));
        }
        if let Some(payload) = &self.payload {
            if payload.kind() != self.kind {
                return Err(kind_mismatch(operation, self.kind, payload.kind()));
            }
        }
        Ok(Arc::clone(&self.ops))
    }

    fn capable(&self, capability: Capability) -> Result<Arc<dyn NodeOps>> {
        let ops = self.checked_ops(capability.name())?;
        if ops.supports(capability) {
            Ok(ops)
        } else {
            Err(unsupported(self.kind, capability.name()))
        }
    }

    fn present(&self, operation: &'static str) -> Result<&Payload> {
        self.payload
            .as_ref()
            .ok_or_else(|| missing_payload(operation, self.config.name()))
    }
}

fn missing_payload(operation: &str, parameter: &str) -> EnsError {
    EnsError::invalid_state(format!("{operation} on {parameter} requires a payload"))
}
