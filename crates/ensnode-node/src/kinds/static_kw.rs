//! Raw immutable simulator keyword.
//!
//! The keyword is carried through unchanged from one report step to the
//! next. A freshly allocated payload is empty until the keyword is read from
//! the run directory or loaded from the store.

use std::path::Path;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};
use ensnode_types::ImplKind;

use crate::config::NodeConfig;
use crate::forward_model::{ForwardModelReader, ForwardModelWriter};
use crate::keyword::EclKeyword;
use crate::ops::{Capability, NodeOps};
use crate::payload::{Payload, PayloadVariant, downcast};

const EMPTY: i32 = 0;
const LOADED: i32 = 1;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StaticKw {
    keyword: Option<EclKeyword>,
}

impl StaticKw {
    #[must_use]
    pub const fn empty() -> Self {
        Self { keyword: None }
    }

    #[must_use]
    pub const fn with_keyword(keyword: EclKeyword) -> Self {
        Self {
            keyword: Some(keyword),
        }
    }

    #[must_use]
    pub const fn keyword(&self) -> Option<&EclKeyword> {
        self.keyword.as_ref()
    }

    fn loaded(&self, parameter: &str) -> Result<&EclKeyword> {
        self.keyword.as_ref().ok_or_else(|| {
            EnsError::invalid_state(format!("static keyword {parameter} has not been loaded"))
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StaticKwOps;

impl NodeOps for StaticKwOps {
    fn kind(&self) -> ImplKind {
        ImplKind::StaticKw
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::EclWrite | Capability::EclRead | Capability::UserGet)
    }

    fn alloc(&self, config: &NodeConfig) -> Result<Payload> {
        config.static_kw()?;
        Ok(StaticKw::empty().into_payload())
    }

    fn store(&self, payload: &Payload, writer: &mut BufferWriter) -> Result<()> {
        match &downcast::<StaticKw>(payload, "store")?.keyword {
            None => {
                writer.write_i32(EMPTY);
                Ok(())
            }
            Some(keyword) => {
                writer.write_i32(LOADED);
                keyword.buffer_store(writer)
            }
        }
    }

    fn load(&self, config: &NodeConfig, reader: &mut BufferReader<'_>) -> Result<Payload> {
        let cfg = config.static_kw()?;
        match reader.read_i32("static keyword state")? {
            EMPTY => Ok(StaticKw::empty().into_payload()),
            LOADED => {
                let keyword = EclKeyword::buffer_load(reader)?;
                if keyword.name() != cfg.keyword {
                    return Err(EnsError::corrupt(format!(
                        "static keyword record holds {}, expected {}",
                        keyword.name(),
                        cfg.keyword
                    )));
                }
                Ok(StaticKw::with_keyword(keyword).into_payload())
            }
            other => Err(EnsError::corrupt(format!(
                "static keyword state flag {other} is neither {EMPTY} nor {LOADED}"
            ))),
        }
    }

    fn validate(&self, payload: &Payload, config: &NodeConfig) -> Result<()> {
        let cfg = config.static_kw()?;
        match &downcast::<StaticKw>(payload, "validate")?.keyword {
            Some(keyword) if keyword.name() != cfg.keyword => Err(EnsError::invalid_state(
                format!("static keyword {} does not match {}", keyword.name(), cfg.keyword),
            )),
            _ => Ok(()),
        }
    }

    fn ecl_write(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        run_path: &Path,
        writer: &mut dyn ForwardModelWriter,
    ) -> Result<()> {
        let keyword = downcast::<StaticKw>(payload, "ecl_write")?.loaded(config.name())?;
        writer.write_keyword(run_path, &config.static_kw()?.file, keyword)
    }

    fn ecl_read(
        &self,
        config: &NodeConfig,
        run_path: &Path,
        reader: &dyn ForwardModelReader,
    ) -> Result<Payload> {
        let cfg = config.static_kw()?;
        let keyword = reader.read_keyword(run_path, &cfg.file, &cfg.keyword)?;
        Ok(StaticKw::with_keyword(keyword).into_payload())
    }

    fn user_get(
        &self,
        payload: &Payload,
        config: &NodeConfig,
        key: &str,
        _internal: bool,
    ) -> Result<Option<f64>> {
        let keyword = downcast::<StaticKw>(payload, "user_get")?.loaded(config.name())?;
        Ok(key
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| keyword.data().get_f64(index)))
    }
}
