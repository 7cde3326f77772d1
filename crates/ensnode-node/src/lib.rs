//! Type-erased ensemble nodes.
//!
//! A [`Node`] wraps one concrete parameter or state payload behind the
//! [`NodeOps`] capability table of its kind. Orchestration code (the
//! ensemble store, the analysis update, the forward-model writer) only ever
//! sees `Node` and dispatches through it; concrete kinds live in [`kinds`].

pub mod config;
pub mod forward_model;
pub mod keyword;
pub mod kinds;
pub mod node;
pub mod ops;
pub mod payload;
pub mod registry;
pub mod transform;

pub use config::{EnsembleConfig, KindConfig, NodeConfig, ParameterDecl};
pub use forward_model::{ForwardModelReader, ForwardModelWriter, RunPathIo, TemplateTarget};
pub use keyword::{EclKeyword, KeywordData};
pub use node::{Node, peek_kind};
pub use ops::{Capability, NodeOps};
pub use payload::{Payload, PayloadVariant};
pub use registry::NodeRegistry;
pub use transform::OutputTransform;
