//! Kind tags.
//!
//! A kind tag is the small integer written at the front of every stored
//! node record. The numeric values are part of the at-rest format and must
//! never be renumbered.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable tag of a static (immutable) simulator keyword.
pub const STATIC_KW_TAG: i32 = 100;
/// Stable tag of a grid field.
pub const FIELD_TAG: i32 = 104;
/// Stable tag of a named scalar keyword set.
pub const GEN_KW_TAG: i32 = 107;
/// Stable tag of a structural fault parameter set.
pub const FAULT_TAG: i32 = 109;
/// Stable tag of a dynamic summary result.
pub const SUMMARY_TAG: i32 = 110;

/// Concrete payload kind carried by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplKind {
    StaticKw,
    Field,
    GenKw,
    Fault,
    Summary,
}

impl ImplKind {
    /// Every kind, in tag order.
    pub const ALL: [Self; 5] = [
        Self::StaticKw,
        Self::Field,
        Self::GenKw,
        Self::Fault,
        Self::Summary,
    ];

    /// The at-rest tag.
    #[must_use]
    pub const fn tag(self) -> i32 {
        match self {
            Self::StaticKw => STATIC_KW_TAG,
            Self::Field => FIELD_TAG,
            Self::GenKw => GEN_KW_TAG,
            Self::Fault => FAULT_TAG,
            Self::Summary => SUMMARY_TAG,
        }
    }

    /// Resolve an at-rest tag. Unknown tags yield `None`.
    #[must_use]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            STATIC_KW_TAG => Some(Self::StaticKw),
            FIELD_TAG => Some(Self::Field),
            GEN_KW_TAG => Some(Self::GenKw),
            FAULT_TAG => Some(Self::Fault),
            SUMMARY_TAG => Some(Self::Summary),
            _ => None,
        }
    }

    /// Short lowercase name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StaticKw => "static_kw",
            Self::Field => "field",
            Self::GenKw => "gen_kw",
            Self::Fault => "fault",
            Self::Summary => "summary",
        }
    }

    /// The role a node of this kind plays unless its configuration says
    /// otherwise.
    #[must_use]
    pub const fn default_var_type(self) -> VarType {
        match self {
            Self::StaticKw => VarType::StaticState,
            Self::Field => VarType::DynamicState,
            Self::GenKw | Self::Fault => VarType::Parameter,
            Self::Summary => VarType::DynamicResult,
        }
    }
}

impl fmt::Display for ImplKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role of a node within a report-step cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    /// Sampled once from a prior, updated by the analysis.
    Parameter,
    /// Simulator state carried between report steps.
    DynamicState,
    /// Simulator output; only meaningful at the step it was produced.
    DynamicResult,
    /// Opaque simulator state passed through untouched.
    StaticState,
}

impl VarType {
    /// Whether the value is produced by the forward model (and therefore
    /// dropped between report steps).
    #[must_use]
    pub const fn is_dynamic(self) -> bool {
        matches!(self, Self::DynamicState | Self::DynamicResult)
    }
}
