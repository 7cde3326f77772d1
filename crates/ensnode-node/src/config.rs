//! Parameter configuration.
//!
//! A [`NodeConfig`] describes one named parameter for the whole ensemble.
//! It is built once, wrapped in an `Arc`, and shared read-only by every
//! member's node. [`EnsembleConfig`] loads a set of them from TOML
//! declarations:
//!
//! ```toml
//! ensemble_size = 50
//! seed = 1234
//!
//! [[parameter]]
//! kind = "gen_kw"
//! name = "MULTPV"
//! elements = [
//!     { name = "BOX1", transform = { type = "uniform", min = 0.5, max = 1.5 } },
//! ]
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ensnode_error::{EnsError, Result};
use ensnode_types::{ImplKind, VarType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::forward_model::TemplateTarget;
use crate::keyword::validate_keyword_name;
use crate::transform::{OutputTransform, Truncation};

/// One named scalar element and its output transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarElement {
    pub name: String,
    #[serde(default)]
    pub transform: OutputTransform,
}

/// Ordered set of named scalar elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarConfig {
    elements: Vec<ScalarElement>,
}

impl ScalarConfig {
    pub fn new(elements: Vec<ScalarElement>) -> Result<Self> {
        if elements.is_empty() {
            return Err(EnsError::config("scalar parameter needs at least one element"));
        }
        let mut seen = BTreeSet::new();
        for element in &elements {
            if element.name.is_empty() {
                return Err(EnsError::config("element name must not be empty"));
            }
            if !seen.insert(element.name.as_str()) {
                return Err(EnsError::config(format!(
                    "duplicate element name {}",
                    element.name
                )));
            }
            element.transform.validate()?;
        }
        Ok(Self { elements })
    }

    #[must_use]
    pub fn data_size(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn elements(&self) -> &[ScalarElement] {
        &self.elements
    }

    /// Position of element `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Transformed output values paired with element names.
    #[must_use]
    pub fn output_pairs<'a>(&'a self, values: &[f64]) -> Vec<(&'a str, f64)> {
        self.elements
            .iter()
            .zip(values)
            .map(|(element, &x)| (element.name.as_str(), element.transform.apply(x)))
            .collect()
    }
}

/// Named scalar keyword set, written as a parameter file and optionally
/// substituted into one template.
#[derive(Debug, Clone, PartialEq)]
pub struct GenKwConfig {
    pub scalars: ScalarConfig,
    pub template: Option<TemplateTarget>,
}

/// Structural fault parameters, substituted into a list of templates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    pub scalars: ScalarConfig,
    pub templates: Vec<TemplateTarget>,
}

/// Immutable simulator keyword passed through between report steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticKwConfig {
    pub keyword: String,
    pub file: String,
}

/// Grid field over an `nx * ny * nz` box.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConfig {
    pub keyword: String,
    pub dims: [usize; 3],
    pub file: String,
    pub transform: OutputTransform,
    pub truncation: Option<Truncation>,
}

impl FieldConfig {
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Linear index of 0-based cell `(i, j, k)`.
    #[must_use]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> Option<usize> {
        let [nx, ny, nz] = self.dims;
        (i < nx && j < ny && k < nz).then(|| i + j * nx + k * nx * ny)
    }

    /// Output value of one internal cell value.
    #[must_use]
    pub fn output(&self, x: f64) -> f64 {
        let y = self.transform.apply(x);
        self.truncation.map_or(y, |t| t.apply(y))
    }
}

/// One scalar simulator result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryConfig {
    pub key: String,
    pub file: String,
}

/// Kind-specific part of a [`NodeConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum KindConfig {
    GenKw(GenKwConfig),
    Fault(FaultConfig),
    StaticKw(StaticKwConfig),
    Field(FieldConfig),
    Summary(SummaryConfig),
}

impl KindConfig {
    #[must_use]
    pub const fn kind(&self) -> ImplKind {
        match self {
            Self::GenKw(_) => ImplKind::GenKw,
            Self::Fault(_) => ImplKind::Fault,
            Self::StaticKw(_) => ImplKind::StaticKw,
            Self::Field(_) => ImplKind::Field,
            Self::Summary(_) => ImplKind::Summary,
        }
    }
}

/// Shared, immutable description of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    name: String,
    var_type: VarType,
    detail: KindConfig,
}

macro_rules! kind_config_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        /// Kind-specific configuration; `KindMismatch` for any other kind.
        pub fn $fn_name(&self) -> Result<&$ty> {
            match &self.detail {
                KindConfig::$variant(cfg) => Ok(cfg),
                other => Err(EnsError::KindMismatch {
                    operation: "config access",
                    expected: ImplKind::$variant.tag(),
                    found: other.kind().tag(),
                }),
            }
        }
    };
}

impl NodeConfig {
    /// Build a configuration with the kind's default role.
    pub fn new(name: impl Into<String>, detail: KindConfig) -> Result<Self> {
        let var_type = detail.kind().default_var_type();
        Self::with_var_type(name, detail, var_type)
    }

    pub fn with_var_type(
        name: impl Into<String>,
        detail: KindConfig,
        var_type: VarType,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(EnsError::config("parameter name must not be empty"));
        }
        match &detail {
            KindConfig::GenKw(_) | KindConfig::Fault(_) | KindConfig::Summary(_) => {}
            KindConfig::StaticKw(cfg) => validate_keyword_name(&cfg.keyword)?,
            KindConfig::Field(cfg) => {
                validate_keyword_name(&cfg.keyword)?;
                if cfg.data_size() == 0 {
                    return Err(EnsError::config(format!(
                        "field {name} has an empty grid {:?}",
                        cfg.dims
                    )));
                }
                cfg.transform.validate()?;
                if let Some(t) = &cfg.truncation {
                    t.validate()?;
                }
            }
        }
        Ok(Self {
            name,
            var_type,
            detail,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> ImplKind {
        self.detail.kind()
    }

    #[must_use]
    pub const fn var_type(&self) -> VarType {
        self.var_type
    }

    #[must_use]
    pub const fn detail(&self) -> &KindConfig {
        &self.detail
    }

    /// Number of scalar elements a payload of this parameter holds.
    ///
    /// Static keywords have no fixed size and report 0.
    #[must_use]
    pub fn data_size(&self) -> usize {
        match &self.detail {
            KindConfig::GenKw(cfg) => cfg.scalars.data_size(),
            KindConfig::Fault(cfg) => cfg.scalars.data_size(),
            KindConfig::Field(cfg) => cfg.data_size(),
            KindConfig::Summary(_) => 1,
            KindConfig::StaticKw(_) => 0,
        }
    }

    kind_config_accessor!(gen_kw, GenKw, GenKwConfig);
    kind_config_accessor!(fault, Fault, FaultConfig);
    kind_config_accessor!(static_kw, StaticKw, StaticKwConfig);
    kind_config_accessor!(field, Field, FieldConfig);
    kind_config_accessor!(summary, Summary, SummaryConfig);
}

/// Serialized form of one parameter declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ParameterDecl {
    GenKw {
        name: String,
        elements: Vec<ScalarElement>,
        #[serde(default)]
        template: Option<TemplateTarget>,
    },
    Fault {
        name: String,
        elements: Vec<ScalarElement>,
        #[serde(default)]
        templates: Vec<TemplateTarget>,
    },
    StaticKw {
        name: String,
        #[serde(default)]
        keyword: Option<String>,
        file: String,
    },
    Field {
        name: String,
        #[serde(default)]
        keyword: Option<String>,
        dims: [usize; 3],
        file: String,
        #[serde(default)]
        transform: OutputTransform,
        #[serde(default)]
        truncate: Option<Truncation>,
        #[serde(default)]
        var_type: Option<VarType>,
    },
    Summary {
        name: String,
        #[serde(default)]
        key: Option<String>,
        file: String,
    },
}

impl ParameterDecl {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::GenKw { name, .. }
            | Self::Fault { name, .. }
            | Self::StaticKw { name, .. }
            | Self::Field { name, .. }
            | Self::Summary { name, .. } => name,
        }
    }

    /// Validate and convert into a shared configuration.
    pub fn build(self) -> Result<NodeConfig> {
        match self {
            Self::GenKw {
                name,
                elements,
                template,
            } => NodeConfig::new(
                name,
                KindConfig::GenKw(GenKwConfig {
                    scalars: ScalarConfig::new(elements)?,
                    template,
                }),
            ),
            Self::Fault {
                name,
                elements,
                templates,
            } => NodeConfig::new(
                name,
                KindConfig::Fault(FaultConfig {
                    scalars: ScalarConfig::new(elements)?,
                    templates,
                }),
            ),
            Self::StaticKw {
                name,
                keyword,
                file,
            } => {
                let keyword = keyword.unwrap_or_else(|| name.clone());
                NodeConfig::new(name, KindConfig::StaticKw(StaticKwConfig { keyword, file }))
            }
            Self::Field {
                name,
                keyword,
                dims,
                file,
                transform,
                truncate,
                var_type,
            } => {
                let keyword = keyword.unwrap_or_else(|| name.clone());
                let detail = KindConfig::Field(FieldConfig {
                    keyword,
                    dims,
                    file,
                    transform,
                    truncation: truncate,
                });
                let var_type = var_type.unwrap_or_else(|| ImplKind::Field.default_var_type());
                NodeConfig::with_var_type(name, detail, var_type)
            }
            Self::Summary { name, key, file } => {
                let key = key.unwrap_or_else(|| name.clone());
                NodeConfig::new(name, KindConfig::Summary(SummaryConfig { key, file }))
            }
        }
    }
}

const fn default_workers() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnsembleDecl {
    ensemble_size: usize,
    #[serde(default)]
    seed: u64,
    #[serde(default = "default_workers")]
    workers: usize,
    #[serde(default)]
    store_root: Option<PathBuf>,
    #[serde(default, rename = "parameter")]
    parameters: Vec<ParameterDecl>,
}

/// Ensemble-wide settings plus every declared parameter.
#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    pub ensemble_size: usize,
    pub seed: u64,
    pub workers: usize,
    pub store_root: Option<PathBuf>,
    parameters: Vec<Arc<NodeConfig>>,
}

impl EnsembleConfig {
    /// Parse and validate TOML declarations.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let decl: EnsembleDecl =
            toml::from_str(text).map_err(|err| EnsError::config(err.to_string()))?;
        if decl.ensemble_size == 0 {
            return Err(EnsError::config("ensemble_size must be at least 1"));
        }
        if decl.workers == 0 {
            return Err(EnsError::config("workers must be at least 1"));
        }

        let mut names = BTreeSet::new();
        let mut parameters = Vec::with_capacity(decl.parameters.len());
        for param in decl.parameters {
            if !names.insert(param.name().to_owned()) {
                return Err(EnsError::config(format!(
                    "duplicate parameter {}",
                    param.name()
                )));
            }
            parameters.push(Arc::new(param.build()?));
        }
        info!(
            ensemble_size = decl.ensemble_size,
            parameters = parameters.len(),
            "ensemble configuration loaded"
        );
        Ok(Self {
            ensemble_size: decl.ensemble_size,
            seed: decl.seed,
            workers: decl.workers,
            store_root: decl.store_root,
            parameters,
        })
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            EnsError::config(format!("reading {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Every parameter, in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[Arc<NodeConfig>] {
        &self.parameters
    }

    /// Look up a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Arc<NodeConfig>> {
        self.parameters.iter().find(|p| p.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = r#"
ensemble_size = 4
seed = 99
workers = 2

[[parameter]]
kind = "gen_kw"
name = "MULTPV"
elements = [
    { name = "BOX1", transform = { type = "uniform", min = 0.5, max = 1.5 } },
    { name = "BOX2" },
]

[[parameter]]
kind = "fault"
name = "FAULTS"
elements = [{ name = "F1", transform = { type = "loguniform", min = 0.001, max = 1.0 } }]
templates = [{ template = "faults.tmpl", target = "faults.inc" }]

[[parameter]]
kind = "field"
name = "PERMX"
dims = [2, 3, 1]
file = "PERMX.bin"
transform = { type = "exp" }
truncate = { min = 1.0, max = 5000.0 }
var_type = "parameter"

[[parameter]]
kind = "static_kw"
name = "ACTNUM"
file = "RESTART.bin"

[[parameter]]
kind = "summary"
name = "FOPT"
file = "summary.txt"
"#;

    #[test]
    fn loads_every_kind() {
        let cfg = EnsembleConfig::from_toml_str(DECK).unwrap();
        assert_eq!(cfg.ensemble_size, 4);
        assert_eq!(cfg.seed, 99);
        assert_eq!(cfg.workers, 2);
        let kinds: Vec<ImplKind> = cfg.parameters().iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ImplKind::GenKw,
                ImplKind::Fault,
                ImplKind::Field,
                ImplKind::StaticKw,
                ImplKind::Summary
            ]
        );

        let multpv = cfg.parameter("MULTPV").unwrap();
        assert_eq!(multpv.data_size(), 2);
        assert_eq!(multpv.gen_kw().unwrap().scalars.index_of("BOX2"), Some(1));

        let permx = cfg.parameter("PERMX").unwrap();
        assert_eq!(permx.data_size(), 6);
        assert_eq!(permx.var_type(), VarType::Parameter);
        assert_eq!(permx.field().unwrap().keyword, "PERMX");

        let fopt = cfg.parameter("FOPT").unwrap();
        assert_eq!(fopt.summary().unwrap().key, "FOPT");
        assert_eq!(fopt.var_type(), VarType::DynamicResult);
    }

    #[test]
    fn wrong_accessor_is_kind_mismatch() {
        let cfg = EnsembleConfig::from_toml_str(DECK).unwrap();
        let err = cfg.parameter("ACTNUM").unwrap().field().unwrap_err();
        assert!(matches!(err, EnsError::KindMismatch { expected: 104, found: 100, .. }));
    }

    #[test]
    fn duplicate_parameter_rejected() {
        let text = r#"
ensemble_size = 2
[[parameter]]
kind = "summary"
name = "FOPT"
file = "s.txt"
[[parameter]]
kind = "summary"
name = "FOPT"
file = "s.txt"
"#;
        let err = EnsembleConfig::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("duplicate parameter FOPT"));
    }

    #[test]
    fn invalid_transform_rejected() {
        let text = r#"
ensemble_size = 2
[[parameter]]
kind = "gen_kw"
name = "P"
elements = [{ name = "A", transform = { type = "uniform", min = 2.0, max = 1.0 } }]
"#;
        assert!(matches!(
            EnsembleConfig::from_toml_str(text),
            Err(EnsError::Config { .. })
        ));
    }

    #[test]
    fn unknown_kind_rejected() {
        let text = "ensemble_size = 1\n[[parameter]]\nkind = \"relperm\"\nname = \"X\"\n";
        assert!(EnsembleConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn scalar_config_rules() {
        assert!(ScalarConfig::new(vec![]).is_err());
        let dup = vec![
            ScalarElement {
                name: "A".into(),
                transform: OutputTransform::None,
            },
            ScalarElement {
                name: "A".into(),
                transform: OutputTransform::None,
            },
        ];
        assert!(ScalarConfig::new(dup).is_err());
    }

    #[test]
    fn field_cell_index_is_column_major_in_i() {
        let cfg = FieldConfig {
            keyword: "PORO".into(),
            dims: [4, 3, 2],
            file: "PORO.bin".into(),
            transform: OutputTransform::None,
            truncation: None,
        };
        assert_eq!(cfg.cell_index(0, 0, 0), Some(0));
        assert_eq!(cfg.cell_index(1, 0, 0), Some(1));
        assert_eq!(cfg.cell_index(0, 1, 0), Some(4));
        assert_eq!(cfg.cell_index(0, 0, 1), Some(12));
        assert_eq!(cfg.cell_index(4, 0, 0), None);
    }
}
