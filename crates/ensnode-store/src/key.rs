//! Store addressing.

use std::fmt;
use std::path::{Path, PathBuf};

use ensnode_error::{EnsError, Result};

/// Address of one stored node record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub parameter: String,
    pub member: usize,
    pub report_step: usize,
}

impl NodeKey {
    /// Build a key, rejecting parameter names that are not a single plain
    /// path component.
    pub fn new(parameter: impl Into<String>, member: usize, report_step: usize) -> Result<Self> {
        let parameter = parameter.into();
        let plain = !parameter.is_empty()
            && parameter != "."
            && parameter != ".."
            && !parameter.contains(['/', '\\', '\0'])
            && !parameter.ends_with(".tmp");
        if !plain {
            return Err(EnsError::config(format!(
                "parameter name {parameter:?} cannot be used as a store key"
            )));
        }
        Ok(Self {
            parameter,
            member,
            report_step,
        })
    }

    /// `<root>/step_NNNN/member_NNNN/<parameter>`
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&format!("step_{:04}", self.report_step))
            .join(format!("member_{:04}", self.member))
            .join(&self.parameter)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (member {}, step {})",
            self.parameter, self.member, self.report_step
        )
    }
}
