//! Helpers shared by kinds whose payload is a plain vector of doubles.

use ensnode_buffer::BufferReader;
use ensnode_error::{EnsError, Result};
use ensnode_types::ImplKind;
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

use crate::config::ScalarConfig;

/// One N(0, 1) draw.
pub fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    StandardNormal.sample(rng)
}

pub fn fill_standard_normal(values: &mut [f64], rng: &mut dyn RngCore) {
    for value in values {
        *value = standard_normal(rng);
    }
}

/// Read a counted f64 vector and check it against the configured size.
pub fn load_values(
    reader: &mut BufferReader<'_>,
    expected: usize,
    kind: ImplKind,
) -> Result<Vec<f64>> {
    let values = reader.read_f64_vec(kind.name())?;
    if values.len() != expected {
        return Err(EnsError::corrupt(format!(
            "{kind} record holds {} values, configuration expects {expected}",
            values.len()
        )));
    }
    Ok(values)
}

pub fn check_len(values: &[f64], expected: usize, kind: ImplKind) -> Result<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(EnsError::dimension(format!(
            "{kind} payload holds {} values, configuration expects {expected}",
            values.len()
        )))
    }
}

/// Value of element `key`, internal or output-transformed.
pub fn scalar_get(
    scalars: &ScalarConfig,
    values: &[f64],
    key: &str,
    internal: bool,
) -> Option<f64> {
    let index = scalars.index_of(key)?;
    let x = *values.get(index)?;
    if internal {
        Some(x)
    } else {
        Some(scalars.elements()[index].transform.apply(x))
    }
}
