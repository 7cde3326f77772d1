//! Output transforms.
//!
//! Nodes keep their values in an internal representation (for sampled
//! parameters: standard-normal draws). A transform maps an internal value to
//! the value the simulator sees. Transforms run only on the forward-model
//! write path and in user queries; never on store/load or across the
//! analysis matrix.

use std::f64::consts::SQRT_2;

use ensnode_error::{EnsError, Result};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

/// Mapping from internal value to output value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputTransform {
    /// Identity.
    #[default]
    None,
    /// `mean + std * x`.
    Normal { mean: f64, std: f64 },
    /// `exp(mean + std * x)`; `mean`/`std` are in log space.
    Lognormal { mean: f64, std: f64 },
    /// `min + Φ(x) * (max - min)`.
    Uniform { min: f64, max: f64 },
    /// Uniform in log space between `min` and `max`.
    Loguniform { min: f64, max: f64 },
    /// Always `value`.
    Const { value: f64 },
    Exp,
    Log,
    Pow10,
}

impl OutputTransform {
    /// Map one internal value.
    #[must_use]
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Self::None => x,
            Self::Normal { mean, std } => std.mul_add(x, mean),
            Self::Lognormal { mean, std } => std.mul_add(x, mean).exp(),
            Self::Uniform { min, max } => normal_cdf(x).mul_add(max - min, min),
            Self::Loguniform { min, max } => {
                let (lo, hi) = (min.ln(), max.ln());
                normal_cdf(x).mul_add(hi - lo, lo).exp()
            }
            Self::Const { value } => value,
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Pow10 => 10f64.powf(x),
        }
    }

    /// Reject parameterizations that cannot produce finite output.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Normal { std, .. } | Self::Lognormal { std, .. } if std < 0.0 => Err(
                EnsError::config(format!("transform std must be non-negative, got {std}")),
            ),
            Self::Uniform { min, max } if min >= max => Err(EnsError::config(format!(
                "uniform transform needs min < max, got [{min}, {max}]"
            ))),
            Self::Loguniform { min, max } if min <= 0.0 || min >= max => {
                Err(EnsError::config(format!(
                    "loguniform transform needs 0 < min < max, got [{min}, {max}]"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Clamp applied after the transform (fields only).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Truncation {
    pub min: f64,
    pub max: f64,
}

impl Truncation {
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min > self.max || self.min.is_nan() || self.max.is_nan() {
            return Err(EnsError::config(format!(
                "truncation needs min <= max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Standard normal cumulative distribution function.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < TOL);
        assert!((normal_cdf(1.0) - 0.841_344_746).abs() < TOL);
        assert!((normal_cdf(-1.96) - 0.024_997_895).abs() < TOL);
        assert!(normal_cdf(10.0) > 0.999_999);
    }

    #[test]
    fn uniform_maps_zero_to_midpoint() {
        let t = OutputTransform::Uniform { min: 2.0, max: 6.0 };
        assert!((t.apply(0.0) - 4.0).abs() < TOL);
        assert!(t.apply(-8.0) >= 2.0 && t.apply(8.0) <= 6.0);
    }

    #[test]
    fn loguniform_maps_zero_to_geometric_mean() {
        let t = OutputTransform::Loguniform { min: 1.0, max: 100.0 };
        assert!((t.apply(0.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn simple_transforms() {
        assert_eq!(OutputTransform::None.apply(1.5), 1.5);
        assert_eq!(OutputTransform::Normal { mean: 10.0, std: 2.0 }.apply(1.0), 12.0);
        assert_eq!(OutputTransform::Const { value: 3.0 }.apply(-9.0), 3.0);
        assert!((OutputTransform::Pow10.apply(2.0) - 100.0).abs() < 1e-9);
        assert!((OutputTransform::Exp.apply(0.0) - 1.0).abs() < 1e-12);
        assert!((OutputTransform::Lognormal { mean: 0.0, std: 1.0 }.apply(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn validation() {
        assert!(OutputTransform::Uniform { min: 1.0, max: 1.0 }.validate().is_err());
        assert!(OutputTransform::Loguniform { min: 0.0, max: 1.0 }.validate().is_err());
        assert!(OutputTransform::Normal { mean: 0.0, std: -1.0 }.validate().is_err());
        assert!(OutputTransform::Exp.validate().is_ok());
        assert!(Truncation { min: 1.0, max: 0.0 }.validate().is_err());
        assert_eq!(Truncation { min: 0.0, max: 1.0 }.apply(4.0), 1.0);
    }

    #[test]
    fn serde_tagged_form() {
        let t: OutputTransform = toml::from_str("type = \"uniform\"\nmin = 0.0\nmax = 1.0").unwrap();
        assert_eq!(t, OutputTransform::Uniform { min: 0.0, max: 1.0 });
        let t: OutputTransform = toml::from_str("type = \"exp\"").unwrap();
        assert_eq!(t, OutputTransform::Exp);
    }
}
