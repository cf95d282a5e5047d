//! Validation options.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Knobs for the validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Slack added on both sides of every tendon range for the rest-pose check.
    pub tendon_tolerance: f64,
    /// Accept a free joint on the root body.
    pub allow_free_root: bool,
    /// Reject touch sensors bound to sites without extents instead of warning.
    pub strict_touch_sites: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            tendon_tolerance: 0.0,
            allow_free_root: true,
            strict_touch_sites: false,
        }
    }
}

impl LoadOptions {
    /// Deserialize from TOML string. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reject option values no model could be checked against.
    pub fn check(&self) -> Result<()> {
        let tol = self.tendon_tolerance;
        if !tol.is_finite() || tol < 0.0 {
            return Err(ModelError::invalid_parameter(
                "options",
                "tendon_tolerance",
                format!("must be finite and non-negative, got {tol}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml() {
        let opts = LoadOptions::from_toml("strict_touch_sites = true").unwrap();
        assert!(opts.strict_touch_sites);
        assert!(opts.allow_free_root);
        assert_eq!(opts.tendon_tolerance, 0.0);
    }

    #[test]
    fn tolerance_must_be_finite_and_non_negative() {
        assert!(LoadOptions::default().check().is_ok());
        for tol in [f64::NAN, f64::INFINITY, -0.002] {
            let opts = LoadOptions {
                tendon_tolerance: tol,
                ..LoadOptions::default()
            };
            assert!(matches!(
                opts.check(),
                Err(ModelError::InvalidParameter { parameter: "tendon_tolerance", .. })
            ));
        }
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(LoadOptions::from_toml("").unwrap(), LoadOptions::default());
    }
}
