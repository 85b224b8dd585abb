//! Engine configuration.
//!
//! Configuration is a small JSON document. The signing secret may be
//! supplied (or overridden) through the `SKP_SERVICE_SECRET` environment
//! variable so it does not have to live on disk next to the state file.
//!
//! ```json
//! {
//!     "service_secret": "change-me",
//!     "video_threshold": 80.0,
//!     "package_threshold": 100.0,
//!     "assessment_threshold": 60.0,
//!     "certification_number_prefix": "CERT"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProgressionError, Result};
use crate::graph::ContentKind;

/// Environment variable that overrides `service_secret`.
pub const SECRET_ENV_VAR: &str = "SKP_SERVICE_SECRET";

/// Runtime configuration for a [`ProgressionEngine`](crate::engine::ProgressionEngine).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Secret keying the certification signatures.
    pub service_secret: String,
    /// Default completion percentage for Video nodes.
    pub video_threshold: f64,
    /// Default completion percentage for Package nodes.
    pub package_threshold: f64,
    /// Default passing score for Assessment nodes.
    pub assessment_threshold: f64,
    /// Prefix of human-facing certification numbers.
    pub certification_number_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_secret: String::new(),
            video_threshold: 80.0,
            package_threshold: 100.0,
            assessment_threshold: 60.0,
            certification_number_prefix: "CERT".to_string(),
        }
    }
}

// The secret must never end up in logs.
impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("service_secret", &"<redacted>")
            .field("video_threshold", &self.video_threshold)
            .field("package_threshold", &self.package_threshold)
            .field("assessment_threshold", &self.assessment_threshold)
            .field(
                "certification_number_prefix",
                &self.certification_number_prefix,
            )
            .finish()
    }
}

impl EngineConfig {
    /// Build a configuration with the given secret and default thresholds.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            service_secret: secret.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file, then apply environment overrides.
    ///
    /// A missing file is not an error: defaults are used and the secret must
    /// then come from the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let bytes = std::fs::read(path)?;
            serde_json::from_slice::<EngineConfig>(&bytes).map_err(|e| {
                ProgressionError::InvalidFileFormat(format!(
                    "failed to parse config file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            EngineConfig::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SKP_SERVICE_SECRET` if it is set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.is_empty() {
                self.service_secret = secret;
            }
        }
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.service_secret.is_empty() {
            return Err(ProgressionError::InvalidConfig(format!(
                "service secret is empty (set it in the config file or via {SECRET_ENV_VAR})"
            )));
        }
        for (name, value) in [
            ("video_threshold", self.video_threshold),
            ("package_threshold", self.package_threshold),
            ("assessment_threshold", self.assessment_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ProgressionError::InvalidConfig(format!(
                    "{name} must be within 0-100, got {value}"
                )));
            }
        }
        if self.certification_number_prefix.trim().is_empty() {
            return Err(ProgressionError::InvalidConfig(
                "certification number prefix is empty".into(),
            ));
        }
        Ok(())
    }

    /// Default completion threshold for a content kind.
    pub fn default_threshold(&self, kind: ContentKind) -> f64 {
        self.thresholds().for_kind(kind)
    }

    /// The per-kind default thresholds, without the secret.
    pub fn thresholds(&self) -> ThresholdDefaults {
        ThresholdDefaults {
            video: self.video_threshold,
            package: self.package_threshold,
            assessment: self.assessment_threshold,
        }
    }
}

/// Default completion thresholds per content kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDefaults {
    pub video: f64,
    pub package: f64,
    pub assessment: f64,
}

impl Default for ThresholdDefaults {
    fn default() -> Self {
        EngineConfig::default().thresholds()
    }
}

impl ThresholdDefaults {
    /// Threshold used for a kind when the node sets none.
    pub fn for_kind(&self, kind: ContentKind) -> f64 {
        match kind {
            ContentKind::Video => self.video,
            ContentKind::Package => self.package,
            ContentKind::Assessment => self.assessment,
        }
    }
}
