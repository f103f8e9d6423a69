//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const STORE_BACKENDS: &[&str] = &["sqlite", "memory"];
const CAPTION_PROVIDERS: &[&str] = &["none", "ollama", "anthropic", "openai"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.processing.accepted_content_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.accepted_content_types must not be empty".into(),
            ));
        }
        if self.limits.max_upload_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_upload_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.thumbnail.small_size == 0 || self.thumbnail.medium_size == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.small_size and thumbnail.medium_size must be > 0".into(),
            ));
        }
        if self.thumbnail.small_size > self.thumbnail.medium_size {
            return Err(ConfigError::ValidationError(
                "thumbnail.small_size must not exceed thumbnail.medium_size".into(),
            ));
        }
        for (name, quality) in [
            ("thumbnail.quality", self.thumbnail.quality),
            ("thumbnail.normalize_quality", self.thumbnail.normalize_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 and 100"
                )));
            }
        }
        if !STORE_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be one of {STORE_BACKENDS:?}, got {:?}",
                self.storage.backend
            )));
        }
        if !CAPTION_PROVIDERS.contains(&self.caption.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "caption.provider must be one of {CAPTION_PROVIDERS:?}, got {:?}",
                self.caption.provider
            )));
        }
        if let Some(file) = &self.logging.file {
            if file.trim().is_empty() || file.contains(['/', '\\']) {
                return Err(ConfigError::ValidationError(format!(
                    "logging.file must be a plain file name, got {file:?}"
                )));
            }
        }
        if self.caption.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "caption.timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel_workers() {
        let mut config = Config::default();
        config.processing.parallel_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }

    #[test]
    fn test_validate_rejects_zero_thumbnail_size() {
        let mut config = Config::default();
        config.thumbnail.small_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thumbnail.small_size"));
    }

    #[test]
    fn test_validate_rejects_inverted_thumbnail_sizes() {
        let mut config = Config::default();
        config.thumbnail.small_size = 600;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn test_validate_rejects_bad_quality() {
        let mut config = Config::default();
        config.thumbnail.normalize_quality = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("normalize_quality"));

        let mut config = Config::default();
        config.thumbnail.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thumbnail.quality"));
    }

    #[test]
    fn test_validate_log_file_name() {
        let mut config = Config::default();
        config.logging.file = Some("nested/app.log".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.file"));

        config.logging.file = Some("  ".to_string());
        assert!(config.validate().is_err());

        config.logging.file = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut config = Config::default();
        config.storage.backend = "postgres".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.backend"));
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = Config::default();
        config.caption.provider = "blip".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("caption.provider"));
    }

    #[test]
    fn test_validate_rejects_empty_content_types() {
        let mut config = Config::default();
        config.processing.accepted_content_types.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("accepted_content_types"));
    }
}
