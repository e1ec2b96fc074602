//! Translation settings file for `vippdfa translate --config`.
//!
//! # Example
//!
//! ```toml
//! delimiter = ";"
//! document_separator = "1"
//! inline_threshold = 3
//! extra_overlays = ["TERMS.FRM"]
//!
//! [layouts.CASIOS]
//! origin = [12.0, 20.0]
//! ```

use std::path::Path;

use vippdfa_core::TranslateConfig;

/// Load a [`TranslateConfig`] from a TOML file.
///
/// Missing keys take their defaults; unknown keys are rejected.
pub fn read_translate_config(path: &Path) -> Result<TranslateConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Command-line values that override the settings file.
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub delimiter: Option<&'a str>,
    pub inline_threshold: Option<usize>,
    pub no_document_separator: bool,
    pub overlays: &'a [String],
}

impl Overrides<'_> {
    pub fn apply(&self, config: &mut TranslateConfig) {
        if let Some(d) = self.delimiter {
            config.delimiter = d.to_owned();
        }
        if let Some(n) = self.inline_threshold {
            config.inline_threshold = n;
        }
        if self.no_document_separator {
            config.document_separator = None;
        }
        for overlay in self.overlays {
            if !config.extra_overlays.contains(overlay) {
                config.extra_overlays.push(overlay.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_config_parses() {
        let cfg: TranslateConfig = toml::from_str(
            r#"
delimiter = ";"
record_length = 8192
extra_overlays = ["TERMS.FRM"]

[layouts.CASIOS]
origin = [12.0, 20.0]
"#,
        )
        .unwrap();
        assert_eq!(cfg.delimiter, ";");
        assert_eq!(cfg.record_length, 8192);
        assert_eq!(cfg.extra_overlays, vec!["TERMS.FRM".to_string()]);
        assert_eq!(cfg.layout_origin("CASIOS"), Some((12.0, 20.0)));
        assert_eq!(cfg.inline_threshold, TranslateConfig::default().inline_threshold);
    }

    #[test]
    fn unknown_key_is_reported_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delimeter = \";\"").unwrap();
        let err = read_translate_config(file.path()).unwrap_err();
        assert!(err.starts_with("could not parse"), "{}", err);
        assert!(err.contains(&file.path().display().to_string()), "{}", err);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = read_translate_config(Path::new("/nonexistent/vippdfa.toml")).unwrap_err();
        assert!(err.starts_with("could not read"), "{}", err);
    }

    #[test]
    fn overrides_win_over_file() {
        let mut cfg = TranslateConfig {
            extra_overlays: vec!["A.FRM".into()],
            ..TranslateConfig::default()
        };
        let overlays = vec!["A.FRM".to_string(), "B.FRM".to_string()];
        Overrides {
            delimiter: Some(","),
            inline_threshold: Some(0),
            no_document_separator: true,
            overlays: &overlays,
        }
        .apply(&mut cfg);
        assert_eq!(cfg.delimiter, ",");
        assert_eq!(cfg.inline_threshold, 0);
        assert_eq!(cfg.document_separator, None);
        assert_eq!(cfg.extra_overlays, vec!["A.FRM".to_string(), "B.FRM".to_string()]);
    }
}
