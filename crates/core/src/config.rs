//! Translation settings.
//!
//! Every field has a default, so an empty TOML file is a valid config:
//!
//! ```toml
//! delimiter = ";"
//! record_length = 8192
//! inline_threshold = 3
//! extra_overlays = ["forms/TERMS.FRM"]
//!
//! [layouts.CASIOS]
//! origin = [12.0, 20.0]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslateConfig {
    /// Record field delimiter; a `SETDBSEP` in the source wins
    pub delimiter: String,
    pub record_length: u32,
    pub channel_code: String,
    /// Record that ends a document; `None` disables document boundaries
    pub document_separator: Option<String>,
    /// Font used before any font selection
    pub default_font: String,
    /// Subroutines with at most this many commands are inlined
    pub inline_threshold: usize,
    /// Literal text longer than this is emitted as wrapped TEXT
    pub text_wrap_threshold: usize,
    /// Longest string literal inside one TEXT statement
    pub text_chunk_width: usize,
    /// Overlays translated even when no SETFORM names them
    pub extra_overlays: Vec<String>,
    pub layouts: BTreeMap<String, LayoutConfig>,
}

/// Per-form overrides, keyed by the form's target name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Page layout origin in millimetres
    pub origin: Option<[f64; 2]>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        TranslateConfig {
            delimiter: "|".to_owned(),
            record_length: 4096,
            channel_code: "NO".to_owned(),
            document_separator: Some("1".to_owned()),
            default_font: "ARIAL08".to_owned(),
            inline_threshold: 5,
            text_wrap_threshold: 50,
            text_chunk_width: 70,
            extra_overlays: Vec::new(),
            layouts: BTreeMap::new(),
        }
    }
}

impl TranslateConfig {
    pub fn layout_origin(&self, form: &str) -> Option<(f64, f64)> {
        self.layouts
            .get(form)
            .and_then(|l| l.origin)
            .map(|[x, y]| (x, y))
    }
}
