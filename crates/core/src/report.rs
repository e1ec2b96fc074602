//! Non-fatal diagnostics collected while translating one main document.
//!
//! Every warning is also logged through `tracing` when it is recorded; the
//! [`Report`] is the structured copy handed to callers.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Font,
    Color,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Font => write!(f, "font"),
            SymbolKind::Color => write!(f, "color"),
        }
    }
}

/// An alias defined differently in two files; the later definition was
/// renamed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictWarning {
    pub kind: SymbolKind,
    pub alias: String,
    pub renamed_to: String,
    pub file: String,
    pub line: u32,
    /// File whose definition kept the original name
    pub original_file: String,
}

/// An empty DOCFORMAT emitted for a dispatch value that is compared
/// against but never defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
    pub value: String,
    pub docformat: String,
    pub file: String,
    pub line: u32,
}

/// A recognized command with no translation; a marked comment was emitted
/// in its place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnsupportedConstructWarning {
    pub keyword: String,
    pub file: String,
    pub line: u32,
    pub detail: Option<String>,
}

/// A drawing coordinate that would have been negative after axis
/// inversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClampedCoordinate {
    pub file: String,
    pub line: u32,
    pub axis: char,
    pub value: f64,
    pub clamped_to: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnusedOperand {
    pub file: String,
    pub line: u32,
    pub operand: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Segment,
    Image,
    Object,
}

/// An external resource the output refers to by name. Staging the file
/// itself is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ResourceRef {
    pub name: String,
    pub kind: ResourceKind,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub conflicts: Vec<ConflictWarning>,
    pub placeholders: Vec<Placeholder>,
    pub unsupported: Vec<UnsupportedConstructWarning>,
    pub clamped: Vec<ClampedCoordinate>,
    pub unused_operands: Vec<UnusedOperand>,
    pub resources: Vec<ResourceRef>,
    /// Overlay files translated alongside the main document
    pub overlays: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conflict(&mut self, warning: ConflictWarning) {
        tracing::warn!(
            kind = %warning.kind,
            alias = %warning.alias,
            renamed_to = %warning.renamed_to,
            file = %warning.file,
            line = warning.line,
            "alias redefined with different attributes; renamed"
        );
        self.conflicts.push(warning);
    }

    pub fn placeholder(&mut self, placeholder: Placeholder) {
        tracing::warn!(
            value = %placeholder.value,
            docformat = %placeholder.docformat,
            "placeholder emitted for undefined dispatch target"
        );
        self.placeholders.push(placeholder);
    }

    pub fn unsupported(&mut self, keyword: &str, file: &str, line: u32, detail: Option<String>) {
        tracing::warn!(keyword, file, line, "command not directly supported");
        self.unsupported.push(UnsupportedConstructWarning {
            keyword: keyword.to_owned(),
            file: file.to_owned(),
            line,
            detail,
        });
    }

    pub fn clamp(&mut self, file: &str, line: u32, axis: char, value: f64) {
        tracing::warn!(file, line, %axis, value, "negative drawing offset clamped to 0");
        self.clamped.push(ClampedCoordinate {
            file: file.to_owned(),
            line,
            axis,
            value,
            clamped_to: 0.0,
        });
    }

    pub fn unused(&mut self, file: &str, line: u32, operand: String) {
        tracing::debug!(file, line, operand = %operand, "operand never consumed");
        self.unused_operands.push(UnusedOperand {
            file: file.to_owned(),
            line,
            operand,
        });
    }

    /// Record a resource reference once per name and kind.
    pub fn resource(&mut self, name: &str, kind: ResourceKind, file: &str, line: u32) {
        if self
            .resources
            .iter()
            .any(|r| r.name == name && r.kind == kind)
        {
            return;
        }
        self.resources.push(ResourceRef {
            name: name.to_owned(),
            kind,
            file: file.to_owned(),
            line,
        });
    }

    pub fn warning_count(&self) -> usize {
        self.conflicts.len()
            + self.placeholders.len()
            + self.unsupported.len()
            + self.clamped.len()
            + self.unused_operands.len()
    }

    /// One-line summary for text output.
    pub fn summary(&self) -> String {
        format!(
            "{} conflict(s), {} placeholder(s), {} unsupported, {} clamped, {} unused operand(s), {} resource(s)",
            self.conflicts.len(),
            self.placeholders.len(),
            self.unsupported.len(),
            self.clamped.len(),
            self.unused_operands.len(),
            self.resources.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_are_deduplicated_by_name_and_kind() {
        let mut r = Report::new();
        r.resource("LOGO", ResourceKind::Segment, "a.frm", 1);
        r.resource("LOGO", ResourceKind::Segment, "a.frm", 9);
        r.resource("LOGO", ResourceKind::Image, "a.frm", 9);
        assert_eq!(r.resources.len(), 2);
    }

    #[test]
    fn report_serializes_all_sections() {
        let mut r = Report::new();
        r.clamp("m.dbm", 4, 'y', -3.0);
        r.unsupported("CLIP", "m.dbm", 5, None);
        let v = serde_json::to_value(&r).unwrap();
        for key in [
            "conflicts",
            "placeholders",
            "unsupported",
            "clamped",
            "unused_operands",
            "resources",
            "overlays",
        ] {
            assert!(v.get(key).is_some(), "missing section {}", key);
        }
        assert_eq!(v["clamped"][0]["axis"], "y");
        assert_eq!(r.warning_count(), 2);
    }
}
