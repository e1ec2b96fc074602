//! Per-file symbol tables: fonts, colors, variables and subroutines
//! defined anywhere in a document's command tree.
//!
//! Tables are ordered (`BTreeMap`) so everything generated from them is
//! deterministic.

use crate::ast::{self, Command, CommandKind, Document, Operand};
use std::collections::{BTreeMap, BTreeSet};

// ──────────────────────────────────────────────
// Fonts
// ──────────────────────────────────────────────

/// Source font names and the target family they stand for.
const FONT_FAMILIES: &[(&str, &str)] = &[
    ("ARIAL", "Arial"),
    ("ARIALB", "Arial Bold"),
    ("ARIALO", "Arial Italic"),
    ("ARIALBO", "Arial Bold Italic"),
    ("COURIER", "Courier New"),
    ("COURIERB", "Courier New Bold"),
    ("COURIERO", "Courier New Italic"),
    ("COURIERBO", "Courier New Bold Italic"),
    ("HELVETICA", "Helvetica"),
    ("HELVE", "Helvetica"),
    ("HELVEB", "Helvetica Bold"),
    ("TIMES", "Times New Roman"),
    ("TIMESB", "Times New Roman Bold"),
    ("TIMESI", "Times New Roman Italic"),
    ("TIMESBI", "Times New Roman Bold Italic"),
    ("NZDB", "NZDB"),
];

/// Target family for a source font name; unknown names pass through.
pub fn font_family(font: &str) -> String {
    let key = font.to_ascii_uppercase();
    FONT_FAMILIES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| (*v).to_owned())
        .unwrap_or_else(|| font.to_owned())
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontEntry {
    pub alias: String,
    /// Source font name (`ARIALB`)
    pub font: String,
    pub size: f64,
    /// Alias this entry had before conflict resolution renamed it
    pub renamed_from: Option<String>,
    pub file: String,
    pub line: u32,
}

impl FontEntry {
    pub fn family(&self) -> String {
        font_family(&self.font)
    }

    /// Same face and size, regardless of alias or origin.
    pub fn same_definition(&self, other: &FontEntry) -> bool {
        self.font.eq_ignore_ascii_case(&other.font) && (self.size - other.size).abs() < 1e-9
    }
}

/// A run of text and the `~~XX` font switch that precedes it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct FontRun<'t> {
    pub font: Option<String>,
    pub text: &'t str,
}

/// Split `text` at inline `~~XX` font switches. The marker is the longest
/// alias in `aliases` that follows `~~`, or else up to two alphanumerics.
/// A `~~` followed by neither stays literal.
pub fn split_font_switches<'t>(text: &'t str, aliases: &BTreeSet<String>) -> Vec<FontRun<'t>> {
    let mut runs = Vec::new();
    let mut font: Option<String> = None;
    let mut start = 0;
    let mut search = 0;
    while let Some(found) = text[search..].find("~~") {
        let at = search + found;
        let rest = &text[at + 2..];
        let marker = aliases
            .iter()
            .filter(|a| !a.is_empty() && rest.starts_with(a.as_str()))
            .max_by_key(|a| a.len())
            .cloned()
            .unwrap_or_else(|| {
                rest.chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .take(2)
                    .collect()
            });
        if marker.is_empty() {
            search = at + 2;
            continue;
        }
        if at > start || font.is_some() {
            runs.push(FontRun {
                font: font.take(),
                text: &text[start..at],
            });
        }
        start = at + 2 + marker.len();
        search = start;
        font = Some(marker);
    }
    if start < text.len() || font.is_some() {
        runs.push(FontRun {
            font,
            text: &text[start..],
        });
    }
    runs
}

/// Rewrite `~~OLD` font switches through `renames`.
pub fn rename_font_switches(
    text: &str,
    aliases: &BTreeSet<String>,
    renames: &BTreeMap<String, String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    for run in split_font_switches(text, aliases) {
        if let Some(font) = &run.font {
            out.push_str("~~");
            out.push_str(renames.get(font).unwrap_or(font));
        }
        out.push_str(run.text);
    }
    out
}

// ──────────────────────────────────────────────
// Colors
// ──────────────────────────────────────────────

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("BLACK", (0, 0, 0)),
    ("FBLACK", (0, 0, 0)),
    ("WHITE", (255, 255, 255)),
    ("RED", (255, 0, 0)),
    ("GREEN", (0, 255, 0)),
    ("BLUE", (0, 0, 255)),
    ("YELLOW", (255, 255, 0)),
    ("CYAN", (0, 255, 255)),
    ("MAGENTA", (255, 0, 255)),
    ("ORANGE", (255, 165, 0)),
    ("GRAY", (128, 128, 128)),
    ("LIGHTGRAY", (191, 191, 191)),
    ("DARKGRAY", (64, 64, 64)),
    ("LMED", (217, 217, 217)),
    ("MED", (217, 217, 217)),
    ("XDRK", (166, 166, 166)),
];

/// Built-in single-letter color selectors and the named color each means
/// when the document never indexes it.
pub const LETTER_COLORS: &[(&str, &str)] = &[
    ("B", "BLACK"),
    ("C", "CYAN"),
    ("G", "GREEN"),
    ("K", "BLACK"),
    ("M", "MAGENTA"),
    ("R", "RED"),
    ("W", "WHITE"),
    ("Y", "YELLOW"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Resolve a named color.
pub fn named_color(name: &str) -> Option<Rgb> {
    let key = name.to_ascii_uppercase();
    NAMED_COLORS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, (r, g, b))| Rgb(*r, *g, *b))
}

/// Resolve an `INDEXCOLOR` value: a color name or an `[r g b]` array of
/// fractions (values above 1 are taken as 0-255). Unknown names resolve to
/// black.
pub fn resolve_color(value: &Operand) -> Rgb {
    match value {
        Operand::Array(parts) => {
            let nums: Vec<f64> = parts.iter().filter_map(Operand::as_number).collect();
            if nums.len() != 3 {
                return Rgb(0, 0, 0);
            }
            let scale = if nums.iter().all(|v| *v <= 1.0) {
                255.0
            } else {
                1.0
            };
            let channel = |v: f64| (v * scale).round().clamp(0.0, 255.0) as u8;
            Rgb(channel(nums[0]), channel(nums[1]), channel(nums[2]))
        }
        other => other
            .as_text()
            .and_then(named_color)
            .unwrap_or(Rgb(0, 0, 0)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorEntry {
    pub alias: String,
    pub rgb: Rgb,
    pub renamed_from: Option<String>,
    pub file: String,
    pub line: u32,
}

// ──────────────────────────────────────────────
// Variables and subroutines
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Scalar,
    String,
    Array,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub name: String,
    pub kind: VariableKind,
    pub initial: Operand,
    pub init_only: bool,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubroutineEntry {
    pub name: String,
    pub body: Vec<Command>,
    /// Commands in the body at any depth
    pub command_count: usize,
    pub file: String,
    pub line: u32,
}

// ──────────────────────────────────────────────
// Table
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    pub file: String,
    pub fonts: BTreeMap<String, FontEntry>,
    pub colors: BTreeMap<String, ColorEntry>,
    pub variables: BTreeMap<String, VariableEntry>,
    pub subroutines: BTreeMap<String, SubroutineEntry>,
}

impl SymbolTable {
    /// Collect every definition in `doc`. A later definition of the same
    /// alias within one file replaces the earlier one; the first SETVAR
    /// of a variable fixes its kind and initial value.
    pub fn collect(doc: &Document) -> Self {
        let mut table = SymbolTable {
            file: doc.file.clone(),
            ..Default::default()
        };
        let file = doc.file.as_str();
        ast::walk(&doc.commands, &mut |cmd| match &cmd.kind {
            CommandKind::DefineFont { alias, font, size } => {
                table.fonts.insert(
                    alias.clone(),
                    FontEntry {
                        alias: alias.clone(),
                        font: font.clone(),
                        size: *size,
                        renamed_from: None,
                        file: file.to_owned(),
                        line: cmd.line,
                    },
                );
            }
            CommandKind::DefineColor { alias, value } => {
                table.colors.insert(
                    alias.clone(),
                    ColorEntry {
                        alias: alias.clone(),
                        rgb: resolve_color(value),
                        renamed_from: None,
                        file: file.to_owned(),
                        line: cmd.line,
                    },
                );
            }
            CommandKind::SetVar {
                name,
                value,
                init_only,
            } => {
                table
                    .variables
                    .entry(name.clone())
                    .or_insert_with(|| VariableEntry {
                        name: name.clone(),
                        kind: variable_kind(value),
                        initial: value.clone(),
                        init_only: *init_only,
                        file: file.to_owned(),
                        line: cmd.line,
                    });
            }
            CommandKind::Resource { name, body } => {
                let mut count = 0;
                ast::walk(body, &mut |_| count += 1);
                table.subroutines.insert(
                    name.clone(),
                    SubroutineEntry {
                        name: name.clone(),
                        body: body.clone(),
                        command_count: count,
                        file: file.to_owned(),
                        line: cmd.line,
                    },
                );
            }
            _ => {}
        });
        table
    }

    /// Size of a font alias, if this table defines it.
    pub fn font_size(&self, alias: &str) -> Option<f64> {
        self.fonts.get(alias).map(|f| f.size)
    }
}

fn variable_kind(value: &Operand) -> VariableKind {
    match value {
        Operand::Str { .. } | Operand::Formatted { .. } => VariableKind::String,
        Operand::Array(_) => VariableKind::Array,
        _ => VariableKind::Scalar,
    }
}
