//! `DRAWB` boxes and rules.
//!
//! A run of consecutive drawing primitives shares one anchor taken from
//! the current print position; each primitive is placed relative to it.

use super::{num, Generator};
use crate::ast::Operand;
use crate::error::GenerationInvariantError;
use crate::symbols::{named_color, LETTER_COLORS};

/// Boxes at most this thick on either side are drawn as rules.
const RULE_MAX_MM: f64 = 1.0;
const MIN_EXTENT_MM: f64 = 0.01;
const THIN_EXTENT_MM: f64 = 0.1;
const DEFAULT_THICKNESS_MM: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LineType {
    Solid,
    Dashed,
    Dotted,
}

impl LineType {
    fn word(self) -> &'static str {
        match self {
            LineType::Solid => "SOLID",
            LineType::Dashed => "DASHED",
            LineType::Dotted => "DOTTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct BoxStyle {
    pub color: Option<String>,
    pub shade: Option<u32>,
    pub line: LineType,
}

/// Split a style word such as `XDRK`, `R_S2` or `LDSH`. A word naming a
/// color is used whole; otherwise the part before `_` may name one and
/// the remaining parts are shade and line modifiers.
pub(super) fn box_style(style: &str, is_color: impl Fn(&str) -> bool) -> BoxStyle {
    let mut parsed = BoxStyle {
        color: None,
        shade: None,
        line: LineType::Solid,
    };
    if style.is_empty() {
        return parsed;
    }
    if is_color(style) {
        parsed.color = Some(style.to_owned());
        return parsed;
    }
    for (i, part) in style.split('_').enumerate() {
        match part {
            "S1" => parsed.shade = Some(100),
            "S2" => parsed.shade = Some(75),
            "S3" => parsed.shade = Some(50),
            "S4" => parsed.shade = Some(25),
            "LDSH" | "DSH" => parsed.line = LineType::Dashed,
            "LDOT" | "DOT" => parsed.line = LineType::Dotted,
            head if i == 0 && is_color(head) => parsed.color = Some(head.to_owned()),
            _ => {}
        }
    }
    parsed
}

/// Built-in color words usable without an `INDEXCOLOR`.
pub(super) fn builtin_color(name: &str) -> bool {
    LETTER_COLORS.iter().any(|(l, _)| *l == name) || named_color(name).is_some()
}

/// Thickness keywords accepted in place of a height.
fn thickness_word(word: &str) -> Option<f64> {
    match word {
        "LTHN" => Some(0.1),
        "LMED" => Some(0.2),
        "LTHK" => Some(0.5),
        _ => None,
    }
}

fn extent(v: f64) -> f64 {
    let v = v.abs();
    if v < MIN_EXTENT_MM {
        THIN_EXTENT_MM
    } else {
        v
    }
}

fn anchored(base: &str, offset: f64) -> String {
    format!("({}+{} MM)", base, num(offset))
}

impl<'a> Generator<'a> {
    pub(super) fn is_color(&self, name: &str) -> bool {
        self.symbols.colors.contains_key(name) || builtin_color(name)
    }

    /// Offsets below the anchor's origin are clamped to it.
    fn non_negative(&mut self, line: u32, axis: char, offset: f64) -> f64 {
        if offset < 0.0 {
            self.report.clamp(self.file, line, axis, offset);
            0.0
        } else {
            offset
        }
    }

    pub(super) fn draw_box(
        &mut self,
        line: u32,
        geometry: [&Operand; 4],
        style: &Operand,
    ) -> Result<(), GenerationInvariantError> {
        let [x, y, width, height] = geometry;
        for op in geometry {
            if matches!(op, Operand::Proc(_) | Operand::Cond(_)) {
                return Err(self.invariant(line, format!("DRAWB geometry is a {}", op.describe())));
            }
        }
        let (Some(x), Some(y), Some(w)) = (x.as_number(), y.as_number(), width.as_number()) else {
            self.report.unsupported(
                "DRAWB",
                self.file,
                line,
                Some("geometry computed at run time".to_owned()),
            );
            self.out.comment("VIPP command not directly supported: DRAWB with run-time geometry");
            return Ok(());
        };
        let (h, thickness_only) = match height.as_number() {
            Some(h) => (h, false),
            None => (
                height
                    .as_text()
                    .and_then(thickness_word)
                    .unwrap_or(DEFAULT_THICKNESS_MM),
                true,
            ),
        };
        let style = box_style(style.as_text().unwrap_or(""), |n| self.is_color(n));

        let y = if self.state.inverts_y() { -y } else { y };
        let x = self.non_negative(line, 'x', x);
        let y = self.non_negative(line, 'y', y);

        if self.state.anchor() {
            self.out.line("POSY = $SL_CURRY;");
            self.out.line("POSX = $SL_CURRX;");
        }
        let position = format!("POSITION {} {}", anchored("POSX", x), anchored("POSY", y));
        let (w, h) = (extent(w), extent(h));

        if thickness_only || w.min(h) <= RULE_MAX_MM {
            let across = thickness_only || w >= h;
            let (length, thickness) = if across { (w, h) } else { (h, w) };
            self.out.line("RULE");
            self.out.indent();
            self.out.line(position);
            self.out
                .line(format!("DIRECTION {}", if across { "ACROSS" } else { "DOWN" }));
            if let Some(c) = &style.color {
                self.out.line(format!("COLOR {}", c));
            }
            self.out.line(format!("LENGTH {} MM", num(length)));
            self.out.line(format!(
                "THICKNESS {} MM TYPE {};",
                num(thickness),
                style.line.word()
            ));
            self.out.dedent();
        } else {
            self.out.line("BOX");
            self.out.indent();
            self.out.line(position);
            self.out.line(format!("WIDTH {} MM", num(w)));
            self.out.line(format!("HEIGHT {} MM", num(h)));
            if let Some(c) = &style.color {
                self.out.line(format!("COLOR {}", c));
            }
            self.out.line(format!(
                "THICKNESS 0 TYPE {} SHADE {};",
                style.line.word(),
                style.shade.unwrap_or(100)
            ));
            self.out.dedent();
        }
        Ok(())
    }
}
