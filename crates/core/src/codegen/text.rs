//! Text placement: OUTPUT for single lines, TEXT for wrapped, justified or
//! font-switched content, and table rows.

use super::{font_correction, num, quote, Generator};
use crate::ast::{Align, Operand};
use crate::error::GenerationInvariantError;
use crate::state::Placement;
use crate::symbols::split_font_switches;

// ──────────────────────────────────────────────
// Pure helpers
// ──────────────────────────────────────────────

/// A piece of `$$NAME.` substituted text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Piece {
    Literal(String),
    Variable(String),
}

/// Split text at `$$NAME.` variable references.
pub(crate) fn vsub_pieces(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    while let Some(at) = rest.find("$$") {
        let after = &rest[at + 2..];
        let name_len = after
            .char_indices()
            .take_while(|(i, c)| {
                c.is_ascii_alphanumeric() && (*i > 0 || !c.is_ascii_digit()) || *c == '_'
            })
            .count();
        if name_len > 0 && after[name_len..].starts_with('.') {
            literal.push_str(&rest[..at]);
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Variable(after[..name_len].to_owned()));
            rest = &after[name_len + 1..];
        } else {
            literal.push_str(&rest[..at + 2]);
            rest = after;
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

/// `Total: $$VAR_T.` -> `'Total: ' ! VAR_T`
pub(crate) fn vsub_expression(text: &str) -> String {
    let pieces = vsub_pieces(text);
    if pieces.is_empty() {
        return "''".to_owned();
    }
    pieces
        .iter()
        .map(|p| match p {
            Piece::Literal(s) => quote(s),
            Piece::Variable(v) => v.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ! ")
}

/// Numeric picture: `@` is an optional digit (`#`), `#` a required one
/// (`0`). Repeated thousands groups collapse to `#,` plus the last group.
pub(crate) fn numpicture(picture: &str) -> String {
    let pic = picture.trim_matches(|c| c == '(' || c == ')');
    let digits = |s: &str| -> String {
        s.chars()
            .filter_map(|c| match c {
                '@' => Some('#'),
                '#' => Some('0'),
                _ => None,
            })
            .collect()
    };
    let (int, dec) = match pic.rsplit_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (pic, None),
    };
    let int = match int.rsplit_once(',') {
        Some((_, last)) => format!("#,{}", digits(last)),
        None => digits(int),
    };
    match dec {
        Some(d) => format!("{}.{}", int, digits(d)),
        None => int,
    }
}

/// Split into pieces of at most `width` characters.
pub(crate) fn chunks(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Literal text goes through TEXT when it wraps, justifies or switches
/// style inline; everything else is a single OUTPUT.
pub(crate) fn needs_text(text: &str, align: Align, width: Option<f64>, wrap_threshold: usize) -> bool {
    width.is_some()
        || align == Align::Justify
        || text.contains("~~")
        || text.contains("**")
        || text.chars().count() > wrap_threshold
}

pub(crate) fn align_word(align: Align) -> &'static str {
    match align {
        Align::Left => "LEFT",
        Align::Right => "RIGHT",
        Align::Center => "CENTER",
        Align::Justify => "JUSTIFY",
    }
}

pub(crate) fn position(x: &Placement, y: &Placement, correction: Option<&str>) -> String {
    let corr = correction.map(|c| format!("+{}", c)).unwrap_or_default();
    let x = match x {
        Placement::At(v) => format!("({} MM-$MR_LEFT)", num(*v)),
        Placement::Expr(e) => format!("(MM({})-$MR_LEFT)", e),
        Placement::Offset(n) => offset(*n),
        Placement::Same | Placement::Next => "(SAME)".to_owned(),
    };
    let y = match y {
        Placement::At(v) => format!("({} MM-$MR_TOP{})", num(*v), corr),
        Placement::Expr(e) => format!("(MM({})-$MR_TOP{})", e, corr),
        Placement::Offset(n) => offset(*n),
        Placement::Same => "(SAME)".to_owned(),
        Placement::Next => "(NEXT)".to_owned(),
    };
    format!("POSITION {} {}", x, y)
}

fn offset(n: f64) -> String {
    if n < 0.0 {
        format!("(SAME-{} MM)", num(-n))
    } else {
        format!("(SAME+{} MM)", num(n))
    }
}

/// `[(cell) width ...]` or `[[(cell) width] ...]`.
fn table_cells(op: &Operand) -> Option<Vec<(&Operand, f64)>> {
    let Operand::Array(items) = op else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    if items.iter().all(|i| matches!(i, Operand::Array(p) if p.len() == 2)) {
        return items
            .iter()
            .map(|i| match i {
                Operand::Array(p) => p[1].as_number().map(|w| (&p[0], w)),
                _ => None,
            })
            .collect();
    }
    if items.len() % 2 != 0 {
        return None;
    }
    items
        .chunks(2)
        .map(|pair| match &pair[0] {
            Operand::Number(_) => None,
            cell => pair[1].as_number().map(|w| (cell, w)),
        })
        .collect()
}

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

impl<'a> Generator<'a> {
    pub(super) fn show(
        &mut self,
        content: &Operand,
        align: Align,
        width: Option<f64>,
        line: u32,
    ) -> Result<(), GenerationInvariantError> {
        self.state.end_drawing_run();
        if let Some(cells) = table_cells(content) {
            self.table_row(&cells, align);
            self.state.placed();
            return Ok(());
        }
        match content {
            Operand::Str { text, vsub } => {
                if needs_text(text, align, width, self.config.text_wrap_threshold) {
                    self.text_block(text, *vsub, align, width);
                } else {
                    let expr = if *vsub {
                        vsub_expression(text)
                    } else {
                        quote(text)
                    };
                    self.output(&expr, align);
                }
            }
            Operand::Proc(_) | Operand::Cond(_) => {
                return Err(self.invariant(line, format!("{} reached text output", content.describe())));
            }
            other => {
                let expr = self.value(other);
                if width.is_some() || align == Align::Justify {
                    self.text_expression(&expr, align, width);
                } else {
                    self.output(&expr, align);
                }
            }
        }
        self.state.placed();
        Ok(())
    }

    fn correction(&self, font: &str) -> Option<&'static str> {
        self.font_size(font).map(font_correction)
    }

    fn current_position(&self, font: &str) -> String {
        position(
            &self.state.pos.next_x,
            &self.state.pos.next_y,
            self.correction(font),
        )
    }

    fn color_line(&mut self) {
        if let Some(color) = self.state.style.color.clone() {
            self.out.line(format!("COLOR {}", color));
        }
    }

    fn output(&mut self, expr: &str, align: Align) {
        let font = self.font();
        let pos = self.current_position(&font);
        self.out.line(format!("OUTPUT {}", expr));
        self.out.indent();
        self.out.line(format!("FONT {} NORMAL", font));
        self.out.line(pos);
        self.color_line();
        self.out.line(format!("ALIGN {} NOPAD;", align_word(align)));
        self.out.dedent();
    }

    fn text_header(&mut self, align: Align, width: Option<f64>) -> String {
        let font = self.font();
        let pos = self.current_position(&font);
        self.out.line("TEXT");
        self.out.indent();
        self.out.line(pos);
        if let Some(w) = width {
            self.out.line(format!("WIDTH {} MM", num(w)));
        }
        self.out.line(format!("FONT {} NORMAL", font));
        self.color_line();
        self.out.line(format!("ALIGN {}", align_word(align)));
        font
    }

    fn text_block(&mut self, text: &str, vsub: bool, align: Align, width: Option<f64>) {
        self.text_header(align, width);
        let aliases = self.symbols.font_aliases();
        for run in split_font_switches(text, &aliases) {
            if run.text.is_empty() {
                continue;
            }
            if let Some(font) = &run.font {
                self.out.line(format!("FONT {} NORMAL", font));
            }
            let pieces = if vsub {
                vsub_pieces(run.text)
            } else {
                vec![Piece::Literal(run.text.to_owned())]
            };
            for piece in pieces {
                match piece {
                    Piece::Literal(s) => {
                        for chunk in chunks(&s, self.config.text_chunk_width) {
                            self.out.line(quote(&chunk));
                        }
                    }
                    Piece::Variable(v) => self.out.line(format!("({})", v)),
                }
            }
        }
        self.out.line(";");
        self.out.dedent();
    }

    fn text_expression(&mut self, expr: &str, align: Align, width: Option<f64>) {
        self.text_header(align, width);
        self.out.line(format!("({})", expr));
        self.out.line(";");
        self.out.dedent();
    }

    /// Each cell starts at the row's x plus the widths of the cells before
    /// it.
    fn table_row(&mut self, cells: &[(&Operand, f64)], align: Align) {
        let base = match self.state.pos.next_x {
            Placement::At(x) => x,
            _ => self.state.pos.x,
        };
        let font = self.font();
        let correction = self.correction(&font);
        let mut y = self.state.pos.next_y.clone();
        let mut left = base;
        for (cell, width) in cells {
            let anchor = match align {
                Align::Right => left + width,
                Align::Center => left + width / 2.0,
                Align::Left | Align::Justify => left,
            };
            let expr = self.value(cell);
            self.out.line(format!("OUTPUT {}", expr));
            self.out.indent();
            self.out.line(format!("FONT {} NORMAL", font));
            self.out.line(position(&Placement::At(anchor), &y, correction));
            self.color_line();
            let word = if align == Align::Justify {
                "LEFT"
            } else {
                align_word(align)
            };
            self.out.line(format!("ALIGN {} NOPAD;", word));
            self.out.dedent();
            left += width;
            y = Placement::Same;
        }
    }

    /// Advance a line with an empty OUTPUT so following text lands on it.
    pub(super) fn new_line(&mut self, amount: Option<f64>) {
        self.state.end_drawing_run();
        let font = self.font();
        let pending_x = self.state.pos.next_x.clone();
        let pending_y = self.state.pos.next_y.clone();
        if let Placement::Expr(_) = pending_y {
            let pos = self.current_position(&font);
            self.blank_output(&font, pos);
        }
        let advance = self.state.new_line(amount);
        let x = match pending_x {
            Placement::At(_) | Placement::Expr(_) => pending_x,
            _ => Placement::Same,
        };
        let y = match pending_y {
            Placement::At(_) => Placement::At(self.state.pos.y),
            _ => advance,
        };
        let correction = match y {
            Placement::At(_) => self.correction(&font),
            _ => None,
        };
        self.blank_output(&font, position(&x, &y, correction));
    }

    fn blank_output(&mut self, font: &str, pos: String) {
        self.out.line("OUTPUT ''");
        self.out.indent();
        self.out.line(format!("FONT {} NORMAL", font));
        self.out.line(format!("{};", pos));
        self.out.dedent();
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::render;
    use super::*;

    #[test]
    fn vsub_splits_literals_and_variables() {
        assert_eq!(
            vsub_pieces("Dear $$VAR_NAME., total $$T1.$"),
            vec![
                Piece::Literal("Dear ".into()),
                Piece::Variable("VAR_NAME".into()),
                Piece::Literal(", total ".into()),
                Piece::Variable("T1".into()),
                Piece::Literal("$".into()),
            ]
        );
        assert_eq!(vsub_expression("$$A. and $$B."), "A ! ' and ' ! B");
        assert_eq!(vsub_expression("no vars $$ here"), "'no vars $$ here'");
    }

    #[test]
    fn numpicture_maps_digits_and_collapses_groups() {
        assert_eq!(numpicture("@@@,@@@,@@#.##"), "#,##0.00");
        assert_eq!(numpicture("(@@#.##)"), "##0.00");
        assert_eq!(numpicture("@@@,@@#"), "#,##0");
    }

    #[test]
    fn chunks_respect_character_boundaries() {
        assert_eq!(chunks("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(chunks("ééé", 2), vec!["éé", "é"]);
    }

    #[test]
    fn text_needed_for_long_justified_or_switched_text() {
        assert!(!needs_text("short", Align::Left, None, 50));
        assert!(needs_text(&"x".repeat(51), Align::Left, None, 50));
        assert!(needs_text("short", Align::Justify, None, 50));
        assert!(needs_text("a ~~FBb", Align::Left, None, 50));
        assert!(needs_text("short", Align::Left, Some(40.0), 50));
    }

    #[test]
    fn position_formats_each_placement() {
        assert_eq!(
            position(&Placement::At(24.0), &Placement::At(49.91), Some("&CORFONT6")),
            "POSITION (24 MM-$MR_LEFT) (49.91 MM-$MR_TOP+&CORFONT6)"
        );
        assert_eq!(
            position(&Placement::Same, &Placement::Offset(-4.0), None),
            "POSITION (SAME) (SAME-4 MM)"
        );
        assert_eq!(
            position(&Placement::Expr("VAR_X".into()), &Placement::Next, None),
            "POSITION (MM(VAR_X)-$MR_LEFT) (NEXT)"
        );
    }

    #[test]
    fn short_literal_is_single_output_with_font_correction() {
        let out = render("/FA /ARIAL 8 INDEXFONT FA 20 40 MOVETO (It's) SH");
        assert!(out.contains("OUTPUT 'It''s'"), "{}", out);
        assert!(out.contains("FONT FA NORMAL"), "{}", out);
        assert!(
            out.contains("POSITION (20 MM-$MR_LEFT) (40 MM-$MR_TOP+&CORFONT8)"),
            "{}",
            out
        );
        assert!(out.contains("ALIGN LEFT NOPAD;"), "{}", out);
    }

    #[test]
    fn font_switches_become_text_segments() {
        let out = render(
            "/FA /ARIAL 8 INDEXFONT /FB /ARIALB 8 INDEXFONT FA (Dear ~~FBMr~~FA Smith) SH",
        );
        let text_at = out.find("TEXT").expect("TEXT statement");
        let body = &out[text_at..];
        assert!(body.contains("'Dear '"), "{}", body);
        assert!(body.contains("FONT FB NORMAL\n"), "{}", body);
        assert!(body.contains("'Mr'"), "{}", body);
        assert!(body.contains("' Smith'"), "{}", body);
    }

    #[test]
    fn long_text_is_chunked() {
        let long = "a".repeat(150);
        let out = render(&format!("({}) SH", long));
        let quoted: Vec<&str> = out
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("'a"))
            .collect();
        assert_eq!(quoted.len(), 3, "{}", out);
        assert!(quoted.iter().all(|l| l.len() <= 72));
    }

    #[test]
    fn variable_text_is_never_quoted() {
        let out = render("/VAR_N (x) SETVAR VAR_N SHR");
        assert!(out.contains("OUTPUT VAR_N\n"), "{}", out);
        assert!(out.contains("ALIGN RIGHT NOPAD;"), "{}", out);
    }

    #[test]
    fn vsub_text_concatenates() {
        let out = render("(Hello $$VAR_NAME.!) VSUB SH");
        assert!(out.contains("OUTPUT 'Hello ' ! VAR_NAME ! '!'"), "{}", out);
    }

    #[test]
    fn table_row_offsets_cells_by_preceding_widths() {
        let out = render("10 50 MOVETO [(Date) 30 (Item) 80 (Amount) 25] SH");
        assert!(out.contains("OUTPUT 'Date'"), "{}", out);
        assert!(out.contains("(10 MM-$MR_LEFT) (50 MM-$MR_TOP"), "{}", out);
        assert!(out.contains("(40 MM-$MR_LEFT) (SAME)"), "{}", out);
        assert!(out.contains("(120 MM-$MR_LEFT) (SAME)"), "{}", out);
    }

    #[test]
    fn negative_new_line_moves_up_by_exact_amount() {
        let out = render("/FA /ARIAL 8 INDEXFONT FA 4.2 SETLSP (a) SH -6 NL (b) SH");
        assert!(out.contains("POSITION (SAME) (SAME-6 MM);"), "{}", out);
    }

    #[test]
    fn new_line_after_move_is_absolute() {
        let out = render("4 SETLSP 10 100 MOVETO NL (b) SH");
        assert!(out.contains("(10 MM-$MR_LEFT) (104 MM-$MR_TOP"), "{}", out);
    }
}
