//! Fixed DocDEF prologue: banner, input/output formats, the page layout
//! format group and the font and color tables.

use super::draw::box_style;
use super::{num, quote, Generator};
use crate::ast::{self, CommandKind, Document};
use crate::symbols::{named_color, Rgb, LETTER_COLORS};
use std::collections::BTreeMap;

/// Fonts every output defines: alias, family, size in points.
pub(crate) const DEFAULT_FONTS: &[(&str, &str, f64)] = &[
    ("ARIAL06", "Arial", 6.0),
    ("ARIAL08", "Arial", 8.0),
    ("ARIAL10", "Arial", 10.0),
    ("ARIAL12", "Arial", 12.0),
    ("COURIER08", "Courier New", 8.0),
    ("COURIER10", "Courier New", 10.0),
];

const SHEET_WIDTH_MM: u32 = 210;
const SHEET_HEIGHT_MM: u32 = 297;

/// Default value of a color word referenced without an `INDEXCOLOR`.
fn builtin_rgb(name: &str) -> Option<Rgb> {
    LETTER_COLORS
        .iter()
        .find(|(l, _)| *l == name)
        .and_then(|(_, named)| named_color(named))
        .or_else(|| named_color(name))
}

impl<'a> Generator<'a> {
    pub(super) fn banner(&mut self, doc: &Document) {
        self.out.comment(format!(
            "Generated by vippdfa {} from VIPP source",
            env!("CARGO_PKG_VERSION")
        ));
        self.out.comment(format!("Source: {}", doc.file));
        let meta = &doc.metadata;
        for (label, value) in [
            ("Original Title", &meta.title),
            ("Original Creator", &meta.creator),
            ("Original Date", &meta.creation_date),
        ] {
            if let Some(v) = value {
                self.out.comment(format!("{}: {}", label, v));
            }
        }
        self.out.blank();
    }

    pub(super) fn header(&mut self, doc: &Document, overlays: &[Document]) {
        self.banner(doc);
        self.out.line(format!("DOCDEF {};", doc.target_name()));
        self.out.blank();
        self.formats();
        self.format_group(overlays);
        self.font_table();
        self.color_table(doc, overlays);
    }

    fn formats(&mut self) {
        let record_length = self.config.record_length;
        let channel_code = self.config.channel_code.clone();
        self.out.line("APPLICATION-INPUT-FORMAT");
        self.out.indent();
        self.out.line("CODE 1252");
        self.out.line("RECORD-FORMAT VARPC");
        self.out.line("RECORD-DELIMITER X'0D0A'");
        self.out.line(format!("RECORD-LENGTH {}", record_length));
        self.out.line(format!("CHANNEL-CODE {} NOBREAKREPEAT", channel_code));
        self.out.line("TABLE-REF-CODE NO");
        self.out.line("DECIMAL-SEPARATOR '.'");
        self.out.line("CACHELIMIT 100;");
        self.out.dedent();
        self.out.blank();

        self.out.line("APPLICATION-OUTPUT-FORMAT");
        self.out.indent();
        self.out.line("CODE 1200");
        self.out.line("AFPLRECL 8192");
        self.out.line("PTXUNIT 1440");
        self.out.line("FDFINCLUDE YES");
        self.out.line("TLE YES");
        self.out.line("ACIFINDEX NO;");
        self.out.dedent();
        self.out.blank();
        self.out.line("DEFINEPDFOUTPUT PDFOUT;");
        self.out.blank();
    }

    fn format_group(&mut self, overlays: &[Document]) {
        let forms: Vec<String> = overlays.iter().map(Document::target_name).collect();
        self.out.line("FORMATGROUP MAIN;");
        self.out.indent();
        self.out.line("SHEET");
        self.out.indent();
        self.out.line(format!("WIDTH {} MM", SHEET_WIDTH_MM));
        self.out.line(format!("HEIGHT {} MM;", SHEET_HEIGHT_MM));
        self.out.dedent();
        self.out.line("LAYER 1;");
        for page in 1..=2 {
            self.logical_page(page, &forms);
        }
        self.out.dedent();
        self.out.blank();
    }

    fn logical_page(&mut self, page: u32, forms: &[String]) {
        let font = self.config.default_font.clone();
        self.out.line(format!("LOGICALPAGE {}", page));
        self.out.indent();
        self.out.line("SIDE FRONT");
        self.out.line("POSITION 0 0");
        self.out.line(format!("WIDTH {} MM", SHEET_WIDTH_MM));
        self.out.line(format!("HEIGHT {} MM", SHEET_HEIGHT_MM));
        self.out.line("DIRECTION ACROSS");

        self.out.line("HEADER");
        self.out.indent();
        for form in forms {
            self.out.line(format!("IF &CURFORM=={}; THEN;", quote(form)));
            self.out.indent();
            self.out.line(format!("USE FORMAT {} EXTERNAL;", form));
            self.out.dedent();
            self.out.line("ENDIF;");
        }
        self.out.line("IF &NEXTFORM<>''; THEN;");
        self.out.indent();
        self.out.line("&CURFORM = &NEXTFORM;");
        self.out.dedent();
        self.out.line("ENDIF;");
        self.out.dedent();
        self.out.line("HEADEREND");

        self.out.line("FOOTER");
        self.out.indent();
        self.out.line("PP = PP + 1;");
        self.out.dedent();
        self.out.line("FOOTEREND");

        self.out.line("PRINTFOOTER");
        self.out.indent();
        self.out.line("P = P + 1;");
        self.out.line("OUTLINE");
        self.out.indent();
        self.out.line("POSITION RIGHT (0 MM)");
        self.out.line("DIRECTION ACROSS;");
        self.out.line("OUTPUT 'Page '!P!' of '!PP");
        self.out.indent();
        self.out.line(format!("FONT {}", font));
        self.out.line(format!("POSITION (RIGHT-11 MM){} MM", SHEET_HEIGHT_MM - 11));
        self.out.line("ALIGN RIGHT NOPAD;");
        self.out.dedent();
        self.out.dedent();
        self.out.line("ENDIO;");
        self.out.dedent();
        self.out.line("PRINTEND;");
        self.out.dedent();
    }

    fn font_table(&mut self) {
        let mut lines = Vec::new();
        for (alias, font) in &self.symbols.fonts {
            lines.push(font_line(alias, &font.family(), font.size));
        }
        for (alias, family, size) in DEFAULT_FONTS {
            if !self.symbols.fonts.contains_key(*alias) {
                lines.push(font_line(alias, family, *size));
            }
        }
        for l in lines {
            self.out.line(l);
        }
        self.out.blank();
    }

    /// Defined colors plus defaults for built-in color words referenced
    /// anywhere without a definition.
    fn color_table(&mut self, doc: &Document, overlays: &[Document]) {
        let mut colors: BTreeMap<String, Rgb> = self
            .symbols
            .colors
            .iter()
            .map(|(alias, c)| (alias.clone(), c.rgb))
            .collect();
        for d in std::iter::once(doc).chain(overlays) {
            ast::walk(&d.commands, &mut |cmd| {
                let word = match &cmd.kind {
                    CommandKind::SelectColor(c) => Some(c.clone()),
                    CommandKind::DrawBox { style, .. } => style
                        .as_text()
                        .and_then(|s| box_style(s, |n| builtin_rgb(n).is_some()).color),
                    _ => None,
                };
                if let Some(w) = word {
                    if !colors.contains_key(&w) {
                        if let Some(rgb) = builtin_rgb(&w) {
                            colors.insert(w, rgb);
                        }
                    }
                }
            });
        }
        for (alias, Rgb(r, g, b)) in &colors {
            self.out
                .line(format!("COLOR {} AS RGB {} {} {};", alias, r, g, b));
        }
        if !colors.is_empty() {
            self.out.blank();
        }
    }
}

fn font_line(alias: &str, family: &str, size: f64) -> String {
    format!(
        "FONT {} NOTDEF AS {} DBCS ROTATION 0 HEIGHT {};",
        alias,
        quote(family),
        num(size)
    )
}
