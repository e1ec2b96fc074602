//! DocDEF generation.
//!
//! One [`Generator`] writes one output stream. Statement handlers live in
//! the submodules as `impl Generator` blocks; all of them read and update
//! the generator's single [`State`] and append to its [`Emitter`].

mod condition;
mod document;
mod draw;
mod emitter;
mod header;
mod overlay;
mod resources;
mod statements;
mod text;

pub use document::generate_main;
pub use overlay::generate_overlay;

use crate::ast::Command;
use crate::config::TranslateConfig;
use crate::error::GenerationInvariantError;
use crate::report::Report;
use crate::resolve::ResolvedSymbols;
use crate::state::State;
use crate::symbols::SymbolTable;
use emitter::Emitter;

pub(crate) struct Generator<'a> {
    config: &'a TranslateConfig,
    symbols: &'a ResolvedSymbols,
    /// Tables of the document being generated, after renaming
    table: &'a SymbolTable,
    report: &'a mut Report,
    file: &'a str,
    state: State,
    out: Emitter,
    /// Subroutines being inlined, innermost last
    inlining: Vec<String>,
}

impl<'a> Generator<'a> {
    fn new(
        config: &'a TranslateConfig,
        symbols: &'a ResolvedSymbols,
        table: &'a SymbolTable,
        report: &'a mut Report,
    ) -> Self {
        Generator {
            config,
            symbols,
            file: &table.file,
            table,
            report,
            state: State::new(),
            out: Emitter::new(),
            inlining: Vec::new(),
        }
    }

    fn commands(&mut self, cmds: &[Command]) -> Result<(), GenerationInvariantError> {
        for cmd in cmds {
            self.command(cmd)?;
        }
        Ok(())
    }

    fn invariant(&self, line: u32, message: impl Into<String>) -> GenerationInvariantError {
        GenerationInvariantError::new(self.file, line, message)
    }

    /// Active font alias, falling back to the configured default.
    fn font(&self) -> String {
        self.state
            .style
            .font
            .clone()
            .unwrap_or_else(|| self.config.default_font.clone())
    }

    fn font_size(&self, alias: &str) -> Option<f64> {
        self.symbols.font_size(alias).or_else(|| {
            header::DEFAULT_FONTS
                .iter()
                .find(|(name, _, _)| *name == alias)
                .map(|(_, _, size)| *size)
        })
    }
}

/// Single-quoted DocDEF literal with embedded quotes doubled.
pub(crate) fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Millimetre value without float noise or a negative zero.
pub(crate) fn num(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 {
        "0".to_owned()
    } else {
        format!("{}", rounded)
    }
}

/// Vertical correction variable for a font size.
pub(crate) fn font_correction(size: f64) -> &'static str {
    if size <= 6.5 {
        "&CORFONT6"
    } else if size <= 7.5 {
        "&CORFONT7"
    } else if size <= 9.0 {
        "&CORFONT8"
    } else if size <= 11.0 {
        "&CORFONT10"
    } else {
        "&CORFONT12"
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use crate::ast::DocumentKind;
    use crate::parser::{parse_source, KnownAliases};
    use crate::resolve::resolve_conflicts;

    pub(crate) fn with_generator<R>(f: impl FnOnce(&mut Generator<'_>) -> R) -> R {
        let config = TranslateConfig::default();
        let symbols = ResolvedSymbols::default();
        let table = SymbolTable {
            file: "test.dbm".into(),
            ..Default::default()
        };
        let mut report = Report::new();
        let mut g = Generator::new(&config, &symbols, &table, &mut report);
        f(&mut g)
    }

    /// Parse `src`, run its top-level commands through one generator and
    /// return the statements written plus the report.
    pub(crate) fn render_with_report(src: &str) -> (String, Report) {
        let doc = parse_source(src, "test.dbm", DocumentKind::Main, &KnownAliases::default())
            .expect("source parses");
        let mut docs = vec![doc];
        let mut report = Report::new();
        let symbols = resolve_conflicts(&mut docs, &mut report);
        let config = TranslateConfig::default();
        let out = {
            let mut g = Generator::new(&config, &symbols, &symbols.tables[0], &mut report);
            g.commands(&docs[0].commands).expect("generation succeeds");
            std::mem::take(&mut g.out).finish()
        };
        (out, report)
    }

    pub(crate) fn render(src: &str) -> String {
        render_with_report(src).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_doubles_apostrophes() {
        assert_eq!(quote("it's"), "'it''s'");
    }

    #[test]
    fn num_trims_noise() {
        assert_eq!(num(12.0), "12");
        assert_eq!(num(4.2), "4.2");
        assert_eq!(num(0.1 + 0.2), "0.3");
        assert_eq!(num(-0.0), "0");
    }

    #[test]
    fn correction_buckets_by_size() {
        assert_eq!(font_correction(6.0), "&CORFONT6");
        assert_eq!(font_correction(7.0), "&CORFONT7");
        assert_eq!(font_correction(9.0), "&CORFONT8");
        assert_eq!(font_correction(10.0), "&CORFONT10");
        assert_eq!(font_correction(14.0), "&CORFONT12");
    }
}
