//! Overlay layout: one external DOCFORMAT per form, drawn inside a single
//! outline anchored at the page origin.

use super::Generator;
use crate::ast::{CommandKind, Document};
use crate::config::TranslateConfig;
use crate::error::GenerationInvariantError;
use crate::report::Report;
use crate::resolve::ResolvedSymbols;
use crate::symbols::SymbolTable;

pub fn generate_overlay(
    doc: &Document,
    table: &SymbolTable,
    symbols: &ResolvedSymbols,
    config: &TranslateConfig,
    report: &mut Report,
) -> Result<String, GenerationInvariantError> {
    let name = doc.target_name();
    let mut g = Generator::new(config, symbols, table, report);
    g.banner(doc);
    g.out.line(format!("DOCFORMAT {};", name));
    g.out.indent();
    g.out
        .line("MARGIN TOP 0 MM BOTTOM 0 MM LEFT 0 MM RIGHT 0 MM;");
    g.out.line("SETUNITS LINESP AUTO;");
    g.out.line("OUTLINE");
    g.out.indent();
    g.out.line("POSITION (0 MM) (0 MM)");
    g.out.line("DIRECTION ACROSS;");
    for cmd in &doc.commands {
        if matches!(cmd.kind, CommandKind::Resource { .. }) {
            continue;
        }
        g.command(cmd)?;
    }
    g.out.dedent();
    g.out.line("ENDIO;");
    g.out.dedent();
    g.out.blank();
    g.out.comment(format!("END OF FORMAT {}", name));
    Ok(std::mem::take(&mut g.out).finish())
}
