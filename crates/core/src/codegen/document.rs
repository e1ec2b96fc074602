//! Main document layout.
//!
//! A main document becomes one DOCDEF: the prologue, a `THEMAIN` record
//! loop that splits each input record and routes it by its dispatch value,
//! one `DF_<value>` format per case arm, and the once-per-job and
//! once-per-document initialization formats.

use super::{quote, Generator};
use crate::ast::{self, CaseArm, CmpOp, Command, CommandKind, DispatchTable, Document, Operand};
use crate::config::TranslateConfig;
use crate::error::GenerationInvariantError;
use crate::report::{Placeholder, Report};
use crate::resolve::ResolvedSymbols;
use crate::state::State;
use crate::symbols::SymbolTable;

/// Dispatch variable used when the document has no case table.
const DEFAULT_DISCRIMINANT: &str = "PREFIX";
const DEFAULT_FORMAT: &str = "DFDEFAULT";

/// Correction variables for baseline placement, by font size bucket.
const CORRECTIONS: &[(&str, &str)] = &[
    ("&CORFONT6", "-33"),
    ("&CORFONT7", "-37.5"),
    ("&CORFONT8", "-43.5"),
    ("&CORFONT10", "-55.5"),
    ("&CORFONT12", "-66"),
    ("&CORSEGMENT", "33"),
];

// ──────────────────────────────────────────────
// Analysis
// ──────────────────────────────────────────────

/// The pieces of a main document, sorted by where they are emitted.
struct Layout<'d> {
    discriminant: String,
    /// Arms that print, merged by value, in first-seen order
    arms: Vec<(String, Vec<&'d Command>)>,
    /// Constant assignments from arms that do nothing else
    hoisted: Vec<&'d Command>,
    /// Assignment-only arms that read fields or variables; they run in the
    /// record loop for their value instead of getting a format
    per_record: Vec<(String, Vec<&'d Command>)>,
    /// Values compared against the discriminant with no arm of their own
    stubs: Vec<(String, u32)>,
    default: Option<&'d [Command]>,
    /// Top-level commands that run once per job
    setup: Vec<&'d Command>,
    /// Top-level commands that print
    body: Vec<&'d Command>,
}

/// A value that is the same for every record. Identifiers other than the
/// boolean words read a field or variable and change per record.
fn constant(op: &Operand) -> bool {
    match op {
        Operand::Number(_) | Operand::Str { .. } | Operand::Name(_) => true,
        Operand::Ident(word) => word == "true" || word == "false",
        Operand::Array(items) => items.iter().all(constant),
        _ => false,
    }
}

fn assignment_only(body: &[Command]) -> bool {
    body.iter().all(|c| matches!(c.kind, CommandKind::SetVar { .. }))
}

fn constant_assignments(body: &[Command]) -> bool {
    body.iter().all(|c| {
        matches!(&c.kind, CommandKind::SetVar { value, .. } if constant(value))
    })
}

/// An `IF` whose only effect is assigning variables; in once-per-job
/// initialization the guard is redundant.
fn assignment_guard(cmd: &Command) -> Option<&[Command]> {
    match &cmd.kind {
        CommandKind::If {
            then_branch,
            else_branch,
            ..
        } if else_branch.is_empty()
            && !then_branch.is_empty()
            && then_branch
                .iter()
                .all(|c| matches!(c.kind, CommandKind::SetVar { .. })) =>
        {
            Some(then_branch)
        }
        _ => None,
    }
}

fn prints(cmd: &Command) -> bool {
    match &cmd.kind {
        CommandKind::Show { .. }
        | CommandKind::MoveTo { .. }
        | CommandKind::MoveH { .. }
        | CommandKind::NewLine { .. }
        | CommandKind::DrawBox { .. }
        | CommandKind::SegmentCall { .. }
        | CommandKind::ImageCall { .. }
        | CommandKind::PageBreak
        | CommandKind::NewFrame
        | CommandKind::SkipPage
        | CommandKind::Bookmark(_)
        | CommandKind::Block(_) => true,
        CommandKind::If { .. } => assignment_guard(cmd).is_none(),
        _ => false,
    }
}

fn compared_values(doc: &Document, discriminant: &str) -> Vec<(String, u32)> {
    let mut found = Vec::new();
    ast::walk(&doc.commands, &mut |cmd| {
        if let CommandKind::If { cond, .. } = &cmd.kind {
            cond.for_each_compare(&mut |op, lhs, rhs| {
                if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                    return;
                }
                let is_disc = |o: &Operand| {
                    matches!(o, Operand::Ident(n) | Operand::Name(n) if n == discriminant)
                };
                let value = match (lhs, rhs) {
                    (d, Operand::Str { text, .. }) if is_disc(d) => Some(text),
                    (Operand::Str { text, .. }, d) if is_disc(d) => Some(text),
                    _ => None,
                };
                if let Some(v) = value {
                    if !found.iter().any(|(f, _): &(String, u32)| f == v) {
                        found.push((v.clone(), cmd.line));
                    }
                }
            });
        }
    });
    found
}

fn analyze(doc: &Document) -> Layout<'_> {
    let table: Option<&DispatchTable> = doc.commands.iter().find_map(|c| match &c.kind {
        CommandKind::Case(t) => Some(t),
        _ => None,
    });
    let mut layout = Layout {
        discriminant: table
            .map(|t| t.discriminant.clone())
            .unwrap_or_else(|| DEFAULT_DISCRIMINANT.to_owned()),
        arms: Vec::new(),
        hoisted: Vec::new(),
        per_record: Vec::new(),
        stubs: Vec::new(),
        default: table.and_then(|t| t.default.as_deref()),
        setup: Vec::new(),
        body: Vec::new(),
    };
    let mut defined: Vec<&str> = Vec::new();
    if let Some(t) = table {
        for CaseArm { value, body, line } in &t.arms {
            defined.push(value);
            if constant_assignments(body) {
                tracing::debug!(value = %value, line, "hoisting assignment-only case arm");
                layout.hoisted.extend(body.iter());
                continue;
            }
            if assignment_only(body) {
                tracing::debug!(value = %value, line, "assigning case arm in the record loop");
                match layout.per_record.iter_mut().find(|(v, _)| v == value) {
                    Some((_, merged)) => merged.extend(body.iter()),
                    None => layout.per_record.push((value.clone(), body.iter().collect())),
                }
                continue;
            }
            match layout.arms.iter_mut().find(|(v, _)| v == value) {
                Some((_, merged)) => merged.extend(body.iter()),
                None => layout.arms.push((value.clone(), body.iter().collect())),
            }
        }
    }
    for cmd in &doc.commands {
        if matches!(cmd.kind, CommandKind::Case(_)) {
            continue;
        }
        if prints(cmd) {
            layout.body.push(cmd);
        } else {
            layout.setup.push(cmd);
        }
    }
    if table.is_some() {
        layout.stubs = compared_values(doc, &layout.discriminant)
            .into_iter()
            .filter(|(v, _)| !defined.contains(&v.as_str()))
            .collect();
    }
    layout
}

// ──────────────────────────────────────────────
// Emission
// ──────────────────────────────────────────────

/// Generate the DOCDEF for a main document. `overlays` are the parsed
/// overlays it uses, in the order they were loaded.
pub fn generate_main(
    doc: &Document,
    table: &SymbolTable,
    overlays: &[Document],
    symbols: &ResolvedSymbols,
    config: &TranslateConfig,
    report: &mut Report,
) -> Result<String, GenerationInvariantError> {
    let layout = analyze(doc);
    if layout.default.is_none() && !layout.body.is_empty() && !layout.arms.is_empty() {
        tracing::warn!(
            file = %doc.file,
            commands = layout.body.len(),
            "printing commands outside the case table go to the default format"
        );
    }
    let mut g = Generator::new(config, symbols, table, report);
    g.header(doc, overlays);
    let primed = prime_state(&doc.commands);

    g.main_format(doc, &layout);
    for (value, body) in &layout.arms {
        g.state = primed.clone();
        g.out.line(format!("DOCFORMAT DF_{};", value));
        g.out.indent();
        for cmd in body {
            g.command(cmd)?;
        }
        g.out.dedent();
        g.out.blank();
    }
    for (value, line) in &layout.stubs {
        let docformat = format!("DF_{}", value);
        g.report.placeholder(Placeholder {
            value: value.clone(),
            docformat: docformat.clone(),
            file: doc.file.clone(),
            line: *line,
        });
        g.out.line(format!("DOCFORMAT {};", docformat));
        g.out.indent();
        g.out
            .comment(format!("Placeholder: '{}' is compared but has no case arm", value));
        g.out.dedent();
        g.out.blank();
    }
    if has_default(&layout) {
        g.state = primed.clone();
        g.out.line(format!("DOCFORMAT {};", DEFAULT_FORMAT));
        g.out.indent();
        for cmd in &layout.body {
            g.command(cmd)?;
        }
        if let Some(default) = layout.default {
            g.commands(default)?;
        }
        g.out.dedent();
        g.out.blank();
    }
    g.state = primed;
    g.before_first_doc(doc, &layout)?;
    g.before_doc();
    g.out.comment("END OF DOCDEF FILE");
    Ok(std::mem::take(&mut g.out).finish())
}

/// Style established by top-level selections before any record.
fn prime_state(commands: &[Command]) -> State {
    let mut state = State::new();
    for cmd in commands {
        match &cmd.kind {
            CommandKind::SelectFont(f) => state.set_font(f),
            CommandKind::SelectColor(c) => state.set_color(c),
            CommandKind::SetLineSpacing(n) => state.set_line_spacing(*n),
            CommandKind::Orientation(o) => state.set_orientation(*o),
            _ => {}
        }
    }
    state
}

fn has_default(layout: &Layout<'_>) -> bool {
    layout.default.is_some() || !layout.body.is_empty()
}

impl<'a> Generator<'a> {
    fn main_format(&mut self, doc: &Document, layout: &Layout<'_>) {
        self.out.line("DOCFORMAT THEMAIN;");
        self.out.indent();
        self.out
            .line("MARGIN TOP 0 MM BOTTOM 0 MM LEFT 0 MM RIGHT 0 MM;");
        let spacing = doc.commands.iter().find_map(|c| match c.kind {
            CommandKind::SetLineSpacing(n) => Some(n),
            _ => None,
        });
        match spacing {
            Some(n) => self
                .out
                .line(format!("SETUNITS LINESP {} MM;", super::num(n))),
            None => self.out.line("SETUNITS LINESP AUTO;"),
        }
        if let Some((x, y)) = self.page_origin(doc) {
            self.out.line("OUTLINE PAGELAYOUT");
            self.out.indent();
            self.out.line(format!(
                "POSITION {} MM {} MM;",
                super::num(x),
                super::num(y)
            ));
            self.out.dedent();
            self.out.line("ENDIO;");
        }

        self.out.line("FOR N REPEAT 1;");
        self.out.indent();
        self.read_record("INPUTREC");
        match &self.config.document_separator {
            Some(sep) => self
                .out
                .line(format!("IF LINE1<>{}; THEN;", quote(sep))),
            None => self.out.line("IF 1; THEN;"),
        }
        self.out.indent();
        self.out.line("N = 0;");
        self.out.line("D = EXTRACTALL(FLD, LINE1, &SEP, '');");
        self.out
            .line(format!("{} = FLD[1];", layout.discriminant));
        self.out.line("FOR I REPEAT MAXINDEX(FLD)-1;");
        self.out.indent();
        self.out.line("{&FIELDS[I]} = FLD[I+1];");
        self.out.dedent();
        self.out.line("ENDFOR;");
        self.record_assignments(layout);
        self.routing(layout);
        self.out.line("D = CLEAR(FLD);");
        self.out.dedent();
        if self.config.document_separator.is_some() {
            self.out.line("ELSE;");
            self.out.indent();
            self.out.line("ENDGROUP 'DOC';");
            self.read_record("INPUTREC");
            self.out.line("IF LINE1<>'%%EOF'; THEN;");
            self.out.indent();
            self.out.line("SKIPRECORD -1;");
            self.out.dedent();
            self.out.line("ENDIF;");
            self.out.line("ENDDOCUMENT;");
            self.out.dedent();
        }
        self.out.line("ENDIF;");
        self.out.dedent();
        self.out.line("ENDFOR;");
        self.out.dedent();
        self.out.blank();
    }

    fn read_record(&mut self, name: &str) {
        self.out.line(format!("RECORD {}", name));
        self.out.indent();
        self.out.line("REPEAT 1;");
        self.out.line("VARIABLE LINE1 SCALAR NOSPACE START 1;");
        self.out.dedent();
        self.out.line("ENDIO;");
    }

    fn record_assignments(&mut self, layout: &Layout<'_>) {
        for (value, body) in &layout.per_record {
            self.out.line(format!(
                "IF NOSPACE({})=={}; THEN;",
                layout.discriminant,
                quote(value)
            ));
            self.out.indent();
            for cmd in body {
                if let CommandKind::SetVar {
                    name,
                    value,
                    init_only: false,
                } = &cmd.kind
                {
                    self.assignment(cmd.line, name, value);
                }
            }
            self.out.dedent();
            self.out.line("ENDIF;");
        }
    }

    fn routing(&mut self, layout: &Layout<'_>) {
        let disc = format!("NOSPACE({})", layout.discriminant);
        let routed: Vec<&str> = layout
            .arms
            .iter()
            .map(|(v, _)| v.as_str())
            .chain(layout.stubs.iter().map(|(v, _)| v.as_str()))
            .collect();
        let default = has_default(layout);
        if routed.is_empty() {
            if default {
                self.out.line(format!("USE FORMAT {};", DEFAULT_FORMAT));
            }
            return;
        }
        let test = routed
            .iter()
            .map(|v| format!("{}=={}", disc, quote(v)))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.out.line(format!("IF ISTRUE({}); THEN;", test));
        self.out.indent();
        self.out
            .line(format!("USE FORMAT REFERENCE('DF_'!{});", disc));
        self.out.dedent();
        if default {
            self.out.line("ELSE;");
            self.out.indent();
            self.out.line(format!("USE FORMAT {};", DEFAULT_FORMAT));
            self.out.dedent();
        }
        self.out.line("ENDIF;");
    }

    /// Origin of the page layout: a configured override for the form of
    /// the last `SETPAGEDEF` layout, else that layout's first frame.
    fn page_origin(&self, doc: &Document) -> Option<(f64, f64)> {
        let pages = doc.commands.iter().rev().find_map(|c| match &c.kind {
            CommandKind::PageDef(pages) => Some(pages),
            _ => None,
        })?;
        let last = pages.last()?;
        let mut form = None;
        let mut frame = None;
        ast::walk(last, &mut |c| match &c.kind {
            CommandKind::SetForm(f) if form.is_none() => form = Some(ast::target_name(f)),
            CommandKind::SetFrames(frames) if frame.is_none() => {
                frame = frames
                    .first()
                    .and_then(|f| Some((*f.first()?, *f.get(1)?)));
            }
            _ => {}
        });
        form.and_then(|f| self.config.layout_origin(&f)).or(frame)
    }

    fn before_first_doc(
        &mut self,
        doc: &Document,
        layout: &Layout<'_>,
    ) -> Result<(), GenerationInvariantError> {
        self.out.line("DOCFORMAT $_BEFOREFIRSTDOC;");
        self.out.indent();
        self.out.line("PP = 0;");
        self.out.line("TP = 0;");
        for (var, value) in CORRECTIONS {
            self.out.line(format!("{} = {};", var, value));
        }
        self.out.line("&CURFORM = '';");
        self.out.line("&NEXTFORM = '';");
        for (i, field) in doc.metadata.fields.iter().enumerate() {
            self.out
                .line(format!("&FIELDS[{}] = {};", i + 1, quote(field)));
        }
        let delimiter = quote(&self.config.delimiter);
        self.out.line(format!("&SEP = {};", delimiter));

        let mut once = Vec::new();
        ast::walk(&doc.commands, &mut |c| {
            if let CommandKind::SetVar {
                name,
                value,
                init_only: true,
            } = &c.kind
            {
                once.push((c.line, name.as_str(), value));
            }
        });
        for (line, name, value) in once {
            self.assignment(line, name, value);
        }
        for cmd in &layout.hoisted {
            if let CommandKind::SetVar {
                name,
                value,
                init_only: false,
            } = &cmd.kind
            {
                self.assignment(cmd.line, name, value);
            }
        }
        for cmd in &layout.setup {
            match &cmd.kind {
                CommandKind::Resource { .. }
                | CommandKind::SetLineSpacing(_)
                | CommandKind::SelectFont(_)
                | CommandKind::SelectColor(_)
                | CommandKind::Orientation(_) => {}
                _ => match assignment_guard(cmd) {
                    Some(body) => self.commands(body)?,
                    None => self.command(cmd)?,
                },
            }
        }
        self.header_detection();
        self.out.dedent();
        self.out.blank();
        Ok(())
    }

    /// Read leading records until a `PREFIX|` field-name header, picking
    /// up `SETDBSEP` and `SETPROJECT` lines on the way.
    fn header_detection(&mut self) {
        self.out.line("FOR I REPEAT 1;");
        self.out.indent();
        self.read_record("DATAHEADER");
        self.out.line("IF LEFT(LINE1, 7, '') == 'PREFIX|'; THEN;");
        self.out.indent();
        self.out.line("LINE1 = CHANGE(LINE1, 'PREFIX|', '');");
        self.out.line("D = EXTRACTALL(&FIELDS, LINE1, &SEP, '');");
        self.out.line("IF &FIELDS[MAXINDEX(&FIELDS)] == ''; THEN;");
        self.out.indent();
        self.out.line("&MAXFIELDS = MAXINDEX(&FIELDS) - 1;");
        self.out.dedent();
        self.out.line("ELSE;");
        self.out.indent();
        self.out.line("&MAXFIELDS = MAXINDEX(&FIELDS);");
        self.out.dedent();
        self.out.line("ENDIF;");
        self.out.dedent();
        self.out.line("ELSE;");
        self.out.indent();
        self.out.line("I = 0;");
        self.out.line("IF POS('SETDBSEP', LINE1, 1); THEN;");
        self.out.indent();
        self.out.line("POS1 = POS('(', LINE1, 1);");
        self.out.line("POS2 = POS(')', LINE1, 1);");
        self.out.line("&SEP = SUBSTR(LINE1, POS1+1, POS2-POS1-1, '');");
        self.out.dedent();
        self.out.line("ENDIF;");
        self.out.line("IF POS('SETPROJECT', LINE1, 1); THEN;");
        self.out.indent();
        self.out.line("POS1 = POS('(', LINE1, 4);");
        self.out.line("POS2 = POS(')', LINE1, POS1+1);");
        self.out.line("&PROCEDURE = SUBSTR(LINE1, POS1+1, POS2-POS1-1, '');");
        self.out.dedent();
        self.out.line("ENDIF;");
        self.out.dedent();
        self.out.line("ENDIF;");
        self.out.dedent();
        self.out.line("ENDFOR;");
    }

    fn before_doc(&mut self) {
        self.out.line("DOCFORMAT $_BEFOREDOC;");
        self.out.indent();
        self.out.line("P = 0;");
        self.out.line("PP = 0;");
        self.out.dedent();
        self.out.blank();
    }
}
