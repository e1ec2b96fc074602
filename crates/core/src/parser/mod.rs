//! Structural parser: token stream to command tree.
//!
//! Operands accumulate on a per-block buffer; a keyword pops exactly the
//! operands it needs. Blocks, arrays, flat conditionals and case dispatch
//! are tracked on an explicit frame stack, never by recursion, so the line
//! of every unclosed construct is known when input runs out.

use crate::ast::{Command, CommandKind, Condition, Document, DocumentKind, Operand};
use crate::error::{ParseError, ParseErrorKind, TranslateError};
use crate::lexer::{self, Spanned, Token};
use std::collections::BTreeSet;

mod conditional;
mod dispatch;
mod keywords;
mod metadata;
mod operands;

pub(crate) use keywords::operand_text;
use operands::{fold_value, OperandBuffer};

/// Aliases a document may select without defining them itself. Overlays
/// see the fonts and colors indexed by their main document.
#[derive(Debug, Clone, Default)]
pub struct KnownAliases {
    pub fonts: BTreeSet<String>,
    pub colors: BTreeSet<String>,
}

impl KnownAliases {
    /// Collect the aliases defined at any depth of a parsed document.
    pub fn from_document(doc: &Document) -> Self {
        let mut known = KnownAliases::default();
        crate::ast::walk(&doc.commands, &mut |cmd| match &cmd.kind {
            CommandKind::DefineFont { alias, .. } => {
                known.fonts.insert(alias.clone());
            }
            CommandKind::DefineColor { alias, .. } => {
                known.colors.insert(alias.clone());
            }
            _ => {}
        });
        known
    }
}

/// Tokenize and parse one source file.
pub fn parse_source(
    src: &str,
    file: &str,
    kind: DocumentKind,
    known: &KnownAliases,
) -> Result<Document, TranslateError> {
    let tokens = lexer::lex(src, file)?;
    if kind == DocumentKind::Main {
        reject_line_mode(&tokens, file)?;
    }
    Ok(parse(&tokens, file, kind, known)?)
}

/// Keywords that only occur in line-mode job tickets.
const LINE_MODE_KEYWORDS: &[&str] = &["STARTLM", "SETJDT", "BEGINRPE", "ENDRPE", "SETRCD", "SETPCD"];

fn reject_line_mode(tokens: &[Spanned], file: &str) -> Result<(), TranslateError> {
    let hit = tokens.iter().find_map(|t| match &t.token {
        Token::Word(w) if LINE_MODE_KEYWORDS.contains(&w.as_str()) => Some((t.line, w)),
        _ => None,
    });
    match hit {
        Some((line, keyword)) => Err(TranslateError::LineMode {
            file: file.to_owned(),
            line,
            keyword: keyword.clone(),
        }),
        None => Ok(()),
    }
}

/// Parse a token stream produced by [`lexer::lex`].
pub fn parse(
    tokens: &[Spanned],
    file: &str,
    kind: DocumentKind,
    known: &KnownAliases,
) -> Result<Document, ParseError> {
    let metadata = metadata::read_metadata(tokens);
    let mut parser = Parser::new(tokens, file, known);
    let commands = parser.run()?;
    tracing::debug!(
        file,
        commands = commands.len(),
        leftovers = parser.leftovers.len(),
        "parsed document"
    );
    Ok(Document {
        file: file.to_owned(),
        kind,
        metadata,
        commands,
        leftovers: parser.leftovers,
    })
}

// ──────────────────────────────────────────────
// Frames
// ──────────────────────────────────────────────

/// What a `{ ... }` block becomes when it closes.
#[derive(Debug)]
pub(super) enum ProcRole {
    /// Pushed onto the enclosing buffer as a procedure operand
    Operand,
    /// Then-branch of `IF cond { ... }`
    PrefixThen(Condition),
    /// Else-branch of `IF cond { ... } ELSE { ... }`
    PrefixElse(Condition, Vec<Command>),
    /// `(VALUE) { ... }` inside a CASE
    CaseArm(String),
    /// Unlabelled block inside a CASE
    CaseDefault,
}

#[derive(Debug)]
pub(super) enum FrameKind {
    Root,
    Proc(ProcRole),
    Array,
    /// `IF cond THEN ... [ELSE ...] ENDIF`
    FlatIf {
        cond: Condition,
        then_branch: Option<Vec<Command>>,
    },
    Case(dispatch::CaseBuilder),
}

#[derive(Debug)]
pub(super) struct Frame {
    kind: FrameKind,
    commands: Vec<Command>,
    operands: OperandBuffer,
    /// Line of the construct that opened the frame
    line: u32,
}

impl Frame {
    fn new(kind: FrameKind, line: u32) -> Self {
        Frame {
            kind,
            commands: Vec::new(),
            operands: OperandBuffer::default(),
            line,
        }
    }

    fn push(&mut self, value: Operand, line: u32) {
        let at = self.commands.len();
        self.operands.push(value, line, at);
    }

    /// Keyword or brace a user would look for to close this frame.
    fn construct(&self) -> &'static str {
        match &self.kind {
            FrameKind::Root => "document",
            FrameKind::Proc(ProcRole::PrefixThen(_)) | FrameKind::Proc(ProcRole::PrefixElse(..)) => {
                "IF"
            }
            FrameKind::Proc(_) => "{",
            FrameKind::Array => "[",
            FrameKind::FlatIf { .. } => "IF",
            FrameKind::Case(_) => "CASE",
        }
    }
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

pub(super) struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    file: String,
    root: Frame,
    stack: Vec<Frame>,
    fonts: BTreeSet<String>,
    colors: BTreeSet<String>,
    /// Names assigned with SETVAR; never treated as font selections
    variables: BTreeSet<String>,
    leftovers: Vec<(u32, Operand)>,
    /// Set right after a self-closing conditional so that one trailing
    /// ENDIF can be absorbed
    after_closed_if: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], file: &str, known: &KnownAliases) -> Self {
        Parser {
            tokens,
            pos: 0,
            file: file.to_owned(),
            root: Frame::new(FrameKind::Root, 1),
            stack: Vec::new(),
            fonts: known.fonts.clone(),
            colors: known.colors.clone(),
            variables: BTreeSet::new(),
            leftovers: Vec::new(),
            after_closed_if: false,
        }
    }

    fn token_at(&self, index: usize) -> Option<&Spanned> {
        self.tokens.get(index)
    }

    /// Index of the next non-comment token at or after `from`.
    fn significant(&self, from: usize) -> usize {
        let mut i = from;
        while let Some(Token::Comment(_)) = self.token_at(i).map(|s| &s.token) {
            i += 1;
        }
        i
    }

    fn top(&self) -> &Frame {
        self.stack.last().unwrap_or(&self.root)
    }

    fn top_mut(&mut self) -> &mut Frame {
        match self.stack.last_mut() {
            Some(frame) => frame,
            None => &mut self.root,
        }
    }

    fn error(&self, line: u32, kind: ParseErrorKind) -> ParseError {
        ParseError::new(&self.file, line, kind)
    }

    fn syntax(&self, line: u32, msg: impl Into<String>) -> ParseError {
        ParseError::syntax(&self.file, line, msg)
    }

    fn buffer(&mut self) -> &mut OperandBuffer {
        &mut self.top_mut().operands
    }

    fn push_operand(&mut self, value: Operand, line: u32) {
        self.top_mut().push(value, line);
    }

    /// Append a finished command to the innermost frame and open a new
    /// operand epoch there.
    pub(super) fn emit(&mut self, kind: CommandKind, line: u32) -> Result<(), ParseError> {
        if matches!(self.top().kind, FrameKind::Array) {
            let name = Command::new(kind, line).name().to_owned();
            return Err(self.syntax(line, format!("'{}' cannot appear inside an array", name)));
        }
        let frame = self.top_mut();
        frame.commands.push(Command::new(kind, line));
        frame.operands.next_epoch();
        Ok(())
    }

    fn open(&mut self, kind: FrameKind, line: u32) {
        self.stack.push(Frame::new(kind, line));
    }

    /// Pop the innermost frame, moving its unconsumed operands into the
    /// leftover list.
    fn close(&mut self) -> Option<Frame> {
        let mut frame = self.stack.pop()?;
        for p in frame.operands.drain_all() {
            self.leftovers.push((p.line, p.value));
        }
        Some(frame)
    }

    fn flat_if_pending(&self) -> bool {
        self.stack
            .iter()
            .any(|f| matches!(f.kind, FrameKind::FlatIf { .. }))
    }

    // -- Main loop -----------------------------------------------

    fn run(&mut self) -> Result<Vec<Command>, ParseError> {
        while let Some(spanned) = self.token_at(self.pos) {
            let token = spanned.token.clone();
            let line = spanned.line;
            self.pos += 1;
            if let Token::Comment(_) = token {
                continue;
            }
            let closed_if = std::mem::take(&mut self.after_closed_if);
            if token == Token::Eof {
                break;
            }
            if matches!(self.top().kind, FrameKind::Case(_)) {
                self.case_token(token, line)?;
                continue;
            }
            match token {
                Token::LBrace => self.open(FrameKind::Proc(ProcRole::Operand), line),
                Token::RBrace => self.close_brace(line)?,
                Token::LBracket => self.open(FrameKind::Array, line),
                Token::RBracket => self.close_array(line)?,
                Token::Number(n) => self.push_operand(Operand::Number(n), line),
                Token::Str(text) => self.push_operand(Operand::str(text), line),
                Token::Name(n) => self.push_operand(Operand::Name(n), line),
                Token::Op(op) => self.operator(&op, line)?,
                Token::Word(w) => self.word(w, line, closed_if)?,
                Token::Comment(_) | Token::Eof => {}
            }
        }
        self.finish()
    }

    fn word(&mut self, w: String, line: u32, closed_if: bool) -> Result<(), ParseError> {
        match w.as_str() {
            "IF" => return self.begin_if(line),
            "IFELSE" => return self.postfix_ifelse(line),
            "ELSE" => return self.else_word(line),
            "ENDIF" => return self.end_if(line, closed_if),
            "THEN" => return Err(self.error(line, ParseErrorKind::Unmatched("THEN".into()))),
            "CASE" => return self.begin_case(line),
            "ENDCASE" => return Err(self.error(line, ParseErrorKind::Unmatched("ENDCASE".into()))),
            _ => {}
        }
        let folded = fold_value(self.buffer(), &w).map_err(|k| self.error(line, k))?;
        if folded || self.statement(&w, line)? {
            return Ok(());
        }
        if self.is_font_select(&w) {
            self.emit(CommandKind::SelectFont(w), line)
        } else if self.is_color_select(&w) {
            self.emit(CommandKind::SelectColor(w), line)
        } else {
            self.push_operand(Operand::Ident(w), line);
            Ok(())
        }
    }

    fn operator(&mut self, op: &str, line: u32) -> Result<(), ParseError> {
        match op {
            "++" | "--" => {
                self.statement(op, line)?;
                Ok(())
            }
            "," | ";" => Ok(()),
            other => Err(self.syntax(line, format!("unexpected operator '{}'", other))),
        }
    }

    fn is_font_select(&self, w: &str) -> bool {
        if self.fonts.contains(w) {
            return true;
        }
        if self.variables.contains(w) || w.starts_with("FLD") {
            return false;
        }
        match w.strip_prefix('F') {
            Some(rest) => {
                (1..=2).contains(&rest.len()) && rest.chars().all(|c| c.is_ascii_alphanumeric())
            }
            None => false,
        }
    }

    fn is_color_select(&self, w: &str) -> bool {
        if self.variables.contains(w) {
            return false;
        }
        self.colors.contains(w) || matches!(w, "R" | "B" | "W" | "G" | "C" | "M" | "Y" | "K")
    }

    // -- Blocks and arrays ---------------------------------------

    fn close_brace(&mut self, line: u32) -> Result<(), ParseError> {
        let top = self.top();
        match &top.kind {
            FrameKind::Proc(_) => {}
            FrameKind::Root => return Err(self.error(line, ParseErrorKind::Unmatched("}".into()))),
            _ => {
                let kind = ParseErrorKind::Unclosed {
                    construct: top.construct().to_owned(),
                };
                return Err(self.error(top.line, kind));
            }
        }
        let Some(frame) = self.close() else {
            return Err(self.error(line, ParseErrorKind::Unmatched("}".into())));
        };
        let FrameKind::Proc(role) = frame.kind else {
            return Err(self.error(line, ParseErrorKind::Unmatched("}".into())));
        };
        match role {
            ProcRole::Operand => {
                let block = crate::ast::Block {
                    commands: frame.commands,
                    line: frame.line,
                };
                self.push_operand(Operand::Proc(block), frame.line);
                Ok(())
            }
            ProcRole::PrefixThen(cond) => self.after_prefix_then(cond, frame.commands, frame.line),
            ProcRole::PrefixElse(cond, then_branch) => {
                self.finish_braced_if(cond, then_branch, frame.commands, frame.line)
            }
            ProcRole::CaseArm(value) => self.add_case_arm(value, frame.commands, frame.line),
            ProcRole::CaseDefault => self.set_case_default(frame.commands, frame.line),
        }
    }

    fn close_array(&mut self, line: u32) -> Result<(), ParseError> {
        let top = self.top();
        match &top.kind {
            FrameKind::Array => {}
            FrameKind::Root => return Err(self.error(line, ParseErrorKind::Unmatched("]".into()))),
            _ => {
                let kind = ParseErrorKind::Unclosed {
                    construct: top.construct().to_owned(),
                };
                return Err(self.error(top.line, kind));
            }
        }
        let Some(mut frame) = self.stack.pop() else {
            return Err(self.error(line, ParseErrorKind::Unmatched("]".into())));
        };
        let items = frame
            .operands
            .drain_all()
            .into_iter()
            .map(|p| p.value)
            .collect();
        self.push_operand(Operand::Array(items), frame.line);
        Ok(())
    }

    /// End of input: every frame but the root must be closed. Procedure
    /// blocks left on the root buffer become top-level blocks at the
    /// position they were written.
    fn finish(&mut self) -> Result<Vec<Command>, ParseError> {
        if let Some(open) = self.stack.last() {
            let kind = ParseErrorKind::Unclosed {
                construct: open.construct().to_owned(),
            };
            return Err(self.error(open.line, kind));
        }
        let mut commands = std::mem::take(&mut self.root.commands);
        let mut blocks = Vec::new();
        for p in self.root.operands.drain_all() {
            match p.value {
                Operand::Proc(block) => blocks.push((p.at, block)),
                other => self.leftovers.push((p.line, other)),
            }
        }
        for (at, block) in blocks.into_iter().rev() {
            let cmd = Command::new(CommandKind::Block(block.commands), block.line);
            commands.insert(at.min(commands.len()), cmd);
        }
        Ok(commands)
    }
}
