//! Command tree produced by the parser.
//!
//! Every command carries the line of the keyword that produced it. Block
//! commands own their children; nothing here is resolved against symbol
//! tables, that happens in `symbols` and `resolve`.
use std::fmt;

// ──────────────────────────────────────────────
// Operands
// ──────────────────────────────────────────────

/// A value sitting on the pending-operand buffer, or captured as a
/// command parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Numeric literal as written
    Number(String),
    /// String literal; `vsub` is set when a `VSUB` marked it for
    /// `$$NAME.` variable substitution
    Str { text: String, vsub: bool },
    /// Slash-prefixed literal name (`/VAR_X` -> `VAR_X`)
    Name(String),
    /// Bare identifier used as a value: a variable or field reference
    Ident(String),
    Array(Vec<Operand>),
    /// `{ ... }` procedure block
    Proc(Block),
    Cond(Box<Condition>),
    Expr {
        op: ArithOp,
        lhs: Box<Operand>,
        rhs: Box<Operand>,
    },
    /// `value (picture) FORMAT`
    Formatted { value: Box<Operand>, picture: String },
    /// `(file) CACHE`
    Cached(Box<Operand>),
}

impl Operand {
    pub fn str(text: impl Into<String>) -> Self {
        Operand::Str {
            text: text.into(),
            vsub: false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => parse_number(n),
            _ => None,
        }
    }

    /// Text of a string, name or identifier operand.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Operand::Str { text, .. } => Some(text),
            Operand::Name(n) | Operand::Ident(n) => Some(n),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Operand::Number(_) => "number",
            Operand::Str { .. } => "string",
            Operand::Name(_) => "name",
            Operand::Ident(_) => "identifier",
            Operand::Array(_) => "array",
            Operand::Proc(_) => "procedure block",
            Operand::Cond(_) => "condition",
            Operand::Expr { .. } => "expression",
            Operand::Formatted { .. } => "formatted value",
            Operand::Cached(_) => "cached resource",
        }
    }
}

/// Parse a numeric literal, including `0x` hex.
pub fn parse_number(text: &str) -> Option<f64> {
    let t = text.strip_prefix('+').unwrap_or(text);
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    t.parse::<f64>().ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub commands: Vec<Command>,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

// ──────────────────────────────────────────────
// Conditions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub fn from_keyword(w: &str) -> Option<CmpOp> {
        match w {
            "eq" => Some(CmpOp::Eq),
            "ne" => Some(CmpOp::Ne),
            "lt" => Some(CmpOp::Lt),
            "gt" => Some(CmpOp::Gt),
            "le" => Some(CmpOp::Le),
            "ge" => Some(CmpOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    /// A bare value used as a boolean (`VARINI`, `true`)
    Truthy(Operand),
}

impl Condition {
    /// Visit every comparison in the condition tree.
    pub fn for_each_compare<'a>(&'a self, f: &mut dyn FnMut(CmpOp, &'a Operand, &'a Operand)) {
        match self {
            Condition::Compare { op, lhs, rhs } => f(*op, lhs, rhs),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.for_each_compare(f);
                b.for_each_compare(f);
            }
            Condition::Not(c) => c.for_each_compare(f),
            Condition::Truthy(_) => {}
        }
    }
}

// ──────────────────────────────────────────────
// Commands
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
    Justify,
}

impl Align {
    /// `SHP` alignment codes.
    pub fn from_code(code: i64) -> Option<Align> {
        match code {
            0 => Some(Align::Left),
            1 => Some(Align::Right),
            2 => Some(Align::Center),
            3 => Some(Align::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `ORITL`: origin top-left
    TopLeft,
    Portrait,
    Landscape,
}

/// One `(value) { block }` pair of a case dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub value: String,
    pub body: Vec<Command>,
    pub line: u32,
}

/// `CASE <field> (V1) {..} (V2) {..} {default} ENDCASE`
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTable {
    pub discriminant: String,
    pub arms: Vec<CaseArm>,
    pub default: Option<Vec<Command>>,
}

/// The surface syntax a conditional was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfForm {
    /// `cond {then} IF`, `cond {then} {else} IFELSE`
    Postfix,
    /// `IF cond {then} ELSE {else} ENDIF`
    Braced,
    /// `IF cond THEN ... ELSE ... ENDIF`
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// `SH SHL SHR SHr SHC SHJ SHP`
    Show {
        keyword: String,
        text: Operand,
        align: Align,
        width: Option<f64>,
    },
    MoveTo {
        x: Operand,
        y: Operand,
    },
    MoveH {
        x: Operand,
    },
    /// `NL`, with the optional signed spacing override
    NewLine {
        spacing: Option<f64>,
    },
    SetLineSpacing(f64),
    SelectFont(String),
    SelectColor(String),
    DefineFont {
        alias: String,
        font: String,
        size: f64,
    },
    DefineColor {
        alias: String,
        value: Operand,
    },
    SetVar {
        name: String,
        value: Operand,
        init_only: bool,
    },
    /// `++` (+1) and `--` (-1)
    Step {
        name: String,
        delta: i32,
    },
    /// `GETINTV`
    Substring {
        result: String,
        source: Operand,
        start: Operand,
        length: Operand,
    },
    GetItem {
        result: String,
        array: Operand,
        index: Operand,
    },
    DrawBox {
        x: Operand,
        y: Operand,
        width: Operand,
        height: Operand,
        style: Operand,
    },
    /// `SCALL`: segment, image object or subroutine invocation
    SegmentCall {
        resource: Operand,
        args: Vec<Operand>,
    },
    ImageCall {
        resource: Operand,
        scale: Option<f64>,
    },
    SetForm(String),
    /// `SETLKF`: list of frames, each `[x y width height ...]`
    SetFrames(Vec<Vec<f64>>),
    /// `SETPAGEDEF`: one command list per page layout
    PageDef(Vec<Vec<Command>>),
    SetParams(Operand),
    PageBreak,
    NewFrame,
    SkipPage,
    Bookmark(Operand),
    PageNumber(Vec<Operand>),
    SetUnit(Option<String>),
    Orientation(Orientation),
    SetDelimiter(String),
    /// `SETFTSW`: inline font-switch marker definition
    FontSwitch {
        marker: String,
        mode: Operand,
    },
    /// Recognized but not translated; generation emits a marked
    /// placeholder.
    Unsupported {
        keyword: String,
        operands: Vec<Operand>,
    },
    If {
        cond: Condition,
        then_branch: Vec<Command>,
        else_branch: Vec<Command>,
        form: IfForm,
    },
    Case(DispatchTable),
    /// `/NAME { ... } XGFRESDEF`
    Resource {
        name: String,
        body: Vec<Command>,
    },
    /// Bare top-level `{ ... }` block, e.g. an overlay's form body
    Block(Vec<Command>),
}

impl Command {
    pub fn new(kind: CommandKind, line: u32) -> Self {
        Command { kind, line }
    }

    /// Source keyword this command was produced from.
    pub fn name(&self) -> &str {
        match &self.kind {
            CommandKind::Show { keyword, .. } => keyword,
            CommandKind::MoveTo { .. } => "MOVETO",
            CommandKind::MoveH { .. } => "MOVEH",
            CommandKind::NewLine { .. } => "NL",
            CommandKind::SetLineSpacing(_) => "SETLSP",
            CommandKind::SelectFont(_) => "SETFONT",
            CommandKind::SelectColor(_) => "SETCOLOR",
            CommandKind::DefineFont { .. } => "INDEXFONT",
            CommandKind::DefineColor { .. } => "INDEXCOLOR",
            CommandKind::SetVar { .. } => "SETVAR",
            CommandKind::Step { delta, .. } => {
                if *delta >= 0 {
                    "++"
                } else {
                    "--"
                }
            }
            CommandKind::Substring { .. } => "GETINTV",
            CommandKind::GetItem { .. } => "GETITEM",
            CommandKind::DrawBox { .. } => "DRAWB",
            CommandKind::SegmentCall { .. } => "SCALL",
            CommandKind::ImageCall { .. } => "ICALL",
            CommandKind::SetForm(_) => "SETFORM",
            CommandKind::SetFrames(_) => "SETLKF",
            CommandKind::PageDef(_) => "SETPAGEDEF",
            CommandKind::SetParams(_) => "SETPARAMS",
            CommandKind::PageBreak => "PAGEBRK",
            CommandKind::NewFrame => "NEWFRAME",
            CommandKind::SkipPage => "SKIPPAGE",
            CommandKind::Bookmark(_) => "BOOKMARK",
            CommandKind::PageNumber(_) => "SETPAGENUMBER",
            CommandKind::SetUnit(_) => "SETUNIT",
            CommandKind::Orientation(Orientation::TopLeft) => "ORITL",
            CommandKind::Orientation(Orientation::Portrait) => "PORT",
            CommandKind::Orientation(Orientation::Landscape) => "LAND",
            CommandKind::SetDelimiter(_) => "SETDBSEP",
            CommandKind::FontSwitch { .. } => "SETFTSW",
            CommandKind::Unsupported { keyword, .. } => keyword,
            CommandKind::If { .. } => "IF",
            CommandKind::Case(_) => "CASE",
            CommandKind::Resource { .. } => "XGFRESDEF",
            CommandKind::Block(_) => "BLOCK",
        }
    }

    /// Nested command lists, in source order.
    pub fn children(&self) -> Vec<&[Command]> {
        match &self.kind {
            CommandKind::If {
                then_branch,
                else_branch,
                ..
            } => vec![then_branch.as_slice(), else_branch.as_slice()],
            CommandKind::Case(table) => {
                let mut out: Vec<&[Command]> =
                    table.arms.iter().map(|a| a.body.as_slice()).collect();
                if let Some(d) = &table.default {
                    out.push(d.as_slice());
                }
                out
            }
            CommandKind::Resource { body, .. } => vec![body.as_slice()],
            CommandKind::Block(body) => vec![body.as_slice()],
            CommandKind::PageDef(pages) => pages.iter().map(|p| p.as_slice()).collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`Command::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Vec<Command>> {
        match &mut self.kind {
            CommandKind::If {
                then_branch,
                else_branch,
                ..
            } => vec![then_branch, else_branch],
            CommandKind::Case(table) => {
                let mut out: Vec<&mut Vec<Command>> =
                    table.arms.iter_mut().map(|a| &mut a.body).collect();
                if let Some(d) = &mut table.default {
                    out.push(d);
                }
                out
            }
            CommandKind::Resource { body, .. } => vec![body],
            CommandKind::Block(body) => vec![body],
            CommandKind::PageDef(pages) => pages.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

/// Depth-first walk over a command list, parents before children.
pub fn walk<'a>(commands: &'a [Command], f: &mut dyn FnMut(&'a Command)) {
    for cmd in commands {
        f(cmd);
        for child in cmd.children() {
            walk(child, f);
        }
    }
}

/// Mutable depth-first walk, parents before children.
pub fn walk_mut(commands: &mut [Command], f: &mut dyn FnMut(&mut Command)) {
    for cmd in commands.iter_mut() {
        f(cmd);
        for child in cmd.children_mut() {
            walk_mut(child, f);
        }
    }
}

// ──────────────────────────────────────────────
// Documents
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `.DBM` main document
    Main,
    /// `.FRM` overlay/form
    Overlay,
}

/// Header comments and data-layout declarations of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub creation_date: Option<String>,
    /// Record fields declared between `%%WIZVAR:BEGIN` and `%%WIZVAR:END`
    pub fields: Vec<String>,
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// File name as given to the parser
    pub file: String,
    pub kind: DocumentKind,
    pub metadata: Metadata,
    pub commands: Vec<Command>,
    /// Operands left on a buffer when their block closed
    pub leftovers: Vec<(u32, Operand)>,
}

impl Document {
    /// Upper-cased file stem with non-identifier characters removed; the
    /// target-language name of this document.
    pub fn target_name(&self) -> String {
        target_name(&self.file)
    }
}

/// Derive a target-language identifier from a file name or resource
/// reference (`forms/Casio_F.frm` -> `CASIO_F`).
pub fn target_name(file: &str) -> String {
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
    let stem = match base.rfind('.') {
        Some(i) if i > 0 => &base[..i],
        _ => base,
    };
    let name: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase();
    if name.is_empty() {
        "CONVERTED".to_owned()
    } else {
        name
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Main => write!(f, "main"),
            DocumentKind::Overlay => write!(f, "overlay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_name_strips_directories_and_extension() {
        assert_eq!(target_name("forms/Casio_F.frm"), "CASIO_F");
        assert_eq!(target_name("C:\\x\\stmt-01.DBM"), "STMT01");
        assert_eq!(target_name("---.dbm"), "CONVERTED");
    }

    #[test]
    fn parse_number_handles_sign_and_hex() {
        assert_eq!(parse_number("+2.5"), Some(2.5));
        assert_eq!(parse_number("-4"), Some(-4.0));
        assert_eq!(parse_number("0x10"), Some(16.0));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn walk_visits_nested_commands_in_source_order() {
        let inner = Command::new(CommandKind::NewLine { spacing: None }, 2);
        let outer = Command::new(
            CommandKind::If {
                cond: Condition::Truthy(Operand::Ident("X".into())),
                then_branch: vec![inner],
                else_branch: vec![Command::new(CommandKind::PageBreak, 3)],
                form: IfForm::Braced,
            },
            1,
        );
        let mut names = Vec::new();
        walk(std::slice::from_ref(&outer), &mut |c| names.push(c.name().to_owned()));
        assert_eq!(names, vec!["IF", "NL", "PAGEBRK"]);
    }
}
