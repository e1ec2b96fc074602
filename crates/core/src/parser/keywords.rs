use super::operands::type_error;
use super::Parser;
use crate::ast::{parse_number, Align, Command, CommandKind, Operand, Orientation};
use crate::error::ParseError;

/// Keywords that are recognized but have no translation; their operands
/// are still consumed so the buffer stays balanced.
const UNSUPPORTED: &[(&str, usize)] = &[
    ("CLIP", 4),
    ("ENDCLIP", 0),
    ("INDEXBAT", 2),
    ("SETPROJECT", 1),
    ("BEGINPAGE", 1),
    ("ENDPAGE", 1),
];

/// Text of a string, name or identifier, looking through `CACHE`.
pub(crate) fn operand_text(op: &Operand) -> Option<String> {
    match op {
        Operand::Cached(inner) => operand_text(inner),
        other => other.as_text().map(str::to_owned),
    }
}

impl<'a> Parser<'a> {
    /// Build the command for a statement keyword. Returns `Ok(false)` when
    /// `word` is not one.
    pub(super) fn statement(&mut self, word: &str, line: u32) -> Result<bool, ParseError> {
        let kind = match word {
            "SH" | "SHL" | "SHR" | "SHr" | "SHC" | "SHJ" => {
                let [text] = self.take::<1>(word, line)?;
                let align = match word {
                    "SHR" | "SHr" => Align::Right,
                    "SHC" => Align::Center,
                    "SHJ" => Align::Justify,
                    _ => Align::Left,
                };
                CommandKind::Show {
                    keyword: word.to_owned(),
                    text,
                    align,
                    width: None,
                }
            }
            "SHP" => {
                let [code] = self.take::<1>(word, line)?;
                let align = code
                    .as_number()
                    .and_then(|n| Align::from_code(n as i64))
                    .ok_or_else(|| self.error(line, type_error(word, "alignment code 0-3", &code)))?;
                let available = self.buffer().available();
                let width = match self.buffer().peek() {
                    Some(Operand::Number(n)) if available >= 2 => parse_number(n),
                    _ => None,
                };
                if width.is_some() {
                    self.take::<1>(word, line)?;
                }
                let [text] = self.take::<1>(word, line)?;
                CommandKind::Show {
                    keyword: word.to_owned(),
                    text,
                    align,
                    width,
                }
            }
            "MOVETO" => {
                let [x, y] = self.take::<2>(word, line)?;
                CommandKind::MoveTo { x, y }
            }
            "MOVEH" => {
                let [x] = self.take::<1>(word, line)?;
                CommandKind::MoveH { x }
            }
            "NL" => {
                let spacing = match self.buffer().peek() {
                    Some(Operand::Number(n)) => parse_number(n),
                    _ => None,
                };
                if spacing.is_some() {
                    self.take::<1>(word, line)?;
                }
                CommandKind::NewLine { spacing }
            }
            "SETLSP" => {
                let [value] = self.take::<1>(word, line)?;
                CommandKind::SetLineSpacing(self.number(word, &value, line)?)
            }
            "SETVAR" => {
                let init_only = self.buffer().available() >= 3
                    && matches!(self.buffer().peek(), Some(Operand::Name(n)) if n == "INI");
                if init_only {
                    self.take::<1>(word, line)?;
                }
                let [name, value] = self.take::<2>(word, line)?;
                let name = self.name(word, &name, line)?;
                self.variables.insert(name.clone());
                CommandKind::SetVar {
                    name,
                    value,
                    init_only,
                }
            }
            "++" | "--" => {
                let [name] = self.take::<1>(word, line)?;
                let name = match name {
                    Operand::Name(n) | Operand::Ident(n) => n,
                    other => return Err(self.error(line, type_error(word, "variable name", &other))),
                };
                CommandKind::Step {
                    name,
                    delta: if word == "++" { 1 } else { -1 },
                }
            }
            "GETINTV" => {
                let [result, source, start, length] = self.take::<4>(word, line)?;
                CommandKind::Substring {
                    result: self.name(word, &result, line)?,
                    source,
                    start,
                    length,
                }
            }
            "GETITEM" => {
                let [result, array, index] = self.take::<3>(word, line)?;
                CommandKind::GetItem {
                    result: self.name(word, &result, line)?,
                    array,
                    index,
                }
            }
            "DRAWB" => {
                let [x, y, width, height, style] = self.take::<5>(word, line)?;
                CommandKind::DrawBox {
                    x,
                    y,
                    width,
                    height,
                    style,
                }
            }
            "SCALL" => {
                let has_args = self.buffer().available() >= 2
                    && matches!(
                        self.buffer().peek(),
                        Some(Operand::Number(_)) | Some(Operand::Array(_))
                    );
                let args = if has_args {
                    let [arg] = self.take::<1>(word, line)?;
                    vec![arg]
                } else {
                    Vec::new()
                };
                let [resource] = self.take::<1>(word, line)?;
                CommandKind::SegmentCall { resource, args }
            }
            "ICALL" => {
                let scale = if self.buffer().available() >= 2 {
                    match self.buffer().peek() {
                        Some(Operand::Number(n)) => parse_number(n),
                        _ => None,
                    }
                } else {
                    None
                };
                if scale.is_some() {
                    self.take::<1>(word, line)?;
                }
                let [resource] = self.take::<1>(word, line)?;
                CommandKind::ImageCall { resource, scale }
            }
            "SETFORM" => {
                let [form] = self.take::<1>(word, line)?;
                match operand_text(&form) {
                    Some(name) => CommandKind::SetForm(name),
                    None => return Err(self.error(line, type_error(word, "form name", &form))),
                }
            }
            "SETLKF" => {
                let [frames] = self.take::<1>(word, line)?;
                CommandKind::SetFrames(self.frame_list(word, frames, line)?)
            }
            "SETPAGEDEF" => {
                let [layouts] = self.take::<1>(word, line)?;
                CommandKind::PageDef(self.layouts(word, layouts, line)?)
            }
            "SETPARAMS" => {
                let [params] = self.take::<1>(word, line)?;
                CommandKind::SetParams(params)
            }
            "PAGEBRK" => CommandKind::PageBreak,
            "NEWFRAME" => CommandKind::NewFrame,
            "SKIPPAGE" => CommandKind::SkipPage,
            "ORITL" => CommandKind::Orientation(Orientation::TopLeft),
            "PORT" => CommandKind::Orientation(Orientation::Portrait),
            "LAND" => CommandKind::Orientation(Orientation::Landscape),
            "SETUNIT" => {
                let unit = match self.buffer().peek() {
                    Some(Operand::Ident(u)) => Some(u.clone()),
                    _ => None,
                };
                if unit.is_some() {
                    self.take::<1>(word, line)?;
                }
                CommandKind::SetUnit(unit)
            }
            "INDEXFONT" => {
                let [alias, font, size] = self.take::<3>(word, line)?;
                let alias = self.name(word, &alias, line)?;
                let font = match &font {
                    Operand::Name(f) | Operand::Ident(f) | Operand::Str { text: f, .. } => f.clone(),
                    other => return Err(self.error(line, type_error(word, "font name", other))),
                };
                let size = self.number(word, &size, line)?;
                self.fonts.insert(alias.clone());
                CommandKind::DefineFont { alias, font, size }
            }
            "INDEXCOLOR" => {
                let [alias, value] = self.take::<2>(word, line)?;
                let alias = self.name(word, &alias, line)?;
                self.colors.insert(alias.clone());
                CommandKind::DefineColor { alias, value }
            }
            "XGFRESDEF" => {
                let [name, body] = self.take::<2>(word, line)?;
                let name = self.name(word, &name, line)?;
                match body {
                    Operand::Proc(block) => CommandKind::Resource {
                        name,
                        body: block.commands,
                    },
                    other => return Err(self.error(line, type_error(word, "procedure block", &other))),
                }
            }
            "BOOKMARK" => {
                let [text] = self.take::<1>(word, line)?;
                CommandKind::Bookmark(text)
            }
            "SETPAGENUMBER" => {
                let params = self.take::<5>(word, line)?;
                CommandKind::PageNumber(params.into())
            }
            "SETFTSW" => {
                let [marker, mode] = self.take::<2>(word, line)?;
                match operand_text(&marker) {
                    Some(marker) => CommandKind::FontSwitch { marker, mode },
                    None => return Err(self.error(line, type_error(word, "marker string", &marker))),
                }
            }
            "SETDBSEP" => {
                let [sep] = self.take::<1>(word, line)?;
                match operand_text(&sep) {
                    Some(sep) => CommandKind::SetDelimiter(sep),
                    None => return Err(self.error(line, type_error(word, "separator string", &sep))),
                }
            }
            _ => match UNSUPPORTED.iter().find(|(k, _)| *k == word) {
                Some((keyword, arity)) => {
                    let operands = self
                        .buffer()
                        .pop_n(keyword, *arity)
                        .map_err(|k| self.error(line, k))?;
                    tracing::debug!(keyword, line, "unsupported keyword recorded");
                    CommandKind::Unsupported {
                        keyword: (*keyword).to_owned(),
                        operands,
                    }
                }
                None => return Ok(false),
            },
        };
        self.emit(kind, line)?;
        Ok(true)
    }

    fn take<const N: usize>(&mut self, word: &str, line: u32) -> Result<[Operand; N], ParseError> {
        self.buffer()
            .take::<N>(word)
            .map(|(values, _, _)| values)
            .map_err(|k| self.error(line, k))
    }

    fn name(&self, word: &str, op: &Operand, line: u32) -> Result<String, ParseError> {
        match op {
            Operand::Name(n) => Ok(n.clone()),
            other => Err(self.error(line, type_error(word, "/name", other))),
        }
    }

    fn number(&self, word: &str, op: &Operand, line: u32) -> Result<f64, ParseError> {
        op.as_number()
            .ok_or_else(|| self.error(line, type_error(word, "number", op)))
    }

    /// `[[x y w h ...] ...]` or a single flat `[x y w h ...]`.
    fn frame_list(&self, word: &str, op: Operand, line: u32) -> Result<Vec<Vec<f64>>, ParseError> {
        let Operand::Array(items) = op else {
            return Err(self.error(line, type_error(word, "array", &op)));
        };
        if items.iter().all(|i| matches!(i, Operand::Number(_))) {
            let frame = items.iter().filter_map(Operand::as_number).collect();
            return Ok(vec![frame]);
        }
        let mut frames = Vec::new();
        for item in items {
            match item {
                Operand::Array(inner) => {
                    let mut frame = Vec::new();
                    for v in &inner {
                        frame.push(self.number(word, v, line)?);
                    }
                    frames.push(frame);
                }
                other => return Err(self.error(line, type_error(word, "frame array", &other))),
            }
        }
        Ok(frames)
    }

    /// Page layouts of `[{...} {...}] SETPAGEDEF`. Non-block entries are
    /// kept as unused operands.
    fn layouts(&mut self, word: &str, op: Operand, line: u32) -> Result<Vec<Vec<Command>>, ParseError> {
        match op {
            Operand::Array(items) => {
                let mut pages = Vec::new();
                for item in items {
                    match item {
                        Operand::Proc(block) => pages.push(block.commands),
                        other => self.leftovers.push((line, other)),
                    }
                }
                Ok(pages)
            }
            Operand::Proc(block) => Ok(vec![block.commands]),
            other => Err(self.error(line, type_error(word, "layout array", &other))),
        }
    }
}
