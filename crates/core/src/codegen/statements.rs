//! Per-command translation inside a format body.

use super::{num, quote, Generator};
use crate::ast::{self, target_name, Command, CommandKind, DispatchTable, Operand, Orientation};
use crate::error::GenerationInvariantError;
use crate::state::Placement;

impl<'a> Generator<'a> {
    pub(super) fn command(&mut self, cmd: &Command) -> Result<(), GenerationInvariantError> {
        let line = cmd.line;
        if !matches!(cmd.kind, CommandKind::DrawBox { .. }) {
            self.state.end_drawing_run();
        }
        match &cmd.kind {
            CommandKind::Show {
                text, align, width, ..
            } => self.show(text, *align, *width, line)?,
            CommandKind::MoveTo { x, y } => {
                let (x, y) = (self.placement(x), self.placement(y));
                self.state.move_to_placement(x, y);
            }
            CommandKind::MoveH { x } => match self.placement(x) {
                Placement::At(v) => self.state.move_h(v),
                other => {
                    self.state.pos.next_x = other;
                    if !matches!(self.state.pos.next_y, Placement::At(_) | Placement::Expr(_)) {
                        self.state.pos.next_y = Placement::Same;
                    }
                }
            },
            CommandKind::NewLine { spacing } => self.new_line(*spacing),
            CommandKind::SetLineSpacing(n) => {
                self.state.set_line_spacing(*n);
                self.out.line(format!("SETUNITS LINESP {} MM;", num(*n)));
            }
            CommandKind::SelectFont(f) => self.state.set_font(f),
            CommandKind::SelectColor(c) => self.state.set_color(c),
            CommandKind::DefineFont { .. } | CommandKind::DefineColor { .. } => {}
            CommandKind::SetVar {
                name,
                value,
                init_only,
            } => {
                if !*init_only {
                    self.assignment(line, name, value);
                }
            }
            CommandKind::Step { name, delta } => {
                let op = if *delta >= 0 { "+" } else { "-" };
                self.out
                    .line(format!("{} = {} {} {};", name, name, op, delta.unsigned_abs()));
            }
            CommandKind::Substring {
                result,
                source,
                start,
                length,
            } => {
                let start = match start.as_number() {
                    Some(s) => num(s + 1.0),
                    None => format!("{}+1", self.value(start)),
                };
                self.out.line(format!(
                    "{} = SUBSTR({}, {}, {}, '');",
                    result,
                    self.value(source),
                    start,
                    self.value(length)
                ));
            }
            CommandKind::GetItem {
                result,
                array,
                index,
            } => {
                let index = match index.as_number() {
                    Some(i) => num(i + 1.0),
                    None => format!("{}+1", self.value(index)),
                };
                self.out
                    .line(format!("{} = {}[{}];", result, self.value(array), index));
            }
            CommandKind::DrawBox {
                x,
                y,
                width,
                height,
                style,
            } => self.draw_box(line, [x, y, width, height], style)?,
            CommandKind::SegmentCall { resource, args } => {
                self.segment_call(line, resource, args)?
            }
            CommandKind::ImageCall { resource, scale } => {
                self.image_call(line, resource, *scale)?
            }
            CommandKind::SetForm(form) => {
                self.out
                    .line(format!("&CURFORM = {};", quote(&target_name(form))));
            }
            CommandKind::PageDef(pages) => self.page_def(pages),
            CommandKind::SetFrames(frames) => {
                let listed: Vec<String> = frames
                    .iter()
                    .map(|f| {
                        let dims: Vec<String> = f.iter().map(|v| num(*v)).collect();
                        format!("[{}]", dims.join(" "))
                    })
                    .collect();
                self.out.comment(format!("SETLKF frames: {}", listed.join(" ")));
            }
            CommandKind::SetParams(_) | CommandKind::Unsupported { .. } => {
                self.unsupported(cmd);
            }
            CommandKind::PageBreak | CommandKind::NewFrame => self.out.line("USE LP NEXT;"),
            CommandKind::SkipPage => self.out.line("USE LP NEXT SIDE FRONT;"),
            CommandKind::Bookmark(value) => {
                self.out.comment("BOOKMARK");
                self.out
                    .line(format!("INDEX BOOKMARK = {};", self.value(value)));
            }
            CommandKind::PageNumber(_) => {
                self.out
                    .comment("SETPAGENUMBER: page numbers are printed by the PRINTFOOTER");
            }
            CommandKind::SetUnit(unit) => {
                self.out.comment(format!(
                    "SETUNIT {}: positions are emitted in MM",
                    unit.as_deref().unwrap_or("")
                ));
            }
            CommandKind::Orientation(o) => {
                self.state.set_orientation(*o);
                let word = match o {
                    Orientation::TopLeft => "ORITL",
                    Orientation::Portrait => "PORT",
                    Orientation::Landscape => "LAND",
                };
                self.out.comment(format!("{}: origin handled by position mapping", word));
            }
            CommandKind::SetDelimiter(d) => {
                self.out.line(format!("&SEP = {};", quote(d)));
            }
            CommandKind::FontSwitch { marker, .. } => {
                self.out
                    .comment(format!("SETFTSW {}: inline font switches are resolved per TEXT", marker));
            }
            CommandKind::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let test = self.condition(cond);
                self.out.line(format!("IF ISTRUE({}); THEN;", test));
                let before = self.state.clone();
                self.branch(then_branch)?;
                self.state = before.clone();
                if !else_branch.is_empty() {
                    self.out.line("ELSE;");
                    self.branch(else_branch)?;
                    self.state = before;
                }
                self.out.line("ENDIF;");
                self.state.placed();
            }
            CommandKind::Case(table) => self.select(table)?,
            CommandKind::Resource { .. } => {}
            CommandKind::Block(body) => self.commands(body)?,
        }
        Ok(())
    }

    fn branch(&mut self, body: &[Command]) -> Result<(), GenerationInvariantError> {
        self.out.indent();
        let result = self.commands(body);
        self.out.dedent();
        result
    }

    /// Coordinate operand to a placement; anything not numeric is read at
    /// run time in millimetres.
    pub(super) fn placement(&self, op: &Operand) -> Placement {
        match op {
            Operand::Number(_) => op.as_number().map_or(Placement::Same, Placement::At),
            Operand::Ident(n) | Operand::Name(n) => Placement::Expr(n.clone()),
            Operand::Expr { .. } => Placement::Expr(self.value(op)),
            _ => Placement::Same,
        }
    }

    pub(super) fn assignment(&mut self, line: u32, name: &str, value: &Operand) {
        match value {
            Operand::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.out
                        .line(format!("{}[{}] = {};", name, i + 1, self.value(item)));
                }
            }
            Operand::Proc(_) => {
                self.report.unsupported(
                    "SETVAR",
                    self.file,
                    line,
                    Some(format!("procedure assigned to {}", name)),
                );
                self.out
                    .comment(format!("VIPP command not directly supported: SETVAR {} {{...}}", name));
            }
            other => {
                self.out.line(format!("{} = {};", name, self.value(other)));
            }
        }
    }

    fn unsupported(&mut self, cmd: &Command) {
        let detail = match &cmd.kind {
            CommandKind::Unsupported { operands, .. } if !operands.is_empty() => Some(
                operands
                    .iter()
                    .map(|o| self.value(o))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        };
        let keyword = cmd.name().to_owned();
        self.report.unsupported(&keyword, self.file, cmd.line, detail);
        self.out
            .comment(format!("VIPP command not directly supported: {}", keyword));
    }

    /// Each page layout names its form; the first becomes the current form
    /// and the last is queued for the following pages.
    fn page_def(&mut self, pages: &[Vec<Command>]) {
        let form_of = |page: &Vec<Command>| {
            let mut found = None;
            ast::walk(page, &mut |c| {
                if let CommandKind::SetForm(f) = &c.kind {
                    found.get_or_insert_with(|| target_name(f));
                }
            });
            found
        };
        let forms: Vec<String> = pages.iter().filter_map(form_of).collect();
        if let Some(first) = forms.first() {
            self.out.line(format!("&CURFORM = {};", quote(first)));
        }
        if let Some(last) = forms.last() {
            self.out.line(format!("&NEXTFORM = {};", quote(last)));
        }
    }

    /// Case dispatch nested inside a format body.
    fn select(&mut self, table: &DispatchTable) -> Result<(), GenerationInvariantError> {
        self.out
            .line(format!("SELECT NOSPACE({});", table.discriminant));
        let before = self.state.clone();
        for arm in &table.arms {
            self.out.line(format!("CASE {};", quote(&arm.value)));
            self.branch(&arm.body)?;
            self.state = before.clone();
        }
        if let Some(default) = &table.default {
            self.out.line("OTHERWISE;");
            self.branch(default)?;
            self.state = before;
        }
        self.out.line("ENDSELECT;");
        self.state.placed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{render, render_with_report};

    #[test]
    fn assignments_and_steps() {
        let out = render("/VAR_A (x) SETVAR /VAR_L [(a) (b)] SETVAR /CNT ++ /CNT --");
        assert!(out.contains("VAR_A = 'x';"), "{}", out);
        assert!(out.contains("VAR_L[1] = 'a';"), "{}", out);
        assert!(out.contains("VAR_L[2] = 'b';"), "{}", out);
        assert!(out.contains("CNT = CNT + 1;"), "{}", out);
        assert!(out.contains("CNT = CNT - 1;"), "{}", out);
    }

    #[test]
    fn substring_is_one_based() {
        let out = render("/PART FLD3 0 5 GETINTV");
        assert!(out.contains("PART = SUBSTR(FLD3, 1, 5, '');"), "{}", out);
    }

    #[test]
    fn postfix_if_else_becomes_block_if() {
        let out = render("VAR_N 3 gt { (big) SH } { (small) SH } IFELSE");
        let if_at = out.find("IF ISTRUE(VAR_N>3); THEN;").expect("IF");
        let else_at = out.find("ELSE;").expect("ELSE");
        let end_at = out.find("ENDIF;").expect("ENDIF");
        assert!(if_at < else_at && else_at < end_at, "{}", out);
        assert!(out.contains("    OUTPUT 'big'"), "{}", out);
    }

    #[test]
    fn branch_state_does_not_leak() {
        let out = render("/FA /ARIAL 8 INDEXFONT /FB /ARIALB 10 INDEXFONT FA X 1 eq { FB } IF (t) SH");
        assert!(out.contains("OUTPUT 't'\n    FONT FA NORMAL"), "{}", out);
    }

    #[test]
    fn page_breaks_and_forms() {
        let out = render("(casio.frm) SETFORM PAGEBRK SKIPPAGE");
        assert!(out.contains("&CURFORM = 'CASIO';"), "{}", out);
        assert!(out.contains("USE LP NEXT;"), "{}", out);
        assert!(out.contains("USE LP NEXT SIDE FRONT;"), "{}", out);
    }

    #[test]
    fn unsupported_commands_are_marked_and_reported() {
        let (out, report) = render_with_report("[1 2] SETPARAMS");
        assert!(
            out.contains("/* VIPP command not directly supported: SETPARAMS */"),
            "{}",
            out
        );
        assert_eq!(report.unsupported[0].keyword, "SETPARAMS");
    }

    #[test]
    fn delimiter_and_line_spacing() {
        let out = render("(;) SETDBSEP 4.5 SETLSP");
        assert!(out.contains("&SEP = ';';"), "{}", out);
        assert!(out.contains("SETUNITS LINESP 4.5 MM;"), "{}", out);
    }

    #[test]
    fn nested_case_becomes_select() {
        let out = render("X 1 eq { CASE VAR_T (A) { (a) SH } { (z) SH } ENDCASE } IF");
        assert!(out.contains("SELECT NOSPACE(VAR_T);"), "{}", out);
        assert!(out.contains("CASE 'A';"), "{}", out);
        assert!(out.contains("OTHERWISE;"), "{}", out);
        assert!(out.contains("ENDSELECT;"), "{}", out);
    }
}
