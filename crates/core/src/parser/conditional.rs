use super::operands::{fold_value, into_condition, type_error, OperandBuffer};
use super::{FrameKind, Parser, ProcRole};
use crate::ast::{CmpOp, Command, CommandKind, Condition, IfForm, Operand};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::Token;

/// How a prefix conditional's condition was terminated.
enum PrefixStop {
    Brace,
    Then,
}

impl<'a> Parser<'a> {
    /// `IF`: postfix when a procedure block of the current statement is on
    /// top of the buffer, prefix otherwise.
    pub(super) fn begin_if(&mut self, line: u32) -> Result<(), ParseError> {
        if matches!(self.buffer().peek(), Some(Operand::Proc(_))) {
            let ([cond, body], _, _) = self
                .buffer()
                .take::<2>("IF")
                .map_err(|k| self.error(line, k))?;
            let Operand::Proc(body) = body else {
                return Err(self.syntax(line, "IF body is not a block"));
            };
            let kind = CommandKind::If {
                cond: into_condition(cond),
                then_branch: body.commands,
                else_branch: Vec::new(),
                form: IfForm::Postfix,
            };
            self.emit(kind, line)?;
            self.after_closed_if = true;
            return Ok(());
        }

        self.buffer().next_epoch();
        let (stop, end) = self.scan_condition(line)?;
        let cond = self.parse_condition(self.pos, end, line)?;
        self.pos = end + 1;
        match stop {
            PrefixStop::Brace => self.open(FrameKind::Proc(ProcRole::PrefixThen(cond)), line),
            PrefixStop::Then => self.open(
                FrameKind::FlatIf {
                    cond,
                    then_branch: None,
                },
                line,
            ),
        }
        Ok(())
    }

    /// `cond {then} {else} IFELSE`
    pub(super) fn postfix_ifelse(&mut self, line: u32) -> Result<(), ParseError> {
        let ([cond, then_op, else_op], _, _) = self
            .buffer()
            .take::<3>("IFELSE")
            .map_err(|k| self.error(line, k))?;
        let then_branch = match then_op {
            Operand::Proc(b) => b.commands,
            other => return Err(self.error(line, type_error("IFELSE", "procedure block", &other))),
        };
        let else_branch = match else_op {
            Operand::Proc(b) => b.commands,
            other => return Err(self.error(line, type_error("IFELSE", "procedure block", &other))),
        };
        let kind = CommandKind::If {
            cond: into_condition(cond),
            then_branch,
            else_branch,
            form: IfForm::Postfix,
        };
        self.emit(kind, line)?;
        self.after_closed_if = true;
        Ok(())
    }

    pub(super) fn else_word(&mut self, line: u32) -> Result<(), ParseError> {
        let proc_on_top = matches!(self.buffer().peek(), Some(Operand::Proc(_)));
        let flat_has_else = match &self.top().kind {
            FrameKind::FlatIf { then_branch, .. } => Some(then_branch.is_some()),
            _ => None,
        };
        if let (Some(has_else), false) = (flat_has_else, proc_on_top) {
            if has_else {
                return Err(self.syntax(line, "IF has more than one ELSE"));
            }
            let frame = self.top_mut();
            if let FrameKind::FlatIf { then_branch, .. } = &mut frame.kind {
                *then_branch = Some(std::mem::take(&mut frame.commands));
            }
            frame.operands.next_epoch();
            return Ok(());
        }

        // `cond {then} IF {else} ELSE`
        if proc_on_top {
            let target_is_open_if = matches!(
                self.top().commands.last().map(|c| &c.kind),
                Some(CommandKind::If { form: IfForm::Postfix, else_branch, .. }) if else_branch.is_empty()
            );
            if target_is_open_if {
                let body = self.buffer().pop("ELSE").map_err(|k| self.error(line, k))?;
                let frame = self.top_mut();
                if let (
                    Operand::Proc(block),
                    Some(Command {
                        kind: CommandKind::If { else_branch, .. },
                        ..
                    }),
                ) = (body, frame.commands.last_mut())
                {
                    *else_branch = block.commands;
                }
                frame.operands.next_epoch();
                self.after_closed_if = true;
                return Ok(());
            }
        }
        Err(self.error(line, ParseErrorKind::Unmatched("ELSE".into())))
    }

    pub(super) fn end_if(&mut self, line: u32, closed_if: bool) -> Result<(), ParseError> {
        if matches!(self.top().kind, FrameKind::FlatIf { .. }) {
            let Some(frame) = self.close() else {
                return Err(self.error(line, ParseErrorKind::Unmatched("ENDIF".into())));
            };
            if let FrameKind::FlatIf { cond, then_branch } = frame.kind {
                let (then_branch, else_branch) = match then_branch {
                    Some(then_branch) => (then_branch, frame.commands),
                    None => (frame.commands, Vec::new()),
                };
                let kind = CommandKind::If {
                    cond,
                    then_branch,
                    else_branch,
                    form: IfForm::Flat,
                };
                self.emit(kind, frame.line)?;
            }
            return Ok(());
        }
        if closed_if && !self.flat_if_pending() {
            return Ok(());
        }
        Err(self.error(line, ParseErrorKind::Unmatched("ENDIF".into())))
    }

    /// The then-block of `IF cond { ... }` closed; an `ELSE {` may follow.
    pub(super) fn after_prefix_then(
        &mut self,
        cond: Condition,
        then_branch: Vec<Command>,
        line: u32,
    ) -> Result<(), ParseError> {
        let else_at = self.significant(self.pos);
        let is_else = matches!(self.token_at(else_at).map(|s| &s.token), Some(Token::Word(w)) if w == "ELSE");
        if is_else {
            let brace_at = self.significant(else_at + 1);
            if let Some(Token::LBrace) = self.token_at(brace_at).map(|s| &s.token) {
                self.pos = brace_at + 1;
                self.open(
                    FrameKind::Proc(ProcRole::PrefixElse(cond, then_branch)),
                    line,
                );
                return Ok(());
            }
        }
        self.finish_braced_if(cond, then_branch, Vec::new(), line)
    }

    pub(super) fn finish_braced_if(
        &mut self,
        cond: Condition,
        then_branch: Vec<Command>,
        else_branch: Vec<Command>,
        line: u32,
    ) -> Result<(), ParseError> {
        let kind = CommandKind::If {
            cond,
            then_branch,
            else_branch,
            form: IfForm::Braced,
        };
        self.emit(kind, line)?;
        self.after_closed_if = true;
        Ok(())
    }

    /// Find the `{` or `THEN` ending a prefix condition.
    fn scan_condition(&self, line: u32) -> Result<(PrefixStop, usize), ParseError> {
        let mut i = self.pos;
        loop {
            match self.token_at(i).map(|s| &s.token) {
                Some(Token::LBrace) => return Ok((PrefixStop::Brace, i)),
                Some(Token::Word(w)) if w == "THEN" => return Ok((PrefixStop::Then, i)),
                Some(Token::Eof) | None => {
                    let kind = ParseErrorKind::Unclosed {
                        construct: "IF".into(),
                    };
                    return Err(self.error(line, kind));
                }
                Some(Token::RBrace) | Some(Token::RBracket) => {
                    return Err(self.syntax(line, "IF condition is not followed by '{' or THEN"))
                }
                _ => i += 1,
            }
        }
    }

    /// Evaluate the tokens of a prefix condition on a private buffer. Infix
    /// comparison operators are accepted alongside the postfix keywords.
    fn parse_condition(&self, start: usize, end: usize, line: u32) -> Result<Condition, ParseError> {
        let mut buf = OperandBuffer::default();
        let mut infix: Option<CmpOp> = None;
        for spanned in &self.tokens[start..end.min(self.tokens.len())] {
            let value = match &spanned.token {
                Token::Comment(_) => continue,
                Token::Number(n) => Operand::Number(n.clone()),
                Token::Str(s) => Operand::str(s.clone()),
                Token::Name(n) => Operand::Name(n.clone()),
                Token::Word(w) => {
                    if fold_value(&mut buf, w).map_err(|k| self.error(spanned.line, k))? {
                        continue;
                    }
                    Operand::Ident(w.clone())
                }
                Token::Op(op) => {
                    infix = Some(match op.as_str() {
                        "==" | "=" => CmpOp::Eq,
                        "!=" => CmpOp::Ne,
                        "<" => CmpOp::Lt,
                        ">" => CmpOp::Gt,
                        "<=" => CmpOp::Le,
                        ">=" => CmpOp::Ge,
                        other => {
                            return Err(self.syntax(
                                spanned.line,
                                format!("operator '{}' is not allowed in an IF condition", other),
                            ))
                        }
                    });
                    continue;
                }
                other => {
                    return Err(self.syntax(
                        spanned.line,
                        format!("unexpected {} in IF condition", other.describe()),
                    ))
                }
            };
            buf.push(value, spanned.line, 0);
            if let Some(op) = infix.take() {
                let ([lhs, rhs], _, _) = buf
                    .take::<2>(op.symbol())
                    .map_err(|k| self.error(spanned.line, k))?;
                let cond = Condition::Compare { op, lhs, rhs };
                buf.push(Operand::Cond(Box::new(cond)), spanned.line, 0);
            }
        }
        if infix.is_some() {
            return Err(self.syntax(line, "IF condition ends with a comparison operator"));
        }
        let mut values = buf.drain_all();
        match values.len() {
            0 => Err(self.syntax(line, "IF without a condition")),
            1 => Ok(into_condition(values.remove(0).value)),
            n => Err(self.syntax(line, format!("IF condition leaves {} values", n))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{CmpOp, CommandKind, Condition, DocumentKind, Operand};
    use crate::lexer;
    use crate::parser::{parse, KnownAliases};

    fn first_condition(src: &str) -> Condition {
        let tokens = lexer::lex(src, "c.frm").unwrap();
        let doc = parse(&tokens, "c.frm", DocumentKind::Overlay, &KnownAliases::default()).unwrap();
        match doc.commands.into_iter().next().map(|c| c.kind) {
            Some(CommandKind::If { cond, .. }) => cond,
            other => panic!("expected IF, got {:?}", other),
        }
    }

    #[test]
    fn infix_comparison_in_prefix_condition() {
        let cond = first_condition("IF VAR_CCAST == (CCAST) { NL } ENDIF");
        assert_eq!(
            cond,
            Condition::Compare {
                op: CmpOp::Eq,
                lhs: Operand::Ident("VAR_CCAST".into()),
                rhs: Operand::str("CCAST"),
            }
        );
    }

    #[test]
    fn postfix_keywords_in_prefix_condition() {
        let cond = first_condition("IF FRLEFT 60 lt A 1 eq and THEN NL ENDIF");
        match cond {
            Condition::And(lhs, rhs) => {
                assert!(matches!(*lhs, Condition::Compare { op: CmpOp::Lt, .. }));
                assert!(matches!(*rhs, Condition::Compare { op: CmpOp::Eq, .. }));
            }
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn bare_value_condition_is_truthy() {
        let cond = first_condition("IF VARINI { NL }");
        assert_eq!(cond, Condition::Truthy(Operand::Ident("VARINI".into())));
    }

    #[test]
    fn prefix_if_without_block_or_then_is_unclosed() {
        let tokens = lexer::lex("IF A 1 eq", "c.frm").unwrap();
        let err = parse(&tokens, "c.frm", DocumentKind::Overlay, &KnownAliases::default())
            .unwrap_err();
        assert!(err.to_string().contains("'IF' is never closed"), "got: {}", err);
    }
}
