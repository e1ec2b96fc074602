use super::{FrameKind, Parser, ProcRole};
use crate::ast::{CaseArm, Command, CommandKind, DispatchTable};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::Token;

/// A CASE under construction.
#[derive(Debug)]
pub(crate) struct CaseBuilder {
    discriminant: String,
    arms: Vec<CaseArm>,
    default: Option<Vec<Command>>,
    /// `(VALUE)` read but its block not yet opened
    label: Option<(String, u32)>,
}

impl<'a> Parser<'a> {
    /// `CASE <field>`: the discriminant is the next token.
    pub(super) fn begin_case(&mut self, line: u32) -> Result<(), ParseError> {
        let at = self.significant(self.pos);
        let discriminant = match self.token_at(at).map(|s| &s.token) {
            Some(Token::Word(w)) | Some(Token::Name(w)) => w.clone(),
            _ => return Err(self.syntax(line, "CASE needs a discriminant field")),
        };
        self.pos = at + 1;
        self.buffer().next_epoch();
        let builder = CaseBuilder {
            discriminant,
            arms: Vec::new(),
            default: None,
            label: None,
        };
        self.open(FrameKind::Case(builder), line);
        Ok(())
    }

    /// Tokens directly inside a CASE: labels, blocks and ENDCASE only.
    pub(super) fn case_token(&mut self, token: Token, line: u32) -> Result<(), ParseError> {
        let case_line = self.top().line;
        let FrameKind::Case(builder) = &mut self.top_mut().kind else {
            return Err(self.error(line, ParseErrorKind::Unmatched("ENDCASE".into())));
        };
        match token {
            Token::Str(value) => {
                if let Some((prev, _)) = builder.label.replace((value, line)) {
                    return Err(self.syntax(line, format!("case value ({}) has no block", prev)));
                }
                Ok(())
            }
            Token::LBrace => {
                let role = match builder.label.take() {
                    Some((value, _)) => ProcRole::CaseArm(value),
                    None => ProcRole::CaseDefault,
                };
                self.open(FrameKind::Proc(role), line);
                Ok(())
            }
            Token::Word(w) if w == "ENDCASE" => {
                if let Some((value, _)) = builder.label.take() {
                    return Err(self.syntax(line, format!("case value ({}) has no block", value)));
                }
                let Some(frame) = self.close() else {
                    return Err(self.error(line, ParseErrorKind::Unmatched("ENDCASE".into())));
                };
                if let FrameKind::Case(builder) = frame.kind {
                    let table = DispatchTable {
                        discriminant: builder.discriminant,
                        arms: builder.arms,
                        default: builder.default,
                    };
                    self.emit(CommandKind::Case(table), frame.line)?;
                }
                Ok(())
            }
            Token::RBrace => Err(self.error(
                case_line,
                ParseErrorKind::Unclosed {
                    construct: "CASE".into(),
                },
            )),
            other => Err(self.syntax(line, format!("unexpected {} inside CASE", other.describe()))),
        }
    }

    pub(super) fn add_case_arm(
        &mut self,
        value: String,
        body: Vec<Command>,
        line: u32,
    ) -> Result<(), ParseError> {
        let FrameKind::Case(builder) = &mut self.top_mut().kind else {
            return Err(self.syntax(line, "case block outside CASE"));
        };
        builder.arms.push(CaseArm { value, body, line });
        Ok(())
    }

    pub(super) fn set_case_default(&mut self, body: Vec<Command>, line: u32) -> Result<(), ParseError> {
        let FrameKind::Case(builder) = &mut self.top_mut().kind else {
            return Err(self.syntax(line, "case block outside CASE"));
        };
        if builder.default.is_some() {
            return Err(self.syntax(line, "CASE has more than one default block"));
        }
        builder.default = Some(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{CommandKind, DocumentKind};
    use crate::error::ParseErrorKind;
    use crate::lexer;
    use crate::parser::{parse, KnownAliases};

    fn parse_str(src: &str) -> Result<crate::ast::Document, crate::error::ParseError> {
        let tokens = lexer::lex(src, "d.dbm").unwrap();
        parse(&tokens, "d.dbm", DocumentKind::Main, &KnownAliases::default())
    }

    #[test]
    fn empty_default_block_is_recorded() {
        let doc = parse_str("CASE PREFIX (A) { NL } {} ENDCASE").unwrap();
        match &doc.commands[0].kind {
            CommandKind::Case(t) => assert_eq!(t.default, Some(Vec::new())),
            other => panic!("expected CASE, got {:?}", other),
        }
    }

    #[test]
    fn nested_case_inside_arm() {
        let doc = parse_str("CASE PREFIX (A) { CASE FLD2 (X) { NL } ENDCASE } ENDCASE").unwrap();
        match &doc.commands[0].kind {
            CommandKind::Case(t) => {
                assert!(matches!(t.arms[0].body[0].kind, CommandKind::Case(_)));
            }
            other => panic!("expected CASE, got {:?}", other),
        }
    }

    #[test]
    fn label_without_block_is_rejected() {
        let err = parse_str("CASE PREFIX (A) (B) { NL } ENDCASE").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Syntax(ref m) if m.contains("(A)")));
    }

    #[test]
    fn stray_endcase_is_unmatched() {
        let err = parse_str("NL ENDCASE").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Unmatched(ref s) if s == "ENDCASE"));
    }
}
