use crate::error::{LexError, LexErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare identifier or keyword (`SHL`, `VAR.TOTAL`, `F1`)
    Word(String),
    /// Slash-prefixed name, stored without the slash (`/INI` -> `INI`)
    Name(String),
    /// String literal, delimiters removed and escapes resolved
    Str(String),
    /// Numeric literal, kept as written
    Number(String),
    /// Operator or separator punctuation (`++`, `==`, `;`)
    Op(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    /// `%` comment text without the leading `%`
    Comment(String),
    // End of input
    Eof,
}

impl Token {
    /// Short human-readable description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Name(n) => format!("'/{}'", n),
            Token::Str(s) => format!("string ({})", s),
            Token::Number(n) => format!("number {}", n),
            Token::Op(o) => format!("operator '{}'", o),
            Token::LBrace => "'{'".to_owned(),
            Token::RBrace => "'}'".to_owned(),
            Token::LBracket => "'['".to_owned(),
            Token::RBracket => "']'".to_owned(),
            Token::Comment(_) => "comment".to_owned(),
            Token::Eof => "end of input".to_owned(),
        }
    }

    /// Kind name and raw text, for token dumps.
    pub fn parts(&self) -> (&'static str, &str) {
        match self {
            Token::Word(w) => ("word", w),
            Token::Name(n) => ("name", n),
            Token::Str(s) => ("string", s),
            Token::Number(n) => ("number", n),
            Token::Op(o) => ("operator", o),
            Token::LBrace => ("block-open", "{"),
            Token::RBrace => ("block-close", "}"),
            Token::LBracket => ("array-open", "["),
            Token::RBracket => ("array-close", "]"),
            Token::Comment(c) => ("comment", c),
            Token::Eof => ("eof", ""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '$' | '@' | '#')
}

/// Identifier body characters. The embedded `.` applies to bare and
/// slash-prefixed identifiers alike.
fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '@' | '#' | '.')
}

const TWO_CHAR_OPS: [&str; 8] = ["==", "!=", "<=", ">=", "&&", "||", "++", "--"];
const ONE_CHAR_OPS: &str = "+-*/=<>!&|:;,";

pub fn lex(src: &str, filename: &str) -> Result<Vec<Spanned>, LexError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut line_start = 0usize;

    while pos < chars.len() {
        let c = chars[pos];
        let tok_line = line;
        let tok_col = (pos - line_start) as u32 + 1;
        let next = chars.get(pos + 1).copied();

        if c == '\n' {
            pos += 1;
            line += 1;
            line_start = pos;
            continue;
        }

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // Line comment
        if c == '%' {
            let start = pos + 1;
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Comment(text.trim_end().to_owned()),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Block comment
        if c == '/' && next == Some('*') {
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(LexError::new(
                        filename,
                        tok_line,
                        tok_col,
                        LexErrorKind::UnterminatedComment,
                    ));
                }
                if chars[pos] == '\n' {
                    pos += 1;
                    line += 1;
                    line_start = pos;
                    continue;
                }
                if chars[pos] == '*' && chars.get(pos + 1) == Some(&'/') {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        // Slash-prefixed name
        if c == '/' && next.is_some_and(is_ident_char) {
            pos += 1;
            let start = pos;
            while pos < chars.len() && is_ident_char(chars[pos]) {
                pos += 1;
            }
            let name: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Name(name),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Parenthesized string with nesting and escapes
        if c == '(' {
            pos += 1;
            let mut depth = 1usize;
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(LexError::new(
                        filename,
                        tok_line,
                        tok_col,
                        LexErrorKind::UnterminatedString,
                    ));
                }
                let sc = chars[pos];
                match sc {
                    '\\' => {
                        pos += 1;
                        if pos >= chars.len() {
                            return Err(LexError::new(
                                filename,
                                tok_line,
                                tok_col,
                                LexErrorKind::UnterminatedString,
                            ));
                        }
                        let esc = chars[pos];
                        match esc {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            '\n' => {
                                // line continuation
                                line += 1;
                                line_start = pos + 1;
                            }
                            d if d.is_digit(8) => {
                                let mut value = 0u32;
                                let mut taken = 0;
                                while taken < 3 && pos < chars.len() && chars[pos].is_digit(8) {
                                    value = value * 8 + chars[pos].to_digit(8).unwrap_or(0);
                                    pos += 1;
                                    taken += 1;
                                }
                                s.push(char::from_u32(value).unwrap_or('?'));
                                continue;
                            }
                            other => s.push(other),
                        }
                        pos += 1;
                    }
                    '(' => {
                        depth += 1;
                        s.push(sc);
                        pos += 1;
                    }
                    ')' => {
                        depth -= 1;
                        pos += 1;
                        if depth == 0 {
                            break;
                        }
                        s.push(sc);
                    }
                    '\n' => {
                        s.push(sc);
                        pos += 1;
                        line += 1;
                        line_start = pos;
                    }
                    _ => {
                        s.push(sc);
                        pos += 1;
                    }
                }
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Quoted string, single line
        if c == '\'' || c == '"' {
            let quote = c;
            pos += 1;
            let mut s = String::new();
            loop {
                match chars.get(pos) {
                    None | Some('\n') => {
                        return Err(LexError::new(
                            filename,
                            tok_line,
                            tok_col,
                            LexErrorKind::UnterminatedString,
                        ));
                    }
                    Some('\\') if chars.get(pos + 1).is_some_and(|n| *n != '\n') => {
                        s.push(chars[pos + 1]);
                        pos += 2;
                    }
                    Some(q) if *q == quote => {
                        pos += 1;
                        break;
                    }
                    Some(other) => {
                        s.push(*other);
                        pos += 1;
                    }
                }
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Hex number
        if c == '0' && matches!(next, Some('x') | Some('X')) {
            let start = pos;
            pos += 2;
            while pos < chars.len() && chars[pos].is_ascii_hexdigit() {
                pos += 1;
            }
            if pos == start + 2 {
                return Err(LexError::new(
                    filename,
                    tok_line,
                    tok_col,
                    LexErrorKind::InvalidNumber("0x".to_owned()),
                ));
            }
            let s: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Number(s),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Signed decimal number
        let starts_number = |at: usize| -> bool {
            match chars.get(at) {
                Some(d) if d.is_ascii_digit() => true,
                Some('.') => chars.get(at + 1).is_some_and(|d| d.is_ascii_digit()),
                _ => false,
            }
        };
        if starts_number(pos) || ((c == '-' || c == '+') && starts_number(pos + 1)) {
            let start = pos;
            if c == '-' || c == '+' {
                pos += 1;
            }
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len()
                && chars[pos] == '.'
                && chars.get(pos + 1).is_some_and(|d| d.is_ascii_digit())
            {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let s: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Number(s),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Identifier
        if is_ident_start(c) {
            let start = pos;
            while pos < chars.len() && is_ident_char(chars[pos]) {
                pos += 1;
            }
            let w: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Word(w),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Delimiters
        let delim = match c {
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            _ => None,
        };
        if let Some(token) = delim {
            tokens.push(Spanned {
                token,
                line: tok_line,
                column: tok_col,
            });
            pos += 1;
            continue;
        }

        // Operators
        if let Some(n) = next {
            let pair: String = [c, n].iter().collect();
            if TWO_CHAR_OPS.contains(&pair.as_str()) {
                tokens.push(Spanned {
                    token: Token::Op(pair),
                    line: tok_line,
                    column: tok_col,
                });
                pos += 2;
                continue;
            }
        }
        if ONE_CHAR_OPS.contains(c) {
            tokens.push(Spanned {
                token: Token::Op(c.to_string()),
                line: tok_line,
                column: tok_col,
            });
            pos += 1;
            continue;
        }

        return Err(LexError::new(
            filename,
            tok_line,
            tok_col,
            LexErrorKind::InvalidCharacter(c),
        ));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
        column: (pos - line_start) as u32 + 1,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src, "test.dbm")
            .expect("lex should succeed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn dotted_identifiers_stay_whole_with_and_without_prefix() {
        let toks = kinds("/VAR.TOTAL VAR.TOTAL SETVAR");
        assert_eq!(
            toks,
            vec![
                Token::Name("VAR.TOTAL".into()),
                Token::Word("VAR.TOTAL".into()),
                Token::Word("SETVAR".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn nested_parens_and_escapes_in_strings() {
        let toks = kinds(r"(a (b) \(c\) \\ \101) SH");
        assert_eq!(toks[0], Token::Str("a (b) (c) \\ A".into()));
        assert_eq!(toks[1], Token::Word("SH".into()));
    }

    #[test]
    fn signed_numbers_and_operators() {
        let toks = kinds("-4 NL .5 +2 /X ++ 3 - 1");
        assert_eq!(
            toks,
            vec![
                Token::Number("-4".into()),
                Token::Word("NL".into()),
                Token::Number(".5".into()),
                Token::Number("+2".into()),
                Token::Name("X".into()),
                Token::Op("++".into()),
                Token::Number("3".into()),
                Token::Op("-".into()),
                Token::Number("1".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_kept_as_tokens_and_block_comments_skipped() {
        let toks = kinds("%%Title: Statement\n/* skipped\n over lines */ NL");
        assert_eq!(toks[0], Token::Comment("%Title: Statement".into()));
        assert_eq!(toks[1], Token::Word("NL".into()));
    }

    #[test]
    fn line_and_column_are_tracked() {
        let toks = lex("NL\n  (x) SH", "t.dbm").expect("lex");
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (2, 3));
        assert_eq!((toks[2].line, toks[2].column), (2, 7));
    }

    #[test]
    fn multi_line_string_advances_line_counter() {
        let toks = lex("(one\ntwo) SH\nNL", "t.dbm").expect("lex");
        assert_eq!(toks[0].token, Token::Str("one\ntwo".into()));
        assert_eq!(toks[2].line, 3);
    }

    #[test]
    fn unterminated_paren_string_is_an_error() {
        let err = lex("(never closed SH", "bad.dbm").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unterminated_quote_string_is_an_error() {
        let err = lex("'open\n'", "bad.dbm").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let err = lex("NL /* dangling", "bad.dbm").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedComment);
        assert_eq!(err.column, 4);
    }

    #[test]
    fn invalid_start_character_is_an_error() {
        let err = lex("NL \u{7} SH", "bad.dbm").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidCharacter('\u{7}'));
    }

    #[test]
    fn stray_close_paren_is_rejected() {
        assert!(lex("NL ) SH", "bad.dbm").is_err());
    }

    #[test]
    fn hex_numbers() {
        assert_eq!(kinds("0x1F")[0], Token::Number("0x1F".into()));
    }
}
