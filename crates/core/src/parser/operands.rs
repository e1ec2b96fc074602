//! Pending-operand buffer and the value-producing keywords that fold
//! operands back onto it.
//!
//! Each operand remembers the statement epoch it was pushed in. A statement
//! keyword opens a new epoch; pops only reach operands of the current one.

use crate::ast::{ArithOp, CmpOp, Condition, Operand};
use crate::error::ParseErrorKind;

#[derive(Debug, Clone)]
pub(super) struct Pending {
    pub value: Operand,
    pub epoch: u64,
    pub line: u32,
    /// Number of commands in the owning frame when this was pushed
    pub at: usize,
}

#[derive(Debug, Default)]
pub(super) struct OperandBuffer {
    items: Vec<Pending>,
    epoch: u64,
}

impl OperandBuffer {
    pub fn push(&mut self, value: Operand, line: u32, at: usize) {
        self.items.push(Pending {
            value,
            epoch: self.epoch,
            line,
            at,
        });
    }

    /// Operands eligible for popping.
    pub fn available(&self) -> usize {
        self.items
            .iter()
            .rev()
            .take_while(|p| p.epoch == self.epoch)
            .count()
    }

    pub fn peek(&self) -> Option<&Operand> {
        self.items
            .last()
            .filter(|p| p.epoch == self.epoch)
            .map(|p| &p.value)
    }

    /// Pop `n` operands, returned in push order.
    pub fn pop_n(&mut self, keyword: &str, n: usize) -> Result<Vec<Operand>, ParseErrorKind> {
        self.pop_spanned(keyword, n).map(|(v, _, _)| v)
    }

    /// Like [`OperandBuffer::pop_n`], also returning the line and frame
    /// position of the first popped operand.
    pub fn pop_spanned(
        &mut self,
        keyword: &str,
        n: usize,
    ) -> Result<(Vec<Operand>, u32, usize), ParseErrorKind> {
        let found = self.available();
        if found < n {
            return Err(ParseErrorKind::Arity {
                keyword: keyword.to_owned(),
                expected: n,
                found,
            });
        }
        let split = self.items.len() - n;
        let (line, at) = self
            .items
            .get(split)
            .map(|p| (p.line, p.at))
            .unwrap_or((0, 0));
        let values = self.items.drain(split..).map(|p| p.value).collect();
        Ok((values, line, at))
    }

    /// Pop exactly `N` operands into an array, in push order.
    pub fn take<const N: usize>(
        &mut self,
        keyword: &str,
    ) -> Result<([Operand; N], u32, usize), ParseErrorKind> {
        let (values, line, at) = self.pop_spanned(keyword, N)?;
        let arr: [Operand; N] = values.try_into().map_err(|v: Vec<Operand>| ParseErrorKind::Arity {
            keyword: keyword.to_owned(),
            expected: N,
            found: v.len(),
        })?;
        Ok((arr, line, at))
    }

    pub fn pop(&mut self, keyword: &str) -> Result<Operand, ParseErrorKind> {
        let ([value], _, _) = self.take::<1>(keyword)?;
        Ok(value)
    }

    pub fn next_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Everything still buffered, regardless of epoch.
    pub fn drain_all(&mut self) -> Vec<Pending> {
        std::mem::take(&mut self.items)
    }
}

/// Fold a value-producing keyword. Returns `Ok(false)` when `word` is not one.
///
/// The folded value takes the line and frame position of its first input.
pub(super) fn fold_value(buf: &mut OperandBuffer, word: &str) -> Result<bool, ParseErrorKind> {
    let (folded, line, at) = if let Some(op) = CmpOp::from_keyword(word) {
        let ([lhs, rhs], line, at) = buf.take::<2>(word)?;
        let cond = Condition::Compare { op, lhs, rhs };
        (Operand::Cond(Box::new(cond)), line, at)
    } else {
        match word {
            "and" | "or" => {
                let ([lhs, rhs], line, at) = buf.take::<2>(word)?;
                let (lhs, rhs) = (Box::new(into_condition(lhs)), Box::new(into_condition(rhs)));
                let cond = if word == "and" {
                    Condition::And(lhs, rhs)
                } else {
                    Condition::Or(lhs, rhs)
                };
                (Operand::Cond(Box::new(cond)), line, at)
            }
            "not" => {
                let ([inner], line, at) = buf.take::<1>(word)?;
                let cond = Condition::Not(Box::new(into_condition(inner)));
                (Operand::Cond(Box::new(cond)), line, at)
            }
            "add" | "sub" | "mul" | "div" => {
                let op = match word {
                    "add" => ArithOp::Add,
                    "sub" => ArithOp::Sub,
                    "mul" => ArithOp::Mul,
                    _ => ArithOp::Div,
                };
                let ([lhs, rhs], line, at) = buf.take::<2>(word)?;
                let expr = Operand::Expr {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (expr, line, at)
            }
            "FORMAT" => {
                let ([value, picture], line, at) = buf.take::<2>(word)?;
                let picture = match picture {
                    Operand::Str { text, .. } => text,
                    other => return Err(type_error(word, "picture string", &other)),
                };
                let formatted = Operand::Formatted {
                    value: Box::new(value),
                    picture,
                };
                (formatted, line, at)
            }
            "VSUB" => match buf.take::<1>(word)? {
                ([Operand::Str { text, .. }], line, at) => (Operand::Str { text, vsub: true }, line, at),
                ([other], _, _) => return Err(type_error(word, "string", &other)),
            },
            "CACHE" => {
                let ([resource], line, at) = buf.take::<1>(word)?;
                (Operand::Cached(Box::new(resource)), line, at)
            }
            _ => return Ok(false),
        }
    };
    buf.push(folded, line, at);
    Ok(true)
}

pub(super) fn type_error(keyword: &str, expected: &str, found: &Operand) -> ParseErrorKind {
    ParseErrorKind::OperandType {
        keyword: keyword.to_owned(),
        expected: expected.to_owned(),
        found: found.describe().to_owned(),
    }
}

/// Interpret an operand as a condition. Non-condition values become truthiness
/// tests.
pub(super) fn into_condition(op: Operand) -> Condition {
    match op {
        Operand::Cond(c) => *c,
        other => Condition::Truthy(other),
    }
}
