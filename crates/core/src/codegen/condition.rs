//! Value expressions and conditions.

use super::{num, quote, text, Generator};
use crate::ast::{parse_number, CmpOp, Condition, Operand};

/// Free space left in the frame; compared against millimetres.
const FRAME_LEFT: &str = "FRLEFT";

impl<'a> Generator<'a> {
    /// Render an operand as a DocDEF expression. Variables and fields are
    /// never quoted.
    pub(super) fn value(&self, op: &Operand) -> String {
        match op {
            Operand::Number(n) => parse_number(n).map(num).unwrap_or_else(|| n.clone()),
            Operand::Str { text, vsub: true } => text::vsub_expression(text),
            Operand::Str { text, .. } => quote(text),
            Operand::Name(n) => n.clone(),
            Operand::Ident(n) => match n.as_str() {
                "true" => "1".to_owned(),
                "false" => "0".to_owned(),
                _ => n.clone(),
            },
            Operand::Array(items) => {
                if items.is_empty() {
                    return "''".to_owned();
                }
                items
                    .iter()
                    .map(|i| self.value(i))
                    .collect::<Vec<_>>()
                    .join(" ! ")
            }
            Operand::Proc(_) => "''".to_owned(),
            Operand::Cond(c) => self.condition(c),
            Operand::Expr { op, lhs, rhs } => {
                format!("({}{}{})", self.value(lhs), op.symbol(), self.value(rhs))
            }
            Operand::Formatted { value, picture } => format!(
                "NUMPICTURE({},{})",
                self.value(value),
                quote(&text::numpicture(picture))
            ),
            Operand::Cached(inner) => self.value(inner),
        }
    }

    pub(super) fn condition(&self, cond: &Condition) -> String {
        match cond {
            Condition::Compare { op, lhs, rhs } => self.comparison(*op, lhs, rhs),
            Condition::And(a, b) => format!("({} AND {})", self.condition(a), self.condition(b)),
            Condition::Or(a, b) => format!("({} OR {})", self.condition(a), self.condition(b)),
            Condition::Not(c) => format!("NOT({})", self.condition(c)),
            Condition::Truthy(op) => self.value(op),
        }
    }

    fn comparison(&self, op: CmpOp, lhs: &Operand, rhs: &Operand) -> String {
        if let (Operand::Ident(word), Some(mm)) = (lhs, rhs.as_number()) {
            if word == FRAME_LEFT {
                return frame_left(op, mm);
            }
        }
        let textual = matches!(op, CmpOp::Eq | CmpOp::Ne);
        let side = |this: &Operand, other: &Operand| {
            let v = self.value(this);
            let is_ref = matches!(this, Operand::Ident(_) | Operand::Name(_));
            if textual && is_ref && matches!(other, Operand::Str { .. }) {
                format!("NOSPACE({})", v)
            } else {
                v
            }
        };
        format!("{}{}{}", side(lhs, rhs), op.symbol(), side(rhs, lhs))
    }
}

/// `FRLEFT n lt` reads "less than n mm left in the frame", i.e. the
/// lowest printed line is already below `height - n`.
fn frame_left(op: CmpOp, mm: f64) -> String {
    let rel = match op {
        CmpOp::Lt => ">",
        CmpOp::Gt => "<",
        CmpOp::Le => ">=",
        CmpOp::Ge => "<=",
        CmpOp::Eq => "==",
        CmpOp::Ne => "<>",
    };
    format!("$SL_MAXY{}$LP_HEIGHT-MM({})", rel, num(mm))
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::with_generator;
    use crate::ast::{ArithOp, CmpOp, Condition, Operand};

    fn ident(s: &str) -> Operand {
        Operand::Ident(s.into())
    }

    #[test]
    fn compare_wraps_reference_in_nospace_against_strings() {
        with_generator(|g| {
            let c = Condition::Compare {
                op: CmpOp::Eq,
                lhs: ident("PREFIX"),
                rhs: Operand::str("A1"),
            };
            assert_eq!(g.condition(&c), "NOSPACE(PREFIX)=='A1'");
            let c = Condition::Compare {
                op: CmpOp::Gt,
                lhs: ident("VAR_N"),
                rhs: Operand::Number("3".into()),
            };
            assert_eq!(g.condition(&c), "VAR_N>3");
        });
    }

    #[test]
    fn frame_left_maps_to_page_height_test() {
        with_generator(|g| {
            let c = Condition::Compare {
                op: CmpOp::Lt,
                lhs: ident("FRLEFT"),
                rhs: Operand::Number("60".into()),
            };
            assert_eq!(g.condition(&c), "$SL_MAXY>$LP_HEIGHT-MM(60)");
            let c = Condition::Compare {
                op: CmpOp::Ge,
                lhs: ident("FRLEFT"),
                rhs: Operand::Number("20".into()),
            };
            assert_eq!(g.condition(&c), "$SL_MAXY<=$LP_HEIGHT-MM(20)");
        });
    }

    #[test]
    fn logical_operators_nest() {
        with_generator(|g| {
            let a = Condition::Truthy(ident("true"));
            let b = Condition::Not(Box::new(Condition::Truthy(ident("VARINI"))));
            let c = Condition::Or(Box::new(a), Box::new(b));
            assert_eq!(g.condition(&c), "(1 OR NOT(VARINI))");
        });
    }

    #[test]
    fn values_render_by_kind() {
        with_generator(|g| {
            assert_eq!(g.value(&Operand::Name("VAR_X".into())), "VAR_X");
            assert_eq!(g.value(&Operand::str("O'Neil")), "'O''Neil'");
            assert_eq!(g.value(&Operand::Number("0x0A".into())), "10");
            let e = Operand::Expr {
                op: ArithOp::Add,
                lhs: Box::new(ident("VAR_T")),
                rhs: Box::new(Operand::Number("1".into())),
            };
            assert_eq!(g.value(&e), "(VAR_T+1)");
            let f = Operand::Formatted {
                value: Box::new(ident("VAR_AMT")),
                picture: "@@@,@@#.##".into(),
            };
            assert_eq!(g.value(&f), "NUMPICTURE(VAR_AMT,'#,##0.00')");
        });
    }
}
