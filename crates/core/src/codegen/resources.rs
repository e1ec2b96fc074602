//! `SCALL` and `ICALL`: external segments, image objects and inlined
//! subroutines.

use super::{num, quote, Generator};
use crate::ast::{Command, Operand};
use crate::error::GenerationInvariantError;
use crate::report::ResourceKind;
use crate::resolve::ResolvedSymbols;
use crate::state::Placement;
use crate::symbols::{SubroutineEntry, SymbolTable};

/// What an `SCALL` resource name refers to.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    /// Raster image placed through the object DLL
    Object { name: String, other_type: &'static str },
    /// Encapsulated PostScript, converted to a segment of the same name
    Eps(String),
    Segment(String),
}

fn classify(file: &str) -> Target {
    let (stem, ext) = match file.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, e.to_ascii_lowercase()),
        _ => (file, String::new()),
    };
    match ext.as_str() {
        "jpg" | "jpeg" => Target::Object {
            name: stem.to_owned(),
            other_type: "JPG",
        },
        "tif" | "tiff" => Target::Object {
            name: stem.to_owned(),
            other_type: "TIF",
        },
        "eps" => Target::Eps(stem.to_owned()),
        _ => Target::Segment(stem.to_owned()),
    }
}

fn resource_name(op: &Operand) -> Option<&str> {
    match op {
        Operand::Cached(inner) => resource_name(inner),
        other => other.as_text(),
    }
}

impl<'a> Generator<'a> {
    pub(super) fn segment_call(
        &mut self,
        line: u32,
        resource: &Operand,
        args: &[Operand],
    ) -> Result<(), GenerationInvariantError> {
        let Some(file) = resource_name(resource) else {
            return Err(self.invariant(
                line,
                format!("SCALL resource is a {}", resource.describe()),
            ));
        };
        if let Some(sub) = self.subroutine(file) {
            if sub.command_count <= self.config.inline_threshold
                && !self.inlining.iter().any(|n| n == file)
            {
                return self.inline(line, file, &sub.body);
            }
        }
        match classify(file) {
            Target::Object { name, other_type } => {
                self.report
                    .resource(&name, ResourceKind::Object, self.file, line);
                self.out.line("CREATEOBJECT IOBDLL(IOBDEFS)");
                self.out.indent();
                self.out.line("POSITION (SAME) (SAME)");
                self.out.line("PARAMETERS");
                self.out.indent();
                self.out.line(format!("('FILENAME'={})", quote(&name)));
                self.out.line("('OBJECTTYPE'='1')");
                self.out.line(format!("('OTHERTYPES'='{}')", other_type));
                let size: Vec<f64> = match args.first() {
                    Some(Operand::Array(dims)) => dims.iter().filter_map(Operand::as_number).collect(),
                    _ => Vec::new(),
                };
                if let [w, h] = size[..] {
                    self.out.line(format!("('XOBJECTAREASIZE'='{}')", num(w)));
                    self.out.line(format!("('YOBJECTAREASIZE'='{}')", num(h)));
                }
                self.out.line("('OBJECTMAPPING'='2');");
                self.out.dedent();
                self.out.dedent();
            }
            Target::Eps(name) => {
                self.report
                    .resource(&name, ResourceKind::Segment, self.file, line);
                let x = self.segment_x();
                self.out.line(format!("SEGMENT {}", name));
                self.out.indent();
                self.out
                    .line(format!("POSITION {} (0 MM-$MR_TOP+&CORSEGMENT);", x));
                self.out.dedent();
            }
            Target::Segment(name) => {
                self.report
                    .resource(&name, ResourceKind::Segment, self.file, line);
                let x = self.segment_x();
                let y = match &self.state.pos.next_y {
                    Placement::At(v) => format!("({} MM-$MR_TOP+&CORSEGMENT)", num(*v)),
                    Placement::Expr(e) => format!("(MM({})-$MR_TOP+&CORSEGMENT)", e),
                    _ => "(SAME)".to_owned(),
                };
                self.out.line(format!("SEGMENT {}", name));
                self.out.indent();
                self.out.line(format!("POSITION {} {};", x, y));
                self.out.dedent();
            }
        }
        self.state.placed();
        Ok(())
    }

    /// Subroutine defined by this document, or by any other document of
    /// the translation.
    fn subroutine(&self, name: &str) -> Option<&'a SubroutineEntry> {
        let table: &'a SymbolTable = self.table;
        let symbols: &'a ResolvedSymbols = self.symbols;
        table
            .subroutines
            .get(name)
            .or_else(|| symbols.tables.iter().find_map(|t| t.subroutines.get(name)))
    }

    fn segment_x(&self) -> String {
        match &self.state.pos.next_x {
            Placement::At(v) => format!("({} MM-$MR_LEFT)", num(*v)),
            Placement::Expr(e) => format!("(MM({})-$MR_LEFT)", e),
            _ => "(SAME)".to_owned(),
        }
    }

    /// Expand a short subroutine in place, against a local origin.
    fn inline(
        &mut self,
        line: u32,
        name: &str,
        body: &[Command],
    ) -> Result<(), GenerationInvariantError> {
        tracing::debug!(file = self.file, line, subroutine = name, "inlining subroutine");
        self.out.comment(format!("Inlined subroutine: {}", name));
        self.inlining.push(name.to_owned());
        self.state.enter_local();
        let result = self.commands(body);
        let restored = self.state.leave_local();
        self.inlining.pop();
        result?;
        if !restored {
            return Err(self.invariant(line, format!("state stack empty after inlining {}", name)));
        }
        Ok(())
    }

    pub(super) fn image_call(
        &mut self,
        line: u32,
        resource: &Operand,
        scale: Option<f64>,
    ) -> Result<(), GenerationInvariantError> {
        let Some(file) = resource_name(resource) else {
            return Err(self.invariant(
                line,
                format!("ICALL resource is a {}", resource.describe()),
            ));
        };
        self.report
            .resource(file, ResourceKind::Image, self.file, line);
        let x = self.segment_x();
        let y = match &self.state.pos.next_y {
            Placement::At(v) => format!("({} MM-$MR_TOP)", num(*v)),
            Placement::Expr(e) => format!("(MM({})-$MR_TOP)", e),
            _ => "(SAME)".to_owned(),
        };
        self.out.line(format!("IMAGE {}", quote(file)));
        self.out.indent();
        self.out.line(format!("POSITION {} {}", x, y));
        self.out
            .line(format!("SCALE {};", num(scale.unwrap_or(1.0))));
        self.out.dedent();
        self.state.placed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{render, render_with_report};
    use super::*;

    #[test]
    fn classification_by_extension() {
        assert_eq!(
            classify("logo.JPG"),
            Target::Object {
                name: "logo".into(),
                other_type: "JPG"
            }
        );
        assert_eq!(classify("sig.eps"), Target::Eps("sig".into()));
        assert_eq!(classify("TXNB"), Target::Segment("TXNB".into()));
    }

    #[test]
    fn cached_image_with_dimensions_becomes_object() {
        let (out, report) = render_with_report("(logo.jpg) CACHE [185 44] SCALL");
        assert!(out.contains("CREATEOBJECT IOBDLL(IOBDEFS)"), "{}", out);
        assert!(out.contains("('FILENAME'='logo')"), "{}", out);
        assert!(out.contains("('XOBJECTAREASIZE'='185')"), "{}", out);
        assert!(out.contains("('YOBJECTAREASIZE'='44')"), "{}", out);
        assert_eq!(report.resources[0].kind, ResourceKind::Object);
    }

    #[test]
    fn segment_position_carries_correction() {
        let out = render("20 30 MOVETO (TXNB) SCALL");
        assert!(out.contains("SEGMENT TXNB"), "{}", out);
        assert!(
            out.contains("POSITION (20 MM-$MR_LEFT) (30 MM-$MR_TOP+&CORSEGMENT);"),
            "{}",
            out
        );
    }

    #[test]
    fn eps_segment_sits_at_top() {
        let out = render("(sig.eps) SCALL");
        assert!(out.contains("POSITION (SAME) (0 MM-$MR_TOP+&CORSEGMENT);"), "{}", out);
    }

    #[test]
    fn short_subroutine_is_inlined_and_state_restored() {
        let out = render(
            "/SUB1 { 0 -2 80 0.2 LMED DRAWB } XGFRESDEF 10 50 MOVETO (SUB1) SCALL (after) SH",
        );
        assert!(out.contains("/* Inlined subroutine: SUB1 */"), "{}", out);
        assert!(out.contains("(POSY+2 MM)"), "{}", out);
        assert!(!out.contains("SEGMENT SUB1"), "{}", out);
        assert!(out.contains("POSITION (10 MM-$MR_LEFT) (50 MM-$MR_TOP"), "{}", out);
    }

    #[test]
    fn long_subroutine_stays_a_segment() {
        let out = render("/SUB2 { NL NL NL NL NL NL } XGFRESDEF (SUB2) SCALL");
        assert!(out.contains("SEGMENT SUB2"), "{}", out);
    }

    #[test]
    fn self_calling_subroutine_is_not_inlined_twice() {
        let out = render("/LOOP { (LOOP) SCALL } XGFRESDEF (LOOP) SCALL");
        assert_eq!(out.matches("Inlined subroutine: LOOP").count(), 1, "{}", out);
        assert!(out.contains("SEGMENT LOOP"), "{}", out);
    }

    #[test]
    fn image_call_uses_scale() {
        let out = render("5 6 MOVETO (photo.tif) 0.5 ICALL");
        assert!(out.contains("IMAGE 'photo.tif'"), "{}", out);
        assert!(out.contains("POSITION (5 MM-$MR_LEFT) (6 MM-$MR_TOP)"), "{}", out);
        assert!(out.contains("SCALE 0.5;"), "{}", out);
    }
}
