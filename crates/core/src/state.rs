//! Position and style state threaded through code generation.
//!
//! One [`State`] is owned by each generator run and handed to every
//! statement handler by `&mut`. Segment and subroutine bodies run against
//! a local origin; the caller's state is saved on entry and restored
//! verbatim on exit.

use crate::ast::Orientation;

/// How the current position was last established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Set by `MOVETO`
    Absolute,
    /// Accumulated from line advances since the last absolute set
    Flow,
    /// Local origin of a segment or inlined subroutine body
    Reset,
}

/// Where the next emitted statement goes on one axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Explicit coordinate in millimetres
    At(f64),
    /// Coordinate held in a variable or computed at run time
    Expr(String),
    Same,
    /// Next line at the active line spacing
    Next,
    /// Signed offset from the current line
    Offset(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub mode: Mode,
    pub x: f64,
    pub y: f64,
    /// Vertical distance travelled since the last absolute set
    pub flow_y: f64,
    pub next_x: Placement,
    pub next_y: Placement,
}

impl Position {
    fn local() -> Self {
        Position {
            mode: Mode::Reset,
            x: 0.0,
            y: 0.0,
            flow_y: 0.0,
            next_x: Placement::Same,
            next_y: Placement::Same,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub font: Option<String>,
    pub color: Option<String>,
    pub line_spacing: Option<f64>,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub pos: Position,
    pub style: Style,
    /// Drawing anchors were emitted for the current run of primitives
    anchored: bool,
    saved: Vec<(Position, Style, bool)>,
}

impl Default for State {
    fn default() -> Self {
        State {
            pos: Position {
                mode: Mode::Absolute,
                x: 0.0,
                y: 0.0,
                flow_y: 0.0,
                next_x: Placement::Same,
                next_y: Placement::Same,
            },
            style: Style {
                font: None,
                color: None,
                line_spacing: None,
                orientation: Orientation::Portrait,
            },
            anchored: false,
            saved: Vec::new(),
        }
    }
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.pos = Position {
            mode: Mode::Absolute,
            x,
            y,
            flow_y: 0.0,
            next_x: Placement::At(x),
            next_y: Placement::At(y),
        };
    }

    /// Absolute move where either coordinate may be a run-time value.
    pub fn move_to_placement(&mut self, x: Placement, y: Placement) {
        if let Placement::At(v) = x {
            self.pos.x = v;
        }
        if let Placement::At(v) = y {
            self.pos.y = v;
        }
        self.pos.mode = Mode::Absolute;
        self.pos.flow_y = 0.0;
        self.pos.next_x = x;
        self.pos.next_y = y;
    }

    /// Horizontal move; a pending explicit y is kept.
    pub fn move_h(&mut self, x: f64) {
        self.pos.x = x;
        self.pos.next_x = Placement::At(x);
        if !matches!(self.pos.next_y, Placement::At(_) | Placement::Expr(_)) {
            self.pos.next_y = Placement::Same;
        }
    }

    /// Advance one line and return the vertical placement of the advance.
    /// An explicit amount is a signed offset from the current line and
    /// never a multiple of the line spacing.
    pub fn new_line(&mut self, amount: Option<f64>) -> Placement {
        let (delta, placement) = match amount {
            Some(n) => (n, Placement::Offset(n)),
            None => (self.style.line_spacing.unwrap_or(0.0), Placement::Next),
        };
        self.pos.y += delta;
        self.pos.flow_y += delta;
        if self.pos.mode != Mode::Reset {
            self.pos.mode = Mode::Flow;
        }
        self.pos.next_x = Placement::Same;
        self.pos.next_y = Placement::Same;
        placement
    }

    /// The statement at the pending placement was emitted; further output
    /// continues from there.
    pub fn placed(&mut self) {
        self.pos.next_x = Placement::Same;
        self.pos.next_y = Placement::Same;
    }

    pub fn set_font(&mut self, alias: &str) {
        self.style.font = Some(alias.to_owned());
    }

    pub fn set_color(&mut self, alias: &str) {
        self.style.color = Some(alias.to_owned());
    }

    pub fn set_line_spacing(&mut self, spacing: f64) {
        self.style.line_spacing = Some(spacing);
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.style.orientation = orientation;
    }

    /// Save the caller's state and continue from a local origin.
    pub fn enter_local(&mut self) {
        self.saved
            .push((self.pos.clone(), self.style.clone(), self.anchored));
        self.pos = Position::local();
        self.anchored = false;
    }

    /// Restore the state saved by the matching [`State::enter_local`].
    /// Returns false when nothing was saved.
    pub fn leave_local(&mut self) -> bool {
        match self.saved.pop() {
            Some((pos, style, anchored)) => {
                self.pos = pos;
                self.style = style;
                self.anchored = anchored;
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Returns true the first time it is called in a run of drawing
    /// primitives.
    pub fn anchor(&mut self) -> bool {
        !std::mem::replace(&mut self.anchored, true)
    }

    /// Any non-drawing statement ends the current drawing run.
    pub fn end_drawing_run(&mut self) {
        self.anchored = false;
    }

    /// Vertical drawing offsets grow upward in local coordinates and when
    /// the page origin is not top-left; the target grows downward.
    pub fn inverts_y(&self) -> bool {
        self.pos.mode == Mode::Reset || self.style.orientation != Orientation::TopLeft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_new_line_is_a_direct_offset() {
        let mut s = State::new();
        s.set_line_spacing(4.2);
        s.move_to(20.0, 100.0);
        let placement = s.new_line(Some(-6.0));
        assert_eq!(placement, Placement::Offset(-6.0));
        assert_eq!(s.pos.y, 94.0, "offset must not scale with line spacing");
        assert_eq!(s.pos.mode, Mode::Flow);
    }

    #[test]
    fn plain_new_line_uses_line_spacing() {
        let mut s = State::new();
        s.set_line_spacing(5.0);
        s.move_to(0.0, 10.0);
        assert_eq!(s.new_line(None), Placement::Next);
        assert_eq!(s.new_line(None), Placement::Next);
        assert_eq!(s.pos.y, 20.0);
        assert_eq!(s.pos.flow_y, 10.0);
    }

    #[test]
    fn local_scope_restores_caller_state_verbatim() {
        let mut s = State::new();
        s.move_to(15.0, 40.0);
        s.set_font("FA");
        s.set_color("R");
        let before = s.clone();

        s.enter_local();
        assert_eq!(s.pos.mode, Mode::Reset);
        s.move_to(1.0, 2.0);
        s.set_font("FB");
        s.new_line(Some(3.0));
        assert!(s.leave_local());

        assert_eq!(s, before);
        assert!(!s.leave_local(), "stack already empty");
    }

    #[test]
    fn move_h_keeps_pending_absolute_y() {
        let mut s = State::new();
        s.move_to(10.0, 50.0);
        s.move_h(30.0);
        assert_eq!(s.pos.next_x, Placement::At(30.0));
        assert_eq!(s.pos.next_y, Placement::At(50.0));
        s.placed();
        s.move_h(40.0);
        assert_eq!(s.pos.next_y, Placement::Same);
    }

    #[test]
    fn anchor_fires_once_per_run() {
        let mut s = State::new();
        assert!(s.anchor());
        assert!(!s.anchor());
        s.end_drawing_run();
        assert!(s.anchor());
    }

    #[test]
    fn inversion_depends_on_origin() {
        let mut s = State::new();
        s.set_orientation(Orientation::TopLeft);
        assert!(!s.inverts_y());
        s.enter_local();
        assert!(s.inverts_y());
    }
}
