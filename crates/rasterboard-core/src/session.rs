//! Draw gesture state machine and the operations it produces.

use crate::layer::LayerId;
use crate::surface::{CompositeMode, RasterSurface, Rgba, ShapeKind};
use kurbo::Point;

/// Available drawing tools. A closed set: each variant carries exactly the
/// parameters it needs, and the session switches on the variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolKind {
    #[default]
    Brush,
    Line,
    Rect,
    Circle,
    Text {
        content: String,
        px: f64,
    },
    Eraser,
}

impl ToolKind {
    /// Composite mode implied by the tool.
    pub fn composite_mode(&self) -> CompositeMode {
        match self {
            ToolKind::Eraser => CompositeMode::Erase,
            _ => CompositeMode::SourceOver,
        }
    }

    /// Freehand tools paint incrementally on every move; the others redraw a
    /// live preview from the gesture's start point.
    pub fn is_incremental(&self) -> bool {
        matches!(self, ToolKind::Brush | ToolKind::Eraser)
    }

    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            ToolKind::Line => Some(ShapeKind::Line),
            ToolKind::Rect => Some(ShapeKind::Rect),
            ToolKind::Circle => Some(ShapeKind::Circle),
            _ => None,
        }
    }
}

/// Immutable record of one atomic drawing action: a single move segment, a
/// completed shape, or a text placement. This is the unit replayed on peers.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOperation {
    pub layer: LayerId,
    pub tool: ToolKind,
    pub start: Point,
    pub end: Point,
    pub color: Rgba,
    pub line_width: f64,
    pub mode: CompositeMode,
}

impl DrawOperation {
    /// Replay this operation onto a surface.
    ///
    /// Text operations need a font to rasterize with; without one they are
    /// skipped (the wire cannot carry font data).
    pub fn apply(&self, surface: &mut RasterSurface, font: Option<&fontdue::Font>) {
        match &self.tool {
            ToolKind::Brush | ToolKind::Eraser => {
                surface.draw_segment(self.start, self.end, self.color, self.line_width, self.mode);
            }
            ToolKind::Line | ToolKind::Rect | ToolKind::Circle => {
                let kind = self.tool.shape_kind().unwrap_or(ShapeKind::Line);
                surface.draw_shape(kind, self.start, self.end, self.color, self.line_width);
            }
            ToolKind::Text { content, px } => match font {
                Some(font) => surface.place_text(content, self.start, font, *px, self.color),
                None => log::debug!("dropping text operation, no font configured"),
            },
        }
    }
}

/// State of the current pointer gesture.
#[derive(Debug, Clone, Default)]
enum SessionState {
    #[default]
    Idle,
    Active {
        start: Point,
        last: Point,
        /// Pre-gesture copy of the active surface, kept for preview tools so
        /// the live preview never accumulates earlier partial draws.
        before: Option<RasterSurface>,
    },
}

/// Orchestrates one continuous pointer gesture against the active layer.
///
/// Idle -> Active on begin, Active -> Idle on end or cancel. At most one
/// gesture is active at a time; a second begin while active is rejected and
/// the current gesture continues.
#[derive(Debug, Clone)]
pub struct DrawSession {
    state: SessionState,
    pub tool: ToolKind,
    pub color: Rgba,
    pub line_width: f64,
}

impl Default for DrawSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            tool: ToolKind::Brush,
            color: Rgba::black(),
            line_width: 4.0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    /// Switching tools mid-gesture would corrupt the preview copy, so the
    /// tool is only changeable while idle.
    pub fn set_tool(&mut self, tool: ToolKind) -> bool {
        if self.is_active() {
            return false;
        }
        self.tool = tool;
        true
    }

    /// Begin a gesture at `point`. Returns false (and keeps the current
    /// gesture) when one is already active.
    pub fn begin(&mut self, point: Point, active_surface: &RasterSurface) -> bool {
        if self.is_active() {
            log::debug!("ignoring gesture start while another gesture is active");
            return false;
        }
        let before = if self.tool.is_incremental() {
            None
        } else {
            Some(active_surface.clone())
        };
        self.state = SessionState::Active {
            start: point,
            last: point,
            before,
        };
        true
    }

    /// Process a pointer move. Freehand tools paint the segment immediately
    /// and emit one operation per segment; preview tools restore the
    /// pre-gesture copy and redraw start-to-current.
    pub fn update(
        &mut self,
        point: Point,
        surface: &mut RasterSurface,
        layer: LayerId,
    ) -> Vec<DrawOperation> {
        let SessionState::Active { start, last, before } = &mut self.state else {
            return Vec::new();
        };
        let mut ops = Vec::new();
        if self.tool.is_incremental() {
            let op = DrawOperation {
                layer,
                tool: self.tool.clone(),
                start: *last,
                end: point,
                color: self.color,
                line_width: self.line_width,
                mode: self.tool.composite_mode(),
            };
            op.apply(surface, None);
            ops.push(op);
        } else if let Some(kind) = self.tool.shape_kind() {
            if let Some(before) = before {
                *surface = before.clone();
            }
            surface.draw_shape(kind, *start, point, self.color, self.line_width);
        }
        *last = point;
        ops
    }

    /// End the gesture. Preview and text tools emit exactly one operation
    /// describing the whole gesture; freehand tools already emitted their
    /// segments during moves. A zero-length shape click still emits.
    pub fn end(
        &mut self,
        point: Point,
        surface: &mut RasterSurface,
        layer: LayerId,
        font: Option<&fontdue::Font>,
    ) -> Vec<DrawOperation> {
        let state = std::mem::take(&mut self.state);
        let SessionState::Active { start, before, .. } = state else {
            return Vec::new();
        };
        match &self.tool {
            ToolKind::Brush | ToolKind::Eraser => Vec::new(),
            ToolKind::Line | ToolKind::Rect | ToolKind::Circle => {
                if let Some(before) = before {
                    *surface = before;
                }
                let op = DrawOperation {
                    layer,
                    tool: self.tool.clone(),
                    start,
                    end: point,
                    color: self.color,
                    line_width: self.line_width,
                    mode: CompositeMode::SourceOver,
                };
                op.apply(surface, None);
                vec![op]
            }
            ToolKind::Text { .. } => {
                let op = DrawOperation {
                    layer,
                    tool: self.tool.clone(),
                    start,
                    end: point,
                    color: self.color,
                    line_width: self.line_width,
                    mode: CompositeMode::SourceOver,
                };
                op.apply(surface, font);
                vec![op]
            }
        }
    }

    /// Abort the gesture, restoring the pre-gesture content for preview
    /// tools. Nothing is emitted.
    pub fn cancel(&mut self, surface: &mut RasterSurface) {
        if let SessionState::Active { before: Some(before), .. } = std::mem::take(&mut self.state) {
            *surface = before;
        }
    }
}
