//! Top-level engine owning the whole canvas state.
//!
//! One [`PaintEngine`] is constructed per participant and owns the layer
//! stack, history, draw session, sync engine, and the composited output.
//! Everything is explicit fields and `&mut self` methods: no globals, and
//! because all mutation funnels through the single owner, the single-threaded
//! model of the core is enforced at compile time.

use crate::compositor;
use crate::error::Result;
use crate::history::HistoryEngine;
use crate::layer::{LayerId, LayerStack};
use crate::session::{DrawSession, ToolKind};
use crate::surface::{RasterSurface, Rgba};
use crate::sync::{PeerLink, SyncEngine};
use kurbo::Point;

pub struct PaintEngine {
    stack: LayerStack,
    history: HistoryEngine,
    session: DrawSession,
    sync: SyncEngine,
    output: RasterSurface,
    /// Font used to rasterize local and remote text operations. Optional:
    /// without it text operations are logged and skipped.
    font: Option<fontdue::Font>,
}

impl PaintEngine {
    /// Create an engine with a single base layer and an initial history
    /// snapshot, so the very first stroke can be undone back to the empty
    /// canvas.
    pub fn new(width: u32, height: u32) -> Self {
        let stack = LayerStack::new(width, height);
        let mut history = HistoryEngine::new();
        history.snapshot(&stack);
        let mut output = RasterSurface::new(width, height);
        compositor::composite(&stack, &mut output);
        Self {
            stack,
            history,
            session: DrawSession::new(),
            sync: SyncEngine::new(),
            output,
            font: None,
        }
    }

    /// The composited visible image. Recomputed after every mutation.
    pub fn output(&self) -> &RasterSurface {
        &self.output
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn set_font(&mut self, font: fontdue::Font) {
        self.font = Some(font);
    }

    // --- Tool configuration ---

    pub fn set_tool(&mut self, tool: ToolKind) -> bool {
        self.session.set_tool(tool)
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.session.color = color;
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.session.line_width = width;
    }

    // --- Gesture handling ---

    /// Pointer down: start a gesture. Returns false if one is already active
    /// (that gesture continues untouched).
    pub fn pointer_down(&mut self, point: Point) -> bool {
        self.session.begin(point, self.stack.active().surface())
    }

    /// Pointer move: advance the gesture. Freehand segments are broadcast
    /// live, one operation per segment.
    pub fn pointer_move(&mut self, point: Point) {
        let layer = self.stack.active_id();
        let ops = self
            .session
            .update(point, self.stack.active_mut().surface_mut(), layer);
        self.recomposite();
        for op in &ops {
            self.sync.broadcast(op);
        }
    }

    /// Pointer up: finish the gesture, snapshot history once, and broadcast
    /// whatever the gesture emitted on completion.
    pub fn pointer_up(&mut self, point: Point) {
        if !self.session.is_active() {
            return;
        }
        let layer = self.stack.active_id();
        let ops = self.session.end(
            point,
            self.stack.active_mut().surface_mut(),
            layer,
            self.font.as_ref(),
        );
        self.recomposite();
        self.history.snapshot(&self.stack);
        for op in &ops {
            self.sync.broadcast(op);
        }
    }

    /// Abort the in-flight gesture (e.g. pointer left the canvas).
    pub fn cancel_gesture(&mut self) {
        self.session
            .cancel(self.stack.active_mut().surface_mut());
        self.recomposite();
    }

    // --- History ---

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Step back one snapshot. Local only: undo is never broadcast, and
    /// remote operations never entered history in the first place.
    pub fn undo(&mut self) -> Result<()> {
        let entry = self.history.undo()?;
        entry.restore(&mut self.stack)?;
        self.recomposite();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        let entry = self.history.redo()?;
        entry.restore(&mut self.stack)?;
        self.recomposite();
        Ok(())
    }

    // --- Layer management ---

    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let id = self.stack.add_layer(name);
        self.history.snapshot(&self.stack);
        id
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> Result<()> {
        self.stack.set_active(id)
    }

    pub fn set_layer_visibility(&mut self, id: LayerId, visible: bool) -> Result<()> {
        self.stack.set_visibility(id, visible)?;
        self.recomposite();
        Ok(())
    }

    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f64) -> Result<()> {
        self.stack.set_opacity(id, opacity)?;
        self.recomposite();
        Ok(())
    }

    pub fn merge_all(&mut self) -> Result<LayerId> {
        let id = self.stack.merge_all()?;
        self.history.snapshot(&self.stack);
        self.recomposite();
        Ok(id)
    }

    /// Resize the shared canvas. Content outside the new bounds is lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.stack.resize_all(width, height);
        self.history.snapshot(&self.stack);
        self.recomposite();
    }

    /// Clear every layer, snapshot, and tell all peers to do the same.
    pub fn clear(&mut self) {
        self.stack.clear_all();
        self.history.snapshot(&self.stack);
        self.sync.broadcast_clear();
        self.recomposite();
    }

    // --- Collaboration ---

    pub fn attach_peer(&mut self, link: Box<dyn PeerLink>) {
        self.sync.attach(link);
    }

    pub fn detach_peer(&mut self, id: &str) -> bool {
        self.sync.detach(id)
    }

    pub fn peer_count(&self) -> usize {
        self.sync.link_count()
    }

    /// Apply one inbound message from the transport. Decode failures drop
    /// the message with a warning; local state is never corrupted and local
    /// history is never touched by remote operations.
    pub fn handle_message(&mut self, raw: &str) {
        match self
            .sync
            .apply_remote(raw, &mut self.stack, self.font.as_ref())
        {
            Ok(()) => self.recomposite(),
            Err(e) => log::warn!("dropping remote message: {e}"),
        }
    }

    fn recomposite(&mut self) {
        compositor::composite(&self.stack, &mut self.output);
    }
}
