//! Peer synchronization: wire messages, the connection abstraction, and the
//! engine that broadcasts local operations and replays remote ones.
//!
//! Delivery guarantees are deliberately weak: per-link FIFO only, at-most-once
//! per link, no retry. Peers drawing concurrently over the same region may
//! see non-commutative operations in different orders and end up with
//! different pixels. That non-convergence is documented behavior, not a bug
//! this module tries to hide; a sequencing layer would be a future extension.

use crate::error::{Error, Result};
use crate::layer::{LayerId, LayerStack};
use crate::session::{DrawOperation, ToolKind};
use crate::surface::Rgba;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Tool identifier as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireTool {
    Brush,
    Line,
    Rect,
    Circle,
    Text,
    Eraser,
}

/// Messages exchanged between peers. The JSON field layout is the
/// interoperability contract and must not change shape:
///
/// ```json
/// { "type": "drawing", "layerId": "...", "startX": 1.0, "startY": 2.0,
///   "endX": 3.0, "endY": 4.0, "color": "#rrggbb", "lineWidth": 4.0,
///   "tool": "brush" }
/// { "type": "clear" }
/// ```
///
/// Text operations additionally carry `text` and `fontPx`; both fields are
/// omitted entirely for every other tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    #[serde(rename_all = "camelCase")]
    Drawing {
        layer_id: LayerId,
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
        color: Rgba,
        line_width: f64,
        tool: WireTool,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        font_px: Option<f64>,
    },
    Clear,
}

impl WireMessage {
    pub fn from_op(op: &DrawOperation) -> Self {
        let (tool, text, font_px) = match &op.tool {
            ToolKind::Brush => (WireTool::Brush, None, None),
            ToolKind::Line => (WireTool::Line, None, None),
            ToolKind::Rect => (WireTool::Rect, None, None),
            ToolKind::Circle => (WireTool::Circle, None, None),
            ToolKind::Text { content, px } => (WireTool::Text, Some(content.clone()), Some(*px)),
            ToolKind::Eraser => (WireTool::Eraser, None, None),
        };
        WireMessage::Drawing {
            layer_id: op.layer,
            start_x: op.start.x,
            start_y: op.start.y,
            end_x: op.end.x,
            end_y: op.end.y,
            color: op.color,
            line_width: op.line_width,
            tool,
            text,
            font_px,
        }
    }

    /// Rebuild a [`DrawOperation`] from a drawing message. Returns `None` for
    /// `Clear`.
    pub fn to_op(&self) -> Option<DrawOperation> {
        let WireMessage::Drawing {
            layer_id,
            start_x,
            start_y,
            end_x,
            end_y,
            color,
            line_width,
            tool,
            text,
            font_px,
        } = self
        else {
            return None;
        };
        let tool = match tool {
            WireTool::Brush => ToolKind::Brush,
            WireTool::Line => ToolKind::Line,
            WireTool::Rect => ToolKind::Rect,
            WireTool::Circle => ToolKind::Circle,
            WireTool::Eraser => ToolKind::Eraser,
            WireTool::Text => ToolKind::Text {
                content: text.clone().unwrap_or_default(),
                px: font_px.unwrap_or(16.0),
            },
        };
        let mode = tool.composite_mode();
        Some(DrawOperation {
            layer: *layer_id,
            tool,
            start: Point::new(*start_x, *start_y),
            end: Point::new(*end_x, *end_y),
            color: *color,
            line_width: *line_width,
            mode,
        })
    }

    pub fn encode(&self) -> String {
        // WireMessage serialization cannot fail: no non-string map keys, no
        // non-finite floats originate here.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::DecodeFailure(e.to_string()))
    }
}

/// An open bidirectional channel to one remote participant.
///
/// The transport (session discovery, sockets, reconnects) lives outside the
/// core; implementations only need to expose open state and a send that
/// reports failure. Inbound messages are delivered to the engine by the
/// transport as raw strings.
pub trait PeerLink {
    fn id(&self) -> &str;
    fn is_open(&self) -> bool;
    fn send(&mut self, message: &str) -> std::result::Result<(), String>;
}

/// Broadcasts completed local operations and replays remote ones.
pub struct SyncEngine {
    links: Vec<Box<dyn PeerLink>>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Number of currently attached links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// True when at least one open peer link exists.
    pub fn is_active(&self) -> bool {
        self.links.iter().any(|l| l.is_open())
    }

    pub fn attach(&mut self, link: Box<dyn PeerLink>) {
        log::debug!("peer link attached: {}", link.id());
        self.links.push(link);
    }

    /// Remove a link. No in-flight rollback: operations are fire-and-forget.
    pub fn detach(&mut self, id: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.id() != id);
        before != self.links.len()
    }

    /// Send one operation to every open link. A failure on one link is
    /// logged and never blocks the rest; there is no retry.
    pub fn broadcast(&mut self, op: &DrawOperation) {
        self.send_all(&WireMessage::from_op(op).encode());
    }

    /// Broadcast the privileged clear message to every open link.
    pub fn broadcast_clear(&mut self) {
        self.send_all(&WireMessage::Clear.encode());
    }

    fn send_all(&mut self, payload: &str) {
        for link in &mut self.links {
            if !link.is_open() {
                continue;
            }
            if let Err(reason) = link.send(payload) {
                let err = Error::LinkSendFailure {
                    peer: link.id().to_string(),
                    reason,
                };
                log::warn!("{err}");
            }
        }
    }

    /// Decode and apply one remote message to the stack.
    ///
    /// A drawing that names a layer id absent locally falls back to the local
    /// active layer; misdirected but deterministic, see DESIGN.md. Decode
    /// failures drop the single message and never touch local state. Remote
    /// operations never enter local history; the caller only recomposites.
    pub fn apply_remote(
        &mut self,
        raw: &str,
        stack: &mut LayerStack,
        font: Option<&fontdue::Font>,
    ) -> Result<()> {
        let msg = WireMessage::decode(raw)?;
        match msg {
            WireMessage::Clear => {
                log::debug!("remote clear received");
                stack.clear_all();
            }
            WireMessage::Drawing { .. } => {
                // to_op cannot fail for a Drawing message.
                let Some(op) = msg.to_op() else { return Ok(()) };
                let target = if stack.layer(op.layer).is_some() {
                    op.layer
                } else {
                    let active = stack.active_id();
                    log::warn!("remote op for unknown layer {}, applying to active {active}", op.layer);
                    active
                };
                if let Some(layer) = stack.layer_mut(target) {
                    op.apply(layer.surface_mut(), font);
                }
            }
        }
        Ok(())
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}
