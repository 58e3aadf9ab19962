//! Rasterboard Core
//!
//! Platform-agnostic core for a shared raster canvas: layered pixel surfaces
//! with a compositor, bounded snapshot history for per-user undo/redo, and a
//! peer synchronization protocol that replays draw operations across
//! participants. Rendering backends, UI chrome, and the transport used to
//! open peer links all live outside this crate.

pub mod compositor;
pub mod engine;
pub mod error;
pub mod history;
pub mod layer;
pub mod session;
pub mod surface;
pub mod sync;

pub use engine::PaintEngine;
pub use error::{Error, Result};
pub use history::{HistoryEngine, HistoryEntry, HISTORY_CAPACITY};
pub use layer::{Layer, LayerId, LayerStack};
pub use session::{DrawOperation, DrawSession, ToolKind};
pub use surface::{BlendMode, CompositeMode, EncodedSurface, RasterSurface, Rgba, ShapeKind};
pub use sync::{PeerLink, SyncEngine, WireMessage, WireTool};
