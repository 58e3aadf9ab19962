//! Layers and the ordered layer stack.

use crate::error::{Error, Result};
use crate::surface::{BlendMode, RasterSurface};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, immutable layer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One raster layer: an exclusively owned surface plus display settings.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    pub name: String,
    pub visible: bool,
    opacity: f64,
    pub blend_mode: BlendMode,
    surface: RasterSurface,
}

impl Layer {
    fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            surface: RasterSurface::new(width, height),
        }
    }

    fn from_surface(name: impl Into<String>, surface: RasterSurface) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            surface,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Set opacity, clamped to [0, 1].
    pub fn set_opacity(&mut self, value: f64) {
        self.opacity = value.clamp(0.0, 1.0);
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut RasterSurface {
        &mut self.surface
    }

    /// Resize this layer's surface to explicit target dimensions.
    /// The stack passes these in; layers never consult any shared canvas.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }
}

/// Ordered collection of layers, bottom to top.
///
/// Invariants: the stack is never empty (the base layer is created at
/// construction and can only be merged away, not removed), and
/// `active_index` always points at a layer.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>,
    active_index: usize,
    width: u32,
    height: u32,
}

impl LayerStack {
    /// Create a stack with a single base layer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            layers: vec![Layer::new("Background", width, height)],
            active_index: 0,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the base layer is permanent
    }

    /// Layers in paint order (bottom to top).
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    /// The layer direct gestures mutate.
    pub fn active(&self) -> &Layer {
        &self.layers[self.active_index]
    }

    pub fn active_mut(&mut self) -> &mut Layer {
        &mut self.layers[self.active_index]
    }

    pub fn active_id(&self) -> LayerId {
        self.layers[self.active_index].id()
    }

    /// Append a new empty layer above all others and make it active.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let layer = Layer::new(name, self.width, self.height);
        let id = layer.id();
        self.layers.push(layer);
        self.active_index = self.layers.len() - 1;
        id
    }

    pub fn set_active(&mut self, id: LayerId) -> Result<()> {
        match self.layers.iter().position(|l| l.id() == id) {
            Some(index) => {
                self.active_index = index;
                Ok(())
            }
            None => Err(Error::NotFound(id)),
        }
    }

    pub fn set_visibility(&mut self, id: LayerId, visible: bool) -> Result<()> {
        let layer = self.layer_mut(id).ok_or(Error::NotFound(id))?;
        layer.visible = visible;
        Ok(())
    }

    /// Set a layer's opacity, clamped to [0, 1].
    pub fn set_opacity(&mut self, id: LayerId, value: f64) -> Result<()> {
        let layer = self.layer_mut(id).ok_or(Error::NotFound(id))?;
        layer.set_opacity(value);
        Ok(())
    }

    /// Composite every visible layer into one new base layer, preserving the
    /// final appearance pixel for pixel, and replace the whole stack with it.
    pub fn merge_all(&mut self) -> Result<LayerId> {
        if self.layers.len() == 1 {
            return Err(Error::NothingToMerge);
        }
        let mut merged = RasterSurface::new(self.width, self.height);
        crate::compositor::composite(self, &mut merged);
        let layer = Layer::from_surface("Background", merged);
        let id = layer.id();
        self.layers = vec![layer];
        self.active_index = 0;
        Ok(id)
    }

    /// Resize every layer surface to the new shared canvas dimensions.
    pub fn resize_all(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        for layer in &mut self.layers {
            layer.resize(width, height);
        }
    }

    /// Clear every layer's content. Settings and identities are kept.
    pub fn clear_all(&mut self) {
        for layer in &mut self.layers {
            layer.surface_mut().clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn fill_layer(&mut self, id: LayerId, color: crate::surface::Rgba) {
        if let Some(layer) = self.layer_mut(id) {
            layer.surface_mut().fill(color);
        }
    }
}
