//! Reduces a layer stack to one visible surface.

use crate::layer::LayerStack;
use crate::surface::RasterSurface;

/// Composite every visible layer of `stack` into `target`, bottom to top.
///
/// The target is cleared first and resized if its dimensions no longer match
/// the stack. Each layer is drawn with its own opacity and blend mode; both
/// are parameters of the individual blit, so no compositing state carries
/// over from one layer to the next.
pub fn composite(stack: &LayerStack, target: &mut RasterSurface) {
    if target.width() != stack.width() || target.height() != stack.height() {
        target.resize(stack.width(), stack.height());
    }
    target.clear();
    for layer in stack.iter() {
        if !layer.visible {
            continue;
        }
        target.blit(layer.surface(), layer.opacity(), layer.blend_mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Rgba;

    #[test]
    fn test_hidden_layers_are_skipped() {
        let mut stack = LayerStack::new(4, 4);
        let base = stack.active_id();
        let top = stack.add_layer("Top");
        stack.fill_layer(base, Rgba::new(255, 0, 0, 255));
        stack.fill_layer(top, Rgba::new(0, 255, 0, 255));
        stack.set_visibility(top, false).unwrap();

        let mut out = RasterSurface::new(4, 4);
        composite(&stack, &mut out);
        assert_eq!(out.pixel(0, 0), Some(Rgba::new(255, 0, 0, 255)));
    }

    #[test]
    fn test_opacity_does_not_leak_between_layers() {
        let mut stack = LayerStack::new(4, 4);
        let base = stack.active_id();
        let mid = stack.add_layer("Mid");
        let top = stack.add_layer("Top");
        stack.fill_layer(base, Rgba::white());
        stack.fill_layer(mid, Rgba::new(0, 0, 255, 255));
        stack.fill_layer(top, Rgba::new(255, 0, 0, 255));
        stack.set_opacity(mid, 0.25).unwrap();

        let mut out = RasterSurface::new(4, 4);
        composite(&stack, &mut out);
        // The fully opaque top layer must not inherit the 25% opacity.
        assert_eq!(out.pixel(2, 2), Some(Rgba::new(255, 0, 0, 255)));
    }

    #[test]
    fn test_merge_all_matches_composite() {
        let mut stack = LayerStack::new(16, 16);
        let base = stack.active_id();
        let top = stack.add_layer("Wash");
        stack.fill_layer(base, Rgba::new(255, 0, 0, 255));
        stack.fill_layer(top, Rgba::new(0, 0, 255, 255));
        stack.set_opacity(top, 0.5).unwrap();

        let mut before = RasterSurface::new(16, 16);
        composite(&stack, &mut before);

        stack.merge_all().unwrap();
        assert_eq!(stack.len(), 1);

        let mut after = RasterSurface::new(16, 16);
        composite(&stack, &mut after);
        assert_eq!(after, before);
    }

    #[test]
    fn test_target_is_resized_to_stack() {
        let stack = LayerStack::new(8, 6);
        let mut out = RasterSurface::new(1, 1);
        composite(&stack, &mut out);
        assert_eq!((out.width(), out.height()), (8, 6));
    }
}
