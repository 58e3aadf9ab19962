//! Raster pixel surface and its drawing primitives.
//!
//! A [`RasterSurface`] is a plain RGBA8 buffer with straight (non-premultiplied)
//! alpha. Primitives rasterize with hard edges from exact coverage tests, so
//! one primitive touches each covered pixel exactly once — overlapping dabs
//! within a stroke never double-blend.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use kurbo::Point;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// RGBA8 color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb`, or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?.trim();
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
                Some(Self::new(r, g, b, 255))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::new(r, g, b, 255))
            }
            8 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                let a = u8::from_str_radix(&hex[6..8], 16).ok()?;
                Some(Self::new(r, g, b, a))
            }
            _ => None,
        }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

// On the wire colors travel as hex strings, matching what a color picker hands
// out on the original client.
impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgba::from_hex(&s).ok_or_else(|| D::Error::custom(format!("invalid color {s:?}")))
    }
}

/// How a primitive combines with existing pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompositeMode {
    /// Normal painting: source over destination.
    #[default]
    SourceOver,
    /// Subtract alpha instead of painting, so lower layers show through.
    /// The eraser uses this rather than painting white.
    Erase,
}

/// Per-layer blend mode applied during compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
}

/// Outline shapes drawable from two anchor points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    /// Axis-aligned outline between opposite corners.
    Rect,
    /// Outline centered on the first point, radius to the second.
    Circle,
}

/// An encoded surface: dimensions plus base64 raw RGBA bytes.
///
/// The only contract is the round trip: `decode(encode(s))` reproduces `s`
/// pixel-identically. Export/import collaborators treat this as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSurface {
    pub width: u32,
    pub height: u32,
    pub data: String,
}

/// An addressable 2D pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl RasterSurface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::transparent(); (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// Replace every pixel with `color`.
    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }

    /// Reset to fully transparent.
    pub fn clear(&mut self) {
        self.fill(Rgba::transparent());
    }

    /// Reallocate to `new_w` x `new_h`, preserving the overlap anchored at
    /// the origin. Content outside the new bounds is lost, and growing back
    /// afterwards does not resurrect it.
    pub fn resize(&mut self, new_w: u32, new_h: u32) {
        if new_w == self.width && new_h == self.height {
            return;
        }
        let mut next = vec![Rgba::transparent(); (new_w as usize) * (new_h as usize)];
        let copy_w = self.width.min(new_w);
        let copy_h = self.height.min(new_h);
        for y in 0..copy_h {
            for x in 0..copy_w {
                next[(y * new_w + x) as usize] = self.pixels[(y * self.width + x) as usize];
            }
        }
        self.width = new_w;
        self.height = new_h;
        self.pixels = next;
    }

    /// Paint a round-capped stroke from `p0` to `p1`.
    pub fn draw_segment(&mut self, p0: Point, p1: Point, color: Rgba, width: f64, mode: CompositeMode) {
        let r = (width / 2.0).max(0.5);
        let min_x = (p0.x.min(p1.x) - r).floor().max(0.0) as u32;
        let min_y = (p0.y.min(p1.y) - r).floor().max(0.0) as u32;
        let max_x = ((p0.x.max(p1.x) + r).ceil() as i64).clamp(0, self.width as i64) as u32;
        let max_y = ((p0.y.max(p1.y) + r).ceil() as i64).clamp(0, self.height as i64) as u32;
        for y in min_y..max_y {
            for x in min_x..max_x {
                let c = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if segment_distance(c, p0, p1) <= r {
                    self.composite_pixel(x, y, color, mode);
                }
            }
        }
    }

    /// Draw an outline shape between two anchor points.
    pub fn draw_shape(&mut self, kind: ShapeKind, p0: Point, p1: Point, color: Rgba, width: f64) {
        match kind {
            ShapeKind::Line => self.draw_segment(p0, p1, color, width, CompositeMode::SourceOver),
            ShapeKind::Rect => {
                let (a, b) = (
                    Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
                    Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
                );
                let mode = CompositeMode::SourceOver;
                self.draw_segment(a, Point::new(b.x, a.y), color, width, mode);
                self.draw_segment(Point::new(b.x, a.y), b, color, width, mode);
                self.draw_segment(b, Point::new(a.x, b.y), color, width, mode);
                self.draw_segment(Point::new(a.x, b.y), a, color, width, mode);
            }
            ShapeKind::Circle => {
                let radius = p0.distance(p1);
                let half = (width / 2.0).max(0.5);
                let min_x = ((p0.x - radius - half).floor()).max(0.0) as u32;
                let min_y = ((p0.y - radius - half).floor()).max(0.0) as u32;
                let max_x = (((p0.x + radius + half).ceil()) as i64).clamp(0, self.width as i64) as u32;
                let max_y = (((p0.y + radius + half).ceil()) as i64).clamp(0, self.height as i64) as u32;
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let c = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                        if (c.distance(p0) - radius).abs() <= half {
                            self.composite_pixel(x, y, color, CompositeMode::SourceOver);
                        }
                    }
                }
            }
        }
    }

    /// Rasterize `text` left to right with `pos` as the baseline origin.
    /// Glyph coverage modulates the alpha of `color`.
    pub fn place_text(&mut self, text: &str, pos: Point, font: &fontdue::Font, px: f64, color: Rgba) {
        let mut pen_x = pos.x;
        for ch in text.chars() {
            let (metrics, coverage) = font.rasterize(ch, px as f32);
            let x0 = pen_x + metrics.xmin as f64;
            let y0 = pos.y - metrics.height as f64 - metrics.ymin as f64;
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let cov = coverage[gy * metrics.width + gx];
                    if cov == 0 {
                        continue;
                    }
                    let x = x0 + gx as f64;
                    let y = y0 + gy as f64;
                    if x < 0.0 || y < 0.0 || x >= self.width as f64 || y >= self.height as f64 {
                        continue;
                    }
                    let a = ((color.a as u32 * cov as u32) / 255) as u8;
                    self.composite_pixel(
                        x as u32,
                        y as u32,
                        Rgba::new(color.r, color.g, color.b, a),
                        CompositeMode::SourceOver,
                    );
                }
            }
            pen_x += metrics.advance_width as f64;
        }
    }

    /// Draw `src` onto `self` with a global opacity and blend mode.
    ///
    /// Both parameters apply to this call only; nothing persists into later
    /// blits, so compositing state cannot leak between layers.
    pub fn blit(&mut self, src: &RasterSurface, opacity: f64, blend: BlendMode) {
        let opacity = opacity.clamp(0.0, 1.0);
        let w = self.width.min(src.width);
        let h = self.height.min(src.height);
        for y in 0..h {
            for x in 0..w {
                let s = src.pixels[(y * src.width + x) as usize];
                if s.a == 0 {
                    continue;
                }
                let i = (y * self.width + x) as usize;
                let d = self.pixels[i];
                let sa = (s.a as f64 / 255.0) * opacity;
                let da = d.a as f64 / 255.0;
                let blend_channel = |sc: u8, dc: u8| -> f64 {
                    let (sc, dc) = (sc as f64 / 255.0, dc as f64 / 255.0);
                    let b = match blend {
                        BlendMode::Normal => sc,
                        BlendMode::Multiply => sc * dc,
                        BlendMode::Screen => 1.0 - (1.0 - sc) * (1.0 - dc),
                    };
                    // Blend against the backdrop only where the backdrop exists.
                    (1.0 - da) * sc + da * b
                };
                let (sr, sg, sb) = (
                    blend_channel(s.r, d.r),
                    blend_channel(s.g, d.g),
                    blend_channel(s.b, d.b),
                );
                let oa = sa + da * (1.0 - sa);
                let over = |sc: f64, dc: u8| -> u8 {
                    if oa <= 0.0 {
                        return 0;
                    }
                    let dc = dc as f64 / 255.0;
                    (((sc * sa + dc * da * (1.0 - sa)) / oa) * 255.0).round() as u8
                };
                self.pixels[i] = Rgba::new(
                    over(sr, d.r),
                    over(sg, d.g),
                    over(sb, d.b),
                    (oa * 255.0).round() as u8,
                );
            }
        }
    }

    /// Encode to an opaque snapshot. See [`EncodedSurface`].
    pub fn encode(&self) -> EncodedSurface {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for p in &self.pixels {
            bytes.extend_from_slice(&[p.r, p.g, p.b, p.a]);
        }
        EncodedSurface {
            width: self.width,
            height: self.height,
            data: BASE64.encode(bytes),
        }
    }

    /// Decode a snapshot produced by [`RasterSurface::encode`].
    pub fn decode(encoded: &EncodedSurface) -> Result<Self> {
        let bytes = BASE64
            .decode(&encoded.data)
            .map_err(|e| Error::DecodeFailure(e.to_string()))?;
        let expected = (encoded.width as usize) * (encoded.height as usize) * 4;
        if bytes.len() != expected {
            return Err(Error::DecodeFailure(format!(
                "snapshot has {} bytes, expected {expected}",
                bytes.len()
            )));
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|c| Rgba::new(c[0], c[1], c[2], c[3]))
            .collect();
        Ok(Self {
            width: encoded.width,
            height: encoded.height,
            pixels,
        })
    }

    fn composite_pixel(&mut self, x: u32, y: u32, color: Rgba, mode: CompositeMode) {
        let i = (y * self.width + x) as usize;
        let d = self.pixels[i];
        match mode {
            CompositeMode::SourceOver => {
                let sa = color.a as f64 / 255.0;
                let da = d.a as f64 / 255.0;
                let oa = sa + da * (1.0 - sa);
                if oa <= 0.0 {
                    self.pixels[i] = Rgba::transparent();
                    return;
                }
                let over = |sc: u8, dc: u8| -> u8 {
                    let (sc, dc) = (sc as f64 / 255.0, dc as f64 / 255.0);
                    (((sc * sa + dc * da * (1.0 - sa)) / oa) * 255.0).round() as u8
                };
                self.pixels[i] = Rgba::new(
                    over(color.r, d.r),
                    over(color.g, d.g),
                    over(color.b, d.b),
                    (oa * 255.0).round() as u8,
                );
            }
            CompositeMode::Erase => {
                let keep = 1.0 - color.a as f64 / 255.0;
                self.pixels[i] = Rgba::new(d.r, d.g, d.b, (d.a as f64 * keep).round() as u8);
            }
        }
    }
}

/// Distance from `p` to the segment `a`-`b`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let c = Rgba::new(0x12, 0x34, 0x56, 255);
        assert_eq!(c.to_hex(), "#123456");
        assert_eq!(Rgba::from_hex("#123456"), Some(c));
        assert_eq!(Rgba::from_hex("#f00"), Some(Rgba::new(255, 0, 0, 255)));
        assert_eq!(
            Rgba::from_hex("#11223344"),
            Some(Rgba::new(0x11, 0x22, 0x33, 0x44))
        );
        assert_eq!(Rgba::from_hex("not-a-color"), None);
    }

    #[test]
    fn test_segment_paints_endpoints() {
        let mut s = RasterSurface::new(32, 32);
        s.draw_segment(
            Point::new(4.0, 4.0),
            Point::new(24.0, 4.0),
            Rgba::black(),
            4.0,
            CompositeMode::SourceOver,
        );
        assert_eq!(s.pixel(4, 4), Some(Rgba::black()));
        assert_eq!(s.pixel(24, 4), Some(Rgba::black()));
        assert_eq!(s.pixel(14, 4), Some(Rgba::black()));
        // Far away stays transparent.
        assert_eq!(s.pixel(14, 20), Some(Rgba::transparent()));
    }

    #[test]
    fn test_segment_is_idempotent() {
        let mut a = RasterSurface::new(16, 16);
        let color = Rgba::new(10, 200, 30, 128);
        a.draw_segment(
            Point::new(2.0, 2.0),
            Point::new(12.0, 12.0),
            color,
            3.0,
            CompositeMode::SourceOver,
        );
        let once = a.clone();
        a.draw_segment(
            Point::new(2.0, 2.0),
            Point::new(12.0, 12.0),
            color,
            3.0,
            CompositeMode::SourceOver,
        );
        // Translucent strokes still accumulate when re-composited, so
        // idempotency here means: identical coverage, not doubled coverage.
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(
                    a.pixel(x, y).unwrap().a == 0,
                    once.pixel(x, y).unwrap().a == 0
                );
            }
        }
    }

    #[test]
    fn test_erase_reveals_lower_content() {
        let mut s = RasterSurface::new(8, 8);
        s.fill(Rgba::new(200, 0, 0, 255));
        s.draw_segment(
            Point::new(4.0, 4.0),
            Point::new(4.0, 4.0),
            Rgba::new(0, 0, 0, 255),
            4.0,
            CompositeMode::Erase,
        );
        // Erased pixels drop to zero alpha instead of turning white.
        assert_eq!(s.pixel(4, 4).unwrap().a, 0);
        assert_eq!(s.pixel(0, 0).unwrap(), Rgba::new(200, 0, 0, 255));
    }

    #[test]
    fn test_partial_erase_scales_alpha() {
        let mut s = RasterSurface::new(4, 4);
        s.fill(Rgba::new(0, 0, 200, 200));
        s.draw_segment(
            Point::new(1.0, 1.0),
            Point::new(1.0, 1.0),
            Rgba::new(0, 0, 0, 128),
            2.0,
            CompositeMode::Erase,
        );
        let p = s.pixel(1, 1).unwrap();
        assert_eq!(p.a, (200.0_f64 * (1.0 - 128.0 / 255.0)).round() as u8);
        assert_eq!((p.r, p.g, p.b), (0, 0, 200));
    }

    #[test]
    fn test_rect_outline_leaves_interior_empty() {
        let mut s = RasterSurface::new(32, 32);
        s.draw_shape(
            ShapeKind::Rect,
            Point::new(4.0, 4.0),
            Point::new(28.0, 28.0),
            Rgba::black(),
            2.0,
        );
        assert_eq!(s.pixel(4, 4), Some(Rgba::black()));
        assert_eq!(s.pixel(16, 4), Some(Rgba::black()));
        assert_eq!(s.pixel(16, 16), Some(Rgba::transparent()));
    }

    #[test]
    fn test_circle_outline() {
        let mut s = RasterSurface::new(32, 32);
        s.draw_shape(
            ShapeKind::Circle,
            Point::new(16.0, 16.0),
            Point::new(26.0, 16.0),
            Rgba::black(),
            2.0,
        );
        // On the ring.
        assert_eq!(s.pixel(26, 16), Some(Rgba::black()));
        // Center stays empty.
        assert_eq!(s.pixel(16, 16), Some(Rgba::transparent()));
    }

    #[test]
    fn test_resize_discards_and_does_not_resurrect() {
        let mut s = RasterSurface::new(16, 16);
        s.fill(Rgba::black());
        s.resize(8, 8);
        assert_eq!(s.width(), 8);
        assert_eq!(s.pixel(7, 7), Some(Rgba::black()));
        s.resize(16, 16);
        // Top-left survives, the regrown region is empty.
        assert_eq!(s.pixel(7, 7), Some(Rgba::black()));
        assert_eq!(s.pixel(12, 12), Some(Rgba::transparent()));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut s = RasterSurface::new(10, 6);
        s.draw_segment(
            Point::new(1.0, 1.0),
            Point::new(8.0, 4.0),
            Rgba::new(9, 90, 180, 210),
            2.0,
            CompositeMode::SourceOver,
        );
        let decoded = RasterSurface::decode(&s.encode()).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn test_decode_rejects_bad_data() {
        let bad = EncodedSurface {
            width: 4,
            height: 4,
            data: "AAAA".to_string(), // 3 bytes, not 64
        };
        assert!(matches!(
            RasterSurface::decode(&bad),
            Err(Error::DecodeFailure(_))
        ));
        let garbage = EncodedSurface {
            width: 1,
            height: 1,
            data: "!!not base64!!".to_string(),
        };
        assert!(matches!(
            RasterSurface::decode(&garbage),
            Err(Error::DecodeFailure(_))
        ));
    }

    #[test]
    fn test_blit_respects_opacity() {
        let mut dst = RasterSurface::new(2, 1);
        dst.fill(Rgba::new(0, 0, 0, 255));
        let mut src = RasterSurface::new(2, 1);
        src.fill(Rgba::new(255, 255, 255, 255));
        dst.blit(&src, 0.5, BlendMode::Normal);
        let p = dst.pixel(0, 0).unwrap();
        assert_eq!(p.a, 255);
        assert!((p.r as i32 - 128).abs() <= 1, "got {}", p.r);
    }

    #[test]
    fn test_blit_multiply() {
        let mut dst = RasterSurface::new(1, 1);
        dst.fill(Rgba::new(128, 255, 0, 255));
        let mut src = RasterSurface::new(1, 1);
        src.fill(Rgba::new(255, 128, 255, 255));
        dst.blit(&src, 1.0, BlendMode::Multiply);
        let p = dst.pixel(0, 0).unwrap();
        assert_eq!(p.r, 128);
        assert_eq!(p.g, 128);
        assert_eq!(p.b, 0);
    }
}
