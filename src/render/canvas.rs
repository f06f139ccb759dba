//! A small software framebuffer.
//!
//! Pixels are `0xAARRGGBB`. Shapes are rasterized by testing pixel centres
//! against the ideal geometry, which is plenty for overlays a few hundred
//! pixels across. Anything that falls outside the surface is clipped.

/// Fully transparent black, the cleared state.
pub const TRANSPARENT: u32 = 0x0000_0000;
pub const WHITE: u32 = 0xFFFF_FFFF;
pub const BLACK: u32 = 0xFF00_0000;

/// Builds an opaque colour from `0xRRGGBB`.
pub const fn rgb(hex: u32) -> u32 {
    0xFF00_0000 | (hex & 0x00FF_FFFF)
}

/// Builds a colour from `0xRRGGBB` and an opacity in `[0, 1]`.
pub fn rgba(hex: u32, alpha: f32) -> u32 {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u32;
    (a << 24) | (hex & 0x00FF_FFFF)
}

pub fn alpha(color: u32) -> u32 {
    color >> 24
}

/// Composites `src` over `dst`.
pub fn blend_over(dst: u32, src: u32) -> u32 {
    let sa = alpha(src);
    if sa == 0xFF {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let t = sa as f32 / 255.0;
    let da = alpha(dst) as f32 / 255.0;
    let out_a = t + da * (1.0 - t);
    let channel = |shift: u32| {
        let s = ((src >> shift) & 0xFF) as f32;
        let d = ((dst >> shift) & 0xFF) as f32;
        ((s * t + d * da * (1.0 - t)) / out_a).round() as u32
    };
    ((out_a * 255.0).round() as u32) << 24 | channel(16) << 16 | channel(8) << 8 | channel(0)
}

/// An owned pixel surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Resizes the surface if the dimensions differ, clearing it.
    ///
    /// Returns true if a resize happened.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![TRANSPARENT; width * height];
        true
    }

    pub fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Paints one pixel, blending if `color` is translucent.
    pub fn plot(&mut self, x: i64, y: i64, color: u32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let index = y as usize * self.width + x as usize;
        self.pixels[index] = blend_over(self.pixels[index], color);
    }

    /// Fills the rectangle `[x, x+w) × [y, y+h)`.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: u32) {
        let (x0, x1) = (x.min(x + w), x.max(x + w));
        let (y0, y1) = (y.min(y + h), y.max(y + h));
        let Some((left, right)) = clip_span(x0.round(), x1.round() - 1.0, self.width) else {
            return;
        };
        let Some((top, bottom)) = clip_span(y0.round(), y1.round() - 1.0, self.height) else {
            return;
        };
        for py in top..=bottom {
            for px in left..=right {
                self.plot(px, py, color);
            }
        }
    }

    /// Paints every pixel in `bounds` whose centre satisfies `inside`.
    fn paint_region<F>(&mut self, bounds: (f32, f32, f32, f32), color: u32, inside: F)
    where
        F: Fn(f32, f32) -> bool,
    {
        let (min_x, min_y, max_x, max_y) = bounds;
        let Some((left, right)) = clip_span(min_x.floor(), max_x.ceil(), self.width) else {
            return;
        };
        let Some((top, bottom)) = clip_span(min_y.floor(), max_y.ceil(), self.height) else {
            return;
        };
        for py in top..=bottom {
            for px in left..=right {
                if inside(px as f32 + 0.5, py as f32 + 0.5) {
                    self.plot(px, py, color);
                }
            }
        }
    }

    /// Draws a line segment `width` pixels thick with round caps.
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: u32) {
        let half = width / 2.0;
        let (ax, ay) = from;
        let (bx, by) = to;
        let bounds = (
            ax.min(bx) - half,
            ay.min(by) - half,
            ax.max(bx) + half,
            ay.max(by) + half,
        );
        self.paint_region(bounds, color, |px, py| {
            distance_to_segment((px, py), from, to) <= half
        });
    }

    pub fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: u32) {
        let (cx, cy) = center;
        let bounds = (cx - radius, cy - radius, cx + radius, cy + radius);
        self.paint_region(bounds, color, |px, py| {
            (px - cx).hypot(py - cy) <= radius
        });
    }

    /// Draws a ring of the given stroke width centred on `radius`.
    pub fn stroke_circle(&mut self, center: (f32, f32), radius: f32, width: f32, color: u32) {
        let (cx, cy) = center;
        let half = width / 2.0;
        let outer = radius + half;
        let bounds = (cx - outer, cy - outer, cx + outer, cy + outer);
        self.paint_region(bounds, color, |px, py| {
            ((px - cx).hypot(py - cy) - radius).abs() <= half
        });
    }

    /// Draws `text` with its bottom-left corner at `(x, y)`.
    ///
    /// Glyphs are 3×5 cells, each cell `scale` pixels square.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, scale: usize, color: u32) {
        let scale = scale.max(1) as f32;
        let top = y - GLYPH_ROWS as f32 * scale;
        let mut left = x;
        for ch in text.chars() {
            for (row, bits) in glyph(ch).iter().enumerate() {
                for col in 0..GLYPH_COLS {
                    if bits & (1 << (GLYPH_COLS - 1 - col)) != 0 {
                        self.fill_rect(
                            left + col as f32 * scale,
                            top + row as f32 * scale,
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }
            left += (GLYPH_COLS + 1) as f32 * scale;
        }
    }

    /// Draws `text` in `color` over a one-pixel `outline`.
    pub fn draw_outlined_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        scale: usize,
        color: u32,
        outline: u32,
    ) {
        for (dx, dy) in [
            (-1.0, -1.0),
            (0.0, -1.0),
            (1.0, -1.0),
            (-1.0, 0.0),
            (1.0, 0.0),
            (-1.0, 1.0),
            (0.0, 1.0),
            (1.0, 1.0),
        ] {
            self.draw_text(text, x + dx, y + dy, scale, outline);
        }
        self.draw_text(text, x, y, scale, color);
    }
}

/// Clamps the inclusive pixel span `[lo, hi]` to `[0, len - 1]`.
///
/// Returns `None` when nothing of the span lies on the surface.
fn clip_span(lo: f32, hi: f32, len: usize) -> Option<(i64, i64)> {
    if len == 0 || lo.is_nan() || hi.is_nan() {
        return None;
    }
    let last = (len - 1) as f32;
    let (lo, hi) = (lo.max(0.0), hi.min(last));
    (lo <= hi).then(|| (lo as i64, hi as i64))
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * abx, a.1 + t * aby);
    (p.0 - cx).hypot(p.1 - cy)
}

const GLYPH_COLS: usize = 3;
const GLYPH_ROWS: usize = 5;

/// Rows of a 3×5 glyph, most significant bit on the left.
fn glyph(c: char) -> [u8; GLYPH_ROWS] {
    match c.to_ascii_uppercase() {
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        ' ' => [0; GLYPH_ROWS],
        _ => [0b111, 0b001, 0b011, 0b000, 0b010],
    }
}
