use common::{Error, Result};
use font8x8::UnicodeFonts;
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform};

const GLYPH: f32 = 8.0;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Align {
    Left,
    Center,
}

/// Thin drawing surface over a tiny-skia pixmap with bitmap text.
pub(crate) struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::Render(format!("invalid canvas size {width}x{height}")))?;
        Ok(Self { pixmap })
    }

    pub fn fill(&mut self, color: Color) {
        self.pixmap.fill(color);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        // Zero-height bodies still get a visible line.
        let h = if h.abs() < 1.0 { 1.0 } else { h };
        let Some(rect) = Rect::from_xywh(x, y.min(y + h), w.max(1.0), h.abs()) else {
            return;
        };
        self.pixmap.fill_rect(rect, &paint(color, false), Transform::identity(), None);
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32, dash: Option<[f32; 2]>) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.0, from.1);
        pb.line_to(to.0, to.1);
        let Some(path) = pb.finish() else {
            return;
        };

        let mut stroke = Stroke { width, ..Stroke::default() };
        if let Some([on, off]) = dash {
            stroke.dash = StrokeDash::new(vec![on, off], 0.0);
        }
        self.pixmap
            .stroke_path(&path, &paint(color, true), &stroke, Transform::identity(), None);
    }

    /// Draw `text` with its vertical center on `y`. Unsupported characters
    /// advance the cursor without drawing.
    pub fn text(&mut self, text: &str, x: f32, y: f32, color: Color, align: Align, scale: f32) {
        let advance = GLYPH * scale;
        let width = text.chars().count() as f32 * advance;
        let mut cursor = match align {
            Align::Left => x,
            Align::Center => x - width / 2.0,
        };
        let top = y - advance / 2.0;
        let paint = paint(color, false);

        for ch in text.chars() {
            if let Some(glyph) = font8x8::BASIC_FONTS.get(ch) {
                for (row, bits) in glyph.iter().enumerate() {
                    for col in 0..8 {
                        if bits & (1 << col) == 0 {
                            continue;
                        }
                        let px = cursor + col as f32 * scale;
                        let py = top + row as f32 * scale;
                        if let Some(rect) = Rect::from_xywh(px, py, scale, scale) {
                            self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                        }
                    }
                }
            }
            cursor += advance;
        }
    }

    pub fn encode_png(self) -> Result<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| Error::Render(e.to_string()))
    }
}

fn paint(color: Color, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = anti_alias;
    paint
}

pub(crate) fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::from_rgba8(r, g, b, 255)
}

pub(crate) fn rgba(r: u8, g: u8, b: u8, alpha: f32) -> Color {
    Color::from_rgba8(r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
}
