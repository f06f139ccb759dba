//! Pixel surfaces drawn with half-block characters.
//!
//! Each terminal cell shows two vertically stacked pixels: the upper one as
//! the foreground of `▀`, the lower one as the background.

use crate::render::canvas::{blend_over, Canvas};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

const UPPER_HALF: &str = "▀";

fn to_color(pixel: u32) -> Color {
    Color::Rgb((pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8)
}

/// Samples `canvas` down to `cols × rows` cells composited over `background`.
pub fn canvas_lines(canvas: &Canvas, cols: u16, rows: u16, background: u32) -> Vec<Line<'static>> {
    if cols == 0 || rows == 0 || canvas.width() == 0 || canvas.height() == 0 {
        return Vec::new();
    }
    let sx = canvas.width() as f32 / cols as f32;
    let sy = canvas.height() as f32 / (rows as f32 * 2.0);
    let sample = |col: u16, half_row: u16| {
        let x = ((col as f32 + 0.5) * sx) as usize;
        let y = ((half_row as f32 + 0.5) * sy) as usize;
        let pixel = canvas
            .pixel(x.min(canvas.width() - 1), y.min(canvas.height() - 1))
            .unwrap_or(background);
        to_color(blend_over(background, pixel))
    };

    (0..rows)
        .map(|row| {
            let spans: Vec<Span<'static>> = (0..cols)
                .map(|col| {
                    Span::styled(
                        UPPER_HALF,
                        Style::default()
                            .fg(sample(col, row * 2))
                            .bg(sample(col, row * 2 + 1)),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::{rgb, rgba, BLACK, WHITE};

    #[test]
    fn test_upper_and_lower_pixels() {
        let mut canvas = Canvas::new(1, 2);
        canvas.plot(0, 0, WHITE);
        let lines = canvas_lines(&canvas, 1, 1, BLACK);
        assert_eq!(lines.len(), 1);
        let style = lines[0].spans[0].style;
        assert_eq!(style.fg, Some(Color::Rgb(255, 255, 255)));
        assert_eq!(style.bg, Some(Color::Rgb(0, 0, 0)));
    }

    #[test]
    fn test_translucent_pixels_blend_with_background() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill(rgba(0xFF0000, 0.5));
        let lines = canvas_lines(&canvas, 2, 1, rgb(0x000000));
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[1].style.fg, Some(Color::Rgb(128, 0, 0)));
    }

    #[test]
    fn test_downsamples_large_surfaces() {
        let mut canvas = Canvas::new(100, 40);
        canvas.fill_rect(50.0, 0.0, 50.0, 40.0, WHITE);
        let lines = canvas_lines(&canvas, 10, 2, BLACK);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].spans[2].style.fg, Some(Color::Rgb(0, 0, 0)));
        assert_eq!(lines[1].spans[7].style.bg, Some(Color::Rgb(255, 255, 255)));
        assert!(canvas_lines(&canvas, 0, 2, BLACK).is_empty());
    }
}
