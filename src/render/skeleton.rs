//! Hand skeleton overlay.

use crate::gesture::message::{HandLandmarks, Handedness, LandmarkFrame};
use crate::render::canvas::{rgb, Canvas, BLACK, WHITE};

/// Surface size used when a frame does not report its image size.
pub const DEFAULT_WIDTH: usize = 640;
pub const DEFAULT_HEIGHT: usize = 480;

/// Largest surface side accepted from a frame. Anything bigger is treated as
/// unreported and falls back to the default size.
pub const MAX_SURFACE_SIDE: u32 = 4096;

/// Bones of the 21-point hand model, as landmark index pairs.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // thumb
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    // index
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    // middle
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    // ring
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    // pinky
    (13, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    // palm
    (0, 17),
];

const LINE_WIDTH: f32 = 3.0;
const WRIST_RADIUS: f32 = 8.0;
const JOINT_RADIUS: f32 = 4.0;
const OUTLINE_WIDTH: f32 = 1.0;
const LABEL_OFFSET: (f32, f32) = (20.0, -20.0);
const LABEL_SCALE: usize = 3;

/// Colours of one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandStyle {
    pub line: u32,
    pub point: u32,
    pub label: &'static str,
}

impl HandStyle {
    pub fn for_side(side: Handedness) -> Self {
        match side {
            Handedness::Right => Self {
                line: rgb(0x00FF00),
                point: rgb(0x00DD00),
                label: "R",
            },
            Handedness::Left => Self {
                line: rgb(0x8000FF),
                point: rgb(0x6000DD),
                label: "L",
            },
        }
    }
}

/// Paints landmark frames onto its own surface.
#[derive(Debug, Clone)]
pub struct SkeletonRenderer {
    canvas: Canvas,
}

impl Default for SkeletonRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonRenderer {
    pub fn new() -> Self {
        Self {
            canvas: Canvas::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Clears the surface and draws every hand in `frame`.
    pub fn render(&mut self, frame: &LandmarkFrame) {
        let (width, height) = surface_size(frame);
        if self.canvas.resize(width, height) {
            tracing::debug!(width, height, "skeleton surface resized");
        }
        self.canvas.clear();

        for hand in &frame.hands {
            self.draw_hand(hand);
        }
    }

    /// Blanks the surface.
    pub fn clear(&mut self) {
        self.canvas.clear();
    }

    fn draw_hand(&mut self, hand: &HandLandmarks) {
        let Some(side) = hand.side() else {
            return;
        };
        let style = HandStyle::for_side(side);
        let (w, h) = (self.canvas.width() as f32, self.canvas.height() as f32);
        let at = |index: usize| hand.get(index).map(|p| (p.x * w, p.y * h));

        for &(a, b) in &HAND_CONNECTIONS {
            if let (Some(from), Some(to)) = (at(a), at(b)) {
                self.canvas.draw_line(from, to, LINE_WIDTH, style.line);
            }
        }

        for index in 0..hand.0.len() {
            let Some(center) = at(index) else { continue };
            let radius = if index == HandLandmarks::WRIST {
                WRIST_RADIUS
            } else {
                JOINT_RADIUS
            };
            self.canvas.fill_circle(center, radius, style.point);
            self.canvas
                .stroke_circle(center, radius, OUTLINE_WIDTH, WHITE);
        }

        if let Some((x, y)) = at(HandLandmarks::WRIST) {
            self.canvas.draw_outlined_text(
                style.label,
                x + LABEL_OFFSET.0,
                y + LABEL_OFFSET.1,
                LABEL_SCALE,
                WHITE,
                BLACK,
            );
        }
    }
}

/// True if the frame reports an image no larger than [`MAX_SURFACE_SIDE`]
/// on either side.
pub fn fits_surface(frame: &LandmarkFrame) -> bool {
    frame.image_width <= MAX_SURFACE_SIDE && frame.image_height <= MAX_SURFACE_SIDE
}

/// Surface size for `frame`: its reported image size, or the default when
/// a side is missing or the size is out of range.
fn surface_size(frame: &LandmarkFrame) -> (usize, usize) {
    if !fits_surface(frame) {
        tracing::debug!(
            width = frame.image_width,
            height = frame.image_height,
            "frame size out of range, using default surface"
        );
        return (DEFAULT_WIDTH, DEFAULT_HEIGHT);
    }
    (
        nonzero_or(frame.image_width, DEFAULT_WIDTH),
        nonzero_or(frame.image_height, DEFAULT_HEIGHT),
    )
}

fn nonzero_or(value: u32, default: usize) -> usize {
    if value == 0 {
        default
    } else {
        value as usize
    }
}
