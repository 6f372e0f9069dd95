//! Scene drawing into an RGBA frame buffer, kept separate from the
//! simulation so trials can run headless.

use crate::base::Base;
use crate::bird::Bird;
use crate::pipe::Pipe;
use crate::sprites::{SKY, Sprite, SpriteSheet};

const HUD_SCALE: u32 = 3;
const HUD_MARGIN: i32 = 10;
const HUD_TEXT: [u8; 4] = [255, 255, 255, 255];
const HUD_BACKDROP: [u8; 4] = [0, 0, 0, 90];
const TARGET_LINE: [u8; 4] = [255, 0, 0, 255];
const TARGET_LINE_WIDTH: u32 = 3;

/// Borrowed view of a trial at the end of a tick.
pub struct Scene<'a> {
    pub sprites: &'a SpriteSheet,
    pub birds: Vec<&'a Bird>,
    pub pipes: &'a [Pipe],
    pub base: &'a Base,
    /// Pipe the controllers are steering for this tick.
    pub target: Option<&'a Pipe>,
    pub score: u32,
    pub generation: u32,
}

impl Scene<'_> {
    pub fn alive(&self) -> usize {
        self.birds.len()
    }
}

pub trait Renderer {
    fn draw(&mut self, scene: &Scene<'_>);
}

/// Renderer for headless runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw(&mut self, _scene: &Scene<'_>) {}
}

/// Software RGBA canvas the window copies into its surface.
#[derive(Clone, Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    frame: Vec<u8>,
    target_lines: bool,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: vec![0; (width * height * 4) as usize],
            target_lines: false,
        }
    }

    /// Also draw a line from each bird to both gap edges of the target pipe.
    pub fn with_target_lines(mut self, enabled: bool) -> Self {
        self.target_lines = enabled;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.frame[idx],
            self.frame[idx + 1],
            self.frame[idx + 2],
            self.frame[idx + 3],
        ]
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for px in self.frame.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let [r, g, b, a] = color;
        if a == 0 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
        let ar = a as u16;
        let iar = (255 - a) as u16;
        for (dst, src) in self.frame[idx..idx + 3].iter_mut().zip([r, g, b]) {
            *dst = ((src as u16 * ar + *dst as u16 * iar) / 255) as u8;
        }
        self.frame[idx + 3] = 255;
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: [u8; 4]) {
        for py in y..y + h as i32 {
            for px in x..x + w as i32 {
                self.blend_pixel(px, py, color);
            }
        }
    }

    /// Bresenham line stamped with a square brush `width` pixels wide.
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), width: u32, color: [u8; 4]) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let half = (width / 2) as i32;
        let mut err = dx + dy;
        loop {
            self.fill_rect(x - half, y - half, width, width, color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draws `sprite` with its top-left corner at `(x, y)`.
    pub fn blit(&mut self, sprite: &Sprite, x: f64, y: f64) {
        let (ox, oy) = (x.round() as i32, y.round() as i32);
        for sy in 0..sprite.height() {
            for sx in 0..sprite.width() {
                self.blend_pixel(ox + sx as i32, oy + sy as i32, sprite.pixel(sx, sy));
            }
        }
    }

    /// Draws `sprite` turned counter-clockwise by `degrees` about the centre
    /// of the box it would occupy unrotated at `(x, y)`.
    pub fn blit_rotated(&mut self, sprite: &Sprite, x: f64, y: f64, degrees: f64) {
        let (w, h) = (sprite.width() as f64, sprite.height() as f64);
        let cx = x.round() + w / 2.0;
        let cy = y.round() + h / 2.0;
        let (sin, cos) = degrees.to_radians().sin_cos();
        let reach = (w.hypot(h) / 2.0).ceil() as i32;

        let (left, top) = (cx.floor() as i32 - reach, cy.floor() as i32 - reach);
        for py in top..=top + 2 * reach {
            for px in left..=left + 2 * reach {
                let dx = px as f64 + 0.5 - cx;
                let dy = py as f64 + 0.5 - cy;
                let sx = (dx * cos - dy * sin + w / 2.0).floor();
                let sy = (dx * sin + dy * cos + h / 2.0).floor();
                if sx < 0.0 || sy < 0.0 || sx >= w || sy >= h {
                    continue;
                }
                self.blend_pixel(px, py, sprite.pixel(sx as u32, sy as u32));
            }
        }
    }

    /// Returns the horizontal advance of the drawn text.
    pub fn draw_text(&mut self, text: &str, x: i32, y: i32, scale: u32, color: [u8; 4]) -> u32 {
        let mut cx = x;
        for ch in text.chars() {
            cx += self.draw_char(ch, cx, y, scale, color) as i32;
        }
        (cx - x) as u32
    }

    fn draw_char(&mut self, ch: char, x: i32, y: i32, scale: u32, color: [u8; 4]) -> u32 {
        if let Some(rows) = glyph_5x7(ch) {
            for (ry, row) in rows.iter().enumerate() {
                for rx in 0..5 {
                    if (row >> (4 - rx)) & 1 == 1 {
                        self.fill_rect(
                            x + (rx * scale) as i32,
                            y + (ry as u32 * scale) as i32,
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }
        }
        glyph_advance(scale)
    }

    fn draw_label(&mut self, text: &str, x: i32, y: i32) {
        let w = text_width(text, HUD_SCALE);
        let pad = HUD_SCALE as i32;
        self.fill_rect(x - pad, y - pad, w + HUD_SCALE, 7 * HUD_SCALE + 2 * HUD_SCALE, HUD_BACKDROP);
        self.draw_text(text, x, y, HUD_SCALE, HUD_TEXT);
    }
}

impl Renderer for Canvas {
    fn draw(&mut self, scene: &Scene<'_>) {
        let sprites = scene.sprites;
        self.clear(SKY);

        for pipe in scene.pipes {
            self.blit(&sprites.pipe_top, pipe.x, pipe.top);
            self.blit(&sprites.pipe, pipe.x, pipe.bottom);
        }

        self.blit(&sprites.base, scene.base.x1, scene.base.y);
        self.blit(&sprites.base, scene.base.x2, scene.base.y);

        for bird in &scene.birds {
            if let Some(target) = scene.target.filter(|_| self.target_lines) {
                let frame = &sprites.bird[bird.frame()];
                let from = (
                    (bird.x + (frame.width() / 2) as f64) as i32,
                    (bird.y + (frame.height() / 2) as f64) as i32,
                );
                let gap_x = (target.x + (sprites.pipe.width() / 2) as f64) as i32;
                self.draw_line(from, (gap_x, target.bottom as i32), TARGET_LINE_WIDTH, TARGET_LINE);
                self.draw_line(from, (gap_x, target.height as i32), TARGET_LINE_WIDTH, TARGET_LINE);
            }
            self.blit_rotated(&sprites.bird[bird.frame()], bird.x, bird.y, bird.tilt);
        }

        let score = format!("SCORE: {}", scene.score);
        let score_x = self.width as i32 - HUD_MARGIN - text_width(&score, HUD_SCALE) as i32;
        self.draw_label(&score, score_x, HUD_MARGIN);
        self.draw_label(&format!("GENS: {}", scene.generation), HUD_MARGIN, HUD_MARGIN);
        self.draw_label(
            &format!("ALIVE: {}", scene.alive()),
            HUD_MARGIN,
            HUD_MARGIN + 10 * HUD_SCALE as i32,
        );
    }
}

fn glyph_advance(scale: u32) -> u32 {
    6 * scale
}

pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * glyph_advance(scale)
}

fn glyph_5x7(ch: char) -> Option<[u8; 7]> {
    Some(match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        'I' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b11111],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0b00000, 0b00100, 0b00000, 0b00000, 0b00100, 0b00000, 0b00000],
        ' ' => [0; 7],
        _ => return None,
    })
}
