//! Procedurally painted sprites and their collision masks.
//!
//! Sizes match the classic asset set at 2x scale, so the physics constants
//! (floor line, gap range, spawn positions) keep their usual meaning.

use crate::mask::Mask;

pub const BIRD_SIZE: (u32, u32) = (68, 48);
pub const PIPE_SIZE: (u32, u32) = (104, 640);
pub const BASE_SIZE: (u32, u32) = (672, 224);
const PIPE_CAP_HEIGHT: u32 = 48;
const PIPE_BODY_INSET: u32 = 6;

pub const SKY: [u8; 4] = [78, 192, 202, 255];

#[derive(Clone, Debug)]
pub struct Sprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    mask: Mask,
}

impl Sprite {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        let mask = Mask::from_rgba(width, height, &rgba);
        Self {
            width,
            height,
            rgba,
            mask,
        }
    }

    fn paint(width: u32, height: u32, color_at: impl Fn(u32, u32) -> Option<[u8; 4]>) -> Self {
        let mut rgba = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                if let Some(color) = color_at(x, y) {
                    let idx = ((y * width + x) * 4) as usize;
                    rgba[idx..idx + 4].copy_from_slice(&color);
                }
            }
        }
        Self::from_rgba(width, height, rgba)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.rgba[idx],
            self.rgba[idx + 1],
            self.rgba[idx + 2],
            self.rgba[idx + 3],
        ]
    }

    pub fn flip_vertical(&self) -> Self {
        let row = (self.width * 4) as usize;
        let mut rgba = Vec::with_capacity(self.rgba.len());
        for chunk in self.rgba.chunks_exact(row).rev() {
            rgba.extend_from_slice(chunk);
        }
        Self::from_rgba(self.width, self.height, rgba)
    }
}

/// Every sprite a session needs, built once.
#[derive(Clone, Debug)]
pub struct SpriteSheet {
    pub bird: [Sprite; 3],
    pub pipe: Sprite,
    pub pipe_top: Sprite,
    pub base: Sprite,
}

impl SpriteSheet {
    pub fn new() -> Self {
        let pipe = paint_pipe();
        let pipe_top = pipe.flip_vertical();
        Self {
            bird: [paint_bird(18.0), paint_bird(28.0), paint_bird(36.0)],
            pipe,
            pipe_top,
            base: paint_base(),
        }
    }

    pub fn pipe_width(&self) -> f64 {
        self.pipe.width() as f64
    }

    pub fn pipe_height(&self) -> f64 {
        self.pipe.height() as f64
    }
}

impl Default for SpriteSheet {
    fn default() -> Self {
        Self::new()
    }
}

fn in_ellipse(x: u32, y: u32, cx: f64, cy: f64, rx: f64, ry: f64) -> bool {
    let dx = (x as f64 + 0.5 - cx) / rx;
    let dy = (y as f64 + 0.5 - cy) / ry;
    dx * dx + dy * dy <= 1.0
}

fn paint_bird(wing_y: f64) -> Sprite {
    let (w, h) = BIRD_SIZE;
    Sprite::paint(w, h, |x, y| {
        if in_ellipse(x, y, 46.0, 18.0, 2.5, 2.5) {
            return Some([20, 20, 20, 255]);
        }
        if in_ellipse(x, y, 44.0, 18.0, 5.5, 5.5) {
            return Some([250, 250, 250, 255]);
        }
        if in_ellipse(x, y, 22.0, wing_y, 12.0, 6.0) {
            return Some([252, 240, 200, 255]);
        }
        let beak_x = x as f64;
        if (54.0..66.0).contains(&beak_x) && (y as f64 - 28.0).abs() <= (66.0 - beak_x) / 3.0 {
            return Some([240, 110, 30, 255]);
        }
        if in_ellipse(x, y, 32.0, 26.0, 26.0, 18.0) {
            return Some([248, 196, 40, 255]);
        }
        None
    })
}

fn paint_pipe() -> Sprite {
    let (w, h) = PIPE_SIZE;
    Sprite::paint(w, h, |x, y| {
        let (left, right) = if y < PIPE_CAP_HEIGHT {
            (0, w)
        } else {
            (PIPE_BODY_INSET, w - PIPE_BODY_INSET)
        };
        if x < left || x >= right {
            return None;
        }
        let edge = x < left + 4 || x + 4 >= right || y < 3 || y + 3 == PIPE_CAP_HEIGHT;
        Some(if edge {
            [84, 56, 71, 255]
        } else if (x - left) < (right - left) / 4 {
            [158, 228, 89, 255]
        } else {
            [115, 191, 46, 255]
        })
    })
}

fn paint_base() -> Sprite {
    let (w, h) = BASE_SIZE;
    Sprite::paint(w, h, |x, y| {
        Some(match y {
            0..=3 => [84, 56, 71, 255],
            4..=15 if (x + y) % 24 < 12 => [158, 228, 89, 255],
            4..=15 => [115, 191, 46, 255],
            16..=19 => [84, 56, 71, 255],
            _ => [222, 216, 149, 255],
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bird_frames_share_size_but_differ_in_shape() {
        let sheet = SpriteSheet::new();
        for frame in &sheet.bird {
            assert_eq!((frame.width(), frame.height()), BIRD_SIZE);
        }
        assert_ne!(sheet.bird[0].mask(), sheet.bird[2].mask());
    }

    #[test]
    fn pipe_body_is_narrower_than_its_cap() {
        let sheet = SpriteSheet::new();
        let mask = sheet.pipe.mask();
        assert!(mask.get(0, 0));
        assert!(!mask.get(0, PIPE_CAP_HEIGHT + 10));
        assert!(mask.get(PIPE_BODY_INSET, PIPE_CAP_HEIGHT + 10));
    }

    #[test]
    fn pipe_top_is_the_flipped_pipe() {
        let sheet = SpriteSheet::new();
        assert_eq!(sheet.pipe_top.mask(), &sheet.pipe.mask().flip_vertical());
        assert!(sheet.pipe_top.mask().get(0, PIPE_SIZE.1 - 1));
    }

    #[test]
    fn base_is_fully_opaque() {
        let sheet = SpriteSheet::new();
        let (w, h) = BASE_SIZE;
        assert_eq!(sheet.base.mask().count(), (w * h) as usize);
    }
}
