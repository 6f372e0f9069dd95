use crate::bird::Bird;
use crate::sprites::SpriteSheet;
use rand::Rng;
use std::ops::Range;

/// Vertical opening between the two pieces.
pub const GAP: f64 = 200.0;
pub const VELOCITY: f64 = 5.0;
/// Range of the gap's upper edge.
pub const GAP_TOP_RANGE: Range<i32> = 50..450;
pub const FIRST_X: f64 = 700.0;
/// New pipes enter at the right edge of the window.
pub const SPAWN_X: f64 = crate::config::WINDOW_WIDTH as f64;

#[derive(Clone, Debug, PartialEq)]
pub struct Pipe {
    pub x: f64,
    /// Upper edge of the gap.
    pub height: f64,
    /// Y of the top piece's sprite (its lower edge is `height`).
    pub top: f64,
    /// Y of the bottom piece's sprite, the lower edge of the gap.
    pub bottom: f64,
    pub passed: bool,
}

impl Pipe {
    pub fn new<R: Rng + ?Sized>(x: f64, sprites: &SpriteSheet, rng: &mut R) -> Self {
        let height = rng.gen_range(GAP_TOP_RANGE) as f64;
        Self::with_height(x, height, sprites.pipe_height())
    }

    pub fn with_height(x: f64, height: f64, piece_height: f64) -> Self {
        Self {
            x,
            height,
            top: height - piece_height,
            bottom: height + GAP,
            passed: false,
        }
    }

    pub fn advance(&mut self) {
        self.x -= VELOCITY;
    }

    pub fn trailing_edge(&self, sprites: &SpriteSheet) -> f64 {
        self.x + sprites.pipe_width()
    }

    pub fn is_off_screen(&self, sprites: &SpriteSheet) -> bool {
        self.trailing_edge(sprites) < 0.0
    }

    pub fn collides_with(&self, bird: &Bird, sprites: &SpriteSheet) -> bool {
        let bird_mask = bird.mask(sprites);
        // Half pixels round to even so offsets match pygame's integer rects.
        let dx = (self.x - bird.x).round_ties_even() as i32;
        let bird_y = bird.y.round_ties_even();
        let top_offset = (dx, (self.top - bird_y) as i32);
        let bottom_offset = (dx, (self.bottom - bird_y) as i32);

        bird_mask.overlap(sprites.pipe_top.mask(), top_offset).is_some()
            || bird_mask.overlap(sprites.pipe.mask(), bottom_offset).is_some()
    }
}

/// The pipe a controller should steer for: the nearest one whose trailing
/// edge is still ahead of `lead_x`.
pub fn target<'a>(pipes: &'a [Pipe], lead_x: f64, sprites: &SpriteSheet) -> Option<&'a Pipe> {
    pipes
        .iter()
        .filter(|p| p.trailing_edge(sprites) > lead_x)
        .min_by(|a, b| a.x.total_cmp(&b.x))
}
