use crate::mask::Mask;
use crate::sprites::SpriteSheet;

pub const START_X: f64 = 230.0;
pub const START_Y: f64 = 350.0;
pub const ACCELERATION: f64 = 3.0;
pub const JUMP_VELOCITY: f64 = -10.5;
/// Per-tick displacement never exceeds this (terminal fall speed).
pub const MAX_DISPLACEMENT: f64 = 16.0;
/// Extra lift applied to upward displacement.
pub const RISE_BOOST: f64 = 2.0;
/// While within this many pixels below the jump height the bird stays nose-up.
pub const CLIMB_MARGIN: f64 = 50.0;
pub const MAX_ROTATION: f64 = 25.0;
pub const MIN_ROTATION: f64 = -90.0;
pub const ROTATION_VELOCITY: f64 = 20.0;
/// Draw calls spent on each wing frame.
pub const ANIMATION_TIME: u32 = 5;
const DIVE_TILT: f64 = -80.0;
const WING_CYCLE: [usize; 4] = [0, 1, 2, 1];

/// Displacement `t` ticks after the last impulse, before the extra lift.
pub fn displacement(velocity: f64, acceleration: f64, ticks: u32) -> f64 {
    let t = ticks as f64;
    (velocity * t + 0.5 * acceleration * t * t).min(MAX_DISPLACEMENT)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bird {
    pub x: f64,
    pub y: f64,
    pub velocity: f64,
    pub tick_count: u32,
    pub acceleration: f64,
    pub tilt: f64,
    /// `y` at the last jump.
    pub height: f64,
    frame: usize,
    frame_counter: u32,
}

impl Bird {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            velocity: 0.0,
            tick_count: 0,
            acceleration: ACCELERATION,
            tilt: 0.0,
            height: y,
            frame: 0,
            frame_counter: 0,
        }
    }

    pub fn jump(&mut self) {
        self.velocity = JUMP_VELOCITY;
        self.tick_count = 0;
        self.height = self.y;
    }

    pub fn step(&mut self) {
        self.tick_count += 1;

        let mut d = displacement(self.velocity, self.acceleration, self.tick_count);
        if d < 0.0 {
            d -= RISE_BOOST;
        }
        self.y += d;

        if d < 0.0 || self.y < self.height + CLIMB_MARGIN {
            if self.tilt < MAX_ROTATION {
                self.tilt = MAX_ROTATION;
            }
        } else if self.tilt > MIN_ROTATION {
            self.tilt = (self.tilt - ROTATION_VELOCITY).max(MIN_ROTATION);
        }
    }

    /// Advances the wing animation by one drawn frame.
    pub fn animate(&mut self) {
        self.frame_counter += 1;
        if self.frame_counter > ANIMATION_TIME * 4 {
            self.frame_counter = 0;
            self.frame = 0;
        } else {
            let slot = ((self.frame_counter - 1) / ANIMATION_TIME) as usize;
            self.frame = WING_CYCLE[slot];
        }

        if self.tilt <= DIVE_TILT {
            self.frame = 1;
            self.frame_counter = ANIMATION_TIME * 2;
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn mask<'a>(&self, sprites: &'a SpriteSheet) -> &'a Mask {
        sprites.bird[self.frame].mask()
    }

    pub fn frame_height(&self, sprites: &SpriteSheet) -> f64 {
        sprites.bird[self.frame].height() as f64
    }
}

impl Default for Bird {
    fn default() -> Self {
        Self::new(START_X, START_Y)
    }
}
