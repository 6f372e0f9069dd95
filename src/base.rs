pub const VELOCITY: f64 = 5.0;

/// Two floor tiles leapfrogging each other to fake an endless strip.
#[derive(Clone, Debug, PartialEq)]
pub struct Base {
    pub y: f64,
    pub x1: f64,
    pub x2: f64,
    width: f64,
}

impl Base {
    pub fn new(y: f64, tile_width: f64) -> Self {
        Self {
            y,
            x1: 0.0,
            x2: tile_width,
            width: tile_width,
        }
    }

    pub fn advance(&mut self) {
        self.x1 -= VELOCITY;
        self.x2 -= VELOCITY;

        if self.x1 + self.width < 0.0 {
            self.x1 = self.x2 + self.width;
        }
        if self.x2 + self.width < 0.0 {
            self.x2 = self.x1 + self.width;
        }
    }

    pub fn tile_width(&self) -> f64 {
        self.width
    }

    /// Whether the two tiles together leave no hole in `[0, screen_width)`.
    pub fn covers(&self, screen_width: f64) -> bool {
        let (first, second) = if self.x1 <= self.x2 {
            (self.x1, self.x2)
        } else {
            (self.x2, self.x1)
        };
        first <= 0.0 && second <= first + self.width && second + self.width >= screen_width
    }
}
