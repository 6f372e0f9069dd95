use crate::config::Config;
use crate::sprites::SpriteSheet;

/// Everything shared across trials: settings, sprites and the generation
/// counter.
pub struct Session {
    pub config: Config,
    pub sprites: SpriteSheet,
    generation: u32,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sprites: SpriteSheet::new(),
            generation: 0,
        }
    }

    /// Generation of the trial currently running, starting at 1.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn begin_generation(&mut self) -> u32 {
        self.generation += 1;
        self.generation
    }
}
