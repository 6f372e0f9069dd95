//! One generation's run: every genome flies its own bird through the same
//! pipes until the last bird is gone.

use crate::base::Base;
use crate::bird::Bird;
use crate::config::{FLOOR_Y, GameConfig};
use crate::controller::Controller;
use crate::genome::Genome;
use crate::pipe::{self, FIRST_X, Pipe, SPAWN_X};
use crate::render::{Renderer, Scene};
use crate::session::Session;
use crate::snapshot::GenomeSink;
use rand::Rng;
use tracing::{debug, info, warn};

/// Birds whose lower edge, less this slack, reaches the floor are out.
const FLOOR_SLACK: f64 = 10.0;
/// Birds above this line are out.
const CEILING_Y: f64 = -50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialState {
    Running,
    Terminated,
}

/// A live bird together with the genome it scores for and the controller
/// flying it.
pub struct Contestant {
    pub bird: Bird,
    /// Index into the generation's genome slice.
    pub genome: usize,
    controller: Box<dyn Controller>,
}

pub struct Trial {
    contestants: Vec<Contestant>,
    pipes: Vec<Pipe>,
    base: Base,
    score: u32,
    ticks: u64,
    state: TrialState,
    last_snapshot: Option<u32>,
}

impl Trial {
    /// Zeroes every genome's fitness and seats one bird per controller.
    pub fn new<R: Rng + ?Sized>(
        session: &Session,
        genomes: &mut [Genome],
        controllers: Vec<Box<dyn Controller>>,
        rng: &mut R,
    ) -> Self {
        debug_assert_eq!(genomes.len(), controllers.len());
        for genome in genomes.iter_mut() {
            genome.fitness = 0.0;
        }

        let contestants: Vec<Contestant> = controllers
            .into_iter()
            .enumerate()
            .map(|(genome, controller)| Contestant {
                bird: Bird::default(),
                genome,
                controller,
            })
            .collect();
        let sprites = &session.sprites;

        Self {
            state: if contestants.is_empty() {
                TrialState::Terminated
            } else {
                TrialState::Running
            },
            contestants,
            pipes: vec![Pipe::new(FIRST_X, sprites, rng)],
            base: Base::new(FLOOR_Y, sprites.base.width() as f64),
            score: 0,
            ticks: 0,
            last_snapshot: None,
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn alive(&self) -> usize {
        self.contestants.len()
    }

    pub fn contestants(&self) -> &[Contestant] {
        &self.contestants
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn scene<'a>(&'a self, session: &'a Session) -> Scene<'a> {
        Scene {
            sprites: &session.sprites,
            birds: self.contestants.iter().map(|c| &c.bird).collect(),
            pipes: &self.pipes,
            base: &self.base,
            target: self
                .contestants
                .first()
                .and_then(|lead| pipe::target(&self.pipes, lead.bird.x, &session.sprites)),
            score: self.score,
            generation: session.generation(),
        }
    }

    /// Advances the world by one fixed step. `genomes` must be the slice the
    /// trial was created with.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        session: &Session,
        genomes: &mut [Genome],
        rng: &mut R,
        sink: &mut dyn GenomeSink,
        renderer: &mut dyn Renderer,
    ) -> TrialState {
        if self.state == TrialState::Terminated {
            return self.state;
        }
        self.ticks += 1;
        let game = &session.config.game;
        let sprites = &session.sprites;

        // The lead bird picks the pipe everyone steers for.
        let target = self
            .contestants
            .first()
            .and_then(|lead| pipe::target(&self.pipes, lead.bird.x, sprites));
        for contestant in &mut self.contestants {
            genomes[contestant.genome].fitness += game.fitness_per_tick;
            contestant.bird.step();

            if let Some(target) = target {
                let bird = &contestant.bird;
                let inputs = [
                    bird.y,
                    (bird.y - target.height).abs(),
                    (bird.y - target.bottom).abs(),
                ];
                let output = contestant.controller.activate(&inputs);
                if output.first().is_some_and(|&o| o > game.jump_threshold) {
                    contestant.bird.jump();
                }
            }
        }

        self.base.advance();

        let mut passed = false;
        let mut next_pipes = Vec::with_capacity(self.pipes.len() + 1);
        for mut pipe in std::mem::take(&mut self.pipes) {
            pipe.advance();

            let (hit, clear): (Vec<Contestant>, Vec<Contestant>) =
                std::mem::take(&mut self.contestants)
                    .into_iter()
                    .partition(|c| pipe.collides_with(&c.bird, sprites));
            for contestant in &hit {
                let genome = &mut genomes[contestant.genome];
                genome.fitness -= game.collision_penalty;
                debug!(genome = genome.id, tick = self.ticks, "bird hit a pipe");
            }
            self.contestants = clear;

            if let Some(lead) = self.contestants.first() {
                if !pipe.passed && pipe.x < lead.bird.x {
                    pipe.passed = true;
                    passed = true;
                }
            }

            if !pipe.is_off_screen(sprites) {
                next_pipes.push(pipe);
            }
        }

        if passed {
            self.score += 1;
            for contestant in &self.contestants {
                genomes[contestant.genome].fitness += game.pass_bonus;
            }
            next_pipes.push(Pipe::new(SPAWN_X, sprites, rng));
            debug!(score = self.score, alive = self.contestants.len(), "pipe passed");
        }
        self.pipes = next_pipes;

        self.contestants.retain(|c| {
            let bird = &c.bird;
            bird.y + bird.frame_height(sprites) - FLOOR_SLACK < FLOOR_Y && bird.y >= CEILING_Y
        });

        for contestant in &mut self.contestants {
            contestant.bird.animate();
        }
        renderer.draw(&self.scene(session));

        self.snapshot(game, genomes, sink);

        let stop_early = game.stop_on_snapshot && self.last_snapshot.is_some();
        if self.contestants.is_empty() || stop_early {
            self.state = TrialState::Terminated;
            debug!(score = self.score, ticks = self.ticks, "trial over");
        }
        self.state
    }

    /// Saves the weakest survivor once for each score above the threshold.
    fn snapshot(&mut self, game: &GameConfig, genomes: &[Genome], sink: &mut dyn GenomeSink) {
        if self.score <= game.snapshot_score || self.last_snapshot == Some(self.score) {
            return;
        }
        let Some(index) = weakest_survivor(&self.contestants, genomes) else {
            return;
        };
        self.last_snapshot = Some(self.score);

        let genome = &genomes[index];
        match sink.save(genome) {
            Ok(()) => info!(
                genome = genome.id,
                fitness = genome.fitness,
                score = self.score,
                "saved genome snapshot"
            ),
            Err(err) => warn!(%err, "genome snapshot failed"),
        }
    }
}

/// Genome index of the surviving contestant with the lowest fitness; the
/// earliest seated wins ties.
pub fn weakest_survivor(contestants: &[Contestant], genomes: &[Genome]) -> Option<usize> {
    contestants
        .iter()
        .map(|c| c.genome)
        .reduce(|best, i| if genomes[i].fitness < genomes[best].fitness { i } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bird::START_X;
    use crate::config::{Config, NeatConfig};
    use crate::genome::Innovations;
    use crate::render::NullRenderer;
    use crate::snapshot::{Discard, SnapshotError};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::rngs::mock::StepRng;

    #[derive(Default)]
    struct Recording(Vec<u64>);

    impl GenomeSink for Recording {
        fn save(&mut self, genome: &Genome) -> Result<(), SnapshotError> {
            self.0.push(genome.id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting(usize);

    impl Renderer for Counting {
        fn draw(&mut self, _scene: &Scene<'_>) {
            self.0 += 1;
        }
    }

    fn genomes(n: usize) -> Vec<Genome> {
        let config = NeatConfig::default();
        let mut innovations = Innovations::new(config.num_inputs, config.num_outputs);
        let mut rng = SmallRng::seed_from_u64(0);
        (0..n as u64)
            .map(|id| Genome::minimal(id, &config, &mut innovations, &mut rng))
            .collect()
    }

    fn never_jump() -> Box<dyn Controller> {
        Box::new(|_: &[f64]| vec![0.0])
    }

    /// Jumps whenever the bird is in the lower part of the gap; with every
    /// gap spanning 50..250 this keeps it between roughly 74 and 186.
    fn gap_follower() -> Box<dyn Controller> {
        Box::new(|inputs: &[f64]| vec![if inputs[1] - inputs[2] > 40.0 { 1.0 } else { 0.0 }])
    }

    /// Hovers low enough to fly into the lower pipe.
    fn low_flyer() -> Box<dyn Controller> {
        Box::new(|inputs: &[f64]| vec![if inputs[0] > 400.0 { 1.0 } else { 0.0 }])
    }

    fn run_until(
        trial: &mut Trial,
        session: &Session,
        genomes: &mut [Genome],
        rng: &mut StepRng,
        sink: &mut dyn GenomeSink,
        mut done: impl FnMut(&Trial) -> bool,
    ) {
        for _ in 0..10_000 {
            if done(trial) || trial.state() == TrialState::Terminated {
                return;
            }
            trial.tick(session, genomes, rng, sink, &mut NullRenderer);
        }
        panic!("condition not reached");
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn birds_that_never_flap_hit_the_floor() {
        let session = Session::new(Config::default());
        let mut genomes = genomes(3);
        let mut rng = StepRng::new(0, 0);
        let controllers = vec![never_jump(), never_jump(), never_jump()];
        let mut trial = Trial::new(&session, &mut genomes, controllers, &mut rng);

        let mut renderer = Counting::default();
        while trial.tick(&session, &mut genomes, &mut rng, &mut Discard, &mut renderer)
            == TrialState::Running
        {}

        assert_eq!(trial.alive(), 0);
        assert_eq!(trial.score(), 0);
        assert_eq!(renderer.0 as u64, trial.ticks());
        // 350 -> 371 in three ticks, then 16 px a tick until y + 38 >= 730.
        assert_eq!(trial.ticks(), 24);
        for genome in &genomes {
            assert!(close(genome.fitness, 2.4), "{}", genome.fitness);
        }
    }

    #[test]
    fn collision_penalty_lands_on_the_colliding_genome() {
        let session = Session::new(Config::default());
        let mut genomes = genomes(2);
        let mut rng = StepRng::new(0, 0);
        let controllers = vec![gap_follower(), low_flyer()];
        let mut trial = Trial::new(&session, &mut genomes, controllers, &mut rng);

        run_until(&mut trial, &session, &mut genomes, &mut rng, &mut Discard, |t| t.alive() < 2);

        let ticks = trial.ticks() as f64;
        assert_eq!(trial.alive(), 1);
        assert_eq!(trial.contestants()[0].genome, 0);
        assert_eq!(trial.score(), 0);
        assert!(close(genomes[0].fitness, 0.1 * ticks));
        assert!(close(genomes[1].fitness, 0.1 * ticks - 1.0));
    }

    #[test]
    fn passing_a_pipe_scores_and_spawns_the_next() {
        let session = Session::new(Config::default());
        let mut genomes = genomes(1);
        let mut rng = StepRng::new(0, 0);
        let mut trial = Trial::new(&session, &mut genomes, vec![gap_follower()], &mut rng);

        run_until(&mut trial, &session, &mut genomes, &mut rng, &mut Discard, |t| t.ticks() == 94);
        assert_eq!(trial.pipes()[0].x, START_X);
        assert!(!trial.pipes()[0].passed);
        assert_eq!(trial.score(), 0);

        trial.tick(&session, &mut genomes, &mut rng, &mut Discard, &mut NullRenderer);
        assert_eq!(trial.score(), 1);
        assert!(trial.pipes()[0].passed);
        assert_eq!(trial.pipes().len(), 2);
        assert_eq!(trial.pipes()[1].x, SPAWN_X);
        assert!(close(genomes[0].fitness, 9.5 + 5.0));
    }

    #[test]
    fn snapshot_fires_once_per_score_above_threshold() {
        let mut config = Config::default();
        config.game.snapshot_score = 0;
        let session = Session::new(config);
        let mut genomes = genomes(2);
        let mut rng = StepRng::new(0, 0);
        let controllers = vec![gap_follower(), gap_follower()];
        let mut trial = Trial::new(&session, &mut genomes, controllers, &mut rng);
        let mut sink = Recording::default();

        // Give genome 0 a head start so genome 1 is the weakest.
        genomes[0].fitness = 50.0;
        run_until(&mut trial, &session, &mut genomes, &mut rng, &mut sink, |t| t.score() == 1);
        assert_eq!(sink.0, vec![genomes[1].id]);

        for _ in 0..10 {
            trial.tick(&session, &mut genomes, &mut rng, &mut sink, &mut NullRenderer);
        }
        assert_eq!(sink.0.len(), 1);

        run_until(&mut trial, &session, &mut genomes, &mut rng, &mut sink, |t| t.score() == 2);
        assert_eq!(sink.0, vec![genomes[1].id, genomes[1].id]);
        assert_eq!(trial.state(), TrialState::Running);
    }

    #[test]
    fn stop_on_snapshot_ends_the_trial() {
        let mut config = Config::default();
        config.game.snapshot_score = 0;
        config.game.stop_on_snapshot = true;
        let session = Session::new(config);
        let mut genomes = genomes(1);
        let mut rng = StepRng::new(0, 0);
        let mut trial = Trial::new(&session, &mut genomes, vec![gap_follower()], &mut rng);
        let mut sink = Recording::default();

        run_until(&mut trial, &session, &mut genomes, &mut rng, &mut sink, |_| false);
        assert_eq!(trial.state(), TrialState::Terminated);
        assert_eq!(trial.score(), 1);
        assert_eq!(trial.alive(), 1);
        assert_eq!(sink.0.len(), 1);
    }

    #[test]
    fn empty_generation_is_already_over() {
        let session = Session::new(Config::default());
        let mut rng = StepRng::new(0, 0);
        let mut trial = Trial::new(&session, &mut [], Vec::new(), &mut rng);
        assert_eq!(trial.state(), TrialState::Terminated);
        let state = trial.tick(&session, &mut [], &mut rng, &mut Discard, &mut NullRenderer);
        assert_eq!(state, TrialState::Terminated);
        assert_eq!(trial.ticks(), 0);
    }

    #[test]
    fn weakest_survivor_prefers_the_earliest_on_ties() {
        let session = Session::new(Config::default());
        let mut genomes = genomes(3);
        let mut rng = StepRng::new(0, 0);
        let controllers = vec![never_jump(), never_jump(), never_jump()];
        let trial = Trial::new(&session, &mut genomes, controllers, &mut rng);

        assert_eq!(weakest_survivor(trial.contestants(), &genomes), Some(0));
        genomes[0].fitness = 3.0;
        genomes[1].fitness = -1.0;
        genomes[2].fitness = -1.0;
        assert_eq!(weakest_survivor(trial.contestants(), &genomes), Some(1));
        assert_eq!(weakest_survivor(&[], &genomes), None);
    }
}
