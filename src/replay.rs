use crate::controller::{Controller, FeedForwardNetwork};
use crate::genome::Genome;
use crate::render::Renderer;
use crate::session::Session;
use crate::snapshot::Discard;
use crate::trainer::{Driver, Progress};
use crate::trial::{Trial, TrialState};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::info;

/// Flies a single saved genome until it crashes or `max_ticks` elapse.
pub struct Replay {
    session: Session,
    genomes: Vec<Genome>,
    trial: Trial,
    rng: SmallRng,
    max_ticks: Option<u64>,
    finished: bool,
}

impl Replay {
    pub fn new(mut session: Session, genome: Genome, seed: u64, max_ticks: Option<u64>) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let controller: Box<dyn Controller> = Box::new(FeedForwardNetwork::from_genome(&genome));
        let mut genomes = vec![genome];
        session.begin_generation();
        let trial = Trial::new(&session, &mut genomes, vec![controller], &mut rng);
        Self {
            session,
            genomes,
            trial,
            rng,
            max_ticks,
            finished: false,
        }
    }

    pub fn trial(&self) -> &Trial {
        &self.trial
    }

    pub fn genome(&self) -> &Genome {
        &self.genomes[0]
    }

    pub fn run_headless(&mut self, renderer: &mut dyn Renderer) -> u32 {
        while self.tick(renderer) == Progress::Running {}
        self.trial.score()
    }
}

impl Driver for Replay {
    fn tick(&mut self, renderer: &mut dyn Renderer) -> Progress {
        if self.finished {
            return Progress::Finished;
        }
        let state = self.trial.tick(
            &self.session,
            &mut self.genomes,
            &mut self.rng,
            &mut Discard,
            renderer,
        );
        let out_of_time = self.max_ticks.is_some_and(|max| self.trial.ticks() >= max);
        if state == TrialState::Terminated || out_of_time {
            self.finished = true;
            info!(
                genome = self.genomes[0].id,
                score = self.trial.score(),
                ticks = self.trial.ticks(),
                crashed = state == TrialState::Terminated,
                "replay finished"
            );
            return Progress::Finished;
        }
        Progress::Running
    }

    fn session(&self) -> &Session {
        &self.session
    }
}
