//! Generation loop: run a trial, hand the scored genomes back to the
//! evolution provider, repeat.

use crate::evolution::{EvolutionProvider, GenerationStats};
use crate::genome::Genome;
use crate::render::Renderer;
use crate::session::Session;
use crate::snapshot::GenomeSink;
use crate::trial::{Trial, TrialState};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Running,
    Finished,
}

/// Something the window loop can step one tick at a time.
pub trait Driver {
    fn tick(&mut self, renderer: &mut dyn Renderer) -> Progress;
    fn session(&self) -> &Session;
}

pub struct Trainer<P: EvolutionProvider> {
    session: Session,
    provider: P,
    trial: Trial,
    rng: SmallRng,
    sink: Box<dyn GenomeSink>,
    history: Vec<GenerationStats>,
    champion: Option<Genome>,
    finished: bool,
}

impl<P: EvolutionProvider> Trainer<P> {
    pub fn new(mut session: Session, mut provider: P, sink: Box<dyn GenomeSink>, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let trial = start_trial(&mut session, &mut provider, &mut rng);
        Self {
            session,
            provider,
            trial,
            rng,
            sink,
            history: Vec::new(),
            champion: None,
            finished: false,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn trial(&self) -> &Trial {
        &self.trial
    }

    /// Stats of every finished generation, oldest first.
    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    /// Fittest genome seen in any finished generation.
    pub fn champion(&self) -> Option<&Genome> {
        self.champion.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn run_headless(&mut self, renderer: &mut dyn Renderer) -> Option<&Genome> {
        while self.tick(renderer) == Progress::Running {}
        self.champion()
    }

    fn finish_generation(&mut self) -> Progress {
        let genomes = self.provider.genomes();
        let stats = GenerationStats::from_genomes(self.provider.generation(), genomes);
        if let Some(best) = genomes.iter().max_by(|a, b| a.fitness.total_cmp(&b.fitness)) {
            if self.champion.as_ref().is_none_or(|c| best.fitness > c.fitness) {
                self.champion = Some(best.clone());
            }
        }

        info!(
            generation = self.session.generation(),
            score = self.trial.score(),
            ticks = self.trial.ticks(),
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            hidden = stats.best_hidden,
            connections = stats.best_connections,
            "generation finished"
        );
        self.history.push(stats);

        let neat = &self.session.config.neat;
        let solved = neat
            .fitness_threshold
            .zip(self.history.last())
            .is_some_and(|(threshold, stats)| stats.best_fitness >= threshold);
        if solved || self.session.generation() >= neat.generations {
            self.finished = true;
            if let Some(champion) = &self.champion {
                info!(
                    genome = champion.id,
                    fitness = champion.fitness,
                    solved,
                    "training finished"
                );
            }
            return Progress::Finished;
        }

        self.provider.evolve();
        self.trial = start_trial(&mut self.session, &mut self.provider, &mut self.rng);
        Progress::Running
    }
}

fn start_trial<P: EvolutionProvider>(session: &mut Session, provider: &mut P, rng: &mut SmallRng) -> Trial {
    let generation = session.begin_generation();
    debug!(generation, population = provider.genomes().len(), "starting trial");
    let controllers = provider.controllers();
    Trial::new(session, provider.genomes_mut(), controllers, rng)
}

impl<P: EvolutionProvider> Driver for Trainer<P> {
    fn tick(&mut self, renderer: &mut dyn Renderer) -> Progress {
        if self.finished {
            return Progress::Finished;
        }
        let state = self.trial.tick(
            &self.session,
            self.provider.genomes_mut(),
            &mut self.rng,
            self.sink.as_mut(),
            renderer,
        );
        match state {
            TrialState::Running => Progress::Running,
            TrialState::Terminated => self.finish_generation(),
        }
    }

    fn session(&self) -> &Session {
        &self.session
    }
}
