use crate::config::NeatConfig;
use crate::controller::{Controller, FeedForwardNetwork};
use crate::genome::{Genome, Innovations};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Supplies genomes and their controllers to the trial runner and breeds the
/// next generation from the fitness written back onto them.
pub trait EvolutionProvider {
    fn genomes(&self) -> &[Genome];
    fn genomes_mut(&mut self) -> &mut [Genome];
    /// Number of completed `evolve` calls.
    fn generation(&self) -> u32;
    /// One controller per genome, index-aligned with `genomes()`.
    fn controllers(&self) -> Vec<Box<dyn Controller>>;
    /// Replaces the current generation with its offspring.
    fn evolve(&mut self);
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationStats {
    pub generation: u32,
    pub population: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub best_genome: u64,
    pub best_hidden: usize,
    pub best_connections: usize,
}

impl GenerationStats {
    pub fn from_genomes(generation: u32, genomes: &[Genome]) -> Self {
        let best = genomes.iter().max_by(|a, b| a.fitness.total_cmp(&b.fitness));
        let mean = if genomes.is_empty() {
            0.0
        } else {
            genomes.iter().map(|g| g.fitness).sum::<f64>() / genomes.len() as f64
        };
        Self {
            generation,
            population: genomes.len(),
            best_fitness: best.map_or(0.0, |g| g.fitness),
            mean_fitness: mean,
            best_genome: best.map_or(0, |g| g.id),
            best_hidden: best.map_or(0, |g| g.hidden_count()),
            best_connections: best.map_or(0, |g| g.enabled_connections().count()),
        }
    }
}

struct Offspring {
    id: u64,
    fitter: usize,
    mate: Option<usize>,
    seed: u64,
}

/// Default provider: elitism, tournament selection, crossover and mutation.
pub struct Population {
    config: NeatConfig,
    genomes: Vec<Genome>,
    innovations: Innovations,
    generation: u32,
    next_id: u64,
    rng: SmallRng,
}

impl Population {
    pub fn new(config: NeatConfig, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut innovations = Innovations::new(config.num_inputs, config.num_outputs);
        let genomes: Vec<Genome> = (0..config.population_size as u64)
            .map(|id| Genome::minimal(id, &config, &mut innovations, &mut rng))
            .collect();
        Self {
            next_id: genomes.len() as u64,
            config,
            genomes,
            innovations,
            generation: 0,
            rng,
        }
    }

    pub fn config(&self) -> &NeatConfig {
        &self.config
    }

    fn tournament(&mut self, pool: &[usize]) -> usize {
        let mut best = pool[self.rng.gen_range(0..pool.len())];
        for _ in 1..self.config.tournament_size {
            let challenger = pool[self.rng.gen_range(0..pool.len())];
            if self.genomes[challenger].fitness > self.genomes[best].fitness {
                best = challenger;
            }
        }
        best
    }
}

impl EvolutionProvider for Population {
    fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    fn genomes_mut(&mut self) -> &mut [Genome] {
        &mut self.genomes
    }

    fn generation(&self) -> u32 {
        self.generation
    }

    fn controllers(&self) -> Vec<Box<dyn Controller>> {
        self.genomes
            .par_iter()
            .map(|g| Box::new(FeedForwardNetwork::from_genome(g)) as Box<dyn Controller>)
            .collect()
    }

    fn evolve(&mut self) {
        let size = self.config.population_size;

        let mut ranked: Vec<usize> = (0..self.genomes.len()).collect();
        ranked.sort_by(|&a, &b| self.genomes[b].fitness.total_cmp(&self.genomes[a].fitness));

        let elites: Vec<Genome> = ranked
            .iter()
            .take(self.config.elitism.min(size))
            .map(|&i| self.genomes[i].clone())
            .collect();

        let cutoff = ((ranked.len() as f64 * self.config.survival_threshold).ceil() as usize)
            .max(2)
            .min(ranked.len());
        let pool: Vec<usize> = ranked[..cutoff].to_vec();

        let mut plans = Vec::with_capacity(size.saturating_sub(elites.len()));
        for _ in elites.len()..size {
            let fitter = self.tournament(&pool);
            let mate = if self.rng.r#gen::<f64>() < self.config.crossover_rate {
                let other = self.tournament(&pool);
                (other != fitter).then_some(other)
            } else {
                None
            };
            let id = self.next_id;
            self.next_id += 1;
            plans.push(Offspring {
                id,
                fitter,
                mate,
                seed: self.rng.r#gen(),
            });
        }

        let parents = &self.genomes;
        let config = &self.config;
        let mut children: Vec<Genome> = plans
            .par_iter()
            .map(|plan| {
                let mut rng = SmallRng::seed_from_u64(plan.seed);
                let mut child = match plan.mate {
                    Some(mate) => {
                        let (a, b) = (&parents[plan.fitter], &parents[mate]);
                        let (fitter, other) = if b.fitness > a.fitness { (b, a) } else { (a, b) };
                        Genome::crossover(fitter, other, plan.id, &mut rng)
                    }
                    None => Genome {
                        id: plan.id,
                        fitness: 0.0,
                        ..parents[plan.fitter].clone()
                    },
                };
                child.mutate_weights(config, &mut rng);
                child
            })
            .collect();

        for child in &mut children {
            child.mutate_structure(&self.config, &mut self.innovations, &mut self.rng);
        }

        self.genomes = elites.into_iter().chain(children).collect();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> NeatConfig {
        NeatConfig {
            population_size: 10,
            elitism: 2,
            ..NeatConfig::default()
        }
    }

    #[test]
    fn evolve_keeps_population_size_and_elites() {
        let mut population = Population::new(small_config(), 5);
        for (i, genome) in population.genomes_mut().iter_mut().enumerate() {
            genome.fitness = i as f64;
        }
        let champion = population.genomes()[9].clone();

        let stats = GenerationStats::from_genomes(population.generation(), population.genomes());
        population.evolve();
        assert_eq!(stats.generation, 0);
        assert_eq!(stats.best_fitness, 9.0);
        assert_eq!(stats.best_genome, champion.id);
        assert_eq!(stats.mean_fitness, 4.5);

        assert_eq!(population.genomes().len(), 10);
        assert_eq!(population.generation(), 1);
        assert_eq!(population.genomes()[0].id, champion.id);
        assert_eq!(population.genomes()[0].connections, champion.connections);
        assert_eq!(population.genomes()[1].id, 8);
    }

    #[test]
    fn offspring_get_fresh_ids() {
        let mut population = Population::new(small_config(), 5);
        population.evolve();
        let mut ids: Vec<u64> = population.genomes().iter().map(|g| g.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert!(population.genomes()[2..].iter().all(|g| g.id >= 10));
    }

    #[test]
    fn same_seed_breeds_the_same_generation() {
        let run = |seed| {
            let mut population = Population::new(small_config(), seed);
            for (i, genome) in population.genomes_mut().iter_mut().enumerate() {
                genome.fitness = (i * 7 % 10) as f64;
            }
            population.evolve();
            population.genomes().to_vec()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn controllers_align_with_genomes() {
        let population = Population::new(small_config(), 1);
        let controllers = population.controllers();
        assert_eq!(controllers.len(), population.genomes().len());
        for (genome, controller) in population.genomes().iter().zip(&controllers) {
            let direct = FeedForwardNetwork::from_genome(genome).activate(&[1.0, 2.0, 3.0]);
            assert_eq!(controller.activate(&[1.0, 2.0, 3.0]), direct);
        }
    }
}
