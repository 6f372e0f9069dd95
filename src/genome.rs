//! Feed-forward NEAT genomes: node and connection genes plus the mutation
//! and crossover operators the default evolution provider uses.

use crate::config::NeatConfig;
use ahash::{AHashMap, AHashSet};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ADD_CONNECTION_ATTEMPTS: usize = 20;
/// Chance that a gene disabled in either parent stays disabled in the child.
const INHERIT_DISABLED_CHANCE: f64 = 0.75;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeKind {
    Input,
    Output,
    Hidden,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeGene {
    pub id: u32,
    pub kind: NodeKind,
    pub bias: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConnectionGene {
    pub innovation: u32,
    pub input: u32,
    pub output: u32,
    pub weight: f64,
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Genome {
    pub id: u64,
    pub nodes: Vec<NodeGene>,
    pub connections: Vec<ConnectionGene>,
    pub fitness: f64,
}

/// Hands out innovation numbers and node ids so the same structural
/// mutation lines up across genomes of a population.
#[derive(Clone, Debug)]
pub struct Innovations {
    next_innovation: u32,
    next_node: u32,
    connections: AHashMap<(u32, u32), u32>,
    splits: AHashMap<u32, u32>,
}

impl Innovations {
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            next_innovation: 0,
            next_node: (num_inputs + num_outputs) as u32,
            connections: AHashMap::new(),
            splits: AHashMap::new(),
        }
    }

    pub fn connection(&mut self, input: u32, output: u32) -> u32 {
        let next = &mut self.next_innovation;
        *self.connections.entry((input, output)).or_insert_with(|| {
            let innovation = *next;
            *next += 1;
            innovation
        })
    }

    /// Node id for splitting the connection with `innovation`.
    pub fn split(&mut self, innovation: u32) -> u32 {
        let next = &mut self.next_node;
        *self.splits.entry(innovation).or_insert_with(|| {
            let id = *next;
            *next += 1;
            id
        })
    }

    pub fn fresh_node(&mut self) -> u32 {
        let id = self.next_node;
        self.next_node += 1;
        id
    }
}

/// Standard normal sample via Box-Muller.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = rng.r#gen::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

impl Genome {
    /// Every input wired straight to every output.
    pub fn minimal<R: Rng + ?Sized>(
        id: u64,
        config: &NeatConfig,
        innovations: &mut Innovations,
        rng: &mut R,
    ) -> Self {
        let inputs = 0..config.num_inputs as u32;
        let outputs = config.num_inputs as u32..(config.num_inputs + config.num_outputs) as u32;

        let mut nodes = Vec::with_capacity(config.num_inputs + config.num_outputs);
        nodes.extend(inputs.clone().map(|id| NodeGene {
            id,
            kind: NodeKind::Input,
            bias: 0.0,
        }));
        nodes.extend(outputs.clone().map(|id| NodeGene {
            id,
            kind: NodeKind::Output,
            bias: gaussian(rng) * config.weight_init_stdev,
        }));

        let mut connections = Vec::new();
        for output in outputs {
            for input in inputs.clone() {
                connections.push(ConnectionGene {
                    innovation: innovations.connection(input, output),
                    input,
                    output,
                    weight: gaussian(rng) * config.weight_init_stdev,
                    enabled: true,
                });
            }
        }

        Self {
            id,
            nodes,
            connections,
            fitness: 0.0,
        }
    }

    pub fn node(&self, id: u32) -> Option<&NodeGene> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn enabled_connections(&self) -> impl Iterator<Item = &ConnectionGene> {
        self.connections.iter().filter(|c| c.enabled)
    }

    pub fn hidden_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Hidden).count()
    }

    /// Child of `fitter` and `other`. Structure comes from `fitter`;
    /// matching genes take their values from either parent at random.
    pub fn crossover<R: Rng + ?Sized>(fitter: &Genome, other: &Genome, id: u64, rng: &mut R) -> Genome {
        let other_connections: AHashMap<u32, &ConnectionGene> =
            other.connections.iter().map(|c| (c.innovation, c)).collect();
        let other_nodes: AHashMap<u32, &NodeGene> = other.nodes.iter().map(|n| (n.id, n)).collect();

        let connections = fitter
            .connections
            .iter()
            .map(|gene| match other_connections.get(&gene.innovation) {
                Some(mate) => {
                    let mut child = if rng.gen_bool(0.5) { gene.clone() } else { (*mate).clone() };
                    child.enabled = if !gene.enabled || !mate.enabled {
                        !rng.gen_bool(INHERIT_DISABLED_CHANCE)
                    } else {
                        true
                    };
                    child
                }
                None => gene.clone(),
            })
            .collect();

        let nodes = fitter
            .nodes
            .iter()
            .map(|node| match other_nodes.get(&node.id) {
                Some(mate) if rng.gen_bool(0.5) => NodeGene {
                    bias: mate.bias,
                    ..node.clone()
                },
                _ => node.clone(),
            })
            .collect();

        Genome {
            id,
            nodes,
            connections,
            fitness: 0.0,
        }
    }

    pub fn mutate_weights<R: Rng + ?Sized>(&mut self, config: &NeatConfig, rng: &mut R) {
        let bound = config.weight_bound;
        for conn in &mut self.connections {
            if rng.r#gen::<f64>() < config.weight_mutate_rate {
                conn.weight = if rng.r#gen::<f64>() < config.weight_replace_rate {
                    gaussian(rng) * config.weight_init_stdev
                } else {
                    conn.weight + gaussian(rng) * config.weight_mutate_power
                }
                .clamp(-bound, bound);
            }
        }
        for node in self.nodes.iter_mut().filter(|n| n.kind != NodeKind::Input) {
            if rng.r#gen::<f64>() < config.bias_mutate_rate {
                node.bias = (node.bias + gaussian(rng) * config.bias_mutate_power).clamp(-bound, bound);
            }
        }
    }

    pub fn mutate_structure<R: Rng + ?Sized>(
        &mut self,
        config: &NeatConfig,
        innovations: &mut Innovations,
        rng: &mut R,
    ) {
        if rng.r#gen::<f64>() < config.add_node_rate {
            self.add_node(innovations, rng);
        }
        if rng.r#gen::<f64>() < config.add_connection_rate {
            self.add_connection(config, innovations, rng);
        }
        if !self.connections.is_empty() && rng.r#gen::<f64>() < config.toggle_enable_rate {
            let idx = rng.gen_range(0..self.connections.len());
            self.connections[idx].enabled = !self.connections[idx].enabled;
        }
    }

    /// Splits a random enabled connection with a new hidden node.
    pub fn add_node<R: Rng + ?Sized>(&mut self, innovations: &mut Innovations, rng: &mut R) -> Option<u32> {
        let enabled: Vec<usize> = (0..self.connections.len())
            .filter(|&i| self.connections[i].enabled)
            .collect();
        if enabled.is_empty() {
            return None;
        }
        let idx = enabled[rng.gen_range(0..enabled.len())];
        let split = self.connections[idx].clone();
        self.connections[idx].enabled = false;

        let mut node_id = innovations.split(split.innovation);
        if self.node(node_id).is_some() {
            node_id = innovations.fresh_node();
        }
        self.nodes.push(NodeGene {
            id: node_id,
            kind: NodeKind::Hidden,
            bias: 0.0,
        });
        self.connections.push(ConnectionGene {
            innovation: innovations.connection(split.input, node_id),
            input: split.input,
            output: node_id,
            weight: 1.0,
            enabled: true,
        });
        self.connections.push(ConnectionGene {
            innovation: innovations.connection(node_id, split.output),
            input: node_id,
            output: split.output,
            weight: split.weight,
            enabled: true,
        });
        Some(node_id)
    }

    /// Adds a connection that keeps the network acyclic.
    pub fn add_connection<R: Rng + ?Sized>(
        &mut self,
        config: &NeatConfig,
        innovations: &mut Innovations,
        rng: &mut R,
    ) -> Option<u32> {
        let sources: Vec<u32> = self
            .nodes
            .iter()
            .filter(|n| n.kind != NodeKind::Output)
            .map(|n| n.id)
            .collect();
        let targets: Vec<u32> = self
            .nodes
            .iter()
            .filter(|n| n.kind != NodeKind::Input)
            .map(|n| n.id)
            .collect();
        if sources.is_empty() || targets.is_empty() {
            return None;
        }

        for _ in 0..ADD_CONNECTION_ATTEMPTS {
            let input = sources[rng.gen_range(0..sources.len())];
            let output = targets[rng.gen_range(0..targets.len())];
            if input == output
                || self.connections.iter().any(|c| c.input == input && c.output == output)
                || self.creates_cycle(input, output)
            {
                continue;
            }
            let innovation = innovations.connection(input, output);
            self.connections.push(ConnectionGene {
                innovation,
                input,
                output,
                weight: gaussian(rng) * config.weight_init_stdev,
                enabled: true,
            });
            return Some(innovation);
        }
        None
    }

    /// Whether `input -> output` would close a loop, counting disabled genes
    /// too since they may be re-enabled later.
    pub fn creates_cycle(&self, input: u32, output: u32) -> bool {
        if input == output {
            return true;
        }
        let mut visited = AHashSet::new();
        let mut stack = vec![output];
        while let Some(node) = stack.pop() {
            if node == input {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.extend(self.connections.iter().filter(|c| c.input == node).map(|c| c.output));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn setup() -> (NeatConfig, Innovations, SmallRng) {
        let config = NeatConfig::default();
        let innovations = Innovations::new(config.num_inputs, config.num_outputs);
        (config, innovations, SmallRng::seed_from_u64(3))
    }

    fn assert_acyclic(genome: &Genome) {
        for conn in &genome.connections {
            let mut without = genome.clone();
            without.connections.retain(|c| c.innovation != conn.innovation);
            assert!(
                !without.creates_cycle(conn.input, conn.output),
                "cycle through {conn:?}"
            );
        }
    }

    #[test]
    fn minimal_genome_is_fully_connected() {
        let (config, mut innovations, mut rng) = setup();
        let genome = Genome::minimal(0, &config, &mut innovations, &mut rng);
        assert_eq!(genome.nodes.len(), 4);
        assert_eq!(genome.connections.len(), 3);
        assert!(genome.connections.iter().all(|c| c.output == 3 && c.enabled));

        let twin = Genome::minimal(1, &config, &mut innovations, &mut rng);
        let a: Vec<u32> = genome.connections.iter().map(|c| c.innovation).collect();
        let b: Vec<u32> = twin.connections.iter().map(|c| c.innovation).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn add_node_splits_a_connection() {
        let (config, mut innovations, mut rng) = setup();
        let mut genome = Genome::minimal(0, &config, &mut innovations, &mut rng);
        let node = genome.add_node(&mut innovations, &mut rng).unwrap();

        assert_eq!(genome.hidden_count(), 1);
        assert_eq!(genome.connections.iter().filter(|c| !c.enabled).count(), 1);
        assert!(genome.connections.iter().any(|c| c.output == node && c.weight == 1.0));
        assert!(genome.connections.iter().any(|c| c.input == node && c.output == 3));
    }

    #[test]
    fn same_split_gets_same_node_id_across_genomes() {
        let (config, mut innovations, mut rng) = setup();
        let mut a = Genome::minimal(0, &config, &mut innovations, &mut rng);
        let mut b = a.clone();
        b.id = 1;
        // Single enabled connection left, so both split the same gene.
        for g in [&mut a, &mut b] {
            g.connections[1].enabled = false;
            g.connections[2].enabled = false;
        }
        let na = a.add_node(&mut innovations, &mut rng);
        let nb = b.add_node(&mut innovations, &mut rng);
        assert_eq!(na, nb);
    }

    #[test]
    fn structural_mutation_never_creates_cycles() {
        let (mut config, mut innovations, mut rng) = setup();
        config.add_node_rate = 0.6;
        config.add_connection_rate = 0.9;
        let mut genome = Genome::minimal(0, &config, &mut innovations, &mut rng);
        for _ in 0..200 {
            genome.mutate_structure(&config, &mut innovations, &mut rng);
        }
        assert!(genome.hidden_count() > 0);
        assert_acyclic(&genome);
    }

    #[test]
    fn weights_stay_within_bound() {
        let (mut config, mut innovations, mut rng) = setup();
        config.weight_mutate_power = 50.0;
        config.weight_mutate_rate = 1.0;
        let mut genome = Genome::minimal(0, &config, &mut innovations, &mut rng);
        for _ in 0..50 {
            genome.mutate_weights(&config, &mut rng);
        }
        assert!(genome.connections.iter().all(|c| c.weight.abs() <= config.weight_bound));
        assert!(genome.nodes.iter().all(|n| n.bias.abs() <= config.weight_bound));
    }

    #[test]
    fn crossover_keeps_fitter_structure() {
        let (config, mut innovations, mut rng) = setup();
        let mut fitter = Genome::minimal(0, &config, &mut innovations, &mut rng);
        let other = Genome::minimal(1, &config, &mut innovations, &mut rng);
        fitter.add_node(&mut innovations, &mut rng);

        let child = Genome::crossover(&fitter, &other, 9, &mut rng);
        assert_eq!(child.id, 9);
        assert_eq!(child.fitness, 0.0);
        let fitter_ids: Vec<u32> = fitter.connections.iter().map(|c| c.innovation).collect();
        let child_ids: Vec<u32> = child.connections.iter().map(|c| c.innovation).collect();
        assert_eq!(fitter_ids, child_ids);
        assert_eq!(child.nodes.len(), fitter.nodes.len());
        for conn in &child.connections {
            let from_fitter = fitter.connections.iter().any(|c| c.weight == conn.weight);
            let from_other = other.connections.iter().any(|c| c.weight == conn.weight);
            assert!(from_fitter || from_other);
        }
    }
}
