use crate::genome::{Genome, NodeKind};
use ahash::AHashMap;

/// Maps a fixed-size observation to control outputs.
pub trait Controller: Send {
    fn activate(&self, inputs: &[f64]) -> Vec<f64>;
}

impl<F> Controller for F
where
    F: Fn(&[f64]) -> Vec<f64> + Send,
{
    fn activate(&self, inputs: &[f64]) -> Vec<f64> {
        self(inputs)
    }
}

pub fn sigmoid(z: f64) -> f64 {
    let z = (4.9 * z).clamp(-60.0, 60.0);
    1.0 / (1.0 + (-z).exp())
}

#[derive(Clone, Debug)]
struct NodeEval {
    slot: usize,
    bias: f64,
    links: Vec<(usize, f64)>,
}

/// Network compiled from a genome into dense slots evaluated in
/// topological order.
#[derive(Clone, Debug)]
pub struct FeedForwardNetwork {
    input_slots: Vec<usize>,
    output_slots: Vec<usize>,
    evals: Vec<NodeEval>,
    slots: usize,
}

impl FeedForwardNetwork {
    pub fn from_genome(genome: &Genome) -> Self {
        let slot_of: AHashMap<u32, usize> = genome
            .nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.id, slot))
            .collect();

        let mut incoming: AHashMap<u32, Vec<(usize, f64)>> = AHashMap::new();
        let mut pending: AHashMap<u32, usize> = AHashMap::new();
        for conn in genome.enabled_connections() {
            let Some(&src) = slot_of.get(&conn.input) else {
                continue;
            };
            if !slot_of.contains_key(&conn.output) {
                continue;
            }
            incoming.entry(conn.output).or_default().push((src, conn.weight));
            *pending.entry(conn.output).or_default() += 1;
        }

        // Kahn's algorithm seeded with every node that has no enabled inputs.
        let mut ready: Vec<u32> = genome
            .nodes
            .iter()
            .filter(|n| !pending.contains_key(&n.id))
            .map(|n| n.id)
            .collect();
        let mut order = Vec::with_capacity(genome.nodes.len());
        while let Some(id) = ready.pop() {
            order.push(id);
            for conn in genome.enabled_connections().filter(|c| c.input == id) {
                if let Some(count) = pending.get_mut(&conn.output) {
                    *count -= 1;
                    if *count == 0 {
                        pending.remove(&conn.output);
                        ready.push(conn.output);
                    }
                }
            }
        }

        let evals = order
            .into_iter()
            .filter_map(|id| {
                let node = genome.node(id)?;
                (node.kind != NodeKind::Input).then(|| NodeEval {
                    slot: slot_of[&id],
                    bias: node.bias,
                    links: incoming.remove(&id).unwrap_or_default(),
                })
            })
            .collect();

        let slots_of_kind = |kind: NodeKind| -> Vec<usize> {
            genome
                .nodes
                .iter()
                .filter(|n| n.kind == kind)
                .map(|n| slot_of[&n.id])
                .collect()
        };

        Self {
            input_slots: slots_of_kind(NodeKind::Input),
            output_slots: slots_of_kind(NodeKind::Output),
            evals,
            slots: genome.nodes.len(),
        }
    }
}

impl Controller for FeedForwardNetwork {
    fn activate(&self, inputs: &[f64]) -> Vec<f64> {
        debug_assert_eq!(inputs.len(), self.input_slots.len());
        let mut values = vec![0.0; self.slots];
        for (&slot, &value) in self.input_slots.iter().zip(inputs) {
            values[slot] = value;
        }
        for eval in &self.evals {
            let sum: f64 = eval.links.iter().map(|&(src, w)| values[src] * w).sum();
            values[eval.slot] = sigmoid(eval.bias + sum);
        }
        self.output_slots.iter().map(|&slot| values[slot]).collect()
    }
}
