//! A single isolation tree stored as a flat node arena.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::DetectError;

// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Node {
    Split {
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// Root is always `nodes[0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    /// Grow a tree on `samples` with random splits down to `max_depth`.
    pub(crate) fn grow<R: Rng + ?Sized>(samples: &[f64], max_depth: usize, rng: &mut R) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut work = samples.to_vec();
        tree.build(&mut work, 0, max_depth, rng);
        tree
    }

    fn build<R: Rng + ?Sized>(
        &mut self,
        values: &mut [f64],
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> usize {
        let index = self.nodes.len();
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if depth >= max_depth || values.len() <= 1 || min >= max {
            self.nodes.push(Node::Leaf { size: values.len() });
            return index;
        }

        let threshold = rng.gen_range(min..max);

        // Reserve the slot; children are appended after it.
        self.nodes.push(Node::Leaf { size: 0 });

        let mut boundary = 0;
        for j in 0..values.len() {
            if values[j] <= threshold {
                values.swap(boundary, j);
                boundary += 1;
            }
        }
        let (lo, hi) = values.split_at_mut(boundary);

        let left = self.build(lo, depth + 1, max_depth, rng);
        let right = self.build(hi, depth + 1, max_depth, rng);
        self.nodes[index] = Node::Split {
            threshold,
            left,
            right,
        };
        index
    }

    /// Depth of the leaf `x` falls into, adjusted for the unbuilt subtree below it.
    pub(crate) fn path_length(&self, x: f64) -> Result<f64, DetectError> {
        let mut index = 0;
        let mut depth = 0usize;
        loop {
            match self.nodes.get(index) {
                Some(Node::Split {
                    threshold,
                    left,
                    right,
                }) => {
                    let next = if x <= *threshold { *left } else { *right };
                    // Children always sit after their parent, so the walk terminates.
                    if next <= index {
                        return Err(DetectError::CorruptModel(format!(
                            "node {} points back to node {}",
                            index, next
                        )));
                    }
                    index = next;
                    depth += 1;
                }
                Some(Node::Leaf { size }) => return Ok(depth as f64 + average_path_length(*size)),
                None => {
                    return Err(DetectError::CorruptModel(format!(
                        "node index {} out of range ({} nodes)",
                        index,
                        self.nodes.len()
                    )))
                }
            }
        }
    }

    /// Check the arena invariants a grown tree always satisfies.
    pub(crate) fn validate(&self) -> Result<(), DetectError> {
        if self.nodes.is_empty() {
            return Err(DetectError::CorruptModel("tree has no nodes".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                threshold,
                left,
                right,
            } = node
            {
                if !threshold.is_finite() {
                    return Err(DetectError::CorruptModel(format!(
                        "node {} has non-finite threshold",
                        index
                    )));
                }
                for child in [*left, *right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(DetectError::CorruptModel(format!(
                            "node {} has invalid child {} ({} nodes)",
                            index,
                            child,
                            self.nodes.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Average path length of an unsuccessful search in a binary search tree of `n` nodes.
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) is roughly 10.24
        let c = average_path_length(256);
        assert!(c > 10.0 && c < 10.5, "c(256) = {}", c);
    }

    #[test]
    fn test_constant_values_make_single_leaf() {
        let mut rng = StdRng::seed_from_u64(7);
        let tree = IsolationTree::grow(&[3.0; 16], 4, &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.path_length(3.0).unwrap(), average_path_length(16));
    }

    #[test]
    fn test_extreme_value_isolates_faster() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut samples: Vec<f64> = (0..64).map(|i| 50.0 + (i % 8) as f64).collect();
        samples.push(400.0);

        let trees: Vec<IsolationTree> = (0..50)
            .map(|_| IsolationTree::grow(&samples, 7, &mut rng))
            .collect();

        let mean = |x: f64| {
            trees.iter().map(|t| t.path_length(x).unwrap()).sum::<f64>() / trees.len() as f64
        };
        assert!(mean(400.0) < mean(53.0));
    }

    #[test]
    fn test_grown_tree_is_valid() {
        let mut rng = StdRng::seed_from_u64(11);
        let samples: Vec<f64> = (0..100).map(|i| (i * 7 % 31) as f64).collect();
        let tree = IsolationTree::grow(&samples, 7, &mut rng);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_empty_tree_is_rejected() {
        let tree = IsolationTree { nodes: Vec::new() };
        assert!(matches!(tree.validate(), Err(DetectError::CorruptModel(_))));
        assert!(matches!(tree.path_length(1.0), Err(DetectError::CorruptModel(_))));
    }

    #[test]
    fn test_out_of_range_child_is_rejected() {
        let tree = IsolationTree {
            nodes: vec![
                Node::Split {
                    threshold: 5.0,
                    left: 1,
                    right: 9,
                },
                Node::Leaf { size: 1 },
            ],
        };
        assert!(tree.validate().is_err());
        assert_eq!(tree.path_length(1.0).unwrap(), 1.0);
        assert!(matches!(tree.path_length(6.0), Err(DetectError::CorruptModel(_))));
    }

    #[test]
    fn test_cycle_is_rejected_without_looping() {
        let tree = IsolationTree {
            nodes: vec![
                Node::Split {
                    threshold: 5.0,
                    left: 0,
                    right: 1,
                },
                Node::Leaf { size: 1 },
            ],
        };
        assert!(tree.validate().is_err());
        assert!(matches!(tree.path_length(1.0), Err(DetectError::CorruptModel(_))));
    }
}
