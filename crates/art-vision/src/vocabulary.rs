//! Hierarchical k-means vocabulary tree + TF-IDF candidate ranking (C3).
//!
//! The tree is a pre-filter, not a final match — §4.4 confirms or rejects
//! whatever this module ranks highly. Below
//! [`art_core::limits::VOCAB_MIN_TARGETS`] processed targets, [`VocabularyIndex::query`]
//! short-circuits to "return everything, unranked" (spec §9).

use std::collections::HashMap;

use art_core::types::{Descriptor, TargetId};
use serde::{Deserialize, Serialize};

/// A leaf index in the vocabulary tree, in `[0, k^L)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordId(pub u32);

/// A sparse TF-IDF-weighted, L2-normalised bag-of-words vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BagOfWords {
    pub weights: HashMap<u32, f32>,
}

impl BagOfWords {
    fn cosine_similarity(&self, other: &BagOfWords) -> f32 {
        let mut dot = 0.0;
        for (word, w) in &self.weights {
            if let Some(other_w) = other.weights.get(word) {
                dot += w * other_w;
            }
        }
        dot
    }

    fn l2_normalise(mut self) -> Self {
        let norm = self.weights.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 1e-9 {
            for w in self.weights.values_mut() {
                *w /= norm;
            }
        }
        self
    }
}

/// A single k-means cluster node: its centroid descriptor and, for
/// internal nodes, child node indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    centroid: Descriptor,
    children: Vec<usize>,
}

/// A hierarchical k-means quantiser with per-word IDF weights and
/// per-target TF-IDF vectors, immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyIndex {
    branching: usize,
    levels: usize,
    nodes: Vec<TreeNode>,
    root: usize,
    idf: HashMap<u32, f32>,
    per_target_vectors: HashMap<u64, BagOfWords>,
}

fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// One k-means iteration pass: assign points to nearest centroid, in
/// Hamming distance, by majority bit at each byte position.
fn kmeans_hamming(points: &[&Descriptor], k: usize, iterations: usize) -> Vec<Descriptor> {
    if points.is_empty() {
        return Vec::new();
    }
    let width = points[0].len();
    let k = k.min(points.len()).max(1);

    let mut centroids: Vec<Descriptor> = points
        .iter()
        .step_by((points.len() / k).max(1))
        .take(k)
        .map(|p| (*p).clone())
        .collect();
    while centroids.len() < k {
        centroids.push(points[centroids.len() % points.len()].to_vec());
    }

    for _ in 0..iterations {
        let mut buckets: Vec<Vec<&Descriptor>> = vec![Vec::new(); centroids.len()];
        for p in points {
            let nearest = centroids
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| hamming_distance(c, p))
                .map(|(i, _)| i)
                .unwrap_or(0);
            buckets[nearest].push(p);
        }
        for (i, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let mut bit_counts = vec![0u32; width * 8];
            for p in bucket {
                for (byte_idx, byte) in p.iter().enumerate() {
                    for bit in 0..8 {
                        if byte & (1 << bit) != 0 {
                            bit_counts[byte_idx * 8 + bit] += 1;
                        }
                    }
                }
            }
            let half = bucket.len() as u32 / 2;
            let mut new_centroid = vec![0u8; width];
            for (bit_idx, &count) in bit_counts.iter().enumerate() {
                if count > half {
                    new_centroid[bit_idx / 8] |= 1 << (bit_idx % 8);
                }
            }
            centroids[i] = new_centroid;
        }
    }
    centroids
}

impl VocabularyIndex {
    /// Build the tree from every processed target's descriptors. Returns
    /// `None` when there are no descriptors to cluster (empty catalog).
    pub fn build(
        targets: &[(TargetId, &[Descriptor])],
        branching: usize,
        levels: usize,
    ) -> Option<Self> {
        let all_descriptors: Vec<&Descriptor> = targets
            .iter()
            .flat_map(|(_, descs)| descs.iter())
            .collect();
        if all_descriptors.is_empty() {
            return None;
        }

        let mut nodes = Vec::new();
        let root = Self::build_level(&all_descriptors, branching, levels, &mut nodes);

        let mut index = VocabularyIndex {
            branching,
            levels,
            nodes,
            root,
            idf: HashMap::new(),
            per_target_vectors: HashMap::new(),
        };
        index.compute_weights(targets);
        Some(index)
    }

    fn build_level(
        points: &[&Descriptor],
        branching: usize,
        levels_remaining: usize,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        if levels_remaining == 0 || points.len() <= 1 {
            let centroid = points.first().map(|p| (*p).clone()).unwrap_or_default();
            nodes.push(TreeNode {
                centroid,
                children: Vec::new(),
            });
            return nodes.len() - 1;
        }

        let centroids = kmeans_hamming(points, branching, 6);
        let mut buckets: Vec<Vec<&Descriptor>> = vec![Vec::new(); centroids.len()];
        for p in points {
            let nearest = centroids
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| hamming_distance(c, p))
                .map(|(i, _)| i)
                .unwrap_or(0);
            buckets[nearest].push(p);
        }

        let mut children = Vec::with_capacity(centroids.len());
        for bucket in &buckets {
            if bucket.is_empty() {
                continue;
            }
            children.push(Self::build_level(bucket, branching, levels_remaining - 1, nodes));
        }

        let self_centroid = centroids.first().cloned().unwrap_or_default();
        nodes.push(TreeNode {
            centroid: self_centroid,
            children,
        });
        nodes.len() - 1
    }

    /// Walk the tree from the root, always descending into the nearest
    /// child, until a leaf (no children) is reached.
    fn quantise(&self, descriptor: &Descriptor) -> WordId {
        let mut node_idx = self.root;
        loop {
            let node = &self.nodes[node_idx];
            if node.children.is_empty() {
                return WordId(node_idx as u32);
            }
            node_idx = *node
                .children
                .iter()
                .min_by_key(|&&child| hamming_distance(&self.nodes[child].centroid, descriptor))
                .unwrap();
        }
    }

    fn bag_of_words(&self, descriptors: &[Descriptor]) -> HashMap<u32, u32> {
        let mut counts = HashMap::new();
        for d in descriptors {
            *counts.entry(self.quantise(d).0).or_insert(0) += 1;
        }
        counts
    }

    fn compute_weights(&mut self, targets: &[(TargetId, &[Descriptor])]) {
        let bags: Vec<(TargetId, HashMap<u32, u32>)> = targets
            .iter()
            .map(|(id, descs)| (*id, self.bag_of_words(descs)))
            .collect();

        let num_targets = bags.len().max(1) as f32;
        let mut document_frequency: HashMap<u32, u32> = HashMap::new();
        for (_, bag) in &bags {
            for word in bag.keys() {
                *document_frequency.entry(*word).or_insert(0) += 1;
            }
        }

        self.idf = document_frequency
            .iter()
            .map(|(&word, &df)| (word, (num_targets / df.max(1) as f32).ln().max(0.0)))
            .collect();

        self.per_target_vectors = bags
            .into_iter()
            .map(|(id, bag)| {
                let weights: HashMap<u32, f32> = bag
                    .into_iter()
                    .map(|(word, count)| {
                        let idf = *self.idf.get(&word).unwrap_or(&0.0);
                        (word, count as f32 * idf)
                    })
                    .collect();
                (id.value(), BagOfWords { weights }.l2_normalise())
            })
            .collect();
    }

    /// Rank processed targets by TF-IDF cosine similarity to `query`'s
    /// bag-of-words, returning at most `top_t` candidates, best first.
    /// Short-circuits to "all targets, unranked" at or below
    /// [`art_core::limits::VOCAB_MIN_TARGETS`] processed targets.
    pub fn query(&self, query: &[Descriptor], top_t: usize, all_target_ids: &[TargetId]) -> Vec<TargetId> {
        if all_target_ids.len() <= art_core::limits::VOCAB_MIN_TARGETS {
            return all_target_ids.to_vec();
        }

        let bag = self.bag_of_words(query);
        let weights: HashMap<u32, f32> = bag
            .into_iter()
            .map(|(word, count)| {
                let idf = *self.idf.get(&word).unwrap_or(&0.0);
                (word, count as f32 * idf)
            })
            .collect();
        let query_bow = BagOfWords { weights }.l2_normalise();

        let mut scored: Vec<(TargetId, f32)> = all_target_ids
            .iter()
            .map(|&id| {
                let score = self
                    .per_target_vectors
                    .get(&id.value())
                    .map(|v| query_bow.cosine_similarity(v))
                    .unwrap_or(0.0);
                (id, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(top_t).map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(seed: u8) -> Descriptor {
        vec![seed; 32]
    }

    fn target_descs(seed: u8, n: usize) -> Vec<Descriptor> {
        (0..n).map(|i| descriptor(seed.wrapping_add(i as u8))).collect()
    }

    #[test]
    fn short_circuits_below_minimum_target_count() {
        let a = target_descs(0, 10);
        let b = target_descs(50, 10);
        let ids = vec![TargetId::new(0), TargetId::new(1)];
        let targets: Vec<(TargetId, &[Descriptor])> = vec![(ids[0], &a), (ids[1], &b)];
        let index = VocabularyIndex::build(&targets, 10, 2).unwrap();
        let result = index.query(&a, 5, &ids);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn query_with_own_descriptors_ranks_self_first() {
        let ids: Vec<TargetId> = (0..8).map(TargetId::new).collect();
        let descs: Vec<Vec<Descriptor>> = ids
            .iter()
            .enumerate()
            .map(|(i, _)| target_descs((i as u8) * 30, 15))
            .collect();
        let refs: Vec<(TargetId, &[Descriptor])> =
            ids.iter().zip(descs.iter()).map(|(&id, d)| (id, d.as_slice())).collect();
        let index = VocabularyIndex::build(&refs, 10, 2).unwrap();

        let query_target = 3;
        let result = index.query(&descs[query_target], 5, &ids);
        assert!(result.contains(&ids[query_target]));
    }

    #[test]
    fn build_returns_none_for_empty_catalog() {
        let targets: Vec<(TargetId, &[Descriptor])> = Vec::new();
        assert!(VocabularyIndex::build(&targets, 10, 2).is_none());
    }
}
