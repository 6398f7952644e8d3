// THEORY:
// The `scene_grouping` module decides which photos show the same physical pile.
// It is a single-pass, order-dependent clusterer, much like a tracker deciding
// whether a new detection continues an existing track or starts a new one.
//
// Key architectural principles:
// 1.  **Explicit accumulator**: All clustering state (scene members and running
//     centroids) lives in a `SceneAccumulator` owned by one job. A fresh job gets
//     a fresh accumulator; nothing is global.
// 2.  **First match wins**: A photo joins the lowest-id scene whose centroid is
//     similar enough, not the most similar one. Together with input-order
//     processing this makes the partition reproducible run after run.
// 3.  **Birth**: A photo that matches no scene seeds a new one. Scene ids follow
//     creation order (`scene-1`, `scene-2`, ...).
// 4.  **Running centroid**: A scene's centroid is the plain running mean of its
//     member embeddings. It is not renormalized, which is why the similarity
//     check divides by both norms.

use crate::core_modules::embedding::{Embedding, cosine_similarity};
use serde::Serialize;

/// One group of photos believed to show the same pile.
#[derive(Debug, Clone)]
pub struct Scene<K> {
    pub id: String,
    pub members: Vec<K>,
    centroid: Vec<f32>,
}

impl<K> Scene<K> {
    fn new(index: usize, member: K, embedding: &Embedding) -> Self {
        Self {
            id: format!("scene-{}", index + 1),
            members: vec![member],
            centroid: embedding.as_slice().to_vec(),
        }
    }

    fn absorb(&mut self, member: K, embedding: &Embedding) {
        self.members.push(member);
        let n = self.members.len() as f32;
        for (c, &v) in self.centroid.iter_mut().zip(embedding.as_slice()) {
            *c += (v - *c) / n;
        }
    }

    pub fn centroid(&self) -> &[f32] {
        &self.centroid
    }
}

/// The final partition: scene id plus ordered member keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneGroup<K> {
    pub scene_id: String,
    pub members: Vec<K>,
}

/// Per-job clustering state.
pub struct SceneAccumulator<K> {
    scenes: Vec<Scene<K>>,
    threshold: f64,
}

impl<K> SceneAccumulator<K> {
    pub fn new(threshold: f64) -> Self {
        Self {
            scenes: Vec::new(),
            threshold,
        }
    }

    /// Places `member` into the first scene meeting the threshold, or a new one.
    /// Returns the index of the scene it landed in.
    pub fn assign(&mut self, member: K, embedding: &Embedding) -> usize {
        let matched = self
            .scenes
            .iter()
            .position(|scene| cosine_similarity(embedding.as_slice(), scene.centroid()) >= self.threshold);

        match matched {
            Some(index) => {
                self.scenes[index].absorb(member, embedding);
                tracing::debug!(scene = %self.scenes[index].id, "photo joined existing scene");
                index
            }
            None => {
                let index = self.scenes.len();
                self.scenes.push(Scene::new(index, member, embedding));
                tracing::debug!(scene = %self.scenes[index].id, "photo seeded new scene");
                index
            }
        }
    }

    pub fn scenes(&self) -> &[Scene<K>] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn into_groups(self) -> Vec<SceneGroup<K>> {
        self.scenes
            .into_iter()
            .map(|scene| SceneGroup {
                scene_id: scene.id,
                members: scene.members,
            })
            .collect()
    }
}

/// Groups `(key, embedding)` pairs in input order with a fresh accumulator.
pub fn group_scenes<K>(items: impl IntoIterator<Item = (K, Embedding)>, threshold: f64) -> Vec<SceneGroup<K>> {
    let mut accumulator = SceneAccumulator::new(threshold);
    for (key, embedding) in items {
        accumulator.assign(key, &embedding);
    }
    accumulator.into_groups()
}
