
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::EmbeddingVector;
use crate::vectoriser::{Vectoriser, VectoriserError};

/// Vectoriser with hand-picked vectors that counts how often it is called.
pub struct Fixture {
    vectors: HashMap<String, EmbeddingVector>,
    calls: AtomicUsize,
}

impl Fixture {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Vectoriser for Fixture {
    fn framework(&self) -> &str {
        "fixture"
    }

    fn model(&self) -> &str {
        "fixture"
    }

    fn vectorise(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .ok_or_else(|| VectoriserError::UnknownText(t.clone()))
            })
            .collect()
    }
}

/// Unit vector with cosine `cos` against `[1, 0, ...]`, leaning into `axis`.
pub fn at_angle(cos: f32, axis: usize, dimensions: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimensions];
    v[0] = cos;
    v[axis] = (1.0 - cos * cos).sqrt();
    v
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}
