//! Pairwise cosine similarity over a batch of embeddings.
//!
//! Vectors are L2-normalised once, then every row of the matrix is filled in
//! parallel with plain dot products. Each cell is computed by exactly one
//! thread with a fixed summation order, so the output does not depend on
//! scheduling and `(i, j)` is bit-identical to `(j, i)`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::model::EmbeddingVector;

/// Square, row-major similarity matrix.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f32>>", into = "Vec<Vec<f32>>")]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// Build from rows; fails unless the rows form a square matrix.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, ValidationError> {
        let size = rows.len();
        let mut values = Vec::with_capacity(size * size);
        for (position, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(ValidationError::DimensionMismatch {
                    position,
                    expected: size,
                    got: row.len(),
                });
            }
            values.extend(row);
        }
        Ok(Self { size, values })
    }

    /// Number of rows (and columns).
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.size + j]
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.size..(i + 1) * self.size]
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        (0..self.size).map(|i| self.row(i).to_vec()).collect()
    }

    /// Apply `polarity_i * polarity_j` to every cell.
    fn with_polarities(&self, polarities: &[f32]) -> Self {
        let size = self.size;
        let mut values = self.values.clone();
        if size > 0 {
            values
                .par_chunks_mut(size)
                .enumerate()
                .for_each(|(i, row)| {
                    for (j, cell) in row.iter_mut().enumerate() {
                        *cell *= polarities[i] * polarities[j];
                    }
                });
        }
        Self { size, values }
    }
}

impl TryFrom<Vec<Vec<f32>>> for SimilarityMatrix {
    type Error = ValidationError;

    fn try_from(rows: Vec<Vec<f32>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<SimilarityMatrix> for Vec<Vec<f32>> {
    fn from(matrix: SimilarityMatrix) -> Self {
        matrix.to_rows()
    }
}

/// Raw cosine similarities and their polarity-adjusted counterpart.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimilarityMatrices {
    pub raw: SimilarityMatrix,
    /// Equal to `raw` when no polarities were supplied.
    pub adjusted: SimilarityMatrix,
}

/// Compute the pairwise cosine similarity of `vectors`.
///
/// When `polarities` is given, `adjusted[i][j] = raw[i][j] * p_i * p_j`.
/// Every polarity must be exactly `1` or `-1`. A zero vector has similarity
/// 0 with everything, itself included.
pub fn compute_similarity(
    vectors: &[EmbeddingVector],
    polarities: Option<&[f32]>,
) -> Result<SimilarityMatrices, ValidationError> {
    let size = vectors.len();

    if let Some(polarities) = polarities {
        validate_polarities(polarities, size)?;
    }

    if size == 0 {
        return Ok(SimilarityMatrices::default());
    }

    let dimensions = vectors[0].len();
    for (position, vector) in vectors.iter().enumerate() {
        if vector.len() != dimensions {
            return Err(ValidationError::DimensionMismatch {
                position,
                expected: dimensions,
                got: vector.len(),
            });
        }
    }

    let normalized: Vec<Vec<f32>> = vectors.par_iter().map(|v| normalize(v)).collect();

    let mut values = vec![0.0f32; size * size];
    values
        .par_chunks_mut(size)
        .enumerate()
        .for_each(|(i, row)| {
            let left = &normalized[i];
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = dot(left, &normalized[j]).clamp(-1.0, 1.0);
            }
        });

    let raw = SimilarityMatrix { size, values };
    let adjusted = match polarities {
        Some(polarities) => raw.with_polarities(polarities),
        None => raw.clone(),
    };

    log::debug!("computed {size}x{size} similarity matrix over {dimensions} dimensions");

    Ok(SimilarityMatrices { raw, adjusted })
}

/// Cosine similarity between two vectors; 0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let a_norm = l2_norm(a);
    let b_norm = l2_norm(b);
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
    (dot / (a_norm * b_norm)).clamp(-1.0, 1.0) as f32
}

fn validate_polarities(polarities: &[f32], expected: usize) -> Result<(), ValidationError> {
    if polarities.len() != expected {
        return Err(ValidationError::PolarityCount {
            expected,
            got: polarities.len(),
        });
    }

    match polarities
        .iter()
        .position(|&p| p != 1.0 && p != -1.0)
    {
        Some(position) => Err(ValidationError::InvalidPolarity {
            position,
            value: polarities[position],
        }),
        None => Ok(()),
    }
}

/// Accumulated in f64: the square of any finite f32 fits without overflow
/// or underflow to zero.
fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return vec![0.0; v.len()];
    }
    v.iter().map(|&x| (x as f64 / norm) as f32).collect()
}
