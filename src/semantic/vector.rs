//! L2-normalized embedding vectors.

use serde::{Deserialize, Serialize};

/// Tolerance on the L2 norm of a stored unit vector.
pub(crate) const UNIT_NORM_TOLERANCE: f64 = 1e-3;

/// A fixed-length embedding that is either unit length or all zeros.
///
/// The zero vector means "no semantic signal": its similarity with anything
/// is 0. Any other value is normalized on construction, so cosine
/// similarity reduces to an inner product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<f32>", from = "Vec<f32>")]
pub struct EmbeddingVector {
    values: Vec<f32>,
}

impl EmbeddingVector {
    /// Normalize `values` to unit length. A zero-norm input stays all zeros.
    ///
    /// Non-finite components are treated as 0.
    pub fn normalized(mut values: Vec<f32>) -> Self {
        for v in values.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
            }
        }

        let norm = l2_norm(&values);
        if norm > 0.0 {
            for v in values.iter_mut() {
                *v = (f64::from(*v) / norm) as f32;
            }
        }

        Self { values }
    }

    /// The "no signal" vector.
    pub fn zeros(dimensions: usize) -> Self {
        Self {
            values: vec![0.0; dimensions],
        }
    }

    /// Accept values read back from storage without renormalizing them.
    ///
    /// Returns `None` unless the values are finite and either unit length
    /// (within tolerance) or all zeros.
    pub(crate) fn from_stored(values: Vec<f32>) -> Option<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let norm = l2_norm(&values);
        if norm == 0.0 || (norm - 1.0).abs() <= UNIT_NORM_TOLERANCE {
            Some(Self { values })
        } else {
            None
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f64 {
        l2_norm(&self.values)
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Cosine similarity in [-1, 1]; 0 when either side is the zero vector.
    ///
    /// Returns `None` when the dimensions differ.
    pub fn cosine(&self, other: &EmbeddingVector) -> Option<f32> {
        if self.values.len() != other.values.len() {
            return None;
        }
        Some(dot(&self.values, &other.values))
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self::normalized(values)
    }
}

impl From<EmbeddingVector> for Vec<f32> {
    fn from(vector: EmbeddingVector) -> Self {
        vector.values
    }
}

/// Inner product accumulated in f64 and clamped to [-1, 1].
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    sum.clamp(-1.0, 1.0) as f32
}

fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_has_unit_norm() {
        let v = EmbeddingVector::normalized(vec![3.0, 4.0, 0.0]);
        assert!((v.norm() - 1.0).abs() < 1e-6);
        assert!((v.values()[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_zero_stays_zero() {
        let v = EmbeddingVector::normalized(vec![0.0; 8]);
        assert!(v.is_zero());
        assert_eq!(v.norm(), 0.0);
    }

    #[test]
    fn test_self_cosine_is_one() {
        let v = EmbeddingVector::normalized(vec![0.3, -1.7, 2.2, 0.01]);
        let sim = v.cosine(&v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_with_zero_is_zero() {
        let v = EmbeddingVector::normalized(vec![1.0, 2.0]);
        let z = EmbeddingVector::zeros(2);
        assert_eq!(v.cosine(&z), Some(0.0));
        assert_eq!(z.cosine(&z), Some(0.0));
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let a = EmbeddingVector::normalized(vec![1.0, 0.0]);
        let b = EmbeddingVector::normalized(vec![1.0, 0.0, 0.0]);
        assert_eq!(a.cosine(&b), None);
    }

    #[test]
    fn test_non_finite_components_dropped() {
        let v = EmbeddingVector::normalized(vec![f32::NAN, 2.0, f32::INFINITY]);
        assert_eq!(v.values(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_from_stored_rejects_unnormalized() {
        assert!(EmbeddingVector::from_stored(vec![1.0, 0.0]).is_some());
        assert!(EmbeddingVector::from_stored(vec![0.0, 0.0]).is_some());
        assert!(EmbeddingVector::from_stored(vec![2.0, 0.0]).is_none());
        assert!(EmbeddingVector::from_stored(vec![f32::NAN, 1.0]).is_none());
    }
}
