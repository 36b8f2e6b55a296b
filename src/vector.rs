//! Input records and small vector helpers

use crate::error::{AnnoyError, Result};
use serde::{Deserialize, Serialize};

/// One input record: a caller identifier and its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedVector<T> {
    pub id: T,
    pub vector: Vec<f32>,
}

impl<T> IdentifiedVector<T> {
    pub fn new(id: T, vector: Vec<f32>) -> Self {
        Self { id, vector }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

impl<T> From<(T, Vec<f32>)> for IdentifiedVector<T> {
    fn from((id, vector): (T, Vec<f32>)) -> Self {
        Self::new(id, vector)
    }
}

/// Compute the L2 norm (magnitude) of a vector
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > 0.0 {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}

/// Parse a vector from a comma-separated string
pub fn parse_components(s: &str) -> Result<Vec<f32>> {
    s.split(',')
        .map(|x| {
            x.trim()
                .parse::<f32>()
                .map_err(|_| AnnoyError::invalid(format!("Invalid float: {}", x)))
        })
        .collect()
}

/// Parse a whitespace separated `<id> <f1> <f2> ...` record.
pub fn parse_record(line: &str) -> Result<IdentifiedVector<String>> {
    let mut fields = line.split_whitespace();
    let id = fields
        .next()
        .ok_or_else(|| AnnoyError::invalid("empty record"))?
        .to_string();
    let vector = fields
        .map(|x| {
            x.parse::<f32>()
                .map_err(|_| AnnoyError::invalid(format!("Invalid float for {}: {}", id, x)))
        })
        .collect::<Result<Vec<f32>>>()?;
    if vector.is_empty() {
        return Err(AnnoyError::invalid(format!("record {} has no components", id)));
    }
    Ok(IdentifiedVector::new(id, vector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert_relative_eq!(norm(&v), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_parse_components() {
        let v = parse_components("1.0, 2.0, 3.0").unwrap();
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
        assert!(parse_components("1.0,x").is_err());
    }

    #[test]
    fn test_parse_record() {
        let record = parse_record("42 0.5 -1 2").unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.vector, vec![0.5, -1.0, 2.0]);
        assert_eq!(record.dimension(), 3);
    }

    #[test]
    fn test_parse_record_rejects_bare_id() {
        assert!(matches!(parse_record("42"), Err(AnnoyError::InvalidInput(_))));
        assert!(parse_record("   ").is_err());
    }
}
