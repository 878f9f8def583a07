//! # Training Data
//!
//! Immutable, row-aligned training data for the regression search. The
//! feature matrix holds one simulation sample per row (material parameters,
//! coordinates) and the target vector the corresponding displacement
//! response. The data is owned once, wrapped in an [`std::sync::Arc`] by the
//! engine, and read-only to every component for the duration of a run.

use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use std::path::Path;

use crate::error::{GpsrError, Result, ResultExt};
use crate::rng::RandomNumberGenerator;

/// Row-aligned `(X, y)` training data.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    x: DMatrix<f64>,
    y: DVector<f64>,
}

/// On-disk layout of a training data file: two aligned numeric arrays.
#[derive(Deserialize)]
struct RawTrainingData {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl TrainingData {
    /// Creates training data from a feature matrix and target vector.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Data`] if the data is empty or the number of
    /// feature rows does not match the number of targets.
    pub fn new(x: DMatrix<f64>, y: DVector<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(GpsrError::Data(
                "feature matrix must have at least one row and one column".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(GpsrError::Data(format!(
                "feature rows ({}) do not match target length ({})",
                x.nrows(),
                y.len()
            )));
        }
        Ok(Self { x, y })
    }

    /// Creates training data from plain row vectors.
    pub fn from_rows(rows: &[Vec<f64>], targets: &[f64]) -> Result<Self> {
        if rows.is_empty() {
            return Err(GpsrError::Data("no feature rows supplied".to_string()));
        }
        let ncols = rows[0].len();
        if rows.iter().any(|r| r.len() != ncols) {
            return Err(GpsrError::Data(
                "feature rows have inconsistent lengths".to_string(),
            ));
        }
        let x = DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]);
        let y = DVector::from_column_slice(targets);
        Self::new(x, y)
    }

    /// Loads training data from a JSON file of two aligned arrays:
    /// `{"x": [[..], ..], "y": [..]}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GpsrError::Data(format!("cannot read {}: {}", path.as_ref().display(), e)))?;
        let raw: RawTrainingData =
            serde_json::from_str(&content).context("malformed training data file")?;
        Self::from_rows(&raw.x, &raw.y)
    }

    /// The feature matrix, one sample per row.
    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// The target vector, aligned with the rows of `x`.
    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    /// Number of samples.
    pub fn num_rows(&self) -> usize {
        self.x.nrows()
    }

    /// Input dimensionality of the expressions fitted against this data.
    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    /// Returns the row permutation that sorts samples ascending by the given
    /// feature axis. The monotonicity constraint is checked along this order.
    pub fn row_order_by_feature(&self, axis: usize) -> Result<Vec<usize>> {
        if axis >= self.num_features() {
            return Err(GpsrError::Data(format!(
                "constraint axis {} out of range for {} features",
                axis,
                self.num_features()
            )));
        }
        let mut order: Vec<usize> = (0..self.num_rows()).collect();
        order.sort_by(|&a, &b| {
            self.x[(a, axis)]
                .partial_cmp(&self.x[(b, axis)])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(order)
    }

    /// Draws `n` rows (with replacement) into a new training set. The
    /// original simulation output is far larger than one search needs, so
    /// runs train on a random subset.
    pub fn subsample(&self, n: usize, rng: &mut RandomNumberGenerator) -> Result<Self> {
        if n == 0 {
            return Err(GpsrError::Data(
                "subsample size must be greater than zero".to_string(),
            ));
        }
        let picks: Vec<usize> = (0..n).map(|_| rng.pick_index(self.num_rows())).collect();
        let x = DMatrix::from_fn(n, self.num_features(), |i, j| self.x[(picks[i], j)]);
        let y = DVector::from_fn(n, |i, _| self.y[picks[i]]);
        Self::new(x, y)
    }
}
