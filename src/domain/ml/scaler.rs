use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Per-column standardisation: `(x - mean) / std`, population std.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fits on a row-major matrix. Constant columns get scale 1.
    pub fn fit(rows: &[Vec<f64>], columns: Vec<String>) -> Result<Self, PipelineError> {
        let width = columns.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(PipelineError::ShapeMismatch {
                expected: width,
                actual: bad.len(),
            });
        }

        let mut mean = Vec::with_capacity(width);
        let mut scale = Vec::with_capacity(width);
        for col in 0..width {
            let values: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            if values.is_empty() {
                mean.push(0.0);
                scale.push(1.0);
                continue;
            }
            let m = values.iter().mean();
            let sd = values.iter().population_std_dev();
            mean.push(m);
            scale.push(if sd.is_finite() && sd > 0.0 { sd } else { 1.0 });
        }

        Ok(Self {
            columns,
            mean,
            scale,
        })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, PipelineError> {
        self.check(row)?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    pub fn inverse_transform_row(&self, row: &[f64]) -> Result<Vec<f64>, PipelineError> {
        self.check(row)?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(z, (m, s))| z * s + m)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, PipelineError> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    fn check(&self, row: &[f64]) -> Result<(), PipelineError> {
        if row.len() != self.width() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.width(),
                actual: row.len(),
            });
        }
        Ok(())
    }
}
