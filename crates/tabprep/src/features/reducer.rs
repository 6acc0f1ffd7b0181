//! Dimensionality reduction by principal component analysis.
//!
//! Components come from the eigen decomposition of the sample covariance
//! matrix of the centered numeric columns, computed with cyclic Jacobi
//! rotations.

use crate::error::{StageError, StageResult};
use crate::pipeline::Diagnostics;
use crate::profiler::statistics;
use crate::utils::{column_names, column_series, is_numeric_dtype, unique_column_name};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

const MAX_SWEEPS: usize = 100;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-22;

/// Fitted principal components, largest variance first.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalComponents {
    /// Variance along each component.
    pub eigenvalues: Vec<f64>,
    /// Unit loading vector of each component, one weight per input column.
    pub loadings: Vec<Vec<f64>>,
}

impl PrincipalComponents {
    /// Share of the total variance carried by each component.
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        let total: f64 = self.eigenvalues.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.eigenvalues.len()];
        }
        self.eigenvalues.iter().map(|ev| ev / total).collect()
    }

    /// Smallest number of components whose cumulative ratio reaches
    /// `target`.
    pub fn components_for(&self, target: f64) -> usize {
        let mut cumulative = 0.0;
        for (idx, ratio) in self.explained_variance_ratio().iter().enumerate() {
            cumulative += ratio;
            if cumulative + 1e-12 >= target {
                return idx + 1;
            }
        }
        self.eigenvalues.len()
    }
}

/// Eigenvalues and eigenvectors (as columns of the returned matrix) of a
/// symmetric matrix.
fn symmetric_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off < OFF_DIAGONAL_TOLERANCE {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in v.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    ((0..n).map(|i| a[i][i]).collect(), v)
}

/// Fit components to row-major centered data.
pub fn fit(centered: &[Vec<f64>]) -> PrincipalComponents {
    let n = centered.len();
    let d = centered.first().map_or(0, Vec::len);
    let denominator = (n as f64 - 1.0).max(1.0);

    let mut cov = vec![vec![0.0; d]; d];
    for i in 0..d {
        for j in i..d {
            let dot: f64 = centered.iter().map(|row| row[i] * row[j]).sum();
            cov[i][j] = dot / denominator;
            cov[j][i] = cov[i][j];
        }
    }

    let (values, vectors) = symmetric_eigen(cov);
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let mut eigenvalues = Vec::with_capacity(d);
    let mut loadings = Vec::with_capacity(d);
    for idx in order {
        let mut loading: Vec<f64> = (0..d).map(|row| vectors[row][idx]).collect();
        // Largest absolute weight is positive.
        let pivot = loading
            .iter()
            .copied()
            .fold(0.0_f64, |best, w| if w.abs() > best.abs() { w } else { best });
        if pivot < 0.0 {
            loading.iter_mut().for_each(|w| *w = -*w);
        }
        eigenvalues.push(values[idx].max(0.0));
        loadings.push(loading);
    }

    PrincipalComponents {
        eigenvalues,
        loadings,
    }
}

/// Replaces numeric columns with the principal components that keep a
/// target share of their variance.
#[derive(Debug, Clone, Copy)]
pub struct DimensionalityReducer {
    target_variance: f64,
}

impl DimensionalityReducer {
    pub fn new(target_variance: f64) -> Self {
        Self { target_variance }
    }

    /// Output is `PC_1..PC_k` followed by the non-numeric columns.
    pub fn reduce(&self, df: &DataFrame, diagnostics: &mut Diagnostics) -> StageResult {
        let (numeric, passthrough): (Vec<String>, Vec<String>) = column_names(df)
            .into_iter()
            .partition(|name| df.column(name).is_ok_and(|c| is_numeric_dtype(c.dtype())));

        if numeric.len() < 2 {
            diagnostics.info("Fewer than two numeric columns; dimensionality reduction skipped.");
            return Ok(df.clone());
        }
        if df.height() < 2 {
            diagnostics.info("Fewer than two rows; dimensionality reduction skipped.");
            return Ok(df.clone());
        }

        let mut columns = Vec::with_capacity(numeric.len());
        for name in &numeric {
            let values = statistics::float_values(column_series(df, name)?)?;
            if values.null_count() > 0 {
                return Err(StageError::internal(format!("Column '{name}' has missing values")));
            }
            let mean = values.mean().unwrap_or_default();
            columns.push((&values - mean).into_no_null_iter().collect::<Vec<f64>>());
        }

        let centered: Vec<Vec<f64>> = (0..df.height())
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect();

        let components = fit(&centered);
        if components.eigenvalues.iter().sum::<f64>() <= 0.0 {
            diagnostics.info("Numeric columns have no variance; dimensionality reduction skipped.");
            return Ok(df.clone());
        }
        let k = components.components_for(self.target_variance);
        let explained: f64 = components.explained_variance_ratio()[..k].iter().sum();
        debug!("Keeping {} of {} components", k, numeric.len());

        let mut taken: HashSet<String> = passthrough.iter().cloned().collect();
        let mut output: Vec<Column> = Vec::with_capacity(k + passthrough.len());
        for (idx, loading) in components.loadings.iter().take(k).enumerate() {
            let name = unique_column_name(&taken, &format!("PC_{}", idx + 1));
            taken.insert(name.clone());
            let scores: Vec<f64> = centered
                .iter()
                .map(|row| row.iter().zip(loading).map(|(x, w)| x * w).sum())
                .collect();
            output.push(Series::new(name.into(), scores).into());
        }
        for name in &passthrough {
            output.push(df.column(name)?.clone());
        }

        diagnostics.info(format!(
            "Reduced {} numeric columns to {} principal components ({:.1}% of variance).",
            numeric.len(),
            k,
            explained * 100.0
        ));
        Ok(DataFrame::new(output)?)
    }
}
