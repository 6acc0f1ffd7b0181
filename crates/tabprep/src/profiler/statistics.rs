//! Descriptive statistics over the present values of a column.
//!
//! Location, spread and quantiles come from Polars aggregations on a
//! `Float64` view of the column, which skip missing cells. Shape moments
//! and [`pearson`] work on plain values extracted from it.

use polars::prelude::*;

/// A numeric (or castable) column as `Float64`, nulls kept.
pub fn float_values(series: &Series) -> PolarsResult<Float64Chunked> {
    Ok(series.cast(&DataType::Float64)?.f64()?.clone())
}

/// Quantile with linear interpolation between the closest ranks.
pub fn quantile(values: &Float64Chunked, q: f64) -> PolarsResult<Option<f64>> {
    values.quantile(q, QuantileMethod::Linear)
}

/// First quartile, median and third quartile.
pub fn quartiles(values: &Float64Chunked) -> PolarsResult<Option<(f64, f64, f64)>> {
    let (Some(q1), Some(median), Some(q3)) = (
        quantile(values, 0.25)?,
        values.median(),
        quantile(values, 0.75)?,
    ) else {
        return Ok(None);
    };
    Ok(Some((q1, median, q3)))
}

fn central_moment(values: &[f64], mean: f64, order: i32) -> f64 {
    values.iter().map(|v| (v - mean).powi(order)).sum::<f64>() / values.len() as f64
}

/// Bias-corrected sample skewness. 0 for constant data, `None` below
/// three values.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let m2 = central_moment(values, mean, 2);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let m3 = central_moment(values, mean, 3);
    let g1 = m3 / m2.powf(1.5);
    let n = n as f64;
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Bias-corrected sample excess kurtosis. 0 for constant data, `None`
/// below four values.
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let m2 = central_moment(values, mean, 2);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let m4 = central_moment(values, mean, 4);
    let g2 = m4 / (m2 * m2) - 3.0;
    let n = n as f64;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

/// Pearson correlation over rows where both values are present.
///
/// `None` with fewer than two complete rows or when either side has zero
/// variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Chi-square goodness-of-fit of `observed` counts against a uniform
/// expectation. Returns the statistic and its p-value, `None` below two
/// categories.
pub fn chi_square_uniform(observed: &[f64]) -> Option<(f64, f64)> {
    let categories = observed.len();
    if categories < 2 {
        return None;
    }
    let expected = observed.iter().sum::<f64>() / categories as f64;
    if expected <= 0.0 {
        return None;
    }
    let statistic: f64 = observed
        .iter()
        .map(|o| (o - expected).powi(2) / expected)
        .sum();
    let p_value = chi_square_survival(statistic, (categories - 1) as f64);
    Some((statistic, p_value))
}

/// `P(X > x)` for a chi-square variable with `dof` degrees of freedom.
pub fn chi_square_survival(x: f64, dof: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    upper_regularized_gamma(dof / 2.0, x / 2.0).clamp(0.0, 1.0)
}

const GAMMA_EPSILON: f64 = 1e-15;
const GAMMA_MAX_ITERATIONS: usize = 500;
const GAMMA_TINY: f64 = 1e-300;

/// Lanczos coefficients for g = 7.
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for `x >= 0.5`.
fn ln_gamma(x: f64) -> f64 {
    let x = x - 1.0;
    let t = x + 7.5;
    let series = LANCZOS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `Q(a, x)`, the upper regularized incomplete gamma function.
///
/// Series expansion of the lower function below `a + 1`, Lentz's
/// continued fraction above.
fn upper_regularized_gamma(a: f64, x: f64) -> f64 {
    let prefactor = (a * x.ln() - x - ln_gamma(a)).exp();

    if x < a + 1.0 {
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut denominator = a;
        for _ in 0..GAMMA_MAX_ITERATIONS {
            denominator += 1.0;
            term *= x / denominator;
            sum += term;
            if term.abs() < sum.abs() * GAMMA_EPSILON {
                break;
            }
        }
        return 1.0 - sum * prefactor;
    }

    let mut b = x + 1.0 - a;
    let mut c = 1.0 / GAMMA_TINY;
    let mut d = 1.0 / b;
    let mut fraction = d;
    for i in 1..=GAMMA_MAX_ITERATIONS {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < GAMMA_TINY {
            d = GAMMA_TINY;
        }
        c = b + an / c;
        if c.abs() < GAMMA_TINY {
            c = GAMMA_TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        fraction *= delta;
        if (delta - 1.0).abs() < GAMMA_EPSILON {
            break;
        }
    }
    prefactor * fraction
}
