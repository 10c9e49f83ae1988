//! Ordinary-least-squares trend lines over day-indexed series.

use crate::error::{Error, Result};
use crate::models::{Day, Observation};
use serde::{Deserialize, Serialize};

/// `fitted(i) = slope * i + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendModel {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendModel {
    pub fn project(&self, index: f64) -> f64 {
        self.slope * index + self.intercept
    }
}

/// Closed-form OLS fit over `(index, value)` pairs.
///
/// Fails with [`Error::InsufficientData`] when fewer than two distinct indices are present
/// or when any input is non-finite.
pub fn fit(points: &[(f64, f64)]) -> Result<TrendModel> {
    if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(Error::insufficient("non-finite point in trend input"));
    }
    let Some(&(x0, _)) = points.first() else {
        return Err(Error::insufficient("trend needs at least 2 points, got 0"));
    };
    if points.iter().all(|(x, _)| *x == x0) {
        return Err(Error::insufficient(format!(
            "trend needs at least 2 distinct indices, got 1 across {} point(s)",
            points.len()
        )));
    }

    let n = points.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for &(x, y) in points {
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }

    let denom = n * sxx - sx * sx;
    if denom == 0.0 {
        return Err(Error::insufficient("degenerate index spread"));
    }
    let slope = (n * sxy - sx * sy) / denom;
    let intercept = (sy - slope * sx) / n;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(Error::insufficient("trend fit overflowed"));
    }
    Ok(TrendModel { slope, intercept })
}

/// An observation with its 1-based series position and fitted trend values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedObservation {
    pub day: Day,
    pub index: usize,
    pub confirmed: Option<u64>,
    pub deaths: Option<u64>,
    pub confirmed_trend: Option<f64>,
    pub deaths_trend: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSeries {
    pub points: Vec<IndexedObservation>,
    /// `None` when the confirmed series is too short to fit.
    pub confirmed_trend: Option<TrendModel>,
    pub deaths_trend: Option<TrendModel>,
}

fn fit_present(series: &[Observation], value: impl Fn(&Observation) -> Option<u64>) -> Option<TrendModel> {
    let pairs: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .filter_map(|(i, o)| value(o).map(|v| ((i + 1) as f64, v as f64)))
        .collect();
    match fit(&pairs) {
        Ok(m) => Some(m),
        Err(e) => {
            log::debug!("no trend line: {e}");
            None
        }
    }
}

/// Index a day-ordered series from 1 and attach the fitted confirmed/deaths trends.
///
/// Days with an absent count keep their position but do not take part in that fit.
pub fn index_series(series: &[Observation]) -> IndexedSeries {
    let confirmed_trend = fit_present(series, |o| o.confirmed);
    let deaths_trend = fit_present(series, |o| o.deaths);

    let points = series
        .iter()
        .enumerate()
        .map(|(i, o)| {
            let index = i + 1;
            IndexedObservation {
                day: o.day,
                index,
                confirmed: o.confirmed,
                deaths: o.deaths,
                confirmed_trend: confirmed_trend.map(|m| m.project(index as f64)),
                deaths_trend: deaths_trend.map(|m| m.project(index as f64)),
            }
        })
        .collect();

    IndexedSeries {
        points,
        confirmed_trend,
        deaths_trend,
    }
}
