use crate::metrics::QualityMetrics;
use serde::{Deserialize, Serialize};

// (lower bound, contribution), highest bound first.
const SHARPNESS_BUCKETS: &[(f64, i32)] = &[(300.0, 60), (150.0, 25), (50.0, 10)];
const SHARPNESS_FLOOR: i32 = -10;

const CONTRAST_BUCKETS: &[(f64, i32)] = &[(50.0, 30), (20.0, 15)];
const CONTRAST_FLOOR: i32 = -10;

// (upper bound, contribution), lowest bound first.
const NOISE_BUCKETS: &[(f64, i32)] = &[(8.0, 40), (20.0, 15)];
const NOISE_CEILING: i32 = -10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub sharpness: i32,
    pub contrast: i32,
    pub noise: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i32 {
        self.sharpness + self.contrast + self.noise
    }
}

/// Integer quality score; unclamped, may be negative.
pub fn score(m: &QualityMetrics) -> i32 {
    breakdown(m).total()
}

pub fn breakdown(m: &QualityMetrics) -> ScoreBreakdown {
    ScoreBreakdown {
        sharpness: sharpness_points(m.sharpness),
        contrast: contrast_points(m.contrast),
        noise: noise_points(m.noise),
    }
}

pub fn sharpness_points(v: f64) -> i32 {
    at_least(v, SHARPNESS_BUCKETS, SHARPNESS_FLOOR)
}

pub fn contrast_points(v: f64) -> i32 {
    at_least(v, CONTRAST_BUCKETS, CONTRAST_FLOOR)
}

pub fn noise_points(v: f64) -> i32 {
    NOISE_BUCKETS
        .iter()
        .find(|(bound, _)| v <= *bound)
        .map(|(_, pts)| *pts)
        .unwrap_or(NOISE_CEILING)
}

fn at_least(v: f64, buckets: &[(f64, i32)], otherwise: i32) -> i32 {
    buckets
        .iter()
        .find(|(bound, _)| v >= *bound)
        .map(|(_, pts)| *pts)
        .unwrap_or(otherwise)
}
