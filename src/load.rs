// XMPSWEEP LOAD-POINT GENERATOR
// RELATIVE LOAD FRACTIONS x TOTAL CAPACITY -> ABSOLUTE ARRIVAL RATES.
// ORDER IS PRESERVED: SATURATION DETECTION RELIES ON MONOTONIC ESCALATION.

use serde::Serialize;

use crate::capacity::ServiceModel;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoadPoint {
    // FRACTION OF TOTAL CAPACITY THIS POINT WAS DERIVED FROM
    pub fraction: f64,
    // ARRIVAL RATE IN SIMULATOR UNITS (REQUESTS PER TIME UNIT)
    pub lambda: f64,
}

// 0.1 .. 1.0 IN 0.1 STEPS
pub fn default_fractions() -> Vec<f64> {
    (1..=10).map(|i| i as f64 * 0.1).collect()
}

pub fn generate(model: &ServiceModel, fractions: &[f64]) -> Vec<LoadPoint> {
    let capacity_rps = model.total_capacity();
    let scale = 1.0 / model.time_units_per_sec();
    fractions
        .iter()
        .map(|&fraction| LoadPoint {
            fraction,
            lambda: fraction * capacity_rps * scale,
        })
        .collect()
}

pub fn shift(points: &[LoadPoint], offset: f64) -> Vec<LoadPoint> {
    points
        .iter()
        .map(|p| LoadPoint {
            fraction: p.fraction,
            lambda: p.lambda + offset,
        })
        .collect()
}

pub fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
