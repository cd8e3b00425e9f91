use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::filter::FilteredDataset;
use crate::value::coerce_numeric;

/// Everything needed to draw one colour-mapped scatter series
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPayload {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub color: Vec<f64>,
    pub x_label: String,
    pub y_label: String,
    pub color_label: String,
    pub color_min: f64,
    pub color_max: f64,
}

impl ScatterPayload {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Reduce filtered data to aligned numeric x/y/colour triples
///
/// Each of the three columns is coerced to numbers and any row where one of
/// them is not numeric is dropped. Row order is preserved.
///
/// # Errors
/// * `UnknownColumn` if the target (or an axis) column does not exist
/// * `EmptyResult` if no row has three numeric values
pub fn build_payload(filtered: &FilteredDataset) -> Result<ScatterPayload> {
    let axes = &filtered.axes;
    let data = &filtered.data;

    let color = coerce_numeric(data.values(&axes.target)?);
    let x = coerce_numeric(data.values(&axes.x)?);
    let y = coerce_numeric(data.values(&axes.y)?);

    let mut payload = ScatterPayload {
        x: Vec::with_capacity(x.len()),
        y: Vec::with_capacity(y.len()),
        color: Vec::with_capacity(color.len()),
        x_label: axes.x.clone(),
        y_label: axes.y.clone(),
        color_label: axes.target.clone(),
        color_min: f64::INFINITY,
        color_max: f64::NEG_INFINITY,
    };

    for ((&xv, &yv), &cv) in x.iter().zip(&y).zip(&color) {
        if xv.is_nan() || yv.is_nan() || cv.is_nan() {
            continue;
        }
        payload.x.push(xv);
        payload.y.push(yv);
        payload.color.push(cv);
        payload.color_min = payload.color_min.min(cv);
        payload.color_max = payload.color_max.max(cv);
    }

    if payload.is_empty() {
        return Err(PipelineError::EmptyResult(
            "No valid numerical data after filtering and type conversion.".to_string(),
        ));
    }

    Ok(payload)
}
