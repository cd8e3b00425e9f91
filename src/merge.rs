use std::collections::HashMap;

use log::debug;

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::value::Value;

/// Name of the column that links feature rows to target rows
pub const JOIN_KEY: &str = "main_id";

/// Hashable form of a key cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyLabel<'a> {
    Number(u64),
    Text(&'a str),
}

impl<'a> From<&'a Value> for KeyLabel<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            // -0.0 and 0.0 are the same key
            Value::Number(n) if *n == 0.0 => KeyLabel::Number(0f64.to_bits()),
            Value::Number(n) => KeyLabel::Number(n.to_bits()),
            Value::Text(s) => KeyLabel::Text(s),
        }
    }
}

/// Combine the feature and target datasets into one table
///
/// When both sides carry a `main_id` column the result is an inner join on
/// it. Otherwise rows are paired by position, which requires equal lengths.
///
/// # Errors
/// * `RowCountMismatch` if there is no shared key and the lengths differ
pub fn merge(feature: Dataset, target: Dataset) -> Result<Dataset> {
    if feature.contains(JOIN_KEY) && target.contains(JOIN_KEY) {
        return inner_join(&feature, &target);
    }

    if feature.len() != target.len() {
        return Err(PipelineError::RowCountMismatch {
            feature: feature.len(),
            target: target.len(),
        });
    }

    debug!("no shared {JOIN_KEY}, concatenating {} rows by position", feature.len());
    // Same-named columns are both kept; lookups see the feature one
    Ok(feature.hstack(target))
}

/// Inner join on `main_id`
///
/// Output rows follow feature order; a feature row matching several target
/// rows is repeated once per match, in target order.
fn inner_join(feature: &Dataset, target: &Dataset) -> Result<Dataset> {
    let feature_keys = feature.values(JOIN_KEY)?;
    let target_keys = target.values(JOIN_KEY)?;

    let mut target_map = HashMap::<KeyLabel<'_>, Vec<usize>>::new();
    for (pos, key) in target_keys.iter().enumerate() {
        target_map.entry(KeyLabel::from(key)).or_default().push(pos);
    }

    let mut left_positions = Vec::new();
    let mut right_positions = Vec::new();
    for (left_pos, key) in feature_keys.iter().enumerate() {
        if let Some(matches) = target_map.get(&KeyLabel::from(key)) {
            for &right_pos in matches {
                left_positions.push(left_pos);
                right_positions.push(right_pos);
            }
        }
    }

    debug!(
        "joined on {JOIN_KEY}: {} x {} rows -> {}",
        feature.len(),
        target.len(),
        left_positions.len()
    );

    let left = feature.take_rows(&left_positions);
    let right = target
        .take_rows(&right_positions)
        .retain_columns(|c| c.name != JOIN_KEY);
    Ok(left.hstack(right))
}
