use log::debug;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::value::{Value, coerce_numeric};

/// Absolute tolerance for numeric constant filters
pub const CONSTANT_TOLERANCE: f64 = 1e-9;

/// How a feature column takes part in the plot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Restrict rows to those matching `value`
    Constant,
    #[serde(rename = "X_axis")]
    XAxis,
    #[serde(rename = "Y_axis")]
    YAxis,
}

/// One entry of the feature parameter table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(default)]
    pub value: Option<Value>,
}

impl ColumnSpec {
    pub fn constant(name: &str, value: impl Into<Value>) -> Self {
        ColumnSpec {
            name: name.to_string(),
            role: Role::Constant,
            value: Some(value.into()),
        }
    }

    pub fn axis(name: &str, role: Role) -> Self {
        ColumnSpec {
            name: name.to_string(),
            role,
            value: None,
        }
    }
}

/// The body of a plot request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotRequest {
    #[serde(rename = "featureParams", default)]
    pub feature_params: Vec<ColumnSpec>,
    #[serde(rename = "targetParam", default)]
    pub target_param: Option<String>,
}

/// Column names resolved from the parameter table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxisSelection {
    pub x: String,
    pub y: String,
    pub target: String,
}

/// Merged data with every constant filter applied
#[derive(Clone, Debug)]
pub struct FilteredDataset {
    pub data: Dataset,
    pub axes: AxisSelection,
}

/// Apply the constant filters and resolve the plot axes
///
/// Constant specs are applied in order, each narrowing the rows left by the
/// previous one. A column with at least one numeric cell is filtered
/// numerically within [`CONSTANT_TOLERANCE`]; an all-text column is matched
/// exactly as text. When a role appears more than once the last spec wins.
///
/// # Errors
/// * `MissingConstantValue` if a constant has no value
/// * `UnknownColumn` if a constant names a column that does not exist
/// * `InvalidConstantValue` if a numeric column gets a non-numeric constant
/// * `MissingAxisOrTarget` if X, Y or target is not chosen
/// * `EmptyResult` if no rows survive the filters
pub fn apply_filters(
    merged: Dataset,
    specs: &[ColumnSpec],
    target: Option<&str>,
) -> Result<FilteredDataset> {
    let mut data = merged;
    let mut x_col: Option<&str> = None;
    let mut y_col: Option<&str> = None;

    for spec in specs {
        match spec.role {
            Role::Constant => {
                let value = match &spec.value {
                    Some(v) if !v.is_blank() => v,
                    _ => return Err(PipelineError::MissingConstantValue(spec.name.clone())),
                };
                data = apply_constant(data, &spec.name, value)?;
            }
            Role::XAxis => x_col = Some(spec.name.as_str()),
            Role::YAxis => y_col = Some(spec.name.as_str()),
        }
    }

    let target = target.filter(|t| !t.is_empty());
    let (Some(x), Some(y), Some(target)) = (x_col, y_col, target) else {
        return Err(PipelineError::MissingAxisOrTarget);
    };

    if data.is_empty() {
        return Err(PipelineError::EmptyResult(
            "No data matches the selected constant filters.".to_string(),
        ));
    }

    Ok(FilteredDataset {
        data,
        axes: AxisSelection {
            x: x.to_string(),
            y: y.to_string(),
            target: target.to_string(),
        },
    })
}

/// Keep the rows of `data` whose `column` matches `value`
fn apply_constant(data: Dataset, column: &str, value: &Value) -> Result<Dataset> {
    let cells = data.values(column)?;
    let numeric = coerce_numeric(cells);

    let keep: Vec<usize> = if numeric.iter().any(|n| !n.is_nan()) {
        let constant = value
            .as_number()
            .ok_or_else(|| PipelineError::InvalidConstantValue(column.to_string()))?;
        numeric
            .iter()
            .enumerate()
            .filter(|(_, n)| (*n - constant).abs() <= CONSTANT_TOLERANCE)
            .map(|(i, _)| i)
            .collect()
    } else {
        let text = value.as_text();
        cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.as_text() == text)
            .map(|(i, _)| i)
            .collect()
    };

    debug!(
        "constant {column} = {value}: {} of {} rows kept",
        keep.len(),
        data.len()
    );
    Ok(data.take_rows(&keep))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns(vec![
            (
                "A",
                vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)],
            ),
            (
                "B",
                vec![Value::from("x"), Value::from("y"), Value::from("x")],
            ),
        ])
        .unwrap()
    }

    fn axes() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::axis("A", Role::XAxis),
            ColumnSpec::axis("A", Role::YAxis),
        ]
    }

    #[test]
    fn string_constant_matches_exactly() {
        let mut specs = vec![ColumnSpec::constant("B", "x")];
        specs.extend(axes());

        let out = apply_filters(sample(), &specs, Some("A")).unwrap();
        assert_eq!(out.data.len(), 2);
        assert_eq!(
            out.data.values("A").unwrap(),
            &[Value::Number(1.0), Value::Number(3.0)]
        );
    }

    #[test]
    fn numeric_constant_uses_absolute_tolerance() {
        let ds = Dataset::from_columns(vec![(
            "C",
            vec![
                Value::Number(0.5),
                Value::Number(0.5 + 5e-10),
                Value::Number(0.5 + 1e-8),
                Value::Number(0.4),
            ],
        )])
        .unwrap();
        let mut specs = vec![ColumnSpec::constant("C", 0.5)];
        specs.push(ColumnSpec::axis("C", Role::XAxis));
        specs.push(ColumnSpec::axis("C", Role::YAxis));

        let out = apply_filters(ds, &specs, Some("C")).unwrap();
        assert_eq!(out.data.len(), 2);
    }

    #[test]
    fn numeric_constant_accepts_text_value() {
        let mut specs = vec![ColumnSpec::constant("A", "2")];
        specs.extend(axes());

        let out = apply_filters(sample(), &specs, Some("A")).unwrap();
        assert_eq!(out.data.values("B").unwrap(), &[Value::from("y")]);
    }

    #[test]
    fn one_numeric_outlier_makes_column_numeric() {
        let ds = Dataset::from_columns(vec![(
            "M",
            vec![Value::from(""), Value::from("n/a"), Value::Number(4.0)],
        )])
        .unwrap();
        let mut specs = vec![ColumnSpec::constant("M", "n/a")];
        specs.push(ColumnSpec::axis("M", Role::XAxis));
        specs.push(ColumnSpec::axis("M", Role::YAxis));

        // Numeric column, so a text constant cannot be parsed
        assert!(matches!(
            apply_filters(ds.clone(), &specs, Some("M")),
            Err(PipelineError::InvalidConstantValue(_))
        ));

        specs[0] = ColumnSpec::constant("M", 4.0);
        let out = apply_filters(ds, &specs, Some("M")).unwrap();
        assert_eq!(out.data.len(), 1);
    }

    #[test]
    fn all_text_column_matches_as_string() {
        let ds = Dataset::from_columns(vec![(
            "M",
            vec![Value::from(""), Value::from("n/a"), Value::from("")],
        )])
        .unwrap();
        let mut specs = vec![ColumnSpec::constant("M", "n/a")];
        specs.push(ColumnSpec::axis("M", Role::XAxis));
        specs.push(ColumnSpec::axis("M", Role::YAxis));

        let out = apply_filters(ds, &specs, Some("M")).unwrap();
        assert_eq!(out.data.len(), 1);
    }

    #[test]
    fn blank_or_absent_constant_is_rejected() {
        let specs = vec![ColumnSpec::constant("B", "")];
        assert!(matches!(
            apply_filters(sample(), &specs, Some("A")),
            Err(PipelineError::MissingConstantValue(name)) if name == "B"
        ));

        let specs = vec![ColumnSpec::axis("B", Role::Constant)];
        assert!(matches!(
            apply_filters(sample(), &specs, Some("A")),
            Err(PipelineError::MissingConstantValue(_))
        ));
    }

    #[test]
    fn unknown_constant_column() {
        let specs = vec![ColumnSpec::constant("Z", "x")];
        assert!(matches!(
            apply_filters(sample(), &specs, Some("A")),
            Err(PipelineError::UnknownColumn(name)) if name == "Z"
        ));
    }

    #[test]
    fn missing_axis_or_target() {
        let specs = vec![ColumnSpec::axis("A", Role::XAxis)];
        assert!(matches!(
            apply_filters(sample(), &specs, Some("A")),
            Err(PipelineError::MissingAxisOrTarget)
        ));
        assert!(matches!(
            apply_filters(sample(), &axes(), Some("")),
            Err(PipelineError::MissingAxisOrTarget)
        ));
        assert!(matches!(
            apply_filters(sample(), &axes(), None),
            Err(PipelineError::MissingAxisOrTarget)
        ));
    }

    #[test]
    fn later_axis_spec_overrides_earlier() {
        let specs = vec![
            ColumnSpec::axis("A", Role::XAxis),
            ColumnSpec::axis("B", Role::XAxis),
            ColumnSpec::axis("A", Role::YAxis),
        ];
        let out = apply_filters(sample(), &specs, Some("A")).unwrap();
        assert_eq!(out.axes.x, "B");
        assert_eq!(out.axes.y, "A");
    }

    #[test]
    fn empty_result_after_all_filters() {
        // The first filter empties the data; the second still runs
        let mut specs = vec![
            ColumnSpec::constant("B", "nope"),
            ColumnSpec::constant("A", 1.0),
        ];
        specs.extend(axes());
        assert!(matches!(
            apply_filters(sample(), &specs, Some("A")),
            Err(PipelineError::EmptyResult(_))
        ));
    }

    #[test]
    fn request_json_shape() {
        let body = r#"{
            "featureParams": [
                {"name": "B", "type": "Constant", "value": "x"},
                {"name": "A", "type": "X_axis", "value": null},
                {"name": "A", "type": "Y_axis"}
            ],
            "targetParam": "T"
        }"#;
        let req: PlotRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.feature_params.len(), 3);
        assert_eq!(req.feature_params[0], ColumnSpec::constant("B", "x"));
        assert_eq!(req.feature_params[1].role, Role::XAxis);
        assert_eq!(req.feature_params[2].value, None);
        assert_eq!(req.target_param.as_deref(), Some("T"));
    }
}
