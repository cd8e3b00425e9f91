use log::info;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};

use crate::dataset::load_dataset;
use crate::error::Result;
use crate::filter::{PlotRequest, apply_filters};
use crate::merge::merge;
use crate::payload::{ScatterPayload, build_payload};
use crate::session::SessionData;

/// Colour scale used for the target value
pub const COLOR_SCALE: &str = "Jet";

/// Marker size in pixels
pub const MARKER_SIZE: u32 = 10;

/// Run the whole plot pipeline for one request
///
/// Both datasets are read fresh from the paths recorded in the session,
/// merged, filtered by the request's constant specs and reduced to a scatter
/// payload.
///
/// # Errors
/// Any [`crate::error::PipelineError`] raised by loading, merging, filtering
/// or payload construction.
pub fn build_plot(session: &SessionData, request: &PlotRequest) -> Result<ScatterPayload> {
    let feature = load_dataset(session.feature_filepath.as_deref())?;
    let target = load_dataset(session.target_filepath.as_deref())?;

    let merged = merge(feature, target)?;
    let filtered = apply_filters(
        merged,
        &request.feature_params,
        request.target_param.as_deref(),
    )?;
    let payload = build_payload(&filtered)?;

    info!(
        "plot {} vs {} coloured by {}: {} points",
        payload.x_label,
        payload.y_label,
        payload.color_label,
        payload.len()
    );
    Ok(payload)
}

/// Trace list and layout in the shape a browser charting library consumes
///
/// Both are JSON documents encoded as strings, matching what the front end
/// parses before drawing.
#[derive(Debug, Serialize)]
pub struct PlotFigure {
    pub graph_json: String,
    pub layout_json: String,
    pub payload: ScatterPayload,
}

impl PlotFigure {
    pub fn new(payload: ScatterPayload) -> Self {
        let graph_json = scatter_traces(&payload).to_string();
        let layout_json = layout(&payload).to_string();
        PlotFigure {
            graph_json,
            layout_json,
            payload,
        }
    }
}

/// A single WebGL scatter trace coloured by the target column
pub fn scatter_traces(payload: &ScatterPayload) -> JsonValue {
    let hover = format!(
        "<b>{}:</b> %{{x}}<br><b>{}:</b> %{{y}}<br><b>{}:</b> %{{marker.color}}<extra></extra>",
        payload.x_label, payload.y_label, payload.color_label
    );

    json!([{
        "type": "scattergl",
        "mode": "markers",
        "x": payload.x,
        "y": payload.y,
        "marker": {
            "size": MARKER_SIZE,
            "color": payload.color,
            "colorscale": COLOR_SCALE,
            "colorbar": { "title": { "text": payload.color_label } },
            "cmin": payload.color_min,
            "cmax": payload.color_max,
            "showscale": true,
        },
        "hoverinfo": "x+y+z",
        "hovertemplate": hover,
    }])
}

pub fn layout(payload: &ScatterPayload) -> JsonValue {
    json!({
        "title": { "text": plot_title(payload) },
        "xaxis": { "title": { "text": payload.x_label }, "automargin": true },
        "yaxis": { "title": { "text": payload.y_label }, "automargin": true },
        "hovermode": "closest",
        "margin": { "t": 50, "b": 50, "l": 50, "r": 50 },
        // keep zoom/pan across redraws
        "uirevision": "true",
    })
}

pub fn plot_title(payload: &ScatterPayload) -> String {
    format!(
        "Scatter Plot: {} vs {} and {}",
        payload.color_label, payload.x_label, payload.y_label
    )
}
