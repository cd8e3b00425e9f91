/*!
# Plotdesk

A small web backend for exploring two CSV datasets as a colour-mapped
scatter plot.

## Overview

The user uploads a *feature* CSV and a *target* CSV, then picks which
feature columns go on the X and Y axes, which are held at a constant value,
and which target column drives the marker colour. The backend merges the two
files, applies the constant filters and returns a scatter series ready for a
browser charting library (or rendered to PNG on the server).

Fitting settings chosen in the browser can be saved as
`MODEL_<yyyymmddHHMMSS>.json` and reloaded later, but only while the same
CSV files are loaded.

## Pipeline

```text
 feature.csv    target.csv
      │              │
      ▼              ▼
 ┌─────────────────────────┐
 │ dataset  parse → Value  │   Number | Text per cell
 └─────────────────────────┘
              │
              ▼
 ┌─────────────────────────┐
 │ merge    main_id join   │   or positional concat
 └─────────────────────────┘
              │
              ▼
 ┌─────────────────────────┐
 │ filter   constants, axes│
 └─────────────────────────┘
              │
              ▼
 ┌─────────────────────────┐
 │ payload  x / y / colour │
 └─────────────────────────┘
```

## Modules

- **value**: the `Number | Text` cell type and numeric coercion
- **dataset**: column-oriented table and CSV loading
- **merge**: `main_id` inner join or positional concatenation
- **filter**: constant filters and axis resolution
- **payload**: numeric scatter payload with colour range
- **plot**: end-to-end pipeline and trace/layout JSON
- **graph**: PNG rendering with plotters (web feature)
- **session**: per-user dataset paths and headers
- **model_config**: saving, loading and listing fitting configurations
- **config**: listen address and data directories
- **app**: routing and handlers (web feature)

## REST API Endpoints

- `POST /upload_csv` - Upload a feature or target CSV
- `POST /get_plot_data` - Scatter trace and layout for a selection
- `POST /plot.png` - The same selection rendered as PNG
- `GET /get_model_table_headers` - Headers of both uploaded files
- `POST /save_model_config`, `POST /load_model_config` - Fitting settings
- `GET /model_configs` - Saved configuration files
*/

pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod merge;
pub mod model_config;
pub mod payload;
pub mod plot;
pub mod session;
pub mod value;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use dataset::{Column, Dataset};
pub use error::PipelineError;
pub use filter::{ColumnSpec, PlotRequest, Role};
pub use payload::ScatterPayload;
pub use session::{FileRole, SessionData, SessionStore};
pub use value::Value;
