// Dataset references, column selection, and client-side tables

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NimbusError, Result};
use crate::models::key_name;

/// One column of a remote frame's schema. The type tag is whatever the
/// server reports (`int`, `real`, `enum`, `string`, `time`, `uuid`) and is
/// carried through without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// Reference to a dataset living on the cluster. Only the key and the column
/// schema are held client-side; the data itself never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub key: String,
    pub rows: u64,
    pub columns: Vec<ColumnSpec>,
}

impl Frame {
    /// Parse the first entry of a `{"frames": [...]}` payload.
    pub(crate) fn from_frames_payload(payload: &Value) -> Result<Self> {
        let frame = payload
            .get("frames")
            .and_then(|v| v.as_array())
            .and_then(|frames| frames.first())
            .ok_or_else(|| {
                NimbusError::MalformedResponse("frames payload carries no frame entry".to_string())
            })?;
        let key = frame.get("frame_id").and_then(key_name).ok_or_else(|| {
            NimbusError::MalformedResponse("frame entry has no frame_id".to_string())
        })?;
        let rows = frame.get("rows").and_then(|v| v.as_u64()).unwrap_or(0);
        let columns = frame
            .get("columns")
            .cloned()
            .map(serde_json::from_value::<Vec<ColumnSpec>>)
            .transpose()
            .map_err(|e| {
                NimbusError::MalformedResponse(format!("frame columns do not parse: {}", e))
            })?
            .unwrap_or_default();
        Ok(Self { key, rows, columns })
    }

    pub fn column_labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.columns.iter().any(|c| c.label == label)
    }

    /// Resolve one selector to a column label.
    pub fn resolve(&self, selector: &ColumnSelector) -> Result<String> {
        match selector {
            ColumnSelector::Name(name) => {
                if self.has_column(name) {
                    Ok(name.clone())
                } else {
                    Err(NimbusError::InvalidArgument(format!(
                        "frame {} has no column named {:?}",
                        self.key, name
                    )))
                }
            }
            ColumnSelector::Index(index) => self
                .columns
                .get(*index)
                .map(|c| c.label.clone())
                .ok_or_else(|| {
                    NimbusError::InvalidArgument(format!(
                        "column index {} out of range for frame {} ({} columns)",
                        index,
                        self.key,
                        self.columns.len()
                    ))
                }),
        }
    }

    /// Resolve a predictor selection to labels, in the order given.
    pub fn resolve_selection(&self, selectors: &[ColumnSelector]) -> Result<Vec<String>> {
        let mut labels = Vec::with_capacity(selectors.len());
        for selector in selectors {
            labels.push(self.resolve(selector)?);
        }
        Ok(labels)
    }

    /// Complement encoding for the wire: every column that is neither a
    /// predictor nor the response gets listed as ignored.
    pub fn ignored_columns(&self, predictors: &[String], response: &str) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.label.as_str())
            .filter(|label| *label != response && !predictors.iter().any(|p| p == label))
            .map(|label| label.to_string())
            .collect()
    }
}

/// Resolve a response selector plus an optional predictor selection into the
/// response label and the ignored-columns complement. The response never
/// doubles as a predictor, even when selected as one.
pub(crate) fn resolve_columns(
    frame: &Frame,
    response: &ColumnSelector,
    predictors: Option<&[ColumnSelector]>,
) -> Result<(String, Vec<String>)> {
    let response = frame.resolve(response)?;
    let predictors: Vec<String> = match predictors {
        Some(selectors) => frame
            .resolve_selection(selectors)?
            .into_iter()
            .filter(|label| *label != response)
            .collect(),
        None => frame
            .column_labels()
            .into_iter()
            .filter(|label| *label != response)
            .map(|label| label.to_string())
            .collect(),
    };
    let ignored = frame.ignored_columns(&predictors, &response);
    Ok((response, ignored))
}

/// Column reference, by label or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    Name(String),
    Index(usize),
}

impl From<&str> for ColumnSelector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ColumnSelector {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for ColumnSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Cell of a client-side table destined for upload.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Str(String),
    Num(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

/// Small table assembled client-side and shipped to the cluster as CSV.
/// Constraint tables are the main user of this.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl LocalTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(NimbusError::InvalidArgument(format!(
                "row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table as CSV, header first.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        append_csv_row(&mut out, self.columns.iter().map(|c| csv_field(c)));
        for row in &self.rows {
            append_csv_row(
                &mut out,
                row.iter().map(|cell| match cell {
                    Cell::Str(s) => csv_field(s),
                    Cell::Num(n) => n.to_string(),
                }),
            );
        }
        out
    }
}

fn append_csv_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        out.push_str(&field);
        first = false;
    }
    out.push('\n');
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
