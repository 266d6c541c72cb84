//! Frame - a small column-named table of JSON values.
//!
//! Enough of a dataframe to carry records between tasks: select columns,
//! take rows, convert to and from a numeric matrix. Serializes as
//! `{"columns": [...], "rows": [[...], ...]}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::TrainingError;

pub type Matrix = Vec<Vec<f64>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Unchecked wire form; `Frame` validates it on deserialize.
#[derive(Deserialize)]
struct RawFrame {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl TryFrom<RawFrame> for Frame {
    type Error = TrainingError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        Frame::new(raw.columns, raw.rows)
    }
}

impl Frame {
    /// Every row must have one value per column; names must be unique.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TrainingError> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(TrainingError::DuplicateColumn {
                    column: name.clone(),
                });
            }
        }
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(TrainingError::RaggedRow {
                row,
                expected: columns.len(),
                actual: values.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    /// Build from a list of JSON objects. Columns are the union of the keys,
    /// in order of first appearance; a key missing from a record is `null`.
    pub fn from_records(records: Vec<Value>) -> Result<Self, TrainingError> {
        let mut objects: Vec<Map<String, Value>> = Vec::with_capacity(records.len());
        for (row, record) in records.into_iter().enumerate() {
            match record {
                Value::Object(map) => objects.push(map),
                _ => return Err(TrainingError::NotARecord { row }),
            }
        }

        let mut columns: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = objects
            .into_iter()
            .map(|mut object| {
                columns
                    .iter()
                    .map(|c| object.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn from_matrix(columns: Vec<String>, matrix: &[Vec<f64>]) -> Result<Self, TrainingError> {
        let rows = matrix
            .iter()
            .map(|row| row.iter().map(|&x| number(x)).collect())
            .collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TrainingError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TrainingError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn column(&self, name: &str) -> Result<Vec<&Value>, TrainingError> {
        let i = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| &r[i]).collect())
    }

    /// Keep `names`, in that order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame, TrainingError> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let columns = names.iter().map(|n| n.as_ref().to_string()).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Frame::new(columns, rows)
    }

    /// Rows at `indices`, in that order. Out-of-range indices are ignored.
    pub fn take(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Keep the rows for which `keep` returns true.
    pub fn filter_rows(self, keep: impl Fn(&[Value]) -> bool) -> Frame {
        Frame {
            columns: self.columns,
            rows: self.rows.into_iter().filter(|r| keep(r)).collect(),
        }
    }

    /// Append a column; `values` must have one entry per row.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<Frame, TrainingError> {
        let name = name.into();
        if self.columns.contains(&name) {
            return Err(TrainingError::DuplicateColumn { column: name });
        }
        if values.len() != self.rows.len() {
            return Err(TrainingError::ShapeMismatch {
                left_rows: self.rows.len(),
                left_cols: self.columns.len(),
                right_rows: values.len(),
                right_cols: 1,
            });
        }
        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(self)
    }

    pub fn without_column(mut self, name: &str) -> Result<Frame, TrainingError> {
        let i = self.column_index(name)?;
        self.columns.remove(i);
        for row in &mut self.rows {
            row.remove(i);
        }
        Ok(self)
    }

    /// Row-major numeric matrix. Numbers and booleans convert, anything else
    /// is an error naming the cell.
    pub fn to_matrix(&self) -> Result<Matrix, TrainingError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, values)| {
                values
                    .iter()
                    .enumerate()
                    .map(|(col, v)| {
                        as_f64(v).ok_or_else(|| TrainingError::NotNumeric {
                            column: self.columns[col].clone(),
                            row,
                            value: v.to_string(),
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// JSON has no NaN or infinity; those become `null`.
fn number(x: f64) -> Value {
    Number::from_f64(x).map_or(Value::Null, Value::Number)
}
