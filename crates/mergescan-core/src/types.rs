//! Lightweight scalar/column/batch types shared by decoders and the merge.
//!
//! Decoders convert whatever they read (Arrow arrays for Parquet) into these
//! so the merge core stays independent of any file format.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    I8(i8),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Any,
            Scalar::I8(_) => DataType::Int8,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Total order used by the merge.
    ///
    /// Nulls sort first, NaN sorts after every other float, and values of
    /// different types order by variant.
    pub fn order_cmp(&self, other: &Scalar) -> Ordering {
        use Scalar::*;

        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (I8(x), I8(y)) => x.cmp(y),
            (I32(x), I32(y)) => x.cmp(y),
            (I64(x), I64(y)) => x.cmp(y),
            (F32(x), F32(y)) => float_cmp(f64::from(*x), f64::from(*y)),
            (F64(x), F64(y)) => float_cmp(*x, *y),
            (Str(x), Str(y)) => x.cmp(y),
            _ => self.type_order().cmp(&other.type_order()),
        }
    }

    fn type_order(&self) -> u8 {
        use Scalar::*;
        match self {
            Null => 0,
            I8(_) => 1,
            I32(_) => 2,
            I64(_) => 3,
            F32(_) => 4,
            F64(_) => 5,
            Str(_) => 6,
        }
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Columnar batch of rows. All columns hold the same number of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// A zero-row batch carrying the column names of `schema`.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            columns: schema
                .fields
                .iter()
                .map(|f| Column::new(f.name.clone(), Vec::new()))
                .collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Value at `(column, row)`. Panics when out of bounds, like slice indexing.
    pub fn value(&self, column: usize, row: usize) -> &Scalar {
        &self.columns[column].values[row]
    }

    /// Copy rows `start..end` into a new batch.
    pub fn slice(&self, start: usize, end: usize) -> RowBatch {
        RowBatch {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values[start..end].to_vec()))
                .collect(),
        }
    }

    /// Check that every column has the same length.
    pub fn validate(&self) -> Result<(), String> {
        let rows = self.num_rows();
        for col in &self.columns {
            if col.len() != rows {
                return Err(format!(
                    "column '{}' has {} values, expected {}",
                    col.name,
                    col.len(),
                    rows
                ));
            }
        }
        Ok(())
    }

    /// Append all rows of `other` (same column layout) to this batch.
    pub fn extend_from(&mut self, other: &RowBatch) -> Result<(), String> {
        if self.columns.is_empty() {
            self.columns = other.columns.clone();
            return Ok(());
        }
        if self.columns.len() != other.columns.len() {
            return Err(format!(
                "cannot append batch with {} columns to batch with {}",
                other.columns.len(),
                self.columns.len()
            ));
        }
        for (dst, src) in self.columns.iter_mut().zip(&other.columns) {
            dst.values.extend(src.values.iter().cloned());
        }
        Ok(())
    }
}
