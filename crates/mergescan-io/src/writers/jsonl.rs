//! Streaming NDJSON writer.

use std::fs::File;
use std::io::{BufWriter, Write};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::writers::BatchSink;
use mergescan_core::types::{RowBatch, Scalar};

/// Keys each object by the column names of the batch being written.
pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
}

impl JsonlWriter<File> {
    pub fn to_path(path: &str) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::Error::Io(e.into_error()))
    }
}

impl<W: Write> BatchSink for JsonlWriter<W> {
    /// Write a batch as one JSON object per line.
    fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        for r in 0..batch.num_rows() {
            let mut obj = Map::new();
            for col in &batch.columns {
                obj.insert(col.name.clone(), scalar_to_json(&col.values[r]));
            }
            serde_json::to_writer(&mut self.writer, &obj)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn scalar_to_json(v: &Scalar) -> Value {
    use Scalar::*;
    match v {
        Null => Value::Null,
        I8(i) => Value::from(*i),
        I32(i) => Value::from(*i),
        I64(i) => Value::from(*i),
        F32(f) => Value::from(*f as f64),
        F64(f) => Value::from(*f),
        Str(s) => Value::String(s.clone()),
    }
}
