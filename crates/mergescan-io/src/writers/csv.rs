//! Streaming CSV writer. The header row is written before the first batch.

use std::fs::File;
use std::io::Write;

use crate::error::Result;
use crate::writers::BatchSink;
use mergescan_core::types::{RowBatch, Scalar};

pub struct CsvWriter<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl CsvWriter<File> {
    pub fn to_path(path: &str) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            header_written: false,
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::Error::Io(e.into_error()))
    }
}

impl<W: Write> BatchSink for CsvWriter<W> {
    fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        if !self.header_written {
            self.writer
                .write_record(batch.columns.iter().map(|c| c.name.as_str()))?;
            self.header_written = true;
        }
        for r in 0..batch.num_rows() {
            self.writer
                .write_record(batch.columns.iter().map(|c| scalar_to_field(&c.values[r])))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn scalar_to_field(v: &Scalar) -> String {
    match v {
        Scalar::Null => String::new(),
        Scalar::I8(i) => i.to_string(),
        Scalar::I32(i) => i.to_string(),
        Scalar::I64(i) => i.to_string(),
        Scalar::F32(f) => f.to_string(),
        Scalar::F64(f) => f.to_string(),
        Scalar::Str(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergescan_core::types::Column;

    #[test]
    fn header_once_then_rows() {
        let batch = RowBatch::new(vec![
            Column::new("ts", vec![Scalar::I64(1)]),
            Column::new("msg", vec![Scalar::Str("x,y".into())]),
        ]);
        let mut w = CsvWriter::to_writer(Vec::new());
        w.write_batch(&batch).unwrap();
        w.write_batch(&batch).unwrap();
        w.finish().unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(out, "ts,msg\n1,\"x,y\"\n1,\"x,y\"\n");
    }
}
