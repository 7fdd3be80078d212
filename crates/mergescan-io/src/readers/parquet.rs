//! Parquet decoder (enabled with `--features parquet`).
//!
//! Opens the file once to read its footer, exposes top-level primitive columns
//! as leaves (group columns and everything below them are dropped), and
//! decodes batches through the arrow-rs record batch reader. Arrow arrays are
//! converted to `Scalar` columns following the physical → logical type table.

use std::fs::File;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    Time32MillisecondType, Time32SecondType, Time64MicrosecondType, Time64NanosecondType,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrowPrimitiveType, RecordBatch};
use arrow_schema::{DataType as ArrowType, TimeUnit};
use parquet::arrow::arrow_reader::{
    ArrowReaderOptions, ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder,
};
use parquet::arrow::ProjectionMask;
use parquet::basic::Type as StorageType;

use mergescan_core::schema::{DataType, PhysicalType};
use mergescan_core::types::{Column, RowBatch, Scalar};

use crate::decoder::{ColumnDecoder, DecoderFactory, LeafColumn};
use crate::error::{Error, Result};

/// Opens `ParquetDecoder`s from the local filesystem.
#[derive(Debug, Clone)]
pub struct ParquetDecoderFactory {
    batch_size: usize,
}

impl ParquetDecoderFactory {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for ParquetDecoderFactory {
    fn default() -> Self {
        Self::new(2048)
    }
}

impl DecoderFactory for ParquetDecoderFactory {
    fn open(&self, path: &str) -> Result<Box<dyn ColumnDecoder>> {
        Ok(Box::new(ParquetDecoder::from_path(path, self.batch_size)?))
    }
}

/// Decoder over one Parquet file.
///
/// Leaves are the top-level primitive fields only; primitives nested inside a
/// group are dropped along with the group rather than exposed as leaves.
pub struct ParquetDecoder {
    path: String,
    batch_size: usize,
    leaves: Vec<LeafColumn>,
    /// Indices of the leaf columns among the root fields.
    root_indices: Vec<usize>,
    num_row_groups: usize,
    builder: Option<ParquetRecordBatchReaderBuilder<File>>,
    reader: Option<ParquetRecordBatchReader>,
}

impl ParquetDecoder {
    pub fn from_path(path: &str, batch_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        // Column types come from the Parquet schema alone, never from an
        // embedded Arrow schema, so dictionary/large variants never appear.
        let options = ArrowReaderOptions::new().with_skip_arrow_metadata(true);
        let builder = ParquetRecordBatchReaderBuilder::try_new_with_options(file, options)?;

        let mut leaves = Vec::new();
        let mut root_indices = Vec::new();
        for (idx, field) in builder
            .parquet_schema()
            .root_schema()
            .get_fields()
            .iter()
            .enumerate()
        {
            if !field.is_primitive() {
                continue;
            }
            leaves.push(LeafColumn::new(
                field.name(),
                map_storage_type(field.get_physical_type()),
            ));
            root_indices.push(idx);
        }
        let num_row_groups = builder.metadata().num_row_groups();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            path,
            leaves = leaves.len(),
            dropped = builder.parquet_schema().root_schema().get_fields().len() - leaves.len(),
            row_groups = num_row_groups,
            "opened parquet source"
        );

        Ok(Self {
            path: path.to_string(),
            batch_size,
            leaves,
            root_indices,
            num_row_groups,
            builder: Some(builder),
            reader: None,
        })
    }

    fn convert(&self, batch: &RecordBatch) -> Result<RowBatch> {
        if batch.num_columns() != self.leaves.len() {
            return Err(Error::Decode(format!(
                "{}: decoded {} columns, expected {}",
                self.path,
                batch.num_columns(),
                self.leaves.len()
            )));
        }
        let columns = self
            .leaves
            .iter()
            .zip(batch.columns())
            .map(|(leaf, array)| {
                array_to_scalars(array.as_ref(), leaf.physical_type.logical_type())
                    .map(|values| Column::new(leaf.name.clone(), values))
                    .map_err(|e| {
                        Error::Decode(format!("{}: column '{}': {}", self.path, leaf.name, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RowBatch::new(columns))
    }

    fn empty_batch(&self) -> RowBatch {
        RowBatch::new(
            self.leaves
                .iter()
                .map(|l| Column::new(l.name.clone(), Vec::new()))
                .collect(),
        )
    }
}

impl ColumnDecoder for ParquetDecoder {
    fn leaf_schema(&self) -> &[LeafColumn] {
        &self.leaves
    }

    fn num_row_groups(&self) -> usize {
        self.num_row_groups
    }

    fn init_scan(&mut self, row_groups: Vec<usize>) -> Result<()> {
        let builder = self
            .builder
            .take()
            .ok_or_else(|| Error::State(format!("{}: scan already initialized", self.path)))?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), self.root_indices.clone());
        let reader = builder
            .with_projection(mask)
            .with_row_groups(row_groups)
            .with_batch_size(self.batch_size)
            .build()?;
        self.reader = Some(reader);
        Ok(())
    }

    fn next_batch(&mut self) -> Result<RowBatch> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::State(format!("{}: next_batch before init_scan", self.path)))?;
        match reader.next() {
            Some(batch) => {
                let batch = batch?;
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    path = %self.path,
                    rows = batch.num_rows(),
                    "decoded parquet batch"
                );
                self.convert(&batch)
            }
            None => Ok(self.empty_batch()),
        }
    }
}

fn map_storage_type(t: StorageType) -> PhysicalType {
    match t {
        StorageType::BOOLEAN => PhysicalType::Boolean,
        StorageType::INT32 => PhysicalType::Int32,
        StorageType::INT64 => PhysicalType::Int64,
        StorageType::INT96 => PhysicalType::Int96,
        StorageType::FLOAT => PhysicalType::Float,
        StorageType::DOUBLE => PhysicalType::Double,
        StorageType::BYTE_ARRAY => PhysicalType::ByteArray,
        StorageType::FIXED_LEN_BYTE_ARRAY => PhysicalType::FixedLenByteArray,
    }
}

/// Convert one Arrow array into scalars of the target logical type.
///
/// Unsigned and decimal columns keep their integer value and fail when it
/// does not fit the signed target. Decimals decode as the unscaled integer.
/// Arrow types with no sensible mapping (intervals, INT96 timestamps) decode
/// as nulls.
fn array_to_scalars(
    array: &dyn Array,
    target: DataType,
) -> std::result::Result<Vec<Scalar>, String> {
    let converted = match target {
        DataType::Int8 => array.as_boolean_opt().map(|arr| {
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        Scalar::Null
                    } else {
                        Scalar::I8(arr.value(i) as i8)
                    }
                })
                .collect()
        }),
        DataType::Int32 => match array.data_type() {
            ArrowType::Int32 => primitive::<Int32Type, _>(array, Scalar::I32),
            ArrowType::Int16 => primitive::<Int16Type, _>(array, |v| Scalar::I32(v.into())),
            ArrowType::Int8 => primitive::<Int8Type, _>(array, |v| Scalar::I32(v.into())),
            ArrowType::UInt8 => primitive::<UInt8Type, _>(array, |v| Scalar::I32(v.into())),
            ArrowType::UInt16 => primitive::<UInt16Type, _>(array, |v| Scalar::I32(v.into())),
            ArrowType::UInt32 => {
                checked::<UInt32Type, _>(array, target, |v| {
                    i32::try_from(v).ok().map(Scalar::I32)
                })?
            }
            ArrowType::Decimal128(..) => {
                checked::<Decimal128Type, _>(array, target, |v| {
                    i32::try_from(v).ok().map(Scalar::I32)
                })?
            }
            ArrowType::Date32 => primitive::<Date32Type, _>(array, Scalar::I32),
            ArrowType::Time32(TimeUnit::Second) => {
                primitive::<Time32SecondType, _>(array, Scalar::I32)
            }
            ArrowType::Time32(TimeUnit::Millisecond) => {
                primitive::<Time32MillisecondType, _>(array, Scalar::I32)
            }
            _ => None,
        },
        DataType::Int64 => match array.data_type() {
            ArrowType::Int64 => primitive::<Int64Type, _>(array, Scalar::I64),
            ArrowType::UInt64 => {
                checked::<UInt64Type, _>(array, target, |v| {
                    i64::try_from(v).ok().map(Scalar::I64)
                })?
            }
            ArrowType::Decimal128(..) => {
                checked::<Decimal128Type, _>(array, target, |v| {
                    i64::try_from(v).ok().map(Scalar::I64)
                })?
            }
            ArrowType::Date64 => primitive::<Date64Type, _>(array, Scalar::I64),
            ArrowType::Time64(TimeUnit::Microsecond) => {
                primitive::<Time64MicrosecondType, _>(array, Scalar::I64)
            }
            ArrowType::Time64(TimeUnit::Nanosecond) => {
                primitive::<Time64NanosecondType, _>(array, Scalar::I64)
            }
            ArrowType::Timestamp(TimeUnit::Second, _) => {
                primitive::<TimestampSecondType, _>(array, Scalar::I64)
            }
            ArrowType::Timestamp(TimeUnit::Millisecond, _) => {
                primitive::<TimestampMillisecondType, _>(array, Scalar::I64)
            }
            ArrowType::Timestamp(TimeUnit::Microsecond, _) => {
                primitive::<TimestampMicrosecondType, _>(array, Scalar::I64)
            }
            ArrowType::Timestamp(TimeUnit::Nanosecond, _) => {
                primitive::<TimestampNanosecondType, _>(array, Scalar::I64)
            }
            _ => None,
        },
        DataType::Float32 => primitive::<Float32Type, _>(array, Scalar::F32),
        DataType::Float64 => primitive::<Float64Type, _>(array, Scalar::F64),
        DataType::Utf8 => strings(array),
        DataType::Any => None,
    };
    Ok(converted.unwrap_or_else(|| vec![Scalar::Null; array.len()]))
}

fn primitive<T, F>(array: &dyn Array, f: F) -> Option<Vec<Scalar>>
where
    T: ArrowPrimitiveType,
    F: Fn(T::Native) -> Scalar,
{
    let arr = array.as_primitive_opt::<T>()?;
    Some(
        (0..arr.len())
            .map(|i| {
                if arr.is_null(i) {
                    Scalar::Null
                } else {
                    f(arr.value(i))
                }
            })
            .collect(),
    )
}

/// Like `primitive`, but `f` returns `None` for a value the target cannot hold.
fn checked<T, F>(
    array: &dyn Array,
    target: DataType,
    f: F,
) -> std::result::Result<Option<Vec<Scalar>>, String>
where
    T: ArrowPrimitiveType,
    F: Fn(T::Native) -> Option<Scalar>,
{
    let Some(arr) = array.as_primitive_opt::<T>() else {
        return Ok(None);
    };
    let mut out = Vec::with_capacity(arr.len());
    for i in 0..arr.len() {
        if arr.is_null(i) {
            out.push(Scalar::Null);
            continue;
        }
        let v = arr.value(i);
        match f(v) {
            Some(s) => out.push(s),
            None => {
                return Err(format!(
                    "{} value {:?} at row {} does not fit {}",
                    array.data_type(),
                    v,
                    i,
                    target
                ))
            }
        }
    }
    Ok(Some(out))
}

/// Byte arrays always decode as strings; invalid UTF-8 is replaced.
fn strings(array: &dyn Array) -> Option<Vec<Scalar>> {
    let lift = |is_null: bool, s: String| if is_null { Scalar::Null } else { Scalar::Str(s) };
    match array.data_type() {
        ArrowType::Utf8 => {
            let arr = array.as_string_opt::<i32>()?;
            Some(
                (0..arr.len())
                    .map(|i| lift(arr.is_null(i), arr.value(i).to_string()))
                    .collect(),
            )
        }
        ArrowType::LargeUtf8 => {
            let arr = array.as_string_opt::<i64>()?;
            Some(
                (0..arr.len())
                    .map(|i| lift(arr.is_null(i), arr.value(i).to_string()))
                    .collect(),
            )
        }
        ArrowType::Binary => {
            let arr = array.as_binary_opt::<i32>()?;
            Some(
                (0..arr.len())
                    .map(|i| {
                        lift(
                            arr.is_null(i),
                            String::from_utf8_lossy(arr.value(i)).into_owned(),
                        )
                    })
                    .collect(),
            )
        }
        ArrowType::LargeBinary => {
            let arr = array.as_binary_opt::<i64>()?;
            Some(
                (0..arr.len())
                    .map(|i| {
                        lift(
                            arr.is_null(i),
                            String::from_utf8_lossy(arr.value(i)).into_owned(),
                        )
                    })
                    .collect(),
            )
        }
        ArrowType::FixedSizeBinary(_) => {
            let arr = array.as_fixed_size_binary_opt()?;
            Some(
                (0..arr.len())
                    .map(|i| {
                        lift(
                            arr.is_null(i),
                            String::from_utf8_lossy(arr.value(i)).into_owned(),
                        )
                    })
                    .collect(),
            )
        }
        _ => None,
    }
}
