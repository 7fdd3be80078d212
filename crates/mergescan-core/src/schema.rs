//! Logical and physical schema types. Pure data; no Arrow dependency here.
//!
//! Decoders report columns with a `PhysicalType` (how the file stores them).
//! The bind phase maps each one to a canonical logical `DataType` and the
//! merged output is described by a `Schema` of logical fields.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical column type of the merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int8,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    /// Untyped placeholder for storage types the scan does not decode.
    Any,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Int8 => "int8",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Utf8 => "utf8",
            DataType::Any => "any",
        };
        f.write_str(s)
    }
}

/// Storage type of a leaf column as reported by a file decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    ByteArray,
    FixedLenByteArray,
}

impl PhysicalType {
    /// Canonical logical type for this storage type.
    ///
    /// Booleans become `Int8`, not a boolean type.
    pub fn logical_type(self) -> DataType {
        match self {
            PhysicalType::Int32 => DataType::Int32,
            PhysicalType::Int64 => DataType::Int64,
            PhysicalType::Double => DataType::Float64,
            PhysicalType::Float => DataType::Float32,
            PhysicalType::ByteArray | PhysicalType::FixedLenByteArray => DataType::Utf8,
            PhysicalType::Boolean => DataType::Int8,
            PhysicalType::Int96 => DataType::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field.name, field.data_type)?;
        }
        Ok(())
    }
}
