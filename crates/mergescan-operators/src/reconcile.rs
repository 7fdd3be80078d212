//! Bind phase: reconcile the leaf schemas of every source into one global
//! schema and record, per file, where its columns land in that schema.
//!
//! Runs once per query and reads schema metadata only. The result is
//! immutable and may be shared by any number of concurrent scans.

use serde::Serialize;

use mergescan_core::hash::{hash_serde, Hash256};
use mergescan_core::schema::{DataType, Field, Schema};
use mergescan_io::{DecoderFactory, LeafColumn};

use crate::traits::OpError;

/// Per-file bind output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceBinding {
    pub path: String,
    /// Leaf columns as enumerated at bind time, in file order.
    pub leaves: Vec<LeafColumn>,
    /// `projection[local] = global` column index.
    pub projection: Vec<usize>,
    /// Local index of the ordering column.
    pub order_index: usize,
}

impl SourceBinding {
    /// Logical types of the file's own columns, in file order.
    pub fn local_types(&self) -> Vec<DataType> {
        self.leaves
            .iter()
            .map(|l| l.physical_type.logical_type())
            .collect()
    }
}

/// Immutable output of the bind phase.
#[derive(Debug, Clone, Serialize)]
pub struct BindData {
    pub files: Vec<String>,
    pub order_by: String,
    pub schema: Schema,
    pub sources: Vec<SourceBinding>,
}

/// Two binds are the same scan when they read the same files in the same
/// order and sort by the same column.
impl PartialEq for BindData {
    fn eq(&self, other: &Self) -> bool {
        self.files == other.files && self.order_by == other.order_by
    }
}

impl Eq for BindData {}

impl BindData {
    /// Global index of the ordering column.
    pub fn order_column(&self) -> Option<usize> {
        self.schema.index_of(&self.order_by)
    }

    /// Stable digest of files, ordering column and reconciled schema.
    pub fn fingerprint(&self) -> Result<Hash256, OpError> {
        hash_serde(self).map_err(|e| OpError::Exec(format!("bind fingerprint: {}", e)))
    }
}

/// Open every file, enumerate its leaves and reconcile them.
pub fn reconcile(
    files: &[String],
    order_by: &str,
    factory: &dyn DecoderFactory,
) -> Result<BindData, OpError> {
    if files.is_empty() {
        return Err(OpError::NoInputs);
    }

    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        // Only the footer is needed; the decoder is dropped right away.
        let decoder = factory.open(path)?;
        sources.push((path.clone(), decoder.leaf_schema().to_vec()));
    }

    reconcile_leaves(&sources, order_by)
}

/// Reconcile already-enumerated leaf lists, in file order.
pub fn reconcile_leaves(
    sources: &[(String, Vec<LeafColumn>)],
    order_by: &str,
) -> Result<BindData, OpError> {
    if sources.is_empty() {
        return Err(OpError::NoInputs);
    }

    let mut schema = Schema::default();
    let mut bindings = Vec::with_capacity(sources.len());

    for (path, leaves) in sources {
        let mut projection = Vec::with_capacity(leaves.len());
        let mut order_index = None;

        for (local, leaf) in leaves.iter().enumerate() {
            if leaves[..local].iter().any(|l| l.name == leaf.name) {
                return Err(OpError::Schema(format!(
                    "column '{}' appears twice in '{}'",
                    leaf.name, path
                )));
            }

            let data_type = leaf.physical_type.logical_type();
            let global = match schema.index_of(&leaf.name) {
                Some(idx) => {
                    let existing = schema.fields[idx].data_type;
                    if existing != data_type {
                        return Err(OpError::IncompatibleSchema {
                            column: leaf.name.clone(),
                            existing,
                            found: data_type,
                            path: path.clone(),
                        });
                    }
                    idx
                }
                None => {
                    schema
                        .fields
                        .push(Field::new(leaf.name.clone(), data_type, true));
                    schema.fields.len() - 1
                }
            };
            projection.push(global);

            if leaf.name == order_by {
                order_index = Some(local);
            }
        }

        let order_index = order_index.ok_or_else(|| OpError::OrderColumnMissing {
            column: order_by.to_string(),
            path: path.clone(),
        })?;

        bindings.push(SourceBinding {
            path: path.clone(),
            leaves: leaves.clone(),
            projection,
            order_index,
        });
    }

    // The collision rule already forces one type across files.
    if let Some(field) = schema.fields.iter().find(|f| f.name == order_by) {
        if field.data_type == DataType::Any {
            return Err(OpError::UnsupportedOrderType {
                column: order_by.to_string(),
                data_type: field.data_type,
            });
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        files = sources.len(),
        columns = schema.len(),
        order_by,
        "bind complete"
    );

    Ok(BindData {
        files: sources.iter().map(|(p, _)| p.clone()).collect(),
        order_by: order_by.to_string(),
        schema,
        sources: bindings,
    })
}
