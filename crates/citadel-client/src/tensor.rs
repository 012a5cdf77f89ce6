//! Dense tensors and the named-field batch container they travel in.

use std::collections::BTreeMap;
use std::ops::Range;

use citadel_stream::{ByteBuffer, StreamError, StreamResult};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Field name carrying the label tensor of a batch.
pub const LABELS_FIELD: &str = "labels";

/// Field name prefix carrying input column `<i>` of a batch.
pub const COLUMN_FIELD_PREFIX: &str = "samples_";

/// Dense row-major numeric tensor.
///
/// The leading axis is the sample axis wherever a tensor represents a
/// dataset column or label vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl Tensor {
    /// Create a tensor, checking that `values` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(ClientError::Schema(format!(
                "shape {shape:?} expects {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// One-dimensional tensor over `values`.
    #[must_use]
    pub fn vector(values: Vec<f32>) -> Self {
        Self { shape: vec![values.len()], values }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Size of the leading (sample) axis.
    #[must_use]
    pub fn nb_rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Number of values in one row.
    #[must_use]
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Slice a run of rows along the leading axis.
    ///
    /// # Panics
    /// Panics if `rows` is out of bounds; callers derive ranges from
    /// `nb_rows`.
    #[must_use]
    pub fn slice_rows(&self, rows: Range<usize>) -> Self {
        let row_len = self.row_len();
        let mut shape = self.shape.clone();
        shape[0] = rows.len();
        let values = self.values[rows.start * row_len..rows.end * row_len].to_vec();
        Self { shape, values }
    }

    /// Concatenate tensors along the leading axis.
    pub fn concat_rows(parts: &[Self]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(ClientError::Schema("cannot concatenate zero tensors".to_string()));
        };
        let mut shape = first.shape.clone();
        let mut values = Vec::new();
        let mut rows = 0;
        for part in parts {
            if part.shape.get(1..) != first.shape.get(1..) {
                return Err(ClientError::Schema(format!(
                    "row shape mismatch: {:?} vs {:?}",
                    part.shape, first.shape
                )));
            }
            rows += part.nb_rows();
            values.extend_from_slice(&part.values);
        }
        shape[0] = rows;
        Ok(Self { shape, values })
    }
}

/// Named-field container for one batch of samples: input columns under
/// `samples_<i>`, labels under `labels`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataWrapper {
    fields: BTreeMap<String, Tensor>,
}

impl DataWrapper {
    /// Wrap one batch's column slices and labels.
    #[must_use]
    pub fn from_batch(columns: Vec<Tensor>, labels: Tensor) -> Self {
        let mut fields = BTreeMap::new();
        for (i, column) in columns.into_iter().enumerate() {
            fields.insert(format!("{COLUMN_FIELD_PREFIX}{i}"), column);
        }
        fields.insert(LABELS_FIELD.to_string(), labels);
        Self { fields }
    }

    /// Insert a named field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.fields.insert(name.into(), tensor);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.fields.get(name)
    }

    /// Iterate the named fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.fields.iter().map(|(name, tensor)| (name.as_str(), tensor))
    }
}

/// Artifact serializer for batch containers (encoder collaborator).
pub fn write_wrapper(wrapper: &DataWrapper, buffer: &mut ByteBuffer) -> StreamResult<()> {
    let bytes =
        serde_json::to_vec(wrapper).map_err(|e| StreamError::Serialize(e.to_string()))?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Artifact deserializer for batch containers (decoder collaborator).
pub fn read_wrapper(payload: &[u8]) -> StreamResult<DataWrapper> {
    serde_json::from_slice(payload).map_err(|e| StreamError::Deserialize(e.to_string()))
}
