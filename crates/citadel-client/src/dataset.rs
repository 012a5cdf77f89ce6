//! In-memory datasets: column tensors plus labels, batched for transfer.

use crate::error::{ClientError, Result};
use crate::tensor::{DataWrapper, Tensor, COLUMN_FIELD_PREFIX, LABELS_FIELD};

/// A typed in-memory dataset: one tensor per input column plus a label
/// tensor, all sharing the leading sample axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDataset {
    columns: Vec<Tensor>,
    labels: Tensor,
}

impl TensorDataset {
    /// Create a dataset, checking that every tensor has a sample axis and
    /// that column/label row counts agree.
    pub fn new(columns: Vec<Tensor>, labels: Tensor) -> Result<Self> {
        if columns.is_empty() {
            return Err(ClientError::Schema(
                "dataset must contain at least one column".to_string(),
            ));
        }
        if labels.shape().is_empty() {
            return Err(ClientError::Schema(
                "labels must have a leading sample axis, got a rank-0 tensor".to_string(),
            ));
        }
        for (i, column) in columns.iter().enumerate() {
            if column.shape().is_empty() {
                return Err(ClientError::Schema(format!(
                    "column {i} must have a leading sample axis, got a rank-0 tensor"
                )));
            }
            if column.nb_rows() != labels.nb_rows() {
                return Err(ClientError::Schema(format!(
                    "column {i} has {} rows, labels have {}",
                    column.nb_rows(),
                    labels.nb_rows()
                )));
            }
        }
        Ok(Self { columns, labels })
    }

    #[must_use]
    pub fn nb_samples(&self) -> usize {
        self.labels.nb_rows()
    }

    #[must_use]
    pub fn nb_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn columns(&self) -> &[Tensor] {
        &self.columns
    }

    #[must_use]
    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    /// Group samples into fixed-size batches, one `DataWrapper` artifact
    /// each; the final batch may be smaller.
    ///
    /// # Panics
    /// Panics if `batch_size` is zero; callers validate configured sizes.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = DataWrapper> {
        self.clone().into_batches(batch_size)
    }

    /// Consuming variant of [`Self::batches`], usable where the iterator
    /// must own the data (e.g. an upload stream).
    ///
    /// # Panics
    /// Panics if `batch_size` is zero; callers validate configured sizes.
    pub fn into_batches(self, batch_size: usize) -> impl Iterator<Item = DataWrapper> {
        assert!(batch_size >= 1, "batch size must be positive");
        let total = self.nb_samples();
        (0..total.max(1)).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(total);
            let columns =
                self.columns.iter().map(|c| c.slice_rows(start..end)).collect::<Vec<_>>();
            DataWrapper::from_batch(columns, self.labels.slice_rows(start..end))
        })
    }

    /// Rebuild a dataset from decoded batch containers, concatenating
    /// batches row-wise in arrival order.
    ///
    /// Unknown field names, missing or duplicate column indices, zero
    /// columns, and column-count drift between batches are fatal schema
    /// errors.
    pub fn from_wrappers(wrappers: impl IntoIterator<Item = DataWrapper>) -> Result<Self> {
        let mut batches = Vec::new();
        for wrapper in wrappers {
            batches.push(split_wrapper(&wrapper)?);
        }
        let Some((first_columns, _)) = batches.first() else {
            return Err(ClientError::Schema("no batch containers to reassemble".to_string()));
        };

        let nb_columns = first_columns.len();
        for (columns, _) in &batches {
            if columns.len() != nb_columns {
                return Err(ClientError::Schema(format!(
                    "batch has {} columns, expected {nb_columns}",
                    columns.len()
                )));
            }
        }

        let columns = (0..nb_columns)
            .map(|i| {
                let parts: Vec<Tensor> =
                    batches.iter().map(|(columns, _)| columns[i].clone()).collect();
                Tensor::concat_rows(&parts)
            })
            .collect::<Result<Vec<_>>>()?;
        let labels: Vec<Tensor> = batches.into_iter().map(|(_, labels)| labels).collect();
        Self::new(columns, Tensor::concat_rows(&labels)?)
    }
}

/// Walk a wrapper's named fields into ordered columns plus labels.
fn split_wrapper(wrapper: &DataWrapper) -> Result<(Vec<Tensor>, Tensor)> {
    let mut columns: Vec<Option<Tensor>> = Vec::new();
    let mut labels = None;

    for (name, tensor) in wrapper.fields() {
        if name == LABELS_FIELD {
            labels = Some(tensor.clone());
        } else if let Some(index) = name.strip_prefix(COLUMN_FIELD_PREFIX) {
            let index: usize = index.parse().map_err(|_| {
                ClientError::Schema(format!("unknown field {name} in data wrapper"))
            })?;
            if columns.len() <= index {
                columns.resize(index + 1, None);
            }
            if columns[index].is_some() {
                return Err(ClientError::Schema(format!(
                    "duplicate column index {index} in data wrapper"
                )));
            }
            columns[index] = Some(tensor.clone());
        } else {
            return Err(ClientError::Schema(format!("unknown field {name} in data wrapper")));
        }
    }

    if columns.is_empty() {
        return Err(ClientError::Schema(
            "data wrapper must contain at least one column".to_string(),
        ));
    }
    let columns = columns
        .into_iter()
        .enumerate()
        .map(|(i, column)| {
            column.ok_or_else(|| {
                ClientError::Schema(format!("missing column {i} in data wrapper"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let labels = labels
        .ok_or_else(|| ClientError::Schema("data wrapper has no labels field".to_string()))?;
    Ok((columns, labels))
}
