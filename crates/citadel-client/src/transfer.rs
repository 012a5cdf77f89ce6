//! Transfer assembly: envelope building plus the composite builders that
//! turn datasets and models into wire chunk streams and back.

use citadel_stream::{ArtifactDecoder, ArtifactEncoder, StreamResult};
use tracing::debug;

use crate::dataset::TensorDataset;
use crate::error::{ClientError, Result};
use crate::module::{read_module, write_module, Module};
use crate::proto;
use crate::tensor::{read_wrapper, write_wrapper};

/// One-time metadata attached to the first chunk of a transfer.
#[derive(Debug, Clone, Default)]
pub struct TransferMetadata {
    pub description: String,
    pub dataset_name: String,
    pub model_name: String,
    pub secret: Vec<u8>,
    pub client_info: Option<proto::ClientInfo>,
}

/// Envelope Builder: wrap raw chunks in transport messages.
///
/// The first message carries all transfer metadata; every later message
/// carries only the chunk payload with default metadata, so the receiving
/// endpoint can authenticate and label the whole transfer exactly once,
/// however many chunks it spans.
pub fn chunk_stream<I>(
    chunks: I,
    metadata: TransferMetadata,
) -> impl Iterator<Item = StreamResult<proto::Chunk>>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
{
    chunks.enumerate().map(move |(index, chunk)| {
        chunk.map(|data| {
            if index == 0 {
                proto::Chunk {
                    data,
                    description: metadata.description.clone(),
                    dataset_name: metadata.dataset_name.clone(),
                    model_name: metadata.model_name.clone(),
                    secret: metadata.secret.clone(),
                    client_info: metadata.client_info.clone(),
                }
            } else {
                proto::Chunk { data, ..Default::default() }
            }
        })
    })
}

/// Chunk messages for a batched dataset upload.
pub fn dataset_chunks(
    dataset: TensorDataset,
    metadata: TransferMetadata,
    chunk_size: usize,
    batch_size: usize,
) -> impl Iterator<Item = StreamResult<proto::Chunk>> {
    debug!(
        samples = dataset.nb_samples(),
        columns = dataset.nb_columns(),
        chunk_size,
        batch_size,
        "encoding dataset transfer"
    );
    let encoder =
        ArtifactEncoder::new(dataset.into_batches(batch_size), write_wrapper, chunk_size);
    chunk_stream(encoder, metadata)
}

/// Chunk messages for a whole-model upload (a single unbatched artifact).
pub fn model_chunks(
    module: Module,
    metadata: TransferMetadata,
    chunk_size: usize,
) -> impl Iterator<Item = StreamResult<proto::Chunk>> {
    let encoder = ArtifactEncoder::new(std::iter::once(module), write_module, chunk_size);
    chunk_stream(encoder, metadata)
}

/// Strip received transport messages down to their chunk payloads.
pub fn chunk_payloads(
    chunks: Vec<proto::Chunk>,
) -> impl Iterator<Item = StreamResult<Vec<u8>>> {
    chunks.into_iter().map(|chunk| Ok(chunk.data))
}

/// Rebuild a typed dataset from an in-order chunk payload sequence.
pub fn dataset_from_chunks<I>(chunks: I) -> Result<TensorDataset>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
{
    let wrappers = ArtifactDecoder::new(chunks, read_wrapper)
        .collect::<StreamResult<Vec<_>>>()?;
    TensorDataset::from_wrappers(wrappers)
}

/// Rebuild a model from an in-order chunk payload sequence.
pub fn module_from_chunks<I>(chunks: I) -> Result<Module>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
{
    let mut artifacts = ArtifactDecoder::new(chunks, read_module);
    let Some(module) = artifacts.next().transpose()? else {
        return Err(ClientError::Schema("model transfer carried no artifact".to_string()));
    };
    if artifacts.next().transpose()?.is_some() {
        return Err(ClientError::Schema(
            "model transfer carried more than one artifact".to_string(),
        ));
    }
    Ok(module)
}

/// Decode a trained-weights transfer and patch it into `model` in place.
pub fn apply_weights_from_chunks<I>(model: &mut Module, chunks: I) -> Result<()>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
{
    let mut artifacts = ArtifactDecoder::new(chunks, read_wrapper);
    let Some(wrapper) = artifacts.next().transpose()? else {
        return Err(ClientError::Schema("weights transfer carried no artifact".to_string()));
    };
    if artifacts.next().transpose()?.is_some() {
        return Err(ClientError::Schema(
            "weights transfer carried more than one artifact".to_string(),
        ));
    }
    model.apply_weights(&wrapper)
}
