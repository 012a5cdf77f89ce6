//! gRPC client with connection management and retry logic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use citadel_stream::{StreamError, StreamResult};
use tokio::time::sleep;
use tokio_stream::Stream;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::dataset::TensorDataset;
use crate::error::{ClientError, Result};
use crate::module::Module;
use crate::proto;
use crate::proto::citadel_client::CitadelClient as GrpcClient;
use crate::transfer::{self, TransferMetadata};

/// Identity attached to the first chunk of every upload.
#[must_use]
pub fn detect_client_info() -> proto::ClientInfo {
    proto::ClientInfo {
        uid: Uuid::new_v4().to_string(),
        platform_name: std::env::consts::OS.to_string(),
        platform_arch: std::env::consts::ARCH.to_string(),
        user_agent: env!("CARGO_PKG_NAME").to_string(),
        user_agent_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Connected client with typed wrappers over the generated service stubs.
///
/// Cloning is cheap and shares the underlying channel.
#[derive(Debug, Clone)]
pub struct CitadelClient {
    config: ClientConfig,
    client: GrpcClient<Channel>,
    client_info: proto::ClientInfo,
}

impl CitadelClient {
    /// Connect to the configured endpoint with bounded retries and
    /// exponential backoff.
    ///
    /// # Errors
    /// Returns `ClientError::Config` for an invalid configuration and
    /// `ClientError::Connect` once every attempt has failed.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        info!(endpoint = %config.endpoint, "connecting to citadel server");

        let endpoint = Endpoint::from_shared(config.endpoint.clone())?;
        let mut retry_delay = Duration::from_secs(1);
        let mut last_error = None;

        for attempt in 0..config.connect_retries {
            match endpoint.connect().await {
                Ok(channel) => {
                    info!("connected to citadel server");
                    return Ok(Self {
                        config,
                        client: GrpcClient::new(channel),
                        client_info: detect_client_info(),
                    });
                }
                Err(err) => {
                    last_error = Some(err);
                    if attempt + 1 < config.connect_retries {
                        debug!(
                            attempt = attempt + 1,
                            retries = config.connect_retries,
                            delay_secs = retry_delay.as_secs(),
                            "connection failed, retrying"
                        );
                        sleep(retry_delay).await;
                        retry_delay *= 2;
                    }
                }
            }
        }

        // validate() guarantees at least one attempt ran.
        match last_error {
            Some(err) => Err(ClientError::Connect(err)),
            None => Err(ClientError::Config("connect_retries must be positive".to_string())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn client_info(&self) -> &proto::ClientInfo {
        &self.client_info
    }

    /// Health check.
    pub async fn ping(&mut self) -> Result<()> {
        self.client.ping(proto::Empty {}).await?;
        Ok(())
    }

    /// Upload a dataset as a batched chunk stream.
    pub async fn send_dataset(
        &mut self,
        dataset: TensorDataset,
        metadata: TransferMetadata,
    ) -> Result<proto::Reference> {
        let metadata = self.with_identity(metadata);
        let chunks = transfer::dataset_chunks(
            dataset,
            metadata,
            self.config.chunk_size,
            self.config.batch_size,
        );
        let (stream, error_slot) = chunk_request_stream(chunks);
        let response = self.client.send_dataset(stream).await;
        // An encoder failure truncated the outbound stream; report it in
        // preference to whatever the server made of the truncation.
        if let Some(err) = error_slot.lock().unwrap().take() {
            return Err(err.into());
        }
        Ok(response?.into_inner())
    }

    /// Upload a model as a chunk stream carrying a single artifact.
    pub async fn send_model(
        &mut self,
        module: Module,
        metadata: TransferMetadata,
    ) -> Result<proto::Reference> {
        let metadata = self.with_identity(metadata);
        let chunks = transfer::model_chunks(module, metadata, self.config.chunk_size);
        let (stream, error_slot) = chunk_request_stream(chunks);
        let response = self.client.send_model(stream).await;
        if let Some(err) = error_slot.lock().unwrap().take() {
            return Err(err.into());
        }
        Ok(response?.into_inner())
    }

    /// Download a previously uploaded dataset and rebuild it.
    pub async fn fetch_dataset(&mut self, reference: &proto::Reference) -> Result<TensorDataset> {
        let stream = self.client.fetch_dataset(reference.clone()).await?.into_inner();
        let chunks = collect_chunks(stream).await?;
        transfer::dataset_from_chunks(transfer::chunk_payloads(chunks))
    }

    /// Download the trained parameters of a run and patch them into `model`.
    pub async fn fetch_model_weights(
        &mut self,
        model: &mut Module,
        reference: &proto::Reference,
    ) -> Result<()> {
        let stream = self.client.fetch_model_weights(reference.clone()).await?.into_inner();
        let chunks = collect_chunks(stream).await?;
        transfer::apply_weights_from_chunks(model, transfer::chunk_payloads(chunks))
    }

    /// Start a training run.
    pub async fn train(&mut self, config: proto::TrainConfig) -> Result<proto::Reference> {
        Ok(self.client.train(config).await?.into_inner())
    }

    /// Start a testing run.
    pub async fn test(&mut self, config: proto::TestConfig) -> Result<proto::Reference> {
        Ok(self.client.test(config).await?.into_inner())
    }

    /// Poll the latest metric of a run.
    ///
    /// Returns `Ok(None)` while the run has not produced its first metric
    /// (the server answers `OUT_OF_RANGE` until then).
    pub async fn get_metric(&mut self, run: &proto::Reference) -> Result<Option<proto::Metric>> {
        match self.client.get_metric(run.clone()).await {
            Ok(response) => Ok(Some(response.into_inner())),
            Err(status) if status.code() == tonic::Code::OutOfRange => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    fn with_identity(&self, mut metadata: TransferMetadata) -> TransferMetadata {
        if metadata.client_info.is_none() {
            metadata.client_info = Some(self.client_info.clone());
        }
        metadata
    }
}

async fn collect_chunks(mut stream: tonic::Streaming<proto::Chunk>) -> Result<Vec<proto::Chunk>> {
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.message().await? {
        chunks.push(chunk);
    }
    debug!(chunks = chunks.len(), "download stream complete");
    Ok(chunks)
}

/// Bridge a fallible chunk iterator into an infallible request stream.
///
/// The generated upload stubs accept plain `Chunk` messages, so encoder
/// errors cannot travel in-band: the first error ends the stream early and
/// is stashed in the returned slot for the caller to check after the RPC.
fn chunk_request_stream<I>(
    chunks: I,
) -> (impl Stream<Item = proto::Chunk> + Send + 'static, Arc<Mutex<Option<StreamError>>>)
where
    I: Iterator<Item = StreamResult<proto::Chunk>> + Send + 'static,
{
    let error_slot = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&error_slot);
    let stream = tokio_stream::iter(chunks.map_while(move |item| match item {
        Ok(chunk) => Some(chunk),
        Err(err) => {
            *slot.lock().unwrap() = Some(err);
            None
        }
    }));
    (stream, error_slot)
}
