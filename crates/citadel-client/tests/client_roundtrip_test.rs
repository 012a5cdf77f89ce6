//! End-to-end client tests against an in-process mock server:
//! upload, download, train, metric polling and weight pulling.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use citadel_client::proto::citadel_server::{Citadel, CitadelServer};
use citadel_client::proto::{
    Chunk, Empty, Metric, Reference, TestConfig, TrainConfig,
};
use citadel_client::remote::{PollOptions, RemoteDataset, RemoteLearner, TrainOptions};
use citadel_client::tensor::write_wrapper;
use citadel_client::transfer::{self, TransferMetadata};
use citadel_client::{CitadelClient, ClientConfig, DataWrapper, Module, Tensor, TensorDataset};
use citadel_stream::{ArtifactEncoder, StreamResult};
use tokio_stream::Stream;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, Status>> + Send>>;

#[derive(Default)]
struct MockState {
    datasets: Mutex<HashMap<String, Vec<Chunk>>>,
    models: Mutex<HashMap<String, Vec<Chunk>>>,
    metric_calls: AtomicUsize,
}

struct MockCitadel {
    state: Arc<MockState>,
}

async fn collect(mut stream: Streaming<Chunk>) -> Result<Vec<Chunk>, Status> {
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.message().await? {
        chunks.push(chunk);
    }
    Ok(chunks)
}

#[tonic::async_trait]
impl Citadel for MockCitadel {
    type FetchDatasetStream = ChunkStream;
    type FetchModelWeightsStream = ChunkStream;

    async fn ping(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        Ok(Response::new(Empty {}))
    }

    async fn send_dataset(
        &self,
        request: Request<Streaming<Chunk>>,
    ) -> Result<Response<Reference>, Status> {
        let chunks = collect(request.into_inner()).await?;
        let name = chunks.first().map(|c| c.dataset_name.clone()).unwrap_or_default();
        let identifier = uuid::Uuid::new_v4().to_string();
        self.state.datasets.lock().unwrap().insert(identifier.clone(), chunks);
        Ok(Response::new(Reference { identifier, name, description: String::new() }))
    }

    async fn send_model(
        &self,
        request: Request<Streaming<Chunk>>,
    ) -> Result<Response<Reference>, Status> {
        let chunks = collect(request.into_inner()).await?;
        let name = chunks.first().map(|c| c.model_name.clone()).unwrap_or_default();
        let identifier = uuid::Uuid::new_v4().to_string();
        self.state.models.lock().unwrap().insert(identifier.clone(), chunks);
        Ok(Response::new(Reference { identifier, name, description: String::new() }))
    }

    async fn fetch_dataset(
        &self,
        request: Request<Reference>,
    ) -> Result<Response<Self::FetchDatasetStream>, Status> {
        let reference = request.into_inner();
        let chunks = self
            .state
            .datasets
            .lock()
            .unwrap()
            .get(&reference.identifier)
            .cloned()
            .ok_or_else(|| Status::not_found("unknown dataset"))?;
        let stream = tokio_stream::iter(chunks.into_iter().map(Ok));
        Ok(Response::new(Box::pin(stream) as ChunkStream))
    }

    /// "Trains" by doubling every parameter of the stored model and
    /// streaming the result back as a weights transfer.
    async fn fetch_model_weights(
        &self,
        request: Request<Reference>,
    ) -> Result<Response<Self::FetchModelWeightsStream>, Status> {
        let reference = request.into_inner();
        let chunks = self
            .state
            .models
            .lock()
            .unwrap()
            .get(&reference.identifier)
            .cloned()
            .ok_or_else(|| Status::not_found("unknown model"))?;
        let module = transfer::module_from_chunks(transfer::chunk_payloads(chunks))
            .map_err(|e| Status::internal(e.to_string()))?;

        let mut weights = DataWrapper::default();
        for (name, tensor) in module.to_weights_wrapper().fields() {
            let doubled: Vec<f32> = tensor.values().iter().map(|v| v * 2.0).collect();
            weights.insert(name, Tensor::new(tensor.shape().to_vec(), doubled).unwrap());
        }

        let encoder = ArtifactEncoder::new(std::iter::once(weights), write_wrapper, 32);
        let messages: Vec<Chunk> = transfer::chunk_stream(encoder, TransferMetadata::default())
            .collect::<StreamResult<Vec<_>>>()
            .map_err(|e| Status::internal(e.to_string()))?;
        let stream = tokio_stream::iter(messages.into_iter().map(Ok));
        Ok(Response::new(Box::pin(stream) as ChunkStream))
    }

    async fn train(&self, _request: Request<TrainConfig>) -> Result<Response<Reference>, Status> {
        Ok(Response::new(Reference {
            identifier: format!("run-{}", uuid::Uuid::new_v4()),
            ..Default::default()
        }))
    }

    async fn test(&self, _request: Request<TestConfig>) -> Result<Response<Reference>, Status> {
        Ok(Response::new(Reference {
            identifier: format!("run-{}", uuid::Uuid::new_v4()),
            ..Default::default()
        }))
    }

    /// First poll: run not started. Second: mid-run. After that: complete.
    async fn get_metric(&self, _request: Request<Reference>) -> Result<Response<Metric>, Status> {
        let call = self.state.metric_calls.fetch_add(1, Ordering::SeqCst);
        match call {
            0 => Err(Status::out_of_range("run has produced no metric yet")),
            1 => Ok(Response::new(Metric {
                value: 4.0,
                uncertainty: 0.5,
                batch: 0,
                epoch: 0,
                nb_batches: 2,
                nb_epochs: 1,
            })),
            _ => Ok(Response::new(Metric {
                value: 1.5,
                uncertainty: 0.25,
                batch: 1,
                epoch: 0,
                nb_batches: 2,
                nb_epochs: 1,
            })),
        }
    }
}

async fn spawn_server() -> (Arc<MockState>, String) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    drop(listener);

    let state = Arc::new(MockState::default());
    let mock = MockCitadel { state: Arc::clone(&state) };
    tokio::spawn(async move {
        Server::builder()
            .add_service(CitadelServer::new(mock))
            .serve(addr)
            .await
            .expect("mock server");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (state, format!("http://{addr}"))
}

fn sample_dataset() -> TensorDataset {
    TensorDataset::new(
        vec![
            Tensor::vector((0..30).map(|v| v as f32).collect()),
            Tensor::vector((0..30).map(|v| (v * 2) as f32).collect()),
        ],
        Tensor::vector((0..30).map(|v| (v % 3) as f32).collect()),
    )
    .unwrap()
}

fn sample_model() -> Module {
    Module::new().with_submodule(
        "linear",
        Module::new()
            .with_parameter("weight", Tensor::vector(vec![1.0, 2.0]))
            .with_parameter("bias", Tensor::vector(vec![0.5])),
    )
}

async fn connect(endpoint: &str) -> CitadelClient {
    // Small sizes force multi-chunk, multi-batch transfers.
    let config = ClientConfig {
        endpoint: endpoint.to_string(),
        chunk_size: 128,
        batch_size: 8,
        connect_retries: 3,
    };
    CitadelClient::connect(config).await.expect("connect to mock server")
}

fn fast_poll() -> PollOptions {
    PollOptions { timeout: Duration::from_secs(2), interval: Duration::from_millis(5) }
}

#[tokio::test]
async fn test_dataset_upload_envelope_and_roundtrip() {
    let (state, endpoint) = spawn_server().await;
    let mut client = connect(&endpoint).await;
    client.ping().await.unwrap();

    let dataset = sample_dataset();
    let remote = RemoteDataset::upload(
        &mut client,
        dataset.clone(),
        None,
        "toy",
        "integration test dataset",
        b"secret".to_vec(),
    )
    .await
    .unwrap();
    assert_eq!(remote.nb_samples(), 30);
    assert_eq!(remote.train_reference().name, "toy");

    // The server saw the metadata on the first chunk only, identity included.
    {
        let datasets = state.datasets.lock().unwrap();
        let chunks = datasets.get(&remote.train_reference().identifier).unwrap();
        assert!(chunks.len() > 1, "expected a multi-chunk upload");
        assert_eq!(chunks[0].dataset_name, "toy");
        assert_eq!(chunks[0].secret, b"secret");
        let info = chunks[0].client_info.as_ref().expect("client identity");
        assert!(!info.uid.is_empty());
        for chunk in &chunks[1..] {
            assert!(chunk.dataset_name.is_empty());
            assert!(chunk.secret.is_empty());
            assert!(chunk.client_info.is_none());
        }
    }

    let fetched = client.fetch_dataset(remote.train_reference()).await.unwrap();
    assert_eq!(fetched, dataset);
}

#[tokio::test]
async fn test_train_poll_and_pull_weights() {
    let (_state, endpoint) = spawn_server().await;
    let mut client = connect(&endpoint).await;

    let dataset = RemoteDataset::upload(
        &mut client,
        sample_dataset(),
        Some(sample_dataset()),
        "toy",
        "",
        Vec::new(),
    )
    .await
    .unwrap();
    assert!(dataset.test_reference().is_some());

    let mut learner = RemoteLearner::upload(
        &mut client,
        sample_model(),
        dataset,
        "tiny-linear",
        "",
        Vec::new(),
    )
    .await
    .unwrap();

    let last = learner
        .fit(
            &mut client,
            &TrainOptions::default(),
            &fast_poll(),
            &citadel_client::progress::NullProgressSink,
        )
        .await
        .unwrap();
    assert_eq!(last.epoch + 1, last.nb_epochs);
    assert_eq!(last.batch + 1, last.nb_batches);
    assert!((last.value - 1.5).abs() < f32::EPSILON);

    let trained = learner.pull_weights(&mut client).await.unwrap();
    let linear = trained.submodule("linear").unwrap();
    assert_eq!(linear.parameter("weight").unwrap().values(), &[2.0, 4.0]);
    assert_eq!(linear.parameter("bias").unwrap().values(), &[1.0]);
}
