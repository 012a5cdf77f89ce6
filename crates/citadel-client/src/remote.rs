//! Remote drivers: dataset/model handles bound to a server, training and
//! testing runs, and metric polling.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::client::CitadelClient;
use crate::dataset::TensorDataset;
use crate::error::{ClientError, Result};
use crate::module::Module;
use crate::optimizer::Optimizer;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::proto;
use crate::transfer::TransferMetadata;

/// Hyper-parameters of a training run.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub epochs: i32,
    pub batch_size: i32,
    pub device: String,
    pub metric: String,
    pub optimizer: Optimizer,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 64,
            device: "cpu".to_string(),
            metric: "l2".to_string(),
            optimizer: Optimizer::default(),
        }
    }
}

/// Hyper-parameters of a testing run.
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub batch_size: i32,
    pub device: String,
    pub metric: String,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self { batch_size: 64, device: "cpu".to_string(), metric: "l2".to_string() }
    }
}

/// Metric polling cadence and patience.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Give up when no new metric arrives for this long.
    pub timeout: Duration,
    /// Delay between polls.
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), interval: Duration::from_millis(200) }
    }
}

/// A dataset uploaded to the server: train split plus an optional test
/// split, kept as server references.
#[derive(Debug, Clone)]
pub struct RemoteDataset {
    train: proto::Reference,
    test: Option<proto::Reference>,
    nb_samples: usize,
}

impl RemoteDataset {
    /// Upload the train (and optional test) split under one name.
    pub async fn upload(
        client: &mut CitadelClient,
        train: TensorDataset,
        test: Option<TensorDataset>,
        name: &str,
        description: &str,
        secret: Vec<u8>,
    ) -> Result<Self> {
        let nb_samples = train.nb_samples();
        let metadata = TransferMetadata {
            description: description.to_string(),
            dataset_name: name.to_string(),
            secret: secret.clone(),
            ..Default::default()
        };
        let train_reference = client.send_dataset(train, metadata).await?;
        info!(name, samples = nb_samples, "uploaded train dataset");

        let test_reference = match test {
            Some(dataset) => {
                let metadata = TransferMetadata {
                    description: description.to_string(),
                    dataset_name: format!("{name}-test"),
                    secret,
                    ..Default::default()
                };
                Some(client.send_dataset(dataset, metadata).await?)
            }
            None => None,
        };

        Ok(Self { train: train_reference, test: test_reference, nb_samples })
    }

    #[must_use]
    pub fn train_reference(&self) -> &proto::Reference {
        &self.train
    }

    #[must_use]
    pub fn test_reference(&self) -> Option<&proto::Reference> {
        self.test.as_ref()
    }

    #[must_use]
    pub fn nb_samples(&self) -> usize {
        self.nb_samples
    }
}

/// A model uploaded to the server and bound to a [`RemoteDataset`], with
/// the local copy retained so trained weights can be patched back in.
#[derive(Debug, Clone)]
pub struct RemoteLearner {
    model: proto::Reference,
    dataset: RemoteDataset,
    module: Module,
}

impl RemoteLearner {
    /// Upload `module` and bind it to an already-uploaded dataset.
    pub async fn upload(
        client: &mut CitadelClient,
        module: Module,
        dataset: RemoteDataset,
        name: &str,
        description: &str,
        secret: Vec<u8>,
    ) -> Result<Self> {
        let metadata = TransferMetadata {
            description: description.to_string(),
            model_name: name.to_string(),
            secret,
            ..Default::default()
        };
        let model = client.send_model(module.clone(), metadata).await?;
        info!(name, "uploaded model");
        Ok(Self { model, dataset, module })
    }

    #[must_use]
    pub fn model_reference(&self) -> &proto::Reference {
        &self.model
    }

    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Train on the bound train split and poll until the final metric.
    pub async fn fit(
        &self,
        client: &mut CitadelClient,
        options: &TrainOptions,
        poll: &PollOptions,
        sink: &dyn ProgressSink,
    ) -> Result<proto::Metric> {
        let config = proto::TrainConfig {
            model: self.model.identifier.clone(),
            dataset: self.dataset.train.identifier.clone(),
            batch_size: options.batch_size,
            epochs: options.epochs,
            device: options.device.clone(),
            metric: options.metric.clone(),
            optimizer: Some(options.optimizer.to_proto()),
        };
        let run = client.train(config).await?;
        info!(run = %run.identifier, metric = %options.metric, "training started");
        poll_metrics(client, &run, &options.metric, poll, sink).await
    }

    /// Evaluate on the bound test split and poll until the final metric.
    ///
    /// # Errors
    /// Returns `ClientError::Schema` if the dataset was uploaded without a
    /// test split.
    pub async fn evaluate(
        &self,
        client: &mut CitadelClient,
        options: &TestOptions,
        poll: &PollOptions,
        sink: &dyn ProgressSink,
    ) -> Result<proto::Metric> {
        let Some(test) = self.dataset.test_reference() else {
            return Err(ClientError::Schema("dataset has no test split".to_string()));
        };
        let config = proto::TestConfig {
            model: self.model.identifier.clone(),
            dataset: test.identifier.clone(),
            batch_size: options.batch_size,
            device: options.device.clone(),
            metric: options.metric.clone(),
        };
        let run = client.test(config).await?;
        info!(run = %run.identifier, metric = %options.metric, "testing started");
        poll_metrics(client, &run, &options.metric, poll, sink).await
    }

    /// Fetch the trained parameters and patch them into the local module.
    pub async fn pull_weights(&mut self, client: &mut CitadelClient) -> Result<&Module> {
        client.fetch_model_weights(&mut self.module, &self.model).await?;
        Ok(&self.module)
    }
}

/// Where polled metrics come from. Implemented by [`CitadelClient`]; tests
/// substitute a scripted source.
pub trait MetricSource {
    /// The latest metric of `run`, or `None` while the run has not started.
    fn latest_metric(
        &mut self,
        run: &proto::Reference,
    ) -> impl std::future::Future<Output = Result<Option<proto::Metric>>> + Send;
}

impl MetricSource for CitadelClient {
    async fn latest_metric(&mut self, run: &proto::Reference) -> Result<Option<proto::Metric>> {
        self.get_metric(run).await
    }
}

/// Poll a run until its final metric.
///
/// A run is complete when its latest metric reports the last batch of the
/// last epoch. A run that produces no first metric, or whose latest metric
/// stops advancing, fails with `ClientError::Timeout` once `poll.timeout`
/// elapses without progress.
pub async fn poll_metrics<S: MetricSource>(
    source: &mut S,
    run: &proto::Reference,
    metric_name: &str,
    poll: &PollOptions,
    sink: &dyn ProgressSink,
) -> Result<proto::Metric> {
    let mut started = false;
    let mut last_position: Option<(i32, i32)> = None;
    let mut last_progress = Instant::now();

    loop {
        if let Some(metric) = source.latest_metric(run).await? {
            if !started {
                started = true;
                sink.on_event(ProgressEvent::Started { run_id: run.identifier.clone() });
            }
            let position = (metric.epoch, metric.batch);
            if last_position != Some(position) {
                last_position = Some(position);
                last_progress = Instant::now();
                debug!(
                    run = %run.identifier,
                    epoch = metric.epoch,
                    batch = metric.batch,
                    value = metric.value,
                    "metric update"
                );
                sink.on_event(ProgressEvent::Metric {
                    run_id: run.identifier.clone(),
                    name: metric_name.to_string(),
                    metric: metric.clone(),
                });
            }
            if metric.epoch + 1 == metric.nb_epochs && metric.batch + 1 == metric.nb_batches {
                sink.on_event(ProgressEvent::Finished { run_id: run.identifier.clone() });
                return Ok(metric);
            }
        }

        if last_progress.elapsed() >= poll.timeout {
            let state = if started { "stalled" } else { "produced no metric" };
            return Err(ClientError::Timeout(format!(
                "run {} {state} within {:?}",
                run.identifier, poll.timeout
            )));
        }
        sleep(poll.interval).await;
    }
}
