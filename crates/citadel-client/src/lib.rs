//! Citadel client SDK.
//!
//! Uploads datasets and models to a Citadel server over gRPC, drives remote
//! training and testing runs, and polls their metrics. Artifact payloads
//! travel through the framing protocol in `citadel-stream`: length-prefixed
//! records carved into bounded chunks, reassembled losslessly on the other
//! side regardless of how chunk boundaries fall.
//!
//! The typical flow is [`CitadelClient::connect`], then
//! [`remote::RemoteDataset::upload`] and [`remote::RemoteLearner::upload`],
//! then `fit` / `evaluate` / `pull_weights` on the learner.

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod module;
pub mod optimizer;
pub mod progress;
pub mod remote;
pub mod tensor;
pub mod transfer;

/// Generated wire types and service stubs.
pub mod proto {
    tonic::include_proto!("citadel");
}

pub use client::CitadelClient;
pub use config::ClientConfig;
pub use dataset::TensorDataset;
pub use error::{ClientError, Result};
pub use module::Module;
pub use optimizer::{Adam, Optimizer, Sgd};
pub use tensor::{DataWrapper, Tensor};
pub use transfer::TransferMetadata;
