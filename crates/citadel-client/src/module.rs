//! In-memory model representation: an attribute tree of nested submodules
//! with named leaf parameters.

use std::collections::BTreeMap;

use citadel_stream::{ByteBuffer, StreamError, StreamResult};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::tensor::{DataWrapper, Tensor};

/// A model node: named parameters plus named child modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    parameters: BTreeMap<String, Tensor>,
    #[serde(default)]
    submodules: BTreeMap<String, Module>,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: attach a leaf parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.parameters.insert(name.into(), tensor);
        self
    }

    /// Builder-style: attach a child module.
    #[must_use]
    pub fn with_submodule(mut self, name: impl Into<String>, module: Module) -> Self {
        self.submodules.insert(name.into(), module);
        self
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Tensor> {
        self.parameters.get(name)
    }

    #[must_use]
    pub fn submodule(&self, name: &str) -> Option<&Module> {
        self.submodules.get(name)
    }

    /// Flatten the tree into `(underscore_joined_name, tensor)` pairs.
    #[must_use]
    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut out = Vec::new();
        self.collect_parameters(None, &mut out);
        out
    }

    fn collect_parameters(&self, prefix: Option<&str>, out: &mut Vec<(String, Tensor)>) {
        for (name, tensor) in &self.parameters {
            out.push((join_name(prefix, name), tensor.clone()));
        }
        for (name, child) in &self.submodules {
            child.collect_parameters(Some(&join_name(prefix, name)), out);
        }
    }

    /// Replace the leaf parameter named by an underscore-delimited path.
    ///
    /// Resolution is greedy: scanning left to right, a run of segments is
    /// consumed as soon as it names a submodule of the current node, then
    /// matching restarts below it. Submodule names may themselves contain
    /// underscores, which makes greedy matching ambiguous when a shorter
    /// run shadows a longer sibling name; the first match wins. A name that
    /// fails to land on an existing leaf parameter is a schema error.
    pub fn patch_parameter(&mut self, name: &str, value: Tensor) -> Result<()> {
        let segments: Vec<&str> = name.split('_').collect();
        self.patch_segments(&segments, name, value)
    }

    fn patch_segments(&mut self, segments: &[&str], full: &str, value: Tensor) -> Result<()> {
        let mut run: Vec<&str> = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            run.push(segment);
            let joined = run.join("_");
            if let Some(child) = self.submodules.get_mut(&joined) {
                return child.patch_segments(&segments[i + 1..], full, value);
            }
        }

        let leaf = run.join("_");
        if !run.is_empty() && self.parameters.contains_key(&leaf) {
            self.parameters.insert(leaf, value);
            return Ok(());
        }
        Err(ClientError::Schema(format!(
            "parameter {full} does not resolve to a leaf parameter"
        )))
    }

    /// Flattened parameters as a named-field container (the payload of a
    /// trained-weights transfer).
    #[must_use]
    pub fn to_weights_wrapper(&self) -> DataWrapper {
        let mut wrapper = DataWrapper::default();
        for (name, tensor) in self.named_parameters() {
            wrapper.insert(name, tensor);
        }
        wrapper
    }

    /// Patch every field of a trained-weights container into this tree.
    pub fn apply_weights(&mut self, wrapper: &DataWrapper) -> Result<()> {
        for (name, tensor) in wrapper.fields() {
            self.patch_parameter(name, tensor.clone())?;
        }
        Ok(())
    }
}

fn join_name(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}_{name}"),
        None => name.to_string(),
    }
}

/// Artifact serializer for whole models (encoder collaborator).
pub fn write_module(module: &Module, buffer: &mut ByteBuffer) -> StreamResult<()> {
    let bytes = serde_json::to_vec(module).map_err(|e| StreamError::Serialize(e.to_string()))?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Artifact deserializer for whole models (decoder collaborator).
pub fn read_module(payload: &[u8]) -> StreamResult<Module> {
    serde_json::from_slice(payload).map_err(|e| StreamError::Deserialize(e.to_string()))
}
