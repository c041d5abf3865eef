// Sampled training wrapper
//
// Wraps an inner trainable unit and applies stratified sampling before
// delegating training; pass-through at inference time.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ContractError;
use crate::sample::{Sample, SampleCollection};
use crate::sampler::{self, SamplerConfig};
use crate::unit::TrainableUnit;

pub struct SampledTrainingWrapper {
    inner: Option<Box<dyn TrainableUnit>>,
    config: SamplerConfig,
}

impl SampledTrainingWrapper {
    pub fn new(inner: Box<dyn TrainableUnit>, config: SamplerConfig) -> Self {
        Self {
            inner: Some(inner),
            config,
        }
    }

    /// Wrapper with no inner unit; training is a no-op and projection errors
    pub fn empty(config: SamplerConfig) -> Self {
        Self {
            inner: None,
            config,
        }
    }
}

#[async_trait]
impl TrainableUnit for SampledTrainingWrapper {
    async fn train(&mut self, data: SampleCollection) -> Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(());
        };
        if !inner.is_trainable() {
            return Ok(());
        }

        let total = data.len();
        let sampled = sampler::sample(data, &self.config);
        tracing::debug!(
            total = total,
            kept = sampled.len(),
            "forwarding stratified subsample to inner unit"
        );
        inner.train(sampled).await
    }

    fn project(&self, sample: &Sample) -> Result<Sample> {
        let inner = self.inner.as_ref().ok_or(ContractError::MissingInner)?;
        inner.project(sample)
    }

    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        let inner = self.inner.as_ref().ok_or(ContractError::MissingInner)?;
        inner.serialize(out)
    }

    fn deserialize(&mut self, input: &mut &[u8]) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(ContractError::MissingInner)?;
        inner.deserialize(input)
    }

    fn clone_unit(&self) -> Box<dyn TrainableUnit> {
        Box::new(Self {
            inner: self.inner.as_ref().map(|u| u.clone_unit()),
            config: self.config.clone(),
        })
    }

    fn is_trainable(&self) -> bool {
        self.inner.as_ref().map_or(false, |u| u.is_trainable())
    }
}
