// Column-parallel ensemble
//
// Trains one clone of a prototype unit per aligned channel position
// ("column") with a fork-join barrier, then dispatches each channel to its
// clone at inference time. Clones are exclusively owned by their column, so
// training tasks share no mutable state.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;

use crate::error::ContractError;
use crate::sample::{Sample, SampleCollection};
use crate::unit::{read_blob, read_u32, write_blob, write_u32, TrainableUnit};

pub struct ColumnParallelEnsemble {
    prototype: Box<dyn TrainableUnit>,
    roster: Vec<Box<dyn TrainableUnit>>,
}

impl ColumnParallelEnsemble {
    /// Ensemble with an empty roster, grown lazily by cloning the prototype
    pub fn new(prototype: Box<dyn TrainableUnit>) -> Self {
        Self {
            prototype,
            roster: Vec::new(),
        }
    }

    /// Number of clones currently in the roster (never shrinks)
    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    /// Regroup samples by column index: channel i of every sample, paired
    /// with that sample's metadata, lands in the per-column collection i.
    fn regroup(data: &SampleCollection) -> Vec<SampleCollection> {
        let mut columns: Vec<SampleCollection> = Vec::new();
        for sample in data {
            if !columns.is_empty() && columns.len() != sample.channels.len() {
                tracing::warn!(
                    expected = columns.len(),
                    got = sample.channels.len(),
                    "sample channel count differs from expected width, grouping best-effort"
                );
            }
            while columns.len() < sample.channels.len() {
                columns.push(SampleCollection::new());
            }
            for (i, channel) in sample.channels.iter().enumerate() {
                columns[i].push(Sample {
                    channels: vec![channel.clone()],
                    meta: sample.meta.clone(),
                });
            }
        }
        columns
    }

    fn grow_roster(&mut self, len: usize) {
        while self.roster.len() < len {
            self.roster.push(self.prototype.clone_unit());
        }
    }
}

#[async_trait]
impl TrainableUnit for ColumnParallelEnsemble {
    async fn train(&mut self, data: SampleCollection) -> Result<()> {
        // Don't bother if the prototype is untrainable
        if !self.is_trainable() {
            return Ok(());
        }

        let columns = Self::regroup(&data);
        if columns.is_empty() {
            return Ok(());
        }
        self.grow_roster(columns.len());

        tracing::debug!(
            columns = columns.len(),
            samples = data.len(),
            "launching per-column training tasks"
        );

        // Move each clone into its task; collect them back by index after
        // the barrier so the roster keeps its order.
        let count = columns.len();
        let tail = self.roster.split_off(count);
        let head = std::mem::take(&mut self.roster);

        let mut tasks = Vec::with_capacity(count);
        for ((i, mut unit), column) in head.into_iter().enumerate().zip(columns) {
            tasks.push(tokio::spawn(async move {
                let outcome = unit.train(column).await;
                (i, unit, outcome)
            }));
        }

        // Fork-join barrier: every task runs to completion before any
        // failure propagates.
        let mut trained: Vec<Option<Box<dyn TrainableUnit>>> =
            (0..count).map(|_| None).collect();
        let mut failure: Option<anyhow::Error> = None;
        for joined in join_all(tasks).await {
            match joined {
                Ok((i, unit, outcome)) => {
                    trained[i] = Some(unit);
                    if let Err(err) = outcome {
                        if failure.is_none() {
                            failure = Some(err.context(format!("column {i} training failed")));
                        }
                    }
                }
                Err(join_err) => {
                    if failure.is_none() {
                        failure = Some(anyhow!(join_err).context("column training task panicked"));
                    }
                }
            }
        }

        let mut roster = Vec::with_capacity(count + tail.len());
        for slot in trained {
            // A slot is only vacant when its task panicked; replace it with
            // a fresh clone so the roster never shrinks.
            roster.push(slot.unwrap_or_else(|| self.prototype.clone_unit()));
        }
        roster.extend(tail);
        self.roster = roster;

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn project(&self, sample: &Sample) -> Result<Sample> {
        if self.roster.is_empty() {
            return Err(ContractError::EmptyRoster.into());
        }

        let mut channels = Vec::with_capacity(sample.channels.len());
        for (i, channel) in sample.channels.iter().enumerate() {
            let single = Sample {
                channels: vec![channel.clone()],
                meta: sample.meta.clone(),
            };
            let projected = self.roster[i % self.roster.len()]
                .project(&single)
                .with_context(|| format!("projection failed for channel {i}"))?;
            channels.extend(projected.channels);
        }

        Ok(Sample {
            channels,
            meta: sample.meta.clone(),
        })
    }

    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u32(out, self.roster.len() as u32);
        for unit in &self.roster {
            let mut blob = Vec::new();
            unit.serialize(&mut blob)?;
            write_blob(out, &blob);
        }
        Ok(())
    }

    fn deserialize(&mut self, input: &mut &[u8]) -> Result<()> {
        let count = read_u32(input)? as usize;
        self.grow_roster(count);
        for i in 0..count {
            let mut blob = read_blob(input)?;
            self.roster[i]
                .deserialize(&mut blob)
                .with_context(|| format!("failed to restore roster entry {i}"))?;
        }
        Ok(())
    }

    fn clone_unit(&self) -> Box<dyn TrainableUnit> {
        Box::new(Self {
            prototype: self.prototype.clone_unit(),
            roster: self.roster.iter().map(|u| u.clone_unit()).collect(),
        })
    }

    fn is_trainable(&self) -> bool {
        self.prototype.is_trainable()
    }
}
