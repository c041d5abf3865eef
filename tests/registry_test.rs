// Integration test: shared-resource registry
// Verifies reference-counted train-once semantics, underflow rejection,
// generation reuse, and single-writer persistence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use conjunto::{
    Sample, SampleCollection, SharedResourceRegistry, SharedUnitConfig, TrainableUnit,
    UnitFactory,
};

/// Records every training batch; state is the set of values seen so far
struct RecordingUnit {
    train_calls: Arc<AtomicUsize>,
    batches: Arc<Mutex<Vec<Vec<f32>>>>,
    state: Vec<f32>,
}

#[async_trait]
impl TrainableUnit for RecordingUnit {
    async fn train(&mut self, data: SampleCollection) -> Result<()> {
        let mut values: Vec<f32> = data
            .iter()
            .flat_map(|s| s.channels.iter().flatten().copied())
            .collect();
        values.sort_by(f32::total_cmp);
        self.state = values.clone();
        self.train_calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(values);
        Ok(())
    }

    fn project(&self, sample: &Sample) -> Result<Sample> {
        Ok(sample.clone())
    }

    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        for value in &self.state {
            out.extend_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    fn deserialize(&mut self, input: &mut &[u8]) -> Result<()> {
        if input.len() % 4 != 0 {
            bail!("recording unit state truncated");
        }
        self.state = input
            .chunks_exact(4)
            .map(|chunk| {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(chunk);
                f32::from_le_bytes(bytes)
            })
            .collect();
        *input = &[];
        Ok(())
    }

    fn clone_unit(&self) -> Box<dyn TrainableUnit> {
        Box::new(Self {
            train_calls: Arc::clone(&self.train_calls),
            batches: Arc::clone(&self.batches),
            state: self.state.clone(),
        })
    }
}

struct Probe {
    train_calls: Arc<AtomicUsize>,
    batches: Arc<Mutex<Vec<Vec<f32>>>>,
}

/// Registry whose factory builds recording units, plus the shared probes
fn recording_registry() -> (SharedResourceRegistry, Probe) {
    let train_calls = Arc::new(AtomicUsize::new(0));
    let batches = Arc::new(Mutex::new(Vec::new()));

    // The registry constructs units by identifier, so every identifier the
    // tests acquire needs a registered constructor
    let mut factory = UnitFactory::new();
    for identifier in ["Identity", "A", "B", "X"] {
        let calls = Arc::clone(&train_calls);
        let seen = Arc::clone(&batches);
        factory.register(identifier, move || {
            Box::new(RecordingUnit {
                train_calls: Arc::clone(&calls),
                batches: Arc::clone(&seen),
                state: Vec::new(),
            })
        });
    }

    (
        SharedResourceRegistry::new(factory),
        Probe {
            train_calls,
            batches,
        },
    )
}

fn single(value: f32) -> SampleCollection {
    vec![Sample::new(vec![vec![value]])]
}

#[tokio::test]
async fn test_two_owners_train_exactly_once() -> Result<()> {
    let (registry, probe) = recording_registry();

    let first = registry.acquire("A").await?;
    let second = registry.acquire("A").await?;
    assert_eq!(registry.reference_count("A").await, 2);

    // First contribution buffers without training
    registry.train(&first, single(1.0)).await?;
    assert_eq!(registry.reference_count("A").await, 1);
    assert_eq!(probe.train_calls.load(Ordering::SeqCst), 0);

    // Second contribution drops the count to zero and trains once
    registry.train(&second, single(2.0)).await?;
    assert_eq!(registry.reference_count("A").await, 0);
    assert_eq!(probe.train_calls.load(Ordering::SeqCst), 1);

    let batches = probe.batches.lock().unwrap();
    assert_eq!(batches.as_slice(), &[vec![1.0, 2.0]]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_many_owners_aggregate_all_contributions() -> Result<()> {
    let (registry, probe) = recording_registry();
    let registry = Arc::new(registry);

    let owners = 8;
    let mut handles = Vec::new();
    for _ in 0..owners {
        handles.push(registry.acquire("X").await?);
    }

    let mut tasks = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.train(&handle, single(i as f32)).await
        }));
    }
    for task in tasks {
        task.await??;
    }

    assert_eq!(probe.train_calls.load(Ordering::SeqCst), 1);
    let batches = probe.batches.lock().unwrap();
    let expected: Vec<f32> = (0..owners).map(|i| i as f32).collect();
    assert_eq!(batches.as_slice(), &[expected]);

    Ok(())
}

#[tokio::test]
async fn test_acquire_requires_a_registered_constructor() -> Result<()> {
    let (registry, _probe) = recording_registry();

    // Units are constructed by identifier, so an identifier without a
    // registered constructor is rejected at acquire time
    let result = registry.acquire("Unregistered").await;
    assert!(result.is_err());
    assert_eq!(registry.reference_count("Unregistered").await, 0);

    Ok(())
}

#[tokio::test]
async fn test_underflow_is_rejected() -> Result<()> {
    let (registry, probe) = recording_registry();

    let handle = registry.acquire("A").await?;
    registry.train(&handle, single(1.0)).await?;
    assert_eq!(probe.train_calls.load(Ordering::SeqCst), 1);

    // One more train call than acquire: contract violation
    let result = registry.train(&handle, single(2.0)).await;
    assert!(result.is_err());
    assert_eq!(probe.train_calls.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_entry_is_reused_across_generations() -> Result<()> {
    let (registry, probe) = recording_registry();

    let handle = registry.acquire("A").await?;
    registry.train(&handle, single(1.0)).await?;

    // A second generation acquires the same entry and trains it again with
    // only its own pending data
    let next = registry.acquire("A").await?;
    assert!(!next.is_owner());
    registry.train(&next, single(5.0)).await?;

    assert_eq!(probe.train_calls.load(Ordering::SeqCst), 2);
    let batches = probe.batches.lock().unwrap();
    assert_eq!(batches.as_slice(), &[vec![1.0], vec![5.0]]);

    Ok(())
}

#[tokio::test]
async fn test_distinct_identifiers_use_distinct_units() -> Result<()> {
    let (registry, probe) = recording_registry();

    let a = registry.acquire("A").await?;
    let b = registry.acquire("B").await?;

    registry.train(&a, single(1.0)).await?;
    registry.train(&b, single(2.0)).await?;

    // Each identifier trained independently
    assert_eq!(probe.train_calls.load(Ordering::SeqCst), 2);
    let batches = probe.batches.lock().unwrap();
    assert_eq!(batches.as_slice(), &[vec![1.0], vec![2.0]]);

    Ok(())
}

#[tokio::test]
async fn test_project_delegates_to_shared_unit() -> Result<()> {
    let (registry, _probe) = recording_registry();

    let config = SharedUnitConfig::default();
    let handle = registry.acquire(&config.identifier).await?;
    registry.train(&handle, single(1.0)).await?;

    let sample = Sample::new(vec![vec![7.0]]).with_label("q");
    let output = registry.project(&handle, &sample).await?;
    assert_eq!(output.channels, sample.channels);

    Ok(())
}

#[tokio::test]
async fn test_only_the_creating_owner_persists() -> Result<()> {
    let (registry, _probe) = recording_registry();

    let owner = registry.acquire("A").await?;
    let other = registry.acquire("A").await?;
    assert!(owner.is_owner());
    assert!(!other.is_owner());

    registry.train(&owner, single(3.0)).await?;
    registry.train(&other, single(4.0)).await?;

    let mut owned = Vec::new();
    registry.serialize(&owner, &mut owned).await?;
    assert!(!owned.is_empty());

    // Non-owning handles never write
    let mut skipped = Vec::new();
    registry.serialize(&other, &mut skipped).await?;
    assert!(skipped.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_persisted_state_survives_a_disk_round_trip() -> Result<()> {
    let (registry, _probe) = recording_registry();

    let owner = registry.acquire("A").await?;
    registry.train(&owner, single(3.0)).await?;

    let mut blob = Vec::new();
    registry.serialize(&owner, &mut blob).await?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("shared_unit.bin");
    std::fs::write(&path, &blob)?;
    let restored = std::fs::read(&path)?;

    let (fresh_registry, _fresh_probe) = recording_registry();
    let fresh_owner = fresh_registry.acquire("A").await?;
    let mut input = restored.as_slice();
    fresh_registry.deserialize(&fresh_owner, &mut input).await?;
    assert!(input.is_empty());

    let mut rewritten = Vec::new();
    fresh_registry.serialize(&fresh_owner, &mut rewritten).await?;
    assert_eq!(rewritten, blob);

    Ok(())
}
