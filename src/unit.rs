// TrainableUnit capability
//
// The polymorphic contract every trainable component implements, and the
// byte framing shared by the serialized layouts (a count field followed by
// length-prefixed blobs).

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ContractError;
use crate::sample::{Sample, SampleCollection};

/// Trait for trainable units
///
/// Concrete units (and the orchestration components that wrap them) implement
/// this trait, providing a unified interface for training, inference, deep
/// cloning, and persistence.
#[async_trait]
pub trait TrainableUnit: Send + Sync {
    /// Fit the unit to a collection of samples
    ///
    /// Collection order is insignificant; implementations may be invoked
    /// concurrently on independent clones but never on a shared instance.
    async fn train(&mut self, data: SampleCollection) -> Result<()>;

    /// Map one sample to its output sample
    fn project(&self, sample: &Sample) -> Result<Sample>;

    /// Append the unit's state to `out`
    fn serialize(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Restore the unit's state, consuming bytes from the front of `input`
    fn deserialize(&mut self, input: &mut &[u8]) -> Result<()>;

    /// Deep copy with independent state
    fn clone_unit(&self) -> Box<dyn TrainableUnit>;

    /// Whether `train` has any effect for this unit
    fn is_trainable(&self) -> bool {
        true
    }
}

/// Append a u32 little-endian value to the stream
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read a u32 little-endian value from the front of the stream
pub fn read_u32(input: &mut &[u8]) -> Result<u32> {
    if input.len() < 4 {
        return Err(ContractError::TruncatedStream.into());
    }
    let (head, rest) = input.split_at(4);
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(head);
    *input = rest;
    Ok(u32::from_le_bytes(bytes))
}

/// Append a length-prefixed blob to the stream
pub fn write_blob(out: &mut Vec<u8>, blob: &[u8]) {
    write_u32(out, blob.len() as u32);
    out.extend_from_slice(blob);
}

/// Read a length-prefixed blob from the front of the stream
pub fn read_blob<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = read_u32(input)? as usize;
    if input.len() < len {
        return Err(ContractError::TruncatedStream.into());
    }
    let (blob, rest) = input.split_at(len);
    *input = rest;
    Ok(blob)
}
