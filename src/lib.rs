// Conjunto - concurrency and resource-sharing patterns for trainable pipelines
// Library exports

pub mod ensemble; // Per-column clone roster with fork-join training
pub mod error;
pub mod factory; // Unit construction by registered name
pub mod registry; // Reference-counted shared trainable units
pub mod sample;
pub mod sampler; // Class-stratified subsampling
pub mod unit;
pub mod wrapper; // Sampling applied before delegated training

pub use ensemble::ColumnParallelEnsemble;
pub use error::ContractError;
pub use factory::UnitFactory;
pub use registry::{SharedHandle, SharedResourceRegistry, SharedUnitConfig};
pub use sample::{Channel, Sample, SampleCollection};
pub use sampler::SamplerConfig;
pub use unit::TrainableUnit;
pub use wrapper::SampledTrainingWrapper;
