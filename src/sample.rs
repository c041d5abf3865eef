// Sample data model
//
// A Sample is an ordered sequence of channels plus a metadata record.
// Channels are positionally aligned across all samples fed to the same
// ensemble; metadata carries the class label and the exclusion flag
// consulted by stratified sampling.

use std::collections::HashMap;

use serde_json::Value;

/// One positional data unit within a sample.
pub type Channel = Vec<f32>;

/// Metadata key for the default class label.
pub const LABEL_KEY: &str = "Label";

/// Metadata key marking a sample as ineligible for training selection.
pub const EXCLUDED_KEY: &str = "Excluded";

/// One unit of input data: ordered channels plus key-value metadata.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// Channel data, aligned by position across samples
    pub channels: Vec<Channel>,
    /// Key-value attributes (label, exclusion flag, anything else)
    pub meta: HashMap<String, Value>,
}

impl Sample {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            meta: HashMap::new(),
        }
    }

    /// Set the default label field
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.meta.insert(LABEL_KEY.to_string(), Value::String(label.into()));
        self
    }

    /// Set an arbitrary metadata attribute
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Mark the sample as excluded from training selection
    pub fn with_excluded(mut self, excluded: bool) -> Self {
        self.meta.insert(EXCLUDED_KEY.to_string(), Value::Bool(excluded));
        self
    }

    /// Append a channel
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Look up a string-valued metadata field (used for class labels)
    pub fn label(&self, field: &str) -> Option<&str> {
        self.meta.get(field).and_then(Value::as_str)
    }

    /// Whether this sample is flagged excluded (missing flag means eligible)
    pub fn excluded(&self) -> bool {
        self.meta
            .get(EXCLUDED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Ordered sequence of samples. Order is insignificant for training but
/// preserved by inference (output order mirrors input order).
pub type SampleCollection = Vec<Sample>;
