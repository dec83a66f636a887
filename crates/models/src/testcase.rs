use serde::{Deserialize, Serialize};

/// Closed enumeration of special input kinds.
///
/// Adding a new kind is an explicit enum extension paired with a resolver in
/// the normalizer, not a runtime registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecialInputKind {
    CyclicLinkedList,
}

/// Declared target of a special input config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTarget {
    pub parameter: String,
    pub role: String,
}

/// Declarative per-problem special input configuration, immutable at
/// normalization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialInputConfig {
    pub id: String,
    pub kind: SpecialInputKind,
    pub targets: Vec<ConfigTarget>,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Resolved runtime instruction for one target parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTarget {
    pub parameter: String,
    pub cycle_index: u64,
}

/// Runtime-ready special input derived per test case.
///
/// Ephemeral: recomputed on every normalization pass, never persisted
/// independently of the test case it annotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpecialInput {
    pub kind: SpecialInputKind,
    pub config_id: String,
    pub targets: Vec<RuntimeTarget>,
}

/// A single problem test case as consumed by the execution sandbox.
///
/// `runtime_special_inputs` is present iff at least one config produced a
/// non-empty result for this case; otherwise the field is absent so
/// downstream code keeps a cheap "nothing special" check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemTestCase {
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_input_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_special_inputs: Option<Vec<RuntimeSpecialInput>>,
}
