//! Special-input preparation.
//!
//! Converts declarative per-problem special-input configs plus raw per-case
//! payloads into runtime instructions for the execution sandbox. Pure and
//! idempotent: `runtime_special_inputs` is recomputed from
//! `special_input_data` on every pass, never accumulated.

use arena_models::{
    ProblemTestCase, RuntimeSpecialInput, RuntimeTarget, SpecialInputConfig, SpecialInputKind,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Legacy payloads nest the per-config map under this wrapper key.
const LEGACY_WRAPPER_KEY: &str = "specialInputs";

/// Nested value shapes carry the index under this field.
const CYCLE_INDEX_KEY: &str = "cycleIndex";

/// Normalize a batch of test cases against the problem's configs.
///
/// Runs once per batch before dispatch. Cases without applicable configs or
/// payload come back with `runtime_special_inputs` absent, keeping the cheap
/// "nothing special" check downstream.
pub fn normalize(
    test_cases: Vec<ProblemTestCase>,
    configs: &[SpecialInputConfig],
) -> Vec<ProblemTestCase> {
    test_cases
        .into_iter()
        .map(|case| normalize_case(case, configs))
        .collect()
}

fn normalize_case(mut case: ProblemTestCase, configs: &[SpecialInputConfig]) -> ProblemTestCase {
    // Recomputed from scratch; a previous pass's output never survives.
    case.runtime_special_inputs = None;

    let Some(raw) = case.special_input_data.as_ref() else {
        return case;
    };
    let payload = flatten_payload(raw);
    if payload.is_empty() {
        return case;
    }

    let mut runtime = Vec::new();
    for config in configs {
        let targets = match config.kind {
            SpecialInputKind::CyclicLinkedList => resolve_cyclic_targets(config, &payload),
        };
        if targets.is_empty() {
            continue;
        }
        runtime.push(RuntimeSpecialInput {
            kind: config.kind,
            config_id: config.id.clone(),
            targets,
        });
    }

    if !runtime.is_empty() {
        debug!(inputs = runtime.len(), "test case carries special inputs");
        case.runtime_special_inputs = Some(runtime);
    }
    case
}

/// Fold legacy nested payload shapes into the current flat
/// `{config_id: value}` map. This is the single adapter confining legacy
/// parsing; applying it to already-flat payloads is a no-op.
pub fn flatten_payload(raw: &Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => match map.get(LEGACY_WRAPPER_KEY) {
            // Double-wrapped legacy payloads flatten all the way down.
            Some(inner @ Value::Object(_)) => flatten_payload(inner),
            _ => map.clone(),
        },
        _ => Map::new(),
    }
}

/// Resolve a cycle index per declared target of a cyclic-linked-list config.
///
/// Preference order: value keyed by the exact parameter name inside the
/// config's entry, then the entry itself as a generic single value when the
/// config declares exactly one target. Targets that do not resolve to a
/// non-negative integer are dropped silently: no cycle for that parameter.
fn resolve_cyclic_targets(
    config: &SpecialInputConfig,
    payload: &Map<String, Value>,
) -> Vec<RuntimeTarget> {
    let Some(entry) = payload.get(&config.id) else {
        return Vec::new();
    };

    let mut targets = Vec::new();
    for target in &config.targets {
        let candidate = match entry {
            Value::Object(map) if map.contains_key(&target.parameter) => {
                map.get(&target.parameter)
            }
            _ if config.targets.len() == 1 => Some(entry),
            _ => None,
        };

        if let Some(cycle_index) = candidate.and_then(resolve_cycle_index) {
            targets.push(RuntimeTarget {
                parameter: target.parameter.clone(),
                cycle_index,
            });
        }
    }
    targets
}

/// Coerce a payload value into a non-negative integer cycle index.
///
/// Accepts integers, integer-valued numeric strings and objects nesting a
/// `cycleIndex` field (resolved recursively, which flattens legacy
/// double-nesting instead of accumulating it).
fn resolve_cycle_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Object(map) => map.get(CYCLE_INDEX_KEY).and_then(resolve_cycle_index),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_models::ConfigTarget;
    use serde_json::json;

    fn cyclic_config(id: &str, parameters: &[&str]) -> SpecialInputConfig {
        SpecialInputConfig {
            id: id.to_string(),
            kind: SpecialInputKind::CyclicLinkedList,
            targets: parameters
                .iter()
                .map(|p| ConfigTarget {
                    parameter: p.to_string(),
                    role: "head".to_string(),
                })
                .collect(),
            options: Value::Null,
        }
    }

    fn case(special_input_data: Option<Value>) -> ProblemTestCase {
        ProblemTestCase {
            input: json!({"head": [1, 2, 3]}),
            output: json!(true),
            special_input_data,
            runtime_special_inputs: None,
        }
    }

    #[test]
    fn test_single_target_object_value() {
        let configs = vec![cyclic_config("cfgA", &["head"])];
        let cases = vec![case(Some(json!({"cfgA": {"cycleIndex": 2}})))];

        let normalized = normalize(cases, &configs);
        let inputs = normalized[0].runtime_special_inputs.as_ref().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].config_id, "cfgA");
        assert_eq!(
            inputs[0].targets,
            vec![RuntimeTarget {
                parameter: "head".to_string(),
                cycle_index: 2,
            }]
        );
    }

    #[test]
    fn test_generic_single_value_fallback() {
        let configs = vec![cyclic_config("cfgA", &["head"])];

        for value in [json!({"cfgA": 3}), json!({"cfgA": "3"})] {
            let normalized = normalize(vec![case(Some(value))], &configs);
            let inputs = normalized[0].runtime_special_inputs.as_ref().unwrap();
            assert_eq!(inputs[0].targets[0].cycle_index, 3);
        }
    }

    #[test]
    fn test_generic_fallback_needs_single_target() {
        // Two declared targets, one generic value: neither resolves.
        let configs = vec![cyclic_config("cfgA", &["headA", "headB"])];
        let normalized = normalize(vec![case(Some(json!({"cfgA": 2})))], &configs);
        assert!(normalized[0].runtime_special_inputs.is_none());
    }

    #[test]
    fn test_per_parameter_values() {
        let configs = vec![cyclic_config("cfgA", &["headA", "headB"])];
        let payload = json!({"cfgA": {"headA": 0, "headB": "4"}});

        let normalized = normalize(vec![case(Some(payload))], &configs);
        let targets = &normalized[0].runtime_special_inputs.as_ref().unwrap()[0].targets;
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].cycle_index, 0);
        assert_eq!(targets[1].cycle_index, 4);
    }

    #[test]
    fn test_unresolvable_target_dropped_silently() {
        let configs = vec![cyclic_config("cfgA", &["headA", "headB"])];
        let payload = json!({"cfgA": {"headA": 1, "headB": -2}});

        let normalized = normalize(vec![case(Some(payload))], &configs);
        let targets = &normalized[0].runtime_special_inputs.as_ref().unwrap()[0].targets;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].parameter, "headA");
    }

    #[test]
    fn test_config_with_zero_resolved_targets_contributes_nothing() {
        let configs = vec![cyclic_config("cfgA", &["head"])];
        let normalized = normalize(
            vec![case(Some(json!({"cfgA": {"head": "not-a-number"}})))],
            &configs,
        );
        assert!(normalized[0].runtime_special_inputs.is_none());
    }

    #[test]
    fn test_no_payload_leaves_field_absent() {
        let configs = vec![cyclic_config("cfgA", &["head"])];
        let normalized = normalize(vec![case(None)], &configs);
        assert!(normalized[0].runtime_special_inputs.is_none());

        let serialized = serde_json::to_value(&normalized[0]).unwrap();
        assert!(serialized.get("runtimeSpecialInputs").is_none());
    }

    #[test]
    fn test_unmatched_config_id_contributes_nothing() {
        let configs = vec![cyclic_config("cfgB", &["head"])];
        let normalized = normalize(vec![case(Some(json!({"cfgA": 2})))], &configs);
        assert!(normalized[0].runtime_special_inputs.is_none());
    }

    #[test]
    fn test_idempotent_over_own_output() {
        let configs = vec![cyclic_config("cfgA", &["head"])];
        let cases = vec![case(Some(json!({"cfgA": {"cycleIndex": 2}})))];

        let once = normalize(cases, &configs);
        let twice = normalize(once.clone(), &configs);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_legacy_wrapper_flattened_not_accumulated() {
        let configs = vec![cyclic_config("cfgA", &["head"])];
        let legacy = json!({"specialInputs": {"cfgA": {"cycleIndex": 5}}});
        let double_wrapped = json!({"specialInputs": {"specialInputs": {"cfgA": 5}}});

        for payload in [legacy, double_wrapped] {
            let normalized = normalize(vec![case(Some(payload))], &configs);
            let inputs = normalized[0].runtime_special_inputs.as_ref().unwrap();
            assert_eq!(inputs[0].targets[0].cycle_index, 5);
        }
    }

    #[test]
    fn test_flatten_payload_is_idempotent() {
        let legacy = json!({"specialInputs": {"cfgA": 1}});
        let once = flatten_payload(&legacy);
        let twice = flatten_payload(&Value::Object(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_nested_cycle_index_resolved_recursively() {
        let configs = vec![cyclic_config("cfgA", &["head"])];
        let payload = json!({"cfgA": {"cycleIndex": {"cycleIndex": 7}}});

        let normalized = normalize(vec![case(Some(payload))], &configs);
        let inputs = normalized[0].runtime_special_inputs.as_ref().unwrap();
        assert_eq!(inputs[0].targets[0].cycle_index, 7);
    }
}
