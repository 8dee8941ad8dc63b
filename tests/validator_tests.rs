//! Validation and normalization against endpoint schemas.

use pretty_assertions::assert_eq;
use serde_json::json;

use drover::validate::{build_repair_prompt, normalize, validate, ValidationOutcome};

fn diagnosis_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["score", "feedback", "barrierTags"],
        "properties": {
            "score": {"type": "number", "minimum": 0, "maximum": 1},
            "feedback": {"type": "string", "maxLength": 400},
            "barrierTags": {
                "type": "array",
                "maxItems": 3,
                "items": {"type": "string", "enum": ["Concept", "Vocabulary", "Motivation"]}
            },
            "fixKit": {"type": "object"}
        }
    })
}

#[test]
fn well_formed_value_is_valid() {
    let value = json!({
        "score": 0.75,
        "feedback": "solid grasp",
        "barrierTags": ["Concept"],
        "fixKit": {}
    });
    assert!(matches!(
        validate(&value, &diagnosis_schema()),
        ValidationOutcome::Valid { .. }
    ));
}

#[test]
fn missing_required_field_reports_path() {
    let value = json!({"score": 0.5, "barrierTags": []});
    let ValidationOutcome::Invalid { issues } = validate(&value, &diagnosis_schema()) else {
        panic!("expected invalid");
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, "$.feedback");
    assert!(issues[0].message.contains("missing required field"));
}

#[test]
fn wrong_type_reports_nested_path() {
    let schema = json!({
        "type": "object",
        "properties": {
            "quiz": {
                "type": "object",
                "properties": {"count": {"type": "integer"}}
            }
        }
    });
    let value = json!({"quiz": {"count": "three"}});
    let ValidationOutcome::Invalid { issues } = validate(&value, &schema) else {
        panic!("expected invalid");
    };
    assert_eq!(issues[0].path, "$.quiz.count");
    assert!(issues[0].message.contains("expected type 'integer'"));
}

#[test]
fn out_of_range_number_is_invalid() {
    let value = json!({
        "score": 1.4,
        "feedback": "ok",
        "barrierTags": [],
        "fixKit": {}
    });
    let ValidationOutcome::Invalid { issues } = validate(&value, &diagnosis_schema()) else {
        panic!("expected invalid");
    };
    assert_eq!(issues[0].path, "$.score");
    assert!(issues[0].message.contains("<= 1"));
}

#[test]
fn enum_violation_reports_array_index() {
    let value = json!({
        "score": 0.2,
        "feedback": "ok",
        "barrierTags": ["Concept", "Unknown"],
        "fixKit": {}
    });
    let ValidationOutcome::Invalid { issues } = validate(&value, &diagnosis_schema()) else {
        panic!("expected invalid");
    };
    assert_eq!(issues[0].path, "$.barrierTags[1]");
}

#[test]
fn array_length_bounds_enforced() {
    let schema = json!({"type": "array", "minItems": 2, "maxItems": 3});
    assert!(matches!(
        validate(&json!([1]), &schema),
        ValidationOutcome::Invalid { .. }
    ));
    assert!(matches!(
        validate(&json!([1, 2, 3, 4]), &schema),
        ValidationOutcome::Invalid { .. }
    ));
    assert!(matches!(
        validate(&json!([1, 2]), &schema),
        ValidationOutcome::Valid { .. }
    ));
}

#[test]
fn normalize_then_validate_recovers_near_miss_output() {
    // Over-range score plus an unknown tag: normalization clamps and
    // drops, and the cleaned value validates.
    let value = json!({
        "score": 1.4,
        "feedback": "needs review of the core definition",
        "barrierTags": ["Concept", "Unknown"],
        "fixKit": {"drill": "flashcards"}
    });
    let schema = diagnosis_schema();

    let cleaned = normalize(&value, &schema);
    assert_eq!(cleaned["score"].as_f64(), Some(1.0));
    assert_eq!(cleaned["barrierTags"], json!(["Concept"]));

    assert!(matches!(
        validate(&cleaned, &schema),
        ValidationOutcome::Valid { .. }
    ));
}

#[test]
fn normalize_is_identity_on_valid_values() {
    let value = json!({
        "score": 0.4,
        "feedback": "fine",
        "barrierTags": ["Vocabulary"],
        "fixKit": {}
    });
    assert_eq!(normalize(&value, &diagnosis_schema()), value);
}

#[test]
fn normalize_snaps_case_insensitive_enum() {
    let schema = json!({"type": "string", "enum": ["Concept", "Vocabulary"]});
    assert_eq!(normalize(&json!("concept"), &schema), json!("Concept"));
    assert_eq!(
        normalize(&json!("barrier: vocabulary"), &schema),
        json!("Vocabulary")
    );
    // Unrecognized values are left for strict validation to flag.
    assert_eq!(normalize(&json!("Stamina"), &schema), json!("Stamina"));
}

#[test]
fn normalize_truncates_long_strings() {
    let schema = json!({"type": "string", "maxLength": 5});
    assert_eq!(normalize(&json!("truncate me"), &schema), json!("trunc"));
}

#[test]
fn normalize_truncates_over_long_arrays() {
    let schema = json!({"type": "array", "maxItems": 2, "items": {"type": "integer"}});
    assert_eq!(normalize(&json!([1, 2, 3, 4]), &schema), json!([1, 2]));
}

#[test]
fn repair_prompt_lists_issues_and_truncates_excerpt() {
    let issues = match validate(
        &json!({"score": 2.0, "feedback": "x", "barrierTags": []}),
        &diagnosis_schema(),
    ) {
        ValidationOutcome::Invalid { issues } => issues,
        ValidationOutcome::Valid { .. } => panic!("expected invalid"),
    };

    let invalid_output = "y".repeat(800);
    let prompt = build_repair_prompt("Diagnose the learner's barrier.", &invalid_output, &issues);

    assert!(prompt.contains("- $.score: must be <= 1"));
    assert!(prompt.contains("Diagnose the learner's barrier."));
    assert!(prompt.contains(&"y".repeat(500)));
    assert!(!prompt.contains(&"y".repeat(501)));
    assert!(prompt.contains("ONLY a single corrected JSON document"));
}
