//! Tests for the schema registry.

use super::*;
use crate::frame::parse;

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
}

#[test]
fn vector_with_matching_dim_is_valid() {
    let frame = parse("⟦ TYPE=VECTOR DIM=3 ∷ ℕ⊕ ℤ⊗⊕ ℕ⊙ ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Vector).is_ok());
    assert_eq!(registry().validate_declared(&frame), Ok(FrameKind::Vector));
}

#[test]
fn vector_with_wrong_arity_is_rejected() {
    let frame = parse("⟦ TYPE=VECTOR DIM=3 ∷ ℕ⊕ ℕ⊕ ⟧").unwrap();
    let errors = registry().validate(&frame, FrameKind::Vector).unwrap_err();
    assert_eq!(
        errors,
        vec![SchemaError::PayloadArity {
            expected: "exactly 3".into(),
            found: 2
        }]
    );
}

#[test]
fn matrix_arity_is_rows_times_cols() {
    let tokens = vec!["ℕ⊕"; 6].join(" ");
    let frame = parse(&format!("⟦ TYPE=MATRIX ROWS=2 COLS=3 ∷ {tokens} ⟧")).unwrap();
    assert!(registry().validate(&frame, FrameKind::Matrix).is_ok());
    let frame = parse(&format!("⟦ TYPE=MATRIX ROWS=3 COLS=3 ∷ {tokens} ⟧")).unwrap();
    assert!(registry().validate(&frame, FrameKind::Matrix).is_err());
}

#[test]
fn tensor_arity_is_shape_product() {
    let tokens = vec!["ℕ⊙"; 24].join(" ");
    let frame = parse(&format!("⟦ TYPE=TENSOR SHAPE=2x3x4 ∷ {tokens} ⟧")).unwrap();
    assert!(registry().validate(&frame, FrameKind::Tensor).is_ok());
    let frame = parse("⟦ TYPE=TENSOR SHAPE=2x0 ∷ ⟧").unwrap();
    let errors = registry().validate(&frame, FrameKind::Tensor).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [SchemaError::InvalidHeader { key, .. }] if key == "SHAPE"
    ));
}

#[test]
fn all_violations_are_collected() {
    let frame = parse("⟦ TYPE=LOG LEVEL=LOUD ∷ ⟧").unwrap();
    let errors = registry().validate(&frame, FrameKind::Log).unwrap_err();
    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(errors
        .iter()
        .any(|e| matches!(e, SchemaError::InvalidHeader { key, .. } if key == "LEVEL")));
    assert!(errors
        .iter()
        .any(|e| matches!(e, SchemaError::MissingHeader { key } if key == "SOURCE")));
    assert!(errors
        .iter()
        .any(|e| matches!(e, SchemaError::PayloadArity { .. })));
}

#[test]
fn type_mismatch_is_a_violation() {
    let frame = parse("⟦ TYPE=FACT DIM=1 ∷ ℕ⊕ ⟧").unwrap();
    let errors = registry().validate(&frame, FrameKind::Vector).unwrap_err();
    assert_eq!(
        errors,
        vec![SchemaError::KindMismatch {
            declared: "FACT".into(),
            requested: "VECTOR".into()
        }]
    );
}

#[test]
fn non_numeric_vector_entries_are_reported_by_index() {
    let frame = parse("⟦ TYPE=VECTOR DIM=2 ∷ ℕ⊕ hello ⟧").unwrap();
    let errors = registry().validate(&frame, FrameKind::Vector).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [SchemaError::PayloadToken { index: 1, .. }]
    ));
}

#[test]
fn fact_confidence_is_optional_but_typed() {
    let frame = parse("⟦ TYPE=FACT SUBJECT=sky PREDICATE=is OBJECT=blue ∷ ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Fact).is_ok());
    let frame =
        parse("⟦ TYPE=FACT SUBJECT=sky PREDICATE=is OBJECT=blue CONFIDENCE=0.9 ∷ ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Fact).is_ok());
    let frame =
        parse("⟦ TYPE=FACT SUBJECT=sky PREDICATE=is OBJECT=blue CONFIDENCE=high ∷ ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Fact).is_err());
}

#[test]
fn grammar_rules_must_be_productions() {
    let frame = parse("⟦ TYPE=GRAMMAR NAME=expr RULES=2 ∷ E→T T→n ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Grammar).is_ok());
    let frame = parse("⟦ TYPE=GRAMMAR NAME=expr RULES=2 ∷ E→T Tn ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Grammar).is_err());
}

#[test]
fn task_status_and_train_pair_arity() {
    let frame = parse("⟦ TYPE=TASK ID=t1 STATUS=DONE ∷ ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Task).is_ok());
    let frame = parse("⟦ TYPE=TASK ID=t1 STATUS=SLEEPING ∷ ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::Task).is_err());

    let frame = parse("⟦ TYPE=TRAIN_PAIR INPUT_LEN=2 OUTPUT_LEN=1 ∷ a b c ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::TrainPair).is_ok());
    let frame = parse("⟦ TYPE=TRAIN_PAIR INPUT_LEN=2 OUTPUT_LEN=2 ∷ a b c ⟧").unwrap();
    assert!(registry().validate(&frame, FrameKind::TrainPair).is_err());
}

#[test]
fn validate_declared_handles_missing_and_unknown_types() {
    let frame = parse("⟦ ∷ ⟧").unwrap();
    assert_eq!(
        registry().validate_declared(&frame),
        Err(vec![SchemaError::MissingHeader { key: "TYPE".into() }])
    );
    let frame = parse("⟦ TYPE=POEM ∷ ⟧").unwrap();
    assert_eq!(
        registry().validate_declared(&frame),
        Err(vec![SchemaError::UnknownKind("POEM".into())])
    );
}

#[test]
fn every_builtin_describes_itself_as_a_valid_schema_frame() {
    let registry = registry();
    for kind in FrameKind::ALL {
        let description = registry.describe(kind);
        assert_eq!(description.get("NAME"), Some(kind.name()));
        assert!(
            registry.validate(&description, FrameKind::Schema).is_ok(),
            "{kind}"
        );
    }
}

#[test]
fn described_schema_registers_and_validates_custom_frames() {
    let mut registry = registry();
    let name = registry.register_schema(&registry.describe(FrameKind::Fact)).unwrap();
    assert_eq!(name, "FACT");

    let good = parse("⟦ TYPE=FACT SUBJECT=a PREDICATE=b OBJECT=c ∷ ⟧").unwrap();
    assert!(registry.validate_custom(&good, "FACT").is_ok());
    let bad = parse("⟦ TYPE=FACT SUBJECT=a CONFIDENCE=x ∷ ⟧").unwrap();
    assert_eq!(registry.validate_custom(&bad, "FACT").unwrap_err().len(), 3);
}

#[test]
fn custom_schema_from_text() {
    let mut registry = registry();
    let schema =
        parse("⟦ TYPE=SCHEMA NAME=PERSON FIELDS=3 ∷ NAME:text AGE:uint ROLE:admin|user? ⟧").unwrap();
    registry.register_schema(&schema).unwrap();
    assert_eq!(registry.custom_names(), vec!["PERSON".to_string()]);

    let frame = parse("⟦ TYPE=PERSON NAME=ada AGE=36 ∷ anything goes ⟧").unwrap();
    assert!(registry.validate_custom(&frame, "PERSON").is_ok());
    let frame = parse("⟦ TYPE=PERSON NAME=ada AGE=old ROLE=guest ∷ ⟧").unwrap();
    assert_eq!(registry.validate_custom(&frame, "PERSON").unwrap_err().len(), 2);
    assert_eq!(
        registry.validate_custom(&frame, "ROBOT"),
        Err(vec![SchemaError::UnknownSchema("ROBOT".into())])
    );
}

#[test]
fn malformed_schema_frames_are_not_registered() {
    let mut registry = registry();
    let schema = parse("⟦ TYPE=SCHEMA NAME=BAD FIELDS=2 ∷ A:uint A:text ⟧").unwrap();
    assert!(registry.register_schema(&schema).is_err());
    let schema = parse("⟦ TYPE=SCHEMA NAME=BAD FIELDS=1 ∷ A:blob ⟧").unwrap();
    assert!(registry.register_schema(&schema).is_err());
    assert!(registry.custom_names().is_empty());
}
