#![allow(clippy::unwrap_used, clippy::expect_used)]

use foreman_core::*;

// ---------------------------------------------------------------------------
// 1. Vocabulary round trips through JSON the way records are persisted
// ---------------------------------------------------------------------------

#[test]
fn taxonomy_in_json_record() {
    let record = serde_json::json!({
        "priority": Priority::High,
        "category": TaskCategory::CodeGeneration,
        "complexity": Complexity::Complex,
        "archetype": Archetype::CodeGenerator,
    });

    assert_eq!(record["priority"], "high");
    assert_eq!(record["category"], "code_generation");
    assert_eq!(record["complexity"], "complex");
    assert_eq!(record["archetype"], "code_generator");

    let archetype: Archetype = serde_json::from_value(record["archetype"].clone()).unwrap();
    assert_eq!(archetype, Archetype::CodeGenerator);
}

// ---------------------------------------------------------------------------
// 2. Errors propagate with `?` across subsystems
// ---------------------------------------------------------------------------

fn parse_archetype(raw: &str) -> ForemanResult<Archetype> {
    let archetype = raw.parse::<Archetype>()?;
    Ok(archetype)
}

#[test]
fn error_propagation_through_question_mark() {
    assert_eq!(parse_archetype("translator").unwrap(), Archetype::Translator);

    let err = parse_archetype("alchemist").unwrap_err();
    assert!(matches!(err, ForemanError::Config(_)));
    assert!(err.to_string().contains("alchemist"));
}

#[test]
fn every_archetype_has_a_display_name() {
    for archetype in Archetype::ALL {
        assert!(!archetype.display_name().is_empty());
    }
}
