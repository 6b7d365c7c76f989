//! Integration tests for `Reviewer` with a schema derived from Rust types.

use autoreview::Error;
use autoreview::core::testing::{ScriptedEvent, ScriptedModel};
use autoreview::core::{CleanedResult, Reviewer, SchemaDescriptor};
use autoreview::error::{CleanError, GenerationErrorKind};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
struct FailureDetails {
    error_labels: Vec<String>,
    critic_comment: String,
    reasoning_response: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TurnDetail {
    turn_number: i64,
    turn_type: String,
    passed: bool,
    cited_instructions: Vec<String>,
    failure_details: Option<FailureDetails>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Evaluation {
    starting_remark: String,
    turns: Vec<TurnDetail>,
    total_model_failures: i64,
    task_level_pass_fail: String,
}

const ANSWER: &str = r#"{
    "starting_remark": "Here is the evaluation.",
    "turns": [
        {
            "turn_number": 1,
            "turn_type": "Default clarification",
            "passed": true,
            "cited_instructions": ["SM-1"]
        },
        {
            "turn_number": 2,
            "turn_type": "Model failure",
            "passed": true,
            "cited_instructions": ["SM-12", "SM-16"],
            "failure_details": {
                "error_labels": ["wrong_param_value"],
                "critic_comment": "The model passed a title where an id was expected.",
                "reasoning_response": null
            }
        }
    ],
    "total_model_failures": 1,
    "task_level_pass_fail": "FAIL"
}"#;

fn reviewer(model: ScriptedModel) -> Reviewer<ScriptedModel> {
    Reviewer::for_type::<Evaluation>(model, "You are an expert evaluator.").unwrap()
}

#[tokio::test]
async fn test_structured_review_round_trip() {
    let (head, tail) = ANSWER.split_at(ANSWER.len() / 2);
    let reviewer = reviewer(ScriptedModel::new().with_chunks([head, tail]));

    let result = reviewer.review("transcript").await.unwrap();
    assert!(matches!(result, CleanedResult::ValidatedData(_)));

    let evaluation: Evaluation = result.deserialize().unwrap();
    assert_eq!(evaluation.turns.len(), 2);
    assert_eq!(evaluation.total_model_failures, 1);
    assert_eq!(evaluation.task_level_pass_fail, "FAIL");
    assert_eq!(evaluation.starting_remark, "Here is the evaluation.");

    let failure = evaluation.turns[1].failure_details.as_ref().unwrap();
    assert_eq!(failure.error_labels, vec!["wrong_param_value"]);
    assert!(failure.reasoning_response.is_none());
    assert!(evaluation.turns[0].passed);
    assert_eq!(evaluation.turns[0].turn_type, "Default clarification");
    assert_eq!(evaluation.turns[1].cited_instructions, vec!["SM-12", "SM-16"]);
    assert!(!failure.critic_comment.is_empty());
    assert_eq!(evaluation.turns[1].turn_number, 2);
}

#[tokio::test]
async fn test_review_request_carries_schema_hint() {
    let reviewer = reviewer(ScriptedModel::new().with_chunks([ANSWER]));
    reviewer.review("transcript").await.unwrap();

    let requests = reviewer.session().model().requests();
    let constraint = requests[0].output_constraint.as_ref().unwrap();
    assert_eq!(constraint.mime_type, "application/json");
    let response_schema = constraint.response_schema.as_ref().unwrap();
    assert_eq!(response_schema["properties"]["turns"]["type"], "ARRAY");
    assert_eq!(
        requests[0].system_instruction.as_deref(),
        Some("You are an expert evaluator.")
    );
}

#[tokio::test]
async fn test_mismatch_points_into_nested_turns() {
    let passed = r#""passed": true"#;
    let at = ANSWER.rfind(passed).unwrap();
    let answer = format!(
        r#"{}"passed": "yes"{}"#,
        &ANSWER[..at],
        &ANSWER[at + passed.len()..]
    );
    let reviewer = reviewer(ScriptedModel::new().with_chunks([answer]));

    let err = reviewer.review("transcript").await.unwrap_err();

    match err {
        Error::Clean(CleanError::SchemaMismatch {
            path,
            expected,
            actual,
        }) => {
            assert_eq!(path, "turns[1].passed");
            assert_eq!(expected, "boolean");
            assert_eq!(actual, "string");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_truncated_answer_is_malformed() {
    let reviewer = reviewer(ScriptedModel::new().with_chunks([&ANSWER[..40]]));

    let err = reviewer.review("transcript").await.unwrap_err();

    assert!(matches!(
        err,
        Error::Clean(CleanError::MalformedOutput { .. })
    ));
}

#[tokio::test]
async fn test_generation_failure_surfaces_as_generation_error() {
    let reviewer = reviewer(ScriptedModel::new().with_events(vec![
        ScriptedEvent::chunk("{\"starting"),
        ScriptedEvent::Fail("stream reset".to_string()),
    ]));

    let err = reviewer.review("transcript").await.unwrap_err();

    let Error::Generation(err) = err else {
        panic!("expected a generation error, got {err:?}");
    };
    assert_eq!(err.kind, GenerationErrorKind::Transport);
    assert_eq!(err.partial_text, "{\"starting");
}

#[tokio::test]
async fn test_review_without_schema_returns_raw_text() {
    let reviewer = Reviewer::new(
        ScriptedModel::new().with_chunks(["Looks ", "good."]),
        "Review the text.",
        None,
    )
    .unwrap();

    let result = reviewer.review("text").await.unwrap();

    assert_eq!(result, CleanedResult::RawText("Looks good.".to_string()));
    assert!(reviewer.session().configuration().schema().is_none());
}

#[test]
fn test_derived_schema_marks_optional_fields() {
    let schema = SchemaDescriptor::for_type::<FailureDetails>().unwrap();
    let SchemaDescriptor::Object { fields } = schema else {
        panic!("expected an object schema");
    };

    let required: Vec<(&str, bool)> = fields
        .iter()
        .map(|field| (field.name.as_str(), field.required))
        .collect();
    assert_eq!(
        required,
        vec![
            ("error_labels", true),
            ("critic_comment", true),
            ("reasoning_response", false)
        ]
    );
}
