//! Wire types exchanged with the evaluation service.
//!
//! Responses are decoded into [`RawEvaluationResponse`] and immediately turned
//! into an [`EvaluationOutcome`], so nothing past the network boundary looks at
//! optional response fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::position::{ErrorPosition, extract_error_position};

/// Opaque key-value mapping forwarded verbatim to the evaluator.
pub type Metadata = Map<String, Value>;

/// Request for evaluating an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionRequest {
    /// Expression source text
    pub expression: String,
    /// Variable bindings visible to the expression
    pub context: Map<String, Value>,
    /// Forwarded as-is
    pub metadata: Metadata,
}

/// Request for evaluating unary tests against an input value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryTestsRequest {
    pub expression: String,
    /// Always serialized, `null` when no input value is configured
    #[serde(rename = "inputValue")]
    pub input_value: Value,
    pub context: Map<String, Value>,
    pub metadata: Metadata,
}

/// Either request variant, as built by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationRequest {
    Expression(ExpressionRequest),
    UnaryTests(UnaryTestsRequest),
}

impl EvaluationRequest {
    pub fn expression(&self) -> &str {
        match self {
            EvaluationRequest::Expression(request) => &request.expression,
            EvaluationRequest::UnaryTests(request) => &request.expression,
        }
    }
}

/// Non-fatal diagnostic attached to a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Response body as sent by the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvaluationResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "nullable_warnings")]
    pub warnings: Vec<Warning>,
}

fn nullable_warnings<'de, D>(deserializer: D) -> Result<Vec<Warning>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Warning>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where an evaluation failure was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Context or input value text was not valid JSON; nothing was sent
    LocalInput,
    /// The engine rejected the expression
    Evaluation,
    /// The service could not be reached or answered with garbage
    Transport,
}

/// A failed evaluation, as displayed and handed to error callbacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    pub warnings: Vec<Warning>,
}

impl EvaluationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            position: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: ErrorPosition) -> Self {
        self.line = position.line;
        self.position = position.position;
        self
    }

    /// `Error`, followed by the line and position when known.
    pub fn title(&self) -> String {
        if self.kind == FailureKind::Transport {
            return "Evaluation service unreachable".to_string();
        }
        let on_line = self
            .line
            .map(|line| format!(" on line {}", line))
            .unwrap_or_default();
        let at_position = self
            .position
            .map(|position| format!(" at position {}", position))
            .unwrap_or_default();
        format!("Error{}{}", on_line, at_position)
    }
}

/// Tagged outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    Success { value: Value, warnings: Vec<Warning> },
    Failure(EvaluationFailure),
}

impl EvaluationOutcome {
    pub fn warnings(&self) -> &[Warning] {
        match self {
            EvaluationOutcome::Success { warnings, .. } => warnings,
            EvaluationOutcome::Failure(failure) => &failure.warnings,
        }
    }
}

impl From<RawEvaluationResponse> for EvaluationOutcome {
    fn from(raw: RawEvaluationResponse) -> Self {
        match raw.error {
            Some(message) => {
                let position = extract_error_position(&message);
                let mut failure =
                    EvaluationFailure::new(FailureKind::Evaluation, message).with_position(position);
                failure.warnings = raw.warnings;
                EvaluationOutcome::Failure(failure)
            }
            None => EvaluationOutcome::Success {
                value: raw.result.unwrap_or(Value::Null),
                warnings: raw.warnings,
            },
        }
    }
}

/// Response of the version endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionResponse {
    #[serde(default, rename = "feelEngineVersion")]
    pub feel_engine_version: Option<String>,
}
