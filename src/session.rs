//! # Evaluation Session
//!
//! An [`EvaluationSession`] owns the editable expression, context and input
//! value texts of one playground, sends them to an [`EvaluationService`] on
//! demand and keeps the resulting display state.
//!
//! ## Lifecycle
//!
//! 1. [`EvaluationSession::new`] reads shared texts from the injected
//!    [`Location`], falling back to the configured defaults.
//! 2. Edits only replace text; nothing is validated until evaluation.
//! 3. [`EvaluationSession::evaluate`] shows the evaluating placeholder, parses
//!    the context locally, calls the service and displays the outcome.
//!
//! ## Request ordering
//!
//! Every evaluation gets a token from a monotonically increasing counter.
//! [`EvaluationSession::apply`] drops outcomes whose token is not the latest
//! issued one, so a slow early response never overwrites a newer result.

use std::{sync::Arc, time::Duration};

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    api_client::{EvaluationService, engine_version_or_unknown},
    editor::{Editor, Language},
    error::{Error, PlaygroundResult},
    models::{
        EvaluationFailure, EvaluationOutcome, EvaluationRequest, ExpressionRequest, FailureKind,
        Metadata, UnaryTestsRequest, Warning,
    },
    position::extract_context_error_position,
    share::{Location, decode_from_location, encode_share_url},
};

pub const IDLE_PLACEHOLDER: &str = "<click 'Evaluate' to see the result of the expression>";
pub const EVALUATING_PLACEHOLDER: &str = "<evaluating the expression...>";
pub const NO_WARNINGS: &str = "<none>";

pub type ResultCallback = Box<dyn FnMut(&str) + Send>;
pub type ErrorCallback = Box<dyn FnMut(&EvaluationFailure) + Send>;

/// Host-side configuration of a session.
pub struct SessionConfig {
    pub default_expression: String,
    /// Enables the context editor
    pub default_context: Option<String>,
    /// Enables the unary-tests variant
    pub default_input_value: Option<String>,
    pub metadata: Metadata,
    pub timeout: Duration,
    pub share_base_url: Option<String>,
    on_result: Option<ResultCallback>,
    on_error: Option<ErrorCallback>,
}

impl SessionConfig {
    pub fn new(default_expression: impl Into<String>) -> Self {
        Self {
            default_expression: default_expression.into(),
            default_context: None,
            default_input_value: None,
            metadata: Map::new(),
            timeout: Duration::from_secs(10),
            share_base_url: None,
            on_result: None,
            on_error: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.default_context = Some(context.into());
        self
    }

    pub fn with_input_value(mut self, input_value: impl Into<String>) -> Self {
        self.default_input_value = Some(input_value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_share_base_url(mut self, url: impl Into<String>) -> Self {
        self.share_base_url = Some(url.into());
        self
    }

    pub fn on_result(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_result = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnMut(&EvaluationFailure) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

/// What the result area shows. Exactly one of result text or error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPane {
    Idle,
    Evaluating,
    Value(String),
    Error(EvaluationFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub pane: ResultPane,
    pub warnings: Vec<Warning>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            pane: ResultPane::Idle,
            warnings: Vec::new(),
        }
    }
}

impl DisplayState {
    /// Result text, including placeholders. `None` while an error is shown.
    pub fn result(&self) -> Option<&str> {
        match &self.pane {
            ResultPane::Idle => Some(IDLE_PLACEHOLDER),
            ResultPane::Evaluating => Some(EVALUATING_PLACEHOLDER),
            ResultPane::Value(value) => Some(value),
            ResultPane::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&EvaluationFailure> {
        match &self.pane {
            ResultPane::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<String> {
        self.error().map(EvaluationFailure::title)
    }

    pub fn body(&self) -> &str {
        match &self.pane {
            ResultPane::Error(failure) => &failure.message,
            _ => self.result().unwrap_or_default(),
        }
    }

    /// One line per warning, or the empty-state literal.
    pub fn warning_lines(&self) -> Vec<String> {
        if self.warnings.is_empty() {
            vec![NO_WARNINGS.to_string()]
        } else {
            self.warnings.iter().map(Warning::to_string).collect()
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Result\n");
        if let Some(title) = self.title() {
            out.push_str(&title);
            out.push('\n');
        }
        out.push_str(self.body());
        out.push_str("\n\nWarnings\n");
        out.push_str(&self.warning_lines().join("\n"));
        out.push('\n');
        out
    }

    pub fn to_json(&self) -> Value {
        json!({
            "result": self.result(),
            "error": self.error().map(|failure| json!({
                "title": failure.title(),
                "kind": failure.kind,
                "message": failure.message,
                "line": failure.line,
                "position": failure.position,
            })),
            "warnings": self.warnings,
        })
    }
}

/// A request issued by [`EvaluationSession::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvaluation {
    pub token: u64,
    pub request: EvaluationRequest,
}

pub struct EvaluationSession {
    service: Arc<dyn EvaluationService>,
    location: Box<dyn Location>,
    expression: Editor,
    context: Editor,
    input_value: Editor,
    has_context: bool,
    unary_tests: bool,
    metadata: Metadata,
    timeout: Duration,
    share_base_url: Option<String>,
    on_result: Option<ResultCallback>,
    on_error: Option<ErrorCallback>,
    display: DisplayState,
    latest_token: u64,
}

impl EvaluationSession {
    /// Creates a session, preferring texts shared through the page URL.
    ///
    /// Fails when the configured default context is not valid JSON.
    pub fn new(
        config: SessionConfig,
        service: Arc<dyn EvaluationService>,
        location: Box<dyn Location>,
    ) -> PlaygroundResult<Self> {
        let shared = decode_from_location(location.as_ref()).unwrap_or_else(|e| {
            warn!("Ignoring malformed share link: {}", e);
            Default::default()
        });

        let has_context = config.default_context.is_some();
        let context_text = match (shared.context, config.default_context) {
            (Some(shared), Some(_)) => pretty_json(&shared).unwrap_or_else(|e| {
                warn!("Shared context is not valid JSON, keeping it as is: {}", e);
                shared
            }),
            (None, Some(default)) => pretty_json(&default)
                .map_err(|e| Error::InvalidDefaultContext(e.to_string()))?,
            (Some(_), None) => {
                debug!("Shared context ignored, no context is configured");
                String::new()
            }
            (None, None) => String::new(),
        };

        let expression = shared.expression.unwrap_or(config.default_expression);
        let unary_tests = config.default_input_value.is_some();
        let input_value = config.default_input_value.unwrap_or_default();

        Ok(Self {
            service,
            location,
            expression: Editor::new(Language::Feel, expression),
            context: Editor::new(Language::Json, context_text),
            input_value: Editor::new(Language::Json, input_value),
            has_context,
            unary_tests,
            metadata: config.metadata,
            timeout: config.timeout,
            share_base_url: config.share_base_url,
            on_result: config.on_result,
            on_error: config.on_error,
            display: DisplayState::default(),
            latest_token: 0,
        })
    }

    pub fn expression(&self) -> &str {
        self.expression.content()
    }

    pub fn context(&self) -> Option<&str> {
        self.has_context.then(|| self.context.content())
    }

    pub fn input_value(&self) -> Option<&str> {
        self.unary_tests.then(|| self.input_value.content())
    }

    pub fn is_unary_tests(&self) -> bool {
        self.unary_tests
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn edit_expression(&mut self, text: &str) {
        self.expression.set(text);
    }

    pub fn edit_context(&mut self, text: &str) {
        self.context.set(text);
    }

    pub fn edit_input_value(&mut self, text: &str) {
        self.input_value.set(text);
    }

    /// Editor of the expression region, for hosts feeding raw editor commits.
    pub fn expression_editor_mut(&mut self) -> &mut Editor {
        &mut self.expression
    }

    pub fn context_editor_mut(&mut self) -> Option<&mut Editor> {
        self.has_context.then_some(&mut self.context)
    }

    pub fn input_value_editor_mut(&mut self) -> Option<&mut Editor> {
        self.unary_tests.then_some(&mut self.input_value)
    }

    /// Starts an evaluation: shows the placeholder, clears warnings and builds
    /// the request.
    ///
    /// Returns `None` when the texts failed local parsing; the failure is
    /// already displayed and nothing must be sent.
    pub fn prepare(&mut self) -> Option<PendingEvaluation> {
        self.latest_token += 1;
        let token = self.latest_token;
        self.display = DisplayState {
            pane: ResultPane::Evaluating,
            warnings: Vec::new(),
        };

        match self.build_request() {
            Ok(request) => {
                debug!("Prepared evaluation {} of '{}'", token, request.expression());
                Some(PendingEvaluation { token, request })
            }
            Err(failure) => {
                self.fail(failure);
                None
            }
        }
    }

    fn build_request(&self) -> Result<EvaluationRequest, EvaluationFailure> {
        let context = self.parse_context()?;
        let expression = self.expression.content().to_string();
        let metadata = self.metadata.clone();

        if self.unary_tests {
            Ok(EvaluationRequest::UnaryTests(UnaryTestsRequest {
                expression,
                input_value: self.parse_input_value()?,
                context,
                metadata,
            }))
        } else {
            Ok(EvaluationRequest::Expression(ExpressionRequest {
                expression,
                context,
                metadata,
            }))
        }
    }

    fn parse_context(&self) -> Result<Map<String, Value>, EvaluationFailure> {
        let text = self.context.content();
        if !self.has_context || text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(context)) => Ok(context),
            Ok(_) => Err(local_failure(Error::ContextParse(
                "the context must be a JSON object".to_string(),
            ))),
            Err(e) => {
                let position = extract_context_error_position(&e);
                Err(local_failure(Error::ContextParse(e.to_string())).with_position(position))
            }
        }
    }

    fn parse_input_value(&self) -> Result<Value, EvaluationFailure> {
        let text = self.input_value.content();
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(text).map_err(|e| {
            let position = extract_context_error_position(&e);
            local_failure(Error::InputValueParse(e.to_string())).with_position(position)
        })
    }

    /// Displays the outcome of `token`, unless a newer evaluation was issued.
    ///
    /// Returns whether the outcome was applied.
    pub fn apply(&mut self, token: u64, outcome: PlaygroundResult<EvaluationOutcome>) -> bool {
        if token != self.latest_token {
            debug!(
                "Discarding stale response {} (latest is {})",
                token, self.latest_token
            );
            return false;
        }

        match outcome {
            Ok(EvaluationOutcome::Success { value, warnings }) => {
                let result = value.to_string();
                self.display = DisplayState {
                    pane: ResultPane::Value(result.clone()),
                    warnings,
                };
                if let Some(callback) = self.on_result.as_mut() {
                    callback(&result);
                }
            }
            Ok(EvaluationOutcome::Failure(failure)) => self.fail(failure),
            Err(e) => {
                warn!("Evaluation {} did not complete: {}", token, e);
                self.fail(EvaluationFailure::new(FailureKind::Transport, e.to_string()));
            }
        }
        true
    }

    fn fail(&mut self, failure: EvaluationFailure) {
        self.display = DisplayState {
            pane: ResultPane::Error(failure.clone()),
            warnings: failure.warnings.clone(),
        };
        if let Some(callback) = self.on_error.as_mut() {
            callback(&failure);
        }
    }

    /// Runs one full evaluate cycle and returns the resulting display.
    pub async fn evaluate(&mut self) -> &DisplayState {
        let Some(pending) = self.prepare() else {
            return &self.display;
        };

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.service.evaluate(&pending.request),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(self.timeout.as_millis())),
        };

        self.apply(pending.token, outcome);
        &self.display
    }

    /// Builds the share link for the current texts.
    ///
    /// The page URL is updated when there is one; otherwise the link is built
    /// on the configured share base URL.
    pub fn share_url(&mut self) -> PlaygroundResult<Url> {
        let current = self.location.current();
        let base = match (&current, &self.share_base_url) {
            (Some(url), _) => url.clone(),
            (None, Some(base)) => Url::parse(base)?,
            (None, None) => {
                return Err(Error::ShareState(
                    "no page URL to build a share link on".to_string(),
                ));
            }
        };

        let context = self.context().map(str::to_string);
        let url = encode_share_url(&base, self.expression(), context.as_deref());
        if current.is_some() {
            self.location.replace(url.clone());
        }
        info!("Share link created for '{}'", self.expression());
        Ok(url)
    }

    /// Engine version reported by the service, `?` when unknown.
    pub async fn engine_version(&self) -> String {
        engine_version_or_unknown(self.service.as_ref()).await
    }
}

fn local_failure(error: Error) -> EvaluationFailure {
    EvaluationFailure::new(FailureKind::LocalInput, error.to_string())
}

/// Stable 2-space indented rendering of a JSON text.
pub fn pretty_json(text: &str) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    serde_json::to_string_pretty(&value)
}
