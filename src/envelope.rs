//! Mailing-address envelope driven by an evaluation session.
//!
//! The evaluated result becomes the addressee name; any failure resets the
//! envelope to its placeholder.

use std::sync::{Arc, Mutex};

use crate::{
    api_client::EvaluationService,
    error::PlaygroundResult,
    session::{DisplayState, EvaluationSession, SessionConfig},
    share::Location,
};

pub const DEFAULT_ADDRESS_NAME: &str = "< Fill in the name here >";

const ENVELOPE_WIDTH: usize = 48;

const SENDER: [&str; 5] = [
    "Camundonaut",
    "Camunda Services GmbH",
    "Zossener Str. 55",
    "10961 Berlin",
    "Germany",
];

const RECIPIENT_ADDRESS: [&str; 5] = [
    "Camunda Inc.",
    "INDUSTRY Denver",
    "3001 Brighton Blvd, Suite 450",
    "Denver, CO 80216",
    "USA",
];

pub struct EnvelopeAddress {
    session: EvaluationSession,
    address_name: Arc<Mutex<String>>,
}

impl EnvelopeAddress {
    pub fn new(
        config: SessionConfig,
        service: Arc<dyn EvaluationService>,
        location: Box<dyn Location>,
    ) -> PlaygroundResult<Self> {
        let address_name = Arc::new(Mutex::new(DEFAULT_ADDRESS_NAME.to_string()));

        let on_result = address_name.clone();
        let on_error = address_name.clone();
        let config = config
            .on_result(move |result| {
                if let Ok(mut name) = on_result.lock() {
                    *name = result.replace('"', "");
                }
            })
            .on_error(move |_| {
                if let Ok(mut name) = on_error.lock() {
                    *name = DEFAULT_ADDRESS_NAME.to_string();
                }
            });

        Ok(Self {
            session: EvaluationSession::new(config, service, location)?,
            address_name,
        })
    }

    pub fn session_mut(&mut self) -> &mut EvaluationSession {
        &mut self.session
    }

    pub async fn evaluate(&mut self) -> &DisplayState {
        self.session.evaluate().await
    }

    pub fn address_name(&self) -> String {
        self.address_name
            .lock()
            .map(|name| name.clone())
            .unwrap_or_else(|_| DEFAULT_ADDRESS_NAME.to_string())
    }

    pub fn render(&self) -> String {
        render_envelope(&self.address_name())
    }
}

/// Draws a text envelope addressed to `name`.
///
/// The sender block sits in the top-left corner next to the stamp; the
/// recipient block is centered with `name` on its first line.
pub fn render_envelope(name: &str) -> String {
    let inner = ENVELOPE_WIDTH - 2;
    let border = format!("+{}+", "-".repeat(inner));
    let blank = format!("|{}|", " ".repeat(inner));

    let mut lines = vec![border.clone()];
    for (i, sender) in SENDER.iter().enumerate() {
        let left = format!(" {}", sender);
        let stamp = if i == 0 { "[stamp] " } else { "" };
        let width = inner - left.chars().count();
        lines.push(format!("|{}{:>width$}|", left, stamp, width = width));
    }
    lines.push(blank.clone());

    let shown: String = name.chars().take(inner - 2).collect();
    lines.push(format!("|{:^width$}|", shown, width = inner));
    for line in RECIPIENT_ADDRESS {
        lines.push(format!("|{:^width$}|", line, width = inner));
    }
    lines.push(blank);
    lines.push(border);

    lines.join("\n")
}
