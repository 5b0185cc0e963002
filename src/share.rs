//! Share-state codec.
//!
//! An example is shared as a link: the expression and the context text are
//! Base64-encoded into the `expression` and `context` query parameters next to
//! an `expression-type` marker. The page URL is never read from a global; it is
//! reached through an injected [`Location`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;
use url::Url;

use crate::error::{Error, PlaygroundResult};

pub const EXPRESSION_PARAM: &str = "expression";
pub const CONTEXT_PARAM: &str = "context";
pub const EXPRESSION_TYPE_PARAM: &str = "expression-type";

/// Only variant so far. Reserved for unary-tests links.
pub const EXPRESSION_TYPE: &str = "expression";

const SHARE_PARAMS: [&str; 3] = [EXPRESSION_PARAM, CONTEXT_PARAM, EXPRESSION_TYPE_PARAM];

/// Texts decoded from a share link. Absent parameters stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareState {
    pub expression: Option<String>,
    pub context: Option<String>,
}

impl ShareState {
    pub fn is_empty(&self) -> bool {
        self.expression.is_none() && self.context.is_none()
    }
}

/// Access to the URL of the page hosting a session.
///
/// `current` returns `None` outside a browser-like environment; callers then
/// fall back to their neutral state instead of failing.
pub trait Location: Send {
    fn current(&self) -> Option<Url>;
    fn replace(&mut self, url: Url);
}

/// A [`Location`] backed by a plain value, for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLocation {
    url: Option<Url>,
}

impl StaticLocation {
    pub fn new(url: Url) -> Self {
        Self { url: Some(url) }
    }

    /// No page URL at all, as during server-side rendering.
    pub fn detached() -> Self {
        Self { url: None }
    }

    pub fn parse(url: &str) -> PlaygroundResult<Self> {
        Ok(Self::new(Url::parse(url)?))
    }
}

impl Location for StaticLocation {
    fn current(&self) -> Option<Url> {
        self.url.clone()
    }

    fn replace(&mut self, url: Url) {
        self.url = Some(url);
    }
}

pub fn encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn decode_text(encoded: &str) -> PlaygroundResult<String> {
    // Links pasted through form-decoding tools turn `+` into a space.
    let bytes = STANDARD.decode(encoded.trim().replace(' ', "+"))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::ShareState(format!("shared text is not UTF-8: {}", e)))
}

/// Builds the share link for `expression` and `context` on top of `current`.
///
/// The path and any unrelated query parameters of `current` are kept; earlier
/// share parameters are replaced. An empty context is left out.
pub fn encode_share_url(current: &Url, expression: &str, context: Option<&str>) -> Url {
    let preserved: Vec<(String, String)> = current
        .query_pairs()
        .filter(|(key, _)| !SHARE_PARAMS.iter().any(|param| key == param))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = current.clone();
    url.set_fragment(None);
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(preserved);
        pairs.append_pair(EXPRESSION_PARAM, &encode_text(expression));
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            pairs.append_pair(CONTEXT_PARAM, &encode_text(context));
        }
        pairs.append_pair(EXPRESSION_TYPE_PARAM, EXPRESSION_TYPE);
    }
    url
}

/// Reads the shared texts back from a link.
pub fn decode_share_state(url: &Url) -> PlaygroundResult<ShareState> {
    let mut state = ShareState::default();
    for (key, value) in url.query_pairs() {
        match &*key {
            EXPRESSION_PARAM => state.expression = Some(decode_text(&value)?),
            CONTEXT_PARAM => state.context = Some(decode_text(&value)?),
            EXPRESSION_TYPE_PARAM if value != EXPRESSION_TYPE => {
                debug!("Unknown expression type in share link: {}", value);
            }
            _ => {}
        }
    }
    Ok(state)
}

/// Decodes the share state of the hosting page, if there is one.
pub fn decode_from_location(location: &dyn Location) -> PlaygroundResult<ShareState> {
    match location.current() {
        Some(url) => decode_share_state(&url),
        None => {
            debug!("No page URL available, skipping share state");
            Ok(ShareState::default())
        }
    }
}
