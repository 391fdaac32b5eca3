//! State of one extraction attempt, from submission to settlement.
//!
//! All transitions are plain methods on [`GenerationSession`]; the only side
//! effect (issuing the request) belongs to the caller, which receives a
//! [`GenerationRequest`] from [`GenerationSession::submit`]. Every response
//! handler takes the request's [`RequestToken`] and is ignored unless that
//! token is still the current one, so late answers from a superseded or
//! reset request never touch the state.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use extract::{Category, examples, get_schema, parse_partial};

use crate::notice::ErrorNotice;

pub const FALLBACK_ERROR: &str = "An unexpected error occurred";

/// Shown when the stream closes cleanly without producing anything
pub const EMPTY_RESULT_ERROR: &str =
    "The free data limit has been exceeded. Please try again in 5 minutes.";

/// Failure reported by the transport while a request was open
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Structured error carrying a message field
    #[error("{0}")]
    HasMessage(String),
    /// Anything else; only its string form is known
    #[error("{0}")]
    Opaque(String),
}

/// Normalize any stream error to the string shown to the user
pub fn display_message(error: &StreamError) -> String {
    let text = match error {
        StreamError::HasMessage(message) | StreamError::Opaque(message) => message.trim(),
    };
    if text.is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// Body of the structured-generation call plus the token tagging it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(skip)]
    pub token: RequestToken,
    pub prompt: String,
    pub schema_type: Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
    Success,
    Empty,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Empty,
    Error,
}

#[derive(Debug)]
pub struct GenerationSession {
    category: Category,
    object: Option<Value>,
    loading: bool,
    error: Option<StreamError>,
    display_error: Option<String>,
    has_attempted: bool,
    outcome: Option<Outcome>,
    /// Bumped on every submission and reset
    request_counter: u64,
    buffer: String,
    /// Bumped whenever `object` changes
    revision: u64,
}

impl GenerationSession {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            object: None,
            loading: false,
            error: None,
            display_error: None,
            has_attempted: false,
            outcome: None,
            request_counter: 0,
            buffer: String::new(),
            revision: 0,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Object as it currently stands, possibly partial
    pub fn object(&self) -> Option<&Value> {
        self.object.as_ref()
    }

    /// The object only once generation settled without an error
    pub fn usable_object(&self) -> Option<&Value> {
        if self.loading || self.display_error.is_some() {
            return None;
        }
        self.object.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    pub fn display_error(&self) -> Option<&str> {
        self.display_error.as_deref()
    }

    pub fn has_attempted(&self) -> bool {
        self.has_attempted
    }

    pub fn object_revision(&self) -> u64 {
        self.revision
    }

    pub fn error_notice(&self) -> Option<ErrorNotice> {
        self.display_error.as_deref().map(ErrorNotice::from_message)
    }

    pub fn phase(&self) -> Phase {
        if self.loading {
            return Phase::Generating;
        }
        match self.outcome {
            _ if !self.has_attempted => Phase::Idle,
            Some(Outcome::Success) => Phase::Success,
            Some(Outcome::Empty) => Phase::Empty,
            Some(Outcome::Error) => Phase::Error,
            None => Phase::Idle,
        }
    }

    fn is_current(&self, token: RequestToken) -> bool {
        self.loading && token.0 == self.request_counter
    }

    fn set_object(&mut self, object: Option<Value>) {
        if self.object != object {
            self.object = object;
            self.revision += 1;
        }
    }

    /// Start a new attempt. Blank input, or input while a request is still
    /// open, is rejected without touching any state.
    pub fn submit(&mut self, text: &str) -> Option<GenerationRequest> {
        if text.trim().is_empty() || self.loading {
            return None;
        }

        self.request_counter += 1;
        self.has_attempted = true;
        self.loading = true;
        self.error = None;
        self.display_error = None;
        self.outcome = None;
        self.buffer.clear();
        self.set_object(None);

        debug!(category = %self.category, request = self.request_counter, "Generation submitted");

        Some(GenerationRequest {
            token: RequestToken(self.request_counter),
            prompt: text.to_string(),
            schema_type: self.category,
        })
    }

    /// Feed one text delta. Returns false when the token is stale.
    pub fn apply_chunk(&mut self, token: RequestToken, text: &str) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.buffer.push_str(text);

        // Only adopt increments whose present fields are already well-typed
        let Some(candidate) = parse_partial(&self.buffer) else {
            return true;
        };
        if candidate.is_object() && get_schema(self.category).validate_partial(&candidate).is_ok() {
            self.set_object(Some(candidate));
        }
        true
    }

    /// The stream closed without a transport error
    pub fn finish(&mut self, token: RequestToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.loading = false;

        let Some(value) = parse_partial(&self.buffer) else {
            self.outcome = Some(Outcome::Empty);
            self.display_error = Some(EMPTY_RESULT_ERROR.to_string());
            return true;
        };

        match get_schema(self.category).validate(&value) {
            Ok(()) => {
                self.set_object(Some(value));
                self.outcome = Some(Outcome::Success);
            }
            Err(e) => {
                self.settle_error(StreamError::HasMessage(e.to_string()));
            }
        }
        true
    }

    /// The transport reported an error; any partial object is kept
    pub fn fail(&mut self, token: RequestToken, error: StreamError) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.loading = false;
        self.settle_error(error);
        true
    }

    fn settle_error(&mut self, error: StreamError) {
        self.display_error = Some(display_message(&error));
        self.error = Some(error);
        self.outcome = Some(Outcome::Error);
    }

    /// Back to an idle-equivalent state. An open request is not cancelled,
    /// but its token stops being current.
    pub fn reset(&mut self) {
        self.request_counter += 1;
        self.has_attempted = false;
        self.loading = false;
        self.error = None;
        self.display_error = None;
        self.outcome = None;
        self.buffer.clear();
        self.set_object(None);
    }

    pub fn set_category(&mut self, category: Category) {
        if self.category != category {
            self.category = category;
            self.reset();
        }
    }

    /// Reset and hand back a sample prompt for the current category
    pub fn load_example(&mut self) -> &'static str {
        self.reset();
        examples::random_example(self.category)
    }
}
