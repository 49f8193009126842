//! Request Builders
//!
//! Turns a reflection request (what the user asked for, and which backend to
//! ask) into the outbound HTTP request handed to the transport.
//!
//! Validation happens here, before anything is sent: the backend must be
//! fully configured, then the primary text must be non-empty. Both failures
//! are pre-flight errors and never reach the network.

use std::fmt;

use serde_json::json;

use crate::error::ReflectionError;
use crate::stream::WireFormat;

/// OpenAI chat-completions endpoint
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Ollama chat endpoint on the default port
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434/api/chat";

/// Model used for the remote backend when none is configured
pub const DEFAULT_REMOTE_MODEL: &str = "gpt-4o";

/// Inserted between the original entries and the previous reflection
pub const FOLLOWUP_SEPARATOR: &str = "\n\n=== PREVIOUS REFLECTION AND NEW THOUGHTS ===\n\n";

/// System prompt for reflections and follow-ups
pub const DEFAULT_REFLECTION_PROMPT: &str = "\
Below are my journal entries and my reflections on them. Talk it through with \
me like an old friend would. Don't therapize me, don't break everything down \
under headings, and don't repeat my thoughts back to me.

Keep it casual. Help me make connections I don't see; comfort, validate and \
challenge me where it fits. Let the length match the weight of the entry: be \
brief for light ones and dig in for heavy ones. Write in a voice close to my \
own but with your own things to say.

Plain text only, no markdown. Use paragraphs to keep it readable.";

/// System prompt for questions; the entries follow as a second system message
pub const DEFAULT_QUESTION_PROMPT: &str = "\
Below are my journal entries and my reflections on them. That is everything \
you know about me. I'm going to ask a question; use what you know to answer \
it, talking it through with me like an old friend would. Don't therapize me \
and don't repeat my thoughts back to me under headings.

Keep it casual. Process everything, make connections I don't see, and use \
the relevant parts to answer the question.

Plain text only, no markdown.

My entries:";

/// Which backend to ask
#[derive(Clone, PartialEq, Eq)]
pub enum Backend {
    /// OpenAI-compatible chat completions over SSE
    Remote {
        /// Bearer credential
        api_key: String,
        /// Model identifier
        model: String,
    },
    /// Local Ollama server streaming JSON lines
    Local {
        /// Selected model, if the user picked one
        model: Option<String>,
    },
}

impl Backend {
    /// Wire format the backend answers in
    #[must_use]
    pub fn format(&self) -> WireFormat {
        match self {
            Self::Remote { .. } => WireFormat::Remote,
            Self::Local { .. } => WireFormat::Local,
        }
    }

    /// Configured model, if any
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Remote { model, .. } => Some(model),
            Self::Local { model } => model.as_deref(),
        }
    }

    fn validate(&self) -> Result<(), ReflectionError> {
        match self {
            Self::Remote { api_key, model } => {
                if api_key.trim().is_empty() {
                    return Err(ReflectionError::configuration(
                        "OpenAI API key is missing; set it before reflecting",
                    ));
                }
                if model.trim().is_empty() {
                    return Err(ReflectionError::configuration(
                        "No remote model selected",
                    ));
                }
            }
            Self::Local { model } => {
                if model.as_deref().map_or(true, |m| m.trim().is_empty()) {
                    return Err(ReflectionError::configuration(
                        "No Ollama model selected",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { model, .. } => f
                .debug_struct("Remote")
                .field("api_key", &"<redacted>")
                .field("model", model)
                .finish(),
            Self::Local { model } => f.debug_struct("Local").field("model", model).finish(),
        }
    }
}

/// What the user asked for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReflectionKind {
    /// Reflect on a range of entries
    Reflection {
        /// The entries, concatenated
        entry_text: String,
    },
    /// Continue from an earlier reflection plus new thoughts
    Followup {
        /// The entries the earlier reflection was about
        original_entries: String,
        /// The earlier reflection and anything written after it
        reflection: String,
    },
    /// Answer a question using the entries as context
    Question {
        /// Every entry the model may draw on
        entries: String,
        /// The question
        question: String,
    },
}

impl ReflectionKind {
    /// Short name for logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reflection { .. } => "reflection",
            Self::Followup { .. } => "followup",
            Self::Question { .. } => "question",
        }
    }

    fn validate(&self) -> Result<(), ReflectionError> {
        let (primary, message) = match self {
            Self::Reflection { entry_text } => (entry_text, "Cannot reflect on an empty entry"),
            Self::Followup {
                original_entries, ..
            } => (original_entries, "No original entries found for the follow-up"),
            Self::Question { question, .. } => (question, "Please provide a question"),
        };

        if primary.trim().is_empty() {
            Err(ReflectionError::empty_input(message))
        } else {
            Ok(())
        }
    }
}

/// A backend plus what to ask it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReflectionRequest {
    /// Target backend
    pub backend: Backend,
    /// Request contents
    pub kind: ReflectionKind,
}

impl ReflectionRequest {
    /// Reflect on `entry_text`
    pub fn reflection(backend: Backend, entry_text: impl Into<String>) -> Self {
        Self {
            backend,
            kind: ReflectionKind::Reflection {
                entry_text: entry_text.into(),
            },
        }
    }

    /// Follow up on an earlier reflection
    pub fn followup(
        backend: Backend,
        original_entries: impl Into<String>,
        reflection: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            kind: ReflectionKind::Followup {
                original_entries: original_entries.into(),
                reflection: reflection.into(),
            },
        }
    }

    /// Ask a question about `entries`
    pub fn question(
        backend: Backend,
        entries: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            kind: ReflectionKind::Question {
                entries: entries.into(),
                question: question.into(),
            },
        }
    }

    /// Check the request without building it
    ///
    /// # Errors
    ///
    /// `Configuration` when the backend lacks a credential or model, then
    /// `EmptyInput` when the primary text is blank.
    pub fn validate(&self) -> Result<(), ReflectionError> {
        self.backend.validate()?;
        self.kind.validate()
    }
}

/// A fully built request, ready for the transport
#[derive(Clone, PartialEq)]
pub struct OutboundRequest {
    /// URL to POST to
    pub endpoint: String,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: serde_json::Value,
    /// How the response body is framed
    pub format: WireFormat,
}

impl OutboundRequest {
    /// Value of a header, case-insensitive
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("OutboundRequest")
            .field("endpoint", &self.endpoint)
            .field("headers", &header_names)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Builds [`OutboundRequest`]s from [`ReflectionRequest`]s
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    remote_endpoint: String,
    local_endpoint: String,
    reflection_prompt: String,
    question_prompt: String,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    /// Builder with the default endpoints and prompts
    #[must_use]
    pub fn new() -> Self {
        Self {
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            reflection_prompt: DEFAULT_REFLECTION_PROMPT.to_string(),
            question_prompt: DEFAULT_QUESTION_PROMPT.to_string(),
        }
    }

    /// Set the chat-completions endpoint
    #[must_use]
    pub fn with_remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.remote_endpoint = endpoint.into();
        self
    }

    /// Set the Ollama chat endpoint
    #[must_use]
    pub fn with_local_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.local_endpoint = endpoint.into();
        self
    }

    /// Set the system prompt for reflections and follow-ups
    #[must_use]
    pub fn with_reflection_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.reflection_prompt = prompt.into();
        self
    }

    /// Set the system prompt for questions
    #[must_use]
    pub fn with_question_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.question_prompt = prompt.into();
        self
    }

    /// Validate and build the outbound request
    ///
    /// # Errors
    ///
    /// Returns the pre-flight error from [`ReflectionRequest::validate`].
    pub fn build(&self, request: &ReflectionRequest) -> Result<OutboundRequest, ReflectionError> {
        request.validate()?;

        let messages = match &request.kind {
            ReflectionKind::Reflection { entry_text } => vec![
                json!({ "role": "system", "content": self.reflection_prompt }),
                json!({ "role": "user", "content": entry_text }),
            ],
            ReflectionKind::Followup {
                original_entries,
                reflection,
            } => vec![
                json!({ "role": "system", "content": self.reflection_prompt }),
                json!({
                    "role": "user",
                    "content": format!("{original_entries}{FOLLOWUP_SEPARATOR}{reflection}"),
                }),
            ],
            ReflectionKind::Question { entries, question } => vec![
                json!({ "role": "system", "content": self.question_prompt }),
                json!({ "role": "system", "content": entries }),
                json!({ "role": "user", "content": question }),
            ],
        };

        let format = request.backend.format();
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), format.content_type().to_string()),
        ];

        let (endpoint, model) = match &request.backend {
            Backend::Remote { api_key, model } => {
                headers.push(("Authorization".to_string(), format!("Bearer {api_key}")));
                (self.remote_endpoint.clone(), model.clone())
            }
            Backend::Local { model } => (
                self.local_endpoint.clone(),
                model.clone().unwrap_or_default(),
            ),
        };

        Ok(OutboundRequest {
            endpoint,
            headers,
            body: json!({
                "model": model,
                "messages": messages,
                "stream": true,
            }),
            format,
        })
    }
}
