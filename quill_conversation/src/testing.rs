//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream;

use quill_core::{
    Candidate, Content, CountTokensRequest, CountTokensResponse, EmbedRequest, EmbedResponse,
    Error, FunctionCall, GenerateRequest, GenerateResponse, ModelProvider, Part, ResponseStream,
    Result, Role,
};

use crate::next_speaker::{NextSpeakerCheck, NextSpeakerVerdict, Speaker};

/// One scripted provider reaction, consumed in order.
pub enum Reply {
    /// A single text reply (one fragment when streamed).
    Text(String),
    /// An explicit fragment sequence for streaming tests.
    Fragments(Vec<GenerateResponse>),
    /// Fail the request with an overload signal.
    Overload,
}

/// Stand-in transport with a programmable script.
///
/// Substitution is structural: tests hand the session an
/// `Arc<ScriptedProvider>` instead of patching any ambient state.
#[derive(Default)]
pub struct ScriptedProvider {
    pub generate_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    replies: Mutex<VecDeque<Reply>>,
    token_counts: Mutex<VecDeque<u64>>,
    pub seen_count_models: Mutex<Vec<String>>,
    pub seen_generate_models: Mutex<Vec<String>>,
    #[allow(clippy::type_complexity)]
    count_hook: Mutex<Option<Box<dyn Fn(usize) + Send + Sync>>>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn with_replies(self, texts: Vec<String>) -> Self {
        {
            let mut replies = self.replies.lock().unwrap();
            replies.extend(texts.into_iter().map(Reply::Text));
        }
        self
    }

    #[must_use]
    pub fn with_reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    #[must_use]
    pub fn with_token_counts(self, counts: Vec<u64>) -> Self {
        self.token_counts.lock().unwrap().extend(counts);
        self
    }

    /// Run `hook` on every `count_tokens` call (0-based call index).
    /// Used to change configuration between the two counts of one
    /// compression pass.
    #[must_use]
    pub fn with_count_hook(self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        *self.count_hook.lock().unwrap() = Some(Box::new(hook));
        self
    }

    fn next_reply(&self) -> Result<Reply> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::provider("no scripted reply left", None))
    }
}

/// A streaming fragment carrying only text.
#[must_use]
pub fn text_fragment(text: &str) -> GenerateResponse {
    GenerateResponse {
        candidates: vec![Candidate {
            content: Some(Content::model_text(text)),
            finish_reason: None,
        }],
        usage_metadata: None,
    }
}

/// A streaming fragment carrying one tool-call request.
#[must_use]
pub fn tool_call_fragment(name: &str, args: serde_json::Value) -> GenerateResponse {
    GenerateResponse {
        candidates: vec![Candidate {
            content: Some(Content::new(
                Role::Model,
                vec![Part::from_function_call(FunctionCall {
                    id: None,
                    name: name.to_string(),
                    args,
                })],
            )),
            finish_reason: None,
        }],
        usage_metadata: None,
    }
}

#[async_trait::async_trait]
impl ModelProvider for ScriptedProvider {
    async fn generate_content(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_generate_models.lock().unwrap().push(request.model);
        match self.next_reply()? {
            Reply::Text(text) => Ok(text_fragment(&text)),
            Reply::Fragments(fragments) => Ok(fragments
                .into_iter()
                .next()
                .unwrap_or_default()),
            Reply::Overload => Err(Error::provider("RESOURCE_EXHAUSTED: quota", Some(429))),
        }
    }

    async fn generate_content_stream(&self, request: GenerateRequest) -> Result<ResponseStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_generate_models.lock().unwrap().push(request.model);
        let fragments = match self.next_reply()? {
            Reply::Text(text) => vec![text_fragment(&text)],
            Reply::Fragments(fragments) => fragments,
            Reply::Overload => {
                return Err(Error::provider("RESOURCE_EXHAUSTED: quota", Some(429)));
            }
        };
        let items: Vec<Result<GenerateResponse>> = fragments.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }

    async fn count_tokens(&self, request: CountTokensRequest) -> Result<CountTokensResponse> {
        let index = self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_count_models.lock().unwrap().push(request.model);
        if let Some(hook) = self.count_hook.lock().unwrap().as_ref() {
            hook(index);
        }
        let total_tokens = self
            .token_counts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(10);
        Ok(CountTokensResponse { total_tokens })
    }

    async fn embed_content(&self, _request: EmbedRequest) -> Result<EmbedResponse> {
        Err(Error::provider("embedding not scripted", None))
    }
}

/// Stand-in next-speaker oracle with a fixed verdict script.
pub struct ScriptedOracle {
    pub calls: AtomicUsize,
    sequence: Mutex<VecDeque<Speaker>>,
    default: Speaker,
    #[allow(clippy::type_complexity)]
    check_hook: Mutex<Option<Box<dyn Fn(usize) + Send + Sync>>>,
}

impl ScriptedOracle {
    #[must_use]
    pub fn answering(default: Speaker) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            sequence: Mutex::new(VecDeque::new()),
            default,
            check_hook: Mutex::new(None),
        }
    }

    /// Verdicts consumed in order before falling back to the default.
    #[must_use]
    pub fn with_sequence(self, speakers: Vec<Speaker>) -> Self {
        self.sequence.lock().unwrap().extend(speakers);
        self
    }

    /// Run `hook` on every check (0-based call index).
    #[must_use]
    pub fn with_check_hook(self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        *self.check_hook.lock().unwrap() = Some(Box::new(hook));
        self
    }
}

#[async_trait::async_trait]
impl NextSpeakerCheck for ScriptedOracle {
    async fn check(&self, _history: &[Content]) -> Result<Option<NextSpeakerVerdict>> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.check_hook.lock().unwrap().as_ref() {
            hook(index);
        }
        let speaker = self
            .sequence
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);
        Ok(Some(NextSpeakerVerdict {
            next_speaker: speaker,
            reasoning: "scripted".to_string(),
        }))
    }
}
