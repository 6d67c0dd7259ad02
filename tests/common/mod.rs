//! Common test utilities.
//!
//! Provides a scriptable mock provider, an in-memory output store, and
//! helpers for collecting sink events.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;

use agent_mux::{
    EngineError, OutputStore, PromptStream, ProviderClient, ProviderEvent, ProviderHandle,
    ProviderStreamControl, Result, SessionEvent, SessionEventPayload, StreamOptions,
};

/// Initialize test logging once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Mock provider
// ============================================================================

/// What a mock stream does once constructed.
#[derive(Clone)]
pub enum MockBehavior {
    /// Answer every prompt with one echoed text delta and a completed turn.
    Echo,
    /// Echo `turns` prompts, then end the stream the way a provider hangup would.
    EchoThenClose {
        /// Prompts to answer before closing.
        turns: u32,
    },
    /// Consume one prompt, play the scripted events, then hold the stream open.
    ScriptThenHold {
        /// Events to yield after the first prompt.
        events: Vec<ProviderEvent>,
    },
    /// Consume one prompt, play the scripted events, then yield a stream error.
    ScriptThenError {
        /// Events to yield before the error.
        events: Vec<ProviderEvent>,
    },
    /// Refuse to construct the stream.
    FailStart,
    /// Construct successfully, then end the event stream at once without
    /// consuming any prompt, the way a provider hangup would.
    CloseImmediately,
}

/// Per-stream plan derived from the behavior once construction succeeds.
enum StreamPlan {
    Echo { turn_limit: Option<u32> },
    Script { events: Vec<ProviderEvent>, then_error: bool },
    Close,
}

/// Scriptable provider that records every interaction.
pub struct MockProvider {
    behavior: MockBehavior,
    fail_interrupt: bool,
    /// Number of stream starts attempted, failed constructions included.
    pub starts: Arc<AtomicUsize>,
    /// Number of interrupt calls across all stream controls.
    pub interrupts: Arc<AtomicUsize>,
    /// Prompts pulled from the prompt source, in arrival order.
    pub prompts: Arc<Mutex<Vec<String>>>,
    /// Options observed at each successful stream start.
    pub options_seen: Arc<Mutex<Vec<StreamOptions>>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Arc<Self> {
        Self::build(behavior, false)
    }

    /// Like [`MockProvider::new`] but every interrupt call fails.
    pub fn with_failing_interrupt(behavior: MockBehavior) -> Arc<Self> {
        Self::build(behavior, true)
    }

    fn build(behavior: MockBehavior, fail_interrupt: bool) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            fail_interrupt,
            starts: Arc::new(AtomicUsize::new(0)),
            interrupts: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
            options_seen: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn interrupt_count(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn recorded_options(&self) -> Vec<StreamOptions> {
        self.options_seen.lock().unwrap().clone()
    }

    pub fn recorded_resumes(&self) -> Vec<Option<String>> {
        self.options_seen
            .lock()
            .unwrap()
            .iter()
            .map(|options| options.resume.clone())
            .collect()
    }
}

impl ProviderClient for MockProvider {
    fn start_stream(
        &self,
        mut prompts: PromptStream,
        options: StreamOptions,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderHandle>> + Send + '_>> {
        let behavior = self.behavior.clone();
        let fail_interrupt = self.fail_interrupt;
        let starts = Arc::clone(&self.starts);
        let interrupts = Arc::clone(&self.interrupts);
        let prompt_log = Arc::clone(&self.prompts);
        let options_seen = Arc::clone(&self.options_seen);

        Box::pin(async move {
            let start_n = starts.fetch_add(1, Ordering::SeqCst) + 1;
            let plan = match behavior {
                MockBehavior::FailStart => {
                    return Err(EngineError::provider_stream("mock start failure"));
                }
                MockBehavior::Echo => StreamPlan::Echo { turn_limit: None },
                MockBehavior::EchoThenClose { turns } => StreamPlan::Echo {
                    turn_limit: Some(turns),
                },
                MockBehavior::ScriptThenHold { events } => StreamPlan::Script {
                    events,
                    then_error: false,
                },
                MockBehavior::ScriptThenError { events } => StreamPlan::Script {
                    events,
                    then_error: true,
                },
                MockBehavior::CloseImmediately => StreamPlan::Close,
            };

            options_seen.lock().unwrap().push(options);

            let events = Box::pin(async_stream::stream! {
                match plan {
                    StreamPlan::Echo { turn_limit } => {
                        yield Ok(ProviderEvent::SessionInit {
                            provider_session_id: format!("mock-session-{start_n}"),
                        });
                        let mut turn = 0u32;
                        while let Some(message) = prompts.next().await {
                            turn += 1;
                            prompt_log.lock().unwrap().push(message.content.clone());
                            yield Ok(ProviderEvent::TextDelta {
                                index: 0,
                                text: format!("echo: {}", message.content),
                            });
                            yield Ok(ProviderEvent::TurnComplete {
                                is_error: false,
                                num_turns: turn,
                            });
                            if turn_limit.is_some_and(|limit| turn >= limit) {
                                break;
                            }
                        }
                    }
                    StreamPlan::Script { events, then_error } => {
                        if let Some(message) = prompts.next().await {
                            prompt_log.lock().unwrap().push(message.content.clone());
                            for event in events {
                                yield Ok(event);
                            }
                            if then_error {
                                yield Err(EngineError::provider_stream("mock stream failure"));
                            } else {
                                futures::future::pending::<()>().await;
                            }
                        }
                    }
                    StreamPlan::Close => {}
                }
            });

            Ok(ProviderHandle {
                events,
                control: Arc::new(MockControl {
                    interrupts,
                    fail: fail_interrupt,
                }),
            })
        })
    }
}

/// Interrupt handle returned by every mock stream.
struct MockControl {
    interrupts: Arc<AtomicUsize>,
    fail: bool,
}

impl ProviderStreamControl for MockControl {
    fn interrupt(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let interrupts = Arc::clone(&self.interrupts);
        let fail = self.fail;
        Box::pin(async move {
            interrupts.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(EngineError::provider_stream("mock interrupt rejected"))
            } else {
                Ok(())
            }
        })
    }
}

// ============================================================================
// Mock output store
// ============================================================================

/// Output store that records every span in memory.
pub struct MockStore {
    fail: bool,
    /// Recorded `(scope, agent_id, content)` triples.
    pub saved: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            saved: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Like [`MockStore::new`] but every store call fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            saved: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn saved_spans(&self) -> Vec<(String, String, String)> {
        self.saved.lock().unwrap().clone()
    }
}

impl OutputStore for MockStore {
    fn store(
        &self,
        scope: &str,
        agent_id: &str,
        content: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let saved = Arc::clone(&self.saved);
        let fail = self.fail;
        let scope = scope.to_string();
        let agent_id = agent_id.to_string();
        let content = content.to_string();
        Box::pin(async move {
            if fail {
                return Err(EngineError::output_store("mock store rejected span"));
            }
            let mut saved = saved.lock().unwrap();
            saved.push((scope, agent_id, content));
            Ok(format!("artifact-{}", saved.len()))
        })
    }
}

// ============================================================================
// Event collection helpers
// ============================================================================

/// Receive the next sink event payload, panicking after a timeout.
pub async fn next_payload(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEventPayload {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a sink event")
        .expect("event channel closed")
        .payload
}

/// Drain every event currently buffered in the channel.
pub fn drain_payloads(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEventPayload> {
    let mut payloads = Vec::new();
    while let Ok(event) = rx.try_recv() {
        payloads.push(event.payload);
    }
    payloads
}

/// Poll until the condition holds, panicking after a timeout.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting until {what}");
}
