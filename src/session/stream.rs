//! Stream consumption task
//!
//! One task runs per stream generation. It builds the prompt source that
//! drains the session's queue, opens the provider stream, classifies every
//! provider event into sink events, and runs a guaranteed cleanup tail
//! however the loop exits. Every event is gated on the abort flag and the
//! generation token so a stale loop can never emit on behalf of a newer
//! stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::StreamExt;

use crate::error::Result;
use crate::markers::scan_markers;
use crate::provider::PromptStream;
use crate::types::events::SessionEventPayload;
use crate::types::identifiers::{ToolName, ToolUseId};
use crate::types::messages::{ContentBlock, ContentValue};
use crate::types::provider::{ProviderEvent, StreamBlock};

use super::signals::StreamEpoch;
use super::{Session, SessionPhase};

/// How the consumption loop ended
enum StreamExit {
    /// Provider closed the stream
    Natural,
    /// Abort or staleness observed; a stopped notification was emitted
    Stopped,
}

/// Per-stream correlation state, structurally fresh for every generation
#[derive(Default)]
struct StreamState {
    /// Stream index of an open block to the tool occupying it
    index_to_tool: HashMap<u64, ToolUseId>,
    /// Every tool announced this stream, streamed or finalized
    tool_names: HashMap<ToolUseId, ToolName>,
    /// Accumulating partial JSON input per streaming tool
    input_buffers: HashMap<ToolUseId, String>,
    /// Whether text deltas streamed this turn (suppresses finalized text)
    saw_text_delta: bool,
    /// Whether thinking deltas streamed this turn
    saw_thinking_delta: bool,
}

/// Entry point for one stream generation
pub(super) async fn run_stream(session: Arc<Session>, epoch: Arc<StreamEpoch>) {
    let conversation = session.conversation_id().as_str().to_string();
    let outcome = drive_stream(&session, &epoch, &conversation).await;

    match &outcome {
        Ok(StreamExit::Natural) => {
            log::debug!(
                "[{conversation}] stream generation {} ended",
                epoch.generation
            );
        }
        Ok(StreamExit::Stopped) => {
            log::debug!(
                "[{conversation}] stream generation {} stopped",
                epoch.generation
            );
        }
        Err(err) => {
            log::warn!(
                "[{conversation}] stream generation {} failed: {err}",
                epoch.generation
            );
            session.emit(SessionEventPayload::MessageError {
                error: err.to_string(),
            });
        }
    }

    // Cleanup tail. Phase and flags belong to this generation only while it
    // is still current; a newer generation owns them otherwise.
    let still_current = {
        let mut phase = session.phase.lock();
        if session.generation.load(Ordering::SeqCst) == epoch.generation {
            *phase = SessionPhase::Idle;
            session.is_processing.store(false, Ordering::SeqCst);
            session.is_responding.store(false, Ordering::SeqCst);
            session.interrupting.store(false, Ordering::SeqCst);
            *session.control.lock() = None;
            true
        } else {
            false
        }
    };

    // Settle readiness so no queue_message waiter hangs, then open the
    // termination latch. Order matters: dispose and reset wait on
    // termination and must observe the stopped notification first.
    epoch.ready.mark_failed();
    epoch.terminated.open();

    if still_current {
        if outcome.is_err() {
            // The stream died with messages possibly still queued; resolve
            // them so enqueue callers do not hang on a stream that will
            // never consume them.
            let cleared = session.queue.clear();
            if cleared > 0 {
                log::debug!(
                    "[{conversation}] resolved {cleared} queued message(s) after stream failure"
                );
            }
        } else if matches!(outcome, Ok(StreamExit::Natural))
            && !epoch.abort.is_open()
            && !session.is_disposed()
            && !session.queue.is_empty()
        {
            // The provider closed the stream with work still pending; a
            // fresh generation drains it.
            log::info!(
                "[{conversation}] restarting stream: {} message(s) still queued",
                session.queue.len()
            );
            session.ensure_streaming();
        }
    }
}

/// Construct the provider stream and consume it to completion
async fn drive_stream(
    session: &Arc<Session>,
    epoch: &Arc<StreamEpoch>,
    conversation: &str,
) -> Result<StreamExit> {
    let options = session.next_stream_options();
    if options.resume.is_some() {
        log::debug!("[{conversation}] requesting provider resume");
    }
    let prompts = prompt_source(Arc::clone(session), Arc::clone(epoch));

    let handle = match session.provider.start_stream(prompts, options).await {
        Ok(handle) => handle,
        Err(err) => {
            epoch.ready.mark_failed();
            return Err(err);
        }
    };

    // Store the interrupt handle and promote to Active, but only while this
    // generation is current. Generation bumps happen under the phase lock,
    // so the check cannot race a restart.
    {
        let mut phase = session.phase.lock();
        if session.generation.load(Ordering::SeqCst) == epoch.generation {
            *session.control.lock() = Some(Arc::clone(&handle.control));
            if *phase == SessionPhase::Starting {
                *phase = SessionPhase::Active;
            }
        }
    }
    epoch.ready.mark_ready();

    let mut events = handle.events;
    let mut state = StreamState::default();

    loop {
        let next = tokio::select! {
            item = events.next() => item,
            () = epoch.abort.wait() => {
                session.emit(SessionEventPayload::MessageStopped);
                return Ok(StreamExit::Stopped);
            }
        };
        let Some(item) = next else {
            return Ok(StreamExit::Natural);
        };
        let event = item?;
        // Check the flags between receiving and processing: an abort or a
        // restart that lands mid-iteration silences this loop before it can
        // emit for the wrong stream.
        if epoch.abort.is_open()
            || session.generation.load(Ordering::SeqCst) != epoch.generation
        {
            session.emit(SessionEventPayload::MessageStopped);
            return Ok(StreamExit::Stopped);
        }
        session.touch();
        classify_event(session, &mut state, conversation, event).await;
    }
}

/// Pull-based prompt source draining the session queue
///
/// Lives as long as the stream; exits when the generation goes stale or the
/// abort latch opens.
fn prompt_source(session: Arc<Session>, epoch: Arc<StreamEpoch>) -> PromptStream {
    Box::pin(async_stream::stream! {
        loop {
            if epoch.abort.is_open()
                || session.generation.load(Ordering::SeqCst) != epoch.generation
            {
                break;
            }
            if let Some(queued) = session.queue.dequeue_next() {
                log::debug!(
                    "[{}] forwarding message {}",
                    session.conversation_id().as_str(),
                    queued.id
                );
                session.touch();
                yield queued.message;
                continue;
            }
            tokio::select! {
                () = session.queue.wait_ready() => {}
                () = epoch.abort.wait() => break,
            }
        }
    })
}

/// Classify one provider event into sink events and state updates
async fn classify_event(
    session: &Arc<Session>,
    state: &mut StreamState,
    conversation: &str,
    event: ProviderEvent,
) {
    // Everything except stream init and the terminal result counts as the
    // provider actively producing output.
    match &event {
        ProviderEvent::SessionInit { .. } | ProviderEvent::TurnComplete { .. } => {}
        _ => session.is_responding.store(true, Ordering::SeqCst),
    }

    match event {
        ProviderEvent::SessionInit {
            provider_session_id,
        } => {
            log::debug!("[{conversation}] provider session {provider_session_id}");
            *session.provider_session_id.lock() = Some(provider_session_id.clone());
            session.emit(SessionEventPayload::SessionUpdated {
                provider_session_id,
            });
        }

        ProviderEvent::BlockStart { index, block } => match block {
            StreamBlock::Text => {}
            StreamBlock::Thinking => {
                session.emit(SessionEventPayload::ThinkingStart {
                    stream_index: Some(index),
                });
            }
            StreamBlock::ToolUse { id, name, input } => {
                state.index_to_tool.insert(index, id.clone());
                state.tool_names.insert(id.clone(), name.clone());
                state.input_buffers.insert(id.clone(), String::new());
                session.emit(SessionEventPayload::ToolUseStart {
                    tool_use_id: id,
                    name,
                    input,
                    stream_index: Some(index),
                });
            }
        },

        ProviderEvent::TextDelta { text, .. } => {
            state.saw_text_delta = true;
            session.emit(SessionEventPayload::TextDelta { text: text.clone() });
            feed_transcript(session, &text).await;
        }

        ProviderEvent::ThinkingDelta { thinking, .. } => {
            state.saw_thinking_delta = true;
            session.emit(SessionEventPayload::ThinkingDelta { thinking });
        }

        ProviderEvent::InputJsonDelta {
            index,
            partial_json,
        } => {
            if let Some(id) = state.index_to_tool.get(&index) {
                if let Some(buffer) = state.input_buffers.get_mut(id) {
                    buffer.push_str(&partial_json);
                }
                session.emit(SessionEventPayload::ToolInputDelta {
                    tool_use_id: id.clone(),
                    partial_json,
                });
            } else {
                log::debug!("[{conversation}] input delta for unknown stream index {index}");
            }
        }

        ProviderEvent::BlockStop { index } => {
            let tool_use_id = state.index_to_tool.remove(&index);
            let input = tool_use_id.as_ref().and_then(|id| {
                let buffer = state.input_buffers.remove(id)?;
                if buffer.is_empty() {
                    return None;
                }
                match serde_json::from_str(&buffer) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        // Malformed partial input is dropped, never
                        // escalated; the tool simply gets no structured
                        // input.
                        log::debug!(
                            "[{conversation}] discarding unparseable input for tool {}: {err}",
                            id.as_str()
                        );
                        None
                    }
                }
            });
            session.emit(SessionEventPayload::ContentBlockStop {
                stream_index: index,
                tool_use_id,
                input,
            });
        }

        ProviderEvent::AssistantMessage { content } => {
            for block in content {
                match block {
                    ContentBlock::Text { text } => {
                        // Finalized text duplicates what already streamed;
                        // emit it only when no text deltas were seen.
                        if !state.saw_text_delta {
                            session.emit(SessionEventPayload::TextDelta { text: text.clone() });
                            feed_transcript(session, &text).await;
                        }
                    }
                    ContentBlock::Thinking { thinking, .. } => {
                        if !state.saw_thinking_delta {
                            session.emit(SessionEventPayload::ThinkingStart { stream_index: None });
                            session.emit(SessionEventPayload::ThinkingDelta { thinking });
                        }
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        if !state.tool_names.contains_key(&id) {
                            state.tool_names.insert(id.clone(), name.clone());
                            session.emit(SessionEventPayload::ToolUseStart {
                                tool_use_id: id,
                                name,
                                input,
                                stream_index: None,
                            });
                        }
                    }
                }
            }
        }

        ProviderEvent::ToolResults { results } => {
            for result in results {
                session.emit(SessionEventPayload::ToolResultStart {
                    tool_use_id: result.tool_use_id.clone(),
                });
                match result.content {
                    Some(ContentValue::String(text)) => {
                        if !text.is_empty() {
                            session.emit(SessionEventPayload::ToolResultDelta {
                                tool_use_id: result.tool_use_id.clone(),
                                chunk: text,
                            });
                        }
                    }
                    Some(ContentValue::Blocks(blocks)) => {
                        for value in blocks {
                            let chunk = value
                                .get("text")
                                .and_then(|text| text.as_str())
                                .map(str::to_string)
                                .unwrap_or_else(|| value.to_string());
                            session.emit(SessionEventPayload::ToolResultDelta {
                                tool_use_id: result.tool_use_id.clone(),
                                chunk,
                            });
                        }
                    }
                    None => {}
                }
                session.emit(SessionEventPayload::ToolResultComplete {
                    tool_use_id: result.tool_use_id,
                    is_error: result.is_error,
                });
            }
        }

        ProviderEvent::TurnComplete { is_error, num_turns } => {
            session.is_responding.store(false, Ordering::SeqCst);
            if !state.index_to_tool.is_empty() {
                log::debug!(
                    "[{conversation}] dropping {} unclosed stream block(s) at turn end",
                    state.index_to_tool.len()
                );
                state.index_to_tool.clear();
                state.input_buffers.clear();
            }
            state.saw_text_delta = false;
            state.saw_thinking_delta = false;
            log::debug!("[{conversation}] turn {num_turns} complete (is_error: {is_error})");
            session.emit(SessionEventPayload::MessageComplete { is_error });
        }
    }
}

/// Append streamed text to the transcript and emit any newly found spans
///
/// Each new span is persisted through the output store; the retrieval key
/// rides the step-complete event instead of the raw body.
async fn feed_transcript(session: &Arc<Session>, text: &str) {
    let spans = {
        let mut scan = session.transcript.lock();
        scan.append(text);
        scan_markers(&mut scan, &session.config.app_id)
    };
    for span in spans {
        match session
            .store
            .store(&session.config.app_id, &span.agent_id, &span.content)
            .await
        {
            Ok(artifact_key) => {
                log::debug!(
                    "[{}] stored sub-agent artifact '{artifact_key}' for '{}'",
                    session.conversation_id().as_str(),
                    span.agent_id
                );
                session.emit(SessionEventPayload::SubagentStepComplete {
                    agent_id: span.agent_id,
                    artifact_key,
                });
            }
            Err(err) => {
                log::warn!(
                    "[{}] failed to store sub-agent artifact for '{}': {err}",
                    session.conversation_id().as_str(),
                    span.agent_id
                );
            }
        }
    }
}
