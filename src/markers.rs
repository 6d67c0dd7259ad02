//! Transcript marker extraction
//!
//! Sub-agents embed structured output in free-form streamed text as
//! delimited spans: `<<<agent-id>>> body <<<end-agent-id>>>`. The session
//! appends every text delta to a transcript accumulator and re-scans the
//! whole buffer, so a span split across deltas is detected as soon as its
//! closer arrives. A dedup set keyed on `app:agent:length` keeps re-scans
//! from re-emitting spans whose start offset shifted as unrelated text grew
//! around them.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static MARKER_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<<<([A-Za-z0-9_][A-Za-z0-9_-]*)>>>").expect("marker opener regex is valid")
});

/// One extracted sub-agent output span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSpan {
    /// Identifier from the marker delimiters
    pub agent_id: String,
    /// Span body with surrounding whitespace trimmed
    pub content: String,
    /// Length of the full delimited span, opener through closer
    pub span_len: usize,
}

/// Accumulated transcript text plus the dedup set for already-emitted spans
///
/// Both live for the whole session (across natural stream restarts) and are
/// cleared together on reset and disposal.
#[derive(Debug, Default)]
pub struct TranscriptScan {
    transcript: String,
    seen: HashSet<String>,
}

impl TranscriptScan {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text delta to the accumulator
    pub fn append(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    /// Accumulated transcript length in bytes
    #[must_use]
    pub fn transcript_len(&self) -> usize {
        self.transcript.len()
    }

    /// Discard the accumulator and the dedup set
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.seen.clear();
    }
}

/// Scan the whole accumulator for completed marker spans
///
/// Returns newly found spans in the order they appear. Spans are matched
/// non-overlapping left to right; an opener without a closer is skipped and
/// picked up by a later re-scan once the closer has streamed in. A span
/// already recorded in the dedup set is never returned twice, no matter how
/// much unrelated text has grown around it.
pub fn scan_markers(state: &mut TranscriptScan, app_id: &str) -> Vec<MarkerSpan> {
    let TranscriptScan { transcript, seen } = state;
    let mut found = Vec::new();
    let mut cursor = 0;

    while cursor < transcript.len() {
        let Some(caps) = MARKER_OPENER.captures(&transcript[cursor..]) else {
            break;
        };
        let (Some(opener), Some(id_match)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let agent_id = id_match.as_str();
        let open_start = cursor + opener.start();
        let body_start = cursor + opener.end();

        // The regex crate has no backreferences; locate the matching closer
        // with a literal search.
        let closer = format!("<<<end-{agent_id}>>>");
        let Some(rel) = transcript[body_start..].find(&closer) else {
            // Unterminated span: keep scanning past this opener so markers
            // for other agents are still found.
            cursor = body_start;
            continue;
        };

        let body_end = body_start + rel;
        let span_end = body_end + closer.len();
        let span_len = span_end - open_start;
        let key = format!("{app_id}:{agent_id}:{span_len}");
        if seen.insert(key) {
            log::debug!("transcript marker found: agent '{agent_id}', span {span_len} bytes");
            found.push(MarkerSpan {
                agent_id: agent_id.to_string(),
                content: transcript[body_start..body_end].trim().to_string(),
                span_len,
            });
        }
        cursor = span_end;
    }

    found
}
