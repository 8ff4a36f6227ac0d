//! Structured extraction of a workload failure's exception chain.
//!
//! The workload engine reports failures as a chain of
//! [`CaughtException`] records linked by explicit causes ("raised
//! from") or implicit contexts (an exception raised while another was
//! being handled). [`TraceExtractor`] walks that chain into a
//! [`Trace`]: an ordered, size-bounded, JSON-serializable description
//! suitable for the failure artifact.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::error::RunbookError;

/// Default bound on the rendered length of a captured local value.
pub const LOCALS_MAX_STRING: usize = 80;

/// Default bound on the number of frames kept per stack.
pub const MAX_FRAMES: usize = 50;

/// Upper bound on chain length. The chain is acyclic by construction;
/// the cap keeps a malformed engine payload from producing an unbounded
/// artifact.
const MAX_CHAIN_DEPTH: usize = 64;

/// One call site in a stack, outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub filename: String,
    pub line_number: i64,
    pub function_name: String,
    #[serde(default)]
    pub source_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locals: Option<BTreeMap<String, String>>,
}

/// Detail captured when the originating error is a syntax error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxDetail {
    pub offset: i64,
    pub filename: String,
    pub source_line: String,
    pub line_number: i64,
    pub message: String,
}

/// One exception in the chain together with its frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub exception_type: String,
    pub exception_value: String,
    pub is_cause: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax_detail: Option<SyntaxDetail>,
    pub frames: Vec<Frame>,
}

/// The extracted chain, most recent exception first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub stacks: Vec<Stack>,
}

impl Trace {
    /// The most recent exception's stack.
    pub fn head(&self) -> Option<&Stack> {
        self.stacks.first()
    }
}

/// Raw syntax-error fields as reported by the engine. All optional;
/// extraction fills best-effort defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxInfo {
    pub offset: Option<i64>,
    pub filename: Option<String>,
    pub source_line: Option<String>,
    pub line_number: Option<i64>,
    pub message: Option<String>,
}

/// A raw frame as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub line_number: i64,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub source_line: String,
    #[serde(default)]
    pub locals: Option<BTreeMap<String, serde_json::Value>>,
}

/// A caught exception and its causal links, as reported by the workload
/// engine's structured failure output.
///
/// `cause` is an explicit "raised from" link; `context` is the implicit
/// link to an exception that was being handled when this one was
/// raised. The records form a finite, acyclic chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaughtException {
    pub exception_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub syntax: Option<SyntaxInfo>,
    #[serde(default)]
    pub frames: Vec<RawFrame>,
    #[serde(default)]
    pub cause: Option<Box<CaughtException>>,
    #[serde(default)]
    pub context: Option<Box<CaughtException>>,
    #[serde(default)]
    pub suppress_context: bool,
}

/// Render a value through `Display` without letting a formatting error
/// escape.
pub fn safe_str(value: &dyn fmt::Display) -> String {
    let mut out = String::new();
    match write!(out, "{value}") {
        Ok(()) => out,
        Err(error) => format!("<str-error {:?}>", error.to_string()),
    }
}

/// Bounded textual form of a captured local value.
///
/// Strings pass through verbatim; other values are rendered as JSON. A
/// rendering error becomes an opaque placeholder, never a panic. Values
/// longer than `max_string` keep a quoted prefix plus the count of
/// characters dropped.
pub fn to_repr(value: &serde_json::Value, max_string: usize) -> String {
    let repr = match value {
        serde_json::Value::String(s) => s.clone(),
        other => match serde_json::to_string(other) {
            Ok(s) => s,
            Err(error) => format!("<repr-error {:?}>", error.to_string()),
        },
    };

    let len = repr.chars().count();
    if len > max_string {
        let truncated = len - max_string;
        let prefix: String = repr.chars().take(max_string).collect();
        format!("{prefix:?}+{truncated}")
    } else {
        repr
    }
}

// Virtual files ("<cell 3>") have no path on disk; leave them as-is.
fn resolve_filename(filename: &str) -> String {
    if filename.is_empty() {
        return "?".to_string();
    }
    if filename.starts_with('<') {
        return filename.to_string();
    }
    match std::path::absolute(filename) {
        Ok(path) => path.display().to_string(),
        Err(_) => filename.to_string(),
    }
}

fn syntax_detail(info: &SyntaxInfo) -> SyntaxDetail {
    SyntaxDetail {
        offset: info.offset.unwrap_or(0),
        filename: info.filename.clone().unwrap_or_else(|| "?".to_string()),
        source_line: info.source_line.clone().unwrap_or_default(),
        line_number: info.line_number.unwrap_or(0),
        message: info.message.clone().unwrap_or_default(),
    }
}

/// Walks exception chains into bounded [`Trace`]s.
#[derive(Debug, Clone)]
pub struct TraceExtractor {
    show_locals: bool,
    locals_max_string: usize,
    max_frames: usize,
}

impl Default for TraceExtractor {
    fn default() -> Self {
        Self {
            show_locals: false,
            locals_max_string: LOCALS_MAX_STRING,
            max_frames: MAX_FRAMES,
        }
    }
}

impl TraceExtractor {
    /// `max_frames` below 2 cannot hold the first/last halves around
    /// the truncation marker.
    pub fn new(
        show_locals: bool,
        locals_max_string: usize,
        max_frames: usize,
    ) -> Result<Self, RunbookError> {
        if max_frames < 2 {
            return Err(RunbookError::Config(format!(
                "max_frames must be >= 2: {max_frames}"
            )));
        }
        Ok(Self {
            show_locals,
            locals_max_string,
            max_frames,
        })
    }

    /// Walk the chain starting at `head` into a trace, most recent
    /// exception first. An explicit cause with frames is followed ahead
    /// of an implicit context; a suppressed or frameless context ends
    /// the walk.
    pub fn extract(&self, head: &CaughtException) -> Trace {
        let mut stacks = Vec::new();
        let mut current = head;
        let mut is_cause = false;

        for _ in 0..MAX_CHAIN_DEPTH {
            let frames = current.frames.iter().map(|raw| self.frame(raw)).collect();
            stacks.push(Stack {
                exception_type: current.exception_type.clone(),
                exception_value: current.message.clone(),
                is_cause,
                syntax_detail: current.syntax.as_ref().map(syntax_detail),
                frames: self.truncate(frames),
            });

            if let Some(cause) = &current.cause
                && !cause.frames.is_empty()
            {
                current = cause;
                is_cause = true;
                continue;
            }

            if let Some(context) = &current.context
                && !context.frames.is_empty()
                && !current.suppress_context
            {
                current = context;
                is_cause = false;
                continue;
            }

            break;
        }

        Trace { stacks }
    }

    fn frame(&self, raw: &RawFrame) -> Frame {
        let locals = if self.show_locals {
            raw.locals.as_ref().map(|locals| {
                locals
                    .iter()
                    .map(|(key, value)| (key.clone(), to_repr(value, self.locals_max_string)))
                    .collect()
            })
        } else {
            None
        };
        Frame {
            filename: resolve_filename(&raw.filename),
            line_number: raw.line_number,
            function_name: raw.function_name.clone(),
            source_line: raw.source_line.clone(),
            locals,
        }
    }

    /// Replace the interior of an over-long frame sequence with a
    /// single marker frame, keeping the first and last halves verbatim.
    fn truncate(&self, frames: Vec<Frame>) -> Vec<Frame> {
        if frames.len() <= self.max_frames {
            return frames;
        }

        let half = self.max_frames / 2; // integer division handles odd maximums
        let skipped = frames.len() - 2 * half;
        let marker = Frame {
            filename: String::new(),
            line_number: -1,
            function_name: format!("Skipped frames: {skipped}"),
            source_line: String::new(),
            locals: None,
        };

        let mut kept = Vec::with_capacity(2 * half + 1);
        kept.extend_from_slice(&frames[..half]);
        kept.push(marker);
        kept.extend_from_slice(&frames[frames.len() - half..]);
        kept
    }
}
