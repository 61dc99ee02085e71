//! Hand-off of unfixable errors to an assistant outside the pipeline.
//!
//! The orchestrator writes a prompt document, sends an [`AssistanceRequest`]
//! and blocks until an [`Acknowledgement`] comes back. Who answers (a person
//! at the terminal, an editor integration, a test) is not its concern.

use crate::context::ContextStore;
use crate::core::errors::{Error, Result};
use crate::core::{Dialect, ErrorRecord};
use crate::corruption::ValidationStatus;
use crate::parser::describe_code;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};

const CONTEXT_RADIUS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AssistanceRequest {
    pub error: ErrorRecord,
    pub prompt_path: PathBuf,
    pub assistant: String,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// The assistant changed these files (absolute or project-relative)
    Applied { files: Vec<PathBuf> },
    Skipped,
}

/// The orchestrator's end of the hand-off.
pub struct AssistChannel {
    requests: Sender<AssistanceRequest>,
    acks: Receiver<Acknowledgement>,
}

/// The responder's end of the hand-off.
pub struct AssistEndpoint {
    pub requests: Receiver<AssistanceRequest>,
    pub acks: Sender<Acknowledgement>,
}

impl AssistChannel {
    pub fn pair() -> (AssistChannel, AssistEndpoint) {
        let (request_tx, request_rx) = channel();
        let (ack_tx, ack_rx) = channel();
        (
            AssistChannel {
                requests: request_tx,
                acks: ack_rx,
            },
            AssistEndpoint {
                requests: request_rx,
                acks: ack_tx,
            },
        )
    }

    /// Send one request and wait for its answer. `None` once the responder is gone.
    pub fn request(&self, request: AssistanceRequest) -> Option<Acknowledgement> {
        if self.requests.send(request).is_err() {
            log::warn!("Assistance responder disconnected before the request was sent");
            return None;
        }
        match self.acks.recv() {
            Ok(ack) => Some(ack),
            Err(_) => {
                log::warn!("Assistance responder disconnected without answering");
                None
            }
        }
    }
}

/// Answer requests from a line-oriented console until either side closes.
///
/// An empty line means the error's own file was fixed, `s` skips, and any
/// other input is read as the whitespace-separated list of changed files.
pub fn respond_from<R: BufRead, W: Write>(endpoint: AssistEndpoint, mut input: R, mut output: W) {
    for request in endpoint.requests.iter() {
        let _ = writeln!(
            output,
            "\nPrompt saved to {}\nOpen it in {}, apply the suggested fix, then press ENTER (or 's' to skip).",
            request.prompt_path.display(),
            request.assistant
        );
        let _ = output.flush();

        let mut line = String::new();
        let ack = match input.read_line(&mut line) {
            Ok(0) | Err(_) => Acknowledgement::Skipped,
            Ok(_) => parse_reply(&line, &request.error),
        };
        if endpoint.acks.send(ack).is_err() {
            break;
        }
    }
}

fn parse_reply(line: &str, error: &ErrorRecord) -> Acknowledgement {
    let reply = line.trim();
    if reply.eq_ignore_ascii_case("s") {
        return Acknowledgement::Skipped;
    }
    if reply.is_empty() {
        return Acknowledgement::Applied {
            files: vec![PathBuf::from(&error.file)],
        };
    }
    Acknowledgement::Applied {
        files: reply.split_whitespace().map(PathBuf::from).collect(),
    }
}

/// Name of the assistant configured in the project, by marker directory.
pub fn detect_assistant(project_root: &Path) -> String {
    let markers = [
        (".claude", "Claude"),
        (".cursor", "Cursor"),
        (".windsurf", "Windsurf"),
    ];
    if let Some((_, name)) = markers
        .iter()
        .find(|(dir, _)| project_root.join(dir).exists())
    {
        return name.to_string();
    }

    let has_copilot = fs::read_dir(project_root.join(".github"))
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.file_name().to_string_lossy().starts_with("copilot"))
        })
        .unwrap_or(false);
    if has_copilot {
        "GitHub Copilot".to_string()
    } else {
        "assistant".to_string()
    }
}

/// Numbered source lines around `line`, the reported one marked with `>`.
pub fn code_context(content: &str, line: usize) -> String {
    let first = line.saturating_sub(CONTEXT_RADIUS).max(1);
    let last = line + CONTEXT_RADIUS;
    content
        .lines()
        .enumerate()
        .map(|(idx, text)| (idx + 1, text))
        .filter(|(n, _)| (first..=last).contains(n))
        .map(|(n, text)| {
            let marker = if n == line { '>' } else { ' ' };
            format!("{marker}{n:>5} | {text}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fence_language(dialect: Dialect, file: &str) -> &'static str {
    match Path::new(file).extension().and_then(|e| e.to_str()) {
        Some("ts" | "tsx") => "typescript",
        Some("js" | "jsx" | "mjs" | "cjs") => "javascript",
        Some("json") => "json",
        _ if dialect == Dialect::TypeScript => "typescript",
        _ => "",
    }
}

/// Schema models whose name the file mentions, case-insensitively.
fn relevant_models<'a>(context: &'a ContextStore, content: &str) -> Vec<&'a str> {
    let lowered = content.to_lowercase();
    context
        .models()
        .keys()
        .filter(|model| lowered.contains(&model.to_lowercase()))
        .map(String::as_str)
        .collect()
}

pub struct PromptInput<'a> {
    pub dialect: Dialect,
    pub error: &'a ErrorRecord,
    pub reasoning: &'a [String],
    pub assistant: &'a str,
    /// Content of the error's file, when readable
    pub source: Option<&'a str>,
}

pub fn render_prompt(input: &PromptInput, context: &ContextStore) -> String {
    let error = input.error;
    let mut doc = String::new();

    doc.push_str(&format!("# Assistance request: {} ({})\n\n", error.code, input.dialect));
    doc.push_str(&format!(
        "Prepared for {}. The fix will be validated and reverted automatically if it makes things worse.\n\n",
        input.assistant
    ));

    doc.push_str("## Error Details\n\n");
    doc.push_str(&format!("- **Code**: {} ({})\n", error.code, describe_code(&error.code)));
    doc.push_str(&format!("- **File**: {}:{}:{}\n", error.file, error.line, error.column));
    doc.push_str(&format!("- **Message**: {}\n", error.message));
    if let Some(subject) = error.subject_text() {
        doc.push_str(&format!("- **Subject**: `{subject}`\n"));
    }
    doc.push('\n');

    if let Some(source) = input.source {
        doc.push_str("## Code Context\n\n");
        doc.push_str(&format!("```{}\n", fence_language(input.dialect, &error.file)));
        doc.push_str(&code_context(source, error.line));
        doc.push_str("\n```\n\n");
    }

    doc.push_str("## Analysis\n\n");
    if input.reasoning.is_empty() {
        doc.push_str("- No automatic fix is registered for this error.\n");
    }
    for step in input.reasoning {
        doc.push_str(&format!("- {step}\n"));
    }
    doc.push('\n');

    let models = input
        .source
        .map(|source| relevant_models(context, source))
        .unwrap_or_default();
    let services: Vec<_> = context
        .services()
        .iter()
        .filter(|(id, _)| error.file.contains(id.as_str()))
        .collect();
    if !models.is_empty() || !services.is_empty() {
        doc.push_str("## Project Context\n\n");
        if !models.is_empty() {
            doc.push_str(&format!("- **Schema models**: {}\n", models.join(", ")));
        }
        for (id, links) in services {
            doc.push_str(&format!(
                "- **Service `{id}`**: upstream [{}], downstream [{}]\n",
                links.upstream.join(", "),
                links.downstream.join(", ")
            ));
        }
        doc.push('\n');
    }

    doc.push_str("## Task\n\n");
    doc.push_str("Suggest the smallest change that resolves this error without introducing new ones.\n");
    doc.push_str("Apply it to the file(s) above and state your confidence (0.0 - 1.0).\n\n");
    doc.push_str(&format!("---\nGenerated {}\n", Local::now().format("%Y-%m-%d %H:%M:%S")));
    doc
}

/// `error-<line>-<code>.md`, with the code made path-safe.
pub fn prompt_file_name(error: &ErrorRecord) -> String {
    let code: String = error
        .code
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("error-{}-{}.md", error.line, code)
}

pub fn write_prompt(prompts_dir: &Path, error: &ErrorRecord, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(prompts_dir)
        .map_err(|e| Error::file_system("Failed to create prompt directory", prompts_dir, e))?;
    let path = prompts_dir.join(prompt_file_name(error));
    fs::write(&path, content).map_err(|e| Error::file_system("Failed to write prompt", &path, e))?;
    Ok(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationOutcome {
    Applied,
    Skipped,
    Disconnected,
}

/// One entry of the append-only collaboration log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationEntry {
    pub timestamp: DateTime<Utc>,
    pub code: String,
    pub file: String,
    pub line: usize,
    pub assistant: String,
    pub prompt: String,
    pub outcome: CollaborationOutcome,
    #[serde(default)]
    pub files: Vec<String>,
    pub validation: Option<ValidationStatus>,
}
