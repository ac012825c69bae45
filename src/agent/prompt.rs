//! System prompts and template builders for agents.
//!
//! System prompts define each agent's behavior and can be overridden from a
//! prompt directory. Template builders format the per-call user messages.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use unicode_segmentation::UnicodeSegmentation;

use crate::core::{Artifact, ToolResult};

/// System prompt for the relevance analyzer.
pub const RELEVANCE_SYSTEM_PROMPT: &str = r"You are a routing assistant. You decide whether a single external tool should be consulted to answer the user's latest question.

## Rules

- Answer YES only when the question asks for information this tool provides.
- Answer NO for greetings, small talk, or questions the tool cannot answer.
- When a previous answer is shown, answer NO if the question is a follow-up that can be answered from that answer alone.
- When you answer YES, propose a short search query for the tool in the language of the question.

## Output Format

Reply with exactly these lines and nothing else:

RELEVANT: YES or NO
SEARCH QUERY: <query, only when RELEVANT is YES>";

/// Fallback system prompt for synthesis when the request supplies none.
pub const SYNTHESIZER_SYSTEM_PROMPT: &str = r"You are a helpful assistant. Answer the user's question precisely and concisely using the supplied documents.

## Rules

- Use Markdown for clarity.
- Quote the relevant passage and name its source document when you rely on it.
- Do not add information that is not present in the documents.
- If the documents do not contain the answer, say so plainly.";

/// Reply sent when no tool applies to the opening question of a conversation.
pub const FALLBACK_REPLY: &str = r"Sorry, for now I can only answer questions about **legal acts currently in force** and the records of the Polish parliament, or look up general topics on Wikipedia.

---

> **Tip**: if you believe your question is about one of these topics
1. Try a stronger model.
2. Use keywords that make the topic explicit.
3. Rephrase the question and send it again.";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/agentstream/prompts";

/// Filename for the relevance prompt template.
const RELEVANCE_FILENAME: &str = "relevance.md";
/// Filename for the synthesizer prompt template.
const SYNTHESIZER_FILENAME: &str = "synthesizer.md";
/// Filename for the canned fallback reply.
const FALLBACK_FILENAME: &str = "fallback.md";

/// A set of system prompts for all agents.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// System prompt for the relevance analyzer.
    pub relevance: String,
    /// Synthesis system prompt used when a request carries none.
    pub synthesizer: String,
    /// Canned "cannot help yet" reply.
    pub fallback: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` CLI flag)
    /// 2. `AGENTSTREAM_PROMPT_DIR` environment variable
    /// 3. `~/.config/agentstream/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("AGENTSTREAM_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            relevance: load_file(RELEVANCE_FILENAME, RELEVANCE_SYSTEM_PROMPT),
            synthesizer: load_file(SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
            fallback: load_file(FALLBACK_FILENAME, FALLBACK_REPLY),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            relevance: RELEVANCE_SYSTEM_PROMPT.to_string(),
            synthesizer: SYNTHESIZER_SYSTEM_PROMPT.to_string(),
            fallback: FALLBACK_REPLY.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (RELEVANCE_FILENAME, RELEVANCE_SYSTEM_PROMPT),
            (SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
            (FALLBACK_FILENAME, FALLBACK_REPLY),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Truncates `text` to at most `max_chars` grapheme clusters.
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.grapheme_indices(true).nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Builds the user message for a relevance check.
///
/// Without a previous answer the "initial query" variant is used. With one,
/// an excerpt is included so the model can tell follow-ups from new topics.
#[must_use]
pub fn build_relevance_prompt(
    query: &str,
    tool_name: &str,
    tool_description: &str,
    previous_excerpt: Option<&str>,
) -> String {
    let mut prompt = format!(
        "<question>{query}</question>\n\n\
         <tool name=\"{tool_name}\">\n{tool_description}\n</tool>\n\n"
    );

    match previous_excerpt {
        Some(previous) => {
            let _ = write!(
                prompt,
                "<previous_answer>\n{previous}\n</previous_answer>\n\n\
                 Check two conditions:\n\
                 1. Does the question ask for what this tool provides?\n\
                 2. Is it a new topic rather than a follow-up on the previous answer?\n\
                 Answer YES only if both hold."
            );
        }
        None => {
            prompt.push_str("Does the question ask for what this tool provides?");
        }
    }

    prompt
}

/// Builds the synthesis message from tool results.
///
/// Each result becomes one `"<tool>: <result>"` line.
#[must_use]
pub fn build_synthesis_prompt(question: &str, results: &[ToolResult]) -> String {
    let mut prompt = String::from("<documents>\n");
    for r in results {
        let _ = writeln!(prompt, "{}: {}", r.tool_name, r.result);
    }
    let _ = write!(
        prompt,
        "</documents>\n\n\
         <question>{question}</question>\n\n\
         Answer the question based on the documents above."
    );
    prompt
}

/// Builds the synthesis message for a follow-up answered from earlier artifacts.
#[must_use]
pub fn build_contextual_prompt(question: &str, artifacts: &[Artifact]) -> String {
    let mut prompt = String::from("<documents>\n");
    if artifacts.is_empty() {
        prompt.push_str("No documents were retrieved earlier in this conversation.\n");
    }
    for a in artifacts {
        let data = serde_json::to_string(&a.data).unwrap_or_else(|_| "null".to_string());
        let _ = writeln!(prompt, "<artifact type=\"{}\">{data}</artifact>", a.kind);
    }
    let _ = write!(
        prompt,
        "</documents>\n\n\
         <question>{question}</question>\n\n\
         Answer the follow-up question using the documents retrieved earlier."
    );
    prompt
}
