//! Screen-text domain: turns recognized on-screen text into file names,
//! code snippets and a cleaned remainder.
//!
//! - **cleanup**: whitespace normalization and the final noise pass
//! - **files**: file-name candidates and validation
//! - **snippets**: import/export/declaration lines

pub mod cleanup;
pub mod files;
pub mod snippets;

use serde::{Deserialize, Serialize};

/// What the post-processor pulled out of one block of screen text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedArtifact {
    pub files: Vec<String>,
    pub snippets: Vec<String>,
    /// Cleaned text with files and snippets removed.
    pub text: String,
}

impl ExtractedArtifact {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.snippets.is_empty() && self.text.is_empty()
    }

    /// One highlight string: `Files: a, b`, the snippets, then the
    /// remainder, separated by blank lines. Empty sections are skipped.
    pub fn to_highlight(&self) -> String {
        let mut parts = Vec::new();
        if !self.files.is_empty() {
            parts.push(format!("Files: {}", self.files.join(", ")));
        }
        if !self.snippets.is_empty() {
            parts.push(self.snippets.join("\n"));
        }
        if !self.text.is_empty() {
            parts.push(self.text.clone());
        }
        parts.join("\n\n")
    }
}

/// Run the full pipeline over recognized screen text.
pub fn process(raw: &str) -> ExtractedArtifact {
    let cleaned = cleanup::normalize(raw);
    let files = files::extract_filenames(&cleaned);
    let snippets = snippets::extract_snippets(&cleaned);

    // Snippets first: a snippet line may itself contain a file name.
    let mut redacted = cleaned;
    for snippet in &snippets {
        redacted = redacted.replace(snippet.as_str(), "");
    }
    for name in &files {
        redacted = redacted.replace(name.as_str(), "");
    }
    let text = cleanup::strip_noise(&redacted);

    log::debug!(
        "[SCREEN_TEXT] {} files, {} snippets, {} chars remaining",
        files.len(),
        snippets.len(),
        text.chars().count()
    );

    ExtractedArtifact {
        files,
        snippets,
        text,
    }
}
