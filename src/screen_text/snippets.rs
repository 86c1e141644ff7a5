//! Code-line detection for recognized screen text.

/// Line openers that mark a line as source code.
const CODE_OPENERS: &[&str] = &[
    "import ", "export ", "from ", "const ", "let ", "var ", "function ", "def ",
    "class ", "fn ", "pub ", "use ", "struct ", "enum ", "interface ", "type ",
    "package ", "#include",
];

/// Returns true if the trimmed line opens with an import, export or
/// declaration keyword.
pub fn is_code_line(line: &str) -> bool {
    let trimmed = line.trim();
    CODE_OPENERS.iter().any(|kw| trimmed.starts_with(kw))
}

/// Code lines in order of appearance, trimmed and deduplicated.
pub fn extract_snippets(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines().filter(|l| is_code_line(l)) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !out.iter().any(|s| s == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}
