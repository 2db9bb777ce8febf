//! Command grammar
//!
//! Commands are short text lines: `list`, `help`, `+NAME` / bare `NAME` to
//! register, `-NAME` to remove. Both the `+`-prefixed and the bare form
//! trigger registration; keywords are case-insensitive.

/// Parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Register(String),
    Remove(String),
    /// A prefix with no name after it
    Unrecognized,
}

/// Parse raw command text
pub fn parse(text: &str) -> Command {
    let trimmed = text.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("help") {
        return Command::Help;
    }
    if trimmed.eq_ignore_ascii_case("list") {
        return Command::List;
    }
    if let Some(rest) = trimmed.strip_prefix('+') {
        let name = rest.trim();
        if name.is_empty() {
            return Command::Unrecognized;
        }
        return Command::Register(name.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix('-') {
        let name = rest.trim();
        if name.is_empty() {
            return Command::Unrecognized;
        }
        return Command::Remove(name.to_string());
    }

    Command::Register(trimmed.to_string())
}
