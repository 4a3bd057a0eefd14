//! Input normalizer. Strips inline control flags and tokenizes a raw line.
//!
//! Recognized flags:
//! - `--raw` / `-r`: print decoded payloads as raw JSON
//! - `--lines N` / `--lines=N` / `-n N`: log line count for inspect queries
//!
//! A missing or non-positive line count falls back to the configured
//! default and records a warning for the caller to show.

/// One line of input after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedInput {
    /// Whitespace-separated tokens with flags removed, original case kept.
    pub tokens: Vec<String>,

    /// Raw-output toggle for this turn.
    pub raw: bool,

    /// Log line override, if the flag was given.
    pub line_limit: Option<u32>,

    /// User-facing warnings produced while parsing flags.
    pub warnings: Vec<String>,
}

/// What the session loop should do with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Re-prompt without side effects.
    Empty,
    /// Leave the interactive loop.
    Exit,
    /// Run one turn.
    Query(NormalizedInput),
}

/// Normalize one raw input line.
pub fn normalize(line: &str, default_line_limit: u32) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    if matches!(
        trimmed.to_ascii_lowercase().as_str(),
        "exit" | "quit" | "/exit" | "/quit" | ":q"
    ) {
        return Command::Exit;
    }

    let mut input = NormalizedInput::default();
    let mut words = trimmed.split_whitespace().peekable();

    while let Some(word) = words.next() {
        match word {
            "--raw" | "-r" => input.raw = true,
            "--lines" | "-n" => {
                let value = words.next_if(|next| is_integer(next));
                input.line_limit = Some(line_limit(word, value, default_line_limit, &mut input.warnings));
            }
            _ if word.starts_with("--lines=") => {
                let value = word.strip_prefix("--lines=").filter(|v| !v.is_empty());
                input.line_limit = Some(line_limit("--lines", value, default_line_limit, &mut input.warnings));
            }
            _ => input.tokens.push(word.to_string()),
        }
    }

    if input.tokens.is_empty() {
        return Command::Empty;
    }

    Command::Query(input)
}

fn is_integer(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn line_limit(flag: &str, value: Option<&str>, default: u32, warnings: &mut Vec<String>) -> u32 {
    match value.map(|v| v.parse::<u32>()) {
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            warnings.push(format!(
                "{flag} expects a positive integer up to {}, using default of {default}",
                u32::MAX
            ));
            default
        }
        None => {
            warnings.push(format!("{flag} is missing a value, using default of {default}"));
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(line: &str) -> NormalizedInput {
        match normalize(line, 30) {
            Command::Query(input) => input,
            other => panic!("expected a query, got {other:?}"),
        }
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(normalize("   \t ", 30), Command::Empty);
    }

    #[test]
    fn reserved_commands_exit() {
        assert_eq!(normalize("exit", 30), Command::Exit);
        assert_eq!(normalize("  QUIT ", 30), Command::Exit);
        assert_eq!(normalize(":q", 30), Command::Exit);
    }

    #[test]
    fn tokenizes_on_whitespace() {
        let input = query("describe  devbox\tmy-app");
        assert_eq!(input.tokens, vec!["describe", "devbox", "my-app"]);
        assert!(!input.raw);
        assert!(input.line_limit.is_none());
    }

    #[test]
    fn raw_flag_is_stripped() {
        let input = query("pods --raw in hzh");
        assert!(input.raw);
        assert_eq!(input.tokens, vec!["pods", "in", "hzh"]);
    }

    #[test]
    fn line_limit_flag_forms() {
        assert_eq!(query("logs pod web-0 --lines 100").line_limit, Some(100));
        assert_eq!(query("logs pod web-0 -n 5").line_limit, Some(5));
        assert_eq!(query("logs pod web-0 --lines=7").line_limit, Some(7));
    }

    #[test]
    fn non_positive_line_limit_falls_back() {
        let input = query("logs pod web-0 --lines 0");
        assert_eq!(input.line_limit, Some(30));
        assert_eq!(input.warnings.len(), 1);
        assert_eq!(input.tokens, vec!["logs", "pod", "web-0"]);

        let input = query("logs pod web-0 --lines=-3");
        assert_eq!(input.line_limit, Some(30));
        assert_eq!(input.warnings.len(), 1);
    }

    #[test]
    fn out_of_range_line_limit_falls_back() {
        for line in [
            "logs pod web-0 --lines 99999999999",
            "logs pod web-0 -n 99999999999999999999999",
            "logs pod web-0 --lines=4294967296",
        ] {
            let input = query(line);
            assert_eq!(input.line_limit, Some(30), "{line}");
            assert_eq!(input.warnings.len(), 1, "{line}");
            assert_eq!(input.tokens, vec!["logs", "pod", "web-0"], "{line}");
        }
        assert_eq!(query("logs --lines 4294967295").line_limit, Some(u32::MAX));
    }

    #[test]
    fn missing_line_limit_value_keeps_next_token() {
        let input = query("logs --lines pod web-0");
        assert_eq!(input.line_limit, Some(30));
        assert_eq!(input.tokens, vec!["logs", "pod", "web-0"]);
        assert!(input.warnings[0].contains("missing"));
    }

    #[test]
    fn flags_only_is_empty() {
        assert_eq!(normalize("--raw", 30), Command::Empty);
    }
}
