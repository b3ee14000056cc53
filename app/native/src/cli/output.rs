//! CLI output formatting utilities.
//!
//! - Run outcome lines
//! - JSON syntax highlighting

use colored::Colorize;

use crate::error::SkypaperError;
use crate::wallpaper::RunOutcome;

/// Prints a run outcome, either as one colored line or as JSON.
///
/// # Errors
///
/// Returns an error if the outcome cannot be serialized.
pub fn print_outcome(outcome: &RunOutcome, json: bool) -> Result<(), SkypaperError> {
    if json {
        print_highlighted_json(&serde_json::to_value(outcome)?);
    } else {
        println!("{}", format_outcome(outcome));
    }
    Ok(())
}

/// Formats a run outcome as a single status line.
#[must_use]
pub fn format_outcome(outcome: &RunOutcome) -> String {
    let status = if outcome.success { "✓".green() } else { "✗".red() };
    let time = outcome.started_at.format("%H:%M:%S");
    let detail = format!("({}, {} ms)", outcome.source, outcome.elapsed_ms).dimmed();
    format!("{status} {time} {} {detail}", outcome.message)
}

/// Prints JSON with syntax highlighting.
///
/// Colors:
/// - Keys: Cyan
/// - Strings: Green
/// - Numbers: Yellow
/// - Booleans/Null: Magenta
pub fn print_highlighted_json(value: &serde_json::Value) {
    println!("{}", highlight_json(value));
}

/// Renders pretty printed JSON with ANSI colors.
#[must_use]
pub fn highlight_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

const INDENT: &str = "  ";

fn write_value(out: &mut String, value: &serde_json::Value, depth: usize) {
    use serde_json::Value;

    match value {
        Value::Null => out.push_str(&"null".magenta().to_string()),
        Value::Bool(b) => out.push_str(&b.to_string().magenta().to_string()),
        Value::Number(n) => out.push_str(&n.to_string().yellow().to_string()),
        Value::String(s) => out.push_str(&quoted(s).green().to_string()),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Array(items) => {
            out.push_str(&"[".bold().to_string());
            for (i, item) in items.iter().enumerate() {
                newline(out, depth + 1);
                write_value(out, item, depth + 1);
                if i + 1 < items.len() {
                    out.push(',');
                }
            }
            newline(out, depth);
            out.push_str(&"]".bold().to_string());
        }
        Value::Object(map) => {
            out.push_str(&"{".bold().to_string());
            for (i, (key, item)) in map.iter().enumerate() {
                newline(out, depth + 1);
                out.push_str(&quoted(key).cyan().to_string());
                out.push_str(": ");
                write_value(out, item, depth + 1);
                if i + 1 < map.len() {
                    out.push(',');
                }
            }
            newline(out, depth);
            out.push_str(&"}".bold().to_string());
        }
    }
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    out.push_str(&INDENT.repeat(depth));
}

fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

/// Truncates a string to a maximum number of characters, adding ellipsis if needed.
///
/// This function correctly handles multi-byte UTF-8 characters by counting
/// characters rather than bytes.
#[must_use]
pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();

    if char_count <= max_chars {
        s.to_string()
    } else if max_chars <= 1 {
        "…".to_string()
    } else {
        // Find the byte index of the (max_chars - 1)th character
        let truncate_at = s.char_indices().nth(max_chars - 1).map_or(s.len(), |(idx, _)| idx);
        format!("{}…", &s[..truncate_at])
    }
}
