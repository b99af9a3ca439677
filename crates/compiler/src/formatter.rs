//! Pretty error messages
//!
//! Renders an error together with the source lines around it and a caret
//! under the offending column.

use crate::error::CompileError;

/// Lines shown on each side of the error line
const CONTEXT_LINES: usize = 4;

/// Format `error` with its context in `source`
pub fn format_error(error: &CompileError, source: &str) -> String {
    let line_number = error.line();
    let column = error.column();

    let lines: Vec<&str> = split_lines(source);
    let start = line_number.saturating_sub(CONTEXT_LINES).max(1);
    let end = (line_number + CONTEXT_LINES).min(lines.len());
    let width = end.to_string().len();

    let mut context = String::new();
    for number in start..=end {
        let line = lines.get(number - 1).copied().unwrap_or_default();
        let tabs = line.chars().take_while(|&c| c == '\t').count();
        let line = format!("{}{}", "  ".repeat(tabs), &line[tabs..]);

        context += &format!("  {:>width$}| {}\n", number, line, width = width);
        if number == line_number {
            let dashes = (column + tabs).saturating_sub(1);
            context += &format!("  {}--{}^\n", "-".repeat(width), "-".repeat(dashes));
        }
    }

    let file_path = match error.file_path() {
        "" => String::new(),
        path => format!("{} ", path),
    };
    format!(
        "{}\n\n  ({}{}:{})\n{}",
        error.message(),
        file_path,
        line_number,
        column,
        context
    )
}

/// Split on `\r\n`, `\r` or `\n`
fn split_lines(source: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                lines.push(&source[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            b'\n' => {
                lines.push(&source[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&source[start..]);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use roole_syntax::{Node, NodeKind, SourceLocation};

    fn error_at(line: usize, column: usize, file_path: &str) -> CompileError {
        let node = Node::new(NodeKind::Null, SourceLocation::new(line, column, 0));
        CompileError::semantic("divide by zero", &node, file_path)
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\r\nb\rc\nd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn test_caret_under_column() {
        let source = "body {\n\t-foo: 1 / 0;\n}";
        let message = format_error(&error_at(2, 12, ""), source);
        assert_eq!(
            message,
            "divide by zero\n\n  (2:12)\n  1| body {\n  2|   -foo: 1 / 0;\n  ---------------^\n  3| }\n"
        );
    }

    #[test]
    fn test_context_window_and_file_path() {
        let source = (1..=12).map(|n| format!("line{}", n)).collect::<Vec<_>>().join("\n");
        let message = format_error(&error_at(10, 1, "base.roo"), &source);
        assert!(message.starts_with("divide by zero\n\n  (base.roo 10:1)\n"));
        assert!(message.contains("   6| line6\n"));
        assert!(!message.contains("line5\n"));
        assert!(message.contains("  12| line12\n"));
        assert!(message.contains("  10| line10\n  ----^\n"));
    }
}
