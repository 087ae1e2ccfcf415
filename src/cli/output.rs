use console::style;
use std::fmt::Display;

/// Centralized output formatting utilities for consistent CLI presentation
pub struct Output;

impl Output {
    /// Print a success message with checkmark
    pub fn success<T: Display>(message: T) {
        println!("{} {}", style("✓").green(), message);
    }

    /// Print an error message with X mark to stderr
    pub fn error<T: Display>(message: T) {
        eprintln!("{} {}", style("Error:").red().bold(), message);
    }

    /// Print a warning message to stderr
    pub fn warning<T: Display>(message: T) {
        eprintln!("{} {}", style("⚠").yellow(), message);
    }

    /// Print an info message
    pub fn info<T: Display>(message: T) {
        println!("{} {}", style("ℹ").cyan(), message);
    }

    /// Print a sub-item with arrow prefix
    pub fn sub_item<T: Display>(message: T) {
        println!("  {} {}", style("→").dim(), message);
    }

    /// Print a tab-indented item, as used by `list --verbose`
    pub fn indented<T: Display>(message: T) {
        println!("\t{message}");
    }

    /// Print the divider svn uses between log records
    pub fn divider() {
        println!("{}", "-".repeat(72));
    }

    /// Print a section header
    pub fn section<T: Display>(title: T) {
        println!("{}", style(title).bold());
    }
}

/// Style a unified diff for terminal display.
///
/// `---`/`+++` lines are only treated as file headers before the first hunk
/// of a section, so removed lines starting with `--` keep the removal color.
pub fn colorize_diff(text: &str) -> String {
    let mut in_header = false;
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        let ending = &line[content.len()..];

        let styled = if content.starts_with("Index: ") {
            in_header = true;
            style(content).bold().to_string()
        } else if in_header
            && (content.starts_with("===")
                || content.starts_with("--- ")
                || content.starts_with("+++ "))
        {
            style(content).bold().to_string()
        } else if content.starts_with("@@") {
            in_header = false;
            style(content).cyan().to_string()
        } else if content.starts_with('+') {
            style(content).green().to_string()
        } else if content.starts_with('-') {
            style(content).red().to_string()
        } else {
            content.to_string()
        };

        out.push_str(&styled);
        out.push_str(ending);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "Index: a.txt\n===\n--- a.txt\n+++ a.txt\n@@ -1 +1 @@\n--- removed\n+added\n context\n";

    #[test]
    fn test_colorize_leaves_text_intact() {
        let styled = colorize_diff(DIFF);
        assert_eq!(console::strip_ansi_codes(&styled), DIFF);
    }

    #[test]
    fn test_hunk_lines_keep_diff_colors() {
        console::set_colors_enabled(true);
        let styled = colorize_diff(DIFF);
        let removed = styled
            .lines()
            .find(|line| console::strip_ansi_codes(line) == "--- removed")
            .unwrap()
            .to_string();
        assert_eq!(removed, style("--- removed").red().to_string());
    }
}
