//! Colored terminal output for interpreter results.
//!
//! Command output is printed verbatim: stdout lines to stdout, stderr lines
//! to stderr. Session banners and failures carry a colored tag.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::shell::{CommandOutput, ErrorLine};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Tag shown before session-level failures.
#[must_use]
pub fn error_line_tag(line: &ErrorLine) -> Option<&'static str> {
    match line {
        ErrorLine::Diagnostic(_) => None,
        ErrorLine::SessionFailure(_) => Some("[SESSION]"),
    }
}

/// Print session start information.
pub fn print_session_start(program: &str, pid: Option<u32>) {
    let pid = pid.map_or_else(|| "?".to_string(), |p| p.to_string());
    eprintln!(
        "{} {} program={}, pid={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        program.cyan(),
        pid.dimmed()
    );
}

/// Print session end information.
pub fn print_session_end(exit_code: Option<i32>) {
    let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
    if exit_code.unwrap_or(0) == 0 {
        eprintln!(
            "{} {} Interpreter exited (code {})",
            timestamp().dimmed(),
            "[SESSION]".green().bold(),
            code
        );
    } else {
        eprintln!(
            "{} {} Interpreter exited (code {})",
            timestamp().dimmed(),
            "[SESSION]".red().bold(),
            code.red()
        );
    }
}

/// Echo a command before running it.
pub fn print_command(cmd: &str) {
    eprintln!("{} {}", "PS>".cyan().bold(), truncate(cmd, 120).dimmed());
}

/// Print one stdout line.
pub fn print_stdout_line(line: &str) {
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

/// Print one stderr line.
pub fn print_stderr_line(line: &ErrorLine) {
    match error_line_tag(line) {
        Some(tag) => eprintln!("{} {}", tag.red().bold(), line.text().red()),
        None => eprintln!("{}", line.text().yellow()),
    }
}

/// Print all stdout lines of `output`.
pub fn print_stdout(output: &CommandOutput) {
    for line in &output.stdout {
        print_stdout_line(line);
    }
}

/// Print all stderr lines of `output`.
pub fn print_stderr(output: &CommandOutput) {
    for line in &output.stderr {
        print_stderr_line(line);
    }
}

/// Print stdout, then stderr.
pub fn print_output(output: &CommandOutput) {
    print_stdout(output);
    print_stderr(output);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
