//! ui::output
//!
//! Terminal output for plug.
//!
//! Command results go to stdout. Refresh notices, warnings and failure
//! reports go to stderr so a result can be piped while progress stays
//! visible. Only `error` and `report_error` ignore `--quiet`.

use std::fmt::Display;

/// Environment variable that turns on `[debug]` lines for every command.
pub const DEBUG_ENV: &str = "PLUGCLI_DEBUG";

/// How much plug says about what it is doing.
///
/// Ordered, so `verbosity >= Verbosity::Normal` reads as "not quiet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Debug,
}

impl Verbosity {
    /// `quiet` wins over `debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Debug,
            (false, false) => Verbosity::Normal,
        }
    }

    /// Normal, or Debug when `PLUGCLI_DEBUG` is set to anything non-empty.
    pub fn from_env() -> Self {
        let debug = std::env::var_os(DEBUG_ENV).is_some_and(|v| !v.is_empty());
        Self::from_flags(false, debug)
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn emit(stream: Stream, prefix: &str, message: impl Display, shown: bool) {
    if !shown {
        return;
    }
    match stream {
        Stream::Stdout => println!("{}{}", prefix, message),
        Stream::Stderr => eprintln!("{}{}", prefix, message),
    }
}

/// Command output on stdout.
pub fn print(message: impl Display, verbosity: Verbosity) {
    emit(Stream::Stdout, "", message, verbosity >= Verbosity::Normal);
}

/// Confirmation that a command changed something, e.g. "Saved ... to: ...".
pub fn success(message: impl Display, verbosity: Verbosity) {
    emit(Stream::Stdout, "", message, verbosity >= Verbosity::Normal);
}

pub fn debug(message: impl Display, verbosity: Verbosity) {
    emit(Stream::Stderr, "[debug] ", message, verbosity >= Verbosity::Debug);
}

/// Progress notice on stderr, such as a deployment refresh.
pub fn notice(message: impl Display, verbosity: Verbosity) {
    emit(Stream::Stderr, "", message, verbosity >= Verbosity::Normal);
}

pub fn warn(message: impl Display, verbosity: Verbosity) {
    emit(Stream::Stderr, "warning: ", message, verbosity >= Verbosity::Normal);
}

pub fn error(message: impl Display) {
    emit(Stream::Stderr, "error: ", message, true);
}

/// Lay out a failure report: header, indented body, optional footer.
///
/// ```
/// use plugcli::ui::output::format_report;
///
/// let text = format_report("Plugin error from dummy-plugin:", "boom", Some("See above for debug info."));
/// assert_eq!(text, "Plugin error from dummy-plugin:\n\n  boom\n\nSee above for debug info.");
/// ```
pub fn format_report(header: &str, message: &str, footer: Option<&str>) -> String {
    let mut text = format!("{}\n", header);
    for line in message.lines() {
        text.push('\n');
        if !line.is_empty() {
            text.push_str("  ");
            text.push_str(line);
        }
    }
    if let Some(footer) = footer {
        text.push_str("\n\n");
        text.push_str(footer);
    }
    text
}

pub fn report_error(header: &str, message: impl Display, footer: Option<&str>) {
    emit(
        Stream::Stderr,
        "",
        format_report(header, &message.to_string(), footer),
        true,
    );
}

/// One item per line, each behind `indent`.
pub fn format_list<T: Display>(items: &[T], indent: &str) -> String {
    let lines: Vec<String> = items.iter().map(|item| format!("{}{}", indent, item)).collect();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_overrides_debug() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn verbosity_is_ordered() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Debug > Verbosity::Normal);
    }

    #[test]
    fn report_keeps_blank_lines_unindented() {
        let text = format_report("Header:", "one\n\ntwo", None);
        assert_eq!(text, "Header:\n\n  one\n\n  two");
    }

    #[test]
    fn indented_list() {
        assert_eq!(format_list(&["seq: IntSequence1", "other: SingleInt"], "  "), "  seq: IntSequence1\n  other: SingleInt");
    }
}
