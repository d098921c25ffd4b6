//! Human-readable warnings and errors, and the counters the passes report.

use colored::Colorize;
use std::fmt;
use std::ops::AddAssign;

#[cfg(test)]
use pretty_assertions::assert_eq;

/// An inclusive range of byte offsets into the source.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

impl Position {
    pub fn at(index: usize) -> Self {
        Position {
            start: index,
            end: index,
        }
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

pub trait Combine<T> {
    fn combine(&self, _: T) -> T;
}

impl Combine<Option<Position>> for Option<Position> {
    fn combine(&self, other: Self) -> Self {
        match (*self, other) {
            // A run may be interleaved with comment bytes, so the merged
            // position spans everything between the two.
            (Some(pos1), Some(pos2)) => Some(Position {
                start: pos1.start.min(pos2.start),
                end: pos1.end.max(pos2.end),
            }),
            (Some(pos), None) | (None, Some(pos)) => Some(pos),
            (None, None) => None,
        }
    }
}

/// Raised by the branch resolver when the brackets don't pair up.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: Option<Position>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} (at {:?})", self.message, pos),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Level {
    Warning,
    Error,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub position: Option<Position>,
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        Diagnostic {
            level: Level::Error,
            message: err.message,
            position: err.position,
        }
    }
}

/// Zero-indexed line and column of `offset` in `source`.
fn line_and_column(source: &[u8], offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count();
    let column = match before.iter().rposition(|&b| b == b'\n') {
        Some(newline) => offset - newline - 1,
        None => offset,
    };
    (line, column)
}

impl Diagnostic {
    /// Render this diagnostic against the source it was produced from,
    /// in the style `path:line:column: error: message`, followed by the
    /// offending line and a caret marker.
    pub fn format(&self, path: &str, source: &[u8]) -> String {
        let level_text = match self.level {
            Level::Warning => "warning:".yellow(),
            Level::Error => "error:".red(),
        };

        let pos = match self.position {
            Some(pos) => pos,
            None => {
                return format!(
                    "{} {} {}",
                    format!("{}:", path).as_str().bold(),
                    level_text.bold(),
                    self.message
                );
            }
        };

        let (line_idx, column) = line_and_column(source, pos.start);
        let line_text = source
            .split(|&b| b == b'\n')
            .nth(line_idx)
            .map(String::from_utf8_lossy)
            .unwrap_or_default();

        let width = if pos.end > pos.start {
            // Clamp to the first line of a multi-line span.
            (pos.end - pos.start + 1).min(line_text.len().saturating_sub(column).max(1))
        } else {
            1
        };
        let marker = format!("{}{}", " ".repeat(column), "^".repeat(width));

        format!(
            "{} {} {}\n{}\n{}",
            format!("{}:{}:{}:", path, line_idx + 1, column + 1)
                .as_str()
                .bold(),
            level_text.bold(),
            self.message,
            line_text,
            marker.bold()
        )
    }
}

/// How many rewrites each stage of the pipeline performed.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct PassStats {
    pub ops_aggregated: usize,
    pub zero_ops_eliminated: usize,
    pub move_ops_eliminated: usize,
    pub scan_ops_eliminated: usize,
}

impl AddAssign for PassStats {
    fn add_assign(&mut self, other: Self) {
        self.ops_aggregated += other.ops_aggregated;
        self.zero_ops_eliminated += other.zero_ops_eliminated;
        self.move_ops_eliminated += other.move_ops_eliminated;
        self.scan_ops_eliminated += other.scan_ops_eliminated;
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "ops combined: {}", self.ops_aggregated)?;
        writeln!(f, "zero ops eliminated: {}", self.zero_ops_eliminated)?;
        writeln!(f, "move ops eliminated: {}", self.move_ops_eliminated)?;
        write!(f, "scan ops eliminated: {}", self.scan_ops_eliminated)
    }
}

#[test]
fn test_combine_pos() {
    let pos1 = Some(Position { start: 1, end: 2 });
    let pos2 = Some(Position { start: 3, end: 4 });

    assert_eq!(pos1.combine(pos2), Some(Position { start: 1, end: 4 }));
}

#[test]
fn test_combine_order() {
    let pos1 = Some(Position { start: 3, end: 4 });
    let pos2 = Some(Position { start: 1, end: 2 });

    assert_eq!(pos1.combine(pos2), Some(Position { start: 1, end: 4 }));
}

#[test]
fn test_combine_pos_across_comments() {
    let pos1 = Some(Position { start: 1, end: 2 });
    let pos2 = Some(Position { start: 4, end: 5 });

    assert_eq!(pos1.combine(pos2), Some(Position { start: 1, end: 5 }));
}

#[test]
fn test_combine_pos_overlap() {
    let pos1 = Some(Position { start: 1, end: 1 });
    let pos2 = Some(Position { start: 1, end: 3 });

    assert_eq!(pos1.combine(pos2), Some(Position { start: 1, end: 3 }));
}

#[test]
fn test_combine_missing() {
    let pos = Some(Position::at(7));
    let missing: Option<Position> = None;

    assert_eq!(pos.combine(missing), pos);
    assert_eq!(missing.combine(pos), pos);
    assert_eq!(missing.combine(missing), None);
}

#[test]
fn line_and_column_after_newlines() {
    assert_eq!(line_and_column(b"abc", 2), (0, 2));
    assert_eq!(line_and_column(b"ab\ncd\nef", 7), (2, 1));
    assert_eq!(line_and_column(b"ab\n", 3), (1, 0));
}

#[test]
fn format_points_at_bracket() {
    colored::control::set_override(false);

    let diagnostic = Diagnostic {
        level: Level::Error,
        message: "This ] has no matching [".to_owned(),
        position: Some(Position::at(5)),
    };
    assert_eq!(
        diagnostic.format("foo.bf", b"+\n+++]+"),
        "foo.bf:2:4: error: This ] has no matching [\n+++]+\n   ^"
    );
}

#[test]
fn stats_accumulate() {
    let mut stats = PassStats {
        ops_aggregated: 2,
        ..PassStats::default()
    };
    stats += PassStats {
        ops_aggregated: 1,
        scan_ops_eliminated: 3,
        ..PassStats::default()
    };

    assert_eq!(stats.ops_aggregated, 3);
    assert_eq!(stats.scan_ops_eliminated, 3);
    assert_eq!(stats.zero_ops_eliminated, 0);
}
