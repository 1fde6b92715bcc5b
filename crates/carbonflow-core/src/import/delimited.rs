//! Delimited-text splitting: line endings, separators, quoted cells.

use crate::LcaError;

/// Line terminator of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    /// Pick the terminator the text actually uses.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::CrLf
        } else if text.contains('\n') {
            Self::Lf
        } else if text.contains('\r') {
            Self::Cr
        } else {
            Self::Lf
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }
}

/// Cell separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Comma,
    Semicolon,
    Tab,
}

impl Separator {
    /// Candidates in the order they are tried.
    pub const CANDIDATES: [Separator; 3] = [Self::Comma, Self::Semicolon, Self::Tab];

    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Comma => ',',
            Self::Semicolon => ';',
            Self::Tab => '\t',
        }
    }

    /// The first candidate that splits the header into more than one column.
    ///
    /// A single-column header falls back to comma.
    #[must_use]
    pub fn detect(header: &str) -> Self {
        Self::CANDIDATES
            .into_iter()
            .find(|sep| split_record(header, *sep).len() > 1)
            .unwrap_or(Self::Comma)
    }
}

/// Split one record, honouring double-quoted cells and `""` escapes.
///
/// Cells are trimmed; surrounding quotes are removed.
#[must_use]
pub fn split_record(line: &str, separator: Separator) -> Vec<String> {
    let sep = separator.as_char();
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                cells.push(cell.trim().to_string());
                cell.clear();
            }
            c => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

/// A data row with its 1-based line number in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub line: usize,
    pub cells: Vec<String>,
}

impl Row {
    /// Cell at `index`, empty when the row is short.
    #[must_use]
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

/// A parsed table: header cells plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub separator: Separator,
    pub line_ending: LineEnding,
}

impl Table {
    /// Split text into header and rows. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, LcaError> {
        let text = text.trim_start_matches('\u{feff}');
        let line_ending = LineEnding::detect(text);

        let mut lines = text
            .split(line_ending.as_str())
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches(['\r', '\n'])))
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header_line) = lines.next().ok_or(LcaError::MissingHeader)?;
        let separator = Separator::detect(header_line);
        let headers = split_record(header_line, separator);
        if headers.iter().all(String::is_empty) {
            return Err(LcaError::MissingHeader);
        }

        let rows = lines
            .map(|(line, raw)| Row {
                line,
                cells: split_record(raw, separator),
            })
            .collect();

        Ok(Self {
            headers,
            rows,
            separator,
            line_ending,
        })
    }
}
