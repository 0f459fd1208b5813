//! Streaming dialect: table-level window clauses.
//!
//! ```text
//! SELECT word, COUNT(*) FROM words OVER (WINDOW '30' SECONDS, SLIDE '10' SECONDS) GROUP BY word
//! ```
//!
//! The clause binds to the relation name (or alias) written right before `OVER`.
//! Scanning strips every clause and hands back the remaining text, which is plain
//! generic SQL. Text without any such clause is not streaming-specific and is
//! reported as [`StreamParse::NotApplicable`].

use stq_common::ParseError;

/// One `OVER (WINDOW ..)` clause found in query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamWindowClause {
    /// Visible name (alias or last name segment) of the windowed relation.
    pub relation: String,
    pub size_ms: u64,
    /// Equals `size_ms` when no `SLIDE` is given (tumbling window).
    pub slide_ms: u64,
}

/// Outcome of running the streaming dialect over query text.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamParse {
    /// Text uses streaming syntax; `sql` is the text with the clauses removed.
    Recognized {
        sql: String,
        windows: Vec<StreamWindowClause>,
    },
    /// Nothing streaming-specific in the text.
    NotApplicable,
    /// Streaming syntax was found but is malformed.
    Malformed(ParseError),
}

/// Scan `sql` for stream window clauses.
pub fn scan_stream_windows(sql: &str) -> StreamParse {
    let mut scanner = Scanner::new(sql);
    match scanner.run() {
        Ok(()) if scanner.clauses.is_empty() => StreamParse::NotApplicable,
        Ok(()) => StreamParse::Recognized {
            sql: scanner.stripped(),
            windows: scanner.clauses.into_iter().map(|(c, _)| c).collect(),
        },
        Err(e) => StreamParse::Malformed(e),
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    clauses: Vec<(StreamWindowClause, (usize, usize))>,
}

impl Scanner {
    fn new(sql: &str) -> Self {
        Self {
            chars: sql.chars().collect(),
            pos: 0,
            clauses: vec![],
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            match c {
                '\'' => self.skip_quoted('\''),
                '"' => self.skip_quoted('"'),
                '`' => self.skip_quoted('`'),
                '-' if self.peek_at(1) == Some('-') => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                c if is_ident_start(c) => {
                    let start = self.pos;
                    let word = self.read_word();
                    if word.eq_ignore_ascii_case("OVER") && self.window_follows() {
                        self.window_clause(start)?;
                    }
                }
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    /// `OVER` opens a stream clause only when followed by `( WINDOW`; otherwise it
    /// belongs to a window function and is left alone.
    fn window_follows(&self) -> bool {
        let mut i = self.skip_ws_from(self.pos);
        if self.chars.get(i) != Some(&'(') {
            return false;
        }
        i = self.skip_ws_from(i + 1);
        let end = self.word_end_from(i);
        end > i && word_eq(&self.chars[i..end], "WINDOW")
    }

    fn window_clause(&mut self, over_start: usize) -> Result<(), ParseError> {
        let relation = self.relation_before(over_start)?;
        self.skip_ws();
        self.expect_char('(')?;
        self.skip_ws();
        self.read_word();
        let size_ms = self.duration("WINDOW")?;
        self.skip_ws();
        let slide_ms = if self.peek() == Some(',') {
            self.pos += 1;
            self.skip_ws();
            let kw = self.read_word();
            if !kw.eq_ignore_ascii_case("SLIDE") {
                return Err(self.error(&format!("expected SLIDE, found '{kw}'")));
            }
            let slide = self.duration("SLIDE")?;
            self.skip_ws();
            slide
        } else {
            size_ms
        };
        self.expect_char(')')?;

        if self.clauses.iter().any(|(c, _)| c.relation == relation) {
            return Err(self.error(&format!(
                "relation '{relation}' has more than one stream window"
            )));
        }
        self.clauses.push((
            StreamWindowClause {
                relation,
                size_ms,
                slide_ms,
            },
            (over_start, self.pos),
        ));
        Ok(())
    }

    fn relation_before(&self, over_start: usize) -> Result<String, ParseError> {
        let mut end = over_start;
        while end > 0 && self.chars[end - 1].is_whitespace() {
            end -= 1;
        }
        if end == 0 {
            return Err(self.error_at(over_start, "stream window must follow a relation"));
        }
        let last = self.chars[end - 1];
        let ident: String = if last == '"' || last == '`' {
            let mut start = end - 1;
            while start > 0 && self.chars[start - 1] != last {
                start -= 1;
            }
            if start == 0 {
                return Err(self.error_at(over_start, "unterminated quoted relation name"));
            }
            self.chars[start..end - 1].iter().collect()
        } else {
            let mut start = end;
            while start > 0 && is_ident_part(self.chars[start - 1]) {
                start -= 1;
            }
            self.chars[start..end].iter().collect()
        };
        if ident.is_empty() {
            return Err(self.error_at(over_start, "stream window must follow a relation"));
        }
        Ok(ident)
    }

    fn duration(&mut self, clause: &str) -> Result<u64, ParseError> {
        self.skip_ws();
        let quoted = self.peek() == Some('\'');
        if quoted {
            self.pos += 1;
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(&format!("expected {clause} length")));
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        if quoted {
            self.expect_char('\'')?;
        }
        self.skip_ws();
        let unit = self.read_word();
        let scale = unit_millis(&unit)
            .ok_or_else(|| self.error(&format!("unknown time unit '{unit}' in {clause}")))?;
        digits
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(scale))
            .ok_or_else(|| self.error(&format!("{clause} length out of range")))
    }

    fn stripped(&self) -> String {
        let mut out = String::with_capacity(self.chars.len());
        let mut i = 0;
        for (_, (start, end)) in &self.clauses {
            out.extend(&self.chars[i..*start]);
            out.push(' ');
            i = *end;
        }
        out.extend(&self.chars[i..]);
        out
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        self.pos = self.skip_ws_from(self.pos);
    }

    fn skip_ws_from(&self, mut i: usize) -> usize {
        while matches!(self.chars.get(i), Some(c) if c.is_whitespace()) {
            i += 1;
        }
        i
    }

    fn word_end_from(&self, mut i: usize) -> usize {
        if !matches!(self.chars.get(i), Some(c) if is_ident_start(*c)) {
            return i;
        }
        while matches!(self.chars.get(i), Some(c) if is_ident_part(*c)) {
            i += 1;
        }
        i
    }

    fn read_word(&mut self) -> String {
        let end = self.word_end_from(self.pos);
        let w = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        w
    }

    fn expect_char(&mut self, want: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == want => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(&format!("expected '{want}', found '{c}'"))),
            None => Err(self.error(&format!("expected '{want}', found end of input"))),
        }
    }

    // '' inside a string literal is an escaped quote
    fn skip_quoted(&mut self, quote: char) {
        self.pos += 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == quote {
                if self.peek() == Some(quote) {
                    self.pos += 1;
                } else {
                    return;
                }
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\n' {
                return;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.chars.len() {
            if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn error(&self, msg: &str) -> ParseError {
        self.error_at(self.pos, msg)
    }

    fn error_at(&self, idx: usize, msg: &str) -> ParseError {
        let before = &self.chars[..idx.min(self.chars.len())];
        let line = before.iter().filter(|c| **c == '\n').count() + 1;
        let column = before.iter().rev().take_while(|c| **c != '\n').count() + 1;
        ParseError::new(format!("{msg} at Line: {line}, Column: {column}"))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn word_eq(chars: &[char], word: &str) -> bool {
    chars.len() == word.len()
        && chars
            .iter()
            .zip(word.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b))
}

fn unit_millis(unit: &str) -> Option<u64> {
    Some(match unit.to_ascii_uppercase().as_str() {
        "MILLISECOND" | "MILLISECONDS" => 1,
        "SECOND" | "SECONDS" => 1_000,
        "MINUTE" | "MINUTES" => 60_000,
        "HOUR" | "HOURS" => 3_600_000,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognized(sql: &str) -> (String, Vec<StreamWindowClause>) {
        match scan_stream_windows(sql) {
            StreamParse::Recognized { sql, windows } => (sql, windows),
            other => panic!("expected recognized stream SQL, got {other:?}"),
        }
    }

    #[test]
    fn plain_sql_is_not_applicable() {
        assert_eq!(
            scan_stream_windows("SELECT a FROM t WHERE a > 1"),
            StreamParse::NotApplicable
        );
    }

    #[test]
    fn window_function_over_is_not_a_stream_clause() {
        assert_eq!(
            scan_stream_windows("SELECT ROW_NUMBER() OVER (PARTITION BY a) FROM t"),
            StreamParse::NotApplicable
        );
    }

    #[test]
    fn strips_window_and_slide() {
        let (sql, windows) = recognized(
            "SELECT word, COUNT(*) FROM words OVER (WINDOW '30' SECONDS, SLIDE '10' SECONDS) GROUP BY word",
        );
        assert_eq!(
            sql,
            "SELECT word, COUNT(*) FROM words   GROUP BY word"
        );
        assert_eq!(
            windows,
            vec![StreamWindowClause {
                relation: "words".to_string(),
                size_ms: 30_000,
                slide_ms: 10_000,
            }]
        );
    }

    #[test]
    fn tumbling_window_uses_size_as_slide_and_binds_alias() {
        let (_sql, windows) =
            recognized("select * from clicks AS c over (window 2 minutes) where c.x = 1");
        assert_eq!(windows[0].relation, "c");
        assert_eq!(windows[0].size_ms, 120_000);
        assert_eq!(windows[0].slide_ms, 120_000);
    }

    #[test]
    fn keywords_inside_literals_and_comments_are_ignored() {
        let sql = "SELECT 'OVER (WINDOW 1 SECONDS)' FROM t -- OVER (WINDOW 1 SECONDS)\n";
        assert_eq!(scan_stream_windows(sql), StreamParse::NotApplicable);
    }

    #[test]
    fn bad_unit_is_malformed_with_position() {
        match scan_stream_windows("SELECT a FROM t OVER (WINDOW 5 FORTNIGHTS)") {
            StreamParse::Malformed(e) => {
                assert!(e.message.contains("unknown time unit"), "{e}");
                assert!(e.position.is_some());
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn window_without_relation_is_malformed() {
        assert!(matches!(
            scan_stream_windows("SELECT COUNT(a) OVER (WINDOW 5 SECONDS) FROM t"),
            StreamParse::Malformed(_)
        ));
    }

    #[test]
    fn duplicate_window_on_one_relation_is_malformed() {
        assert!(matches!(
            scan_stream_windows(
                "SELECT * FROM a OVER (WINDOW 1 SECONDS) JOIN a OVER (WINDOW 2 SECONDS) ON a.x = a.x"
            ),
            StreamParse::Malformed(_)
        ));
    }
}
