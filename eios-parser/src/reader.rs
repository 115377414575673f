//! Recursive-descent reader for the JavaScript array literal the scheduler
//! passes to its client-side appointment builder.
//!
//! Only the subset the widget emits is understood: nested arrays, quoted
//! strings with JS escapes, integers, `new Date(..)` constructors and bare
//! identifiers. Object literals and other calls are kept as opaque text so a
//! record containing them still reads to the end.

use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Str(String),
    Int(i64),
    Date(Vec<i64>),
    Array(Vec<Value>),
    Opaque(String),
}

impl Value {
    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub(crate) fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

pub(crate) struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Byte offset just past the last value read.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn value(&mut self) -> Result<Value, SyntaxError> {
        self.skip_whitespace();

        match self.peek() {
            Some('[') => self.array(),
            Some(quote @ ('\'' | '"')) => self.string(quote).map(Value::Str),
            Some('{') => self.balanced('{', '}').map(Value::Opaque),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => self.word(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn array(&mut self) -> Result<Value, SyntaxError> {
        self.bump();
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                Some(',') => {
                    // elided element, e.g. `[1,,2]`
                    self.bump();
                    continue;
                }
                None => return Err(self.error("unterminated array")),
                _ => {}
            }

            items.push(self.value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.bump(),
                Some(']') => {}
                None => return Err(self.error("unterminated array")),
                Some(_) => return Err(self.error("expected `,` or `]`")),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        self.bump();
        let mut out = String::new();

        while let Some(c) = self.peek() {
            self.bump();

            if c == quote {
                return Ok(out);
            }

            if c != '\\' {
                out.push(c);
                continue;
            }

            let Some(escaped) = self.peek() else {
                break;
            };
            self.bump();

            match escaped {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'u' => out.push(self.unicode_escape()?),
                other => out.push(other),
            }
        }

        Err(self.error("unterminated string"))
    }

    fn unicode_escape(&mut self) -> Result<char, SyntaxError> {
        let digits = self
            .src
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.error("truncated unicode escape"))?;

        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| self.error("invalid unicode escape"))?;

        self.pos += 4;
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn number(&mut self) -> Result<Value, SyntaxError> {
        let start = self.pos;
        self.bump();

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-') {
                self.bump();
            } else {
                break;
            }
        }

        let raw = &self.src[start..self.pos];
        Ok(raw
            .parse::<i64>()
            .map_or_else(|_| Value::Opaque(raw.to_string()), Value::Int))
    }

    fn word(&mut self) -> Result<Value, SyntaxError> {
        let ident = self.identifier();

        if ident != "new" {
            self.skip_whitespace();
            if self.peek() == Some('(') {
                let args = self.balanced('(', ')')?;
                return Ok(Value::Opaque(format!("{ident}{args}")));
            }
            return Ok(Value::Opaque(ident.to_string()));
        }

        self.skip_whitespace();
        let constructor = self.identifier();
        self.skip_whitespace();

        if self.peek() != Some('(') {
            return Err(self.error("expected constructor arguments"));
        }

        if constructor != "Date" {
            let args = self.balanced('(', ')')?;
            return Ok(Value::Opaque(format!("new {constructor}{args}")));
        }

        self.bump();
        let mut parts = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(')') => {
                    self.bump();
                    return Ok(Value::Date(parts));
                }
                Some(',') => self.bump(),
                Some(_) => match self.value()? {
                    Value::Int(n) => parts.push(n),
                    _ => return Err(self.error("non-integer date component")),
                },
                None => return Err(self.error("unterminated date")),
            }
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }

        &self.src[start..self.pos]
    }

    /// Consumes a bracketed span, skipping over quoted text, and returns it verbatim.
    fn balanced(&mut self, open: char, close: char) -> Result<String, SyntaxError> {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(c) = self.peek() {
            match c {
                '\'' | '"' => {
                    self.string(c)?;
                    continue;
                }
                c if c == open => depth += 1,
                c if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        return Ok(self.src[start..self.pos].to_string());
                    }
                }
                _ => {}
            }
            self.bump();
        }

        Err(self.error("unbalanced brackets"))
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: &'static str) -> SyntaxError {
        SyntaxError {
            position: self.pos,
            message,
        }
    }
}

/// Removes one level of JS string escaping (`\\` and `\'`), which is how the
/// callback payload wraps the script that builds the appointments.
pub(crate) fn unescape_layer(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next @ ('\\' | '\'' | '"')) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_records() {
        let mut reader = Reader::new(r"[['12_0',2,['Title\r\nLine','9:00','10:30',null],[new Date(2024,5,4)]]] tail");
        let value = reader.value().unwrap();

        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 1);

        let record = records[0].as_array().unwrap();
        assert_eq!(record[0].as_str(), Some("12_0"));
        assert_eq!(record[1].as_int(), Some(2));
        assert_eq!(
            record[2].as_array().unwrap()[0].as_str(),
            Some("Title\r\nLine")
        );
        assert_eq!(
            record[3].as_array().unwrap()[0],
            Value::Date(vec![2024, 5, 4])
        );
        assert_eq!(reader.position(), reader.src.len() - " tail".len());
    }

    #[test]
    fn brackets_inside_strings_do_not_end_arrays() {
        let mut reader = Reader::new(r"['a ] b', 'c [ d', '\'quoted\'']");
        let value = reader.value().unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items[0].as_str(), Some("a ] b"));
        assert_eq!(items[1].as_str(), Some("c [ d"));
        assert_eq!(items[2].as_str(), Some("'quoted'"));
    }

    #[test]
    fn keeps_objects_and_calls_opaque() {
        let mut reader = Reader::new(r"[{'k':'v]'}, foo(1,')'), true, 1.5]");
        let items = reader.value().unwrap();
        let items = items.as_array().unwrap();
        assert_eq!(items[0], Value::Opaque("{'k':'v]'}".to_string()));
        assert_eq!(items[1], Value::Opaque("foo(1,')')".to_string()));
        assert_eq!(items[2], Value::Opaque("true".to_string()));
        assert_eq!(items[3], Value::Opaque("1.5".to_string()));
    }

    #[test]
    fn reports_truncated_input() {
        let err = Reader::new("[['1_0',2,['x'").value().unwrap_err();
        assert_eq!(err.message, "unterminated array");
    }

    #[test]
    fn unescapes_one_layer() {
        assert_eq!(
            unescape_layer(r"[\'1_0\',\'a\\r\\nb\']"),
            r"['1_0','a\r\nb']"
        );
    }
}
