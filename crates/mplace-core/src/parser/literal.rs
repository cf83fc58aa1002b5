//! Reader for the material literal notation, e.g.
//! `{'Drug1': [5, '0.1', '0.3'], 'Drug2': [10, '1']}`.
//!
//! The grammar is closed: quoted strings, integer and float literals,
//! `[...]` sequences and `{...}` mappings with string keys. Nothing in the
//! input is ever evaluated; identifiers, calls, operators and tuples are
//! rejected outright, and the first error aborts the whole parse.

use crate::domain::{MplaceError, ParserResult};

const MAX_NESTING_DEPTH: usize = 64;
const FRAGMENT_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Str(String),
    Int { value: i64, text: String },
    Float { value: f64, text: String },
    List(Vec<LiteralValue>),
    /// Entries in source order; duplicate keys are kept for the validator.
    Map(Vec<(String, LiteralValue)>),
}

impl LiteralValue {
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int { .. } => "integer",
            Self::Float { .. } => "float",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
        }
    }

    /// Source spelling of a numeric literal.
    pub fn number_text(&self) -> Option<&str> {
        match self {
            Self::Int { text, .. } | Self::Float { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[LiteralValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(String, LiteralValue)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short rendering for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Str(text) => format!("'{}'", text),
            Self::Int { text, .. } | Self::Float { text, .. } => text.clone(),
            Self::List(items) => format!("a list of {} item(s)", items.len()),
            Self::Map(entries) => format!("a mapping of {} entr(ies)", entries.len()),
        }
    }
}

pub fn parse_literal(source: &str) -> ParserResult<LiteralValue> {
    let mut parser = LiteralParser::new(source);
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(parser.error("expected a value but the input is empty"));
    }

    let value = parser.parse_value(0)?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error("unexpected input after the closing value"));
    }
    Ok(value)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> MplaceError {
        self.error_at(self.pos, reason)
    }

    fn error_at(&self, position: usize, reason: &str) -> MplaceError {
        let fragment: String = self
            .chars
            .iter()
            .skip(position)
            .take(FRAGMENT_LEN)
            .collect();
        let message = if fragment.is_empty() {
            format!("{} at offset {} (end of input)", reason, position)
        } else {
            format!("{} at offset {} near '{}'", reason, position, fragment)
        };
        MplaceError::syntax("INPUT.LITERAL_SYNTAX", message)
    }

    fn parse_value(&mut self, depth: usize) -> ParserResult<LiteralValue> {
        if depth > MAX_NESTING_DEPTH {
            return Err(self.error("nesting is deeper than 64 levels"));
        }

        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('{') => self.parse_map(depth),
            Some('[') => self.parse_list(depth),
            Some('\'' | '"') => self.parse_string().map(LiteralValue::Str),
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => {
                self.parse_number()
            }
            Some('(') => Err(self.error("tuples are not supported; use [...]")),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                Err(self.error("bare identifiers are not allowed; quote strings"))
            }
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn parse_list(&mut self, depth: usize) -> ParserResult<LiteralValue> {
        let open = self.pos;
        self.bump();
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error_at(open, "unbalanced '['")),
                Some(']') => {
                    self.bump();
                    return Ok(LiteralValue::List(items));
                }
                Some(_) => {}
            }

            items.push(self.parse_value(depth + 1)?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    return Ok(LiteralValue::List(items));
                }
                None => return Err(self.error_at(open, "unbalanced '['")),
                Some(_) => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_map(&mut self, depth: usize) -> ParserResult<LiteralValue> {
        let open = self.pos;
        self.bump();
        let mut entries = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error_at(open, "unbalanced '{'")),
                Some('}') => {
                    self.bump();
                    return Ok(LiteralValue::Map(entries));
                }
                Some('\'' | '"') => {}
                Some(_) => return Err(self.error("mapping keys must be quoted strings")),
            }

            let key = self.parse_string()?;
            self.skip_whitespace();
            if self.peek() != Some(':') {
                return Err(self.error("expected ':' after mapping key"));
            }
            self.bump();
            self.skip_whitespace();
            let value = self.parse_value(depth + 1)?;
            entries.push((key, value));

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    return Ok(LiteralValue::Map(entries));
                }
                None => return Err(self.error_at(open, "unbalanced '{'")),
                Some(_) => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_string(&mut self) -> ParserResult<String> {
        let open = self.pos;
        let Some(quote) = self.bump() else {
            return Err(self.error("expected a string"));
        };
        let mut text = String::new();

        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error_at(open, "unterminated string")),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        None => return Err(self.error_at(open, "unterminated string")),
                        Some(_) => {
                            return Err(self.error_at(self.pos - 2, "unsupported escape sequence"));
                        }
                    };
                    text.push(escaped);
                }
                Some(ch) if ch == quote => return Ok(text),
                Some(ch) => text.push(ch),
            }
        }
    }

    fn parse_number(&mut self) -> ParserResult<LiteralValue> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }

        let integer_digits = self.consume_digits();
        let mut is_float = false;
        let mut fraction_digits = 0;
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            fraction_digits = self.consume_digits();
        }
        if integer_digits == 0 && fraction_digits == 0 {
            return Err(self.error_at(start, "malformed number"));
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('-' | '+')) {
                self.bump();
            }
            if self.consume_digits() == 0 {
                return Err(self.error_at(start, "malformed exponent"));
            }
        }

        if self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
        {
            return Err(self.error_at(start, "malformed number"));
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            match text.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(LiteralValue::Float { value, text }),
                _ => Err(self.error_at(start, "number is out of range")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(LiteralValue::Int { value, text }),
                Err(_) => Err(self.error_at(start, "integer is out of range")),
            }
        }
    }

    fn consume_digits(&mut self) -> usize {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }
}
