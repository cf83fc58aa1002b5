//! Reader for solver data files.
//!
//! Covers the subset of the notation that plate data files use: scalar and
//! string assignments, 1-D and `[| .. |]` 2-D arrays, `++` concatenation,
//! integer ranges and comprehensions such as `["ctrl\(i)" | i in 1..8]`.
//! Identifiers on the right-hand side resolve to other assignments in the
//! same file, in any order.

use crate::domain::{
    ConcentrationToken, MaterialRole, MaterialSpec, MplaceError, MplaceResult, PlateDimensions,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

const MAX_REFERENCE_DEPTH: usize = 32;
const MAX_RANGE_LEN: i64 = 1_000_000;
const MAX_DOCUMENT_ELEMENTS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum DznValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<DznValue>),
    Array2d(Vec<Vec<DznValue>>),
}

impl DznValue {
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Array2d(_) => "2-D array",
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            _ => None,
        }
    }
}

/// Assignments of one data file in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DznDocument {
    assignments: IndexMap<String, DznValue>,
}

impl DznDocument {
    pub fn get(&self, name: &str) -> Option<&DznValue> {
        self.assignments.get(name)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assignments.keys().map(String::as_str)
    }

    fn require(&self, name: &str) -> MplaceResult<&DznValue> {
        self.get(name).ok_or_else(|| {
            MplaceError::schema(
                "INPUT.DZN_MISSING",
                format!("cannot find dzn parameter ({})", name),
            )
        })
    }

    pub fn int(&self, name: &str) -> MplaceResult<i64> {
        let value = self.require(name)?;
        value
            .as_int()
            .ok_or_else(|| unexpected_kind(name, "an int", value))
    }

    pub fn int_array(&self, name: &str) -> MplaceResult<Vec<i64>> {
        self.array(name)?
            .iter()
            .map(|item| {
                item.as_int()
                    .ok_or_else(|| unexpected_kind(name, "an array of int", item))
            })
            .collect()
    }

    pub fn string_array(&self, name: &str) -> MplaceResult<Vec<String>> {
        self.array(name)?
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| unexpected_kind(name, "an array of string", item))
            })
            .collect()
    }

    /// Rows of a 2-D array; an empty 1-D array reads as zero rows.
    pub fn matrix(&self, name: &str) -> MplaceResult<&[Vec<DznValue>]> {
        match self.require(name)? {
            DznValue::Array2d(rows) => Ok(rows),
            DznValue::Array(items) if items.is_empty() => Ok(&[]),
            other => Err(unexpected_kind(name, "a 2-D array", other)),
        }
    }

    fn array(&self, name: &str) -> MplaceResult<&[DznValue]> {
        match self.require(name)? {
            DznValue::Array(items) => Ok(items),
            DznValue::Array2d(rows) if rows.is_empty() => Ok(&[]),
            other => Err(unexpected_kind(name, "an array", other)),
        }
    }
}

fn unexpected_kind(name: &str, expected: &str, found: &DznValue) -> MplaceError {
    MplaceError::schema(
        "INPUT.DZN_VALUE",
        format!("expected {} but found {}", expected, found.kind_name()),
    )
    .with_context(name)
}

/// What the visualization needs from a data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DznSummary {
    pub rows: u32,
    pub cols: u32,
    pub control_names: Vec<String>,
}

impl DznSummary {
    pub fn dimensions(&self) -> MplaceResult<PlateDimensions> {
        PlateDimensions::new(self.rows, self.cols)
    }
}

pub fn parse_dzn(text: &str) -> MplaceResult<DznDocument> {
    let tokens = tokenize(text)?;
    let statements = StatementParser::new(tokens).parse()?;

    let mut evaluator = Evaluator::new(&statements);
    for name in statements.keys() {
        evaluator.resolve(name, &[], 0)?;
    }
    let mut resolved = evaluator.into_assignments();
    let assignments: IndexMap<String, DznValue> = statements
        .keys()
        .filter_map(|name| resolved.swap_remove(name).map(|value| (name.clone(), value)))
        .collect();

    debug!(assignments = assignments.len(), "parsed dzn document");
    Ok(DznDocument { assignments })
}

pub fn scan_dzn(text: &str) -> MplaceResult<DznSummary> {
    let document = parse_dzn(text)?;
    let rows = dimension(&document, "num_rows")?;
    let cols = dimension(&document, "num_cols")?;
    let control_names = document.string_array("control_names")?;

    info!(rows, cols, controls = control_names.len(), "scanned dzn file");
    Ok(DznSummary {
        rows,
        cols,
        control_names,
    })
}

fn dimension(document: &DznDocument, name: &str) -> MplaceResult<u32> {
    let value = document.require(name)?;
    value
        .as_int()
        .filter(|value| *value >= 1)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            MplaceError::schema(
                "INPUT.DZN_DIMENSIONS",
                format!("corrupt dzn file: {} must be a positive integer", name),
            )
            .with_context(name)
        })
}

/// Rebuilds the material specs of one role. Padding cells of the
/// concentration matrix are dropped using the per-material counts.
pub fn read_materials(document: &DznDocument, role: MaterialRole) -> MplaceResult<Vec<MaterialSpec>> {
    let prefix = role.dzn_prefix();
    let names_key = format!("{}_names", prefix);
    let replicates_key = format!("{}_replicates", prefix);
    let counts_key = format!("{}_concentrations", prefix);
    let matrix_key = format!("{}_concentration_names", prefix);

    let names = document.string_array(&names_key)?;
    let replicates = document.int_array(&replicates_key)?;
    let counts = document.int_array(&counts_key)?;
    let matrix = document.matrix(&matrix_key)?;

    if replicates.len() != names.len() || counts.len() != names.len() || matrix.len() != names.len()
    {
        return Err(MplaceError::schema(
            "INPUT.DZN_SHAPE",
            format!(
                "{} names, {} replicate counts, {} concentration counts and {} concentration rows do not line up",
                names.len(),
                replicates.len(),
                counts.len(),
                matrix.len()
            ),
        )
        .with_context(role.field_name()));
    }

    names
        .into_iter()
        .zip(replicates)
        .zip(counts)
        .zip(matrix)
        .map(|(((name, replicate_count), count), row)| {
            let replicate_count = u32::try_from(replicate_count)
                .ok()
                .filter(|count| *count >= 1)
                .ok_or_else(|| {
                    MplaceError::schema(
                        "INPUT.DZN_SHAPE",
                        format!("replicate count {} must be >= 1", replicate_count),
                    )
                    .with_context(name.clone())
                })?;
            let count = usize::try_from(count)
                .ok()
                .filter(|count| *count <= row.len())
                .ok_or_else(|| {
                    MplaceError::schema(
                        "INPUT.DZN_SHAPE",
                        format!(
                            "concentration count {} does not fit a row of {} cell(s)",
                            count,
                            row.len()
                        ),
                    )
                    .with_context(name.clone())
                })?;

            let concentrations = row[..count]
                .iter()
                .map(|cell| concentration_cell(&matrix_key, cell))
                .collect::<MplaceResult<Vec<_>>>()?;
            Ok(MaterialSpec::new(name, role, replicate_count, concentrations))
        })
        .collect()
}

fn concentration_cell(name: &str, cell: &DznValue) -> MplaceResult<ConcentrationToken> {
    match cell {
        DznValue::Str(text) => Ok(ConcentrationToken::label(text.as_str())),
        DznValue::Int(value) => Ok(ConcentrationToken::number(value.to_string(), *value as f64)),
        DznValue::Float(value) => Ok(ConcentrationToken::number(value.to_string(), *value)),
        other => Err(unexpected_kind(name, "a concentration", other)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StrPart {
    Text(String),
    Interpolate(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(Vec<StrPart>),
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Pipe,
    Comma,
    Semi,
    Equals,
    Concat,
    DotDot,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
struct Spanned {
    token: Token,
    line: usize,
}

fn syntax_error(line: usize, reason: impl std::fmt::Display) -> MplaceError {
    MplaceError::syntax("INPUT.DZN_SYNTAX", format!("line {}: {}", line, reason))
}

fn tokenize(text: &str) -> MplaceResult<Vec<Spanned>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while let Some(&ch) = chars.get(pos) {
        let next = chars.get(pos + 1).copied();
        let single = match ch {
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '|' => Some(Token::Pipe),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semi),
            '=' => Some(Token::Equals),
            '-' => Some(Token::Minus),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned { token, line });
            pos += 1;
            continue;
        }

        match ch {
            '\n' => {
                line += 1;
                pos += 1;
            }
            _ if ch.is_whitespace() => pos += 1,
            '%' => {
                while chars.get(pos).is_some_and(|ch| *ch != '\n') {
                    pos += 1;
                }
            }
            '/' if next == Some('*') => {
                let start_line = line;
                pos += 2;
                loop {
                    match chars.get(pos) {
                        None => return Err(syntax_error(start_line, "unterminated block comment")),
                        Some('*') if chars.get(pos + 1) == Some(&'/') => {
                            pos += 2;
                            break;
                        }
                        Some('\n') => line += 1,
                        Some(_) => {}
                    }
                    pos += 1;
                }
            }
            '+' if next == Some('+') => {
                tokens.push(Spanned {
                    token: Token::Concat,
                    line,
                });
                pos += 2;
            }
            '.' if next == Some('.') => {
                tokens.push(Spanned {
                    token: Token::DotDot,
                    line,
                });
                pos += 2;
            }
            '"' => {
                let (parts, end) = lex_string(&chars, pos + 1, line)?;
                tokens.push(Spanned {
                    token: Token::Str(parts),
                    line,
                });
                pos = end;
            }
            _ if ch.is_ascii_digit() => {
                let (token, end) = lex_number(&chars, pos, line)?;
                tokens.push(Spanned { token, line });
                pos = end;
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                let start = pos;
                while chars
                    .get(pos)
                    .is_some_and(|ch| ch.is_alphanumeric() || *ch == '_')
                {
                    pos += 1;
                }
                tokens.push(Spanned {
                    token: Token::Ident(chars[start..pos].iter().collect()),
                    line,
                });
            }
            _ => return Err(syntax_error(line, format!("unexpected character '{}'", ch))),
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &[char], mut pos: usize, line: usize) -> MplaceResult<(Vec<StrPart>, usize)> {
    let mut parts = Vec::new();
    let mut text = String::new();

    loop {
        match chars.get(pos) {
            None | Some('\n') => return Err(syntax_error(line, "unterminated string literal")),
            Some('"') => break,
            Some('\\') => {
                let escaped = chars.get(pos + 1).copied();
                match escaped {
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('(') => {
                        let close = chars[pos + 2..]
                            .iter()
                            .position(|ch| *ch == ')')
                            .ok_or_else(|| syntax_error(line, "unterminated '\\(' in string"))?;
                        let name: String = chars[pos + 2..pos + 2 + close].iter().collect();
                        let name = name.trim().to_string();
                        if name.is_empty() {
                            return Err(syntax_error(line, "empty '\\(...)' in string"));
                        }
                        if !text.is_empty() {
                            parts.push(StrPart::Text(std::mem::take(&mut text)));
                        }
                        parts.push(StrPart::Interpolate(name));
                        pos += close + 3;
                        continue;
                    }
                    _ => return Err(syntax_error(line, "unsupported escape in string literal")),
                }
                pos += 2;
                continue;
            }
            Some(ch) => text.push(*ch),
        }
        pos += 1;
    }

    if !text.is_empty() || parts.is_empty() {
        parts.push(StrPart::Text(text));
    }
    Ok((parts, pos + 1))
}

fn lex_number(chars: &[char], start: usize, line: usize) -> MplaceResult<(Token, usize)> {
    let mut pos = start;
    while chars.get(pos).is_some_and(char::is_ascii_digit) {
        pos += 1;
    }

    let mut is_float = false;
    // `1..8` is a range, not the float `1.`
    if chars.get(pos) == Some(&'.') && chars.get(pos + 1).is_some_and(char::is_ascii_digit) {
        is_float = true;
        pos += 1;
        while chars.get(pos).is_some_and(char::is_ascii_digit) {
            pos += 1;
        }
    }
    if matches!(chars.get(pos), Some('e' | 'E')) {
        let mut exponent = pos + 1;
        if matches!(chars.get(exponent), Some('+' | '-')) {
            exponent += 1;
        }
        if chars.get(exponent).is_some_and(char::is_ascii_digit) {
            is_float = true;
            pos = exponent;
            while chars.get(pos).is_some_and(char::is_ascii_digit) {
                pos += 1;
            }
        }
    }

    let lexeme: String = chars[start..pos].iter().collect();
    let token = if is_float {
        lexeme
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| syntax_error(line, format!("invalid float '{}'", lexeme)))?
    } else {
        lexeme
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| syntax_error(line, format!("integer '{}' is out of range", lexeme)))?
    };
    Ok((token, pos))
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<StrPart>),
    Ident(String),
    Array(Vec<Expr>),
    Array2d(Vec<Vec<Expr>>),
    Range(Box<Expr>, Box<Expr>),
    Comprehension {
        element: Box<Expr>,
        variable: String,
        domain: Box<Expr>,
    },
    Concat(Vec<Expr>),
}

struct StatementParser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl StatementParser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |spanned| spanned.line)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|spanned| spanned.token.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token, what: &str) -> MplaceResult<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax_error(self.line(), format!("expected {}", what)))
        }
    }

    fn parse(mut self) -> MplaceResult<IndexMap<String, Expr>> {
        let mut statements = IndexMap::new();
        while self.peek().is_some() {
            let line = self.line();
            let Some(Token::Ident(name)) = self.bump() else {
                return Err(syntax_error(line, "expected a parameter name"));
            };
            self.expect(&Token::Equals, "'=' after the parameter name")?;
            let value = self.parse_expr()?;
            match self.peek() {
                Some(Token::Semi) => self.pos += 1,
                None => {}
                Some(_) => return Err(syntax_error(self.line(), "expected ';'")),
            }

            if statements.contains_key(&name) {
                return Err(MplaceError::schema(
                    "INPUT.DZN_DUPLICATE",
                    format!("line {}: parameter '{}' is assigned twice", line, name),
                )
                .with_context(name));
            }
            statements.insert(name, value);
        }
        Ok(statements)
    }

    fn parse_expr(&mut self) -> MplaceResult<Expr> {
        let first = self.parse_operand()?;
        if self.peek() != Some(&Token::Concat) {
            return Ok(first);
        }

        let mut parts = vec![first];
        while self.peek() == Some(&Token::Concat) {
            self.pos += 1;
            parts.push(self.parse_operand()?);
        }
        Ok(Expr::Concat(parts))
    }

    fn parse_operand(&mut self) -> MplaceResult<Expr> {
        let start = self.parse_atom()?;
        if self.peek() == Some(&Token::DotDot) {
            self.pos += 1;
            let end = self.parse_atom()?;
            return Ok(Expr::Range(Box::new(start), Box::new(end)));
        }
        Ok(start)
    }

    fn parse_atom(&mut self) -> MplaceResult<Expr> {
        let line = self.line();
        match self.bump() {
            Some(Token::Int(value)) => Ok(Expr::Int(value)),
            Some(Token::Float(value)) => Ok(Expr::Float(value)),
            Some(Token::Minus) => match self.bump() {
                Some(Token::Int(value)) => Ok(Expr::Int(-value)),
                Some(Token::Float(value)) => Ok(Expr::Float(-value)),
                _ => Err(syntax_error(line, "expected a number after '-'")),
            },
            Some(Token::Str(parts)) => Ok(Expr::Str(parts)),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                _ => Expr::Ident(name),
            }),
            Some(Token::LBracket) if self.peek() == Some(&Token::Pipe) => {
                self.pos += 1;
                self.parse_matrix()
            }
            Some(Token::LBracket) => self.parse_array(),
            Some(Token::LBrace) => self.parse_set(),
            Some(_) => Err(syntax_error(line, "expected a value")),
            None => Err(syntax_error(line, "unexpected end of file")),
        }
    }

    fn parse_array(&mut self) -> MplaceResult<Expr> {
        if self.peek() == Some(&Token::RBracket) {
            self.pos += 1;
            return Ok(Expr::Array(Vec::new()));
        }

        let first = self.parse_expr()?;
        if self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            let line = self.line();
            let Some(Token::Ident(variable)) = self.bump() else {
                return Err(syntax_error(line, "expected a generator variable after '|'"));
            };
            match self.bump() {
                Some(Token::Ident(keyword)) if keyword == "in" => {}
                _ => return Err(syntax_error(line, "expected 'in' in the generator")),
            }
            let domain = self.parse_operand()?;
            self.expect(&Token::RBracket, "']' closing the comprehension")?;
            return Ok(Expr::Comprehension {
                element: Box::new(first),
                variable,
                domain: Box::new(domain),
            });
        }

        let mut items = vec![first];
        self.parse_items_until(&Token::RBracket, &mut items)?;
        Ok(Expr::Array(items))
    }

    fn parse_set(&mut self) -> MplaceResult<Expr> {
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBrace) {
            self.pos += 1;
            return Ok(Expr::Array(items));
        }
        items.push(self.parse_expr()?);
        self.parse_items_until(&Token::RBrace, &mut items)?;
        Ok(Expr::Array(items))
    }

    /// Continues a comma list after its first item up to and including `close`.
    fn parse_items_until(&mut self, close: &Token, items: &mut Vec<Expr>) -> MplaceResult<()> {
        loop {
            match self.peek() {
                Some(token) if token == close => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(Token::Comma) => {
                    self.pos += 1;
                    if self.peek() == Some(close) {
                        continue;
                    }
                    items.push(self.parse_expr()?);
                }
                _ => return Err(syntax_error(self.line(), "expected ',' or a closing bracket")),
            }
        }
    }

    fn parse_matrix(&mut self) -> MplaceResult<Expr> {
        let mut rows = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.pos += 1;
            return Ok(Expr::Array2d(rows));
        }

        let mut row = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Pipe) => {
                    self.pos += 1;
                    rows.push(std::mem::take(&mut row));
                    if self.peek() == Some(&Token::RBracket) {
                        self.pos += 1;
                        return Ok(Expr::Array2d(rows));
                    }
                }
                Some(Token::Comma) if !row.is_empty() => self.pos += 1,
                Some(_) => row.push(self.parse_expr()?),
                None => return Err(syntax_error(self.line(), "unterminated 2-D array")),
            }
        }
    }
}

/// Resolves every assignment at most once. Values already produced are
/// reused by later references, and every element the document builds counts
/// against one shared budget.
struct Evaluator<'a> {
    statements: &'a IndexMap<String, Expr>,
    resolved: IndexMap<String, DznValue>,
    in_progress: HashSet<String>,
    elements: usize,
}

impl<'a> Evaluator<'a> {
    fn new(statements: &'a IndexMap<String, Expr>) -> Self {
        Self {
            statements,
            resolved: IndexMap::with_capacity(statements.len()),
            in_progress: HashSet::new(),
            elements: 0,
        }
    }

    fn into_assignments(self) -> IndexMap<String, DznValue> {
        self.resolved
    }

    fn resolve(
        &mut self,
        name: &str,
        locals: &[(String, i64)],
        depth: usize,
    ) -> MplaceResult<DznValue> {
        if let Some((_, value)) = locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(DznValue::Int(*value));
        }
        if let Some(value) = self.resolved.get(name) {
            let value = value.clone();
            self.charge(element_count(&value))?;
            return Ok(value);
        }
        if self.in_progress.contains(name) {
            return Err(MplaceError::schema(
                "INPUT.DZN_VALUE",
                "references form a cycle",
            )
            .with_context(name));
        }
        if depth > MAX_REFERENCE_DEPTH {
            return Err(MplaceError::schema(
                "INPUT.DZN_VALUE",
                "references nest too deeply",
            )
            .with_context(name));
        }
        let statements = self.statements;
        let expr = statements.get(name).ok_or_else(|| {
            MplaceError::schema(
                "INPUT.DZN_VALUE",
                format!("'{}' is referenced but never assigned", name),
            )
            .with_context(name)
        })?;

        self.in_progress.insert(name.to_string());
        let value = self.eval(expr, &[], depth + 1).map_err(|error| {
            if error.context().is_some() {
                error
            } else {
                error.with_context(name)
            }
        })?;
        self.in_progress.remove(name);
        self.resolved.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn charge(&mut self, count: usize) -> MplaceResult<()> {
        self.elements = self.elements.saturating_add(count);
        if self.elements > MAX_DOCUMENT_ELEMENTS {
            return Err(MplaceError::schema(
                "INPUT.DZN_VALUE",
                format!(
                    "data file expands to more than {} array elements",
                    MAX_DOCUMENT_ELEMENTS
                ),
            ));
        }
        Ok(())
    }

    fn eval(
        &mut self,
        expr: &Expr,
        locals: &[(String, i64)],
        depth: usize,
    ) -> MplaceResult<DznValue> {
        match expr {
            Expr::Bool(value) => Ok(DznValue::Bool(*value)),
            Expr::Int(value) => Ok(DznValue::Int(*value)),
            Expr::Float(value) => Ok(DznValue::Float(*value)),
            Expr::Ident(name) => self.resolve(name, locals, depth),
            Expr::Str(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        StrPart::Text(fragment) => text.push_str(fragment),
                        StrPart::Interpolate(name) => {
                            match self.resolve(name, locals, depth)? {
                                DznValue::Int(value) => text.push_str(&value.to_string()),
                                DznValue::Float(value) => text.push_str(&value.to_string()),
                                DznValue::Bool(value) => text.push_str(&value.to_string()),
                                DznValue::Str(value) => text.push_str(&value),
                                other => return Err(unexpected_kind(name, "a scalar", &other)),
                            }
                        }
                    }
                }
                Ok(DznValue::Str(text))
            }
            Expr::Array(items) => {
                self.charge(items.len())?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, locals, depth)?);
                }
                Ok(DznValue::Array(values))
            }
            Expr::Array2d(rows) => {
                let mut values = Vec::with_capacity(rows.len());
                for row in rows {
                    self.charge(row.len())?;
                    let mut cells = Vec::with_capacity(row.len());
                    for item in row {
                        cells.push(self.eval(item, locals, depth)?);
                    }
                    values.push(cells);
                }
                Ok(DznValue::Array2d(values))
            }
            Expr::Range(start, end) => {
                let (start, end) = self.bounds(start, end, locals, depth)?;
                self.charge(range_len(start, end))?;
                Ok(DznValue::Array((start..=end).map(DznValue::Int).collect()))
            }
            Expr::Comprehension {
                element,
                variable,
                domain,
            } => {
                let Expr::Range(start, end) = domain.as_ref() else {
                    return Err(MplaceError::schema(
                        "INPUT.DZN_VALUE",
                        "generators must range over 'a..b'",
                    ));
                };
                let (start, end) = self.bounds(start, end, locals, depth)?;
                self.charge(range_len(start, end))?;
                let mut scope = locals.to_vec();
                let mut items = Vec::new();
                for index in start..=end {
                    scope.push((variable.clone(), index));
                    items.push(self.eval(element, &scope, depth)?);
                    scope.pop();
                }
                Ok(DznValue::Array(items))
            }
            Expr::Concat(parts) => {
                let mut items = Vec::new();
                for part in parts {
                    match self.eval(part, locals, depth)? {
                        DznValue::Array(values) => {
                            self.charge(values.len())?;
                            items.extend(values);
                        }
                        other => {
                            return Err(MplaceError::schema(
                                "INPUT.DZN_VALUE",
                                format!("'++' expects arrays but found {}", other.kind_name()),
                            ));
                        }
                    }
                }
                Ok(DznValue::Array(items))
            }
        }
    }

    fn bounds(
        &mut self,
        start: &Expr,
        end: &Expr,
        locals: &[(String, i64)],
        depth: usize,
    ) -> MplaceResult<(i64, i64)> {
        let start = self.bound(start, locals, depth)?;
        let end = self.bound(end, locals, depth)?;
        if end.saturating_sub(start) >= MAX_RANGE_LEN {
            return Err(MplaceError::schema(
                "INPUT.DZN_VALUE",
                format!("range {}..{} is too large", start, end),
            ));
        }
        Ok((start, end))
    }

    fn bound(&mut self, expr: &Expr, locals: &[(String, i64)], depth: usize) -> MplaceResult<i64> {
        match self.eval(expr, locals, depth)? {
            DznValue::Int(value) => Ok(value),
            other => Err(MplaceError::schema(
                "INPUT.DZN_VALUE",
                format!("range bounds must be int but found {}", other.kind_name()),
            )),
        }
    }
}

fn range_len(start: i64, end: i64) -> usize {
    usize::try_from(end.saturating_sub(start).saturating_add(1)).unwrap_or(0)
}

/// Scalars count as one element, arrays as the sum of their cells.
fn element_count(value: &DznValue) -> usize {
    match value {
        DznValue::Array(items) => items.iter().map(element_count).sum(),
        DznValue::Array2d(rows) => rows.iter().flatten().map(element_count).sum(),
        _ => 1,
    }
}
