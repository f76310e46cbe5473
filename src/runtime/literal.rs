//! Whitelisted literal parser for stringified caller data.
//!
//! Callers frequently send structured values as strings (`"[1, 2, 3]"`,
//! `"{'north': 10}"`). This parser recognises a fixed literal grammar and
//! nothing else; no input is ever evaluated.
//!
//! ```text
//! value  := dict | list | tuple | string | number | bool | none
//! dict   := '{' [ value ':' value { ',' value ':' value } [','] ] '}'
//! list   := '[' [ value { ',' value } [','] ] ']'
//! tuple  := '(' [ value ',' { value ',' } [ value ] ] ')'   -- "(v)" is grouping
//! string := '\'' ... '\'' | '"' ... '"'
//! bool   := True | False | true | false
//! none   := None | null | nil
//! ```

use serde_json::{Map, Number, Value};

/// Deepest collection nesting accepted, the same bound serde_json applies
pub const MAX_DEPTH: usize = 128;

/// A parsed literal
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

/// Why a literal could not be used
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralError {
    /// Not a literal under the grammar
    Syntax(String),
    /// A mapping key that cannot become a name, e.g. a tuple
    UnsupportedKey(&'static str),
    /// Collections nested deeper than `MAX_DEPTH`
    TooDeep,
}

impl Literal {
    pub fn is_collection(&self) -> bool {
        matches!(self, Literal::List(_) | Literal::Tuple(_) | Literal::Dict(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::None => "none",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "str",
            Literal::List(_) => "list",
            Literal::Tuple(_) => "tuple",
            Literal::Dict(_) => "dict",
        }
    }

    /// Convert to JSON; tuples become arrays and scalar keys become strings
    pub fn into_json(self) -> Result<Value, LiteralError> {
        Ok(match self {
            Literal::None => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::Number(i.into()),
            Literal::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            Literal::Str(s) => Value::String(s),
            Literal::List(items) | Literal::Tuple(items) => Value::Array(
                items
                    .into_iter()
                    .map(Literal::into_json)
                    .collect::<Result<_, _>>()?,
            ),
            Literal::Dict(pairs) => {
                let mut map = Map::with_capacity(pairs.len());
                for (key, value) in pairs {
                    map.insert(key.into_key()?, value.into_json()?);
                }
                Value::Object(map)
            }
        })
    }

    fn into_key(self) -> Result<String, LiteralError> {
        match self {
            Literal::Str(s) => Ok(s),
            Literal::Int(i) => Ok(i.to_string()),
            Literal::Float(f) => Ok(f.to_string()),
            Literal::Bool(b) => Ok(b.to_string()),
            other => Err(LiteralError::UnsupportedKey(other.type_name())),
        }
    }
}

/// Parse `input` as a single literal
pub fn parse(input: &str) -> Result<Literal, LiteralError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn error(&self, what: &str) -> LiteralError {
        LiteralError::Syntax(format!("{what} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        self.skip_ws();
        if !matches!(self.peek(), Some('{' | '[' | '(')) {
            return self.scalar();
        }
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        let value = self.collection();
        self.depth -= 1;
        value
    }

    fn collection(&mut self) -> Result<Literal, LiteralError> {
        match self.peek() {
            Some('{') => self.dict(),
            Some('[') => {
                self.pos += 1;
                let (items, _) = self.items(']')?;
                Ok(Literal::List(items))
            }
            Some('(') => {
                self.pos += 1;
                let (mut items, trailing_comma) = self.items(')')?;
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Literal::Tuple(items))
                }
            }
            _ => Err(self.error("expected a collection")),
        }
    }

    fn scalar(&mut self) -> Result<Literal, LiteralError> {
        match self.peek() {
            Some(q @ ('\'' | '"')) => self.string(q),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => self.keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    /// Comma-separated values up to `close`; reports whether a comma preceded it
    fn items(&mut self, close: char) -> Result<(Vec<Literal>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat(close) {
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            trailing_comma = self.eat(',');
            if !trailing_comma {
                if self.eat(close) {
                    return Ok((items, false));
                }
                return Err(self.error("expected ',' or closing bracket"));
            }
        }
    }

    fn dict(&mut self) -> Result<Literal, LiteralError> {
        self.pos += 1;
        let mut pairs = Vec::new();
        loop {
            if self.eat('}') {
                return Ok(Literal::Dict(pairs));
            }
            let key = self.value()?;
            if !self.eat(':') {
                return Err(self.error("expected ':'"));
            }
            let value = self.value()?;
            pairs.push((key, value));
            if !self.eat(',') {
                if self.eat('}') {
                    return Ok(Literal::Dict(pairs));
                }
                return Err(self.error("expected ',' or '}'"));
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<Literal, LiteralError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error("unterminated string"))?;
            self.pos += 1;
            match c {
                c if c == quote => return Ok(Literal::Str(out)),
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Literal::Int(i));
        }
        text.parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| LiteralError::Syntax(format!("invalid number {text:?}")))
    }

    fn keyword(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" | "true" => Ok(Literal::Bool(true)),
            "False" | "false" => Ok(Literal::Bool(false)),
            "None" | "null" | "nil" => Ok(Literal::None),
            _ => Err(LiteralError::Syntax(format!("names are not literals: {word}"))),
        }
    }
}
