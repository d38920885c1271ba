use std::collections::VecDeque;

use logos::Logos;

use crate::{error::SchemeError, value::Value};

#[derive(Debug, Logos)]
#[logos(skip r"([ \t\r\n\f]+|;[^\n]*)")]
enum Token<'a> {
    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("'")]
    Quote,

    #[token("`")]
    Quasiquote,

    #[token(",")]
    Unquote,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    Str(&'a str),

    #[regex(r#"[^ \t\r\n\f()'`,";]+"#, |lex| lex.slice())]
    Literal(&'a str),
}

/// A token that owns its text, so lines can be dropped once tokenized.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    LeftParen,
    RightParen,
    Dot,
    Quote,
    Quasiquote,
    Unquote,
    Atom(Value),
}

type ParseResult<O> = Result<O, SchemeError>;

fn unescape(quoted: &str) -> ParseResult<Value> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some(escaped @ ('"' | '\\')) => text.push(escaped),
            other => {
                return Err(SchemeError::SyntaxError(format!(
                    "invalid escape sequence in string: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(Value::string(&text))
}

fn literal(text: &str) -> Lexeme {
    let value = match text {
        "." => return Lexeme::Dot,
        "#t" | "true" => Value::Boolean(true),
        "#f" | "false" => Value::Boolean(false),
        "nil" => Value::Nil,
        _ => {
            if let Ok(integer) = text.parse::<i64>() {
                Value::Integer(integer)
            } else if let Some(float) = parse_float(text) {
                Value::Float(float)
            } else {
                Value::symbol(&text.to_lowercase())
            }
        }
    };
    Lexeme::Atom(value)
}

// Rust accepts "inf" and "NaN" as floats; Scheme source does not. Literals
// too large for a finite float stay symbols.
fn parse_float(text: &str) -> Option<f64> {
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
        return None;
    }
    text.parse().ok().filter(|float: &f64| float.is_finite())
}

/// Splits one line of source into lexemes.
pub fn tokenize_line(line: &str) -> ParseResult<Vec<Lexeme>> {
    let mut lexemes = vec![];
    let mut tokenizer = Token::lexer(line);

    while let Some(result) = tokenizer.next() {
        let lexeme = match result {
            Ok(Token::LeftParen) => Lexeme::LeftParen,
            Ok(Token::RightParen) => Lexeme::RightParen,
            Ok(Token::Quote) => Lexeme::Quote,
            Ok(Token::Quasiquote) => Lexeme::Quasiquote,
            Ok(Token::Unquote) => Lexeme::Unquote,
            Ok(Token::Str(quoted)) => Lexeme::Atom(unescape(quoted)?),
            Ok(Token::Literal(text)) => literal(text),
            Err(_) => {
                return Err(SchemeError::SyntaxError(format!(
                    "invalid token: {}",
                    tokenizer.slice()
                )))
            }
        };
        lexemes.push(lexeme);
    }

    Ok(lexemes)
}

/// Lexemes from a source of lines, pulled one line at a time.
///
/// A new line is only requested when the current one is used up and the
/// reader still needs a token, so an interactive source is never asked for
/// more input than the expression being read requires.
pub struct Buffer<'a> {
    source: Box<dyn Iterator<Item = String> + 'a>,
    current_line: VecDeque<Lexeme>,
    started: bool,
}

impl<'a> Buffer<'a> {
    pub fn new(source: impl Iterator<Item = String> + 'a) -> Self {
        Self {
            source: Box::new(source),
            current_line: VecDeque::new(),
            started: false,
        }
    }

    fn advance_line(&mut self) -> ParseResult<bool> {
        self.started = true;
        match self.source.next() {
            Some(line) => {
                self.current_line = tokenize_line(&line)?.into();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether lexemes remain on the current line. The first call loads the
    /// first line; later calls never pull new lines.
    pub fn more_on_line(&mut self) -> ParseResult<bool> {
        if !self.started {
            self.advance_line()?;
        }
        Ok(!self.current_line.is_empty())
    }

    /// The next lexeme, pulling new lines as needed. `None` at end of input.
    pub fn current(&mut self) -> ParseResult<Option<&Lexeme>> {
        while self.current_line.is_empty() {
            if !self.advance_line()? {
                return Ok(None);
            }
        }
        Ok(self.current_line.front())
    }

    pub fn pop_first(&mut self) -> ParseResult<Option<Lexeme>> {
        self.current()?;
        Ok(self.current_line.pop_front())
    }

    pub fn at_end(&mut self) -> ParseResult<bool> {
        Ok(self.current()?.is_none())
    }
}

fn unexpected_end() -> SchemeError {
    SchemeError::SyntaxError("unexpected end of file".to_owned())
}

fn quoted(keyword: &str, src: &mut Buffer) -> ParseResult<Value> {
    let operand = scheme_read(src)?;
    Ok(Value::list([Value::symbol(keyword), operand]))
}

// Reads the remainder of a list whose opening parenthesis was consumed.
fn read_tail(src: &mut Buffer) -> ParseResult<Value> {
    let mut elements = vec![];
    let tail = loop {
        match src.current()? {
            None => return Err(unexpected_end()),
            Some(Lexeme::RightParen) => {
                src.pop_first()?;
                break Value::Nil;
            }
            Some(Lexeme::Dot) => {
                src.pop_first()?;
                if elements.is_empty() {
                    return Err(SchemeError::SyntaxError("unexpected token: .".to_owned()));
                }
                let tail = scheme_read(src)?;
                match src.pop_first()? {
                    Some(Lexeme::RightParen) => break tail,
                    Some(other) => return Err(SchemeError::SyntaxError(format!("expected one element after ., found {:?}", other))),
                    None => return Err(unexpected_end()),
                }
            }
            Some(_) => elements.push(scheme_read(src)?),
        }
    };

    let mut list = tail;
    while let Some(element) = elements.pop() {
        list = Value::cons(element, list);
    }
    Ok(list)
}

/// Reads the next complete expression from `src`.
pub fn scheme_read(src: &mut Buffer) -> ParseResult<Value> {
    match src.pop_first()? {
        None => Err(unexpected_end()),
        Some(Lexeme::Atom(value)) => Ok(value),
        Some(Lexeme::LeftParen) => read_tail(src),
        Some(Lexeme::Quote) => quoted("quote", src),
        Some(Lexeme::Quasiquote) => quoted("quasiquote", src),
        Some(Lexeme::Unquote) => quoted("unquote", src),
        Some(Lexeme::RightParen) => Err(SchemeError::SyntaxError("unexpected token: )".to_owned())),
        Some(Lexeme::Dot) => Err(SchemeError::SyntaxError("unexpected token: .".to_owned())),
    }
}

/// Reads every expression in `input`.
pub fn parse(input: &str) -> ParseResult<Vec<Value>> {
    let mut src = Buffer::new(input.lines().map(str::to_owned));
    let mut expressions = vec![];
    while !src.at_end()? {
        expressions.push(scheme_read(&mut src)?);
    }
    Ok(expressions)
}

/// Reads exactly one expression from `input`.
pub fn read_line(input: &str) -> ParseResult<Value> {
    let mut src = Buffer::new(input.lines().map(str::to_owned));
    let expression = scheme_read(&mut src)?;
    if !src.at_end()? {
        return Err(SchemeError::SyntaxError(
            "read_line's argument can only be a single element".to_owned(),
        ));
    }
    Ok(expression)
}
