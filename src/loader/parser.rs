//! Closed-form expression parser for plugin specifications.
//!
//! Grammar:
//!
//! ```text
//! expr    := literal | name | call | list
//! call    := name '(' [arg (',' arg)* [',']] ')'
//! arg     := expr | name '=' expr
//! list    := '[' [expr (',' expr)* [',']] ']'
//! literal := int | float | string
//! ```
//!
//! Keyword arguments must follow positional ones. There is no operator,
//! attribute or subscript syntax.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{PluginError, Result};

/// Parsed plugin expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    List(Vec<Expr>),
    Call {
        callee: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Equals,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("name '{}'", name),
            Token::Int(i) => format!("number {}", i),
            Token::Float(f) => format!("number {}", f),
            Token::Str(s) => format!("string {:?}", s),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

fn syntax(offset: usize, message: impl Into<String>) -> PluginError {
    PluginError::Syntax {
        offset,
        message: message.into(),
    }
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>> {
        let mut tokens = Vec::new();
        loop {
            while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

            let Some(&(offset, c)) = self.chars.peek() else {
                tokens.push((self.source.len(), Token::Eof));
                return Ok(tokens);
            };

            let token = match c {
                '(' | ')' | '[' | ']' | ',' | '=' => {
                    self.chars.next();
                    match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        '[' => Token::LBracket,
                        ']' => Token::RBracket,
                        ',' => Token::Comma,
                        _ => Token::Equals,
                    }
                }
                '"' | '\'' => self.string(offset, c)?,
                c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(offset)?,
                c if c.is_alphabetic() || c == '_' => self.ident(),
                other => return Err(syntax(offset, format!("unexpected character '{}'", other))),
            };
            tokens.push((offset, token));
        }
    }

    fn ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_alphanumeric() || *c == '_') {
            name.push(c);
        }
        Token::Ident(name)
    }

    fn number(&mut self, offset: usize) -> Result<Token> {
        let mut text = String::new();
        if let Some((_, sign)) = self.chars.next_if(|(_, c)| *c == '-' || *c == '+') {
            text.push(sign);
        }
        while let Some((_, c)) = self.chars.next_if(|(_, c)| {
            c.is_ascii_alphanumeric() || *c == '.' || *c == '_'
        }) {
            text.push(c);
        }
        // Exponent sign, as in 1e-3.
        if text.ends_with(['e', 'E']) {
            if let Some((_, sign)) = self.chars.next_if(|(_, c)| *c == '-' || *c == '+') {
                text.push(sign);
                while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
                    text.push(c);
                }
            }
        }

        let digits = text.replace('_', "");
        if let Ok(i) = digits.parse::<i64>() {
            return Ok(Token::Int(i));
        }
        let looks_numeric = digits
            .trim_start_matches(['-', '+'])
            .starts_with(|c: char| c.is_ascii_digit() || c == '.');
        match digits.parse::<f64>() {
            Ok(f) if looks_numeric && f.is_finite() => Ok(Token::Float(f)),
            _ => Err(syntax(offset, format!("invalid number literal '{}'", text))),
        }
    }

    fn string(&mut self, offset: usize, quote: char) -> Result<Token> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(syntax(offset, "unterminated string literal")),
                Some((_, c)) if c == quote => return Ok(Token::Str(value)),
                Some((at, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, c @ ('\\' | '\'' | '"'))) => value.push(c),
                    Some((_, other)) => {
                        return Err(syntax(at, format!("unknown escape '\\{}'", other)))
                    }
                    None => return Err(syntax(offset, "unterminated string literal")),
                },
                Some((_, c)) => value.push(c),
            }
        }
    }
}

/// Deepest list or call nesting a specification may use.
pub const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].1
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].1.clone();
        if token != Token::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(syntax(
                self.offset(),
                format!("expected {}, found {}", expected.describe(), self.peek().describe()),
            ))
        }
    }

    fn nested<T>(&mut self, offset: usize, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(syntax(offset, format!("expression nested deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    fn expr(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.advance() {
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::Float(f) => Ok(Expr::Float(f)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::LBracket => self.nested(offset, Self::list),
            Token::Ident(name) => {
                if *self.peek() == Token::LParen {
                    self.advance();
                    self.nested(offset, |parser| parser.call(name))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            other => Err(syntax(offset, format!("unexpected {}", other.describe()))),
        }
    }

    fn list(&mut self) -> Result<Expr> {
        let mut items = Vec::new();
        while *self.peek() != Token::RBracket {
            items.push(self.expr()?);
            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RBracket)?;
        Ok(Expr::List(items))
    }

    fn call(&mut self, callee: String) -> Result<Expr> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();

        while *self.peek() != Token::RParen {
            let offset = self.offset();
            let is_keyword = matches!(self.peek(), Token::Ident(_))
                && self.tokens.get(self.pos + 1).map(|(_, t)| t) == Some(&Token::Equals);

            if is_keyword {
                let Token::Ident(name) = self.advance() else {
                    unreachable!("keyword argument starts with a name");
                };
                self.advance();
                if kwargs.iter().any(|(existing, _)| *existing == name) {
                    return Err(syntax(offset, format!("keyword argument repeated: {}", name)));
                }
                kwargs.push((name, self.expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(syntax(offset, "positional argument follows keyword argument"));
                }
                args.push(self.expr()?);
            }

            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;

        Ok(Expr::Call { callee, args, kwargs })
    }
}

/// Parse a complete expression; trailing input is a syntax error.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0, depth: 0 };

    if *parser.peek() == Token::Eof {
        return Err(syntax(0, "empty plugin expression"));
    }

    let expr = parser.expr()?;
    if *parser.peek() != Token::Eof {
        return Err(syntax(
            parser.offset(),
            format!("unexpected {} after expression", parser.peek().describe()),
        ));
    }
    Ok(expr)
}
