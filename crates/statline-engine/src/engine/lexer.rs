//! Lexical analysis of formula source.
//!
//! The token grammar is a single alternation regex (comments, numbers,
//! operators, whitespace, identifiers); every byte of the input must be
//! covered by some match or the lexer reports the first uncovered offset.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{EngineError, Result};

/// Kinds of token produced by [`tokenize`].
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    /// Operator or punctuation, e.g. `+`, `<>`, `(`.
    Op(&'static str),
}

/// A token and the byte offset where it starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

const OPERATORS: &[&str] = &[
    "==", "<>", ">=", "<=", ">", "<", "=", "+", "-", "*", "/", "%", "(", ")", ",",
];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Order matters: comments before operators so `//` is not two divisions.
        Regex::new(concat!(
            r"(?P<comment>//[^\n]*(?:\n|$))",
            r"|(?P<number>[0-9]+(?:\.[0-9]+(?:e[+-]*[0-9]+)*)*)",
            r"|(?P<op>==|<>|>=|<=|>|<|=|\+|-|\*|/|%|\(|\)|,)",
            r"|(?P<ws>[ \t\n\r]+)",
            r"|(?P<ident>[A-Za-z_$][0-9A-Za-z_$|]*)",
        ))
        .expect("token regex must compile")
    })
}

/// Split `source` into tokens, dropping whitespace and comments.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in token_re().captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() != cursor {
            return Err(unexpected(source, cursor));
        }
        cursor = whole.end();

        let kind = if let Some(m) = caps.name("number") {
            let value = m.as_str().parse::<f64>().map_err(|e| EngineError::Parse {
                position: m.start(),
                message: format!("invalid number literal {:?}: {}", m.as_str(), e),
            })?;
            TokenKind::Number(value)
        } else if let Some(m) = caps.name("op") {
            let op = OPERATORS
                .iter()
                .copied()
                .find(|op| *op == m.as_str())
                .ok_or_else(|| unexpected(source, m.start()))?;
            TokenKind::Op(op)
        } else if let Some(m) = caps.name("ident") {
            TokenKind::Ident(m.as_str().to_string())
        } else {
            continue;
        };

        tokens.push(Token {
            kind,
            position: whole.start(),
        });
    }

    if cursor != source.len() {
        return Err(unexpected(source, cursor));
    }

    Ok(tokens)
}

fn unexpected(source: &str, position: usize) -> EngineError {
    let ch = source[position..].chars().next().unwrap_or(' ');
    EngineError::Parse {
        position,
        message: format!("unexpected character {:?}", ch),
    }
}
