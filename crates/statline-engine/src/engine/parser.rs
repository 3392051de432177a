//! Recursive-descent parser for formula source.
//!
//! Precedence, lowest first: `or`, `and`, comparisons (non-associative),
//! `+ -`, `* / %`, unary `+ -`, primaries. `if ... end` and `let ... then`
//! are primaries, so they can appear anywhere a value can.
//!
//! Identifiers bound by an enclosing `let` resolve to [`Expr::Local`];
//! every other identifier must be a valid [`VarName`] and becomes
//! [`Expr::Var`]. Whether that variable exists is checked later, against
//! the formula store.

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::builtins::Builtin;
use super::lexer::{Token, TokenKind, tokenize};
use super::var_name::{KEYWORDS, VarName};
use crate::error::{EngineError, Result};

/// Nesting allowed through parentheses, calls, `if`, `let` and unary signs.
const MAX_DEPTH: usize = 128;

/// Parse formula source into an expression tree.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
        locals: Vec::new(),
        depth: 0,
    };
    let expr = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(
            token.position,
            format!("unexpected {} after end of expression", describe(&token.kind)),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    locals: Vec<String>,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, position: usize, message: String) -> EngineError {
        EngineError::Parse { position, message }
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Op(o)) if *o == op)
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Ident(w)) if w == word)
    }

    fn expect_op(&mut self, op: &str) -> Result<()> {
        if self.at_op(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", op)))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.at_keyword(word) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", word)))
        }
    }

    fn unexpected(&self, wanted: &str) -> EngineError {
        let found = match self.peek_kind() {
            Some(kind) => describe(kind),
            None => "end of input".to_string(),
        };
        self.error_at(self.position(), format!("expected {}, found {}", wanted, found))
    }

    fn expr(&mut self) -> Result<Expr> {
        self.nested(Self::or_expr)
    }

    fn nested(&mut self, rule: fn(&mut Self) -> Result<Expr>) -> Result<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_at(
                self.position(),
                format!("formula nests deeper than {} levels", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.at_keyword("or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.rel_expr()?;
        while self.at_keyword("and") {
            self.pos += 1;
            let rhs = self.rel_expr()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn relational_op(&self) -> Option<BinaryOp> {
        match self.peek_kind() {
            Some(TokenKind::Op(op)) => BinaryOp::relational(op),
            _ => None,
        }
    }

    fn rel_expr(&mut self) -> Result<Expr> {
        let lhs = self.add_expr()?;
        let Some(op) = self.relational_op() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.add_expr()?;
        if self.relational_op().is_some() {
            return Err(self.error_at(
                self.position(),
                "comparison operators cannot be chained".to_string(),
            ));
        }
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn add_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = if self.at_op("+") {
                BinaryOp::Add
            } else if self.at_op("-") {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            self.pos += 1;
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn mul_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = if self.at_op("*") {
                BinaryOp::Mul
            } else if self.at_op("/") {
                BinaryOp::Div
            } else if self.at_op("%") {
                BinaryOp::Mod
            } else {
                return Ok(lhs);
            };
            self.pos += 1;
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        let op = if self.at_op("-") {
            UnaryOp::Minus
        } else if self.at_op("+") {
            UnaryOp::Plus
        } else {
            return self.primary();
        };
        self.pos += 1;
        let inner = self.nested(Self::unary_expr)?;
        Ok(Expr::Unary(op, Box::new(inner)))
    }

    fn primary(&mut self) -> Result<Expr> {
        let position = self.position();
        let Some(token) = self.next() else {
            return Err(self.error_at(position, "unexpected end of input".to_string()));
        };

        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Op("(") => {
                let inner = self.expr()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            TokenKind::Op(op) => {
                Err(self.error_at(position, format!("unexpected operator '{}'", op)))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "if" => self.if_rest(),
                "let" => self.let_rest(),
                w if KEYWORDS.contains(&w) => {
                    Err(self.error_at(position, format!("unexpected keyword '{}'", w)))
                }
                _ if self.at_op("(") => self.call_rest(word, position),
                _ => self.identifier(word, position),
            },
        }
    }

    fn identifier(&mut self, word: String, position: usize) -> Result<Expr> {
        if let Some(slot) = self.locals.iter().rposition(|l| *l == word) {
            return Ok(Expr::Local { name: word, slot });
        }
        VarName::new(word)
            .map(Expr::Var)
            .map_err(|e| self.error_at(position, e.to_string()))
    }

    fn call_rest(&mut self, name: String, position: usize) -> Result<Expr> {
        let builtin =
            Builtin::lookup(&name).ok_or(EngineError::UnknownFunction { name, position })?;
        self.expect_op("(")?;
        let mut args = Vec::new();
        if !self.at_op(")") {
            args.push(self.expr()?);
            while self.at_op(",") {
                self.pos += 1;
                args.push(self.expr()?);
            }
        }
        self.expect_op(")")?;
        builtin.check_arity(args.len())?;
        Ok(Expr::Call(builtin, args))
    }

    /// `if c then a (elseif c then a)* else b end`, after `if`.
    fn if_rest(&mut self) -> Result<Expr> {
        let cond = self.expr()?;
        self.expect_keyword("then")?;
        let then = self.expr()?;
        let otherwise = if self.at_keyword("elseif") {
            self.pos += 1;
            // The nested chain consumes the shared `end`.
            return Ok(Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(self.if_rest()?),
            });
        } else {
            self.expect_keyword("else")?;
            self.expr()?
        };
        self.expect_keyword("end")?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// `let x = e (, y = e)* then body`, after `let`.
    fn let_rest(&mut self) -> Result<Expr> {
        let mut bindings = Vec::new();
        loop {
            let position = self.position();
            let name = match self.next().map(|t| t.kind) {
                Some(TokenKind::Ident(name)) if !KEYWORDS.contains(&name.as_str()) => name,
                _ => {
                    return Err(
                        self.error_at(position, "expected a local variable name".to_string())
                    );
                }
            };
            self.expect_op("=")?;
            let value = self.expr()?;
            bindings.push((name.clone(), value));
            self.locals.push(name);
            if self.at_op(",") {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.expect_keyword("then")?;
        let body = self.expr();
        self.locals.truncate(self.locals.len() - bindings.len());
        Ok(Expr::Let {
            bindings,
            body: Box::new(body?),
        })
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::Ident(w) => format!("'{}'", w),
        TokenKind::Op(op) => format!("'{}'", op),
    }
}
