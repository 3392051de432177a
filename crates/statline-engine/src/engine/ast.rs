//! Parsed representation of a formula.

use super::builtins::Builtin;
use super::var_name::VarName;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "<>",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    /// Comparison operators, parsed as a single non-associative level.
    pub fn relational(op: &str) -> Option<BinaryOp> {
        Some(match op {
            ">" => BinaryOp::Gt,
            "<" => BinaryOp::Lt,
            ">=" => BinaryOp::Ge,
            "<=" => BinaryOp::Le,
            "==" => BinaryOp::Eq,
            "<>" => BinaryOp::Ne,
            _ => return None,
        })
    }

    /// Apply the operator to two evaluated operands.
    ///
    /// Logical operators are short-circuited by the evaluator and only reach
    /// this function in static mode, where both sides are always walked.
    pub fn apply(self, x: f64, y: f64) -> f64 {
        let truth = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => x / y,
            BinaryOp::Mod => x % y,
            BinaryOp::Gt => truth(x > y),
            BinaryOp::Lt => truth(x < y),
            BinaryOp::Ge => truth(x >= y),
            BinaryOp::Le => truth(x <= y),
            BinaryOp::Eq => truth(x == y),
            BinaryOp::Ne => truth(x != y),
            BinaryOp::And => truth(x != 0.0 && y != 0.0),
            BinaryOp::Or => truth(x != 0.0 || y != 0.0),
        }
    }
}

/// An expression tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Reference to a base or derived variable of the formula store.
    Var(VarName),
    /// Reference to a `let` binding, by slot on the local stack.
    Local { name: String, slot: usize },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Let {
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
}

impl Expr {
    /// Visit every node depth-first, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Number(_) | Expr::Var(_) | Expr::Local { .. } => {}
            Expr::Unary(_, inner) => inner.walk(visit),
            Expr::Binary(_, lhs, rhs) => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            Expr::Let { bindings, body } => {
                for (_, value) in bindings {
                    value.walk(visit);
                }
                body.walk(visit);
            }
        }
    }
}
