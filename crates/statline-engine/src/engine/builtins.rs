//! Built-in formula functions and their metadata.
//!
//! Conventions:
//! - Function names are lower case (`abs`, `max`).
//! - A name is only treated as a function when followed by `(`; otherwise it
//!   is an ordinary variable reference.
//! - If you add a built-in, add a row to `BUILTINS` and an arm to
//!   [`Builtin::apply`].

use crate::error::{EngineError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Abs,
    Ceil,
    Floor,
    Round,
    Sign,
    Not,
    Min,
    Max,
}

/// Accepted argument counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

pub struct BuiltinInfo {
    pub name: &'static str,
    pub builtin: Builtin,
    pub arity: Arity,
    pub description: &'static str,
}

pub const BUILTINS: &[BuiltinInfo] = &[
    BuiltinInfo {
        name: "abs",
        builtin: Builtin::Abs,
        arity: Arity::Exactly(1),
        description: "Absolute value",
    },
    BuiltinInfo {
        name: "ceil",
        builtin: Builtin::Ceil,
        arity: Arity::Exactly(1),
        description: "Round up to the next whole number",
    },
    BuiltinInfo {
        name: "floor",
        builtin: Builtin::Floor,
        arity: Arity::Exactly(1),
        description: "Round down to the previous whole number",
    },
    BuiltinInfo {
        name: "round",
        builtin: Builtin::Round,
        arity: Arity::Exactly(1),
        description: "Round to the nearest whole number, halves upward",
    },
    BuiltinInfo {
        name: "sign",
        builtin: Builtin::Sign,
        arity: Arity::Exactly(1),
        description: "1 if positive, -1 if negative, 0 if zero",
    },
    BuiltinInfo {
        name: "not",
        builtin: Builtin::Not,
        arity: Arity::Exactly(1),
        description: "1 if the argument is zero, 0 otherwise",
    },
    BuiltinInfo {
        name: "min",
        builtin: Builtin::Min,
        arity: Arity::AtLeast(1),
        description: "Smallest of the comma separated arguments",
    },
    BuiltinInfo {
        name: "max",
        builtin: Builtin::Max,
        arity: Arity::AtLeast(1),
        description: "Largest of the comma separated arguments",
    },
];

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        BUILTINS.iter().find(|b| b.name == name).map(|b| b.builtin)
    }

    /// `BUILTINS` rows are in declaration order.
    pub fn info(self) -> &'static BuiltinInfo {
        &BUILTINS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Check an argument count against this builtin's arity.
    pub fn check_arity(self, found: usize) -> Result<()> {
        let (ok, expected) = match self.info().arity {
            Arity::Exactly(n) => (found == n, format!("exactly {}", n)),
            Arity::AtLeast(n) => (found >= n, format!("at least {}", n)),
        };
        if ok {
            Ok(())
        } else {
            Err(EngineError::Arity {
                function: self.name(),
                expected,
                found,
            })
        }
    }

    /// Apply to already evaluated arguments. Arity was checked at parse time.
    pub fn apply(self, args: &[f64]) -> f64 {
        let first = args.first().copied().unwrap_or(0.0);
        match self {
            Builtin::Abs => first.abs(),
            Builtin::Ceil => first.ceil(),
            Builtin::Floor => first.floor(),
            Builtin::Round => (first + 0.5).floor(),
            Builtin::Sign => {
                if first > 0.0 {
                    1.0
                } else if first < 0.0 {
                    -1.0
                } else {
                    first
                }
            }
            Builtin::Not => {
                if first == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Builtin::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Builtin::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}
