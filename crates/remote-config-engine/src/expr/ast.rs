//! Parsed representation of condition expressions.

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `true` or `false`.
    Literal(bool),
    /// `!inner`.
    Not(Box<Expr>),
    /// `lhs && rhs`.
    And(Box<Expr>, Box<Expr>),
    /// `lhs || rhs`.
    Or(Box<Expr>, Box<Expr>),
    /// `attribute op literal`, e.g. `device.platform == 'ios'`.
    Compare {
        /// Dotted attribute path joined with `.`.
        attribute: String,
        op: CompareOp,
        value: Literal,
    },
    /// `percent(seed) op threshold`, a stable percentage-bucketing predicate.
    Percent {
        seed: String,
        op: CompareOp,
        /// Threshold in percent (0–100); fractional thresholds are honored
        /// down to micro-percent granularity.
        threshold: f64,
    },
}

/// Comparison operator in an attribute or percent predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    /// Returns `true` for the ordering operators (everything but equality).
    pub fn is_ordering(&self) -> bool {
        !matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
        };
        f.write_str(symbol)
    }
}

/// Literal operand on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
}
