//! Matchers
//!
//! Immutable single-field predicates. A query ANDs all of its matchers.

use std::fmt;

use crate::codec::{Document, Value};

/// Comparison a matcher applies to its field
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
}

/// A predicate over one field
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    field: String,
    op: Op,
}

impl Matcher {
    pub fn new(field: impl Into<String>, op: Op) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Evaluate against a document
    ///
    /// Ordering comparisons never match a null/absent field, nor a value of
    /// a different class than the operand (a number is neither greater nor
    /// less than a string).
    pub fn matches(&self, document: &Document) -> bool {
        self.matches_value(document.value(&self.field))
    }

    pub fn matches_value(&self, value: &Value) -> bool {
        match &self.op {
            Op::Eq(target) => value == target,
            Op::In(targets) => targets.iter().any(|t| value == t),
            Op::Gt(target) => comparable(value, target) && value > target,
            Op::Gte(target) => comparable(value, target) && value >= target,
            Op::Lt(target) => comparable(value, target) && value < target,
            Op::Lte(target) => comparable(value, target) && value <= target,
        }
    }
}

fn comparable(value: &Value, target: &Value) -> bool {
    !value.is_null() && value.class() == target.class()
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            Op::Eq(v) => write!(f, "{} == {}", self.field, v),
            Op::Gt(v) => write!(f, "{} > {}", self.field, v),
            Op::Gte(v) => write!(f, "{} >= {}", self.field, v),
            Op::Lt(v) => write!(f, "{} < {}", self.field, v),
            Op::Lte(v) => write!(f, "{} <= {}", self.field, v),
            Op::In(vs) => {
                write!(f, "{} in [", self.field)?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// `field == value`
pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Matcher {
    Matcher::new(field, Op::Eq(value.into()))
}

/// `field > value`
pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Matcher {
    Matcher::new(field, Op::Gt(value.into()))
}

/// `field >= value`
pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Matcher {
    Matcher::new(field, Op::Gte(value.into()))
}

/// `field < value`
pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Matcher {
    Matcher::new(field, Op::Lt(value.into()))
}

/// `field <= value`
pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Matcher {
    Matcher::new(field, Op::Lte(value.into()))
}

/// `field` equals any of `values`
pub fn in_values<V: Into<Value>>(
    field: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> Matcher {
    Matcher::new(field, Op::In(values.into_iter().map(Into::into).collect()))
}
