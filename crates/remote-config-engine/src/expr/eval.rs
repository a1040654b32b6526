//! Evaluation of parsed condition expressions against a client context.
//!
//! Evaluation is total: a malformed or missing attribute makes the enclosing
//! comparison false, never an error. Percentage bucketing is deterministic:
//! the same `(seed, randomization id)` pair lands in the same bucket across
//! calls and across process restarts.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::ast::{CompareOp, Expr, Literal};

/// Well-known context attribute carrying the stable per-user identifier used
/// for percentage bucketing.
pub const RANDOMIZATION_ID: &str = "randomization_id";

/// Number of micro-percent units in 100 percent. Buckets are computed at this
/// granularity so fractional rollout thresholds stay meaningful.
const MICRO_PERCENT_SCALE: u64 = 100_000_000;

/// Client-supplied attributes a template is resolved against.
///
/// Attributes are a flat map of dotted names to loosely-typed values.
/// Lookups accept either the full dotted name or the name without its
/// leading namespace segment, so a context keyed `platform` satisfies an
/// expression written `device.platform`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientContext {
    attributes: BTreeMap<String, Value>,
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute, consuming and returning the context for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets the stable identifier used for percentage bucketing.
    pub fn with_randomization_id(self, id: impl Into<String>) -> Self {
        self.with(RANDOMIZATION_ID, Value::String(id.into()))
    }

    /// Sets an attribute in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Looks up an attribute by its expression-side name.
    ///
    /// Tries the exact dotted name first, then the name with the leading
    /// namespace segment stripped (`device.platform` falls back to
    /// `platform`).
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value);
        }
        let (_, rest) = name.split_once('.')?;
        self.attributes.get(rest)
    }

    /// The percentage-bucketing identifier, when present and a string.
    pub fn randomization_id(&self) -> Option<&str> {
        self.attributes.get(RANDOMIZATION_ID).and_then(Value::as_str)
    }
}

/// Evaluates a parsed expression against a context.
pub fn evaluate(expr: &Expr, context: &ClientContext) -> bool {
    match expr {
        Expr::Literal(value) => *value,
        Expr::Not(inner) => !evaluate(inner, context),
        Expr::And(lhs, rhs) => evaluate(lhs, context) && evaluate(rhs, context),
        Expr::Or(lhs, rhs) => evaluate(lhs, context) || evaluate(rhs, context),
        Expr::Compare {
            attribute,
            op,
            value,
        } => compare_attribute(context.get(attribute), *op, value),
        Expr::Percent {
            seed,
            op,
            threshold,
        } => percent_matches(seed, *op, *threshold, context),
    }
}

/// Computes the micro-percent bucket for a `(seed, randomization id)` pair.
///
/// The bucket is the first eight bytes of the SHA-256 digest of
/// `"<seed>.<id>"` taken as a big-endian integer, modulo the micro-percent
/// scale. It is a pure function of its inputs, so assignments survive process
/// restarts.
pub fn percent_bucket(seed: &str, randomization_id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(b".");
    hasher.update(randomization_id.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % MICRO_PERCENT_SCALE
}

/// A percent predicate compares the caller's bucket against the threshold
/// scaled to micro-percent. Without a randomization id there is nothing to
/// bucket, so the predicate is false.
fn percent_matches(seed: &str, op: CompareOp, threshold: f64, context: &ClientContext) -> bool {
    let Some(id) = context.randomization_id() else {
        return false;
    };
    let bucket = percent_bucket(seed, id) as f64;
    compare_numbers(bucket, threshold * 1_000_000.0, op)
}

fn compare_attribute(actual: Option<&Value>, op: CompareOp, expected: &Literal) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    match (actual, expected) {
        (Value::String(actual), Literal::String(expected)) => {
            compare_strings(actual, expected, op)
        }
        (Value::Number(actual), Literal::Number(expected)) => actual
            .as_f64()
            .map(|actual| compare_numbers(actual, *expected, op))
            .unwrap_or(false),
        (Value::Bool(actual), Literal::Bool(expected)) => match op {
            CompareOp::Equal => actual == expected,
            CompareOp::NotEqual => actual != expected,
            // Booleans have no meaningful order.
            _ => false,
        },
        // Type mismatches never match.
        _ => false,
    }
}

/// String comparison. Equality is literal; ordering compares as semantic
/// versions when both sides parse as versions (the app-version predicate) and
/// lexicographically otherwise.
fn compare_strings(actual: &str, expected: &str, op: CompareOp) -> bool {
    match op {
        CompareOp::Equal => actual == expected,
        CompareOp::NotEqual => actual != expected,
        _ => {
            let ordering = match (
                semver::Version::parse(actual),
                semver::Version::parse(expected),
            ) {
                (Ok(actual), Ok(expected)) => actual.cmp(&expected),
                _ => actual.cmp(expected),
            };
            ordering_matches(ordering, op)
        }
    }
}

fn compare_numbers(actual: f64, expected: f64, op: CompareOp) -> bool {
    match op {
        CompareOp::Equal => actual == expected,
        CompareOp::NotEqual => actual != expected,
        CompareOp::Less => actual < expected,
        CompareOp::LessOrEqual => actual <= expected,
        CompareOp::Greater => actual > expected,
        CompareOp::GreaterOrEqual => actual >= expected,
    }
}

fn ordering_matches(ordering: std::cmp::Ordering, op: CompareOp) -> bool {
    use std::cmp::Ordering;
    match op {
        CompareOp::Equal => ordering == Ordering::Equal,
        CompareOp::NotEqual => ordering != Ordering::Equal,
        CompareOp::Less => ordering == Ordering::Less,
        CompareOp::LessOrEqual => ordering != Ordering::Greater,
        CompareOp::Greater => ordering == Ordering::Greater,
        CompareOp::GreaterOrEqual => ordering != Ordering::Less,
    }
}
