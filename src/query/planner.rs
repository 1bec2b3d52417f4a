//! Query planning and execution
//!
//! Picks the narrowest index-backed candidate set, filters it with every
//! matcher, then orders and windows the survivors. Buckets (or fields)
//! without an index fall back to a full scan.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::bucket::Bucket;
use crate::codec::{Document, Value};
use crate::error::Result;

use super::matcher::{Matcher, Op};
use super::options::ListOptions;

/// Everything a query needs besides the bucket
#[derive(Debug, Clone, Default)]
pub(crate) struct QuerySpec {
    pub matchers: Vec<Matcher>,
    pub options: ListOptions,
    pub order_by: Option<String>,
}

/// How a query reaches its candidate records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Every record in the bucket is examined
    FullScan,
    /// An equality (or `in`) lookup on an indexed field
    IndexEq { field: String },
    /// A bounded walk of an indexed field
    IndexRange { field: String },
}

struct Plan {
    access: Access,
    /// Candidate keys, ascending; `None` for a full scan
    candidates: Option<Vec<u64>>,
}

/// Describe the access path without running the query
pub(crate) fn explain(bucket: &Bucket, matchers: &[Matcher]) -> Access {
    plan(bucket, matchers).access
}

fn plan(bucket: &Bucket, matchers: &[Matcher]) -> Plan {
    let mut best: Option<(Access, Vec<u64>)> = None;

    // Step 1: equality lookups are exact and cheap, try them first
    for matcher in matchers {
        let Some(index) = bucket.index(matcher.field()) else {
            continue;
        };
        let keys = match matcher.op() {
            Op::Eq(value) if !value.is_null() => index.eq(value),
            Op::In(values) if values.iter().all(|v| !v.is_null()) => values
                .iter()
                .flat_map(|v| index.eq(v))
                .collect::<BTreeSet<u64>>()
                .into_iter()
                .collect(),
            _ => continue,
        };
        let access = Access::IndexEq {
            field: matcher.field().to_string(),
        };
        consider(&mut best, access, keys);
    }

    // Step 2: otherwise merge comparison bounds per indexed field
    if best.is_none() {
        let mut bounds: BTreeMap<&str, (Bound<&Value>, Bound<&Value>)> = BTreeMap::new();
        for matcher in matchers {
            if bucket.index(matcher.field()).is_none() {
                continue;
            }
            let entry = bounds
                .entry(matcher.field())
                .or_insert((Bound::Unbounded, Bound::Unbounded));
            match matcher.op() {
                Op::Gt(v) => entry.0 = tighter_lower(entry.0, Bound::Excluded(v)),
                Op::Gte(v) => entry.0 = tighter_lower(entry.0, Bound::Included(v)),
                Op::Lt(v) => entry.1 = tighter_upper(entry.1, Bound::Excluded(v)),
                Op::Lte(v) => entry.1 = tighter_upper(entry.1, Bound::Included(v)),
                Op::Eq(_) | Op::In(_) => {}
            }
        }

        for (field, (lower, upper)) in bounds {
            if matches!((lower, upper), (Bound::Unbounded, Bound::Unbounded)) {
                continue;
            }
            let Some(index) = bucket.index(field) else {
                continue;
            };
            let mut keys = index.range(lower, upper);
            keys.sort_unstable();
            let access = Access::IndexRange {
                field: field.to_string(),
            };
            consider(&mut best, access, keys);
        }
    }

    match best {
        Some((access, keys)) => Plan {
            access,
            candidates: Some(keys),
        },
        None => Plan {
            access: Access::FullScan,
            candidates: None,
        },
    }
}

fn consider(best: &mut Option<(Access, Vec<u64>)>, access: Access, keys: Vec<u64>) {
    let narrower = best.as_ref().map_or(true, |(_, current)| keys.len() < current.len());
    if narrower {
        *best = Some((access, keys));
    }
}

fn tighter_lower<'a>(current: Bound<&'a Value>, new: Bound<&'a Value>) -> Bound<&'a Value> {
    match (current, new) {
        (Bound::Unbounded, b) | (b, Bound::Unbounded) => b,
        (Bound::Included(a), Bound::Included(b)) => Bound::Included(a.max(b)),
        (Bound::Excluded(a), Bound::Excluded(b)) => Bound::Excluded(a.max(b)),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i > e {
                Bound::Included(i)
            } else {
                Bound::Excluded(e)
            }
        }
    }
}

fn tighter_upper<'a>(current: Bound<&'a Value>, new: Bound<&'a Value>) -> Bound<&'a Value> {
    match (current, new) {
        (Bound::Unbounded, b) | (b, Bound::Unbounded) => b,
        (Bound::Included(a), Bound::Included(b)) => Bound::Included(a.min(b)),
        (Bound::Excluded(a), Bound::Excluded(b)) => Bound::Excluded(a.min(b)),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i < e {
                Bound::Included(i)
            } else {
                Bound::Excluded(e)
            }
        }
    }
}

/// Run a query against one bucket
///
/// Returns `(key, document)` pairs in their final order.
pub(crate) fn execute(bucket: &Bucket, spec: &QuerySpec) -> Result<Vec<(u64, Document)>> {
    let options = spec.options;
    let plan = if spec.matchers.is_empty() {
        Plan {
            access: Access::FullScan,
            candidates: None,
        }
    } else {
        plan(bucket, &spec.matchers)
    };

    let descending = options.reverse && spec.order_by.is_none();
    let keys: Box<dyn Iterator<Item = u64> + '_> = match plan.candidates {
        Some(keys) if descending => Box::new(keys.into_iter().rev()),
        Some(keys) => Box::new(keys.into_iter()),
        None if descending => Box::new(bucket.keys().rev()),
        None => Box::new(bucket.keys()),
    };

    // Without an explicit order the key order is final, so stop early.
    if spec.order_by.is_none() {
        let mut out = Vec::new();
        let mut skipped = 0;
        for key in keys {
            let Some(document) = matching_document(bucket, key, &spec.matchers)? else {
                continue;
            };
            if skipped < options.skip {
                skipped += 1;
                continue;
            }
            out.push((key, document));
            if options.limit > 0 && out.len() >= options.limit {
                break;
            }
        }
        return Ok(out);
    }

    let mut matched = Vec::new();
    for key in keys {
        if let Some(document) = matching_document(bucket, key, &spec.matchers)? {
            matched.push((key, document));
        }
    }

    if let Some(field) = &spec.order_by {
        // Keys arrive ascending, so ties stay in key order.
        matched.sort_by(|(_, a), (_, b)| a.value(field).cmp(b.value(field)));
    }
    if options.reverse {
        matched.reverse();
    }

    Ok(options.window(matched.into_iter()).collect())
}

fn matching_document(bucket: &Bucket, key: u64, matchers: &[Matcher]) -> Result<Option<Document>> {
    let Some(document) = bucket.document(key)? else {
        return Ok(None);
    };
    if matchers.iter().all(|m| m.matches(&document)) {
        Ok(Some(document))
    } else {
        Ok(None)
    }
}
