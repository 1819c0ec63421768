//! Overload resolution
//!
//! Given the operations registered under one name and the request params,
//! [`resolve`] picks a single operation and lays out its argument list.
//!
//! # Positional params
//!
//! 1. Candidates whose declared arity differs from the given count are
//!    dropped unless `allow_extra_params` / `allow_fewer_params` permit it.
//! 2. Only candidates at the smallest arity distance survive.
//! 3. A lone survivor, or any survivor when no params were given, is taken
//!    as is. Otherwise each survivor is scored by how many positions
//!    [`matches`] accepts and the highest score wins.
//! 4. The arguments are the given values, padded with `null` (or truncated)
//!    to the declared arity.
//!
//! # Named params
//!
//! 1. Candidates are dropped up front when the given name count differs from
//!    the declared arity and the config does not permit it.
//! 2. Each named parameter present in the payload counts as a matched name,
//!    and also as a matched type when [`matches`] accepts the value.
//! 3. The arity check is repeated with the matched name count.
//! 4. The best candidate is the maximum of `(names, types)`.
//! 5. Arguments are filled by name, `null` for anything absent. Unnamed
//!    parameters always receive `null`.
//!
//! Ties in both forms go to the candidate registered first. Overloads that
//! can only be told apart by registration order should be avoided.

use crate::config::ServerConfig;
use crate::descriptor::OperationDescriptor;
use crate::matcher::matches;
use jrex_core::Params;
use serde_json::{Map, Value};

/// Selected overload and its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Position of the selected operation in the candidate slice
    pub index: usize,
    /// One value per declared parameter
    pub arguments: Vec<Value>,
}

/// Pick the best candidate for `params`
///
/// Returns `None` when no candidate is acceptable, which the dispatcher
/// answers with "invalid params".
pub fn resolve(candidates: &[&OperationDescriptor], params: &Params, config: &ServerConfig) -> Option<MatchResult> {
    let resolved = match params {
        Params::None => resolve_positional(candidates, &[], config),
        Params::Positional(values) => resolve_positional(candidates, values, config),
        Params::Named(fields) => resolve_named(candidates, fields, config),
    };
    if let Some(found) = &resolved {
        tracing::debug!(signature = %candidates[found.index].signature(), "Selected overload");
    }
    resolved
}

fn arity_allowed(declared: usize, given: usize, config: &ServerConfig) -> bool {
    if given > declared {
        config.allow_extra_params
    } else if given < declared {
        config.allow_fewer_params
    } else {
        true
    }
}

fn resolve_positional(
    candidates: &[&OperationDescriptor],
    values: &[Value],
    config: &ServerConfig,
) -> Option<MatchResult> {
    let given = values.len();

    let mut best_distance = usize::MAX;
    let mut survivors: Vec<usize> = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let declared = candidate.arity();
        if !arity_allowed(declared, given, config) {
            continue;
        }
        let distance = declared.abs_diff(given);
        if distance < best_distance {
            best_distance = distance;
            survivors.clear();
        }
        if distance == best_distance {
            survivors.push(index);
        }
    }

    let &first = survivors.first()?;
    let selected = if survivors.len() == 1 || given == 0 {
        first
    } else {
        let mut best = first;
        let mut best_score = None;
        for &index in &survivors {
            let score = candidates[index]
                .params
                .iter()
                .zip(values)
                .filter(|(param, value)| matches(value, &param.kind))
                .count();
            if best_score.map_or(true, |top| score > top) {
                best_score = Some(score);
                best = index;
            }
        }
        best
    };

    let declared = candidates[selected].arity();
    let arguments = (0..declared)
        .map(|i| values.get(i).cloned().unwrap_or(Value::Null))
        .collect();

    Some(MatchResult {
        index: selected,
        arguments,
    })
}

fn resolve_named(
    candidates: &[&OperationDescriptor],
    fields: &Map<String, Value>,
    config: &ServerConfig,
) -> Option<MatchResult> {
    let given = fields.len();
    let mut best: Option<(usize, (usize, usize))> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let declared = candidate.arity();
        if !arity_allowed(declared, given, config) {
            continue;
        }

        let mut names = 0;
        let mut types = 0;
        for param in &candidate.params {
            let Some(value) = param.name.as_ref().and_then(|name| fields.get(name)) else {
                continue;
            };
            names += 1;
            if matches(value, &param.kind) {
                types += 1;
            }
        }

        if !arity_allowed(declared, names, config) {
            continue;
        }

        if best.map_or(true, |(_, top)| (names, types) > top) {
            best = Some((index, (names, types)));
        }
    }

    let (selected, _) = best?;
    let arguments = candidates[selected]
        .params
        .iter()
        .map(|param| {
            param
                .name
                .as_ref()
                .and_then(|name| fields.get(name))
                .cloned()
                .unwrap_or(Value::Null)
        })
        .collect();

    Some(MatchResult {
        index: selected,
        arguments,
    })
}
