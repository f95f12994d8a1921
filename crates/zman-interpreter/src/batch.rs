//! Evaluation of a whole set of named formulas against one context.

use indexmap::IndexMap;
use zman_astro::Time;
use zman_syntax::error::ErrorList;

use crate::context::ExecutionContext;
use crate::deps::{dependency_order, CycleError};
use crate::executor::execute;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("formula '{key}' failed:\n{errors}")]
    Formula { key: String, errors: ErrorList },
}

/// Evaluates every formula in dependency order, storing each result in the
/// context's cache under its key so later formulas can reference it.
///
/// Results come back in the map's order. The first failing formula aborts
/// the batch.
pub fn execute_formula_set(
    formulas: &IndexMap<String, String>,
    ctx: &mut ExecutionContext,
) -> Result<IndexMap<String, Time>, BatchError> {
    let order = dependency_order(formulas)?;
    let mut results: IndexMap<String, Time> = IndexMap::with_capacity(order.len());

    for key in order {
        let Some(text) = formulas.get(&key) else {
            continue;
        };
        let fail = |errors: ErrorList| BatchError::Formula {
            key: key.clone(),
            errors: errors.with_source(text),
        };
        let ast = zman_parser::parse(text).map_err(fail)?;
        let time = execute(&ast, ctx).map_err(fail)?;
        tracing::debug!(key = %key, time = %time, "evaluated formula");
        ctx.insert(key.clone(), time);
        results.insert(key, time);
    }

    Ok(formulas
        .keys()
        .filter_map(|k| results.get(k).map(|t| (k.clone(), *t)))
        .collect())
}
