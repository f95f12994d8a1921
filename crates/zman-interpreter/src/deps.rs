//! Evaluation order for a set of named formulas.

use std::collections::VecDeque;

use indexmap::IndexMap;

/// The formulas that could not be ordered because they depend on each
/// other, directly or through a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circular dependency between formulas: {}", .keys.join(", "))]
pub struct CycleError {
    pub keys: Vec<String>,
}

/// Orders formula keys so that every formula comes after the formulas it
/// references.
///
/// Formulas that fail to parse contribute no edges; their errors surface when
/// they are executed. References to keys outside the map are ignored here.
/// Ties are broken by map order.
pub fn dependency_order(formulas: &IndexMap<String, String>) -> Result<Vec<String>, CycleError> {
    // Adjacency list: key -> [keys that reference it]
    let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
    let mut in_degree: IndexMap<&str, usize> = IndexMap::new();

    for key in formulas.keys() {
        in_degree.insert(key.as_str(), 0);
        dependents.insert(key.as_str(), Vec::new());
    }

    for (key, text) in formulas {
        let Ok(ast) = zman_parser::parse(text) else {
            tracing::debug!(key = %key, "formula does not parse; no dependency edges");
            continue;
        };
        for reference in ast.references() {
            let Some((dep, _)) = formulas.get_key_value(reference.as_str()) else {
                continue;
            };
            dependents.entry(dep.as_str()).or_default().push(key.as_str());
            *in_degree.entry(key.as_str()).or_default() += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut order = Vec::with_capacity(formulas.len());

    while let Some(key) = queue.pop_front() {
        order.push(key.to_string());
        if let Some(next) = dependents.get(key) {
            for &dependent in next {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }

    if order.len() < formulas.len() {
        let keys: Vec<String> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg > 0)
            .map(|(k, _)| k.to_string())
            .collect();
        tracing::debug!(?keys, "dependency cycle");
        return Err(CycleError { keys });
    }
    tracing::trace!(?order, "resolved formula order");
    Ok(order)
}
