//! Default seeding and calculated values.

use serde::Serialize;
use serde_json::Value;

use crate::data::{FormData, strict_equals};
use crate::engine::Engine;
use crate::fallback;
use crate::schema::ComponentNode;
use crate::tree::{self, ContainerKind};

/// Result of running calculations to a fixed point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationOutcome {
    pub data: FormData,
    /// Passes actually run, including the final pass that changed nothing.
    pub passes: usize,
    /// `false` when the last permitted pass still changed a value.
    pub converged: bool,
}

/// Copies `defaultValue` into the snapshot for input nodes that have no entry.
pub fn seed_defaults(nodes: &[ComponentNode], data: &FormData) -> FormData {
    let mut next = data.clone();
    let mut seeded = 0usize;
    for node in tree::input_components(nodes) {
        let Some(default) = &node.default_value else {
            continue;
        };
        if !next.contains_key(&node.key) {
            next.insert(node.key.clone(), default.clone());
            seeded += 1;
        }
    }
    tracing::debug!(seeded, "seeded default values");
    next
}

/// Applies every `calculateValue` in traversal order, repeating until a pass
/// changes nothing or the configured pass limit is reached.
pub fn run(engine: &Engine, nodes: &[ComponentNode], data: &FormData) -> CalculationOutcome {
    let calculated = calculated_nodes(nodes);
    let mut next = data.clone();
    if calculated.is_empty() {
        return CalculationOutcome {
            data: next,
            passes: 0,
            converged: true,
        };
    }

    let max_passes = engine.config().max_calculation_passes;
    for pass in 1..=max_passes {
        let changed = calculation_pass(engine, &calculated, &mut next);
        tracing::debug!(pass, changed, "calculation pass");
        if !changed {
            return CalculationOutcome {
                data: next,
                passes: pass,
                converged: true,
            };
        }
    }

    tracing::warn!(
        passes = max_passes,
        "calculated values did not settle; keeping the last computed state"
    );
    CalculationOutcome {
        data: next,
        passes: max_passes,
        converged: false,
    }
}

/// Nodes taking part in a pass: input nodes with a key that either carry a
/// `calculateValue` or are grids whose row template does.
fn calculated_nodes(nodes: &[ComponentNode]) -> Vec<&ComponentNode> {
    tree::input_components(nodes)
        .into_iter()
        .filter(|node| node.calculate_value().is_some() || !grid_calculations(node).is_empty())
        .collect()
}

fn grid_calculations(node: &ComponentNode) -> Vec<&ComponentNode> {
    if ContainerKind::of(node) != ContainerKind::Grid {
        return Vec::new();
    }
    tree::input_components(tree::row_template(node))
        .into_iter()
        .filter(|child| child.calculate_value().is_some())
        .collect()
}

fn calculation_pass(engine: &Engine, calculated: &[&ComponentNode], next: &mut FormData) -> bool {
    let mut changed = false;
    for node in calculated {
        if let Some(code) = node.calculate_value() {
            let current = next.get(&node.key);
            let ctx = engine.context(next).with_value(current);
            let result = fallback::calculation(&node.key, engine.sandbox().value(code, &ctx));
            if let Some(result) = result
                && !strict_equals(Some(&result), current)
            {
                next.insert(node.key.clone(), result);
                changed = true;
            }
        }
        if calculate_rows(engine, node, next) {
            changed = true;
        }
    }
    changed
}

/// Runs row-template calculations for every row of a grid. Rows are rebuilt
/// and the grid value replaced only when some cell changed.
fn calculate_rows(engine: &Engine, grid: &ComponentNode, next: &mut FormData) -> bool {
    let templates = grid_calculations(grid);
    if templates.is_empty() {
        return false;
    }
    let Some(mut rows) = next.get(&grid.key).and_then(Value::as_array).cloned() else {
        return false;
    };

    let mut changed = false;
    for row in rows.iter_mut() {
        for child in &templates {
            let Some(code) = child.calculate_value() else {
                continue;
            };
            let result = {
                let current = row.get(&child.key);
                let ctx = engine
                    .context(next)
                    .with_row(Some(&*row))
                    .with_value(current);
                fallback::calculation(&child.key, engine.sandbox().value(code, &ctx))
            };
            let Some(result) = result else {
                continue;
            };
            if strict_equals(Some(&result), row.get(&child.key)) {
                continue;
            }
            if let Value::Object(cells) = &mut *row {
                cells.insert(child.key.clone(), result);
                changed = true;
            }
        }
    }

    if changed {
        next.insert(grid.key.clone(), Value::Array(rows));
    }
    changed
}
