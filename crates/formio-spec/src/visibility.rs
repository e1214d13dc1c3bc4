use std::collections::BTreeMap;

use serde_json::Value;

use crate::data::{FormData, strict_equals};
use crate::engine::Engine;
use crate::fallback;
use crate::schema::ComponentNode;
use crate::tree::{self, ContainerKind};

/// Field key (grid cells as `grid[row].field`) to visible.
pub type VisibilityMap = BTreeMap<String, bool>;

/// Decides whether `node` is hidden for the given snapshot.
///
/// Priority: static `hidden` flag, then `customConditional`, then the
/// declarative `conditional`, else visible. Inside a grid row `row` is the
/// row value; declarative conditions and the node's own value are read from
/// it.
pub fn is_hidden(engine: &Engine, node: &ComponentNode, data: &FormData, row: Option<&Value>) -> bool {
    if node.hidden {
        return true;
    }
    let scope = row.and_then(Value::as_object).unwrap_or(data);

    if let Some(code) = node.custom_conditional() {
        let value = node.has_key().then(|| scope.get(&node.key)).flatten();
        let ctx = engine.context(data).with_row(row).with_value(value);
        let visible = fallback::visibility(&node.key, engine.sandbox().conditional(code, &ctx));
        return !visible;
    }

    if let Some(conditional) = &node.conditional
        && let Some(when) = conditional.when_key()
    {
        let matched = strict_equals(scope.get(when), conditional.eq.as_ref());
        return if conditional.shows() { !matched } else { matched };
    }

    false
}

/// Resolves visibility for every keyed node. A hidden container hides its
/// whole subtree, grid template fields are resolved once per row.
pub fn resolve(engine: &Engine, nodes: &[ComponentNode], data: &FormData) -> VisibilityMap {
    let mut map = VisibilityMap::new();
    for node in nodes {
        resolve_node(engine, node, data, None, "", false, &mut map);
    }
    map
}

fn resolve_node(
    engine: &Engine,
    node: &ComponentNode,
    data: &FormData,
    row: Option<&Value>,
    prefix: &str,
    parent_hidden: bool,
    map: &mut VisibilityMap,
) {
    let hidden = parent_hidden || is_hidden(engine, node, data, row);
    if node.has_key() {
        map.insert(format!("{}{}", prefix, node.key), !hidden);
    }

    if ContainerKind::of(node) == ContainerKind::Grid && node.has_key() {
        let scope = row.and_then(Value::as_object).unwrap_or(data);
        let Some(rows) = scope.get(&node.key).and_then(Value::as_array) else {
            return;
        };
        for (index, row_value) in rows.iter().enumerate() {
            let row_prefix = format!("{}{}[{}].", prefix, node.key, index);
            for child in tree::row_template(node) {
                resolve_node(engine, child, data, Some(row_value), &row_prefix, hidden, map);
            }
        }
        return;
    }

    for (_, child) in tree::children(node) {
        resolve_node(engine, child, data, row, prefix, hidden, map);
    }
}
