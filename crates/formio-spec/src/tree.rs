//! Component tree traversal.
//!
//! Containers come in several shapes (`components`, `columns`, wizard `pages`,
//! grid row templates). [`children`] is the one place that knows how to reach a
//! node's children; every walk in the crate goes through it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::schema::ComponentNode;

/// Component types whose `components` describe one row of a list value.
pub const GRID_TYPES: &[&str] = &["datagrid", "editgrid"];

/// How a node holds its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Leaf,
    Nested,
    Columns,
    Pages,
    Grid,
}

impl ContainerKind {
    pub fn of(node: &ComponentNode) -> Self {
        if GRID_TYPES.contains(&node.kind.as_str()) {
            ContainerKind::Grid
        } else if node.kind == "wizard" {
            ContainerKind::Pages
        } else if node.kind == "columns" && !node.columns.is_empty() {
            ContainerKind::Columns
        } else if !node.components.is_empty() {
            ContainerKind::Nested
        } else {
            ContainerKind::Leaf
        }
    }
}

/// Children reached by a whole-form walk, in canonical order.
///
/// A columns node yields its own `components` first, then each column's
/// components left to right. Grid templates are not children here: their
/// values live inside row maps, see [`row_template`].
pub fn children(node: &ComponentNode) -> Vec<(String, &ComponentNode)> {
    match ContainerKind::of(node) {
        ContainerKind::Leaf | ContainerKind::Grid => Vec::new(),
        ContainerKind::Nested => indexed("", &node.components),
        ContainerKind::Columns => {
            let mut out = indexed("", &node.components);
            for (column_index, column) in node.columns.iter().enumerate() {
                out.extend(indexed(
                    &format!(".columns[{}]", column_index),
                    &column.components,
                ));
            }
            out
        }
        ContainerKind::Pages => {
            let mut out = indexed("", &node.components);
            out.extend(indexed(".pages", &node.pages));
            out
        }
    }
}

fn indexed<'a>(prefix: &str, nodes: &'a [ComponentNode]) -> Vec<(String, &'a ComponentNode)> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (format!("{}[{}]", prefix, index), node))
        .collect()
}

/// Row template of a grid node; empty for every other kind.
pub fn row_template(node: &ComponentNode) -> &[ComponentNode] {
    if ContainerKind::of(node) == ContainerKind::Grid {
        &node.components
    } else {
        &[]
    }
}

/// Controls descent during [`walk_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    Continue,
    SkipChildren,
}

/// Pre-order, depth-first walk over `nodes`, handing each node its path such
/// as `[0].columns[1][0]`.
pub fn walk<'a, F>(nodes: &'a [ComponentNode], mut visit: F)
where
    F: FnMut(&'a ComponentNode, &str),
{
    walk_with(nodes, |node, path| {
        visit(node, path);
        Descend::Continue
    });
}

/// Like [`walk`] but lets the visitor prune a subtree.
pub fn walk_with<'a, F>(nodes: &'a [ComponentNode], mut visit: F)
where
    F: FnMut(&'a ComponentNode, &str) -> Descend,
{
    for (index, node) in nodes.iter().enumerate() {
        walk_node(node, &format!("[{}]", index), &mut visit);
    }
}

fn walk_node<'a, F>(node: &'a ComponentNode, path: &str, visit: &mut F)
where
    F: FnMut(&'a ComponentNode, &str) -> Descend,
{
    if visit(node, path) == Descend::SkipChildren {
        return;
    }
    for (suffix, child) in children(node) {
        walk_node(child, &format!("{}{}", path, suffix), visit);
    }
}

/// Every node of the tree in traversal order.
pub fn flatten(nodes: &[ComponentNode]) -> Vec<&ComponentNode> {
    let mut out = Vec::new();
    walk(nodes, |node, _| out.push(node));
    out
}

/// Last node carrying `key` (duplicate keys resolve last-write-wins).
pub fn find_by_key<'a>(nodes: &'a [ComponentNode], key: &str) -> Option<&'a ComponentNode> {
    let mut found = None;
    walk(nodes, |node, _| {
        if node.key == key {
            found = Some(node);
        }
    });
    found
}

/// Input-bearing nodes with a key.
pub fn input_components(nodes: &[ComponentNode]) -> Vec<&ComponentNode> {
    flatten(nodes)
        .into_iter()
        .filter(|node| node.holds_value())
        .collect()
}

/// Keys of input nodes flagged required.
pub fn required_keys(nodes: &[ComponentNode]) -> Vec<String> {
    input_components(nodes)
        .into_iter()
        .filter(|node| node.is_required())
        .map(|node| node.key.clone())
        .collect()
}

/// Summary counts for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub total: usize,
    pub input_count: usize,
    pub type_distribution: BTreeMap<String, usize>,
}

pub fn stats(nodes: &[ComponentNode]) -> TreeStats {
    let all = flatten(nodes);
    let mut type_distribution = BTreeMap::new();
    for node in &all {
        *type_distribution.entry(node.kind.clone()).or_insert(0) += 1;
    }
    TreeStats {
        total: all.len(),
        input_count: all.iter().filter(|node| node.holds_value()).count(),
        type_distribution,
    }
}
