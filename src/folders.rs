//! Folder hierarchy: building it from a flat `LIST` and rendering it.

use crate::types::{FolderMode, FolderNode, FolderView, ListedFolder, TreeData, TreeNode};

/// Attribute given to hierarchy levels the server did not list itself.
pub const NOSELECT: &str = "\\Noselect";

/// Node type carried by every [`TreeNode`].
pub const TREE_NODE_TYPE: &str = "EmailFolder";

fn components(folder: &ListedFolder) -> Vec<&str> {
    let parts: Vec<&str> = match folder.delimiter.as_deref() {
        Some(delim) if !delim.is_empty() => folder
            .name
            .split(delim)
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    if parts.is_empty() {
        vec![folder.name.as_str()]
    } else {
        parts
    }
}

/// Build the folder hierarchy from the names a `LIST "" *` returned.
///
/// Siblings keep the order in which the server first mentioned them, and a level that is only
/// implied by a deeper name (`A/B` listed without `A`) is synthesized with [`NOSELECT`]. If the
/// server lists such a level later on, its real attributes replace the synthesized ones.
pub fn build_hierarchy(listed: &[ListedFolder]) -> Vec<FolderNode> {
    let mut roots: Vec<FolderNode> = Vec::new();
    for folder in listed {
        let parts = components(folder);
        let mut level = &mut roots;
        for (depth, part) in parts.iter().enumerate() {
            let last = depth + 1 == parts.len();
            let idx = match level.iter().position(|node| node.name == *part) {
                Some(idx) => idx,
                None => {
                    level.push(FolderNode {
                        name: part.to_string(),
                        path: parts[..=depth].join("."),
                        delimiter: folder.delimiter.clone(),
                        attributes: vec![NOSELECT.to_string()],
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            if last {
                level[idx].attributes = folder.attributes.clone();
            }
            level = &mut level[idx].children;
        }
    }
    roots
}

/// Depth-first paths, parents before their children.
pub fn flatten(nodes: &[FolderNode]) -> Vec<String> {
    fn walk(nodes: &[FolderNode], out: &mut Vec<String>) {
        for node in nodes {
            out.push(node.path.clone());
            walk(&node.children, out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}

/// Tree-widget nodes, with ids scoped by `connection_key`.
pub fn tree_nodes(nodes: &[FolderNode], connection_key: &str) -> Vec<TreeNode> {
    nodes
        .iter()
        .map(|node| TreeNode {
            id: format!("{}_folder_{}", connection_key, node.path),
            text: node.name.clone(),
            node_type: TREE_NODE_TYPE,
            data: TreeData {
                name: node.path.clone(),
                attribs: node.attributes.clone(),
                delimiter: node.delimiter.clone(),
            },
            children: tree_nodes(&node.children, connection_key),
        })
        .collect()
}

/// Shape a listing according to `mode`.
pub fn render(listed: &[ListedFolder], mode: FolderMode, connection_key: &str) -> FolderView {
    let hierarchy = build_hierarchy(listed);
    match mode {
        FolderMode::Flat => FolderView::Flat(flatten(&hierarchy)),
        FolderMode::Raw => FolderView::Raw(hierarchy),
        FolderMode::Tree => FolderView::Tree(tree_nodes(&hierarchy, connection_key)),
    }
}
