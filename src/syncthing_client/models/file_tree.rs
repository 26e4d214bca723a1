//! In-memory file tree of one folder, built from the nested browse manifest.
//!
//! The manifest maps names either to `[modTime, size]` (a file) or to another
//! object (a directory). Nodes live in an arena and point to their parent by
//! [`NodeId`], so the tree owns everything and has no reference cycles.

use serde_json::{Map, Value};
use tracing::debug;

use super::event::value_as_u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    File { size: u64 },
    Directory { children: Vec<NodeId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileTreeNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl FileTreeNode {
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::File { size } => Some(size),
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::File { .. } => &[],
            NodeKind::Directory { children } => children,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileTree {
    folder_id: String,
    nodes: Vec<FileTreeNode>,
}

impl FileTree {
    const ROOT: NodeId = NodeId(0);

    /// Builds the whole tree in one top-down pass.
    ///
    /// Directories are expanded from an explicit work list, so nesting depth
    /// is bounded by memory rather than the call stack. Children keep the
    /// manifest's enumeration order.
    pub fn build(folder_id: impl Into<String>, manifest: &Value) -> Self {
        let mut tree = Self {
            folder_id: folder_id.into(),
            nodes: vec![FileTreeNode {
                name: String::new(),
                parent: None,
                kind: NodeKind::Directory {
                    children: Vec::new(),
                },
            }],
        };

        let mut pending: Vec<(NodeId, &Map<String, Value>)> = Vec::new();
        match manifest {
            Value::Object(entries) => pending.push((Self::ROOT, entries)),
            other => debug!(
                folder = %tree.folder_id,
                kind = json_kind(other),
                "Manifest is not an object, building empty tree"
            ),
        }

        while let Some((parent, entries)) = pending.pop() {
            for (name, value) in entries {
                let kind = match file_size(value) {
                    Some(size) => NodeKind::File { size },
                    None => NodeKind::Directory {
                        children: Vec::new(),
                    },
                };
                let child = tree.push(name, parent, kind);

                match value {
                    _ if tree.nodes[child.0].is_file() => {}
                    Value::Object(grandchildren) => pending.push((child, grandchildren)),
                    other => debug!(
                        folder = %tree.folder_id,
                        entry = %name,
                        kind = json_kind(other),
                        "Unexpected manifest entry, treating as empty directory"
                    ),
                }
            }
        }

        debug!(folder = %tree.folder_id, nodes = tree.nodes.len(), "Built file tree");
        tree
    }

    fn push(&mut self, name: &str, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FileTreeNode {
            name: name.to_string(),
            parent: Some(parent),
            kind,
        });
        if let NodeKind::Directory { children } = &mut self.nodes[parent.0].kind {
            children.push(id);
        }
        id
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    pub fn node(&self, id: NodeId) -> Option<&FileTreeNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(FileTreeNode::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(Self::ROOT).is_empty()
    }

    /// Path relative to the folder root, segments joined with `/`.
    /// The root itself has an empty path.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            if node.parent.is_some() {
                segments.push(node.name.as_str());
            }
            current = node.parent;
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Looks a node up by its `/`-separated relative path.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut current = Self::ROOT;
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            current = self
                .children(current)
                .iter()
                .copied()
                .find(|child| self.nodes[child.0].name == segment)?;
        }
        Some(current)
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.nodes
            .iter()
            .filter_map(FileTreeNode::size)
            .fold(0u64, u64::saturating_add)
    }
}

/// A file entry is an array whose second element is a number. Sizes that
/// are negative or fractional are clamped to whole bytes.
fn file_size(value: &Value) -> Option<u64> {
    let size = value.as_array()?.get(1).filter(|size| size.is_number())?;
    Some(value_as_u64(size).unwrap_or(0))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
