//! The dependency tree as an arena of nodes with index links.
//!
//! Nodes are appended in depth-first pre-order, so every subtree occupies a contiguous id
//!  range. That makes copying a memoized subtree an offset copy of that range.

use std::fmt::{Display, Formatter};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactMetadata};
use crate::resolver::error::DependencyChain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);
impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    /// 1-based depth-first index, assigned by [`MetadataTree::renumber`]
    pub number: usize,
    pub md: ArtifactMetadata,
    /// the declaration this node was created for, e.g. with a version range
    pub query: ArtifactCoordinate,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataTree {
    nodes: Vec<TreeNode>,
    /// the root is a synthetic node holding several independent roots
    dummy_root: bool,
}
impl MetadataTree {
    pub fn new() -> MetadataTree {
        Default::default()
    }

    pub fn with_dummy_root(md: ArtifactMetadata) -> MetadataTree {
        let mut result = MetadataTree { nodes: Vec::new(), dummy_root: true };
        let query = md.coordinate.clone();
        result.add_node(md, query, None);
        result
    }

    pub fn has_dummy_root(&self) -> bool {
        self.dummy_root
    }

    pub(crate) fn set_dummy_root(&mut self, dummy_root: bool) {
        self.dummy_root = dummy_root;
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() { None } else { Some(NodeId(0)) }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn is_dummy(&self, id: NodeId) -> bool {
        self.dummy_root && id.0 == 0
    }

    /// Appends a node as the last child of `parent`. `None` as parent is only valid for the
    ///  first node.
    pub fn add_node(&mut self, md: ArtifactMetadata, query: ArtifactCoordinate, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = parent.map(|p| self.nodes[p.0].depth + 1).unwrap_or(0);
        self.nodes.push(TreeNode {
            number: id.0 + 1,
            md,
            query,
            parent,
            children: Vec::new(),
            depth,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// the ancestors of a node, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.0].parent, move |&p| self.nodes[p.0].parent)
    }

    /// the coordinates from the (real) root down to `id`
    pub fn chain(&self, id: NodeId) -> DependencyChain {
        let mut result: Vec<ArtifactCoordinate> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|&n| !self.is_dummy(n))
            .map(|n| self.nodes[n.0].md.coordinate.clone())
            .collect();
        result.reverse();
        DependencyChain(result)
    }

    /// one past the last id of the subtree rooted at `id`
    pub fn subtree_end(&self, id: NodeId) -> usize {
        let depth = self.nodes[id.0].depth;
        self.nodes[id.0 + 1..].iter()
            .position(|n| n.depth <= depth)
            .map(|offset| id.0 + 1 + offset)
            .unwrap_or(self.nodes.len())
    }

    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        (id.0..self.subtree_end(id)).map(NodeId)
    }

    /// Appends a deep copy of the subtree at `source` below `parent`. The copy is independent:
    ///  changes to one occurrence do not affect the other.
    pub fn copy_subtree(&mut self, source: NodeId, parent: NodeId) -> NodeId {
        let end = self.subtree_end(source);
        let base = self.nodes.len();
        let new_depth = self.nodes[parent.0].depth + 1;
        let source_depth = self.nodes[source.0].depth;
        let relocate = |id: NodeId| NodeId(id.0 - source.0 + base);

        for i in source.0..end {
            let mut node = self.nodes[i].clone();
            node.parent = if i == source.0 { Some(parent) } else { node.parent.map(relocate) };
            node.children = node.children.iter().map(|&c| relocate(c)).collect();
            node.depth = node.depth - source_depth + new_depth;
            node.number = self.nodes.len() + 1;
            self.nodes.push(node);
        }

        let copy = NodeId(base);
        self.nodes[parent.0].children.push(copy);
        copy
    }

    /// Appends a copy of another tree (from its root) below `parent`
    pub fn graft(&mut self, other: &MetadataTree, parent: NodeId) -> Option<NodeId> {
        let other_root = other.root()?;
        let base = self.nodes.len();
        let new_depth = self.nodes[parent.0].depth + 1;
        let relocate = |id: NodeId| NodeId(id.0 + base);

        for node in &other.nodes {
            let mut node = node.clone();
            node.parent = match node.parent {
                None => Some(parent),
                Some(p) => Some(relocate(p)),
            };
            node.children = node.children.iter().map(|&c| relocate(c)).collect();
            node.depth += new_depth;
            node.number = self.nodes.len() + 1;
            self.nodes.push(node);
        }

        let root = relocate(other_root);
        self.nodes[parent.0].children.push(root);
        Some(root)
    }

    /// node ids in depth-first pre-order, children in declaration order
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root().into_iter().collect();
        while let Some(id) = stack.pop() {
            result.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev());
        }
        result
    }

    /// assigns unique increasing numbers in depth-first order, starting at 1
    pub fn renumber(&mut self) {
        for (i, id) in self.depth_first().into_iter().enumerate() {
            self.nodes[id.0].number = i + 1;
        }
    }

    /// A new tree with the nodes for which `keep` holds and whose ancestors are all kept,
    ///  renumbered. Node ids change.
    pub fn pruned(&self, keep: impl Fn(NodeId) -> bool) -> MetadataTree {
        let mut result = MetadataTree { nodes: Vec::new(), dummy_root: self.dummy_root };
        let root = match self.root() {
            Some(root) if keep(root) => root,
            _ => return result,
        };

        // (old id, new parent id)
        let mut stack = vec![(root, None)];
        while let Some((old, new_parent)) = stack.pop() {
            let node = &self.nodes[old.0];
            let new_id = result.add_node(node.md.clone(), node.query.clone(), new_parent);
            for &child in node.children.iter().rev() {
                if keep(child) {
                    stack.push((child, Some(new_id)));
                }
            }
        }
        result.renumber();
        result
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::coord;

    fn add(tree: &mut MetadataTree, gav: &str, parent: Option<NodeId>) -> NodeId {
        tree.add_node(ArtifactMetadata::new(coord(gav)), coord(gav), parent)
    }

    /// a -> (b -> (c, d), e)
    fn sample() -> MetadataTree {
        let mut tree = MetadataTree::new();
        let a = add(&mut tree, "g:a:1", None);
        let b = add(&mut tree, "g:b:1", Some(a));
        add(&mut tree, "g:c:1", Some(b));
        add(&mut tree, "g:d:1", Some(b));
        add(&mut tree, "g:e:1", Some(a));
        tree
    }

    fn gavs(tree: &MetadataTree, ids: impl IntoIterator<Item = NodeId>) -> Vec<String> {
        ids.into_iter().map(|id| tree.node(id).md.coordinate.gav()).collect()
    }

    #[test]
    fn test_structure() {
        let tree = sample();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.node(NodeId(2)).depth, 2);
        assert_eq!(gavs(&tree, tree.ancestors(NodeId(3))), vec!["g:b:1", "g:a:1"]);
        assert_eq!(tree.subtree_end(NodeId(1)), 4);
        assert_eq!(tree.subtree_end(NodeId(4)), 5);
        assert_eq!(tree.chain(NodeId(3)).to_string(), "g:d:1 <- required by g:b:1 <- required by g:a:1");
    }

    #[test]
    fn test_copy_subtree_is_independent() {
        let mut tree = sample();
        let copy = tree.copy_subtree(NodeId(1), NodeId(4));

        assert_eq!(copy, NodeId(5));
        assert_eq!(tree.len(), 8);
        assert_eq!(gavs(&tree, tree.subtree(copy)), vec!["g:b:1", "g:c:1", "g:d:1"]);
        assert_eq!(tree.node(copy).depth, 2);
        assert_eq!(tree.node(NodeId(6)).depth, 3);
        assert_eq!(tree.node(NodeId(6)).parent, Some(copy));
        assert_eq!(tree.node(copy).children, vec![NodeId(6), NodeId(7)]);
        assert_eq!(tree.node(NodeId(4)).children, vec![copy]);

        tree.node_mut(NodeId(6)).md.why = Some("changed".to_string());
        assert!(tree.node(NodeId(2)).md.why.is_none());
    }

    #[test]
    fn test_renumber_is_depth_first() {
        let mut tree = sample();
        tree.copy_subtree(NodeId(2), NodeId(4));
        tree.renumber();

        let numbered: Vec<(String, usize)> = tree.depth_first().into_iter()
            .map(|id| (tree.node(id).md.coordinate.gav(), tree.node(id).number))
            .collect();
        assert_eq!(numbered, vec![
            ("g:a:1".to_string(), 1),
            ("g:b:1".to_string(), 2),
            ("g:c:1".to_string(), 3),
            ("g:d:1".to_string(), 4),
            ("g:e:1".to_string(), 5),
            ("g:c:1".to_string(), 6),
        ]);
    }

    #[test]
    fn test_graft_and_prune() {
        let mut combined = MetadataTree::with_dummy_root(ArtifactMetadata::new(coord("x:root:0")));
        let dummy = combined.root().unwrap();
        combined.graft(&sample(), dummy);
        combined.graft(&sample(), dummy);

        assert_eq!(combined.len(), 11);
        assert_eq!(combined.node(NodeId(6)).parent, Some(dummy));
        assert_eq!(combined.node(NodeId(8)).depth, 3);
        assert!(combined.chain(NodeId(3)).coordinates().iter().all(|c| c.ga() != "x:root"));

        let pruned = combined.pruned(|id| id.0 < 6 && id.0 != 2);
        assert!(pruned.has_dummy_root());
        assert_eq!(gavs(&pruned, pruned.depth_first()), vec!["x:root:0", "g:a:1", "g:e:1"]);
    }
}
