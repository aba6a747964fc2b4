//! Collapses a dependency tree to one version per GA.
//!
//! The policy is an ordered list of [`NodeComparator`]s: the first comparator that prefers one
//!  node over another decides, and the node number breaks remaining ties, so the preference
//!  order is total and does not depend on hashing or iteration order.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::maven::coordinates::ArtifactMetadata;
use crate::maven::version::VersionComparator;
use crate::resolver::tree::{MetadataTree, NodeId, TreeNode};

pub trait NodeComparator: Send + Sync {
    fn name(&self) -> &str;

    /// `Less` if `a` is preferred over `b`
    fn compare(&self, a: &TreeNode, b: &TreeNode) -> Ordering;
}

/// nearest wins: the shallower node is preferred
pub struct DepthComparator;
impl NodeComparator for DepthComparator {
    fn name(&self) -> &str {
        "nearest wins"
    }

    fn compare(&self, a: &TreeNode, b: &TreeNode) -> Ordering {
        a.depth.cmp(&b.depth)
    }
}

/// newest wins: the higher version is preferred
pub struct NewestComparator {
    comparator: VersionComparator,
}
impl NewestComparator {
    pub fn new(comparator: VersionComparator) -> NewestComparator {
        NewestComparator { comparator }
    }
}
impl NodeComparator for NewestComparator {
    fn name(&self) -> &str {
        "newest wins"
    }

    fn compare(&self, a: &TreeNode, b: &TreeNode) -> Ordering {
        self.comparator.compare(b.md.version(), a.md.version())
    }
}

/// nearest wins, then newest wins
pub fn default_comparators(comparator: VersionComparator) -> Vec<Arc<dyn NodeComparator>> {
    vec![
        Arc::new(DepthComparator),
        Arc::new(NewestComparator::new(comparator)),
    ]
}

fn preference(comparators: &[Arc<dyn NodeComparator>], a: &TreeNode, b: &TreeNode) -> Ordering {
    comparators.iter()
        .map(|c| c.compare(a, b))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| a.number.cmp(&b.number))
}

/// Picks the nodes that remain in the resolved tree
pub trait ConflictSolver: Send + Sync {
    /// The selected nodes, ascending. The result must contain the root, at most one node per GA,
    ///  and the parent of every selected node. Nodes are numbered uniquely on entry, and the
    ///  result must only depend on the tree and the comparators.
    fn solve(&self, tree: &MetadataTree, comparators: &[Arc<dyn NodeComparator>]) -> Vec<NodeId>;
}

/// Ranks all nodes once by the comparators, then repeatedly selects the best ranked node whose
///  parent is already selected. A node whose GA was decided before is dropped together with
///  its subtree.
pub struct PreferenceSolver;
impl ConflictSolver for PreferenceSolver {
    fn solve(&self, tree: &MetadataTree, comparators: &[Arc<dyn NodeComparator>]) -> Vec<NodeId> {
        let root = match tree.root() {
            Some(root) => root,
            None => return Vec::new(),
        };

        let mut ranked: Vec<NodeId> = tree.ids().collect();
        ranked.sort_by(|&a, &b| preference(comparators, tree.node(a), tree.node(b)));
        let mut rank = vec![0usize; tree.len()];
        for (i, id) in ranked.iter().enumerate() {
            rank[id.0] = i;
        }

        let mut decided: HashSet<String> = HashSet::new();
        if !tree.is_dummy(root) {
            decided.insert(tree.node(root).md.coordinate.ga());
        }

        let mut selected = vec![root];
        let mut frontier: BinaryHeap<Reverse<(usize, NodeId)>> = tree.node(root).children.iter()
            .map(|&c| Reverse((rank[c.0], c)))
            .collect();
        while let Some(Reverse((_, id))) = frontier.pop() {
            let node = tree.node(id);
            if !decided.insert(node.md.coordinate.ga()) {
                trace!("dropping {} (node {})", node.md.coordinate, node.number);
                continue;
            }
            selected.push(id);
            frontier.extend(node.children.iter().map(|&c| Reverse((rank[c.0], c))));
        }

        selected.sort();
        selected
    }
}


/// a GA for which the tree contained more than one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub ga: String,
    pub selected: String,
    /// ascending
    pub evicted: Vec<String>,
    /// name of the comparator that preferred the selected version
    pub policy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    /// ordered by GA
    pub conflicts: Vec<Conflict>,
}
impl ConflictReport {
    pub fn get(&self, ga: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.ga == ga)
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// The outcome of conflict resolution on a tree
#[derive(Debug, Clone)]
pub struct Resolution {
    tree: MetadataTree,
    selected: Vec<bool>,
    report: ConflictReport,
}
impl Resolution {
    /// the complete tree, including the nodes that lost
    pub fn tree(&self) -> &MetadataTree {
        &self.tree
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected.get(id.0).copied().unwrap_or(false)
    }

    /// one entry per GA in depth-first order, without a synthetic root
    pub fn to_list(&self) -> Vec<ArtifactMetadata> {
        self.tree.depth_first().into_iter()
            .filter(|&id| self.is_selected(id) && !self.tree.is_dummy(id))
            .map(|id| self.tree.node(id).md.clone())
            .collect()
    }

    /// the tree with every node that lost removed, renumbered
    pub fn to_tree(&self) -> MetadataTree {
        self.tree.pruned(|id| self.is_selected(id))
    }

    pub fn report(&self) -> &ConflictReport {
        &self.report
    }

    /// number of selected nodes, excluding a synthetic root
    pub fn selected_count(&self) -> usize {
        self.tree.ids()
            .filter(|&id| self.is_selected(id) && !self.tree.is_dummy(id))
            .count()
    }

    pub fn selected_version(&self, ga: &str) -> Option<&str> {
        self.tree.ids()
            .filter(|&id| self.is_selected(id))
            .map(|id| &self.tree.node(id).md)
            .find(|md| md.coordinate.ga() == ga)
            .map(|md| md.version())
    }
}

pub struct ConflictResolver {
    comparators: Vec<Arc<dyn NodeComparator>>,
    solver: Arc<dyn ConflictSolver>,
    version_comparator: VersionComparator,
}
impl ConflictResolver {
    pub fn new(comparators: Vec<Arc<dyn NodeComparator>>, version_comparator: VersionComparator) -> ConflictResolver {
        ConflictResolver {
            comparators,
            solver: Arc::new(PreferenceSolver),
            version_comparator,
        }
    }

    pub fn with_solver(mut self, solver: Arc<dyn ConflictSolver>) -> ConflictResolver {
        self.solver = solver;
        self
    }

    pub fn resolve(&self, mut tree: MetadataTree) -> Resolution {
        tree.renumber();

        let mut selected = vec![false; tree.len()];
        for id in self.solver.solve(&tree, &self.comparators) {
            selected[id.0] = true;
        }

        let report = self.report(&tree, &selected);
        for id in tree.ids().collect::<Vec<_>>() {
            if !selected[id.0] || tree.is_dummy(id) {
                continue;
            }
            let md = &mut tree.node_mut(id).md;
            md.why = Some(match report.get(&md.coordinate.ga()) {
                Some(conflict) => format!("{} over {}", conflict.policy, conflict.evicted.join(", ")),
                None => "no conflict".to_string(),
            });
        }
        debug!("resolved {} nodes to {} artifacts, {} conflicts", tree.len(), selected.iter().filter(|s| **s).count(), report.conflicts.len());

        Resolution { tree, selected, report }
    }

    fn report(&self, tree: &MetadataTree, selected: &[bool]) -> ConflictReport {
        let mut by_ga: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        for id in tree.ids().filter(|&id| !tree.is_dummy(id)) {
            by_ga.entry(tree.node(id).md.coordinate.ga()).or_default().push(id);
        }

        let mut conflicts = Vec::new();
        for (ga, ids) in by_ga {
            let winner = match ids.iter().find(|id| selected[id.0]) {
                Some(&winner) => tree.node(winner),
                None => continue,
            };
            let mut losers: Vec<&TreeNode> = ids.iter()
                .map(|&id| tree.node(id))
                .filter(|n| n.md.version() != winner.md.version())
                .collect();
            if losers.is_empty() {
                continue;
            }

            losers.sort_by(|a, b| preference(&self.comparators, a, b));
            let policy = self.comparators.iter()
                .find(|c| c.compare(winner, losers[0]) == Ordering::Less)
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "declaration order".to_string());

            let mut evicted: Vec<String> = losers.iter().map(|n| n.md.version().to_string()).collect();
            evicted.sort_by(|a, b| self.version_comparator.compare(a, b));
            evicted.dedup();

            conflicts.push(Conflict {
                ga,
                selected: winner.md.version().to_string(),
                evicted,
                policy,
            });
        }
        ConflictReport { conflicts }
    }
}
