//! Builds the dependency tree of one root (or several, below a synthetic root) by recursively
//!  asking the virtual repository reader for declared dependencies and available versions.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_recursion::async_recursion;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactFilter, ArtifactMetadata, Scope};
use crate::maven::version::{VersionComparator, VersionSpec};
use crate::repository::virtual_reader::{ReaderError, VirtualRepositoryReader};
use crate::repository::QueryOutcome;
use crate::resolver::config::{MultiRootMode, ResolverConfig};
use crate::resolver::error::{DependencyChain, ResolutionError};
use crate::resolver::tree::{MetadataTree, NodeId};

pub const DUMMY_ROOT_GROUP: &str = "__virtual";
pub const DUMMY_ROOT_ARTIFACT: &str = "__root";

pub fn dummy_root_coordinate() -> ArtifactCoordinate {
    ArtifactCoordinate::new(DUMMY_ROOT_GROUP, DUMMY_ROOT_ARTIFACT, "0")
}

/// An externally supplied veto on candidate versions
pub trait ArtifactVeto: Send + Sync {
    /// `true` if the candidate must not become part of the tree
    fn veto(&self, candidate: &ArtifactMetadata) -> bool;
}
impl <F> ArtifactVeto for F where F: Fn(&ArtifactMetadata) -> bool + Send + Sync {
    fn veto(&self, candidate: &ArtifactMetadata) -> bool {
        self(candidate)
    }
}

type DependencyOutcome = Result<QueryOutcome<Vec<ArtifactCoordinate>>, ReaderError>;

/// inclusions and exclusions accumulated along a path from the root
#[derive(Default)]
struct Filters {
    exclusions: Vec<ArtifactFilter>,
    inclusions: Vec<ArtifactFilter>,
}
impl Filters {
    fn add(&mut self, coordinate: &ArtifactCoordinate) {
        self.exclusions.extend(coordinate.exclusions.iter().cloned());
        self.inclusions.extend(coordinate.inclusions.iter().cloned());
    }

    /// dropped silently, whatever its version
    fn drops_ga(&self, dependency: &ArtifactCoordinate) -> bool {
        if self.exclusions.iter().any(|f| f.is_ga_only() && f.matches_ga(dependency)) {
            return true;
        }
        !self.inclusions.is_empty() && !self.inclusions.iter().any(|f| f.matches_ga(dependency))
    }

    /// the reason a specific candidate version is vetoed, if it is
    fn veto_reason(&self, candidate: &ArtifactCoordinate, comparator: &VersionComparator) -> Option<String> {
        if let Some(f) = self.exclusions.iter().find(|f| f.matches(candidate, comparator)) {
            return Some(format!("excluded by {}", f));
        }
        let relevant: Vec<&ArtifactFilter> = self.inclusions.iter().filter(|f| f.matches_ga(candidate)).collect();
        if !relevant.is_empty() && !relevant.iter().any(|f| f.matches(candidate, comparator)) {
            return Some("not included".to_string());
        }
        None
    }

    fn fingerprint(&self) -> String {
        let mut parts: BTreeSet<String> = self.exclusions.iter().map(|f| format!("-{}", f)).collect();
        parts.extend(self.inclusions.iter().map(|f| format!("+{}", f)));
        parts.into_iter().collect::<Vec<_>>().join(",")
    }
}

/// One tree-building pass. The memo of built nodes and the prefetched dependency lists live
///  exactly as long as the pass.
pub struct TreeBuilder {
    reader: Arc<VirtualRepositoryReader>,
    config: ResolverConfig,
    vetoes: Vec<Arc<dyn ArtifactVeto>>,
    cancellation: CancellationToken,
    comparator: VersionComparator,
    scope: Scope,
    tree: MetadataTree,
    /// canonical coordinate + filter fingerprint -> first node built for it
    memo: HashMap<String, NodeId>,
    prefetched: HashMap<ArtifactCoordinate, DependencyOutcome>,
    /// number of circular dependencies pruned so far in this pass
    pruned_cycles: usize,
}
impl TreeBuilder {
    pub fn new(reader: Arc<VirtualRepositoryReader>, config: ResolverConfig, scope: Scope) -> TreeBuilder {
        let comparator = VersionComparator::new(config.snapshot_policy);
        TreeBuilder {
            reader,
            config,
            vetoes: Vec::new(),
            cancellation: CancellationToken::new(),
            comparator,
            scope,
            tree: MetadataTree::new(),
            memo: HashMap::new(),
            prefetched: HashMap::new(),
            pruned_cycles: 0,
        }
    }

    pub fn with_vetoes(mut self, vetoes: Vec<Arc<dyn ArtifactVeto>>) -> TreeBuilder {
        self.vetoes = vetoes;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> TreeBuilder {
        self.cancellation = cancellation;
        self
    }

    fn fresh(&self) -> TreeBuilder {
        TreeBuilder::new(self.reader.clone(), self.config.clone(), self.scope)
            .with_vetoes(self.vetoes.clone())
            .with_cancellation(self.cancellation.clone())
    }

    /// The tree below a single root. A root with a range or virtual version is resolved to its
    ///  best available version first.
    pub async fn build_tree(mut self, root: &ArtifactCoordinate) -> Result<MetadataTree, ResolutionError> {
        self.tree = MetadataTree::new();
        self.memo.clear();
        self.prefetched.clear();
        self.pruned_cycles = 0;

        let md = self.resolve_root(root).await?;
        debug!("building dependency tree of {} for scope {}", md.coordinate, self.scope);
        self.create_node(md, root.clone(), None).await?;

        let mut tree = std::mem::take(&mut self.tree);
        tree.renumber();
        Ok(tree)
    }

    /// One tree below a synthetic root for several roots. Roots excluded by the combined
    ///  exclusions, or not matching the combined inclusions of the other roots, are skipped.
    pub async fn build_multi_root_tree(mut self, roots: &[ArtifactCoordinate]) -> Result<MetadataTree, ResolutionError> {
        let roots = Self::admitted_roots(roots, &self.comparator);
        debug!("building dependency tree of {} roots ({:?})", roots.len(), self.config.multi_root_mode);

        match self.config.multi_root_mode {
            MultiRootMode::SeparateTrees => {
                let mut tree = MetadataTree::with_dummy_root(ArtifactMetadata::new(dummy_root_coordinate()));
                let dummy = NodeId(0);
                for root in roots {
                    let root_tree = self.fresh().build_tree(&root).await?;
                    tree.graft(&root_tree, dummy);
                }
                tree.renumber();
                Ok(tree)
            }
            MultiRootMode::CombinedTree => {
                let mut dummy = ArtifactMetadata::new(dummy_root_coordinate());
                dummy.dependencies = roots;
                dummy.resolved = true;

                self.tree = MetadataTree::new();
                self.tree.set_dummy_root(true);
                self.memo.clear();
                self.prefetched.clear();
                self.pruned_cycles = 0;
                let query = dummy.coordinate.clone();
                self.create_node(dummy, query, None).await?;

                let mut tree = std::mem::take(&mut self.tree);
                tree.renumber();
                Ok(tree)
            }
        }
    }

    fn admitted_roots(roots: &[ArtifactCoordinate], comparator: &VersionComparator) -> Vec<ArtifactCoordinate> {
        let mut result = Vec::new();
        for root in roots {
            let excluded = roots.iter()
                .flat_map(|r| r.exclusions.iter())
                .any(|f| f.matches(root, comparator));
            // a root's own inclusions govern its dependencies, not the root itself
            let inclusions: Vec<&ArtifactFilter> = roots.iter()
                .filter(|r| !r.inclusions.is_empty() && !r.same_ga(root))
                .flat_map(|r| r.inclusions.iter())
                .collect();
            let not_included = root.inclusions.is_empty()
                && !inclusions.is_empty()
                && !inclusions.iter().any(|f| f.matches(root, comparator));

            if excluded || not_included {
                debug!("skipping root {}: {}", root, if excluded { "excluded" } else { "not included" });
                continue;
            }
            if !result.contains(root) {
                result.push(root.clone());
            }
        }
        result
    }

    async fn resolve_root(&self, root: &ArtifactCoordinate) -> Result<ArtifactMetadata, ResolutionError> {
        match VersionSpec::parse(&root.version) {
            Err(e) => Err(ResolutionError::VersionConflictUnresolvable {
                coordinate: root.clone(),
                reason: format!("{:#}", e),
                chain: DependencyChain(vec![root.clone()]),
            }),
            Ok(VersionSpec::Exact(_)) => Ok(ArtifactMetadata::new(root.clone())),
            Ok(_) => {
                let mut results = self.reader.read_versions(std::slice::from_ref(root)).await?;
                // ascending; a virtual version yields a single entry anyway
                let best = match results.remove(root) {
                    Some(QueryOutcome::Found(versions)) => versions.into_iter().last(),
                    Some(QueryOutcome::Failed(e)) => return Err(ResolutionError::repository(root, &e, DependencyChain(vec![root.clone()]))),
                    _ => None,
                };
                match best {
                    Some(mut best) => {
                        let version = best.coordinate.version.clone();
                        best.coordinate = root.with_version(version);
                        trace!("root {} resolves to {}", root, best.coordinate);
                        Ok(best)
                    }
                    None => Err(ResolutionError::NotFound {
                        coordinate: root.clone(),
                        chain: DependencyChain(vec![root.clone()]),
                    }),
                }
            }
        }
    }

    fn chain_to(&self, parent: Option<NodeId>, leaf: &ArtifactCoordinate) -> DependencyChain {
        let mut chain = match parent {
            Some(parent) => self.tree.chain(parent),
            None => DependencyChain::default(),
        };
        chain.0.push(leaf.clone());
        chain
    }

    /// the filters that apply to the dependencies of `node`
    fn filters_below(&self, node: NodeId) -> Filters {
        let mut result = Filters::default();
        for id in std::iter::once(node).chain(self.tree.ancestors(node)) {
            result.add(&self.tree.node(id).query);
        }
        result
    }

    fn memo_key(&self, coordinate: &ArtifactCoordinate, parent: Option<NodeId>) -> String {
        let mut filters = match parent {
            Some(parent) => self.filters_below(parent),
            None => Filters::default(),
        };
        filters.add(coordinate);
        format!("{}|{}", coordinate.canonical(), filters.fingerprint())
    }

    /// whether copying the subtree below `parent` would put a GA below itself
    fn copy_would_cycle(&self, source: NodeId, parent: NodeId) -> bool {
        let ancestor_gas: Vec<String> = std::iter::once(parent)
            .chain(self.tree.ancestors(parent))
            .map(|id| self.tree.node(id).md.coordinate.ga())
            .collect();
        self.tree.subtree(source)
            .any(|id| ancestor_gas.contains(&self.tree.node(id).md.coordinate.ga()))
    }

    #[async_recursion]
    async fn create_node(&mut self, mut md: ArtifactMetadata, query: ArtifactCoordinate, parent: Option<NodeId>) -> Result<Option<NodeId>, ResolutionError> {
        if self.cancellation.is_cancelled() {
            return Err(ResolutionError::Cancelled);
        }

        if let Some(parent) = parent {
            let cycle = std::iter::once(parent)
                .chain(self.tree.ancestors(parent))
                .any(|id| self.tree.node(id).md.coordinate.same_ga(&md.coordinate));
            if cycle {
                let chain = self.chain_to(Some(parent), &md.coordinate);
                if self.config.allow_circular_dependencies {
                    warn!("pruning circular dependency on {}: {}", md.coordinate.ga(), chain);
                    self.pruned_cycles += 1;
                    return Ok(None);
                }
                return Err(ResolutionError::CircularDependency {
                    ga: md.coordinate.ga(),
                    chain,
                });
            }

            let key = self.memo_key(&md.coordinate, Some(parent));
            if let Some(&existing) = self.memo.get(&key) {
                if !self.copy_would_cycle(existing, parent) {
                    trace!("reusing subtree of {} below {}", md.coordinate, self.tree.node(parent).md.coordinate);
                    return Ok(Some(self.tree.copy_subtree(existing, parent)));
                }
            }
        }

        let is_dummy = parent.is_none() && self.tree.has_dummy_root();
        let declared = if is_dummy {
            std::mem::take(&mut md.dependencies)
        }
        else {
            self.fetch_dependencies(&md, parent).await?
        };

        // managed versions win over declared ones; the first of several equal declarations wins
        let mut seen = HashSet::new();
        let declared: Vec<ArtifactCoordinate> = declared.into_iter()
            .map(|dependency| match self.config.managed_version(&dependency) {
                Some(managed) if !is_dummy => {
                    trace!("managed version {} replaces {}", managed.version, dependency);
                    let mut result = dependency.with_version(managed.version.clone());
                    if !managed.exclusions.is_empty() {
                        result.exclusions = managed.exclusions.clone();
                    }
                    if !managed.inclusions.is_empty() {
                        result.inclusions = managed.inclusions.clone();
                    }
                    result
                }
                _ => dependency,
            })
            .filter(|dependency| {
                let first = seen.insert(dependency.canonical());
                if !first {
                    trace!("ignoring repeated declaration of {}", dependency);
                }
                first
            })
            .collect();

        md.dependencies = declared.clone();
        md.resolved = true;
        let memo_key = self.memo_key(&md.coordinate, parent);
        let node = self.tree.add_node(md, query, parent);

        let filters = self.filters_below(node);
        let dependencies: Vec<ArtifactCoordinate> = declared.into_iter()
            .filter(|d| {
                let in_scope = self.scope.encloses(d.effective_scope());
                if !in_scope {
                    trace!("{} is out of scope {}", d, self.scope);
                }
                in_scope
            })
            .filter(|d| {
                let dropped = filters.drops_ga(d);
                if dropped {
                    debug!("{} is excluded below {}", d.ga(), self.tree.node(node).md.coordinate);
                }
                !dropped
            })
            .collect();

        let children = if dependencies.is_empty() {
            Vec::new()
        }
        else {
            self.expand_versions(node, &dependencies, &filters).await?
        };

        self.prefetch(&children, node).await;

        let pruned_before = self.pruned_cycles;
        for (dependency, candidate) in children {
            self.create_node(candidate, dependency, Some(node)).await?;
        }

        // NB: a subtree with pruned cycles depends on its ancestors, so it can not be reused elsewhere
        if self.pruned_cycles == pruned_before {
            self.memo.entry(memo_key).or_insert(node);
        }
        Ok(Some(node))
    }

    async fn fetch_dependencies(&mut self, md: &ArtifactMetadata, parent: Option<NodeId>) -> Result<Vec<ArtifactCoordinate>, ResolutionError> {
        let outcome = match self.prefetched.remove(&md.coordinate) {
            Some(prefetched) => prefetched?,
            None => self.reader.read_dependencies(md).await?,
        };
        match outcome {
            QueryOutcome::Found(dependencies) => Ok(dependencies),
            QueryOutcome::NotFound => Err(ResolutionError::NotFound {
                coordinate: md.coordinate.clone(),
                chain: self.chain_to(parent, &md.coordinate),
            }),
            QueryOutcome::Failed(e) => Err(ResolutionError::repository(&md.coordinate, &e, self.chain_to(parent, &md.coordinate))),
        }
    }

    /// The candidate versions for each dependency of `node`, in declaration order, after
    ///  applying vetoes. Returns (declaration, candidate) pairs.
    async fn expand_versions(&self, node: NodeId, dependencies: &[ArtifactCoordinate], filters: &Filters) -> Result<Vec<(ArtifactCoordinate, ArtifactMetadata)>, ResolutionError> {
        let mut versions = self.reader.read_versions(dependencies).await?;

        let mut result = Vec::new();
        for dependency in dependencies {
            let chain = || self.chain_to(Some(node), dependency);

            let candidates = match versions.remove(dependency) {
                Some(QueryOutcome::Found(candidates)) if !candidates.is_empty() => candidates,
                Some(QueryOutcome::Failed(e)) => {
                    if dependency.optional {
                        warn!("skipping optional dependency {}: {:#}", dependency, e);
                        continue;
                    }
                    return Err(ResolutionError::repository(dependency, &e, chain()));
                }
                _ => {
                    if dependency.optional {
                        debug!("optional dependency {} not found", dependency);
                        continue;
                    }
                    return Err(ResolutionError::NotFound {
                        coordinate: dependency.clone(),
                        chain: chain(),
                    });
                }
            };

            let mut vetoed = Vec::new();
            let mut admitted = Vec::new();
            for mut candidate in candidates {
                let version = candidate.coordinate.version.clone();
                candidate.coordinate = dependency.with_version(version);

                let reason = filters.veto_reason(&candidate.coordinate, &self.comparator)
                    .or_else(|| self.vetoes.iter()
                        .any(|v| v.veto(&candidate))
                        .then(|| "vetoed by filter".to_string()));
                match reason {
                    Some(reason) => {
                        trace!("{} {}", candidate.coordinate, reason);
                        vetoed.push(format!("{} {}", candidate.version(), reason));
                    }
                    None => admitted.push(candidate),
                }
            }

            if admitted.is_empty() {
                if dependency.optional {
                    debug!("all versions of optional dependency {} are vetoed", dependency);
                    continue;
                }
                return Err(ResolutionError::VersionConflictUnresolvable {
                    coordinate: dependency.clone(),
                    reason: vetoed.join(", "),
                    chain: chain(),
                });
            }
            result.extend(admitted.into_iter().map(|candidate| (dependency.clone(), candidate)));
        }
        Ok(result)
    }

    /// Fetches the dependency lists of all children concurrently, so that the sequential
    ///  recursion below finds them ready. Results are keyed, so completion order does not matter.
    async fn prefetch(&mut self, children: &[(ArtifactCoordinate, ArtifactMetadata)], node: NodeId) {
        let wanted: Vec<ArtifactMetadata> = children.iter()
            .map(|(_, candidate)| candidate)
            .filter(|c| !self.prefetched.contains_key(&c.coordinate))
            .filter(|c| !self.memo.contains_key(&self.memo_key(&c.coordinate, Some(node))))
            .cloned()
            .collect();
        if wanted.len() < 2 {
            return;
        }

        trace!("prefetching dependencies of {} artifacts", wanted.len());
        let reader = self.reader.clone();
        let fetched: Vec<(ArtifactCoordinate, DependencyOutcome)> = futures::stream::iter(wanted)
            .map(|md| {
                let reader = reader.clone();
                async move {
                    let outcome = reader.read_dependencies(&md).await;
                    (md.coordinate, outcome)
                }
            })
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;
        self.prefetched.extend(fetched);
    }
}
