//! Dependency resolution: building the transitive dependency tree of one or more roots and
//!  collapsing it to a conflict free set of artifacts.

pub mod config;
pub mod conflict;
pub mod error;
pub mod tree;
pub mod tree_builder;

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactMetadata, Scope};
use crate::maven::version::VersionComparator;
use crate::repository::virtual_reader::{ReaderError, VirtualRepositoryReader};
use crate::resolver::config::ResolverConfig;
use crate::resolver::conflict::{default_comparators, ConflictResolver, ConflictSolver, NodeComparator, PreferenceSolver, Resolution};
use crate::resolver::error::ResolutionError;
use crate::resolver::tree::MetadataTree;
use crate::resolver::tree_builder::{ArtifactVeto, TreeBuilder};

pub struct DependencyResolver {
    reader: Arc<VirtualRepositoryReader>,
    config: ResolverConfig,
    vetoes: Vec<Arc<dyn ArtifactVeto>>,
    /// `None` means nearest wins, then newest wins
    comparators: Option<Vec<Arc<dyn NodeComparator>>>,
    solver: Arc<dyn ConflictSolver>,
    cancellation: CancellationToken,
}
impl DependencyResolver {
    /// `reader` must be initialized before the first resolution
    pub fn new(reader: Arc<VirtualRepositoryReader>, config: ResolverConfig) -> DependencyResolver {
        DependencyResolver {
            reader,
            config,
            vetoes: Vec::new(),
            comparators: None,
            solver: Arc::new(PreferenceSolver),
            cancellation: CancellationToken::new(),
        }
    }

    /// adds a veto on candidate versions
    pub fn with_filter(mut self, veto: impl ArtifactVeto + 'static) -> DependencyResolver {
        self.vetoes.push(Arc::new(veto));
        self
    }

    pub fn with_comparators(mut self, comparators: Vec<Arc<dyn NodeComparator>>) -> DependencyResolver {
        self.comparators = Some(comparators);
        self
    }

    pub fn with_solver(mut self, solver: Arc<dyn ConflictSolver>) -> DependencyResolver {
        self.solver = solver;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> DependencyResolver {
        self.cancellation = cancellation;
        self
    }

    /// see [`ResolverConfig::set_option`]
    pub fn set_option(&mut self, name: &str, value: Value) -> Result<(), ResolutionError> {
        self.config.set_option(name, value)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn reader(&self) -> &Arc<VirtualRepositoryReader> {
        &self.reader
    }

    fn tree_builder(&self, scope: Scope) -> TreeBuilder {
        TreeBuilder::new(self.reader.clone(), self.config.clone(), scope)
            .with_vetoes(self.vetoes.clone())
            .with_cancellation(self.cancellation.clone())
    }

    fn conflict_resolver(&self) -> ConflictResolver {
        let version_comparator = VersionComparator::new(self.config.snapshot_policy);
        let comparators = self.comparators.clone()
            .unwrap_or_else(|| default_comparators(version_comparator));
        ConflictResolver::new(comparators, version_comparator)
            .with_solver(self.solver.clone())
    }

    /// the unresolved tree below a single root, numbered depth first
    pub async fn build_tree(&self, root: &ArtifactCoordinate, scope: Scope) -> Result<MetadataTree, ResolutionError> {
        self.tree_builder(scope).build_tree(root).await
    }

    /// Builds the tree of all roots and resolves conflicts. The result has exactly one entry per
    ///  GA, or the call fails with the first fatal problem.
    pub async fn resolve_with_report(&self, roots: &[ArtifactCoordinate], scope: Scope) -> Result<Resolution, ResolutionError> {
        let tree = match roots {
            [] => return Err(ReaderError::EmptyQuery.into()),
            [root] => self.build_tree(root, scope).await?,
            roots => self.tree_builder(scope).build_multi_root_tree(roots).await?,
        };
        if self.cancellation.is_cancelled() {
            return Err(ResolutionError::Cancelled);
        }

        debug!("resolving conflicts in a tree of {} nodes", tree.len());
        let resolution = self.conflict_resolver().resolve(tree);
        info!("resolved {} root(s) to {} artifacts", roots.len(), resolution.selected_count());
        Ok(resolution)
    }

    pub async fn resolve_conflicts(&self, roots: &[ArtifactCoordinate], scope: Scope) -> Result<Vec<ArtifactMetadata>, ResolutionError> {
        Ok(self.resolve_with_report(roots, scope).await?.to_list())
    }

    pub async fn resolve_conflicts_as_tree(&self, roots: &[ArtifactCoordinate], scope: Scope) -> Result<MetadataTree, ResolutionError> {
        Ok(self.resolve_with_report(roots, scope).await?.to_tree())
    }
}


#[cfg(test)]
mod test {
    use serde_json::json;
    use super::*;
    use crate::maven::coordinates::ArtifactFilter;
    use crate::repository::memory_repo::MemoryRepository;
    use crate::repository::version_cache::VersionCache;
    use crate::repository::Repository;
    use crate::test_support::{coord, init_logging, memory_repo};

    fn resolver_over(repo: MemoryRepository) -> (Arc<MemoryRepository>, DependencyResolver) {
        init_logging();
        let repo = Arc::new(repo);
        let reader = VirtualRepositoryReader::new(Arc::new(VersionCache::disabled()));
        reader.init(vec![Repository::Memory(repo.clone())]).unwrap();
        (repo, DependencyResolver::new(Arc::new(reader), ResolverConfig::default()))
    }

    fn gavs(list: &[ArtifactMetadata]) -> Vec<String> {
        list.iter().map(|md| md.coordinate.gav()).collect()
    }

    fn range_repo() -> MemoryRepository {
        memory_repo("repo", &[
            ("a:a:1.0", &["b:b:[1.0,2.0)"]),
            ("b:b:1.0", &[]),
            ("b:b:1.5", &[]),
            ("b:b:2.0", &[]),
        ])
    }

    #[tokio::test]
    async fn test_range_resolves_to_highest_contained_version() {
        let (_, resolver) = resolver_over(range_repo());
        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:1.5"]);
        assert_eq!(resolved[1].tracker, Some("repo".into()));
        assert!(resolved[0].resolved);
    }

    #[tokio::test]
    async fn test_build_tree_keeps_all_candidates() {
        let (_, resolver) = resolver_over(range_repo());
        let tree = resolver.build_tree(&coord("a:a:1.0"), Scope::Compile).await.unwrap();

        let nodes: Vec<(String, String, usize)> = tree.depth_first().into_iter()
            .map(|id| {
                let node = tree.node(id);
                (node.md.coordinate.gav(), node.query.gav(), node.number)
            })
            .collect();
        assert_eq!(nodes, vec![
            ("a:a:1.0".to_string(), "a:a:1.0".to_string(), 1),
            ("b:b:1.0".to_string(), "b:b:[1.0,2.0)".to_string(), 2),
            ("b:b:1.5".to_string(), "b:b:[1.0,2.0)".to_string(), 3),
        ]);
        assert_eq!(tree.node(tree.root().unwrap()).md.dependencies, vec![coord("b:b:[1.0,2.0)")]);
    }

    fn two_roots_repo() -> MemoryRepository {
        memory_repo("repo", &[
            ("x:x:1.0", &["z:z:1.0"]),
            ("y:y:1.0", &["z:z:2.0"]),
            ("z:z:1.0", &[]),
            ("z:z:2.0", &[]),
        ])
    }

    #[tokio::test]
    async fn test_multiple_roots_newest_wins() {
        let (_, resolver) = resolver_over(two_roots_repo());
        let resolved = resolver.resolve_conflicts(&[coord("x:x:1.0"), coord("y:y:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["x:x:1.0", "y:y:1.0", "z:z:2.0"]);
    }

    #[tokio::test]
    async fn test_multi_root_modes_are_equivalent() {
        let (_, mut resolver) = resolver_over(two_roots_repo());
        let roots = [coord("x:x:1.0"), coord("y:y:1.0")];

        let separate = resolver.resolve_conflicts(&roots, Scope::Compile).await.unwrap();
        resolver.set_option("multi.root.mode", json!("combined-tree")).unwrap();
        let combined = resolver.resolve_conflicts(&roots, Scope::Compile).await.unwrap();

        assert_eq!(gavs(&separate), gavs(&combined));
        let tree = resolver.resolve_conflicts_as_tree(&roots, Scope::Compile).await.unwrap();
        assert!(tree.has_dummy_root());
        assert_eq!(tree.len(), 4);
    }

    #[tokio::test]
    async fn test_excluded_root_is_skipped() {
        let (_, resolver) = resolver_over(two_roots_repo());
        let roots = [
            coord("x:x:1.0").with_exclusion(ArtifactFilter::ga("y", "y")),
            coord("y:y:1.0"),
        ];
        let resolved = resolver.resolve_conflicts(&roots, Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["x:x:1.0", "z:z:1.0"]);
    }

    fn cyclic_repo() -> MemoryRepository {
        memory_repo("repo", &[
            ("a:a:1.0", &["b:b:1.0"]),
            ("b:b:1.0", &["a:a:1.0", "c:c:1.0"]),
            ("c:c:1.0", &[]),
        ])
    }

    #[tokio::test]
    async fn test_circular_dependency_fails_by_default() {
        let (_, resolver) = resolver_over(cyclic_repo());
        let e = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap_err();

        match &e {
            ResolutionError::CircularDependency { ga, chain } => {
                assert_eq!(ga, "a:a");
                assert!(chain.contains_ga("a:a"));
                assert!(chain.contains_ga("b:b"));
            }
            other => panic!("unexpected error {}", other),
        }
        assert!(e.to_string().contains("required by b:b:1.0"));
    }

    #[tokio::test]
    async fn test_circular_dependency_is_pruned_when_allowed() {
        let (_, mut resolver) = resolver_over(cyclic_repo());
        resolver.set_option("allow.circular.dependencies", json!(true)).unwrap();

        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:1.0", "c:c:1.0"]);
    }

    #[tokio::test]
    async fn test_subtree_with_pruned_cycle_is_not_reused() {
        let repo = memory_repo("repo", &[
            ("r:r:1.0", &["x:x:1.0", "c:c:1.0"]),
            ("x:x:1.0", &["a:a:1.0"]),
            ("a:a:1.0", &["c:c:1.0"]),
            ("c:c:1.0", &["a:a:2.0"]),
            ("a:a:2.0", &[]),
        ]);
        let (_, mut resolver) = resolver_over(repo);
        resolver.set_option("allow.circular.dependencies", json!(true)).unwrap();

        let tree = resolver.build_tree(&coord("r:r:1.0"), Scope::Compile).await.unwrap();
        let nodes: Vec<(String, usize)> = tree.depth_first().into_iter()
            .map(|id| (tree.node(id).md.coordinate.gav(), tree.node(id).depth))
            .collect();
        assert_eq!(nodes, vec![
            ("r:r:1.0".to_string(), 0),
            ("x:x:1.0".to_string(), 1),
            ("a:a:1.0".to_string(), 2),
            ("c:c:1.0".to_string(), 3),
            ("c:c:1.0".to_string(), 1),
            ("a:a:2.0".to_string(), 2),
        ]);

        let resolved = resolver.resolve_conflicts(&[coord("r:r:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["r:r:1.0", "x:x:1.0", "c:c:1.0", "a:a:2.0"]);
    }

    #[tokio::test]
    async fn test_repeated_declaration() {
        let repo = memory_repo("repo", &[
            ("a:a:1.0", &["b:b:1.0", "b:b:1.0"]),
            ("b:b:1.0", &[]),
        ]);
        let (_, resolver) = resolver_over(repo);

        let tree = resolver.build_tree(&coord("a:a:1.0"), Scope::Compile).await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node(tree.root().unwrap()).md.dependencies, vec![coord("b:b:1.0")]);

        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:1.0"]);
    }

    #[tokio::test]
    async fn test_managed_version_merges_declarations() {
        let repo = memory_repo("repo", &[
            ("a:a:1.0", &["b:b:1.0", "b:b:1.1"]),
            ("b:b:1.0", &[]),
            ("b:b:1.1", &[]),
            ("b:b:2.0", &[]),
        ]);
        let (_, mut resolver) = resolver_over(repo);
        resolver.set_option("managed.versions", json!({"b:b": "2.0"})).unwrap();

        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:2.0"]);
    }

    #[tokio::test]
    async fn test_optional_dependency_may_be_missing() {
        let repo = memory_repo("repo", &[("a:a:1.0", &[]), ("c:c:1.0", &[])]);
        repo.add_dependencies(&coord("a:a:1.0"), vec![
            coord("missing:missing:1.0").with_optional(true),
            coord("c:c:1.0"),
        ]);
        let (_, resolver) = resolver_over(repo);

        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "c:c:1.0"]);
    }

    #[tokio::test]
    async fn test_mandatory_dependency_must_exist() {
        let repo = memory_repo("repo", &[("a:a:1.0", &["b:b:1.0"]), ("b:b:1.0", &["missing:missing:1.0"])]);
        let (_, resolver) = resolver_over(repo);

        let e = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap_err();
        match e {
            ResolutionError::NotFound { coordinate, chain } => {
                assert_eq!(coordinate.gav(), "missing:missing:1.0");
                let chain: Vec<String> = chain.coordinates().iter().map(|c| c.gav()).collect();
                assert_eq!(chain, vec!["a:a:1.0", "b:b:1.0", "missing:missing:1.0"]);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[tokio::test]
    async fn test_root_exclusion_applies_at_any_depth() {
        let repo = memory_repo("repo", &[
            ("a:a:1.0", &["b:b:1.0"]),
            ("b:b:1.0", &["c:c:1.0"]),
            ("c:c:1.0", &["z:z:1.0", "d:d:1.0"]),
            ("d:d:1.0", &[]),
            ("z:z:1.0", &[]),
        ]);
        let (_, resolver) = resolver_over(repo);

        let root = coord("a:a:1.0").with_exclusion(ArtifactFilter::ga("z", "z"));
        let resolved = resolver.resolve_conflicts(&[root], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:1.0", "c:c:1.0", "d:d:1.0"]);

        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert!(gavs(&resolved).contains(&"z:z:1.0".to_string()));
    }

    #[tokio::test]
    async fn test_version_vetoes() {
        let (_, resolver) = resolver_over(range_repo());
        let resolver = resolver.with_filter(|md: &ArtifactMetadata| md.version() == "1.5");
        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:1.0"]);

        let root = coord("a:a:1.0").with_exclusion(ArtifactFilter::ga("b", "b").with_version("[1.0,1.2)"));
        let e = resolver.resolve_conflicts(&[root], Scope::Compile).await.unwrap_err();
        assert!(matches!(e, ResolutionError::VersionConflictUnresolvable { .. }), "{}", e);
    }

    #[tokio::test]
    async fn test_inclusions() {
        let repo = memory_repo("repo", &[
            ("a:a:1.0", &["b:b:[1.0,2.0)", "c:c:1.0"]),
            ("b:b:1.0", &[]),
            ("b:b:1.5", &[]),
            ("c:c:1.0", &[]),
        ]);
        let (_, resolver) = resolver_over(repo);

        let root = coord("a:a:1.0").with_inclusion(ArtifactFilter::ga("b", "b").with_version("1.0"));
        let resolved = resolver.resolve_conflicts(&[root], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:1.0"]);
    }

    #[tokio::test]
    async fn test_managed_versions() {
        let (_, mut resolver) = resolver_over(range_repo());
        resolver.set_option("managed.versions", json!({"b:b": "2.0"})).unwrap();

        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "b:b:2.0"]);
    }

    #[tokio::test]
    async fn test_scope_filter() {
        let repo = memory_repo("repo", &[("a:a:1.0", &[]), ("c:c:1.0", &[]), ("t:t:1.0", &[])]);
        repo.add_dependencies(&coord("a:a:1.0"), vec![
            coord("c:c:1.0"),
            coord("t:t:1.0").with_scope(Scope::Test),
        ]);
        let (_, resolver) = resolver_over(repo);

        let compile = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&compile), vec!["a:a:1.0", "c:c:1.0"]);
        let test = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Test).await.unwrap();
        assert_eq!(gavs(&test), vec!["a:a:1.0", "c:c:1.0", "t:t:1.0"]);
    }

    #[tokio::test]
    async fn test_diamond_is_fetched_once() {
        let repo = memory_repo("repo", &[
            ("a:a:1.0", &["x:x:1.0", "y:y:1.0"]),
            ("x:x:1.0", &["z:z:1.0"]),
            ("y:y:1.0", &["z:z:1.0"]),
            ("z:z:1.0", &["d:d:1.0"]),
            ("d:d:1.0", &[]),
        ]);
        let (repo, resolver) = resolver_over(repo);

        let tree = resolver.build_tree(&coord("a:a:1.0"), Scope::Compile).await.unwrap();
        assert_eq!(tree.len(), 7);
        assert_eq!(repo.stats().dependencies(), 5);

        let resolved = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["a:a:1.0", "x:x:1.0", "z:z:1.0", "d:d:1.0", "y:y:1.0"]);
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let repo = memory_repo("repo", &[
            ("r:r:1.0", &["p:p:1.0", "q:q:1.0", "s:s:1.0"]),
            ("p:p:1.0", &["z:z:1.0", "w:w:2.0"]),
            ("q:q:1.0", &["z:z:3.0", "w:w:1.0"]),
            ("s:s:1.0", &["z:z:2.0", "w:w:3.0"]),
            ("z:z:1.0", &[]), ("z:z:2.0", &[]), ("z:z:3.0", &[]),
            ("w:w:1.0", &[]), ("w:w:2.0", &[]), ("w:w:3.0", &[]),
        ]);
        let (_, resolver) = resolver_over(repo);

        let first = gavs(&resolver.resolve_conflicts(&[coord("r:r:1.0")], Scope::Compile).await.unwrap());
        for _ in 0..5 {
            assert_eq!(gavs(&resolver.resolve_conflicts(&[coord("r:r:1.0")], Scope::Compile).await.unwrap()), first);
        }
        assert_eq!(first, vec!["r:r:1.0", "p:p:1.0", "q:q:1.0", "z:z:3.0", "s:s:1.0", "w:w:3.0"]);
    }

    #[tokio::test]
    async fn test_latest_root() {
        let (_, resolver) = resolver_over(range_repo());
        let resolved = resolver.resolve_conflicts(&[coord("b:b:LATEST")], Scope::Compile).await.unwrap();
        assert_eq!(gavs(&resolved), vec!["b:b:2.0"]);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let (_, resolver) = resolver_over(range_repo());
        let token = CancellationToken::new();
        let resolver = resolver.with_cancellation(token.clone());
        token.cancel();

        let e = resolver.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await.unwrap_err();
        assert!(matches!(e, ResolutionError::Cancelled));
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let (_, resolver) = resolver_over(range_repo());
        assert!(matches!(resolver.resolve_conflicts(&[], Scope::Compile).await, Err(ResolutionError::Structural(ReaderError::EmptyQuery))));

        let uninitialized = DependencyResolver::new(Arc::new(VirtualRepositoryReader::new(Arc::new(VersionCache::disabled()))), ResolverConfig::default());
        assert!(matches!(
            uninitialized.resolve_conflicts(&[coord("a:a:1.0")], Scope::Compile).await,
            Err(ResolutionError::Structural(ReaderError::NotInitialized))
        ));
    }
}
