use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::maven::coordinates::ArtifactCoordinate;
use crate::maven::version::SnapshotPolicy;
use crate::resolver::error::ResolutionError;

pub const OPTION_ALLOW_CIRCULAR_DEPENDENCIES: &str = "allow.circular.dependencies";
pub const OPTION_MANAGED_VERSIONS: &str = "managed.versions";
pub const OPTION_SNAPSHOT_POLICY: &str = "snapshot.policy";
pub const OPTION_MULTI_ROOT_MODE: &str = "multi.root.mode";
pub const OPTION_MAX_CONCURRENT_FETCHES: &str = "max.concurrent.fetches";

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// How several root coordinates are resolved together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultiRootMode {
    /// one tree per root, grafted below a synthetic root
    #[default]
    SeparateTrees,
    /// the roots are the dependencies of a synthetic root, built as one tree
    CombinedTree,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// prune circular dependencies with a warning instead of failing
    pub allow_circular_dependencies: bool,
    /// GA -> coordinate whose version (and inclusions / exclusions, if any) replace those of
    ///  every declared dependency with that GA
    #[serde(deserialize_with = "deserialize_managed_versions")]
    pub managed_versions: BTreeMap<String, ArtifactCoordinate>,
    pub snapshot_policy: SnapshotPolicy,
    pub multi_root_mode: MultiRootMode,
    /// upper bound for concurrently prefetched dependency lists
    pub max_concurrent_fetches: usize,
}
impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            allow_circular_dependencies: false,
            managed_versions: BTreeMap::new(),
            snapshot_policy: SnapshotPolicy::default(),
            multi_root_mode: MultiRootMode::default(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}
impl ResolverConfig {
    pub fn with_managed_version(mut self, coordinate: ArtifactCoordinate) -> ResolverConfig {
        self.managed_versions.insert(coordinate.ga(), coordinate);
        self
    }

    pub fn managed_version(&self, coordinate: &ArtifactCoordinate) -> Option<&ArtifactCoordinate> {
        self.managed_versions.get(&coordinate.ga())
    }

    /// Sets a named option. Unknown names and values of the wrong shape are rejected, leaving
    ///  the configuration unchanged.
    pub fn set_option(&mut self, name: &str, value: Value) -> Result<(), ResolutionError> {
        match name {
            OPTION_ALLOW_CIRCULAR_DEPENDENCIES => {
                self.allow_circular_dependencies = as_bool(name, &value)?;
            }
            OPTION_MANAGED_VERSIONS => {
                let raw: BTreeMap<String, String> = serde_json::from_value(value)
                    .map_err(|e| ResolutionError::invalid_option(name, e.to_string()))?;
                self.managed_versions = parse_managed_versions(raw)
                    .map_err(|e| ResolutionError::invalid_option(name, format!("{:#}", e)))?;
            }
            OPTION_SNAPSHOT_POLICY => {
                self.snapshot_policy = serde_json::from_value(value)
                    .map_err(|e| ResolutionError::invalid_option(name, e.to_string()))?;
            }
            OPTION_MULTI_ROOT_MODE => {
                self.multi_root_mode = serde_json::from_value(value)
                    .map_err(|e| ResolutionError::invalid_option(name, e.to_string()))?;
            }
            OPTION_MAX_CONCURRENT_FETCHES => {
                self.max_concurrent_fetches = match value.as_u64() {
                    Some(n) if n > 0 => n as usize,
                    _ => return Err(ResolutionError::invalid_option(name, format!("expected a positive number, not {}", value))),
                };
            }
            _ => return Err(ResolutionError::invalid_option(name, "unknown option")),
        }
        Ok(())
    }
}

fn as_bool(name: &str, value: &Value) -> Result<bool, ResolutionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        other => Err(ResolutionError::invalid_option(name, format!("expected a boolean, not {}", other))),
    }
}

/// values are either a version or a full `group:artifact:version` coordinate of the key's GA
fn parse_managed_versions(raw: BTreeMap<String, String>) -> anyhow::Result<BTreeMap<String, ArtifactCoordinate>> {
    let mut result = BTreeMap::new();
    for (ga, value) in raw {
        let coordinate: ArtifactCoordinate = if value.contains(':') && !value.starts_with('[') && !value.starts_with('(') {
            value.parse()?
        }
        else {
            format!("{}:{}", ga, value).parse()?
        };
        if coordinate.ga() != ga {
            anyhow::bail!("managed version {} does not belong to {}", value, ga);
        }
        result.insert(ga, coordinate);
    }
    Ok(result)
}

fn deserialize_managed_versions<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, ArtifactCoordinate>, D::Error> {
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    parse_managed_versions(raw).map_err(serde::de::Error::custom)
}
