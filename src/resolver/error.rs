use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::maven::coordinates::ArtifactCoordinate;
use crate::repository::virtual_reader::ReaderError;

/// The "required by" path of a failing coordinate: the root first, the failing coordinate last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyChain(pub Vec<ArtifactCoordinate>);
impl DependencyChain {
    pub fn coordinates(&self) -> &[ArtifactCoordinate] {
        &self.0
    }

    pub fn leaf(&self) -> Option<&ArtifactCoordinate> {
        self.0.last()
    }

    pub fn contains_ga(&self, ga: &str) -> bool {
        self.0.iter().any(|c| c.ga() == ga)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl Display for DependencyChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for coordinate in self.0.iter().rev() {
            if first {
                write!(f, "{}", coordinate.gav())?;
                first = false;
            }
            else {
                write!(f, " <- required by {}", coordinate.gav())?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("{coordinate} was not found in any repository: {chain}")]
    NotFound {
        coordinate: ArtifactCoordinate,
        chain: DependencyChain,
    },
    #[error("circular dependency on {ga}: {chain}")]
    CircularDependency {
        ga: String,
        chain: DependencyChain,
    },
    #[error("no acceptable version of {coordinate} ({reason}): {chain}")]
    VersionConflictUnresolvable {
        coordinate: ArtifactCoordinate,
        reason: String,
        chain: DependencyChain,
    },
    #[error("reading {coordinate} failed ({message}): {chain}")]
    Repository {
        coordinate: ArtifactCoordinate,
        message: String,
        chain: DependencyChain,
    },
    #[error(transparent)]
    Structural(#[from] ReaderError),
    #[error("the resolution was cancelled")]
    Cancelled,
    #[error("invalid value for option {name}: {reason}")]
    InvalidOption {
        name: String,
        reason: String,
    },
}
impl ResolutionError {
    pub fn chain(&self) -> Option<&DependencyChain> {
        match self {
            ResolutionError::NotFound { chain, .. } => Some(chain),
            ResolutionError::CircularDependency { chain, .. } => Some(chain),
            ResolutionError::VersionConflictUnresolvable { chain, .. } => Some(chain),
            ResolutionError::Repository { chain, .. } => Some(chain),
            _ => None,
        }
    }

    pub(crate) fn repository(coordinate: &ArtifactCoordinate, e: &anyhow::Error, chain: DependencyChain) -> ResolutionError {
        ResolutionError::Repository {
            coordinate: coordinate.clone(),
            message: format!("{:#}", e),
            chain,
        }
    }

    pub(crate) fn invalid_option(name: &str, reason: impl Into<String>) -> ResolutionError {
        ResolutionError::InvalidOption {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
