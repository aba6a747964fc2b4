//! Transitive dependency resolution for Maven-style repositories.
//!
//! The crate builds a dependency tree for one or more root coordinates by asking an ordered
//!  list of repositories (local disk, in-memory, remote HTTP) for versions and dependency
//!  lists, and then collapses that tree into a conflict-free artifact list using
//!  nearest-wins / newest-wins tie-breaking.
//!
//! Entry points:
//! * [`repository::virtual_reader::VirtualRepositoryReader`] multiplexes the repositories
//! * [`resolver::DependencyResolver`] builds trees and resolves conflicts

pub mod maven;
pub mod repository;
pub mod resolver;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
