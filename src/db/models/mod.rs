// src/db/models/mod.rs

//! Catalog models
//!
//! One struct per catalog table, with the queries that read and write it.

mod depend;
mod extension;
mod feature;
mod function;
mod member;
mod namespace;
mod role;

pub use depend::{Dependency, DependencyType, ObjectClass};
pub use extension::Extension;
pub use feature::{Feature, FeatureEntry};
pub use function::Function;
pub use member::ExtensionMember;
pub use namespace::Namespace;
pub use role::Role;
