#![deny(missing_docs)]
//! In-memory context store (C3): `ContextRecord`/`IntegrationCredential`
//! persistence, the parent-topic linking algorithm, and a pure
//! graph-view helper for the `/contexts/graph` shape.
//!
//! Mirrors `neuron-state-memory`'s `RwLock<HashMap<...>>` shape, scoped
//! per `UserId` the way that crate scopes per `Scope`.

mod credential;
mod graph;
mod store;

pub use credential::MemoryCredentialStore;
pub use graph::{build_graph, ContextEdge, ContextGraph};
pub use store::MemoryContextStore;
