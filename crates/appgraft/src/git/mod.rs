//! Git operations on the GitOps working tree.

pub mod auth;
pub mod parse;
pub mod repository;
pub mod types;

pub use repository::GitRepository;
pub use types::*;
