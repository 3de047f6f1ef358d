//! Collaborators used by the `acp-client` binary: a permission policy and
//! a workspace-confined file handler.

pub mod files;
pub mod permission;

pub use files::WorkspaceFiles;
pub use permission::{PermissionPolicy, PolicyPermissions};
