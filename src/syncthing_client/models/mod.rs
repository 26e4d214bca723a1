mod connection;
mod event;
mod file_tree;
mod folder;
mod status;
mod sync_error;

pub use connection::Connection;
pub use event::{value_as_u64, Event, EventKind};
pub use file_tree::{FileTree, FileTreeNode, NodeId, NodeKind};
pub use folder::Folder;
pub use status::SystemStatus;
pub use sync_error::SyncError;
