//! Process tree signalling.
//!
//! On POSIX every launched command leads its own process group, so the
//! tree is addressed through the group id (equal to the leader's pid).
//! Windows has no process groups for this purpose; `taskkill /T` walks the
//! child list of the given pid instead, and launched commands are also put
//! in a job object so descendants stay reachable once the root has exited.
//!
//! All operations are best effort and idempotent: signalling a tree that
//! no longer exists is not an error.

#[cfg(windows)]
pub(crate) mod job;
mod tree;

pub use tree::{kill_tree, terminate_tree, tree_alive, ProcessTree};
