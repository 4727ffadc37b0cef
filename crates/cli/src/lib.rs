//! Scan processor daemon and command support
//!
//! The `scanproc` binary is a thin clap front end over these modules.

pub mod daemon;
pub mod locks;
pub mod util;

pub use daemon::Daemon;
pub use locks::InstanceLock;
