//! Region collaborator adapters
//!
//! Stand-alone implementations of the region ports, used by the CLI host
//! and by tests. A full simulator would plug its grid services in here.

mod directory;
mod permissions;

pub use directory::InMemoryUserDirectory;
pub use permissions::EstatePermissions;
