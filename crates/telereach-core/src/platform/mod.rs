pub mod port;
pub mod types;

pub use port::{PlatformConnection, PlatformConnector};
pub use types::{GroupHandle, Member, PlatformError, PlatformResult};
