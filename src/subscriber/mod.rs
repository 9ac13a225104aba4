//! Subscriber directory: the identity (user id and role) each connection
//! declared in its `USER_CONNECT` handshake.

mod directory;
mod types;

pub use directory::SubscriberDirectory;
pub use types::{Role, RoleCounts, SubscriberIdentity};
