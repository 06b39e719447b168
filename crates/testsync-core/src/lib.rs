pub mod errors;
pub mod ids;
pub mod policy;
pub mod wire;

pub use errors::{SendError, SyncError};
pub use ids::{ConnectionIndex, SessionId};
pub use policy::AttachPolicy;
