pub mod checkpoint;
pub mod connection;
pub mod dispatcher;
pub mod registry;
pub mod session;
pub mod sweeper;

pub use checkpoint::{Arrival, Checkpoint};
pub use connection::ConnectionHandle;
pub use dispatcher::Dispatcher;
pub use registry::SessionRegistry;
pub use session::Session;
pub use sweeper::start_sweeper;
