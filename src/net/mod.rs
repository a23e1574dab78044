//! Transport layer: the unified connection abstraction and the two
//! listeners that feed it.

mod connection;
mod listener;

pub use connection::{BoxedIo, ClientConnection, ConnectionError, Transport};
pub use listener::serve;
