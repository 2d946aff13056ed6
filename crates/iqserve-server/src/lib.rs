//! iqserve-server: the rtl_tcp-compatible streaming server.
//!
//! Three pieces, composed top to bottom:
//!
//! - [`RadioSession`] -- the single control point over the tuner backend:
//!   parameter mirror, setter contract, sample pump with bit-depth
//!   reduction, hardware event republishing.
//! - [`connection`] -- one accepted socket, three cooperating tasks
//!   (transmit, command receive, disconnect coordination).
//! - [`StreamServer`] -- accept loop, command routing, sample fan-out,
//!   ordered startup and shutdown.

pub mod connection;
pub mod server;
pub mod session;

pub use connection::{ClientCommand, ConnectionHandle};
pub use server::{DEFAULT_PORT, ServerConfig, StreamServer};
pub use session::RadioSession;
