//! IPC subsystem — s-expression control protocol over a Unix socket.
//!
//! Provides:
//! - `server`: socket listener, message framing, rate limiting, event broadcast
//! - `dispatch`: message parsing and routing to engine operations

pub mod dispatch;
pub mod server;

pub use server::IpcServer;
