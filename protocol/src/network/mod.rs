//! # Network Module
//!
//! The session layer the commit protocol runs on.
//!
//! ```text
//! session.rs: FlowMessaging / FlowSession collaborator traits, SessionError
//! memory.rs : in-process transport over tokio channels
//! ```
//!
//! The protocol only assumes sessions are reliable, ordered and
//! point-to-point. It applies its own receive deadlines, so a transport
//! never has to implement timeouts.

pub mod memory;
pub mod session;

pub use memory::{InMemoryMessaging, InMemoryNetwork, InMemorySession, InboundSession};
pub use session::{FlowMessaging, FlowSession, SessionError};
