//! RPC dispatch for the weftmesh management interface.
//!
//! The transport decodes a client call into a [`ManagementRequest`] and
//! hands it, with the requesting client's identity and a [`ReplyHandle`],
//! to the [`Dispatcher`]. Option dictionaries are parsed once, at this
//! boundary, into typed per-method structures; nothing reaches a manager
//! until every argument has validated.

#![forbid(unsafe_code)]

mod dispatcher;
mod options;
mod request;
mod timers;

pub use dispatcher::Dispatcher;
pub use options::{AddNodeOptions, OptionValue, ReprovisionOptions, ScanOptions};
pub use request::ManagementRequest;
pub use timers::TokioTimers;
