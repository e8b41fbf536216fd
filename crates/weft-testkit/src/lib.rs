//! In-memory fakes for every collaborator interface of the weftmesh control
//! plane: key store, provisioning engine, client gateway, model sender,
//! beacon IO, and timers. Each fake records the calls it receives so tests
//! can assert on observable side effects.

#![forbid(unsafe_code)]

mod engine;
mod gateway;
mod io;
mod node;
mod store;

use tracing_subscriber::EnvFilter;

pub use engine::{EngineCall, FakeInitiator};
pub use gateway::{RecordingGateway, ReplySlot};
pub use io::{FakeBeacon, ManualTimers, RecordingSender, SentCommand};
pub use node::TestNode;
pub use store::{MemoryKeyStore, StoreOp};

/// Route `tracing` output of a test run through the `RUST_LOG` filter.
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
