//! memseg-scope: the liveness and ownership authority for native memory.
//!
//! Every segment access validates its scope first. Closing a scope runs its
//! cleanup actions (freeing native blocks, unmapping files) in reverse
//! registration order, once no acquire handle and no in-flight access remains.
//!
//! Lifecycle per scope:
//!
//! ```text
//! confined:  Alive ──close()──▶ Closed
//! shared:    Alive ──close()──▶ Closing ──handshake ok──▶ Closed
//!                                  └──handshake failed──▶ Alive
//! ```

mod cleanup;
mod confined;
pub mod error;
pub mod handle;
mod scope;
mod shared;
mod telemetry;

pub use cleanup::CloseAction;
pub use error::{Error, Result};
pub use handle::ScopeHandle;
pub use scope::{config, AccessGuard, ResourceScope, ScopeKind};
