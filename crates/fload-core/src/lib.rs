//! fload-core: fetch one remote object through a bounded window of range
//! requests, reassemble and optionally decrypt it, and keep enough on disk
//! to resume after a restart.

pub mod cipher;
pub mod config;
pub mod decode;
pub mod error;
pub mod location;
pub mod logging;
pub mod reassembly;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod transport;

pub use error::FailureReason;
pub use location::{CipherMaterial, Location, NodeId, ObjectKind, RemoteAddress, RemoteFile};
pub use session::{
    FinishedTransfer, Outcome, SessionBuilder, SessionHandle, SessionState, SessionSummary,
    TransferDelegate,
};
