//! envbox-remote: an authenticated remote shell channel to the envbox
//! VM, with retry and cancellation.

mod auth;
mod error;
mod pipe;
mod retrying;
mod session;
mod term;

pub use error::{ExitError, RemoteError};
pub use pipe::{PipeHandles, PipeReader, PipeWriter};
pub use retrying::{connect_with_retry, exec_with_retry};
pub use session::RemoteSession;
pub use term::RawModeGuard;
