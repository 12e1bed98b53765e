//! Shared application state.

use tokio::sync::Mutex;
use trustchain_enclave::{DirectoryStore, TrustEngine};

/// The engine behind one coarse mutex: the trust engine is single-threaded
/// by design, and the mutex is what upholds that on a multithreaded host.
/// Handlers hold the lock for the whole command.
pub struct AppState {
    pub engine: Mutex<TrustEngine<DirectoryStore>>,
}

pub type SharedState = std::sync::Arc<AppState>;
