//! Cancellation signal shared by the correlator and the responder.

use tokio::sync::watch;

/// Resolve once the signal reads `true`.
///
/// If every sender is dropped without signalling, never resolves.
pub async fn signalled(signal: &mut watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
