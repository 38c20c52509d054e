use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

async fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    Some(Fingerprint {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

/// Polls the state file and sends a notification whenever its size or
/// modification time changes. Appearing and disappearing count as changes.
/// The task ends once the receiver is dropped.
pub fn watch_state_file(
    path: PathBuf,
    poll_interval: Duration,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut last = fingerprint(&path).await;
        let mut interval = tokio::time::interval(poll_interval);
        interval.tick().await;

        loop {
            interval.tick().await;

            let current = fingerprint(&path).await;
            if current == last {
                continue;
            }
            tracing::debug!("State file {} changed", path.display());
            last = current;

            if tx.send(()).is_err() {
                tracing::debug!("State watcher for {} stopped", path.display());
                break;
            }
        }
    });

    (handle, rx)
}
