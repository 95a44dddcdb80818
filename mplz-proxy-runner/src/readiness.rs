use mplz_proxy_core::{saturating_millis, ProxyError, Readiness, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Blocks until the worker at `addr` is assumed (delay) or known (probe)
/// to be listening.
pub async fn wait_until_ready(readiness: &Readiness, addr: &str) -> Result<()> {
    match *readiness {
        Readiness::Delay { delay_ms } => {
            info!(delay_ms, "Waiting for worker startup");
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(())
        }
        Readiness::Probe {
            timeout_ms,
            interval_ms,
        } => probe(addr, timeout_ms, interval_ms, || TcpStream::connect(addr)).await,
    }
}

// Each connect attempt is bounded by whatever is left of the overall
// timeout, so a hanging connect cannot outlive `timeout_ms`.
async fn probe<F, Fut, T>(addr: &str, timeout_ms: u64, interval_ms: u64, mut connect: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    let started = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let interval = Duration::from_millis(interval_ms.max(1));

    info!(addr, timeout_ms, "Probing worker port");

    loop {
        let remaining = timeout.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, connect()).await {
            Ok(Ok(_)) => {
                info!(
                    addr,
                    waited_ms = saturating_millis(started.elapsed()),
                    "Worker is accepting connections"
                );
                return Ok(());
            }
            Ok(Err(e)) => debug!(addr, error = %e, "Worker not listening yet"),
            Err(_) => debug!(addr, "Connect attempt timed out"),
        }

        let waited = started.elapsed();
        if waited >= timeout {
            let waited_ms = saturating_millis(waited);
            warn!(addr, waited_ms, "Worker never became ready");
            return Err(ProxyError::NotReady {
                addr: addr.to_string(),
                waited_ms,
            });
        }
        tokio::time::sleep(interval.min(timeout - waited)).await;
    }
}
