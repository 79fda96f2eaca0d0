//! Self-ping loop.
//!
//! Some hosting platforms put an idle web service to sleep, which would also
//! stop the worker. The loop requests the server's own health endpoint on a
//! fixed interval until cancelled.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const MAX_PING_TIMEOUT: Duration = Duration::from_secs(30);

/// The health URL to ping for a server bound to `addr`.
///
/// A wildcard bind address is replaced by the loopback address.
pub fn local_health_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}/health", SocketAddr::new(ip, addr.port()))
}

/// Pings `url` every `interval` until `cancel` fires.
///
/// The first ping happens one interval after start.
#[instrument(skip(client, cancel))]
pub async fn run_keepalive(
    client: reqwest::Client,
    url: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    if interval.is_zero() {
        warn!("Keep-alive interval is zero, not starting");
        return;
    }
    let now = tokio::time::Instant::now();
    let first = now.checked_add(interval).unwrap_or(now);
    let mut ticker = tokio::time::interval_at(first, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Keep-alive loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let request = client
            .get(&url)
            .timeout(interval.clamp(Duration::from_secs(1), MAX_PING_TIMEOUT))
            .send();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = request => result,
        };
        match result {
            Ok(response) if response.status().is_success() => debug!("Keep-alive ping ok"),
            Ok(response) => warn!(status = %response.status(), "Keep-alive ping failed"),
            Err(e) => warn!(error = %e, "Keep-alive ping failed"),
        }
    }

    info!("Keep-alive loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::routing::get;
    use tokio::net::TcpListener;

    #[test]
    fn wildcard_bind_pings_loopback() {
        assert_eq!(
            local_health_url("0.0.0.0:8000".parse().unwrap()),
            "http://127.0.0.1:8000/health"
        );
        assert_eq!(
            local_health_url("[::]:8000".parse().unwrap()),
            "http://[::1]:8000/health"
        );
        assert_eq!(
            local_health_url("10.0.0.5:9000".parse().unwrap()),
            "http://10.0.0.5:9000/health"
        );
    }

    #[tokio::test]
    async fn pings_until_cancelled() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/health",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "OK"
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_keepalive(
            reqwest::Client::new(),
            local_health_url(addr),
            Duration::from_millis(30),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("keep-alive did not stop")
            .unwrap();

        assert!(hits.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn zero_interval_returns_without_pinging() {
        let task = tokio::spawn(run_keepalive(
            reqwest::Client::new(),
            "http://127.0.0.1:9/health".to_string(),
            Duration::ZERO,
            CancellationToken::new(),
        ));
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("keep-alive did not return")
            .unwrap();
    }

    #[tokio::test]
    async fn huge_interval_waits_until_cancelled() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_keepalive(
            reqwest::Client::new(),
            "http://127.0.0.1:9/health".to_string(),
            Duration::MAX,
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_target_keeps_looping() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_keepalive(
            reqwest::Client::new(),
            "http://127.0.0.1:9/health".to_string(),
            Duration::from_millis(20),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
