//! Health, readiness and metrics endpoints of a manager.
//!
//! Each endpoint is an axum [`Router`] served on its own listener until the
//! manager's run scope is cancelled.

use crate::types::{Error, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Address value meaning "endpoint disabled".
pub const DISABLED_ADDR: &str = "0";

/// A named health or readiness check.
pub type Check = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Check that always passes.
pub fn ping() -> Check {
    Arc::new(|| -> Result<()> { Ok(()) })
}

/// Ordered set of named checks behind one endpoint.
#[derive(Clone, Default)]
pub struct Checks {
    entries: Vec<(String, Check)>,
}

impl fmt::Debug for Checks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Checks {
    pub fn add(&mut self, name: impl Into<String>, check: Check) -> Result<()> {
        let name = name.into();
        if self.entries.iter().any(|(known, _)| known == &name) {
            return Err(Error::build(format!("check {name:?} already registered")));
        }
        self.entries.push((name, check));
        Ok(())
    }

    /// Run every check; the first failure is reported by name.
    pub fn run(&self) -> std::result::Result<(), String> {
        for (name, check) in &self.entries {
            if let Err(e) = check() {
                return Err(format!("[-]{name} failed: {e}"));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Checks behind `/healthz` and `/readyz`.
#[derive(Debug, Clone, Default)]
pub struct ProbeResponder {
    pub healthz: Checks,
    pub readyz: Checks,
}

impl ProbeResponder {
    /// Routes for both check sets. Other paths answer 404.
    pub fn router(self) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz))
            .with_state(Arc::new(self))
    }
}

async fn healthz(State(checks): State<Arc<ProbeResponder>>) -> (StatusCode, String) {
    check_response(&checks.healthz)
}

async fn readyz(State(checks): State<Arc<ProbeResponder>>) -> (StatusCode, String) {
    check_response(&checks.readyz)
}

fn check_response(checks: &Checks) -> (StatusCode, String) {
    match checks.run() {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(failure) => (StatusCode::INTERNAL_SERVER_ERROR, failure),
    }
}

pub fn is_disabled(addr: &str) -> bool {
    addr.is_empty() || addr == DISABLED_ADDR
}

/// Bind an endpoint listener. Disabled addresses yield `None`.
pub async fn bind(addr: &str) -> Result<Option<TcpListener>> {
    if is_disabled(addr) {
        return Ok(None);
    }
    // ":8081" means all interfaces.
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    Ok(Some(TcpListener::bind(&addr).await?))
}

/// Serve `router` on `listener` until `cancel` fires.
pub async fn serve(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
    let local = listener.local_addr()?;
    tracing::debug!("endpoint_listening: addr={}", local);

    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    tracing::debug!("endpoint_stopped: addr={}", local);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tower::ServiceExt;

    async fn call(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn responder() -> ProbeResponder {
        let mut responder = ProbeResponder::default();
        responder.healthz.add("healthz", ping()).unwrap();
        responder
            .readyz
            .add("readyz", Arc::new(|| -> Result<()> { Err(Error::internal("warming up")) }))
            .unwrap();
        responder
    }

    #[test]
    fn test_checks_report_failing_name() {
        let mut checks = Checks::default();
        checks.add("healthz", ping()).unwrap();
        checks
            .add("store", Arc::new(|| -> Result<()> { Err(Error::store("unreachable")) }))
            .unwrap();
        let failure = checks.run().unwrap_err();
        assert!(failure.contains("store"));
        assert!(checks.add("healthz", ping()).is_err());
    }

    #[tokio::test]
    async fn test_check_routes() {
        let router = responder().router();

        assert_eq!(
            call(router.clone(), "/healthz").await,
            (StatusCode::OK, "ok".to_string())
        );

        let (status, body) = call(router.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("[-]readyz failed"));
        assert!(body.contains("warming up"));

        let (status, _) = call(router, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disabled_address_not_bound() {
        assert!(bind("0").await.unwrap().is_none());
        assert!(bind("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_serve_over_tcp_until_cancelled() {
        let listener = bind("127.0.0.1:0").await.unwrap().unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, responder().router(), cancel.clone()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("ok"));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
