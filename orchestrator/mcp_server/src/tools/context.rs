//! Per-invocation execution context.
//!
//! Carries the injected control-plane handle plus the deadline and
//! cancellation signal every control-plane call runs under.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use control_plane_interface::{ControlPlane, ControlPlaneHandle};
use orchestrator_shared_types::{ControlPlaneError, Result};

/// Deadline applied to each control-plane call unless configured otherwise.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ToolContext {
    control_plane: ControlPlaneHandle,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(control_plane: ControlPlaneHandle) -> Self {
        Self {
            control_plane,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn control_plane(&self) -> &dyn ControlPlane {
        self.control_plane.as_ref()
    }

    pub fn handle(&self) -> &ControlPlaneHandle {
        &self.control_plane
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one control-plane call under this context's deadline and
    /// cancellation signal.
    pub async fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ControlPlaneError::Cancelled {
                operation: operation.to_string(),
            });
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ControlPlaneError::Cancelled {
                operation: operation.to_string(),
            }),
            result = tokio::time::timeout(self.call_timeout, call) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    warn!(
                        operation,
                        timeout_ms = self.call_timeout.as_millis() as u64,
                        "Control-plane call timed out"
                    );
                    Err(ControlPlaneError::DeadlineExceeded {
                        operation: operation.to_string(),
                        timeout: self.call_timeout,
                    })
                }
            },
        }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("call_timeout", &self.call_timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use control_plane::MockControlPlane;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_call_passes_result_through() {
        let ctx = ToolContext::new(Arc::new(MockControlPlane::new()));
        let ns = ctx
            .call("read namespace", ctx.control_plane().get_namespace("default"))
            .await
            .unwrap();
        assert_eq!(ns.metadata.name.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let cp = MockControlPlane::new().with_latency(Duration::from_secs(5));
        let ctx = ToolContext::new(Arc::new(cp)).with_call_timeout(Duration::from_millis(20));
        let err = ctx
            .call("read namespace", ctx.control_plane().get_namespace("default"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let cp = MockControlPlane::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = ToolContext::new(Arc::new(cp.clone())).with_cancellation(cancel);
        let err = ctx
            .call("read namespace", ctx.control_plane().get_namespace("default"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControlPlaneError::Cancelled {
                operation: "read namespace".to_string()
            }
        );
        assert!(cp.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_inflight_call() {
        let cp = MockControlPlane::new().with_latency(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let ctx = ToolContext::new(Arc::new(cp)).with_cancellation(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });
        let err = ctx
            .call("read pod", ctx.control_plane().get_pod("default", "web"))
            .await
            .unwrap_err();
        trigger.await.unwrap();
        assert!(matches!(err, ControlPlaneError::Cancelled { .. }));
    }
}
