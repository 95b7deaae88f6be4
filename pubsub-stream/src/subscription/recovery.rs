//! Error recovery for a single subscription.
//!
//! Every error is reported to the [`ErrorSink`]. Errors whose code the
//! [`RecoveryPolicy`] classifies as transient additionally close the
//! subscription and schedule a reopen after the policy's flat delay, unless
//! the manager is shutting down.
//!
//! The recovery close runs under the shutdown gate, so a `stop` either sees it
//! finished or prevents it. It is separate from the close `stop` makes on
//! every tracked handle.

use std::sync::Arc;

use broker_client::{BrokerError, SubscriptionHandle};
use tokio::task::JoinHandle;

use super::shutdown::ShutdownSignal;
use crate::config::RecoveryPolicy;
use crate::sink::ErrorSink;

/// What [`ErrorRecovery::handle_error`] did with an error.
#[derive(Debug)]
pub enum RecoveryAction {
    /// The manager is shutting down; the error was only reported
    Suppressed,
    /// The error is not transient; it was only reported
    Forwarded,
    /// The handle was closed and a reopen timer is running
    ReopenScheduled(JoinHandle<()>),
}

/// Error callback bound to one subscription handle.
pub struct ErrorRecovery {
    subscription_id: String,
    handle: Arc<dyn SubscriptionHandle>,
    shutdown: ShutdownSignal,
    error_sink: Arc<dyn ErrorSink>,
    policy: RecoveryPolicy,
}

impl ErrorRecovery {
    pub fn new(
        subscription_id: impl Into<String>,
        handle: Arc<dyn SubscriptionHandle>,
        shutdown: ShutdownSignal,
        error_sink: Arc<dyn ErrorSink>,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            handle,
            shutdown,
            error_sink,
            policy,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Handle an error raised by the subscription.
    pub async fn handle_error(&self, error: BrokerError) -> RecoveryAction {
        self.error_sink.report(&self.subscription_id, &error);

        if self.shutdown.is_set() {
            tracing::debug!(
                subscription = %self.subscription_id,
                code = %error.code,
                "shutting down, not recovering"
            );
            return RecoveryAction::Suppressed;
        }

        if !self.policy.is_retryable(error.code) {
            return RecoveryAction::Forwarded;
        }

        let closed = self
            .shutdown
            .run_unless_set(async {
                tracing::warn!(
                    subscription = %self.subscription_id,
                    code = %error.code,
                    delay_ms = self.policy.reopen_delay.as_millis() as u64,
                    "transient subscription error, closing and scheduling reopen"
                );

                if let Err(close_error) = self.handle.close().await {
                    tracing::warn!(
                        subscription = %self.subscription_id,
                        "failed to close subscription: {}",
                        close_error
                    );
                    self.error_sink.report(&self.subscription_id, &close_error);
                }
            })
            .await;

        match closed {
            Some(()) => RecoveryAction::ReopenScheduled(self.schedule_reopen()),
            None => {
                tracing::debug!(
                    subscription = %self.subscription_id,
                    code = %error.code,
                    "shutdown requested before recovery close, not recovering"
                );
                RecoveryAction::Suppressed
            }
        }
    }

    fn schedule_reopen(&self) -> JoinHandle<()> {
        let subscription_id = self.subscription_id.clone();
        let handle = self.handle.clone();
        let shutdown = self.shutdown.clone();
        let error_sink = self.error_sink.clone();
        let delay = self.policy.reopen_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match shutdown.run_unless_set(handle.open()).await {
                None => {
                    tracing::debug!(
                        subscription = %subscription_id,
                        "shutdown requested during reopen delay, staying closed"
                    );
                }
                Some(Ok(())) => {
                    tracing::info!(subscription = %subscription_id, "subscription reopened");
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        subscription = %subscription_id,
                        "failed to reopen subscription: {}",
                        e
                    );
                    error_sink.report(&subscription_id, &e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_client::{EventReceiver, StatusCode};
    use mockall::mock;
    use mockall::predicate::{always, eq};
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    mock! {
        Sink {}
        impl ErrorSink for Sink {
            fn report(&self, subscription_id: &str, error: &BrokerError);
        }
    }

    /// Handle that only counts close/open calls.
    #[derive(Default)]
    struct CountingHandle {
        closes: AtomicU32,
        opens: AtomicU32,
        fail_open: bool,
        close_delay: Duration,
    }

    #[async_trait]
    impl SubscriptionHandle for CountingHandle {
        fn name(&self) -> &str {
            "counting"
        }

        fn take_events(&self) -> Option<EventReceiver> {
            None
        }

        async fn close(&self) -> broker_client::Result<()> {
            if !self.close_delay.is_zero() {
                tokio::time::sleep(self.close_delay).await;
            }
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn open(&self) -> broker_client::Result<()> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(BrokerError::new(StatusCode::NotFound, "subscription deleted"));
            }
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    fn sink_expecting(times: usize) -> Arc<MockSink> {
        let mut sink = MockSink::new();
        sink.expect_report()
            .with(eq("create"), always())
            .times(times)
            .return_const(());
        Arc::new(sink)
    }

    fn recovery(
        handle: &Arc<CountingHandle>,
        shutdown: &ShutdownSignal,
        sink: Arc<MockSink>,
    ) -> ErrorRecovery {
        ErrorRecovery::new(
            "create",
            handle.clone(),
            shutdown.clone(),
            sink,
            RecoveryPolicy::default(),
        )
    }

    #[rstest]
    #[case(StatusCode::InvalidArgument)]
    #[case(StatusCode::NotFound)]
    #[case(StatusCode::PermissionDenied)]
    #[tokio::test]
    async fn test_non_retryable_error_is_forwarded_only(#[case] code: StatusCode) {
        let handle = Arc::new(CountingHandle::default());
        let recovery = recovery(&handle, &ShutdownSignal::new(), sink_expecting(1));

        let action = recovery.handle_error(BrokerError::new(code, "rejected")).await;

        assert!(matches!(action, RecoveryAction::Forwarded));
        assert_eq!(handle.closes.load(Ordering::SeqCst), 0);
        assert_eq!(handle.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_error_closes_then_reopens_after_delay() {
        let handle = Arc::new(CountingHandle::default());
        let recovery = recovery(&handle, &ShutdownSignal::new(), sink_expecting(1));

        let action = recovery
            .handle_error(BrokerError::new(StatusCode::DeadlineExceeded, "stream timed out"))
            .await;

        let RecoveryAction::ReopenScheduled(timer) = action else {
            panic!("expected a scheduled reopen");
        };
        // let the timer task start its sleep
        tokio::task::yield_now().await;
        assert_eq!(handle.closes.load(Ordering::SeqCst), 1);
        assert_eq!(handle.opens.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(4999)).await;
        tokio::task::yield_now().await;
        assert_eq!(handle.opens.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        timer.await.unwrap();
        assert_eq!(handle.opens.load(Ordering::SeqCst), 1);
        assert_eq!(handle.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutting_down_suppresses_recovery() {
        let handle = Arc::new(CountingHandle::default());
        let shutdown = ShutdownSignal::new();
        shutdown.trigger().await;
        let recovery = recovery(&handle, &shutdown, sink_expecting(1));

        let action = recovery
            .handle_error(BrokerError::new(StatusCode::Unavailable, "socket closed"))
            .await;

        assert!(matches!(action, RecoveryAction::Suppressed));
        assert_eq!(handle.closes.load(Ordering::SeqCst), 0);
        assert_eq!(handle.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_delay_cancels_reopen() {
        let handle = Arc::new(CountingHandle::default());
        let shutdown = ShutdownSignal::new();
        let recovery = recovery(&handle, &shutdown, sink_expecting(1));

        let action = recovery
            .handle_error(BrokerError::new(StatusCode::Internal, "stream reset"))
            .await;
        let RecoveryAction::ReopenScheduled(timer) = action else {
            panic!("expected a scheduled reopen");
        };
        // let the timer task start its sleep
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(1000)).await;
        shutdown.trigger().await;
        tokio::time::advance(Duration::from_millis(4000)).await;
        timer.await.unwrap();

        assert_eq!(handle.closes.load(Ordering::SeqCst), 1);
        assert_eq!(handle.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_waits_for_recovery_close() {
        let handle = Arc::new(CountingHandle {
            close_delay: Duration::from_millis(100),
            ..CountingHandle::default()
        });
        let shutdown = ShutdownSignal::new();
        let recovery = recovery(&handle, &shutdown, sink_expecting(1));

        let handling = tokio::spawn(async move {
            recovery
                .handle_error(BrokerError::new(StatusCode::Unavailable, "socket closed"))
                .await
        });
        // let the close start under the gate
        tokio::task::yield_now().await;

        let started = tokio::time::Instant::now();
        shutdown.trigger().await;
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(handle.closes.load(Ordering::SeqCst), 1);

        let RecoveryAction::ReopenScheduled(timer) = handling.await.unwrap() else {
            panic!("expected a scheduled reopen");
        };
        tokio::time::advance(Duration::from_millis(5000)).await;
        timer.await.unwrap();
        assert_eq!(handle.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reopen_is_reported() {
        let handle = Arc::new(CountingHandle {
            fail_open: true,
            ..CountingHandle::default()
        });
        let recovery = recovery(&handle, &ShutdownSignal::new(), sink_expecting(2));

        let action = recovery
            .handle_error(BrokerError::new(StatusCode::Aborted, "aborted"))
            .await;
        let RecoveryAction::ReopenScheduled(timer) = action else {
            panic!("expected a scheduled reopen");
        };
        // let the timer task start its sleep
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(5000)).await;
        timer.await.unwrap();
        assert_eq!(handle.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_opt_in_schedules_reopen() {
        let handle = Arc::new(CountingHandle::default());
        let recovery = ErrorRecovery::new(
            "create",
            handle.clone(),
            ShutdownSignal::new(),
            sink_expecting(1),
            RecoveryPolicy::default().with_not_found_retry(),
        );

        let action = recovery
            .handle_error(BrokerError::new(StatusCode::NotFound, "not provisioned yet"))
            .await;

        assert!(matches!(action, RecoveryAction::ReopenScheduled(_)));
        assert_eq!(handle.closes.load(Ordering::SeqCst), 1);
        assert_eq!(recovery.subscription_id(), "create");
    }
}
