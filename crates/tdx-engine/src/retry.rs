//! 재연결 후 재시도.
//!
//! 서버 세션은 한 번 실패하면 상태를 믿을 수 없으므로, 실패할 때마다
//! 연결을 끊고 다시 연결한 뒤 같은 작업을 반복합니다.

use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, warn};

use tdx_core::RetryConfig;

use crate::client::{Endpoint, HqClient};
use crate::error::{ClientResult, EngineError, EngineResult};

/// 단일 연결 작업을 재시도하는 실행기.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    endpoint: Endpoint,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryExecutor {
    /// 재연결 대상과 최대 시도 횟수(첫 시도 포함)로 생성합니다.
    pub fn new(endpoint: Endpoint, max_attempts: u32) -> Self {
        Self {
            endpoint,
            max_attempts: max_attempts.max(1),
            backoff: Duration::ZERO,
        }
    }

    /// 설정에서 생성합니다.
    pub fn from_config(endpoint: Endpoint, config: &RetryConfig) -> Self {
        Self::new(endpoint, config.max_attempts).with_backoff(config.backoff())
    }

    /// 재시도 사이에 고정 대기를 둡니다.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// 최대 시도 횟수.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 작업을 실행합니다.
    ///
    /// 실패할 때마다 `conn`을 재연결하고, `max_attempts`번 모두 실패하면
    /// 마지막 에러를 담은 [`EngineError::ExhaustedRetries`]를 반환합니다.
    ///
    /// ```ignore
    /// let bars = retry
    ///     .run(&mut conn, "get_security_bars", move |c| {
    ///         let code = code.clone();
    ///         Box::pin(async move { c.get_security_bars(9, Exchange::Sh, &code, 0, 800).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run<C, T, F>(&self, conn: &mut C, operation: &str, mut op: F) -> EngineResult<T>
    where
        C: HqClient,
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, ClientResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op(conn).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "재시도 성공");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                retryable = err.is_retryable(),
                error = %err,
                "작업 실패, 재연결합니다"
            );
            self.reconnect(conn).await;

            if attempt >= self.max_attempts {
                return Err(EngineError::ExhaustedRetries {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }
            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }
    }

    async fn reconnect<C: HqClient>(&self, conn: &mut C) {
        if let Err(e) = conn.disconnect().await {
            debug!(error = %e, "재연결 전 해제 실패");
        }
        if let Err(e) = conn.connect(&self.endpoint).await {
            warn!(endpoint = %self.endpoint, error = %e, "재연결 실패");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::simulated::SimulatedServer;
    use tdx_core::Exchange;

    fn executor() -> RetryExecutor {
        RetryExecutor::new(Endpoint::new("127.0.0.1", 7709), 3)
    }

    #[tokio::test]
    async fn test_succeeds_after_two_failures() {
        let server = SimulatedServer::new();
        server.fail_next(2);
        let mut conn = server.client();
        conn.connect(&Endpoint::new("127.0.0.1", 7709)).await.unwrap();

        let count = executor()
            .run(&mut conn, "get_security_count", |c| {
                Box::pin(async move { c.get_security_count(Exchange::Sh).await })
            })
            .await
            .unwrap();

        assert_eq!(count, 0);
        // 최초 연결 1회 + 재연결 2회
        assert_eq!(server.stats().connects, 3);
        assert_eq!(server.stats().calls("get_security_count"), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_exactly_max_attempts() {
        let mut calls = 0u32;
        let server = SimulatedServer::new();
        let mut conn = server.client();

        let err = executor()
            .run(&mut conn, "always_fails", |_c| {
                calls += 1;
                Box::pin(async { Err::<(), _>(ClientError::Network("reset".into())) })
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 3);
        match err {
            EngineError::ExhaustedRetries {
                operation,
                attempts,
                source,
            } => {
                assert_eq!(operation, "always_fails");
                assert_eq!(attempts, 3);
                assert!(matches!(source, ClientError::Network(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let server = SimulatedServer::new();
        let mut conn = server.client();
        let started = tokio::time::Instant::now();

        let result = executor()
            .with_backoff(Duration::from_secs(1))
            .run(&mut conn, "always_fails", |_c| {
                Box::pin(async { Err::<(), _>(ClientError::Timeout("1s".into())) })
            })
            .await;

        assert!(result.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }
}
