//! 고정 크기 연결 풀.
//!
//! 모든 연결은 [`ConnectionPool::connect`]에서 한꺼번에 열리고
//! [`ConnectionPool::disconnect`]에서 한꺼번에 닫힙니다. 요청 도중 새 연결을
//! 만드는 일은 없습니다.
//!
//! 대여는 [`PooledConnection`] 가드로 표현되며, 가드가 drop되면 연결이
//! 유휴 큐 뒤쪽으로 돌아갑니다. 큐는 FIFO라서 경합이 없을 때 연결이
//! 차례대로 돌아가며 사용됩니다.

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::client::{Endpoint, HqClient};
use crate::error::{ClientError, EngineError, EngineResult};

struct PoolInner<C> {
    idle: Mutex<VecDeque<C>>,
    permits: Semaphore,
    size: usize,
}

impl<C> PoolInner<C> {
    fn release(&self, conn: C) {
        self.idle.lock().push_back(conn);
        self.permits.add_permits(1);
    }
}

/// 시세 서버 연결 풀.
pub struct ConnectionPool<C: HqClient> {
    inner: Arc<PoolInner<C>>,
}

impl<C: HqClient> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: HqClient> ConnectionPool<C> {
    /// 연결되지 않은 클라이언트들로 풀을 만듭니다.
    pub fn new(clients: Vec<C>) -> Self {
        let size = clients.len();
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(clients.into()),
                permits: Semaphore::new(size),
                size,
            }),
        }
    }

    /// 풀 크기.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// 현재 대여되지 않은 연결 수.
    pub fn idle(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// 모든 연결을 회수합니다. 대여 중인 연결이 있으면 반납될 때까지 기다립니다.
    async fn take_all(&self) -> EngineResult<Vec<C>> {
        let permits = self
            .inner
            .permits
            .acquire_many(self.inner.size as u32)
            .await
            .map_err(|_| EngineError::Client(ClientError::NotConnected))?;
        permits.forget();
        Ok(self.inner.idle.lock().drain(..).collect())
    }

    fn restore_all(&self, conns: Vec<C>) {
        let count = conns.len();
        self.inner.idle.lock().extend(conns);
        self.inner.permits.add_permits(count);
    }

    /// 모든 연결을 엽니다.
    ///
    /// 하나라도 실패하면 이미 열린 연결을 닫고 [`EngineError::Connection`]을
    /// 반환합니다.
    pub async fn connect(&self, endpoint: &Endpoint) -> EngineResult<()> {
        let mut conns = self.take_all().await?;

        let results = join_all(conns.iter_mut().map(|conn| conn.connect(endpoint))).await;
        let failure = results.iter().find_map(|r| r.as_ref().err()).cloned();

        if let Some(source) = failure {
            warn!(%endpoint, error = %source, "연결 풀 초기화 실패, 열린 연결을 닫습니다");
            for (conn, result) in conns.iter_mut().zip(&results) {
                if result.is_ok() {
                    if let Err(e) = conn.disconnect().await {
                        warn!(error = %e, "연결 해제 실패");
                    }
                }
            }
            self.restore_all(conns);
            return Err(EngineError::Connection {
                endpoint: endpoint.to_string(),
                source,
            });
        }

        info!(%endpoint, size = conns.len(), "연결 풀 준비 완료");
        self.restore_all(conns);
        Ok(())
    }

    /// 모든 연결을 닫습니다. 대여 중인 연결은 반납을 기다린 뒤 닫습니다.
    pub async fn disconnect(&self) -> EngineResult<()> {
        let mut conns = self.take_all().await?;
        for conn in conns.iter_mut() {
            if let Err(e) = conn.disconnect().await {
                warn!(error = %e, "연결 해제 실패");
            }
        }
        debug!(size = conns.len(), "연결 풀 해제");
        self.restore_all(conns);
        Ok(())
    }

    /// 연결 하나를 대여합니다. 모두 대여 중이면 반납될 때까지 기다립니다.
    pub async fn acquire(&self) -> EngineResult<PooledConnection<C>> {
        let permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| EngineError::Client(ClientError::NotConnected))?;
        permit.forget();

        let conn = self.inner.idle.lock().pop_front();
        match conn {
            Some(conn) => Ok(PooledConnection {
                conn: Some(conn),
                pool: Arc::clone(&self.inner),
            }),
            None => {
                // 허가를 얻었는데 큐가 비어 있으면 풀 상태가 깨진 것이다.
                self.inner.permits.add_permits(1);
                Err(EngineError::Client(ClientError::NotConnected))
            }
        }
    }
}

/// 대여된 연결. drop 시 풀에 반납됩니다.
pub struct PooledConnection<C: HqClient> {
    conn: Option<C>,
    pool: Arc<PoolInner<C>>,
}

impl<C: HqClient> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        // conn은 drop 전까지 항상 Some이다.
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C: HqClient> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C: HqClient> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{SimulatedHqClient, SimulatedServer};
    use std::time::Duration;

    fn pool_of(server: &SimulatedServer, size: usize) -> ConnectionPool<SimulatedHqClient> {
        ConnectionPool::new((0..size).map(|_| server.client()).collect())
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("127.0.0.1", 7709)
    }

    #[tokio::test]
    async fn test_connect_opens_every_member() {
        let server = SimulatedServer::new();
        let pool = pool_of(&server, 3);
        pool.connect(&endpoint()).await.unwrap();
        assert_eq!(server.stats().connects, 3);
        assert_eq!(server.open_sessions(), 3);

        pool.disconnect().await.unwrap();
        assert_eq!(server.open_sessions(), 0);
        assert_eq!(pool.idle(), 3);
    }

    #[tokio::test]
    async fn test_connect_failure_closes_opened_members() {
        let server = SimulatedServer::new();
        server.refuse_connects_after(2);
        let pool = pool_of(&server, 4);

        let err = pool.connect(&endpoint()).await.unwrap_err();
        assert!(matches!(err, EngineError::Connection { .. }));
        assert_eq!(server.open_sessions(), 0);
        assert_eq!(pool.idle(), 4);
    }

    #[tokio::test]
    async fn test_acquire_round_robin_and_release() {
        let server = SimulatedServer::new();
        let pool = pool_of(&server, 2);
        pool.connect(&endpoint()).await.unwrap();

        let first = pool.acquire().await.unwrap().id();
        let second = pool.acquire().await.unwrap().id();
        let third = pool.acquire().await.unwrap().id();
        assert_ne!(first, second);
        assert_eq!(first, third);
        assert_eq!(pool.idle(), 2);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let server = SimulatedServer::new();
        let pool = pool_of(&server, 1);
        pool.connect(&endpoint()).await.unwrap();

        let held = pool.acquire().await.unwrap();
        assert_eq!(pool.idle(), 0);

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.id()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let id = held.id();
        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), id);
    }

    #[tokio::test]
    async fn test_disconnect_waits_for_borrowed() {
        let server = SimulatedServer::new();
        let pool = pool_of(&server, 2);
        pool.connect(&endpoint()).await.unwrap();

        let held = pool.acquire().await.unwrap();
        let closing = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.disconnect().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!closing.is_finished());
        assert_eq!(server.open_sessions(), 2);

        drop(held);
        closing.await.unwrap().unwrap();
        assert_eq!(server.open_sessions(), 0);
    }
}
