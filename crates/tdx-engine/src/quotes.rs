//! 시세 스냅샷 배치 조회.
//!
//! 서버는 한 번에 최대 80종목의 시세만 돌려주므로 종목 목록을 잘라서
//! 요청합니다. 동시 조회 시 결과는 응답이 도착한 순서로 합쳐지며 입력
//! 순서를 보장하지 않습니다.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use tdx_core::{Quote, SecurityRef, MAX_QUOTE_BATCH};

use crate::client::HqClient;
use crate::error::{ClientError, ClientResult, EngineResult};
use crate::pool::ConnectionPool;
use crate::table::quotes_from_rows;

/// 시세 배치 조회기.
#[derive(Debug, Clone, Copy)]
pub struct QuoteBatcher {
    batch_size: usize,
}

impl Default for QuoteBatcher {
    fn default() -> Self {
        Self::new(MAX_QUOTE_BATCH)
    }
}

impl QuoteBatcher {
    /// 배치 크기를 지정합니다. 1 ~ 80 범위로 맞춰집니다.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_QUOTE_BATCH),
        }
    }

    /// 배치 크기.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 요청 단위로 자릅니다. 조각 수는 `ceil(n / batch_size)`입니다.
    pub fn chunks<'a>(&self, refs: &'a [SecurityRef]) -> std::slice::Chunks<'a, SecurityRef> {
        refs.chunks(self.batch_size)
    }

    /// 한 연결에서 배치를 차례로 조회합니다. 결과는 입력 순서입니다.
    pub async fn fetch_sequential<C: HqClient>(
        &self,
        conn: &mut C,
        refs: &[SecurityRef],
    ) -> ClientResult<Vec<Quote>> {
        let mut quotes = Vec::with_capacity(refs.len());
        for chunk in self.chunks(refs) {
            let rows = conn.get_security_quotes(chunk).await?;
            quotes.extend(quotes_from_rows(&rows)?);
        }
        debug!(requested = refs.len(), received = quotes.len(), "시세 조회 완료");
        Ok(quotes)
    }

    /// 풀의 연결들로 배치를 동시에 조회합니다.
    ///
    /// 동시에 진행되는 요청 수는 풀 크기를 넘지 않습니다.
    pub async fn fetch_concurrent<C: HqClient>(
        &self,
        pool: &ConnectionPool<C>,
        refs: &[SecurityRef],
    ) -> EngineResult<Vec<Quote>> {
        let requests = self.chunks(refs).map(|chunk| async move {
            let mut conn = pool.acquire().await?;
            let rows = conn.get_security_quotes(chunk).await?;
            let quotes = quotes_from_rows(&rows).map_err(ClientError::from)?;
            EngineResult::Ok(quotes)
        });

        let batches: Vec<Vec<Quote>> = stream::iter(requests)
            .buffer_unordered(pool.size().max(1))
            .try_collect()
            .await?;

        let quotes: Vec<Quote> = batches.into_iter().flatten().collect();
        debug!(
            requested = refs.len(),
            received = quotes.len(),
            connections = pool.size(),
            "동시 시세 조회 완료"
        );
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdx_core::Exchange;

    fn refs(n: usize) -> Vec<SecurityRef> {
        (0..n)
            .map(|i| SecurityRef::new(Exchange::Sz, format!("{:06}", i)))
            .collect()
    }

    #[test]
    fn test_chunk_sizes() {
        let batcher = QuoteBatcher::default();
        let sizes: Vec<usize> = batcher.chunks(&refs(245)).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![80, 80, 80, 5]);

        let sizes: Vec<usize> = batcher.chunks(&refs(160)).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![80, 80]);

        assert_eq!(batcher.chunks(&[]).count(), 0);
    }

    #[test]
    fn test_batch_size_is_capped() {
        assert_eq!(QuoteBatcher::new(500).batch_size(), 80);
        assert_eq!(QuoteBatcher::new(0).batch_size(), 1);
    }
}
