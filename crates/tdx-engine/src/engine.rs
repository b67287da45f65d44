//! 시세 엔진.
//!
//! 호출자가 사용하는 진입점입니다. 주 연결 하나를 항상 가지며,
//! `pool.size`가 1보다 크면 동시 시세 조회용 연결 풀을 함께 엽니다.
//!
//! # 예제
//!
//! ```ignore
//! let engine = Engine::new(EngineConfig::default().with_pool_size(4), || TcpHqClient::new())?;
//!
//! let bars = engine
//!     .session(|engine| {
//!         Box::pin(async move {
//!             engine.bars("600000", "1d", FetchWindow::since(start), false).await
//!         })
//!     })
//!     .await?;
//! ```

use chrono::{Local, NaiveDate};
use futures::future::BoxFuture;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

use tdx_core::{
    Bar, EngineConfig, Exchange, FetchWindow, Quote, SecurityInfo, SecurityRef, Tick, Timeframe,
};

use crate::client::{Endpoint, HqClient};
use crate::error::{EngineError, EngineResult};
use crate::paging::{BarKind, SeriesFetcher};
use crate::pool::ConnectionPool;
use crate::quotes::QuoteBatcher;
use crate::resample::Resampler;
use crate::retry::RetryExecutor;
use crate::securities::SecurityList;

/// 시세 엔진.
pub struct Engine<C: HqClient> {
    config: EngineConfig,
    endpoint: Endpoint,
    primary: Mutex<C>,
    pool: Option<ConnectionPool<C>>,
    /// 연결 여부. 연결/해제 전체를 직렬화하는 잠금이기도 하다.
    connected: Mutex<bool>,
    retry: RetryExecutor,
    fetcher: SeriesFetcher,
    batcher: QuoteBatcher,
    securities: OnceCell<SecurityList>,
}

impl<C: HqClient> Engine<C> {
    /// 엔진을 생성합니다. 연결은 [`Engine::connect`]에서 엽니다.
    ///
    /// `factory`는 주 연결 하나와 (동시 모드일 때) 풀 연결 `pool.size`개를
    /// 만드는 데 쓰입니다.
    pub fn new<F>(config: EngineConfig, mut factory: F) -> EngineResult<Self>
    where
        F: FnMut() -> C,
    {
        config.validate()?;

        let endpoint = Endpoint::from(&config.server);
        let primary = factory();
        let pool = config
            .pool
            .is_concurrent()
            .then(|| ConnectionPool::new((0..config.pool.size).map(|_| factory()).collect()));

        Ok(Self {
            retry: RetryExecutor::from_config(endpoint.clone(), &config.retry),
            fetcher: SeriesFetcher::from_config(&config.paging),
            batcher: QuoteBatcher::new(config.paging.quote_batch_size),
            endpoint,
            primary: Mutex::new(primary),
            pool,
            connected: Mutex::new(false),
            securities: OnceCell::new(),
            config,
        })
    }

    /// 엔진 설정.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 동시 조회 모드인지 확인합니다.
    pub fn is_concurrent(&self) -> bool {
        self.pool.is_some()
    }

    /// 연결 여부.
    pub async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }

    /// 주 연결과 (있으면) 풀의 모든 연결을 엽니다. 이미 연결되어 있으면 아무것도 하지 않습니다.
    pub async fn connect(&self) -> EngineResult<()> {
        let mut connected = self.connected.lock().await;
        if *connected {
            return Ok(());
        }

        {
            let mut primary = self.primary.lock().await;
            primary
                .connect(&self.endpoint)
                .await
                .map_err(|source| EngineError::Connection {
                    endpoint: self.endpoint.to_string(),
                    source,
                })?;
        }

        if let Some(pool) = &self.pool {
            if let Err(e) = pool.connect(&self.endpoint).await {
                if let Err(close_err) = self.primary.lock().await.disconnect().await {
                    warn!(error = %close_err, "주 연결 해제 실패");
                }
                return Err(e);
            }
        }

        *connected = true;
        info!(
            endpoint = %self.endpoint,
            pool_size = self.pool.as_ref().map_or(0, |p| p.size()),
            "시세 서버 연결"
        );
        Ok(())
    }

    /// 모든 연결을 닫습니다. 연결되어 있지 않으면 아무것도 하지 않습니다.
    pub async fn disconnect(&self) -> EngineResult<()> {
        let mut connected = self.connected.lock().await;
        if !*connected {
            return Ok(());
        }

        if let Err(e) = self.primary.lock().await.disconnect().await {
            warn!(error = %e, "주 연결 해제 실패");
        }
        if let Some(pool) = &self.pool {
            pool.disconnect().await?;
        }

        *connected = false;
        info!(endpoint = %self.endpoint, "시세 서버 연결 해제");
        Ok(())
    }

    /// 연결한 뒤 `f`를 실행하고, 결과와 관계없이 연결을 닫습니다.
    pub async fn session<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: for<'a> FnOnce(&'a Self) -> BoxFuture<'a, EngineResult<T>>,
    {
        self.connect().await?;
        let result = f(self).await;
        let closed = self.disconnect().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
        }
    }

    /// 서버 종목 목록. 처음 호출할 때 한 번 읽고 이후에는 캐시를 돌려줍니다.
    ///
    /// 읽기에 실패하면 캐시하지 않으므로 다음 호출에서 다시 시도합니다.
    pub async fn security_list(&self) -> EngineResult<&SecurityList> {
        self.securities
            .get_or_try_init(|| async {
                let mut primary = self.primary.lock().await;
                let list =
                    SecurityList::load(&mut *primary, self.config.paging.security_page_size)
                        .await?;
                info!(count = list.len(), "종목 목록 캐시");
                EngineResult::Ok(list)
            })
            .await
    }

    /// A주 보통주 목록.
    pub async fn stock_list(&self) -> EngineResult<Vec<&SecurityInfo>> {
        Ok(self.security_list().await?.stocks())
    }

    /// 종목 목록 기준 거래소.
    ///
    /// 목록에 없는 코드는 서버에 묻지 않고 [`EngineError::SecurityNotFound`]를 반환합니다.
    pub async fn security_type(&self, code: &str) -> EngineResult<Exchange> {
        self.security_list().await?.exchange_of(code)
    }

    /// 여러 종목의 시세.
    ///
    /// 종목 목록에 없는 코드는 버립니다. 동시 모드에서는 결과 순서가 보장되지
    /// 않습니다.
    #[instrument(skip(self, codes), fields(requested = codes.len()))]
    pub async fn quotes(&self, codes: &[&str]) -> EngineResult<Vec<Quote>> {
        let refs = self.security_list().await?.refs_for(codes);
        self.fetch_quotes(&refs).await
    }

    /// 전체 A주 보통주 시세.
    #[instrument(skip(self))]
    pub async fn stock_quotes(&self) -> EngineResult<Vec<Quote>> {
        let refs: Vec<SecurityRef> = self
            .stock_list()
            .await?
            .into_iter()
            .map(SecurityInfo::security_ref)
            .collect();
        self.fetch_quotes(&refs).await
    }

    async fn fetch_quotes(&self, refs: &[SecurityRef]) -> EngineResult<Vec<Quote>> {
        match &self.pool {
            Some(pool) => self.batcher.fetch_concurrent(pool, refs).await,
            None => {
                let mut primary = self.primary.lock().await;
                Ok(self.batcher.fetch_sequential(&mut *primary, refs).await?)
            }
        }
    }

    /// 서버 캔들 (일봉 `1d`/`day`, 1분봉 `1m`/`min`).
    ///
    /// 종목은 코드 접두어로, 지수는 종목 목록으로 거래소를 정합니다.
    /// 실패하면 재연결하며 재시도합니다.
    #[instrument(skip(self, window), fields(start = ?window.start, end = ?window.end))]
    pub async fn bars(
        &self,
        code: &str,
        frequency: &str,
        window: FetchWindow,
        is_index: bool,
    ) -> EngineResult<Vec<Bar>> {
        let category = frequency
            .parse::<Timeframe>()
            .ok()
            .and_then(|tf| tf.category_code())
            .ok_or_else(|| EngineError::UnsupportedFrequency(frequency.to_string()))?;

        let (kind, exchange) = if is_index {
            (BarKind::Index, self.security_type(code).await?)
        } else {
            (BarKind::Security, Exchange::infer(code))
        };
        let security = SecurityRef::new(exchange, code);
        let fetcher = self.fetcher;

        let mut primary = self.primary.lock().await;
        let bars = self
            .retry
            .run(&mut *primary, kind.operation(), move |conn| {
                let security = security.clone();
                Box::pin(async move {
                    fetcher
                        .fetch_bars(conn, kind, category, &security, window)
                        .await
                })
            })
            .await?;

        debug!(count = bars.len(), "캔들 조회 완료");
        Ok(bars)
    }

    /// 과거 거래일 하루의 체결. 거래소는 코드 접두어로 정합니다.
    pub async fn history_ticks(&self, code: &str, date: NaiveDate) -> EngineResult<Vec<Tick>> {
        let security = SecurityRef::new(Exchange::infer(code), code);
        let fetcher = self.fetcher;

        let mut primary = self.primary.lock().await;
        self.retry
            .run(&mut *primary, "get_history_transaction_data", move |conn| {
                let security = security.clone();
                Box::pin(async move { fetcher.fetch_history_ticks(conn, &security, date).await })
            })
            .await
    }

    /// 체결 데이터로 재구성한 캔들.
    ///
    /// `start`부터 `end`까지(양끝 포함) 달력일마다 그날의 체결을 받아 재구성하고,
    /// 체결이 없는 날(휴장일 등)은 건너뜁니다.
    #[instrument(skip(self))]
    pub async fn intraday_series(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: &str,
    ) -> EngineResult<Vec<Bar>> {
        let resampler = Resampler::new(frequency.parse::<Timeframe>()?);

        let mut bars = Vec::new();
        for date in start.iter_days().take_while(|date| *date <= end) {
            let ticks = self.history_ticks(code, date).await?;
            if ticks.is_empty() {
                debug!(%date, "체결 없음, 건너뜀");
                continue;
            }
            bars.extend(resampler.resample(&ticks));
        }

        debug!(count = bars.len(), "체결 기반 캔들 재구성 완료");
        Ok(bars)
    }

    /// 당일 체결 내역. 거래소는 종목 목록으로 정합니다.
    #[instrument(skip(self))]
    pub async fn time_and_price(&self, code: &str) -> EngineResult<Vec<Tick>> {
        let security = SecurityRef::new(self.security_type(code).await?, code);
        let today = Local::now().date_naive();
        let fetcher = self.fetcher;

        let mut primary = self.primary.lock().await;
        self.retry
            .run(&mut *primary, "get_transaction_data", move |conn| {
                let security = security.clone();
                Box::pin(async move { fetcher.fetch_today_ticks(conn, &security, today).await })
            })
            .await
    }
}
