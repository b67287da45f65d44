//! 과거 시계열의 역방향 페이지 조회.
//!
//! 서버는 최신 데이터부터 `offset`을 세므로, 페이지를 하나씩 받아 앞쪽에
//! 붙여 나가면 오래된 순으로 정렬된 한 시계열이 됩니다. 조회 구간의 시작
//! 시각을 넘어선 페이지를 받으면 멈추고, 마지막에 구간 밖의 캔들을 잘라냅니다.

use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use tdx_core::{Bar, FetchWindow, PagingConfig, SecurityRef, Tick};

use crate::client::{HqClient, RawBar, RawTransaction};
use crate::error::ClientResult;
use crate::table::{bars_from_rows, parse_bar_datetime, ticks_from_rows};

/// 캔들 조회 대상.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarKind {
    /// 개별 종목
    Security,
    /// 지수
    Index,
}

impl BarKind {
    /// 로그와 에러에 쓰는 RPC 이름.
    pub fn operation(&self) -> &'static str {
        match self {
            BarKind::Security => "get_security_bars",
            BarKind::Index => "get_index_bars",
        }
    }
}

/// 페이지 단위 시계열 조회기.
#[derive(Debug, Clone, Copy)]
pub struct SeriesFetcher {
    bar_page_size: usize,
    tick_page_size: usize,
}

impl Default for SeriesFetcher {
    fn default() -> Self {
        Self::from_config(&PagingConfig::default())
    }
}

impl SeriesFetcher {
    /// 페이지 크기를 지정해 생성합니다.
    pub fn new(bar_page_size: usize, tick_page_size: usize) -> Self {
        Self {
            bar_page_size: bar_page_size.max(1),
            tick_page_size: tick_page_size.max(1),
        }
    }

    /// 설정에서 생성합니다.
    pub fn from_config(config: &PagingConfig) -> Self {
        Self::new(config.bar_page_size, config.tick_page_size)
    }

    /// 캔들을 조회합니다.
    ///
    /// 구간 시작보다 이른 캔들이 들어 있는 페이지까지 받은 뒤 멈추며,
    /// 결과는 `[start, end)`로 잘립니다. 데이터가 없을 때의 결과는
    /// [`assemble_bars`]를 참고하세요.
    pub async fn fetch_bars<C: HqClient>(
        &self,
        conn: &mut C,
        kind: BarKind,
        category: u8,
        security: &SecurityRef,
        window: FetchWindow,
    ) -> ClientResult<Vec<Bar>> {
        let mut pages: Vec<Vec<RawBar>> = Vec::new();
        let mut offset = 0;

        loop {
            let page = match kind {
                BarKind::Security => {
                    conn.get_security_bars(
                        category,
                        security.exchange,
                        &security.code,
                        offset,
                        self.bar_page_size,
                    )
                    .await?
                }
                BarKind::Index => {
                    conn.get_index_bars(
                        category,
                        security.exchange,
                        &security.code,
                        offset,
                        self.bar_page_size,
                    )
                    .await?
                }
            };
            if page.is_empty() {
                break;
            }

            let oldest = page.first().map(|row| parse_bar_datetime(&row.datetime));
            debug!(
                security = %security,
                offset,
                rows = page.len(),
                "캔들 페이지 수신"
            );
            pages.push(page);
            offset += self.bar_page_size;

            match oldest {
                Some(Some(ts)) if window.is_before_start(ts) => break,
                // 시각을 읽을 수 없으면 경계를 판단할 수 없다
                Some(None) if window.start.is_some() => break,
                _ => {}
            }
        }

        let rows = newest_last(pages);
        Ok(assemble_bars(
            &security.code,
            &rows,
            &window,
            Local::now().naive_local(),
        ))
    }

    /// 과거 거래일의 체결을 시간순으로 조회합니다.
    pub async fn fetch_history_ticks<C: HqClient>(
        &self,
        conn: &mut C,
        security: &SecurityRef,
        date: NaiveDate,
    ) -> ClientResult<Vec<Tick>> {
        let mut pages: Vec<Vec<RawTransaction>> = Vec::new();
        let mut offset = 0;
        loop {
            let page = conn
                .get_history_transaction_data(
                    security.exchange,
                    &security.code,
                    offset,
                    self.tick_page_size,
                    date,
                )
                .await?;
            if page.is_empty() {
                break;
            }
            pages.push(page);
            offset += self.tick_page_size;
        }

        let rows = newest_last(pages);
        debug!(security = %security, %date, rows = rows.len(), "과거 체결 수신");
        Ok(ticks_from_rows(&security.code, date, &rows)?)
    }

    /// 당일 체결을 시간순으로 조회하고 `today`로 날짜를 찍습니다.
    ///
    /// 첫 행은 동시호가 체결로 서버가 임시 시각을 보내므로 두 번째 행의
    /// 시각으로 바꿉니다.
    pub async fn fetch_today_ticks<C: HqClient>(
        &self,
        conn: &mut C,
        security: &SecurityRef,
        today: NaiveDate,
    ) -> ClientResult<Vec<Tick>> {
        let mut pages: Vec<Vec<RawTransaction>> = Vec::new();
        let mut offset = 0;
        loop {
            let page = conn
                .get_transaction_data(
                    security.exchange,
                    &security.code,
                    offset,
                    self.tick_page_size,
                )
                .await?;
            if page.is_empty() {
                break;
            }
            pages.push(page);
            offset += self.tick_page_size;
        }

        let rows = newest_last(pages);
        let mut ticks = ticks_from_rows(&security.code, today, &rows)?;
        if ticks.len() >= 2 {
            ticks[0].time = ticks[1].time;
        }
        Ok(ticks)
    }
}

/// 최신 페이지부터 받은 페이지들을 오래된 순 한 줄로 잇습니다.
fn newest_last<T>(pages: Vec<Vec<T>>) -> Vec<T> {
    pages.into_iter().rev().flatten().collect()
}

/// 받은 캔들 행을 조회 구간에 맞춰 정리합니다.
///
/// - 행을 캔들로 바꿀 수 없으면(상장 전 종목 등) 기준 시각에 값이 모두 0인
///   캔들 하나를 반환합니다.
/// - 잘라낸 결과가 비면 받은 마지막 종가로 채운 캔들 하나를 반환합니다.
///   이 종가는 구간보다 한참 이전의 값일 수 있습니다.
///
/// 기준 시각은 구간 시작, 없으면 구간 종료, 둘 다 없으면 `now`입니다.
pub fn assemble_bars(
    code: &str,
    rows: &[RawBar],
    window: &FetchWindow,
    now: NaiveDateTime,
) -> Vec<Bar> {
    let anchor = window.anchor_or(now);

    let bars = match bars_from_rows(code, rows) {
        Ok(bars) => bars,
        Err(e) => {
            warn!(code, error = %e, "no k line data for {}", code);
            return vec![Bar::zero(code, anchor)];
        }
    };

    let last = bars.last().map(|bar| (bar.timestamp, bar.close));
    let trimmed: Vec<Bar> = bars
        .into_iter()
        .filter(|bar| window.contains(bar.timestamp))
        .collect();

    match (trimmed.is_empty(), last) {
        (true, Some((stale_at, close))) => {
            warn!(
                code,
                %anchor,
                %stale_at,
                %close,
                "조회 구간에 캔들이 없어 마지막 종가로 채웁니다"
            );
            vec![Bar::flat(code, anchor, close)]
        }
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Endpoint;
    use crate::simulated::SimulatedServer;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tdx_core::Exchange;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn raw(ts: NaiveDateTime, close: f64) -> RawBar {
        RawBar {
            datetime: ts.format("%Y-%m-%d %H:%M").to_string(),
            open: close,
            close,
            high: close,
            low: close,
            vol: 10.0,
            amount: close * 10.0,
        }
    }

    /// 2020-01-01부터 하루 간격의 일봉 `n`개.
    fn daily_rows(n: i64) -> Vec<RawBar> {
        (0..n)
            .map(|i| raw(day(2020, 1, 1) + chrono::Duration::days(i), 10.0 + i as f64))
            .collect()
    }

    #[test]
    fn test_assemble_unparseable_rows_yields_zero_bar() {
        let window = FetchWindow::since(midnight(2020, 1, 1));
        let bars = assemble_bars("688999", &[], &window, midnight(2024, 1, 1));
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, midnight(2020, 1, 1));
        assert_eq!(bars[0].close, Decimal::ZERO);
        assert_eq!(bars[0].volume, Decimal::ZERO);
    }

    #[test]
    fn test_assemble_empty_trim_carries_last_close() {
        let window = FetchWindow::since(midnight(2021, 6, 1));
        let bars = assemble_bars("600000", &daily_rows(3), &window, midnight(2024, 1, 1));
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, midnight(2021, 6, 1));
        assert_eq!(bars[0].open, dec!(12));
        assert_eq!(bars[0].close, dec!(12));
        assert!(bars[0].is_idle());
    }

    #[test]
    fn test_assemble_anchor_falls_back_to_now() {
        let now = midnight(2024, 1, 1);
        let bars = assemble_bars("688999", &[], &FetchWindow::unbounded(), now);
        assert_eq!(bars[0].timestamp, now);
    }

    #[tokio::test]
    async fn test_fetch_bars_pages_back_to_start() {
        let server = SimulatedServer::new();
        server.add_security_bars(9, Exchange::Sh, "600000", daily_rows(25));
        let mut conn = server.client();
        conn.connect(&Endpoint::new("127.0.0.1", 7709)).await.unwrap();

        let fetcher = SeriesFetcher::new(10, 2000);
        let security = SecurityRef::new(Exchange::Sh, "600000");
        let window = FetchWindow::between(midnight(2020, 1, 10), midnight(2020, 1, 22)).unwrap();

        let bars = fetcher
            .fetch_bars(&mut conn, BarKind::Security, 9, &security, window)
            .await
            .unwrap();

        // 10일 ~ 21일
        assert_eq!(bars.len(), 12);
        assert_eq!(bars[0].timestamp, day(2020, 1, 10));
        assert_eq!(bars[11].timestamp, day(2020, 1, 21));
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        // 두 번째 페이지(6일 ~ 15일)가 시작을 넘으므로 거기서 멈춘다
        assert_eq!(server.stats().calls("get_security_bars"), 2);
    }

    #[tokio::test]
    async fn test_fetch_bars_unbounded_reads_everything() {
        let server = SimulatedServer::new();
        server.add_security_bars(9, Exchange::Sz, "000001", daily_rows(25));
        let mut conn = server.client();
        conn.connect(&Endpoint::new("127.0.0.1", 7709)).await.unwrap();

        let bars = SeriesFetcher::new(10, 2000)
            .fetch_bars(
                &mut conn,
                BarKind::Security,
                9,
                &SecurityRef::new(Exchange::Sz, "000001"),
                FetchWindow::unbounded(),
            )
            .await
            .unwrap();

        assert_eq!(bars.len(), 25);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        // 10 + 10 + 5 + 빈 페이지
        assert_eq!(server.stats().calls("get_security_bars"), 4);
    }

    #[tokio::test]
    async fn test_fetch_today_ticks_fixes_opening_time() {
        let server = SimulatedServer::new();
        let rows = ["15:00", "09:30", "09:31"]
            .iter()
            .map(|time| RawTransaction {
                time: time.to_string(),
                price: 10.0,
                vol: 1.0,
                buyorsell: 0,
            })
            .collect();
        server.add_transactions(Exchange::Sh, "600000", rows);
        let mut conn = server.client();
        conn.connect(&Endpoint::new("127.0.0.1", 7709)).await.unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let ticks = SeriesFetcher::new(800, 2)
            .fetch_today_ticks(&mut conn, &SecurityRef::new(Exchange::Sh, "600000"), today)
            .await
            .unwrap();

        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].time, ticks[1].time);
        assert_eq!(ticks[0].datetime().to_string(), "2024-03-01 09:30:00");
        assert_eq!(ticks[2].datetime().to_string(), "2024-03-01 09:31:00");
    }
}
