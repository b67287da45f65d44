//! 메모리 시세 서버 상태.

use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tdx_core::Exchange;

use crate::client::{RawBar, RawSecurity, RawTransaction};

use super::client::SimulatedHqClient;

/// 서버 호출 통계.
#[derive(Debug, Clone, Default)]
pub struct SimulatedStats {
    /// 성공한 연결 수
    pub connects: usize,
    /// 연결 해제 수
    pub disconnects: usize,
    /// 시세 요청별 종목 수 (도착 순)
    pub quote_batches: Vec<usize>,
    /// 동시에 처리 중이던 최대 요청 수
    pub max_in_flight: usize,
    pub(super) calls: HashMap<&'static str, usize>,
}

impl SimulatedStats {
    /// RPC별 호출 횟수 (실패 포함).
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.get(operation).copied().unwrap_or(0)
    }
}

type BarKey = (u8, Exchange, String);

pub(super) struct ServerState {
    pub(super) securities: HashMap<Exchange, Vec<RawSecurity>>,
    pub(super) security_bars: HashMap<BarKey, Vec<RawBar>>,
    pub(super) index_bars: HashMap<BarKey, Vec<RawBar>>,
    pub(super) history: HashMap<(Exchange, String, NaiveDate), Vec<RawTransaction>>,
    pub(super) today: HashMap<(Exchange, String), Vec<RawTransaction>>,
    pub(super) security_page_size: usize,
    pub(super) latency: Duration,
    pub(super) fail_next: usize,
    pub(super) connect_budget: Option<usize>,
    pub(super) open_sessions: usize,
    pub(super) in_flight: usize,
    pub(super) next_id: usize,
    pub(super) stats: SimulatedStats,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            securities: HashMap::new(),
            security_bars: HashMap::new(),
            index_bars: HashMap::new(),
            history: HashMap::new(),
            today: HashMap::new(),
            security_page_size: 1000,
            latency: Duration::ZERO,
            fail_next: 0,
            connect_budget: None,
            open_sessions: 0,
            in_flight: 0,
            next_id: 0,
            stats: SimulatedStats::default(),
        }
    }
}

impl ServerState {
    pub(super) fn find_security(&self, exchange: Exchange, code: &str) -> Option<&RawSecurity> {
        self.securities
            .get(&exchange)
            .and_then(|list| list.iter().find(|s| s.code == code))
    }
}

/// 서버가 최신 행부터 `offset`을 세는 방식으로 한 페이지를 자릅니다.
/// `rows`는 오래된 순입니다.
pub(super) fn newest_first_page<T: Clone>(rows: &[T], offset: usize, count: usize) -> Vec<T> {
    let end = rows.len().saturating_sub(offset);
    let start = end.saturating_sub(count);
    rows[start..end].to_vec()
}

/// 테스트와 데모용 메모리 시세 서버.
///
/// 여러 [`SimulatedHqClient`]가 같은 상태를 공유하며, 호출 횟수 집계와
/// 실패 주입을 지원합니다.
#[derive(Clone, Default)]
pub struct SimulatedServer {
    pub(super) state: Arc<Mutex<ServerState>>,
}

impl SimulatedServer {
    /// 빈 서버를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 이 서버에 붙는 새 클라이언트 (연결 전 상태).
    pub fn client(&self) -> SimulatedHqClient {
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            state.next_id
        };
        SimulatedHqClient::new(id, self.clone())
    }

    /// 종목을 등록합니다.
    pub fn add_security(&self, exchange: Exchange, code: &str, name: &str, pre_close: f64) {
        self.state
            .lock()
            .securities
            .entry(exchange)
            .or_default()
            .push(RawSecurity {
                code: code.to_string(),
                volunit: 100,
                decimal_point: 2,
                name: name.to_string(),
                pre_close,
            });
    }

    /// 종목 캔들을 등록합니다 (오래된 순).
    pub fn add_security_bars(&self, category: u8, exchange: Exchange, code: &str, rows: Vec<RawBar>) {
        self.state
            .lock()
            .security_bars
            .insert((category, exchange, code.to_string()), rows);
    }

    /// 지수 캔들을 등록합니다 (오래된 순).
    pub fn add_index_bars(&self, category: u8, exchange: Exchange, code: &str, rows: Vec<RawBar>) {
        self.state
            .lock()
            .index_bars
            .insert((category, exchange, code.to_string()), rows);
    }

    /// 과거 거래일 체결을 등록합니다 (시간순).
    pub fn add_history_transactions(
        &self,
        exchange: Exchange,
        code: &str,
        date: NaiveDate,
        rows: Vec<RawTransaction>,
    ) {
        self.state
            .lock()
            .history
            .insert((exchange, code.to_string(), date), rows);
    }

    /// 당일 체결을 등록합니다 (시간순).
    pub fn add_transactions(&self, exchange: Exchange, code: &str, rows: Vec<RawTransaction>) {
        self.state
            .lock()
            .today
            .insert((exchange, code.to_string()), rows);
    }

    /// 종목 목록 한 페이지의 크기.
    pub fn set_security_page_size(&self, size: usize) {
        self.state.lock().security_page_size = size.max(1);
    }

    /// 모든 RPC에 응답 지연을 둡니다.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// 다음 `n`번의 RPC를 네트워크 에러로 실패시킵니다.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().fail_next = n;
    }

    /// `n`번 연결에 성공한 뒤부터 연결을 거부합니다.
    pub fn refuse_connects_after(&self, n: usize) {
        self.state.lock().connect_budget = Some(n);
    }

    /// 현재 열린 세션 수.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }

    /// 호출 통계 스냅샷.
    pub fn stats(&self) -> SimulatedStats {
        self.state.lock().stats.clone()
    }
}
