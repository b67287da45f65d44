//! 시세 서버 프로토콜 클라이언트 계약.
//!
//! 엔진은 바이너리 프로토콜을 직접 다루지 않습니다. 패킷 인코딩과
//! 핸드셰이크는 [`HqClient`] 구현체의 책임이며, 엔진은 아래 RPC만 호출합니다.
//! 응답은 서버가 보낸 그대로의 원시 행(`Raw*`)이며 [`crate::table`]에서
//! 도메인 타입으로 변환됩니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

use tdx_core::{Exchange, SecurityRef, ServerConfig};

use crate::error::ClientResult;

/// 접속 대상 서버.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl Endpoint {
    /// 새 접속 대상을 생성합니다.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<&ServerConfig> for Endpoint {
    fn from(config: &ServerConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 캔들 원시 행. 페이지 안에서는 오래된 순입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    /// `YYYY-MM-DD HH:MM` 형식 시각
    pub datetime: String,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub vol: f64,
    pub amount: f64,
}

/// 체결 원시 행.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    /// `HH:MM` 형식 장중 시각
    pub time: String,
    pub price: f64,
    pub vol: f64,
    /// 0 매수, 1 매도, 그 외 중립
    pub buyorsell: u8,
}

/// 시세 스냅샷 원시 행.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    /// 서버 market 코드
    pub market: u8,
    pub code: String,
    pub price: f64,
    pub last_close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub vol: f64,
    pub amount: f64,
    pub bid1: f64,
    pub ask1: f64,
    pub bid_vol1: f64,
    pub ask_vol1: f64,
    pub servertime: String,
}

/// 종목 목록 원시 행.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSecurity {
    pub code: String,
    pub volunit: u32,
    pub decimal_point: u8,
    pub name: String,
    pub pre_close: f64,
}

/// 시세 서버와의 단일 세션.
///
/// 한 번에 하나의 RPC만 수행하므로 모든 호출이 `&mut self`를 받습니다.
/// 동시 조회는 여러 세션을 [`crate::pool::ConnectionPool`]에 넣어 처리합니다.
#[async_trait]
pub trait HqClient: Send + 'static {
    /// 서버에 연결합니다.
    async fn connect(&mut self, endpoint: &Endpoint) -> ClientResult<()>;

    /// 연결을 해제합니다. 연결되지 않은 상태에서 호출해도 에러가 아닙니다.
    async fn disconnect(&mut self) -> ClientResult<()>;

    /// 시세 스냅샷 (최대 80종목).
    async fn get_security_quotes(
        &mut self,
        securities: &[SecurityRef],
    ) -> ClientResult<Vec<RawQuote>>;

    /// 종목 캔들. `offset`은 최신 캔들부터 센 위치입니다.
    async fn get_security_bars(
        &mut self,
        category: u8,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
    ) -> ClientResult<Vec<RawBar>>;

    /// 지수 캔들.
    async fn get_index_bars(
        &mut self,
        category: u8,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
    ) -> ClientResult<Vec<RawBar>>;

    /// 과거 거래일의 체결 내역.
    async fn get_history_transaction_data(
        &mut self,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
        date: NaiveDate,
    ) -> ClientResult<Vec<RawTransaction>>;

    /// 당일 체결 내역.
    async fn get_transaction_data(
        &mut self,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
    ) -> ClientResult<Vec<RawTransaction>>;

    /// 종목 목록 한 페이지.
    async fn get_security_list(
        &mut self,
        exchange: Exchange,
        offset: usize,
    ) -> ClientResult<Vec<RawSecurity>>;

    /// 거래소의 전체 종목 수.
    async fn get_security_count(&mut self, exchange: Exchange) -> ClientResult<usize>;
}
