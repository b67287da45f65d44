//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `Bar` - OHLCV 캔들 데이터
//! - `Tick` - 체결 틱 데이터
//! - `Quote` - 실시간 시세 스냅샷

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Amount, Price, Quantity, SecurityRef};

/// OHLCV 캔들 데이터.
///
/// `timestamp`는 구간이 닫히는 시각입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 구간 종료 시각
    pub timestamp: NaiveDateTime,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Quantity,
    /// 거래대금
    pub amount: Amount,
    /// 종목 코드
    pub code: String,
}

impl Bar {
    /// 새 캔들을 생성합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code: impl Into<String>,
        timestamp: NaiveDateTime,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
        amount: Amount,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            amount,
            code: code.into(),
        }
    }

    /// 모든 값이 0인 캔들. 기록이 없는 종목의 자리표시자입니다.
    pub fn zero(code: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self::flat(code, timestamp, Decimal::ZERO)
    }

    /// OHLC가 모두 `close`이고 거래량이 0인 캔들.
    pub fn flat(code: impl Into<String>, timestamp: NaiveDateTime, close: Price) -> Self {
        Self::new(
            code,
            timestamp,
            close,
            close,
            close,
            close,
            Decimal::ZERO,
            Decimal::ZERO,
        )
    }

    /// `low <= open, close <= high` 를 만족하는지 확인합니다.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }

    /// 거래가 없는 캔들인지 확인합니다.
    pub fn is_idle(&self) -> bool {
        self.volume.is_zero()
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// 체결 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickDirection {
    /// 매수 체결
    Buy,
    /// 매도 체결
    Sell,
    /// 중립 (동시호가 등)
    Neutral,
}

impl TickDirection {
    /// 서버의 `buyorsell` 플래그를 변환합니다.
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            0 => TickDirection::Buy,
            1 => TickDirection::Sell,
            _ => TickDirection::Neutral,
        }
    }
}

/// 체결 틱 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// 종목 코드
    pub code: String,
    /// 거래일
    pub date: NaiveDate,
    /// 장중 체결 시각
    pub time: NaiveTime,
    /// 체결가
    pub price: Price,
    /// 체결량
    pub volume: Quantity,
    /// 체결 방향
    pub direction: TickDirection,
}

impl Tick {
    /// 거래일과 체결 시각을 합친 시각을 반환합니다.
    pub fn datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// 체결 금액 (가격 × 체결량).
    pub fn notional(&self) -> Decimal {
        self.price * self.volume
    }
}

/// 시세 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// 종목
    pub security: SecurityRef,
    /// 현재가
    pub price: Price,
    /// 전일 종가
    pub last_close: Price,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 누적 거래량
    pub volume: Quantity,
    /// 누적 거래대금
    pub amount: Amount,
    /// 최우선 매수 호가
    pub bid: Price,
    /// 최우선 매도 호가
    pub ask: Price,
    /// 최우선 매수 잔량
    pub bid_volume: Quantity,
    /// 최우선 매도 잔량
    pub ask_volume: Quantity,
    /// 서버 시각 문자열
    pub server_time: String,
}

impl Quote {
    /// 전일 대비 변동.
    pub fn change(&self) -> Decimal {
        self.price - self.last_close
    }

    /// 전일 대비 변동률(%).
    pub fn change_pct(&self) -> Decimal {
        if self.last_close.is_zero() {
            return Decimal::ZERO;
        }
        self.change() / self.last_close * Decimal::from(100)
    }
}
