//! 원시 행을 도메인 타입으로 변환.
//!
//! 서버는 가격을 부동소수점으로 보내므로 여기서 `Decimal`로 바꿉니다.
//! 캔들 변환은 실패를 [`TableError`]로 돌려주고, 호출자는 이를
//! "데이터 없음" 분기로 처리합니다.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use tdx_core::{Bar, Exchange, Quote, SecurityInfo, SecurityRef, Tick, TickDirection};

use crate::client::{RawBar, RawQuote, RawSecurity, RawTransaction};
use crate::error::ClientError;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

/// 원시 행 변환 실패.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// 변환할 행이 없음
    #[error("empty table")]
    Empty,

    /// 해석할 수 없는 행
    #[error("malformed row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

impl From<TableError> for ClientError {
    fn from(err: TableError) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

/// 캔들 시각 문자열을 해석합니다.
pub fn parse_bar_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// 장중 시각 문자열을 해석합니다.
pub fn parse_tick_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn decimal(row: usize, field: &str, value: f64) -> Result<Decimal, TableError> {
    Decimal::from_f64(value).ok_or_else(|| TableError::Malformed {
        row,
        reason: format!("{} is not a finite number: {}", field, value),
    })
}

/// 캔들 행을 변환합니다. 빈 입력은 [`TableError::Empty`]입니다.
pub fn bars_from_rows(code: &str, rows: &[RawBar]) -> Result<Vec<Bar>, TableError> {
    if rows.is_empty() {
        return Err(TableError::Empty);
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let timestamp =
                parse_bar_datetime(&row.datetime).ok_or_else(|| TableError::Malformed {
                    row: i,
                    reason: format!("bad datetime: {:?}", row.datetime),
                })?;
            Ok(Bar::new(
                code,
                timestamp,
                decimal(i, "open", row.open)?,
                decimal(i, "high", row.high)?,
                decimal(i, "low", row.low)?,
                decimal(i, "close", row.close)?,
                decimal(i, "vol", row.vol)?,
                decimal(i, "amount", row.amount)?,
            ))
        })
        .collect()
}

/// 체결 행을 거래일 `date`로 찍어 변환합니다.
pub fn ticks_from_rows(
    code: &str,
    date: NaiveDate,
    rows: &[RawTransaction],
) -> Result<Vec<Tick>, TableError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let time = parse_tick_time(&row.time).ok_or_else(|| TableError::Malformed {
                row: i,
                reason: format!("bad time: {:?}", row.time),
            })?;
            Ok(Tick {
                code: code.to_string(),
                date,
                time,
                price: decimal(i, "price", row.price)?,
                volume: decimal(i, "vol", row.vol)?,
                direction: TickDirection::from_flag(row.buyorsell),
            })
        })
        .collect()
}

/// 시세 스냅샷 행을 변환합니다.
pub fn quotes_from_rows(rows: &[RawQuote]) -> Result<Vec<Quote>, TableError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let exchange =
                Exchange::from_market_code(row.market).ok_or_else(|| TableError::Malformed {
                    row: i,
                    reason: format!("unknown market {}", row.market),
                })?;
            Ok(Quote {
                security: SecurityRef::new(exchange, row.code.clone()),
                price: decimal(i, "price", row.price)?,
                last_close: decimal(i, "last_close", row.last_close)?,
                open: decimal(i, "open", row.open)?,
                high: decimal(i, "high", row.high)?,
                low: decimal(i, "low", row.low)?,
                volume: decimal(i, "vol", row.vol)?,
                amount: decimal(i, "amount", row.amount)?,
                bid: decimal(i, "bid1", row.bid1)?,
                ask: decimal(i, "ask1", row.ask1)?,
                bid_volume: decimal(i, "bid_vol1", row.bid_vol1)?,
                ask_volume: decimal(i, "ask_vol1", row.ask_vol1)?,
                server_time: row.servertime.clone(),
            })
        })
        .collect()
}

/// 종목 목록 행에 거래소를 붙여 변환합니다.
pub fn securities_from_rows(
    exchange: Exchange,
    rows: &[RawSecurity],
) -> Result<Vec<SecurityInfo>, TableError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            Ok(SecurityInfo {
                exchange,
                code: row.code.clone(),
                name: row.name.trim_end_matches('\0').trim().to_string(),
                volume_unit: row.volunit,
                decimal_point: row.decimal_point,
                pre_close: decimal(i, "pre_close", row.pre_close)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw_bar(datetime: &str, close: f64) -> RawBar {
        RawBar {
            datetime: datetime.to_string(),
            open: close,
            close,
            high: close,
            low: close,
            vol: 100.0,
            amount: 1050.0,
        }
    }

    #[test]
    fn test_empty_bar_table() {
        assert_eq!(bars_from_rows("600000", &[]), Err(TableError::Empty));
    }

    #[test]
    fn test_bar_rows() {
        let bars = bars_from_rows(
            "600000",
            &[raw_bar("2020-01-02 15:00", 10.5), raw_bar("2020-01-03 15:00", 10.75)],
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(10.5));
        assert_eq!(bars[1].close, dec!(10.75));
        assert_eq!(bars[1].timestamp.to_string(), "2020-01-03 15:00:00");
        assert_eq!(bars[0].code, "600000");
    }

    #[test]
    fn test_malformed_bar_row() {
        let err = bars_from_rows(
            "600000",
            &[raw_bar("2020-01-02 15:00", 10.5), raw_bar("yesterday", 10.5)],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::Malformed { row: 1, .. }));

        let err = bars_from_rows("600000", &[raw_bar("2020-01-02 15:00", f64::NAN)]).unwrap_err();
        assert!(matches!(err, TableError::Malformed { row: 0, .. }));
    }

    #[test]
    fn test_tick_rows() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let ticks = ticks_from_rows(
            "000001",
            date,
            &[RawTransaction {
                time: "09:25".to_string(),
                price: 16.5,
                vol: 12.0,
                buyorsell: 2,
            }],
        )
        .unwrap();
        assert_eq!(ticks[0].datetime().to_string(), "2020-01-02 09:25:00");
        assert_eq!(ticks[0].direction, TickDirection::Neutral);
        assert!(ticks_from_rows("000001", date, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_security_rows_trim_name_padding() {
        let list = securities_from_rows(
            Exchange::Sh,
            &[RawSecurity {
                code: "600000".to_string(),
                volunit: 100,
                decimal_point: 2,
                name: "浦发银行\0\0".to_string(),
                pre_close: 10.25,
            }],
        )
        .unwrap();
        assert_eq!(list[0].name, "浦发银行");
        assert_eq!(list[0].exchange, Exchange::Sh);
        assert_eq!(list[0].pre_close, dec!(10.25));
    }
}
