//! 체결 틱으로 OHLCV 캔들 재구성.
//!
//! 버킷은 주기 경계에 정렬되며 오른쪽 닫힘/왼쪽 열림입니다. 1분봉이라면
//! `09:31:00` 캔들은 `09:30:00` 초과 `09:31:00` 이하의 체결을 담고,
//! 캔들 시각은 버킷이 닫히는 시각입니다.
//!
//! 체결이 없는 버킷도 빠지지 않고 나오며, 직전 캔들의 종가로 OHLC를 채우고
//! 거래량은 0입니다.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Duration;

use tdx_core::{Bar, Price, Tick, Timeframe};

use crate::error::{EngineError, EngineResult};

/// 버킷 하나의 누적 상태.
#[derive(Debug, Clone)]
struct BucketAgg {
    open: Price,
    high: Price,
    low: Price,
    close: Price,
    volume: Decimal,
    amount: Decimal,
}

impl BucketAgg {
    fn new(tick: &Tick) -> Self {
        Self {
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.volume,
            amount: tick.notional(),
        }
    }

    fn update(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.volume += tick.volume;
        self.amount += tick.notional();
    }

    fn into_bar(self, code: &str, timestamp: NaiveDateTime) -> Bar {
        Bar::new(
            code,
            timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.amount,
        )
    }
}

/// 고정 주기 틱 재구성기.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    step_secs: i64,
}

impl Resampler {
    /// 주기로 생성합니다.
    pub fn new(timeframe: Timeframe) -> Self {
        Self::with_interval(timeframe.duration())
    }

    /// 임의 간격(초 단위, 최소 1초)으로 생성합니다.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            step_secs: (interval.as_secs() as i64).max(1),
        }
    }

    /// 버킷 간격.
    pub fn interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.step_secs)
    }

    /// `ts`가 속한 버킷의 닫히는 시각.
    pub fn bucket_end(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let nanos = ts.nanosecond() as i64;
        let whole = ts - TimeDelta::nanoseconds(nanos);
        let secs = whole.and_utc().timestamp();
        let rem = secs.rem_euclid(self.step_secs);

        if rem == 0 && nanos == 0 {
            whole
        } else {
            whole + TimeDelta::seconds(self.step_secs - rem)
        }
    }

    /// 시간순 틱을 캔들로 재구성합니다.
    ///
    /// 첫 틱의 버킷부터 마지막 틱의 버킷까지 빠짐없이 만들어지므로 첫
    /// 캔들은 항상 체결이 있습니다. 틱이 없으면 빈 결과입니다.
    pub fn resample(&self, ticks: &[Tick]) -> Vec<Bar> {
        let (Some(first), Some(last)) = (ticks.first(), ticks.last()) else {
            return Vec::new();
        };
        let start = self.bucket_end(first.datetime());
        let end = self.bucket_end(last.datetime()).max(start);

        let mut buckets = self.aggregate(ticks);
        let mut bars = Vec::new();
        let mut prev_close = None;
        let mut label = start;
        while label <= end {
            if let Some(bar) = self.emit(&first.code, label, &mut buckets, &mut prev_close) {
                bars.push(bar);
            }
            label += self.interval();
        }
        bars
    }

    /// `start`가 속한 버킷부터 `end`가 속한 버킷까지의 고정 격자로 재구성합니다.
    ///
    /// 격자 밖의 틱은 무시합니다. 첫 버킷에 체결이 없으면 채울 종가가 없으므로
    /// [`EngineError::EmptyLeadingBucket`]을 반환합니다.
    pub fn resample_range(
        &self,
        ticks: &[Tick],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> EngineResult<Vec<Bar>> {
        let first_label = self.bucket_end(start);
        let last_label = self.bucket_end(end);

        let mut buckets = self.aggregate(ticks);
        let code = ticks.first().map(|t| t.code.as_str()).unwrap_or_default();
        let mut bars = Vec::new();
        let mut prev_close = None;
        let mut label = first_label;
        while label <= last_label {
            match self.emit(code, label, &mut buckets, &mut prev_close) {
                Some(bar) => bars.push(bar),
                None => return Err(EngineError::EmptyLeadingBucket(label)),
            }
            label += self.interval();
        }
        Ok(bars)
    }

    fn aggregate(&self, ticks: &[Tick]) -> BTreeMap<NaiveDateTime, BucketAgg> {
        let mut buckets: BTreeMap<NaiveDateTime, BucketAgg> = BTreeMap::new();
        for tick in ticks {
            let label = self.bucket_end(tick.datetime());
            buckets
                .entry(label)
                .and_modify(|agg| agg.update(tick))
                .or_insert_with(|| BucketAgg::new(tick));
        }
        buckets
    }

    /// 버킷 하나를 캔들로 만듭니다. 체결도 직전 종가도 없으면 `None`.
    fn emit(
        &self,
        code: &str,
        label: NaiveDateTime,
        buckets: &mut BTreeMap<NaiveDateTime, BucketAgg>,
        prev_close: &mut Option<Price>,
    ) -> Option<Bar> {
        let bar = match buckets.remove(&label) {
            Some(agg) => agg.into_bar(code, label),
            None => Bar::flat(code, label, (*prev_close)?),
        };
        *prev_close = Some(bar.close);
        Some(bar)
    }
}
