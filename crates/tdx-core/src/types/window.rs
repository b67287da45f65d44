//! 조회 구간 정의.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// 시계열 조회 구간.
///
/// 시작은 포함, 종료는 제외합니다. 시각은 거래소 현지 시각(naive)입니다.
/// 시작이 없으면 서버에 남아 있는 가장 오래된 기록까지 조회합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    /// 구간 시작 (포함)
    pub start: Option<NaiveDateTime>,
    /// 구간 종료 (제외)
    pub end: Option<NaiveDateTime>,
}

impl FetchWindow {
    /// 새 조회 구간을 생성합니다.
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> CoreResult<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(CoreError::InvalidWindow(format!("{} > {}", start, end)));
            }
        }
        Ok(Self { start, end })
    }

    /// 양쪽이 열린 구간.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// 시작만 지정된 구간.
    pub fn since(start: NaiveDateTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// 양쪽이 지정된 구간.
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> CoreResult<Self> {
        Self::new(Some(start), Some(end))
    }

    /// 시각이 구간에 포함되는지 확인합니다.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |start| start <= ts) && self.end.map_or(true, |end| ts < end)
    }

    /// 이 시각이 시작 경계보다 이른지 확인합니다.
    pub fn is_before_start(&self, ts: NaiveDateTime) -> bool {
        self.start.is_some_and(|start| ts < start)
    }

    /// 합성 캔들을 찍을 시각을 반환합니다.
    ///
    /// 시작이 있으면 시작, 없으면 종료, 둘 다 없으면 `now`.
    pub fn anchor_or(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.start.or(self.end).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_contains_is_half_open() {
        let window = FetchWindow::between(at(2020, 1, 1), at(2020, 1, 3)).unwrap();
        assert!(window.contains(at(2020, 1, 1)));
        assert!(window.contains(at(2020, 1, 2)));
        assert!(!window.contains(at(2020, 1, 3)));
        assert!(!window.contains(at(2019, 12, 31)));
    }

    #[test]
    fn test_unbounded_contains_everything() {
        assert!(FetchWindow::unbounded().contains(at(1990, 12, 19)));
        assert!(!FetchWindow::unbounded().is_before_start(at(1990, 12, 19)));
    }

    #[test]
    fn test_rejects_inverted_window() {
        assert!(matches!(
            FetchWindow::between(at(2020, 1, 3), at(2020, 1, 1)),
            Err(CoreError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_anchor() {
        let now = at(2024, 6, 1);
        assert_eq!(FetchWindow::since(at(2020, 1, 1)).anchor_or(now), at(2020, 1, 1));
        let end_only = FetchWindow::new(None, Some(at(2021, 1, 1))).unwrap();
        assert_eq!(end_only.anchor_or(now), at(2021, 1, 1));
        assert_eq!(FetchWindow::unbounded().anchor_or(now), now);
    }
}
