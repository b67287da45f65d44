//! 캔들 주기 정의.
//!
//! 서버가 직접 제공하는 캔들(일봉/1분봉)과 체결 데이터로 재구성하는
//! 캔들의 주기를 함께 표현합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// 캔들 주기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 일봉 (24시간 버킷)
    D1,
}

impl Timeframe {
    /// 이 주기의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// 이 주기의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 서버 캔들 조회용 category 코드를 반환합니다.
    ///
    /// 서버가 직접 제공하는 주기는 일봉(9)과 1분봉(8)뿐입니다.
    pub fn category_code(&self) -> Option<u8> {
        match self {
            Timeframe::D1 => Some(9),
            Timeframe::M1 => Some(8),
            _ => None,
        }
    }

    /// 표준 주기 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::D1 => "1d",
        }
    }

    /// 주기 토큰을 파싱합니다. `min`, `day` 별칭을 허용합니다.
    pub fn from_token(s: &str) -> Option<Self> {
        match s.trim() {
            "1m" | "min" => Some(Timeframe::M1),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "30m" => Some(Timeframe::M30),
            "1h" => Some(Timeframe::H1),
            "1d" | "day" => Some(Timeframe::D1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| CoreError::UnsupportedFrequency(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::M1.as_secs(), 60);
        assert_eq!(Timeframe::H1.as_secs(), 3600);
        assert_eq!(Timeframe::D1.as_secs(), 86400);
    }

    #[test]
    fn test_category_code() {
        assert_eq!(Timeframe::D1.category_code(), Some(9));
        assert_eq!(Timeframe::M1.category_code(), Some(8));
        assert_eq!(Timeframe::M5.category_code(), None);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("day".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert_eq!("min".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert!(matches!(
            "1w".parse::<Timeframe>(),
            Err(CoreError::UnsupportedFrequency(token)) if token == "1w"
        ));
    }
}
