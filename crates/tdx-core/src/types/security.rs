//! 거래소 구분 및 종목 참조.
//!
//! 이 모듈은 종목을 식별하는 타입을 정의합니다:
//! - `Exchange` - 상하이(SH) / 선전(SZ) 거래소
//! - `SecurityRef` - 거래소와 6자리 종목 코드의 쌍

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// 상하이 거래소로 분류되는 코드 접두어 (첫 자리 규칙 외).
const SH_PREFIXES: [&str; 7] = ["009", "126", "110", "201", "202", "203", "204"];

/// 시세 서버의 거래소 구분.
///
/// 판별값은 서버 프로토콜의 market 코드와 같습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// 선전 증권거래소
    Sz = 0,
    /// 상하이 증권거래소
    Sh = 1,
}

impl Exchange {
    /// 서버 프로토콜 market 코드를 반환합니다.
    pub fn market_code(self) -> u8 {
        self as u8
    }

    /// market 코드에서 거래소를 만듭니다.
    pub fn from_market_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Exchange::Sz),
            1 => Some(Exchange::Sh),
            _ => None,
        }
    }

    /// 종목 코드 접두어로 거래소를 추정합니다.
    ///
    /// 첫 자리가 `5`, `6`, `9` 이거나 지정된 접두어로 시작하면 상하이,
    /// 그 외(빈 문자열 포함)는 모두 선전입니다.
    pub fn infer(code: &str) -> Self {
        if matches!(code.as_bytes().first(), Some(b'5' | b'6' | b'9')) {
            return Exchange::Sh;
        }
        if SH_PREFIXES.iter().any(|prefix| code.starts_with(prefix)) {
            return Exchange::Sh;
        }
        Exchange::Sz
    }

    /// 모든 거래소를 서버 조회 순서(SZ, SH)로 반환합니다.
    pub fn all() -> [Exchange; 2] {
        [Exchange::Sz, Exchange::Sh]
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Sz => write!(f, "SZ"),
            Exchange::Sh => write!(f, "SH"),
        }
    }
}

/// 거래소와 종목 코드로 식별되는 종목.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecurityRef {
    /// 거래소
    pub exchange: Exchange,
    /// 6자리 종목 코드
    pub code: String,
}

impl SecurityRef {
    /// 거래소를 지정하여 종목 참조를 생성합니다.
    pub fn new(exchange: Exchange, code: impl Into<String>) -> Self {
        Self {
            exchange,
            code: code.into(),
        }
    }

    /// 6자리 코드를 검증하고 접두어 규칙으로 거래소를 추정합니다.
    pub fn parse(code: &str) -> CoreResult<Self> {
        let code = code.trim();
        if !is_valid_code(code) {
            return Err(CoreError::InvalidCode(code.to_string()));
        }
        Ok(Self::new(Exchange::infer(code), code))
    }
}

impl fmt::Display for SecurityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.exchange)
    }
}

/// 6자리 숫자 코드인지 확인합니다.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}
