//! 종목 목록 항목.

use serde::{Deserialize, Serialize};

use crate::types::{Exchange, Price, SecurityRef};

/// 서버 종목 목록의 한 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// 거래소
    pub exchange: Exchange,
    /// 종목 코드
    pub code: String,
    /// 종목명
    pub name: String,
    /// 거래 단위
    pub volume_unit: u32,
    /// 가격 소수 자릿수
    pub decimal_point: u8,
    /// 전일 종가
    pub pre_close: Price,
}

impl SecurityInfo {
    /// 종목 참조를 반환합니다.
    pub fn security_ref(&self) -> SecurityRef {
        SecurityRef::new(self.exchange, self.code.clone())
    }

    /// A주 보통주인지 확인합니다.
    ///
    /// 상하이는 `6`으로 시작하는 코드, 선전은 `300` 또는 `00`으로 시작하는
    /// 코드만 해당합니다.
    pub fn is_stock(&self) -> bool {
        match self.exchange {
            Exchange::Sh => self.code.starts_with('6'),
            Exchange::Sz => self.code.starts_with("300") || self.code.starts_with("00"),
        }
    }
}
