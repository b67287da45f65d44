//! 가격/수량 계산을 위한 Decimal 타입 별칭.

use rust_decimal::Decimal;

/// 가격 타입.
pub type Price = Decimal;

/// 거래량 타입 (서버가 보고하는 단위 그대로).
pub type Quantity = Decimal;

/// 거래대금 타입.
pub type Amount = Decimal;
