//! 시세 도메인 모델.
//!
//! - `market_data`: 캔들, 체결 틱, 시세 스냅샷
//! - `security_info`: 종목 목록 항목

mod market_data;
mod security_info;

pub use market_data::*;
pub use security_info::*;
