//! 엔진 전반에서 사용되는 공통 타입.

mod decimal;
mod security;
mod timeframe;
mod window;

pub use decimal::*;
pub use security::*;
pub use timeframe::*;
pub use window::*;
