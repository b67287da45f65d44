//! # TDX Core
//!
//! 시세 엔진의 핵심 값 타입과 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 엔진과 호출자가 함께 사용하는 타입을 정의합니다:
//! - 거래소 구분(SH/SZ) 및 종목 참조
//! - 타임프레임과 조회 구간
//! - 캔들(Bar), 체결 틱(Tick), 시세 스냅샷(Quote), 종목 정보
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
