//! # TDX Engine
//!
//! 통달신(TDX) 시세 서버에서 과거/실시간 시세를 가져와 빈틈없는 시계열로
//! 정리하는 클라이언트 엔진입니다.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `HqClient` trait: 프로토콜 클라이언트 계약
//! - 연결 풀과 재연결 재시도
//! - 역방향 페이지 조회와 구간 자르기
//! - 체결 틱 기반 캔들 재구성
//! - 80종목 단위 시세 배치 조회
//! - 메모리 시뮬레이션 서버 (테스트/데모용)

pub mod client;
pub mod engine;
pub mod error;
pub mod paging;
pub mod pool;
pub mod quotes;
pub mod resample;
pub mod retry;
pub mod securities;
pub mod simulated;
pub mod table;

pub use client::{Endpoint, HqClient, RawBar, RawQuote, RawSecurity, RawTransaction};
pub use engine::Engine;
pub use error::*;
pub use paging::{assemble_bars, BarKind, SeriesFetcher};
pub use pool::{ConnectionPool, PooledConnection};
pub use quotes::QuoteBatcher;
pub use resample::Resampler;
pub use retry::RetryExecutor;
pub use securities::SecurityList;
pub use simulated::{SimulatedHqClient, SimulatedServer, SimulatedStats};
pub use table::TableError;
