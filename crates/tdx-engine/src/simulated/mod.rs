//! 테스트와 데모를 위한 메모리 시세 서버.
//!
//! 실제 서버 없이 엔진 전체를 돌려볼 수 있도록 다음을 제공합니다:
//! - 종목 목록, 캔들, 체결 데이터 등록
//! - 최신 행부터 `offset`을 세는 서버 페이지 규칙
//! - RPC별 호출 횟수와 동시 처리 수 집계
//! - 연결 거부, RPC 실패, 응답 지연 주입
//!
//! # 예제
//!
//! ```ignore
//! use tdx_engine::simulated::SimulatedServer;
//!
//! let server = SimulatedServer::new();
//! server.add_security(Exchange::Sh, "600000", "浦发银行", 10.5);
//!
//! let engine = Engine::new(EngineConfig::default(), || server.client())?;
//! engine.connect().await?;
//! ```

mod client;
mod server;

pub use client::SimulatedHqClient;
pub use server::{SimulatedServer, SimulatedStats};
