//! 설정 관리.
//!
//! 엔진 설정을 정의하고 파일/환경 변수에서 로드합니다.
//! 환경 변수는 `TDX__` 접두어와 `__` 구분자를 사용합니다
//! (예: `TDX__POOL__SIZE=4`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// 시세 조회 한 번에 요청할 수 있는 최대 종목 수 (서버 제한).
pub const MAX_QUOTE_BATCH: usize = 80;

/// 엔진 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 시세 서버 설정
    pub server: ServerConfig,
    /// 연결 풀 설정
    pub pool: PoolConfig,
    /// 재시도 설정
    pub retry: RetryConfig,
    /// 페이지 크기 설정
    pub paging: PagingConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 시세 서버 설정.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 서버 호스트
    pub host: String,
    /// 서버 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "14.17.75.71".to_string(),
            port: 7709,
        }
    }
}

impl ServerConfig {
    /// 호스트와 포트로 설정을 생성합니다.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 연결 풀 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 연결 수. 1보다 크면 동시 조회 모드로 동작합니다.
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 1 }
    }
}

impl PoolConfig {
    /// 동시 조회 모드인지 확인합니다.
    pub fn is_concurrent(&self) -> bool {
        self.size > 1
    }
}

/// 재시도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 재시도 간 대기 (밀리초, 0이면 즉시)
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 0,
        }
    }
}

impl RetryConfig {
    /// 재시도 간 대기 시간.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// 페이지 크기 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PagingConfig {
    /// 캔들 조회 페이지 크기
    pub bar_page_size: usize,
    /// 체결 조회 페이지 크기
    pub tick_page_size: usize,
    /// 시세 조회 배치 크기
    pub quote_batch_size: usize,
    /// 종목 목록 페이지 크기
    pub security_page_size: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            bar_page_size: 800,
            tick_page_size: 2000,
            quote_batch_size: MAX_QUOTE_BATCH,
            security_page_size: 1000,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl EngineConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TDX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 환경 변수에서만 설정을 로드합니다.
    pub fn from_env() -> CoreResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("TDX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 서버를 지정한 기본 설정.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.server = ServerConfig::new(host, port);
        self
    }

    /// 연결 수를 지정합니다.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool.size = size;
        self
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.pool.size == 0 {
            return Err(CoreError::Config("pool.size must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        let paging = &self.paging;
        if paging.bar_page_size == 0
            || paging.tick_page_size == 0
            || paging.quote_batch_size == 0
            || paging.security_page_size == 0
        {
            return Err(CoreError::Config("page sizes must be non-zero".to_string()));
        }
        if paging.quote_batch_size > MAX_QUOTE_BATCH {
            return Err(CoreError::Config(format!(
                "paging.quote_batch_size must not exceed {}",
                MAX_QUOTE_BATCH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.server.to_string(), "14.17.75.71:7709");
        assert_eq!(config.pool.size, 1);
        assert!(!config.pool.is_concurrent());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff(), Duration::ZERO);
        assert_eq!(config.paging.bar_page_size, 800);
        assert_eq!(config.paging.tick_page_size, 2000);
        assert_eq!(config.paging.quote_batch_size, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EngineConfig::default().with_pool_size(0).validate().is_err());

        let mut config = EngineConfig::default();
        config.paging.quote_batch_size = 81;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: EngineConfig = config::Config::builder()
            .set_override("pool.size", 4)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.pool.size, 4);
        assert!(config.pool.is_concurrent());
        assert_eq!(config.server.port, 7709);
        assert_eq!(config.paging.bar_page_size, 800);
    }
}
