//! 핵심 타입의 에러 정의.

use thiserror::Error;

/// 값 타입 생성 및 설정 로딩 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 6자리 숫자가 아닌 종목 코드
    #[error("잘못된 종목 코드: {0}")]
    InvalidCode(String),

    /// 지원하지 않는 주기 토큰
    #[error("지원하지 않는 주기: {0}")]
    UnsupportedFrequency(String),

    /// 시작이 종료보다 늦은 조회 구간
    #[error("잘못된 조회 구간: {0}")]
    InvalidWindow(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnsupportedFrequency("5d".to_string());
        assert_eq!(err.to_string(), "지원하지 않는 주기: 5d");
    }
}
