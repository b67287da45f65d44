//! 엔진 에러 타입.

use thiserror::Error;

use tdx_core::CoreError;

/// 프로토콜 클라이언트가 보고하는 에러.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// 네트워크/소켓 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 응답 대기 시간 초과
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 서버가 연결을 끊음
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 응답 패킷 해석 실패
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 연결되지 않은 상태에서 호출
    #[error("Not connected")]
    NotConnected,
}

impl ClientError {
    /// 재연결 후 다시 시도할 가치가 있는 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_)
                | ClientError::Timeout(_)
                | ClientError::Disconnected(_)
                | ClientError::NotConnected
        )
    }
}

/// 클라이언트 호출 Result 타입.
pub type ClientResult<T> = Result<T, ClientError>;

/// 엔진 작업 에러.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 시작 시 연결 수립 실패
    #[error("Connection failed to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: ClientError,
    },

    /// 재시도 한도 소진
    #[error("{operation} failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        operation: String,
        attempts: u32,
        #[source]
        source: ClientError,
    },

    /// 종목 목록에 없는 코드
    #[error("Security not found: {0}")]
    SecurityNotFound(String),

    /// 지원하지 않는 주기
    #[error("Unsupported frequency: {0}")]
    UnsupportedFrequency(String),

    /// 재구성 구간의 첫 버킷에 체결이 없음
    #[error("No trades in leading bucket ending {0}")]
    EmptyLeadingBucket(chrono::NaiveDateTime),

    /// 재시도 대상이 아닌 클라이언트 에러
    #[error(transparent)]
    Client(#[from] ClientError),

    /// 값 타입/설정 에러
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedFrequency(token) => EngineError::UnsupportedFrequency(token),
            other => EngineError::Core(other),
        }
    }
}

/// 엔진 작업 Result 타입.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::Timeout("5s".into()).is_retryable());
        assert!(ClientError::NotConnected.is_retryable());
        assert!(!ClientError::Protocol("bad header".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_retries_message() {
        let err = EngineError::ExhaustedRetries {
            operation: "get_security_bars".to_string(),
            attempts: 3,
            source: ClientError::Network("reset".into()),
        };
        assert_eq!(
            err.to_string(),
            "get_security_bars failed after 3 attempts: Network error: reset"
        );
    }

    #[test]
    fn test_core_frequency_error_is_lifted() {
        let err: EngineError = CoreError::UnsupportedFrequency("1w".into()).into();
        assert!(matches!(err, EngineError::UnsupportedFrequency(t) if t == "1w"));
    }
}
