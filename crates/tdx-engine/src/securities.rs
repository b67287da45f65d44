//! 서버 종목 목록.

use tracing::info;

use tdx_core::{Exchange, SecurityInfo, SecurityRef};

use crate::client::HqClient;
use crate::error::{ClientResult, EngineError, EngineResult};
use crate::table::securities_from_rows;

/// 두 거래소의 종목 목록 (선전 먼저, 상하이 다음).
///
/// 같은 코드가 두 거래소에 모두 있으면(지수 등) 코드 조회는 먼저 나온
/// 항목을 따릅니다.
#[derive(Debug, Clone, Default)]
pub struct SecurityList {
    entries: Vec<SecurityInfo>,
}

impl SecurityList {
    /// 이미 받은 항목들로 생성합니다.
    pub fn new(entries: Vec<SecurityInfo>) -> Self {
        Self { entries }
    }

    /// 서버에서 전체 목록을 읽습니다.
    ///
    /// 거래소마다 종목 수를 먼저 묻고 `page_size` 단위로 읽습니다.
    pub async fn load<C: HqClient>(conn: &mut C, page_size: usize) -> ClientResult<Self> {
        let page_size = page_size.max(1);
        let mut entries = Vec::new();

        for exchange in Exchange::all() {
            let count = conn.get_security_count(exchange).await?;
            for page in 0..=count / page_size {
                let rows = conn.get_security_list(exchange, page * page_size).await?;
                entries.extend(securities_from_rows(exchange, &rows)?);
            }
            info!(%exchange, count, "종목 목록 로드");
        }

        Ok(Self { entries })
    }

    /// 항목 수.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 모든 항목.
    pub fn iter(&self) -> impl Iterator<Item = &SecurityInfo> {
        self.entries.iter()
    }

    /// 코드로 첫 항목을 찾습니다.
    pub fn find(&self, code: &str) -> Option<&SecurityInfo> {
        self.entries.iter().find(|info| info.code == code)
    }

    /// 목록 기준 거래소. 목록에 없으면 [`EngineError::SecurityNotFound`].
    pub fn exchange_of(&self, code: &str) -> EngineResult<Exchange> {
        self.find(code)
            .map(|info| info.exchange)
            .ok_or_else(|| EngineError::SecurityNotFound(code.to_string()))
    }

    /// 목록에 있는 코드만 남겨 종목 참조로 바꿉니다.
    ///
    /// 한 코드가 두 거래소에 있으면 둘 다 포함합니다. 순서는 목록 순서입니다.
    pub fn refs_for(&self, codes: &[&str]) -> Vec<SecurityRef> {
        self.entries
            .iter()
            .filter(|info| codes.contains(&info.code.as_str()))
            .map(SecurityInfo::security_ref)
            .collect()
    }

    /// A주 보통주만 남긴 항목.
    pub fn stocks(&self) -> Vec<&SecurityInfo> {
        self.entries.iter().filter(|info| info.is_stock()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Endpoint;
    use crate::simulated::SimulatedServer;
    use rust_decimal::Decimal;

    fn info(exchange: Exchange, code: &str) -> SecurityInfo {
        SecurityInfo {
            exchange,
            code: code.to_string(),
            name: code.to_string(),
            volume_unit: 100,
            decimal_point: 2,
            pre_close: Decimal::ONE,
        }
    }

    fn sample() -> SecurityList {
        SecurityList::new(vec![
            info(Exchange::Sz, "000001"),
            info(Exchange::Sz, "399001"),
            info(Exchange::Sh, "000001"),
            info(Exchange::Sh, "600000"),
        ])
    }

    #[test]
    fn test_first_entry_wins() {
        let list = sample();
        assert_eq!(list.exchange_of("000001").unwrap(), Exchange::Sz);
        assert_eq!(list.exchange_of("600000").unwrap(), Exchange::Sh);
        assert!(matches!(
            list.exchange_of("123456"),
            Err(EngineError::SecurityNotFound(code)) if code == "123456"
        ));
    }

    #[test]
    fn test_refs_for_expands_duplicates() {
        let refs = sample().refs_for(&["000001", "999999"]);
        assert_eq!(
            refs,
            vec![
                SecurityRef::new(Exchange::Sz, "000001"),
                SecurityRef::new(Exchange::Sh, "000001"),
            ]
        );
    }

    #[test]
    fn test_stocks() {
        let list = sample();
        let codes: Vec<String> = list
            .stocks()
            .iter()
            .map(|info| info.security_ref().to_string())
            .collect();
        assert_eq!(codes, vec!["000001.SZ", "600000.SH"]);
    }

    #[tokio::test]
    async fn test_load_pages_each_exchange() {
        let server = SimulatedServer::new();
        server.set_security_page_size(10);
        for i in 0..25 {
            server.add_security(Exchange::Sz, &format!("{:06}", i), "sz", 1.0);
        }
        for i in 0..10 {
            server.add_security(Exchange::Sh, &format!("6{:05}", i), "sh", 1.0);
        }
        let mut conn = server.client();
        conn.connect(&Endpoint::new("127.0.0.1", 7709)).await.unwrap();

        let list = SecurityList::load(&mut conn, 10).await.unwrap();
        assert_eq!(list.len(), 35);
        assert_eq!(list.iter().next().unwrap().exchange, Exchange::Sz);
        // 25 / 10 + 1 = 3 페이지, 10 / 10 + 1 = 2 페이지
        assert_eq!(server.stats().calls("get_security_list"), 5);
        assert_eq!(server.stats().calls("get_security_count"), 2);
    }
}
