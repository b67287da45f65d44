//! 메모리 서버에 붙는 [`HqClient`] 구현.

use async_trait::async_trait;
use chrono::NaiveDate;

use tdx_core::{Exchange, SecurityRef};

use crate::client::{Endpoint, HqClient, RawBar, RawQuote, RawSecurity, RawTransaction};
use crate::error::{ClientError, ClientResult};

use super::server::{newest_first_page, ServerState, SimulatedServer};

/// 시뮬레이션 세션.
pub struct SimulatedHqClient {
    id: usize,
    connected: bool,
    server: SimulatedServer,
}

impl SimulatedHqClient {
    pub(super) fn new(id: usize, server: SimulatedServer) -> Self {
        Self {
            id,
            connected: false,
            server,
        }
    }

    /// 세션 식별자 (서버 안에서 유일).
    pub fn id(&self) -> usize {
        self.id
    }

    /// 연결 여부.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// RPC 하나를 처리합니다.
    ///
    /// 호출 횟수를 세고, 연결 상태와 실패 주입을 확인한 뒤 지연만큼 기다렸다가
    /// `handler`로 응답을 만듭니다.
    async fn rpc<T, F>(&mut self, operation: &'static str, handler: F) -> ClientResult<T>
    where
        F: FnOnce(&ServerState) -> T + Send,
    {
        let latency = {
            let mut state = self.server.state.lock();
            *state.stats.calls.entry(operation).or_insert(0) += 1;
            if !self.connected {
                return Err(ClientError::NotConnected);
            }
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(ClientError::Network(format!(
                    "connection reset during {}",
                    operation
                )));
            }
            state.in_flight += 1;
            state.stats.max_in_flight = state.stats.max_in_flight.max(state.in_flight);
            state.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.server.state.lock();
        state.in_flight -= 1;
        Ok(handler(&state))
    }
}

#[async_trait]
impl HqClient for SimulatedHqClient {
    async fn connect(&mut self, _endpoint: &Endpoint) -> ClientResult<()> {
        let mut state = self.server.state.lock();
        if let Some(budget) = state.connect_budget.as_mut() {
            if *budget == 0 {
                return Err(ClientError::Network("connection refused".to_string()));
            }
            *budget -= 1;
        }
        state.stats.connects += 1;
        if !self.connected {
            state.open_sessions += 1;
            self.connected = true;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        if self.connected {
            let mut state = self.server.state.lock();
            state.open_sessions -= 1;
            state.stats.disconnects += 1;
            self.connected = false;
        }
        Ok(())
    }

    async fn get_security_quotes(
        &mut self,
        securities: &[SecurityRef],
    ) -> ClientResult<Vec<RawQuote>> {
        let requested: Vec<SecurityRef> = securities.to_vec();
        let count = requested.len();
        let quotes = self
            .rpc("get_security_quotes", move |state| {
                requested
                    .iter()
                    .filter_map(|security| {
                        let listed = state.find_security(security.exchange, &security.code)?;
                        Some(snapshot(security.exchange, listed))
                    })
                    .collect::<Vec<_>>()
            })
            .await?;
        self.server.state.lock().stats.quote_batches.push(count);
        Ok(quotes)
    }

    async fn get_security_bars(
        &mut self,
        category: u8,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
    ) -> ClientResult<Vec<RawBar>> {
        let key = (category, exchange, code.to_string());
        self.rpc("get_security_bars", move |state| {
            state
                .security_bars
                .get(&key)
                .map(|rows| newest_first_page(rows, offset, count))
                .unwrap_or_default()
        })
        .await
    }

    async fn get_index_bars(
        &mut self,
        category: u8,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
    ) -> ClientResult<Vec<RawBar>> {
        let key = (category, exchange, code.to_string());
        self.rpc("get_index_bars", move |state| {
            state
                .index_bars
                .get(&key)
                .map(|rows| newest_first_page(rows, offset, count))
                .unwrap_or_default()
        })
        .await
    }

    async fn get_history_transaction_data(
        &mut self,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
        date: NaiveDate,
    ) -> ClientResult<Vec<RawTransaction>> {
        let key = (exchange, code.to_string(), date);
        self.rpc("get_history_transaction_data", move |state| {
            state
                .history
                .get(&key)
                .map(|rows| newest_first_page(rows, offset, count))
                .unwrap_or_default()
        })
        .await
    }

    async fn get_transaction_data(
        &mut self,
        exchange: Exchange,
        code: &str,
        offset: usize,
        count: usize,
    ) -> ClientResult<Vec<RawTransaction>> {
        let key = (exchange, code.to_string());
        self.rpc("get_transaction_data", move |state| {
            state
                .today
                .get(&key)
                .map(|rows| newest_first_page(rows, offset, count))
                .unwrap_or_default()
        })
        .await
    }

    async fn get_security_list(
        &mut self,
        exchange: Exchange,
        offset: usize,
    ) -> ClientResult<Vec<RawSecurity>> {
        self.rpc("get_security_list", move |state| {
            state
                .securities
                .get(&exchange)
                .map(|list| {
                    list.iter()
                        .skip(offset)
                        .take(state.security_page_size)
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
        .await
    }

    async fn get_security_count(&mut self, exchange: Exchange) -> ClientResult<usize> {
        self.rpc("get_security_count", move |state| {
            state.securities.get(&exchange).map_or(0, Vec::len)
        })
        .await
    }
}

/// 등록된 종목의 전일 종가로 만든 시세.
fn snapshot(exchange: Exchange, listed: &RawSecurity) -> RawQuote {
    let price = listed.pre_close;
    RawQuote {
        market: exchange.market_code(),
        code: listed.code.clone(),
        price,
        last_close: price,
        open: price,
        high: price,
        low: price,
        vol: 0.0,
        amount: 0.0,
        bid1: price,
        ask1: price,
        bid_vol1: 0.0,
        ask_vol1: 0.0,
        servertime: "09:30:00.000".to_string(),
    }
}
