//! 外部服务客户端：Stripe Connect、Plaid、对象存储

use std::time::Duration;

mod plaid;
mod storage;
mod stripe;

pub use plaid::{LinkToken, PlaidClient, PublicTokenExchange};
pub use storage::StorageClient;
pub use stripe::{AccountLink, ConnectAccount, NewConnectAccount, Requirements, StripeClient};

pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(16)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

#[cfg(test)]
pub(crate) mod mock {
    use axum::Router;

    /// 在随机端口启动一个模拟的外部服务，返回其基础地址
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
