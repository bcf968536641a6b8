//! Authorized resource calls. Failures come back as text because the host shows whatever
//! string it gets.

use async_trait::async_trait;
use tracing::{debug, warn};

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// GET `url` with `Authorization: Bearer <access_token>`; never fails, errors become the returned text.
    async fn fetch(&self, url: &str, access_token: &str) -> String;
}

#[derive(Clone, Default)]
pub struct ResourceClient {
    client: reqwest::Client,
}

impl ResourceClient {
    pub fn new() -> Self { Self::default() }

    pub fn with_client(client: reqwest::Client) -> Self { Self { client } }

    async fn get(&self, url: &str, access_token: &str) -> Result<String, reqwest::Error> {
        let resp = self.client.get(url).bearer_auth(access_token).send().await?;
        debug!(target: "resource", url = %url, status = %resp.status(), "resource responded");
        // body is returned whatever the status; the caller renders it verbatim
        resp.text().await
    }
}

#[async_trait]
impl ResourceFetcher for ResourceClient {
    async fn fetch(&self, url: &str, access_token: &str) -> String {
        match self.get(url, access_token).await {
            Ok(body) => body,
            Err(e) => {
                let text = format!("{:#}", anyhow::Error::from(e));
                warn!(target: "resource", url = %url, error = %text, "resource call failed");
                text
            }
        }
    }
}
