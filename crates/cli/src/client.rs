//! API client for communicating with the classifier server

use anyhow::{Context, Result};
use digits_lib::CommandResult;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

/// API client for the classifier server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<CommandResult<T>> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::read_result(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<CommandResult<T>> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::read_result(response).await
    }

    /// Failed commands still carry a `CommandResult` body; anything else is an API error
    async fn read_result<T: DeserializeOwned>(response: Response) -> Result<CommandResult<T>> {
        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;

        match serde_json::from_str::<CommandResult<T>>(&body) {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => anyhow::bail!("API error ({}): {}", status, body),
            Err(e) => Err(e).context("Failed to parse response"),
        }
    }
}
