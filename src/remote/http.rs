use async_trait::async_trait;
use chrono::Utc;
use color_eyre::eyre::eyre;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::Collection;
use crate::config::RemoteConfig;

use super::{ActionRemote, AddedItem, FullState, RemoteError, RemoteResult, StateSource};

/// JSON REST adapter for the remote collection service.
#[derive(Clone)]
pub struct HttpRemote {
  client: Client,
  base: Url,
  token: String,
}

impl HttpRemote {
  pub fn new(config: &RemoteConfig, token: String) -> color_eyre::Result<Self> {
    let base = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid remote url {}: {}", config.url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!(
        "Remote url {} cannot be used as a base",
        config.url
      ));
    }

    let client = Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  /// Build a request for `segments` appended to the base path.
  /// Each segment is percent-encoded, so ids may contain '/'.
  fn request(&self, method: Method, segments: &[&str]) -> RemoteResult<RequestBuilder> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| RemoteError::Decode(format!("remote url cannot be a base: {}", self.base)))?
      .pop_if_empty()
      .extend(segments);
    Ok(self.client.request(method, url).bearer_auth(&self.token))
  }

  async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
      status: status.as_u16(),
      body,
    })
  }

  async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> RemoteResult<T> {
    let response = self.send(builder).await?;
    response
      .json::<T>()
      .await
      .map_err(|e| RemoteError::Decode(e.to_string()))
  }
}

#[async_trait]
impl ActionRemote for HttpRemote {
  async fn create_collection(&self, title: &str, description: &str) -> RemoteResult<()> {
    let body = json!({ "title": title, "description": description });
    self
      .send(self.request(Method::POST, &["collections"])?.json(&body))
      .await?;
    Ok(())
  }

  async fn delete_collection(&self, collection_id: &str) -> RemoteResult<()> {
    let request = self.request(Method::DELETE, &["collections", collection_id])?;
    self.send(request).await?;
    Ok(())
  }

  async fn add_item(
    &self,
    collection_id: &str,
    content_id: &str,
    position: Option<u32>,
  ) -> RemoteResult<Option<AddedItem>> {
    let mut body = json!({ "contentId": content_id });
    if let Some(position) = position {
      body["position"] = json!(position);
    }
    let request = self
      .request(Method::POST, &["collections", collection_id, "items"])?
      .json(&body);
    let response = self.send(request).await?;

    // The add has landed once the status is 2xx; the body only matters to moves
    let text = response.text().await.unwrap_or_default();
    let added = parse_added_item(&text);
    if added.is_none() {
      debug!(collection_id, content_id, "Add response carried no item id");
    }
    Ok(added)
  }

  async fn delete_item(&self, item_id: &str) -> RemoteResult<()> {
    let request = self.request(Method::DELETE, &["items", item_id])?;
    self.send(request).await?;
    Ok(())
  }
}

#[async_trait]
impl StateSource for HttpRemote {
  async fn fetch_full_state(&self) -> RemoteResult<FullState> {
    let collections: Vec<Collection> = self
      .send_json(self.request(Method::GET, &["collections"])?)
      .await?;

    Ok(FullState {
      collections,
      synced_at: Utc::now(),
    })
  }
}

fn parse_added_item(body: &str) -> Option<AddedItem> {
  serde_json::from_str(body).ok()
}
