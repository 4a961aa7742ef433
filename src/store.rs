//! Backing systems of record behind the cache.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{StatusCode, Url};
use std::time::Duration;

use crate::error::StoreError;

/// A system of record the cache reads through and writes through.
///
/// Timeouts and retries, if any, are the store's own business. The cache
/// never catches a `StoreError`.
#[async_trait]
pub trait Store: Send + Sync {
    type Value: Clone + Send + Sync + 'static;

    async fn fetch(&self, id: &str) -> Result<Self::Value, StoreError>;

    async fn write(&self, id: &str, value: &Self::Value) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: Store + ?Sized> Store for Box<T> {
    type Value = T::Value;

    async fn fetch(&self, id: &str) -> Result<Self::Value, StoreError> {
        (**self).fetch(id).await
    }

    async fn write(&self, id: &str, value: &Self::Value) -> Result<(), StoreError> {
        (**self).write(id, value).await
    }
}

/// Store of JSON documents chosen at runtime.
pub type JsonStore = Box<dyn Store<Value = serde_json::Value>>;

/// In-process store, used when no remote store is configured.
#[derive(Debug)]
pub struct MemoryStore<V> {
    resources: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> Store for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    async fn fetch(&self, id: &str) -> Result<V, StoreError> {
        self.resources
            .get(id)
            .map(|value| value.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn write(&self, id: &str, value: &V) -> Result<(), StoreError> {
        self.resources.insert(id.to_string(), value.clone());
        Ok(())
    }
}

/// Remote store speaking JSON over HTTP.
///
/// Resources live at `{base_url}/resources/{id}`: `GET` reads, `PUT` writes.
/// The id always lands in a single, percent-encoded path segment.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, StoreError> {
        // add http:// if not present
        let base_url = if base_url.starts_with("http") {
            base_url.to_string()
        } else {
            format!("http://{}", base_url)
        };
        let base_url = Url::parse(&base_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn resource_url(&self, id: &str) -> Result<Url, StoreError> {
        // dot segments would be dropped or resolved, landing on another resource
        if id.is_empty() || id == "." || id == ".." {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("resources")
            .push(id);
        Ok(url)
    }
}

fn check_status(status: StatusCode, id: &str) -> Result<(), StoreError> {
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(id.to_string()));
    }
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl Store for HttpStore {
    type Value = serde_json::Value;

    async fn fetch(&self, id: &str) -> Result<serde_json::Value, StoreError> {
        let res = self.client.get(self.resource_url(id)?).send().await?;
        check_status(res.status(), id)?;
        Ok(res.json().await?)
    }

    async fn write(&self, id: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let res = self
            .client
            .put(self.resource_url(id)?)
            .json(value)
            .send()
            .await?;
        check_status(res.status(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::<i32>::new();
        assert!(matches!(
            store.fetch("id1").await,
            Err(StoreError::NotFound(id)) if id == "id1"
        ));

        store.write("id1", &7).await.unwrap();
        assert_eq!(store.fetch("id1").await.unwrap(), 7);
    }

    fn store(base_url: &str) -> HttpStore {
        HttpStore::with_client(reqwest::Client::new(), base_url).unwrap()
    }

    #[test]
    fn http_store_normalizes_base_url() {
        let store = store("localhost:9000/");
        assert_eq!(store.base_url(), "http://localhost:9000/");
        assert_eq!(
            store.resource_url("id1").unwrap().as_str(),
            "http://localhost:9000/resources/id1"
        );

        let store = self::store("https://records.internal/api/");
        assert_eq!(
            store.resource_url("id1").unwrap().as_str(),
            "https://records.internal/api/resources/id1"
        );
    }

    #[test]
    fn ids_stay_inside_one_path_segment() {
        let store = store("localhost:9000");

        let url = store.resource_url("a/../admin").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/resources/a%2F..%2Fadmin");

        let url = store.resource_url("a?x=1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/resources/a%3Fx=1");
        assert_eq!(url.query(), None);

        let url = store.resource_url("a#frag").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/resources/a%23frag");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn dot_segment_ids_are_rejected() {
        let store = store("localhost:9000");
        for id in ["", ".", ".."] {
            assert!(matches!(
                store.resource_url(id),
                Err(StoreError::InvalidId(_))
            ));
        }
    }

    #[test]
    fn unparseable_base_url_is_rejected() {
        let result = HttpStore::with_client(reqwest::Client::new(), "http://exa mple.com");
        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));
    }

    #[test]
    fn statuses_map_to_store_errors() {
        assert!(check_status(StatusCode::OK, "a").is_ok());
        assert!(check_status(StatusCode::NO_CONTENT, "a").is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, "a"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, "a"),
            Err(StoreError::Status { status: 502, .. })
        ));
    }
}
