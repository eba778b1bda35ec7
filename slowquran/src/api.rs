//! Content API client
//!
//! [`HttpApi`] talks to the REST endpoints, [`CachedApi`] puts the
//! persistent cache in front of any [`QuranApi`].

use crate::cache::{Cache, Namespace};
use crate::error::ApiError;
use crate::model::{Chapter, ChapterInfo, ChapterInfoResponse, ChaptersResponse, VersePage};
use crate::text::clean_translation;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait QuranApi: Send + Sync {
    /// All 114 chapters.
    async fn chapters(&self) -> Result<Vec<Chapter>, ApiError>;
    /// One page of a chapter's verses.
    async fn verses(&self, chapter: u16, page: u32) -> Result<VersePage, ApiError>;
    /// Extended description of a chapter, if the server has one.
    async fn chapter_info(&self, chapter: u16) -> Result<Option<ChapterInfo>, ApiError>;
}

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("slowquran/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl QuranApi for HttpApi {
    async fn chapters(&self) -> Result<Vec<Chapter>, ApiError> {
        let body: ChaptersResponse = self.get_json("/api/chapters").await?;
        Ok(body.chapters)
    }

    async fn verses(&self, chapter: u16, page: u32) -> Result<VersePage, ApiError> {
        let mut body: VersePage = self
            .get_json(&format!("/api/chapters/{chapter}/verses?page={page}"))
            .await?;
        for verse in &mut body.verses {
            for translation in &mut verse.translations {
                translation.text = clean_translation(&translation.text);
            }
        }
        Ok(body)
    }

    async fn chapter_info(&self, chapter: u16) -> Result<Option<ChapterInfo>, ApiError> {
        let body: ChapterInfoResponse = self
            .get_json(&format!("/api/chapters/{chapter}/info"))
            .await?;
        Ok(body.chapter_info)
    }
}

/// Serves responses from the cache, fetching and storing them on a miss.
pub struct CachedApi<A> {
    inner: A,
    cache: Cache,
}

impl<A: QuranApi> CachedApi<A> {
    pub fn new(inner: A, cache: Cache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }
}

#[async_trait]
impl<A: QuranApi> QuranApi for CachedApi<A> {
    async fn chapters(&self) -> Result<Vec<Chapter>, ApiError> {
        self.cache
            .read_through_if(
                Namespace::Chapters,
                "chapters:all",
                || self.inner.chapters(),
                |chapters: &Vec<Chapter>| !chapters.is_empty(),
            )
            .await
    }

    async fn verses(&self, chapter: u16, page: u32) -> Result<VersePage, ApiError> {
        let key = format!("chapter:{chapter}:page:{page}");
        self.cache
            .read_through_if(
                Namespace::Verses,
                &key,
                || self.inner.verses(chapter, page),
                |page: &VersePage| !page.verses.is_empty(),
            )
            .await
    }

    async fn chapter_info(&self, chapter: u16) -> Result<Option<ChapterInfo>, ApiError> {
        let key = format!("chapter:{chapter}:info");
        self.cache
            .read_through_if(
                Namespace::Chapters,
                &key,
                || self.inner.chapter_info(chapter),
                |info: &Option<ChapterInfo>| info.is_some(),
            )
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeApi;
    use super::*;
    use crate::cache::MemoryCache;
    use std::sync::Arc;

    #[test]
    fn test_base_url_is_normalized() {
        let api = HttpApi::with_client(reqwest::Client::new(), "http://localhost:3000/");
        assert_eq!(api.url("/api/chapters"), "http://localhost:3000/api/chapters");
    }

    #[tokio::test]
    async fn test_cached_api_fetches_each_page_once() {
        let store = Arc::new(MemoryCache::new());
        let api = CachedApi::new(FakeApi::new(), Cache::new(store.clone()));

        let first = api.verses(2, 3).await.unwrap();
        api.cache().settle().await;
        let second = api.verses(2, 3).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(api.inner.requests(), ["verses 2:3"]);
        assert!(store.contains(Namespace::Verses, "chapter:2:page:3"));
    }

    #[tokio::test]
    async fn test_cached_api_namespaces() {
        let store = Arc::new(MemoryCache::new());
        let api = CachedApi::new(FakeApi::new(), Cache::new(store.clone()));
        assert_eq!(api.chapters().await.unwrap().len(), 4);
        assert!(api.chapter_info(1).await.unwrap().is_some());
        api.cache().settle().await;
        assert!(store.contains(Namespace::Chapters, "chapters:all"));
        assert!(store.contains(Namespace::Chapters, "chapter:1:info"));
        assert!(!store.contains(Namespace::Verses, "chapters:all"));
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let store = Arc::new(MemoryCache::new());
        let api = CachedApi::new(FakeApi::new(), Cache::new(store.clone()));
        assert!(api.verses(1, 2).await.unwrap().verses.is_empty());
        assert_eq!(api.chapter_info(2).await.unwrap(), None);
        api.cache().settle().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failures_pass_through_uncached() {
        let store = Arc::new(MemoryCache::new());
        let fake = FakeApi::new();
        fake.fail_page(2, 1);
        let api = CachedApi::new(fake, Cache::new(store.clone()));
        let err = api.verses(2, 1).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        api.cache().settle().await;
        assert!(store.is_empty());
    }
}
