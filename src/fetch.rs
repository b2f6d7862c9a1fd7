//! 基于 `reqwest` 的网络获取模块
//!
//! 定义统一的站点能力接口 [`Source`]（目录、详情、章节、页面），
//! 以及两个站点共用的 HTTP 辅助：宽松客户端、带 `Referer` 的 GET、状态码检查。
//! 各站点的实现位于 [`astral`] 与 [`poroiniens`]。
//!
//! # 示例
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! use scan_sources::{AstralManga, Source};
//! let source = AstralManga::builder().build()?;
//! let page = source.popular(1).await?;
//! for manga in &page.mangas {
//!     println!("{} -> {}", manga.title, manga.url);
//! }
//! # Ok(())
//! # }
//! ```
#![cfg(feature = "reqwest")]

pub mod astral;
pub mod poroiniens;

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use tracing::debug;
use url::Url;

use crate::patch::HttpResponse;
use crate::{Chapter, Manga, MangaPage, MangaStatus, Page};

/// 目录排序字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// 按标题（升序）
    #[default]
    Title,
    /// 按评分（降序）
    Note,
    /// 按发布时间（降序）
    PublishDate,
}

impl SortBy {
    /// 查询参数值
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Note => "note",
            Self::PublishDate => "publishDate",
        }
    }

    /// 排序方向：标题升序，其余降序。
    #[must_use]
    pub const fn order(self) -> &'static str {
        match self {
            Self::Title => "asc",
            Self::Note | Self::PublishDate => "desc",
        }
    }
}

/// 搜索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// 关键字；空白时不参与过滤
    pub query: String,
    /// 排序字段
    pub sort: SortBy,
    /// 连载状态
    pub status: Option<MangaStatus>,
    /// 作品类型，如 "Manhwa"
    pub content_type: Option<String>,
    /// 需要同时满足的题材
    pub tags: Vec<String>,
}

impl SearchQuery {
    /// 以关键字创建搜索条件。
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// 去除首尾空白后的关键字；空白时为 `None`。
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        Some(self.query.trim()).filter(|q| !q.is_empty())
    }
}

/// 站点能力接口
///
/// 页码从 1 开始。返回的作品与章节地址均为站内相对路径，可直接传回同一站点。
#[async_trait]
pub trait Source: Send + Sync {
    /// 站点名称
    fn name(&self) -> &str;

    /// 站点根地址
    fn base_url(&self) -> &Url;

    /// 热门作品
    async fn popular(&self, page: u32) -> Result<MangaPage>;

    /// 最近更新
    async fn latest(&self, page: u32) -> Result<MangaPage>;

    /// 搜索
    async fn search(&self, page: u32, query: &SearchQuery) -> Result<MangaPage>;

    /// 作品详情
    async fn manga_details(&self, manga: &Manga) -> Result<Manga>;

    /// 章节列表
    async fn chapter_list(&self, manga: &Manga) -> Result<Vec<Chapter>>;

    /// 章节页面列表，页序从 0 开始
    async fn page_list(&self, chapter: &Chapter) -> Result<Vec<Page>>;
}

/// 创建一个规则宽松、兼容性更强的 HTTP 客户端。
///
/// - 设置浏览器 UA；
/// - 配置超时与重定向；
/// - 启用 Cookie 存储（站点依赖会话 Cookie）。
///
/// # 错误
///
/// 底层 TLS 后端初始化失败时返回错误。
pub fn make_lenient_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119 Safari/537.36 scan-sources")
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .cookie_store(true)
        .build()
        .map_err(|e| anyhow!("When building client: {e}"))?;
    Ok(client)
}

/// 单个站点的 HTTP 会话：客户端、根地址与默认请求头。
#[derive(Debug, Clone)]
pub(crate) struct HttpSession {
    client: reqwest::Client,
    base_url: Url,
    headers: HeaderMap,
}

impl HttpSession {
    /// 创建会话；每个请求都带 `Referer: <base>/`。
    pub(crate) fn new(client: reqwest::Client, base_url: Url) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let referer = HeaderValue::from_str(base_url.as_str())
            .map_err(|e| anyhow!("When building referer header: {e}"))?;
        headers.insert(REFERER, referer);
        Ok(Self {
            client,
            base_url,
            headers,
        })
    }

    pub(crate) const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 把站内路径拼接为绝对地址。
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| anyhow!("When joining {path} onto {}: {e}", self.base_url))
    }

    /// 发送 GET 并读取完整正文；不检查状态码。
    pub(crate) async fn get(&self, url: Url) -> Result<HttpResponse> {
        self.get_with(url, HeaderMap::new()).await
    }

    /// 带额外请求头的 GET。
    pub(crate) async fn get_with(&self, url: Url, extra: HeaderMap) -> Result<HttpResponse> {
        debug!(%url, "GET");
        let mut headers = self.headers.clone();
        headers.extend(extra);
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| anyhow!("When fetching {url}: {e}"))?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("When reading response of {url}: {e}"))?;
        Ok(HttpResponse {
            status,
            url: final_url,
            body,
        })
    }
}

/// 非 2xx 响应转换为错误。
pub(crate) fn ensure_success(response: HttpResponse) -> Result<HttpResponse> {
    if (200..300).contains(&response.status) {
        Ok(response)
    } else {
        Err(anyhow!(
            "Unexpected HTTP status {} for {}",
            response.status,
            response.url
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试排序参数与方向
    #[test]
    fn test_sort_params() {
        assert_eq!(SortBy::default().as_param(), "title");
        assert_eq!(SortBy::Title.order(), "asc");
        assert_eq!(SortBy::Note.order(), "desc");
        assert_eq!(SortBy::PublishDate.as_param(), "publishDate");
    }

    /// 测试空白关键字
    #[test]
    fn test_search_keyword() {
        assert_eq!(SearchQuery::new("  ").keyword(), None);
        assert_eq!(SearchQuery::new(" solo ").keyword(), Some("solo"));
    }

    /// 测试状态码检查
    #[test]
    fn test_ensure_success() {
        let url = Url::parse("https://astral-manga.fr/api/mangas").unwrap();
        let ok = HttpResponse {
            status: 204,
            url: url.clone(),
            body: String::new(),
        };
        assert!(ensure_success(ok).is_ok());
        let err = ensure_success(HttpResponse {
            status: 503,
            url,
            body: String::new(),
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected HTTP status 503 for https://astral-manga.fr/api/mangas"
        );
    }

    /// 测试站内路径拼接与 Referer
    #[test]
    fn test_session_urls() {
        let session = HttpSession::new(
            reqwest::Client::new(),
            Url::parse("https://lesporoiniens.org").unwrap(),
        )
        .unwrap();
        assert_eq!(
            session.url("/data/config.json").unwrap().as_str(),
            "https://lesporoiniens.org/data/config.json"
        );
        assert_eq!(
            session.headers.get(REFERER).unwrap(),
            "https://lesporoiniens.org/"
        );
    }
}
