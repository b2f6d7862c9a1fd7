//! AstralManga
//!
//! 目录来自分页 JSON 接口 `/api/mangas`；详情、章节与页面只存在于页面内联的
//! RSC 数据中，由 [`crate::decode`] 的启发式解码器提取。图片以 `s3:` 键存储时通过
//! `/api/s3/presign-get` 换取临时直链，单次预签名失败只影响对应的封面或页面。

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use tracing::{debug, warn};
use url::Url;

use super::{HttpSession, SearchQuery, SortBy, Source, ensure_success, make_lenient_client};
use crate::de::PresignResponse;
use crate::decode::{
    MangaDraft, PAGE_SIZE, assemble_pages, decode_catalog, decode_chapters, decode_manga_details,
    decode_page_candidates,
};
use crate::{Chapter, ImageLink, Manga, MangaPage, MangaStatus, Page};

/// 站点根地址
pub const BASE_URL: &str = "https://astral-manga.fr";

/// AstralManga 站点
#[derive(Debug, Clone)]
pub struct AstralManga {
    session: HttpSession,
}

/// [`AstralManga`] 的构建器
#[derive(Debug, Clone, Default)]
pub struct AstralMangaBuilder {
    base_url: Option<String>,
    client: Option<reqwest::Client>,
}

impl AstralMangaBuilder {
    /// 覆盖站点根地址（例如指向测试服务器）。
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// 使用外部创建的客户端。
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// 构建站点。
    ///
    /// # 错误
    ///
    /// 根地址无法解析或默认客户端创建失败时返回错误。
    pub fn build(self) -> Result<AstralManga> {
        let base_url = Url::parse(self.base_url.as_deref().unwrap_or(BASE_URL))?;
        let client = match self.client {
            Some(client) => client,
            None => make_lenient_client()?,
        };
        Ok(AstralManga {
            session: HttpSession::new(client, base_url)?,
        })
    }
}

/// 搜索接口的状态参数
const fn status_param(status: MangaStatus) -> Option<&'static str> {
    match status {
        MangaStatus::Ongoing => Some("ON_GOING"),
        MangaStatus::Completed => Some("COMPLETED"),
        MangaStatus::Cancelled => Some("CANCELLED"),
        MangaStatus::OnHiatus => Some("HIATUS"),
        MangaStatus::Unknown => None,
    }
}

impl AstralManga {
    /// 创建构建器。
    #[must_use]
    pub fn builder() -> AstralMangaBuilder {
        AstralMangaBuilder::default()
    }

    /// 以默认配置创建站点。
    ///
    /// # 错误
    ///
    /// 默认客户端创建失败时返回错误。
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// 构造目录接口地址。
    ///
    /// 参数顺序：`page`、`pageSize`、`filters` 追加的筛选、`sortBy`、`sortOrder`、
    /// `includeMode=and`、`excludeMode=or`。
    fn catalog_url<F>(&self, page: u32, sort: SortBy, filters: F) -> Result<Url>
    where
        F: FnOnce(&mut url::form_urlencoded::Serializer<'_, url::UrlQuery<'_>>),
    {
        let mut url = self.session.url("/api/mangas")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("page", &page.to_string())
                .append_pair("pageSize", &PAGE_SIZE.to_string());
            filters(&mut query);
            query
                .append_pair("sortBy", sort.as_param())
                .append_pair("sortOrder", sort.order())
                .append_pair("includeMode", "and")
                .append_pair("excludeMode", "or");
        }
        Ok(url)
    }

    /// 搜索接口地址。
    ///
    /// # 错误
    ///
    /// 根地址无法拼接时返回错误。
    pub fn search_url(&self, page: u32, search: &SearchQuery) -> Result<Url> {
        self.catalog_url(page, search.sort, |query| {
            if let Some(keyword) = search.keyword() {
                query.append_pair("query", keyword);
            }
            if let Some(status) = search.status.and_then(status_param) {
                query.append_pair("status", status);
            }
            if let Some(content_type) = search.content_type.as_deref().filter(|t| !t.is_empty()) {
                query.append_pair("type", content_type);
            }
            for tag in &search.tags {
                query.append_pair("tags", tag);
            }
        })
    }

    /// 用预签名接口把 S3 键换成临时直链。
    ///
    /// 任何失败（网络错误、非 2xx、响应形状不符）都只记录日志并返回 `None`。
    pub async fn presign(&self, key: &str) -> Option<String> {
        let mut url = match self.session.url("/api/s3/presign-get") {
            Ok(url) => url,
            Err(e) => {
                warn!("When building presign url: {e}");
                return None;
            }
        };
        url.query_pairs_mut().append_pair("key", key);

        let response = match self.session.get(url).await.and_then(ensure_success) {
            Ok(response) => response,
            Err(e) => {
                warn!(key, "When presigning: {e}");
                return None;
            }
        };
        match serde_json::from_str::<PresignResponse>(&response.body) {
            Ok(presigned) => Some(presigned.url),
            Err(e) => {
                warn!(key, "When parsing presign response: {e}");
                None
            }
        }
    }

    async fn finish_draft(&self, draft: MangaDraft) -> Manga {
        let presigned = match draft.cover_key.as_deref() {
            Some(key) => self.presign(key).await,
            None => None,
        };
        draft.finish(presigned)
    }

    async fn fetch_catalog(&self, url: Url) -> Result<MangaPage> {
        let response = ensure_success(self.session.get(url).await?)?;
        let (drafts, has_next_page) = decode_catalog(&response.body)?;
        let mut mangas = Vec::with_capacity(drafts.len());
        for draft in drafts {
            mangas.push(self.finish_draft(draft).await);
        }
        Ok(MangaPage {
            mangas,
            has_next_page,
        })
    }
}

#[async_trait]
impl Source for AstralManga {
    fn name(&self) -> &str {
        "AstralManga"
    }

    fn base_url(&self) -> &Url {
        self.session.base_url()
    }

    async fn popular(&self, page: u32) -> Result<MangaPage> {
        let url = self.catalog_url(page, SortBy::Note, |_| {})?;
        self.fetch_catalog(url).await
    }

    async fn latest(&self, page: u32) -> Result<MangaPage> {
        let url = self.catalog_url(page, SortBy::PublishDate, |_| {})?;
        self.fetch_catalog(url).await
    }

    async fn search(&self, page: u32, query: &SearchQuery) -> Result<MangaPage> {
        let url = self.search_url(page, query)?;
        self.fetch_catalog(url).await
    }

    async fn manga_details(&self, manga: &Manga) -> Result<Manga> {
        let url = self.session.url(&manga.url)?;
        let response = ensure_success(self.session.get(url.clone()).await?)?;
        let draft = decode_manga_details(&response.body, &url);
        Ok(self.finish_draft(draft).await)
    }

    async fn chapter_list(&self, manga: &Manga) -> Result<Vec<Chapter>> {
        let url = self.session.url(&manga.url)?;
        let response = ensure_success(self.session.get(url.clone()).await?)?;
        let chapters = decode_chapters(&response.body, url.as_str());
        if !chapters.is_empty() {
            return Ok(chapters);
        }

        // 首次加载时 RSC 数据可能不完整
        let mut retry_url = url.clone();
        retry_url
            .query_pairs_mut()
            .append_pair("_", &Utc::now().timestamp_millis().to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        debug!(%retry_url, "no chapters on first load, retrying without cache");
        let response = ensure_success(self.session.get_with(retry_url, headers).await?)?;
        Ok(decode_chapters(&response.body, url.as_str()))
    }

    async fn page_list(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        let url = self.session.url(&chapter.url)?;
        let response = ensure_success(self.session.get(url.clone()).await?)?;
        let candidates = decode_page_candidates(&response.body, &url);

        let mut resolved = Vec::with_capacity(candidates.links.len());
        for (order, link) in candidates.links {
            let image_url = match link {
                ImageLink::Direct(link) => Some(link),
                ImageLink::S3(key) => self.presign(&key).await,
            };
            resolved.push((order, image_url));
        }
        Ok(assemble_pages(resolved, candidates.fallback))
    }
}
