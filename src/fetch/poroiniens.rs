//! Les Poroiniens
//!
//! 静态站点：`/data/config.json` 列出所有系列文档，每个系列文档
//! `/data/series/<file>.json` 同时包含详情与章节。所有响应在解码前都经过
//! [`patch_series_response`]，因此下游只需处理“章节为 1 起始映射”这一种形状，
//! 被拒绝访问的系列会以哨兵条目出现并在目录层过滤。
//!
//! 作品地址即系列文档路径；章节地址为阅读页路径 `/<slug>/<章节号>`，
//! 其中 `slug` 为系列文件名去掉 `.json` 的部分。

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use super::{HttpSession, SearchQuery, Source, ensure_success, make_lenient_client};
use crate::de::{SeriesDto, SiteConfig};
use crate::decode::{
    ChapterImages, decode_image_list, decode_imgchest_pages, decode_reader_chapter_url,
    decode_series_catalog,
};
use crate::patch::{HttpResponse, patch_series_response};
use crate::{Chapter, Manga, MangaPage, Page};

/// 站点根地址
pub const BASE_URL: &str = "https://lesporoiniens.org";
/// 系列文档目录
const SERIES_DIR: &str = "/data/series/";

/// Les Poroiniens 站点
#[derive(Debug, Clone)]
pub struct LesPoroiniens {
    session: HttpSession,
}

/// [`LesPoroiniens`] 的构建器
#[derive(Debug, Clone, Default)]
pub struct LesPoroiniensBuilder {
    base_url: Option<String>,
    client: Option<reqwest::Client>,
}

impl LesPoroiniensBuilder {
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
    pub fn build(self) -> Result<LesPoroiniens> {
        let base_url = Url::parse(self.base_url.as_deref().unwrap_or(BASE_URL))?;
        let client = match self.client {
            Some(client) => client,
            None => make_lenient_client()?,
        };
        Ok(LesPoroiniens {
            session: HttpSession::new(client, base_url)?,
        })
    }
}

/// 由系列文档路径得到阅读页使用的 slug。
#[must_use]
pub fn series_slug(series_url: &str) -> &str {
    let file = series_url.rsplit('/').next().unwrap_or(series_url);
    file.strip_suffix(".json").unwrap_or(file)
}

impl LesPoroiniens {
    /// 创建构建器。
    #[must_use]
    pub fn builder() -> LesPoroiniensBuilder {
        LesPoroiniensBuilder::default()
    }

    /// 以默认配置创建站点。
    ///
    /// # 错误
    ///
    /// 默认客户端创建失败时返回错误。
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// 经过响应改写的 GET。
    async fn get_patched(&self, url: Url) -> Result<HttpResponse> {
        let response = self.session.get(url).await?;
        ensure_success(patch_series_response(response))
    }

    /// 读取并解析一个系列文档。
    async fn fetch_series(&self, path: &str) -> Result<SeriesDto> {
        let response = self.get_patched(self.session.url(path)?).await?;
        serde_json::from_str(&response.body)
            .map_err(|e| anyhow!("When parsing series document {path}: {e}"))
    }

    /// 读取站点配置中的系列文件名，逐个获取系列文档。
    ///
    /// 单个系列获取失败时跳过该系列。
    async fn fetch_all_series(&self) -> Result<Vec<(String, SeriesDto)>> {
        let response = ensure_success(self.session.get(self.session.url("/data/config.json")?).await?)?;
        let config: SiteConfig = serde_json::from_str(&response.body)
            .map_err(|e| anyhow!("When parsing site config: {e}"))?;

        let mut series = Vec::with_capacity(config.local_series_files.len());
        for file in &config.local_series_files {
            let path = format!("{SERIES_DIR}{file}");
            match self.fetch_series(&path).await {
                Ok(dto) => series.push((path, dto)),
                Err(e) => warn!(file = %file, "skipping series: {e}"),
            }
        }
        Ok(series)
    }

    async fn catalog(&self, query: Option<&str>) -> Result<MangaPage> {
        let series = self.fetch_all_series().await?;
        Ok(decode_series_catalog(series, query))
    }
}

#[async_trait]
impl Source for LesPoroiniens {
    fn name(&self) -> &str {
        "Les Poroiniens"
    }

    fn base_url(&self) -> &Url {
        self.session.base_url()
    }

    async fn popular(&self, _page: u32) -> Result<MangaPage> {
        self.catalog(None).await
    }

    async fn latest(&self, _page: u32) -> Result<MangaPage> {
        self.catalog(None).await
    }

    async fn search(&self, _page: u32, query: &SearchQuery) -> Result<MangaPage> {
        self.catalog(query.keyword()).await
    }

    async fn manga_details(&self, manga: &Manga) -> Result<Manga> {
        let series = self.fetch_series(&manga.url).await?;
        Ok(series.to_manga(&manga.url))
    }

    async fn chapter_list(&self, manga: &Manga) -> Result<Vec<Chapter>> {
        let series = self.fetch_series(&manga.url).await?;
        Ok(series.to_chapters(series_slug(&manga.url)))
    }

    async fn page_list(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        let reader = self.get_patched(self.session.url(&chapter.url)?).await?;
        let chapter_number = reader
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        let chapter_url = decode_reader_chapter_url(&reader.body, &chapter_number)?;

        match ChapterImages::from_chapter_url(&chapter_url) {
            ChapterImages::Imgchest { id } => {
                let mut url = self.session.url("/api/imgchest-chapter-pages")?;
                url.query_pairs_mut().append_pair("id", &id);
                debug!(%url, "fetching imgchest pages");
                let response = ensure_success(self.session.get(url).await?)?;
                decode_imgchest_pages(&response.body)
            }
            ChapterImages::Json { path } => {
                let response = ensure_success(self.session.get(self.session.url(&path)?).await?)?;
                decode_image_list(&response.body)
            }
        }
    }
}
