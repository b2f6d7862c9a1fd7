//! 基于响应正文的解码器
//!
//! 所有函数都只接收响应正文（及必要的地址），不做任何 I/O：
//! 需要预签名的图片以 [`ImageLink::S3`] / [`MangaDraft::cover_key`] 的形式交还给调用方，
//! 由站点实现完成网络调用后再用 [`assemble_pages`] / [`MangaDraft::finish`] 收尾。
//!
//! `scraper::Html` 只在各函数内部短暂存在，不会跨越 `.await`。
//!
//! # 示例
//!
//! ```rust
//! # use scan_sources::decode::decode_chapters;
//! let html = r#"<script>self.__next_f.push([1,"\"chapters\":[{\"id\":\"11111111-1111-1111-1111-111111111111\",\"orderId\":3,\"publishDate\":\"2024-05-01T12:30:00.000Z\",\"mangaId\":\"aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa\"}],\"x\":1"])</script>"#;
//! let chapters = decode_chapters(html, "https://astral-manga.fr/manga/solo");
//! assert_eq!(chapters.len(), 1);
//! assert_eq!(chapters[0].name, "Chapitre 3");
//! ```
#![cfg(feature = "scraper")]

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::{Position, Url};

use crate::de::{ImgchestPage, MangaResponse, ReaderData, SeriesDto};
use crate::patch::SENTINEL_TITLE;
use crate::rsc::scope::{CHAPTERS_MARKER, IMAGES_MARKER, find_array_scope, find_manga_scope};
use crate::rsc::{extract_rsc_data, fields, normalize_rsc_data, resolve_rsc_reference};
use crate::{Chapter, ImageLink, Manga, MangaPage, MangaStatus, Page};

/// 目录每页条目数
pub const PAGE_SIZE: usize = 12;
/// 章节发布者
pub const ASTRAL_SCANLATOR: &str = "Astral Manga";
/// 章节发布时间格式（按 UTC 解释）
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[allow(clippy::expect_used)]
static PAGE_ALT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Page \d+").expect("PAGE_ALT regex"));

/// 从作品地址中取出路径标识：`/manga/` 之后、下一个 `/` 或 `?` 之前的部分。
///
/// 地址中没有 `/manga/` 时按整个字符串处理。
#[must_use]
pub fn manga_url_id(url: &str) -> &str {
    let after = url.split_once("/manga/").map_or(url, |(_, rest)| rest);
    let end = after.find(['/', '?']).unwrap_or(after.len());
    after.get(..end).unwrap_or(after)
}

/// 读取文档并取出规范化后的 RSC 数据；没有推送脚本时为 `None`。
fn normalized_blob(body: &str) -> Option<String> {
    let raw = extract_rsc_data(&Html::parse_document(body));
    if raw.is_empty() {
        debug!("no RSC push scripts in document");
        return None;
    }
    Some(normalize_rsc_data(&raw))
}

fn parse_upload_date(text: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(|date| date.and_utc().timestamp())
}

/// 从作品页解码章节列表。
///
/// 章节数组中的记录按出现顺序保留；已知作品内部 id 时丢弃属于其他作品的记录，
/// 重复的章节 id 只保留第一次出现。没有 RSC 数据或章节数组时返回空列表，
/// 由调用方决定是否重试。
///
/// # 参数
///
/// - `body`：作品页 HTML；
/// - `manga_url`：作品地址（绝对或相对均可），用于取路径标识。
#[must_use]
pub fn decode_chapters(body: &str, manga_url: &str) -> Vec<Chapter> {
    let Some(normalized) = normalized_blob(body) else {
        return Vec::new();
    };
    let Some(chapters_scope) = find_array_scope(&normalized, CHAPTERS_MARKER) else {
        debug!("no chapters array in RSC data");
        return Vec::new();
    };

    let url_id = manga_url_id(manga_url);
    let internal_id = find_manga_scope(&normalized, url_id)
        .and_then(|scope| fields::extract_id(scope.slice(&normalized)));

    let mut seen = HashSet::new();
    fields::extract_chapter_tuples(chapters_scope.slice(&normalized))
        .into_iter()
        .filter(|tuple| internal_id.is_none_or(|id| id == tuple.manga_id))
        .filter(|tuple| seen.insert(tuple.id))
        .map(|tuple| Chapter {
            url: format!("/manga/{url_id}/chapter/{}", tuple.id),
            name: format!("Chapitre {}", tuple.order_id),
            chapter_number: tuple.order_id as f32,
            date_upload: parse_upload_date(tuple.publish_date),
            scanlator: Some(ASTRAL_SCANLATOR.to_string()),
        })
        .collect()
}

/// 章节页中的页面候选
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCandidates {
    /// RSC 图片数组中的 `(页序, 链接)`，按出现顺序
    pub links: Vec<(Option<usize>, ImageLink)>,
    /// HTML 回退结果：`alt` 为 `Page <n>` 的图片，按文档顺序编号
    pub fallback: Vec<Page>,
}

/// 从章节页收集页面候选。
///
/// # 参数
///
/// - `body`：章节页 HTML；
/// - `page_url`：章节页地址，用于把相对 `src` 解析为绝对地址。
#[must_use]
pub fn decode_page_candidates(body: &str, page_url: &Url) -> PageCandidates {
    let document = Html::parse_document(body);
    let raw = extract_rsc_data(&document);

    let mut links = Vec::new();
    if raw.is_empty() {
        debug!("no RSC push scripts in chapter page");
    } else {
        let normalized = normalize_rsc_data(&raw);
        if let Some(scope) = find_array_scope(&normalized, IMAGES_MARKER) {
            links = fields::extract_image_tuples(scope.slice(&normalized))
                .into_iter()
                .map(|tuple| (tuple.order, ImageLink::parse(tuple.link)))
                .collect();
        }
    }

    let fallback = Selector::parse("img[alt]")
        .map(|selector| {
            document
                .select(&selector)
                .filter(|img| img.value().attr("alt").is_some_and(|alt| PAGE_ALT.is_match(alt)))
                .filter_map(|img| absolute_attr(&img, "src", page_url))
                .enumerate()
                .map(|(index, image_url)| Page { index, image_url })
                .collect()
        })
        .unwrap_or_default();

    PageCandidates { links, fallback }
}

/// 把已解析（或解析失败）的页面候选组装为最终页面列表。
///
/// - 链接为 `None` 或空串的候选被丢弃；
/// - 页序缺失时使用当前已收集的页数；
/// - 按页序稳定排序后重新编号为 `0..n`，页序重复或不连续都不会影响结果；
/// - 结果为空时返回 `fallback`。
#[must_use]
pub fn assemble_pages<I>(resolved: I, fallback: Vec<Page>) -> Vec<Page>
where
    I: IntoIterator<Item = (Option<usize>, Option<String>)>,
{
    let mut ordered: Vec<(usize, String)> = Vec::new();
    for (order, image_url) in resolved {
        let Some(image_url) = image_url.filter(|u| !u.is_empty()) else {
            continue;
        };
        let order = order.unwrap_or(ordered.len());
        ordered.push((order, image_url));
    }
    if ordered.is_empty() {
        debug!(fallback = fallback.len(), "using HTML page fallback");
        return fallback;
    }
    ordered.sort_by_key(|(order, _)| *order);
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, (_, image_url))| Page { index, image_url })
        .collect()
}

/// 尚未完成封面预签名的作品
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MangaDraft {
    /// 已提取的字段
    pub manga: Manga,
    /// 需要预签名的封面存储键
    pub cover_key: Option<String>,
}

impl MangaDraft {
    /// 填入预签名结果（若有）并返回作品。
    #[must_use]
    pub fn finish(mut self, presigned_cover: Option<String>) -> Manga {
        if presigned_cover.is_some() {
            self.manga.cover_url = presigned_cover;
        }
        self.manga
    }
}

fn select_first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    Some(text)
}

fn absolute_attr(element: &ElementRef<'_>, attr: &str, base: &Url) -> Option<String> {
    let value = element.value().attr(attr)?.trim();
    if value.is_empty() {
        return None;
    }
    Some(base.join(value).map_or_else(|_| value.to_string(), String::from))
}

fn owned(values: Vec<&str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

/// 从作品页解码详情。
///
/// 每个字段优先取 RSC 作品范围内的值，取不到时回退到页面 HTML：
/// 标题 `main h1`、简介 `main p`、封面 `main img[alt*=cover]`、
/// 状态 `main` 文本、题材 `a[href*="/catalog?tags="]`，
/// 作者/画师/组/年份取 `main div.border` 信息框（`h3` 为标签、`h2` 为值）。
///
/// # 参数
///
/// - `body`：作品页 HTML；
/// - `page_url`：作品页地址，作品路径取其路径与查询部分。
#[must_use]
pub fn decode_manga_details(body: &str, page_url: &Url) -> MangaDraft {
    let document = Html::parse_document(body);
    let raw = extract_rsc_data(&document);
    let normalized = normalize_rsc_data(&raw);

    let url = &page_url[Position::BeforePath..];
    let url_id = manga_url_id(url);
    let scope = match find_manga_scope(&normalized, url_id).filter(|range| !range.is_empty()) {
        Some(range) => {
            debug!(url_id, window = range.len(), "manga record scoped");
            Some(range.slice(&normalized))
        }
        None => {
            debug!(url_id, "manga record not found in RSC data, using HTML");
            None
        }
    };

    let title = scope
        .and_then(fields::extract_title)
        .map(str::to_string)
        .or_else(|| select_first_text(&document, "main h1"))
        .unwrap_or_else(|| "Unknown".to_string());

    let description = resolve_rsc_reference(&normalized, scope.and_then(fields::extract_description))
        .or_else(|| select_first_text(&document, "main p"));

    let cover_key = scope.and_then(fields::extract_s3_link).map(str::to_string);
    let cover_url = if cover_key.is_some() {
        None
    } else {
        Selector::parse("main img[alt*=cover]").ok().and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|img| absolute_attr(&img, "src", page_url))
        })
    };

    let status = match scope.and_then(fields::extract_status).map(MangaStatus::from_api) {
        Some(status) if status != MangaStatus::Unknown => status,
        _ => MangaStatus::from_page_text(&select_first_text(&document, "main").unwrap_or_default()),
    };

    let content_type = scope.and_then(fields::extract_type).map(str::to_string);

    let mut genres = owned(scope.map(fields::extract_genres).unwrap_or_default());
    if genres.is_empty()
        && let Ok(selector) = Selector::parse(r#"a[href*="/catalog?tags="]"#)
    {
        genres = document
            .select(&selector)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .collect();
    }

    let mut authors = owned(scope.map(fields::extract_authors).unwrap_or_default());
    let mut artists = owned(scope.map(fields::extract_artists).unwrap_or_default());
    if artists.is_empty() {
        artists.clone_from(&authors);
    }
    let mut teams = owned(scope.map(fields::extract_teams).unwrap_or_default());
    let mut year = resolve_rsc_reference(&normalized, scope.and_then(fields::extract_publish_date))
        .map(|date| date.split('-').next().unwrap_or_default().to_string());

    let mut html_teams = Vec::new();
    let mut html_year = None;
    if let (Ok(boxes), Ok(label_sel), Ok(value_sel)) = (
        Selector::parse("main div.border"),
        Selector::parse("h3"),
        Selector::parse("h2"),
    ) {
        for info_box in document.select(&boxes) {
            let Some(label) = info_box.select(&label_sel).next() else {
                continue;
            };
            let Some(value) = info_box.select(&value_sel).next() else {
                continue;
            };
            let label = label.text().collect::<String>().trim().to_lowercase();
            let value = value.text().collect::<String>().trim().to_string();
            if label.contains("auteur") {
                if authors.is_empty() {
                    authors = vec![value];
                }
            } else if label.contains("artiste") || label.contains("studio") {
                if artists.is_empty() {
                    artists = vec![value];
                }
            } else if label.contains("team") {
                html_teams = vec![value];
            } else if label.contains("année") {
                html_year = Some(value);
            }
        }
    }
    if teams.is_empty() {
        teams = html_teams;
    }
    if year.is_none() {
        year = html_year;
    }

    MangaDraft {
        manga: Manga {
            url: url.to_string(),
            title,
            description,
            cover_url,
            status,
            content_type,
            genres,
            authors,
            artists,
            teams,
            year,
        },
        cover_key,
    }
}

/// 解码目录接口的响应。
///
/// 返回每个条目的草稿（`s3:` 封面留待预签名）以及是否还有下一页：
/// 本页满 [`PAGE_SIZE`] 条且条目数小于总数。
///
/// # 错误
///
/// 响应不是预期的 JSON 形状时返回错误。
pub fn decode_catalog(body: &str) -> Result<(Vec<MangaDraft>, bool)> {
    let response: MangaResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("When parsing catalog response: {e}"))?;
    let count = response.mangas.len();
    let has_next_page = count >= PAGE_SIZE && count < response.total;
    let drafts = response
        .mangas
        .into_iter()
        .map(|dto| {
            let cover_key = match dto.cover_link() {
                Some(ImageLink::S3(key)) => Some(key),
                _ => None,
            };
            MangaDraft {
                manga: Manga::from(dto),
                cover_key,
            }
        })
        .collect();
    Ok((drafts, has_next_page))
}

/// 由系列文档组装目录页。
///
/// 丢弃哨兵条目；给出非空 `query` 时只保留标题包含它（不区分大小写）的条目。
/// 系列目录只有一页。
#[must_use]
pub fn decode_series_catalog<I>(series: I, query: Option<&str>) -> MangaPage
where
    I: IntoIterator<Item = (String, SeriesDto)>,
{
    let needle = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let mangas = series
        .into_iter()
        .filter(|(_, dto)| dto.title != SENTINEL_TITLE)
        .filter(|(_, dto)| {
            needle
                .as_deref()
                .is_none_or(|needle| dto.title.to_lowercase().contains(needle))
        })
        .map(|(url, dto)| dto.to_manga(&url))
        .collect();
    MangaPage {
        mangas,
        has_next_page: false,
    }
}

/// 阅读器中章节图片的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterImages {
    /// imgchest 相册，需要请求 `/api/imgchest-chapter-pages?id=<id>`
    Imgchest {
        /// 相册 id（章节地址的最后一段）
        id: String,
    },
    /// 站内 JSON 图片列表的路径
    Json {
        /// 相对站点根的路径
        path: String,
    },
}

impl ChapterImages {
    /// 按章节地址判断图片来源。
    #[must_use]
    pub fn from_chapter_url(chapter_url: &str) -> Self {
        if chapter_url.contains("imgchest") {
            let id = chapter_url.rsplit('/').next().unwrap_or(chapter_url);
            Self::Imgchest { id: id.to_string() }
        } else {
            Self::Json {
                path: chapter_url.to_string(),
            }
        }
    }
}

/// 从阅读页 `#reader-data-placeholder` 中取出章节的图片地址。
///
/// # 参数
///
/// - `body`：阅读页 HTML；
/// - `chapter_number`：章节号（阅读页最终地址的最后一段）。
///
/// # 返回
///
/// 章节 `groups` 中第一个值，即图片列表地址。
///
/// # 错误
///
/// - 页面中没有阅读器数据或其不是合法 JSON；
/// - 找不到该章节（`Chapter data not found for chapter N`）；
/// - 章节没有可用的地址（`Chapter URL not found for chapter N`）。
pub fn decode_reader_chapter_url(body: &str, chapter_number: &str) -> Result<String> {
    let json = {
        let document = Html::parse_document(body);
        let selector = Selector::parse("#reader-data-placeholder")
            .map_err(|e| anyhow!("When building reader selector: {e}"))?;
        document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .ok_or_else(|| anyhow!("Reader data not found for chapter {chapter_number}"))?
    };
    let reader: ReaderData =
        serde_json::from_str(&json).map_err(|e| anyhow!("When parsing reader data: {e}"))?;
    let chapter = reader
        .series
        .chapter(chapter_number)
        .ok_or_else(|| anyhow!("Chapter data not found for chapter {chapter_number}"))?;
    chapter
        .groups
        .values()
        .next()
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Chapter URL not found for chapter {chapter_number}"))
}

/// 解码 imgchest 页面接口 `[{"link": …}, …]`，页序从 0 开始。
///
/// # 错误
///
/// 响应不是预期的 JSON 形状时返回错误。
pub fn decode_imgchest_pages(body: &str) -> Result<Vec<Page>> {
    let pages: Vec<ImgchestPage> =
        serde_json::from_str(body).map_err(|e| anyhow!("When parsing imgchest pages: {e}"))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(index, page)| Page {
            index,
            image_url: page.link,
        })
        .collect())
}

/// 解码图片地址数组 `["…", …]`，页序从 0 开始。
///
/// # 错误
///
/// 响应不是字符串数组时返回错误。
pub fn decode_image_list(body: &str) -> Result<Vec<Page>> {
    let images: Vec<String> =
        serde_json::from_str(body).map_err(|e| anyhow!("When parsing image list: {e}"))?;
    Ok(images
        .into_iter()
        .enumerate()
        .map(|(index, image_url)| Page { index, image_url })
        .collect())
}
