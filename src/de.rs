//! 反序列化实现模块
//!
//! 集中存放各 JSON 接口的原始形状（目录列表、预签名、系列文档、阅读器数据、imgchest 页面），
//! 以及它们到库内实体类型的转换，保持 `lib.rs` 仅包含实体定义。

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::{Chapter, ImageLink, Manga, MangaStatus};

/// 将空字符串反序列化为 `None` 的通用辅助函数。
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.trim().is_empty()))
}

/// 目录接口 `/api/mangas` 的响应
#[derive(Debug, Clone, Deserialize)]
pub struct MangaResponse {
    /// 本页作品
    pub mangas: Vec<MangaDto>,
    /// 符合条件的作品总数
    pub total: usize,
}

/// 目录接口中的单个作品
#[derive(Debug, Clone, Deserialize)]
pub struct MangaDto {
    /// 内部 id
    pub id: String,
    /// 标题
    pub title: String,
    /// 简介
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub description: Option<String>,
    /// 站点分配的路径标识
    #[serde(rename = "urlId")]
    pub url_id: String,
    /// 封面
    #[serde(default)]
    pub cover: Option<CoverDto>,
    /// 连载状态，如 `ON_GOING`
    #[serde(default)]
    pub status: Option<String>,
    /// 作品类型
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

/// 封面包装
#[derive(Debug, Clone, Deserialize)]
pub struct CoverDto {
    /// 封面图片
    #[serde(default)]
    pub image: Option<ImageDto>,
}

/// 图片链接
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDto {
    /// 直链或 `s3:` 键
    pub link: String,
}

impl MangaDto {
    /// 封面链接；直链可直接使用，`s3:` 键需要预签名。
    #[must_use]
    pub fn cover_link(&self) -> Option<ImageLink> {
        self.cover
            .as_ref()
            .and_then(|cover| cover.image.as_ref())
            .map(|image| ImageLink::parse(&image.link))
    }
}

impl From<MangaDto> for Manga {
    /// 转换为目录条目；封面仅在为直链时填充。
    fn from(dto: MangaDto) -> Self {
        let cover_url = match dto.cover_link() {
            Some(ImageLink::Direct(link)) => Some(link),
            _ => None,
        };
        Self {
            url: format!("/manga/{}", dto.url_id),
            title: dto.title,
            description: dto.description,
            cover_url,
            status: dto
                .status
                .as_deref()
                .map_or(MangaStatus::Unknown, MangaStatus::from_api),
            content_type: dto.content_type,
            ..Self::default()
        }
    }
}

/// 预签名接口 `/api/s3/presign-get` 的响应
#[derive(Debug, Clone, Deserialize)]
pub struct PresignResponse {
    /// 临时直链
    pub url: String,
}

/// 站点配置 `/data/config.json` 中本库关心的部分
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteConfig {
    /// 系列文档文件名列表
    #[serde(rename = "LOCAL_SERIES_FILES", default)]
    pub local_series_files: Vec<String>,
}

/// 系列文档 `/data/series/<file>.json`（经过响应改写后的形状）
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesDto {
    /// 标题
    pub title: String,
    /// 简介
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub description: Option<String>,
    /// 画师
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub artist: Option<String>,
    /// 作者
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub author: Option<String>,
    /// 普通封面
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub cover: Option<String>,
    /// 低清封面
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub cover_low: Option<String>,
    /// 高清封面
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub cover_hq: Option<String>,
    /// 标签
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// 连载状态（法语自由文本）
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub release_status: Option<String>,
    /// 别名
    #[serde(default)]
    pub alternative_titles: Option<Vec<String>>,
    /// 章节映射，键为章节号
    #[serde(default)]
    pub chapters: Option<Map<String, Value>>,
}

/// 系列文档中的单个章节
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterDto {
    /// 章节标题
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub title: Option<String>,
    /// 卷号（数字或字符串）
    #[serde(default)]
    pub volume: Option<Value>,
    /// 最后更新时间（Unix 秒，数字或字符串）
    #[serde(default)]
    pub last_updated: Option<Value>,
    /// 发布组到章节地址的映射
    #[serde(default)]
    pub groups: Map<String, Value>,
}

impl ChapterDto {
    /// 卷号文本；缺失、为空或不是数字/字符串时为 `None`。
    #[must_use]
    pub fn volume_label(&self) -> Option<String> {
        match self.volume.as_ref()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// 解析 `last_updated`；无法识别时为 `None`。
    #[must_use]
    pub fn upload_timestamp(&self) -> Option<i64> {
        match self.last_updated.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// 将 `release_status` 的法语文本映射为 [`MangaStatus`]。
fn release_status(value: &str) -> MangaStatus {
    let lower = value.to_lowercase();
    if lower.contains("cours") {
        MangaStatus::Ongoing
    } else if lower.contains("fini") || lower.contains("termin") {
        MangaStatus::Completed
    } else if lower.contains("abandon") || lower.contains("annul") {
        MangaStatus::Cancelled
    } else if lower.contains("pause") {
        MangaStatus::OnHiatus
    } else {
        MangaStatus::Unknown
    }
}

impl SeriesDto {
    /// 简介；有别名时在末尾追加 `Titres alternatifs : …` 一行。
    fn full_description(&self) -> Option<String> {
        let alternatives = self
            .alternative_titles
            .iter()
            .flatten()
            .map(String::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if alternatives.is_empty() {
            return self.description.clone();
        }
        let line = format!("Titres alternatifs : {alternatives}");
        Some(match &self.description {
            Some(description) => format!("{description}\n\n{line}"),
            None => line,
        })
    }

    /// 以给定路径生成作品详情。
    ///
    /// 封面依次取 `cover_hq`、`cover`、`cover_low`；作者与画师为单值列表。
    #[must_use]
    pub fn to_manga(&self, url: &str) -> Manga {
        Manga {
            url: url.to_string(),
            title: self.title.clone(),
            description: self.full_description(),
            cover_url: self
                .cover_hq
                .clone()
                .or_else(|| self.cover.clone())
                .or_else(|| self.cover_low.clone()),
            status: self
                .release_status
                .as_deref()
                .map_or(MangaStatus::Unknown, release_status),
            genres: self.tags.clone().unwrap_or_default(),
            authors: self.author.iter().cloned().collect(),
            artists: self.artist.iter().cloned().collect(),
            ..Manga::default()
        }
    }

    /// 生成章节列表，按章节号从新到旧排列。
    ///
    /// 无法解析为章节形状的条目被跳过；章节地址为 `/<slug>/<key>`。
    /// 名称形如 `Vol. 2 Chapitre 12 - <标题>`，卷号与标题均可缺省。
    #[must_use]
    pub fn to_chapters(&self, slug: &str) -> Vec<Chapter> {
        let Some(chapters) = &self.chapters else {
            return Vec::new();
        };
        let mut out: Vec<Chapter> = chapters
            .iter()
            .filter_map(|(key, value)| {
                let dto: ChapterDto = serde_json::from_value(value.clone()).ok()?;
                let mut name = match dto.volume_label() {
                    Some(volume) => format!("Vol. {volume} Chapitre {key}"),
                    None => format!("Chapitre {key}"),
                };
                if let Some(title) = &dto.title {
                    name.push_str(" - ");
                    name.push_str(title);
                }
                Some(Chapter {
                    url: format!("/{slug}/{key}"),
                    name,
                    chapter_number: key.parse().unwrap_or(-1.0),
                    date_upload: dto.upload_timestamp(),
                    scanlator: dto.groups.keys().next().cloned(),
                })
            })
            .collect();
        out.sort_by(|a, b| b.chapter_number.total_cmp(&a.chapter_number));
        out
    }
}

/// `#reader-data-placeholder` 中的阅读器数据
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderData {
    /// 当前系列
    pub series: ReaderSeries,
}

/// 阅读器数据中的系列部分
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderSeries {
    /// 章节：数组（按 1 起始序号）或以章节号为键的对象
    pub chapters: Value,
}

impl ReaderSeries {
    /// 查找章节号对应的章节数据。
    ///
    /// 数组形式按 `章节号 - 1` 取下标（章节号无法解析时取第一个）；对象形式按键查找。
    #[must_use]
    pub fn chapter(&self, chapter_number: &str) -> Option<ChapterDto> {
        let value = match &self.chapters {
            Value::Array(items) => {
                let index = chapter_number.parse::<usize>().unwrap_or(1).checked_sub(1)?;
                items.get(index)?
            }
            Value::Object(map) => map.get(chapter_number)?,
            _ => return None,
        };
        serde_json::from_value(value.clone()).ok()
    }
}

/// imgchest 页面接口中的单页
#[derive(Debug, Clone, Deserialize)]
pub struct ImgchestPage {
    /// 图片直链
    pub link: String,
}
