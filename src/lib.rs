//! 法语扫图站点的目录、元数据与图片地址提取库
//!
//! 目标站点（Next.js）把实体数据以 RSC flight 数据的形式塞在
//! `self.__next_f.push(...)` 内联脚本里，并不提供可直接寻址的结构化接口。
//! 本库用一组启发式的纯函数从这段半转义的文本中定位实体记录、
//! 提取字段、解析间接引用，并在启发式路径失败时回退到 HTML 抓取。
//!
//! - [`rsc`]：规范化、脚本定位、记录范围查找、字段提取、引用解析；
//! - [`decode`]：基于响应正文的章节/页面/详情/目录解码器（无 I/O）；
//! - [`patch`]：第二站点的响应改写（章节数组转为 1 起始映射、拒绝访问时的哨兵正文）；
//! - [`fetch`]：统一的 [`fetch::Source`] 能力接口及两个站点实现（`reqwest` 特性）。
//!
//! # 示例
//!
//! ```rust
//! use scan_sources::rsc::{normalize_rsc_data, RscReference};
//!
//! let blob = normalize_rsc_data(r#"0:[\"$7\"]\n7:T1a,Bonjour"#);
//! assert_eq!(RscReference::parse("$7").resolve(&blob).as_deref(), Some("Bonjour"));
//! ```

#![warn(missing_docs)]

pub mod de;
pub mod decode;
pub mod fetch;
pub mod patch;
pub mod rsc;

use serde::{Deserialize, Serialize};

/// 作品连载状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MangaStatus {
    /// 状态未知
    #[default]
    Unknown,
    /// 连载中
    Ongoing,
    /// 已完结
    Completed,
    /// 已腰斩
    Cancelled,
    /// 休刊中
    OnHiatus,
}

impl MangaStatus {
    /// 将站点 API 中的状态值（如 `ON_GOING`）映射为 [`MangaStatus`]，大小写不敏感。
    #[must_use]
    pub fn from_api(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "ON_GOING" | "ONGOING" => Self::Ongoing,
            "COMPLETED" => Self::Completed,
            "CANCELLED" => Self::Cancelled,
            "HIATUS" => Self::OnHiatus,
            _ => Self::Unknown,
        }
    }

    /// 从页面可见文本（法语标签）推断状态。
    #[must_use]
    pub fn from_page_text(text: &str) -> Self {
        if text.contains("En cours") {
            Self::Ongoing
        } else if text.contains("Terminé") {
            Self::Completed
        } else if text.contains("Annulé") {
            Self::Cancelled
        } else if text.contains("En pause") {
            Self::OnHiatus
        } else {
            Self::Unknown
        }
    }
}

/// 图片存储地址：直链，或需要预签名的 S3 键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageLink {
    /// 可直接访问的 URL
    Direct(String),
    /// `s3:` 前缀之后的存储键，需要经过预签名接口换取临时 URL
    S3(String),
}

impl ImageLink {
    /// 解析原始链接字符串；`s3:` 前缀视为间接键。
    #[must_use]
    pub fn parse(link: &str) -> Self {
        link.strip_prefix("s3:").map_or_else(
            || Self::Direct(link.to_string()),
            |key| Self::S3(key.to_string()),
        )
    }
}

/// 作品（目录条目与详情共用）
///
/// 目录接口只会填充 `url`、`title` 与 `cover_url`，其余字段由详情解码补全。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manga {
    /// 站内相对路径，如 `/manga/solo-leveling`
    pub url: String,
    /// 标题
    pub title: String,
    /// 简介
    pub description: Option<String>,
    /// 封面直链
    pub cover_url: Option<String>,
    /// 连载状态
    pub status: MangaStatus,
    /// 作品类型，如 "Manhwa"
    pub content_type: Option<String>,
    /// 题材标签
    pub genres: Vec<String>,
    /// 作者
    pub authors: Vec<String>,
    /// 画师
    pub artists: Vec<String>,
    /// 汉化/翻译组
    pub teams: Vec<String>,
    /// 首发年份
    pub year: Option<String>,
}

impl Manga {
    /// 以路径和标题创建一个仅含目录信息的作品。
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// 章节
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// 站内相对路径
    pub url: String,
    /// 显示名称，如 "Chapitre 12"
    pub name: String,
    /// 章节序号（同时用作排序键）
    pub chapter_number: f32,
    /// 发布时间（Unix 秒），无法解析时为 `None`
    pub date_upload: Option<i64>,
    /// 发布组
    pub scanlator: Option<String>,
}

/// 页面图片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 页序，从 0 开始
    pub index: usize,
    /// 图片直链
    pub image_url: String,
}

/// 目录的一页结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaPage {
    /// 本页作品
    pub mangas: Vec<Manga>,
    /// 是否还有下一页
    pub has_next_page: bool,
}

#[cfg(feature = "reqwest")]
pub use fetch::{SearchQuery, SortBy, Source, astral::AstralManga, poroiniens::LesPoroiniens};

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试 API 状态映射
    #[test]
    fn test_status_from_api() {
        assert_eq!(MangaStatus::from_api("ON_GOING"), MangaStatus::Ongoing);
        assert_eq!(MangaStatus::from_api("completed"), MangaStatus::Completed);
        assert_eq!(MangaStatus::from_api("CANCELLED"), MangaStatus::Cancelled);
        assert_eq!(MangaStatus::from_api("Hiatus"), MangaStatus::OnHiatus);
        assert_eq!(MangaStatus::from_api("DROPPED"), MangaStatus::Unknown);
    }

    /// 测试页面文本推断状态
    #[test]
    fn test_status_from_page_text() {
        assert_eq!(
            MangaStatus::from_page_text("Statut En cours Chapitres"),
            MangaStatus::Ongoing
        );
        assert_eq!(
            MangaStatus::from_page_text("Statut Terminé"),
            MangaStatus::Completed
        );
        assert_eq!(MangaStatus::from_page_text(""), MangaStatus::Unknown);
    }

    /// 测试图片链接解析
    #[test]
    fn test_image_link_parse() {
        assert_eq!(
            ImageLink::parse("s3:covers/abc.webp"),
            ImageLink::S3("covers/abc.webp".to_string())
        );
        assert_eq!(
            ImageLink::parse("https://cdn.example.com/a.webp"),
            ImageLink::Direct("https://cdn.example.com/a.webp".to_string())
        );
    }

    /// 测试目录作品的默认字段
    #[test]
    fn test_manga_new_defaults() {
        let manga = Manga::new("/manga/abc", "Titre");
        assert_eq!(manga.url, "/manga/abc");
        assert_eq!(manga.status, MangaStatus::Unknown);
        assert!(manga.genres.is_empty());
        assert!(manga.cover_url.is_none());
    }
}
