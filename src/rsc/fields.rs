//! 宽松的字段提取
//!
//! 每个提取器都是对一段文本（通常是 [`super::scope`] 圈定的范围）的一次正则匹配，
//! 不做 schema 校验：字段名区分大小写，首个匹配获胜，数组匹配到第一个 `]` 为止。
//! 任何形状不符的输入都只会导致“无匹配”，不会报错。

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

static FIELD_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""title"\s*:\s*"([^"]+)""#).expect("FIELD_TITLE regex"));
static FIELD_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""description"\s*:\s*"([^"]+)""#).expect("FIELD_DESCRIPTION regex")
});
static FIELD_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""status"\s*:\s*"([^"]+)""#).expect("FIELD_STATUS regex"));
static FIELD_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""type"\s*:\s*"([^"]+)""#).expect("FIELD_TYPE regex"));
static FIELD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""id"\s*:\s*"([^"]+)""#).expect("FIELD_ID regex"));
static FIELD_PUBLISH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""publishDate":"(.*?)""#).expect("FIELD_PUBLISH_DATE regex")
});
static S3_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""link"\s*:\s*"s3:([^"]+)""#).expect("S3_LINK regex"));

static FIELD_GENRES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""genres":\[(.*?)\]"#).expect("FIELD_GENRES regex"));
static FIELD_AUTHORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""authors":\[(.*?)\]"#).expect("FIELD_AUTHORS regex"));
static FIELD_ARTISTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""artists":\[(.*?)\]"#).expect("FIELD_ARTISTS regex"));
static FIELD_TEAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""teams":\[(.*?)\]"#).expect("FIELD_TEAMS regex"));
static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""name":"(.*?)""#).expect("NAME regex"));

/// 章节四元组：id、orderId、publishDate（截到秒）、mangaId，字段之间允许任意间隔。
static CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""id"\s*:\s*"([0-9a-f-]{36})".*?"orderId"\s*:\s*(\d+).*?"publishDate"\s*:\s*"[^"]*?(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})[^"]*".*?"mangaId"\s*:\s*"([0-9a-f-]{36})""#,
    )
    .expect("CHAPTER regex")
});

/// 图片二元组：link 与其后的 orderId。
static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""link"\s*:\s*"([^"]+)".*?"orderId"\s*:\s*(\d+)"#).expect("IMAGE regex")
});

/// 从章节数组中匹配到的候选章节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterTuple<'a> {
    /// 章节 id（36 位带连字符的十六进制）
    pub id: &'a str,
    /// 序号
    pub order_id: u32,
    /// 发布时间前缀，形如 `2024-05-01T12:30:00`
    pub publish_date: &'a str,
    /// 所属作品的内部 id
    pub manga_id: &'a str,
}

/// 从图片数组中匹配到的候选页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTuple<'a> {
    /// 原始链接（直链或 `s3:` 键）
    pub link: &'a str,
    /// 页序；无法解析为整数时为 `None`
    pub order: Option<usize>,
}

fn first_capture<'a>(regex: &Regex, text: &'a str) -> Option<&'a str> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn named_items<'a>(regex: &Regex, text: &'a str) -> Vec<&'a str> {
    let Some(inner) = first_capture(regex, text) else {
        return Vec::new();
    };
    NAME.captures_iter(inner)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// 第一个 `"title":"…"`
#[must_use]
pub fn extract_title(text: &str) -> Option<&str> {
    first_capture(&FIELD_TITLE, text)
}

/// 第一个 `"description":"…"`，可能是尚未解析的引用
#[must_use]
pub fn extract_description(text: &str) -> Option<&str> {
    first_capture(&FIELD_DESCRIPTION, text)
}

/// 第一个 `"status":"…"`
#[must_use]
pub fn extract_status(text: &str) -> Option<&str> {
    first_capture(&FIELD_STATUS, text)
}

/// 第一个 `"type":"…"`
#[must_use]
pub fn extract_type(text: &str) -> Option<&str> {
    first_capture(&FIELD_TYPE, text)
}

/// 第一个 `"id":"…"`，在作品范围内即为作品的内部 id
#[must_use]
pub fn extract_id(text: &str) -> Option<&str> {
    first_capture(&FIELD_ID, text)
}

/// 第一个 `"publishDate":"…"`，可能是 `$D` 引用
#[must_use]
pub fn extract_publish_date(text: &str) -> Option<&str> {
    first_capture(&FIELD_PUBLISH_DATE, text)
}

/// 第一个 `"link":"s3:…"` 中的存储键
#[must_use]
pub fn extract_s3_link(text: &str) -> Option<&str> {
    first_capture(&S3_LINK, text)
}

/// `"genres":[…]` 中所有 `name`
#[must_use]
pub fn extract_genres(text: &str) -> Vec<&str> {
    named_items(&FIELD_GENRES, text)
}

/// `"authors":[…]` 中所有 `name`
#[must_use]
pub fn extract_authors(text: &str) -> Vec<&str> {
    named_items(&FIELD_AUTHORS, text)
}

/// `"artists":[…]` 中所有 `name`
#[must_use]
pub fn extract_artists(text: &str) -> Vec<&str> {
    named_items(&FIELD_ARTISTS, text)
}

/// `"teams":[…]` 中所有 `name`
#[must_use]
pub fn extract_teams(text: &str) -> Vec<&str> {
    named_items(&FIELD_TEAMS, text)
}

/// 按出现顺序匹配所有章节四元组。
///
/// 序号超出 `u32` 的匹配被跳过；去重与按作品过滤由调用方完成。
#[must_use]
pub fn extract_chapter_tuples(text: &str) -> Vec<ChapterTuple<'_>> {
    CHAPTER
        .captures_iter(text)
        .filter_map(|caps| {
            Some(ChapterTuple {
                id: caps.get(1)?.as_str(),
                order_id: caps.get(2)?.as_str().parse().ok()?,
                publish_date: caps.get(3)?.as_str(),
                manga_id: caps.get(4)?.as_str(),
            })
        })
        .collect()
}

/// 按出现顺序匹配所有图片二元组。
#[must_use]
pub fn extract_image_tuples(text: &str) -> Vec<ImageTuple<'_>> {
    IMAGE
        .captures_iter(text)
        .filter_map(|caps| {
            Some(ImageTuple {
                link: caps.get(1)?.as_str(),
                order: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANGA: &str = r#"{"id":"0b6c3a52-1f7e-4a7e-9d55-3c1d2e8f9a10","title":"Solo Leveling","description":"$1c","urlId":"solo-leveling","status":"ON_GOING","type":"Manhwa","publishDate":"$D2018-03-04T00:00:00.000Z","genres":[{"id":"g1","name":"Action"},{"id":"g2","name":"Fantasy"}],"authors":[{"name":"Chugong"}],"artists":[],"teams":[{"name":"Astral"},{"name":"Invités"}],"cover":{"image":{"link":"s3:covers/solo.webp"}}}"#;

    /// 测试标量字段取首个匹配
    #[test]
    fn test_scalar_fields() {
        assert_eq!(extract_title(MANGA), Some("Solo Leveling"));
        assert_eq!(extract_description(MANGA), Some("$1c"));
        assert_eq!(extract_status(MANGA), Some("ON_GOING"));
        assert_eq!(extract_type(MANGA), Some("Manhwa"));
        assert_eq!(
            extract_id(MANGA),
            Some("0b6c3a52-1f7e-4a7e-9d55-3c1d2e8f9a10")
        );
        assert_eq!(
            extract_publish_date(MANGA),
            Some("$D2018-03-04T00:00:00.000Z")
        );
        assert_eq!(extract_s3_link(MANGA), Some("covers/solo.webp"));
    }

    /// 测试标量字段允许冒号两侧空白，且空值不匹配
    #[test]
    fn test_scalar_field_shapes() {
        assert_eq!(extract_title(r#""title" : "A""#), Some("A"));
        assert_eq!(extract_title(r#""title":"","title":"B""#), Some("B"));
        assert_eq!(extract_title(r#""Title":"A""#), None);
    }

    /// 测试命名数组按顺序提取且不去重
    #[test]
    fn test_named_item_arrays() {
        assert_eq!(extract_genres(MANGA), vec!["Action", "Fantasy"]);
        assert_eq!(extract_authors(MANGA), vec!["Chugong"]);
        assert!(extract_artists(MANGA).is_empty());
        assert_eq!(extract_teams(MANGA), vec!["Astral", "Invités"]);
        assert_eq!(
            extract_genres(r#""genres":[{"name":"A"},{"name":"A"}]"#),
            vec!["A", "A"]
        );
        assert!(extract_genres(r#""tags":[{"name":"A"}]"#).is_empty());
    }

    /// 测试章节四元组跨越任意中间字段
    #[test]
    fn test_chapter_tuples() {
        let text = r#""chapters":[{"id":"11111111-1111-1111-1111-111111111111","title":null,"orderId":2,"views":10,"publishDate":"$D2024-05-01T12:30:00.000Z","mangaId":"aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa"},{"id":"22222222-2222-2222-2222-222222222222","orderId":1,"publishDate":"2024-04-01T08:00:00Z","mangaId":"bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb"}"#;
        let tuples = extract_chapter_tuples(text);
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].id, "11111111-1111-1111-1111-111111111111");
        assert_eq!(tuples[0].order_id, 2);
        assert_eq!(tuples[0].publish_date, "2024-05-01T12:30:00");
        assert_eq!(tuples[0].manga_id, "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa");
        assert_eq!(tuples[1].order_id, 1);
        assert_eq!(tuples[1].manga_id, "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb");
    }

    /// 测试图片二元组及无法解析的页序
    #[test]
    fn test_image_tuples() {
        let text = r#""images":[{"link":"s3:pages/3.webp","orderId":3},{"link":"https://cdn/1.webp","w":800,"orderId":1},{"link":"s3:pages/x.webp","orderId":99999999999999999999999}"#;
        let tuples = extract_image_tuples(text);
        assert_eq!(tuples.len(), 3);
        assert_eq!(
            tuples[0],
            ImageTuple {
                link: "s3:pages/3.webp",
                order: Some(3)
            }
        );
        assert_eq!(tuples[1].link, "https://cdn/1.webp");
        assert_eq!(tuples[1].order, Some(1));
        assert_eq!(tuples[2].order, None);
    }
}
