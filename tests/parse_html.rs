#![cfg(feature = "scraper")]
//! 页面解码的集成测试
//!
//! 夹具模拟真实页面：RSC 数据分散在多个推送脚本中，字段经过一层引号转义，
//! 多部作品的记录与章节混在同一段数据里。

use scan_sources::decode::{
    assemble_pages, decode_chapters, decode_manga_details, decode_page_candidates,
};
use scan_sources::rsc::{RscReference, extract_rsc_data, normalize_rsc_data};
use scan_sources::{ImageLink, MangaStatus};
use url::Url;

const SOLO_ID: &str = "0b6c3a52-1f7e-4a7e-9d55-3c1d2e8f9a10";
const TOWER_ID: &str = "9f1e2d3c-4b5a-4968-8776-655443322110";

/// 把 JSON 片段转义成推送脚本中的字符串字面量
fn push(payload: &str) -> String {
    let escaped = payload.replace('"', "\\\"").replace('/', "\\/");
    format!(r#"<script>self.__next_f.push([1,"{escaped}"])</script>"#)
}

fn manga_record(id: &str, url_id: &str, title: &str, description: &str, cover: &str) -> String {
    format!(
        r#"{{"id":"{id}","title":"{title}","description":"{description}","urlId":"{url_id}","status":"ON_GOING","type":"Manhwa","publishDate":"$D2018-03-04T00:00:00.000Z","genres":[{{"id":"g1","name":"Action"}},{{"id":"g2","name":"Fantasy"}}],"authors":[{{"name":"Chugong"}}],"artists":[{{"name":"DUBU"}}],"teams":[],"cover":{{"image":{{"link":"s3:{cover}"}}}}}}"#
    )
}

fn chapter_record(id: &str, order: u32, manga_id: &str) -> String {
    format!(
        r#"{{"id":"{id}","title":null,"orderId":{order},"views":120,"publishDate":"$D2024-06-{order:02}T08:15:00.000Z","createdAt":"$D2024-06-01T00:00:00.000Z","mangaId":"{manga_id}"}}"#
    )
}

fn manga_page() -> String {
    let tower = manga_record(TOWER_ID, "tower-of-god", "Tower of God", "Tour", "covers/tower.webp");
    let solo = manga_record(SOLO_ID, "solo-leveling", "Solo Leveling", "$2a", "covers/solo.webp");
    let chapters = [
        chapter_record("c0000000-0000-0000-0000-000000000003", 3, SOLO_ID),
        chapter_record("c0000000-0000-0000-0000-000000000002", 2, SOLO_ID),
        chapter_record("d0000000-0000-0000-0000-000000000001", 1, TOWER_ID),
        chapter_record("c0000000-0000-0000-0000-000000000001", 1, SOLO_ID),
        chapter_record("c0000000-0000-0000-0000-000000000002", 2, SOLO_ID),
    ]
    .join(",");
    format!(
        "<!DOCTYPE html><html><head>{}</head><body><main><h1>Solo Leveling</h1></main>{}{}{}</body></html>",
        push(&format!(r#"0:["$","main",null,{{"mangas":[{tower},{solo}]}}]"#)),
        push(&format!(r#"{{"manga":{solo},"chapters":[{chapters}],"total":4}}"#)),
        r#"<script>self.__next_f.push([1,"\n2a:T3c,Le chasseur le plus faible\n devient le plus fort."])</script>"#,
        r#"<script src="/_next/static/chunks/main.js"></script>"#,
    )
}

/// 测试推送脚本拼接与规范化
#[test]
fn test_blob_extraction_and_normalization() {
    let document = scraper::Html::parse_document(&manga_page());
    let raw = extract_rsc_data(&document);
    assert!(raw.contains("__next_f.push"));
    assert!(raw.contains(r#"\"urlId\":\"solo-leveling\""#));

    let normalized = normalize_rsc_data(&raw);
    assert!(normalized.contains(r#""urlId":"solo-leveling""#));
    assert!(normalized.contains("s3:covers/solo.webp"));
    assert_eq!(normalize_rsc_data(&normalized), normalized);

    assert_eq!(
        RscReference::parse("$2a").resolve(&normalized).as_deref(),
        Some("Le chasseur le plus faible\n devient le plus fort.")
    );
}

/// 测试章节按作品过滤、去重并保持顺序
#[test]
fn test_chapters_for_one_manga() {
    let chapters = decode_chapters(&manga_page(), "https://astral-manga.fr/manga/solo-leveling");
    let numbers: Vec<f32> = chapters.iter().map(|c| c.chapter_number).collect();
    assert_eq!(numbers, vec![3.0, 2.0, 1.0]);
    assert!(chapters.iter().all(|c| c.url.starts_with("/manga/solo-leveling/chapter/c")));
    // 2024-06-03T08:15:00Z
    assert_eq!(chapters[0].date_upload, Some(1_717_402_500));
}

/// 测试详情从正确的作品记录中提取
#[test]
fn test_details_scoped_to_manga() {
    let url = Url::parse("https://astral-manga.fr/manga/solo-leveling").unwrap();
    let draft = decode_manga_details(&manga_page(), &url);
    assert_eq!(draft.cover_key.as_deref(), Some("covers/solo.webp"));

    let manga = draft.finish(Some("https://cdn.example.com/solo.webp?sig=1".to_string()));
    assert_eq!(manga.url, "/manga/solo-leveling");
    assert_eq!(manga.title, "Solo Leveling");
    assert_eq!(
        manga.description.as_deref(),
        Some("Le chasseur le plus faible\n devient le plus fort.")
    );
    assert_eq!(manga.status, MangaStatus::Ongoing);
    assert_eq!(manga.genres, vec!["Action", "Fantasy"]);
    assert_eq!(manga.authors, vec!["Chugong"]);
    assert_eq!(manga.artists, vec!["DUBU"]);
    assert!(manga.teams.is_empty());
    assert_eq!(manga.year.as_deref(), Some("2018"));
    assert_eq!(
        manga.cover_url.as_deref(),
        Some("https://cdn.example.com/solo.webp?sig=1")
    );
}

/// 测试图片数组按页序排序
#[test]
fn test_pages_from_blob_sorted() {
    let payload = r#"{"chapter":{"id":"x","images":[{"id":"i3","link":"https://cdn.example.com/3.webp","orderId":3},{"id":"i1","link":"https://cdn.example.com/1.webp","orderId":1},{"id":"i2","link":"s3:chapters/x/2.webp","orderId":2}],"mangaId":"m"}}"#;
    let html = format!(
        r#"<html><body>{}<img alt="Page 1" src="/fallback.webp"></body></html>"#,
        push(payload)
    );
    let url = Url::parse("https://astral-manga.fr/manga/solo-leveling/chapter/x").unwrap();
    let candidates = decode_page_candidates(&html, &url);
    assert_eq!(candidates.links.len(), 3);
    assert_eq!(
        candidates.links[2].1,
        ImageLink::S3("chapters/x/2.webp".to_string())
    );

    let resolved = candidates.links.into_iter().map(|(order, link)| {
        let url = match link {
            ImageLink::Direct(url) => url,
            ImageLink::S3(key) => format!("https://signed.example.com/{key}"),
        };
        (order, Some(url))
    });
    let pages = assemble_pages(resolved, candidates.fallback);
    let urls: Vec<&str> = pages.iter().map(|p| p.image_url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.example.com/1.webp",
            "https://signed.example.com/chapters/x/2.webp",
            "https://cdn.example.com/3.webp",
        ]
    );
    let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

/// 测试页序重复的图片仍得到连续且唯一的页码
#[test]
fn test_pages_with_repeated_order_id() {
    let payload = r#"{"images":[{"link":"https://cdn.example.com/b.webp","orderId":1},{"link":"https://cdn.example.com/a.webp","orderId":1},{"link":"https://cdn.example.com/z.webp","orderId":0}],"x":1}"#;
    let html = format!("<html><body>{}</body></html>", push(payload));
    let url = Url::parse("https://astral-manga.fr/manga/a/chapter/b").unwrap();
    let candidates = decode_page_candidates(&html, &url);
    let resolved = candidates.links.into_iter().map(|(order, link)| match link {
        ImageLink::Direct(url) => (order, Some(url)),
        ImageLink::S3(_) => (order, None),
    });
    let pages = assemble_pages(resolved, candidates.fallback);
    let listed: Vec<(usize, &str)> = pages
        .iter()
        .map(|p| (p.index, p.image_url.as_str()))
        .collect();
    assert_eq!(
        listed,
        vec![
            (0, "https://cdn.example.com/z.webp"),
            (1, "https://cdn.example.com/b.webp"),
            (2, "https://cdn.example.com/a.webp"),
        ]
    );
}

/// 测试所有链接都无法解析时回退到 HTML
#[test]
fn test_pages_fall_back_when_presign_fails() {
    let payload = r#"{"images":[{"link":"s3:a.webp","orderId":1}],"x":1}"#;
    let html = format!(
        r#"<html><body>{}<img alt="Page 1" src="/p/1.webp"><img alt="Page 2" src="/p/2.webp"></body></html>"#,
        push(payload)
    );
    let url = Url::parse("https://astral-manga.fr/manga/a/chapter/b").unwrap();
    let candidates = decode_page_candidates(&html, &url);
    let unresolved = candidates.links.into_iter().map(|(order, _)| (order, None));
    let pages = assemble_pages(unresolved, candidates.fallback);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].index, 1);
    assert_eq!(pages[1].image_url, "https://astral-manga.fr/p/2.webp");
}
