//! 系列文档响应改写
//!
//! 第二站点的系列文档（`/data/series/*.json`）在到达解码器之前统一经过
//! [`patch_series_response`]：
//!
//! - 403/404 且正文是“拒绝访问”/“404”页面时，替换为标题为 [`SENTINEL_TITLE`]
//!   的空白系列文档并把状态改为 200，目录层再把这些条目过滤掉；
//! - 200 且正文中的 `chapters` 是数组时，改写为以 1 起始序号为键的对象，保持原有顺序。
//!
//! 改写是纯函数 `HttpResponse -> HttpResponse`，与传输层无关。

use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

/// 被拒绝访问的系列在目录中的占位标题
pub const SENTINEL_TITLE: &str = "DUMMY_ERROR_403";

/// 视为“拒绝访问”的正文标记（不区分大小写）
const DENIAL_MARKERS: [&str; 2] = ["Accès refusé", "Erreur 404"];

/// 已读取完毕的响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// 状态码
    pub status: u16,
    /// 最终地址（重定向之后）
    pub url: Url,
    /// 正文
    pub body: String,
}

/// 地址是否指向系列文档。
///
/// 路径以 `/data/series/` 开头，且路径或片段以 `.json` 结尾，或路径恰为 `/data/series/`。
#[must_use]
pub fn is_series_json(url: &Url) -> bool {
    let path = url.path();
    path.starts_with("/data/series/")
        && (path.ends_with(".json")
            || url.fragment().is_some_and(|f| f.ends_with(".json"))
            || path == "/data/series/")
}

/// 正文是否包含拒绝访问标记。
fn is_denial_body(body: &str) -> bool {
    let lower = body.to_lowercase();
    DENIAL_MARKERS
        .iter()
        .any(|marker| lower.contains(&marker.to_lowercase()))
}

/// 哨兵系列文档：标题为 [`SENTINEL_TITLE`]，其余字段均为 `null`。
#[must_use]
pub fn sentinel_body() -> String {
    json!({
        "title": SENTINEL_TITLE,
        "description": null,
        "artist": null,
        "author": null,
        "cover": null,
        "cover_low": null,
        "cover_hq": null,
        "tags": null,
        "release_status": null,
        "alternative_titles": null,
        "chapters": null,
    })
    .to_string()
}

/// 把 `chapters` 数组改写为 1 起始的对象；不满足条件时返回 `None`。
fn reindex_chapters(body: &str) -> Option<String> {
    let mut root = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(root)) => root,
        Ok(_) => return None,
        Err(e) => {
            debug!("series body is not JSON, passing through: {e}");
            return None;
        }
    };
    let slot = root.get_mut("chapters")?;
    let Value::Array(chapters) = slot.take() else {
        return None;
    };
    *slot = Value::Object(
        chapters
            .into_iter()
            .enumerate()
            .map(|(index, chapter)| ((index + 1).to_string(), chapter))
            .collect(),
    );
    serde_json::to_string(&root).ok()
}

/// 改写系列文档响应；其他响应原样返回。
#[must_use]
pub fn patch_series_response(response: HttpResponse) -> HttpResponse {
    if !is_series_json(&response.url) {
        return response;
    }
    match response.status {
        403 | 404 if is_denial_body(&response.body) => {
            warn!(url = %response.url, status = response.status, "series access denied, substituting sentinel");
            HttpResponse {
                status: 200,
                url: response.url,
                body: sentinel_body(),
            }
        }
        200 => match reindex_chapters(&response.body) {
            Some(body) => HttpResponse { body, ..response },
            None => response,
        },
        _ => response,
    }
}
