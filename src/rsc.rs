//! RSC flight 数据的定位、规范化与引用解析
//!
//! Next.js 页面把服务端组件数据拆成若干段，通过
//! `self.__next_f.push([1,"..."])` 内联脚本推送到客户端。这些段落是带有多层转义的
//! JSON 片段与 `<id>:T<hex>,<payload>` 形式的文本块的混合体，没有稳定的结构可供解析。
//!
//! 处理流程：
//! 1. [`extract_rsc_data`]：按文档顺序拼接所有含推送标记的脚本正文；
//! 2. [`normalize_rsc_data`]：解码 `\uXXXX` 并逐层折叠引号/斜杠/换行转义；
//! 3. [`scope`]：按实体标识在规范化文本中圈定记录范围；
//! 4. [`fields`]：在范围内用宽松的正则提取字段；
//! 5. [`RscReference`]：把 `$<id>` 形式的占位符解析为对应文本块的内容。

pub mod fields;
pub mod scope;

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// 推送脚本中的标记子串
pub const RSC_PUSH_MARKER: &str = "__next_f.push";

#[allow(clippy::expect_used)]
static UNICODE_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\u([dD][89abAB][0-9a-fA-F]{2})\\u([dD][c-fC-F][0-9a-fA-F]{2})|\\u([0-9a-fA-F]{4})")
        .expect("UNICODE_ESCAPE regex")
});

#[allow(clippy::expect_used)]
static CHUNK_TERMINATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:\\n|\n)[0-9]+:|""#).expect("CHUNK_TERMINATOR regex"));

/// 从已解析的文档中拼接所有 RSC 推送脚本的正文。
///
/// 没有匹配的脚本时返回空字符串；调用方应将其视为“无启发式数据”并走回退路径。
#[cfg(feature = "scraper")]
#[must_use]
pub fn extract_rsc_data(document: &scraper::Html) -> String {
    let Ok(script_selector) = scraper::Selector::parse("script") else {
        return String::new();
    };
    let mut builder = String::new();
    for script in document.select(&script_selector) {
        let text: String = script.text().collect();
        if text.contains(RSC_PUSH_MARKER) {
            builder.push_str(&text);
        }
    }
    builder
}

/// 去除 RSC 数据中的多层转义。
///
/// 依次执行：解码 `\uXXXX`（含代理对）；`\\\"`、`\\"`、`\"` 折叠为 `"`；
/// `\\/`、`\/` 折叠为 `/`；`\n` 还原为换行。较长的转义序列必须先于较短的处理，
/// 否则会出现二次反转义。
///
/// 一轮处理可能拼出新的转义（如 `\u005c` 解码出的反斜杠），因此重复处理直到结果不再变化；
/// 每次替换都会缩短文本，循环必然终止。
#[must_use]
pub fn normalize_rsc_data(raw: &str) -> String {
    let mut current = normalize_pass(raw);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_pass(raw: &str) -> String {
    let decoded = UNICODE_ESCAPE.replace_all(raw, |caps: &Captures<'_>| decode_unicode(caps));
    decoded
        .replace("\\\\\\\"", "\"")
        .replace("\\\\\"", "\"")
        .replace("\\\"", "\"")
        .replace("\\\\/", "/")
        .replace("\\/", "/")
        .replace("\\n", "\n")
}

/// 将一次 `\uXXXX`（或代理对）匹配解码为字符；无法表示的码点保持原文。
fn decode_unicode(caps: &Captures<'_>) -> String {
    let original = caps.get(0).map_or("", |m| m.as_str());
    let hex = |i: usize| caps.get(i).and_then(|m| u32::from_str_radix(m.as_str(), 16).ok());

    if let (Some(high), Some(low)) = (hex(1), hex(2)) {
        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        return char::from_u32(code).map_or_else(|| original.to_string(), String::from);
    }
    hex(3)
        .and_then(char::from_u32)
        .map_or_else(|| original.to_string(), String::from)
}

/// 字段值中可能出现的 RSC 引用
///
/// - `Plain`：普通字符串，原样返回；
/// - `Direct`：`$D` 前缀，去掉前缀后即为字面值，不查找数据块；
/// - `Indirect`：`$<chunkId>`，需要在规范化数据中查找 `<chunkId>:T<hex>,<payload>`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RscReference<'a> {
    /// 普通值
    Plain(&'a str),
    /// 内联解引用的字面值（已去掉 `$D`）
    Direct(&'a str),
    /// 指向另一数据块的编号（已去掉 `$`）
    Indirect(&'a str),
}

impl<'a> RscReference<'a> {
    /// 识别字段值的引用形式。
    #[must_use]
    pub fn parse(value: &'a str) -> Self {
        if let Some(literal) = value.strip_prefix("$D") {
            return Self::Direct(literal);
        }
        match value.strip_prefix('$') {
            Some(chunk_id) if !chunk_id.is_empty() => Self::Indirect(chunk_id),
            _ => Self::Plain(value),
        }
    }

    /// 在规范化数据中解析引用。
    ///
    /// 找不到对应数据块时返回 `None`，调用方应视同字段缺失。
    #[must_use]
    pub fn resolve(&self, data: &str) -> Option<String> {
        match *self {
            Self::Plain(value) | Self::Direct(value) => Some(value.to_string()),
            Self::Indirect(chunk_id) => find_text_chunk(data, chunk_id),
        }
    }
}

/// 解析可选字段值；`None` 原样透传。
#[must_use]
pub fn resolve_rsc_reference(data: &str, reference: Option<&str>) -> Option<String> {
    reference.and_then(|value| RscReference::parse(value).resolve(data))
}

/// 查找 `<chunkId>:T<hex>,<payload>` 文本块并返回反转义后的内容。
///
/// 数据块必须位于数据开头或换行（真实换行或字面 `\n`）之后；
/// 内容延伸至下一个 `\n<数字>:`、未转义引号或数据末尾。
fn find_text_chunk(data: &str, chunk_id: &str) -> Option<String> {
    let pattern = format!(r"(?:^|\n|\\n){}:T[0-9a-fA-F]+,", regex::escape(chunk_id));
    let header = Regex::new(&pattern).ok()?.find(data)?;
    let rest = data.get(header.end()..)?;
    let payload = CHUNK_TERMINATOR
        .find(rest)
        .map_or(rest, |terminator| rest.get(..terminator.start()).unwrap_or(rest));
    Some(payload.replace("\\n", "\n").replace("\\\"", "\""))
}
