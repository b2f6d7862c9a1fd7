//! 记录范围查找
//!
//! 规范化后的 RSC 数据通常包含站点上 *所有* 作品的记录，字段名又彼此重复，
//! 因此在提取字段前需要先圈定目标实体所在的大致范围。
//! 这里只依靠锚点子串与固定的窗口长度，不做结构解析：范围可能多截或少截，
//! 调用方必须在范围内继续使用宽松的字段匹配。
//!
//! 所有范围都以 [`TextRange`]（规范化数据中的字节偏移）表示，
//! 边界裁剪与字符边界对齐集中在 [`TextRange::clamped`] 中完成。

/// 章节数组的起始标记
pub const CHAPTERS_MARKER: &str = "\"chapters\":[{";
/// 图片数组的起始标记
pub const IMAGES_MARKER: &str = "\"images\":[{";

/// 向前/向后搜索锚点的最大距离
const SEARCH_WINDOW: usize = 5000;
/// 向前找不到锚点时，范围起点相对匹配位置的回退距离
const FALLBACK_BEFORE: usize = 1000;
/// 向后找不到封面链接时，范围终点相对匹配位置的延伸距离
const FALLBACK_AFTER: usize = 3000;
/// 封面链接值结束后额外保留的长度
const LINK_TAIL: usize = 100;
/// 封面链接值没有闭合引号时，相对链接标记保留的长度
const UNTERMINATED_LINK_TAIL: usize = 300;

const TITLE_ANCHOR: &str = "\"title\":\"";
const ID_ANCHOR: &str = "\"id\":\"";
const S3_LINK_ANCHOR: &str = "\"link\":\"s3:";
const ARRAY_END: &str = "],\"";

/// 规范化数据中的一段半开区间 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    /// 起始字节偏移
    pub start: usize,
    /// 结束字节偏移（不含）
    pub end: usize,
}

impl TextRange {
    /// 构造一个被裁剪到 `text` 范围内、且落在字符边界上的区间。
    ///
    /// 起点向前对齐、终点向后对齐到字符边界，且保证 `start <= end`。
    #[must_use]
    pub fn clamped(text: &str, start: usize, end: usize) -> Self {
        let end = ceil_char_boundary(text, end.min(text.len()));
        let start = floor_char_boundary(text, start.min(end));
        Self { start, end }
    }

    /// 取出区间对应的文本；区间非法时返回空串。
    #[must_use]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or("")
    }

    /// 区间长度（字节）
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// 区间是否为空
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// 定位某部作品的记录范围。
///
/// 以 `"urlId":"<url_id>"` 的首次出现为中心：
/// - 起点：向前 5000 字节内最后一个 `"title":"` 或 `"id":"`，再退到其前最近的 `{`；
///   找不到锚点时取匹配位置前 1000 字节；
/// - 终点：向后 5000 字节内第一个 `"link":"s3:`，取该值结束后 100 字节；
///   值未闭合时取标记后 300 字节；没有封面链接时取匹配位置后 3000 字节。
///
/// `url_id` 为空或数据中没有该标识时返回 `None`。
#[must_use]
pub fn find_manga_scope(data: &str, url_id: &str) -> Option<TextRange> {
    if url_id.trim().is_empty() {
        return None;
    }

    let url_id_pattern = format!("\"urlId\":\"{url_id}\"");
    let match_idx = data.find(&url_id_pattern)?;

    let search_start = floor_char_boundary(data, match_idx.saturating_sub(SEARCH_WINDOW));
    let before = data.get(search_start..match_idx).unwrap_or("");
    let anchor = match (before.rfind(TITLE_ANCHOR), before.rfind(ID_ANCHOR)) {
        (Some(title), Some(id)) => Some(title.max(id)),
        (title, id) => title.or(id),
    };
    let start = match anchor {
        Some(anchor_idx) => {
            let brace = before.get(..anchor_idx).and_then(|head| head.rfind('{'));
            search_start + brace.unwrap_or(anchor_idx)
        }
        None => match_idx.saturating_sub(FALLBACK_BEFORE),
    };

    let search_end = ceil_char_boundary(data, (match_idx + SEARCH_WINDOW).min(data.len()));
    let after = data.get(match_idx..search_end).unwrap_or("");
    let end = match after.find(S3_LINK_ANCHOR) {
        Some(link_idx) => {
            let value_start = link_idx + S3_LINK_ANCHOR.len();
            let value_end = after
                .get(value_start..)
                .and_then(|value| value.find('"'))
                .map(|quote| value_start + quote);
            match value_end {
                Some(quote_idx) => match_idx + quote_idx + LINK_TAIL,
                None => match_idx + link_idx + UNTERMINATED_LINK_TAIL,
            }
        }
        None => match_idx + FALLBACK_AFTER,
    };

    Some(TextRange::clamped(data, start, end))
}

/// 定位某个对象数组（如 [`CHAPTERS_MARKER`]、[`IMAGES_MARKER`]）的范围。
///
/// 从标记的首次出现开始，到其后的第一个 `],"` 为止；没有结束标记时延伸到数据末尾。
#[must_use]
pub fn find_array_scope(data: &str, marker: &str) -> Option<TextRange> {
    let start = data.find(marker)?;
    let end = data
        .get(start..)
        .and_then(|rest| rest.find(ARRAY_END))
        .filter(|&rel| rel > 0)
        .map_or(data.len(), |rel| start + rel);
    Some(TextRange::clamped(data, start, end))
}
