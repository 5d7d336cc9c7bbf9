// 链接扫描模块
//
// 从自由文本中定位网盘分享链接，提取提取码，并为百度链接推断目录名。
// 纯文本函数，无副作用。

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 夸克分享链接模式
const QUARK_URL_PATTERN: &str = r"https://pan\.quark\.cn/s/[a-zA-Z0-9]+(?:\?pwd=[a-zA-Z0-9]+)?";

/// 百度分享链接模式
const BAIDU_URL_PATTERN: &str = r"https?://pan\.baidu\.com/s/[a-zA-Z0-9_\-]+(?:\?pwd=[a-zA-Z0-9]+)?";

/// 提取码的几种书写形式：?pwd= / &pwd= / 空白后裸 4 位 / “提取码:”标注
const PASSWORD_PATTERN: &str = r"(?:\?pwd=|&pwd=|\s+|提取码[:：]?\s*)([a-zA-Z0-9]{4})";

/// 目录名推断时跳过的套话行
const BOILERPLATE_LINE_PATTERN: &str = r"(?i)^(百度|链接|提取码|:|：|https?|夸克|pwd|code)*$";

/// 目录名推断时从行尾剥离的套话后缀
const BOILERPLATE_SUFFIX_PATTERN: &str = r"(?i)(百度|链接|提取码|:|：|pwd|夸克).*$";

/// 目录名中允许保留之外的字符（非 CJK/字母/数字/下划线/连字符/空白）
const INVALID_NAME_CHAR_PATTERN: &str = r"[^一-龥a-zA-Z0-9_\-\s]";

/// 目录名推断的最大回看字节数
const NAME_LOOKBACK_BYTES: usize = 200;

/// 提取码搜索窗口在链接之后延伸的字节数
const PASSWORD_LOOKAHEAD_BYTES: usize = 64;

/// 支持的网盘提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Quark,
    Baidu,
}

/// 文本中定位到的一条分享链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareMatch {
    /// 所属提供方
    pub provider: Provider,
    /// 匹配到的原始链接文本
    pub raw_url: String,
    /// 在原文中的字节起始偏移
    pub start: usize,
    /// 在原文中的字节结束偏移
    pub end: usize,
    /// 附近提取到的提取码（百度）
    pub password: Option<String>,
    /// 从前文推断出的目录名（百度）
    pub folder_name: Option<String>,
}

/// 扫描全文，返回按发现顺序排列的链接匹配（先夸克后百度）
pub fn scan_links(text: &str) -> Vec<ShareMatch> {
    let quark_re = Regex::new(QUARK_URL_PATTERN).unwrap();
    let baidu_re = Regex::new(BAIDU_URL_PATTERN).unwrap();

    let mut matches = Vec::new();

    for m in quark_re.find_iter(text) {
        matches.push(ShareMatch {
            provider: Provider::Quark,
            raw_url: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
            password: None,
            folder_name: None,
        });
    }

    for m in baidu_re.find_iter(text) {
        matches.push(ShareMatch {
            provider: Provider::Baidu,
            raw_url: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
            password: extract_password(text, m.start(), m.end()),
            folder_name: Some(extract_folder_name(text, m.start())),
        });
    }

    matches
}

/// 在链接附近搜索提取码
///
/// 搜索窗口从链接起点开始，向后延伸至链接结束后约 64 字节，
/// 覆盖 `?pwd=xxxx` 后缀、空格分隔的裸码以及“提取码: xxxx”标注。
fn extract_password(text: &str, start: usize, end: usize) -> Option<String> {
    let window_end = floor_char_boundary(text, (end + PASSWORD_LOOKAHEAD_BYTES).min(text.len()));
    let window = &text[start..window_end];

    let re = Regex::new(PASSWORD_PATTERN).unwrap();
    re.captures(window)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// 从链接前方的文本推断目录名
///
/// 回看约 200 字节，按行倒序寻找第一条有实际内容的行：
/// 跳过空行和纯套话行，剥掉行尾的“链接/提取码”类后缀，再做清洗。
/// 清洗结果不足 2 个字符时退回到按当前时间生成的名字。
pub fn extract_folder_name(text: &str, match_start: usize) -> String {
    let lookback = floor_char_boundary(text, match_start.saturating_sub(NAME_LOOKBACK_BYTES));
    let pre_text = &text[lookback..match_start];

    let skip_re = Regex::new(BOILERPLATE_LINE_PATTERN).unwrap();
    let strip_re = Regex::new(BOILERPLATE_SUFFIX_PATTERN).unwrap();

    let mut candidate = "";
    for line in pre_text.lines().rev() {
        let line = line.trim();
        if line.is_empty() || skip_re.is_match(line) {
            continue;
        }
        candidate = line;
        break;
    }

    let stripped = strip_re.replace(candidate, "");
    let final_name = sanitize_folder_name(stripped.trim());

    if final_name.chars().count() < 2 {
        return fallback_folder_name();
    }
    final_name.chars().take(50).collect()
}

/// 清洗目录名：括号类标点转空格，仅保留中英文/数字/下划线/连字符，折叠空白
pub fn sanitize_folder_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let bracket_re = Regex::new(r"[【】\[\]()（）]").unwrap();
    let invalid_re = Regex::new(INVALID_NAME_CHAR_PATTERN).unwrap();
    let spaces_re = Regex::new(r"\s+").unwrap();

    let spaced = bracket_re.replace_all(name, " ");
    let cleaned = invalid_re.replace_all(&spaced, "");
    spaces_re.replace_all(&cleaned, " ").trim().to_string()
}

/// 无法推断时的兜底目录名
fn fallback_folder_name() -> String {
    format!("Res_{}", chrono::Utc::now().timestamp())
}

/// 将字节偏移向前对齐到字符边界，避免切分多字节字符
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
