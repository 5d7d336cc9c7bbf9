// 百度接口数据类型
//
// 百度各接口统一用 errno 表示结果，0 为成功；字段缺失按失败处理。

use serde::Deserialize;

fn default_errno() -> i64 {
    -1
}

/// gettemplatevariable 响应
#[derive(Debug, Deserialize)]
pub struct TemplateVariableResponse {
    #[serde(default = "default_errno")]
    pub errno: i64,
    #[serde(default)]
    pub result: Option<TemplateVariableResult>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateVariableResult {
    #[serde(default)]
    pub bdstoken: String,
}

/// share/verify 响应
#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    #[serde(default = "default_errno")]
    pub errno: i64,
    /// 校验通过后下发的会话扩展值，需合并进 Cookie
    #[serde(default)]
    pub randsk: String,
}

/// share/transfer 响应
#[derive(Debug, Deserialize)]
pub struct TransferResponse {
    #[serde(default = "default_errno")]
    pub errno: i64,
}

/// api/list 响应
#[derive(Debug, Deserialize)]
pub struct DirListResponse {
    #[serde(default = "default_errno")]
    pub errno: i64,
    #[serde(default)]
    pub list: Vec<BaiduFileItem>,
}

/// api/list 文件条目
#[derive(Debug, Clone, Deserialize)]
pub struct BaiduFileItem {
    #[serde(default)]
    pub server_filename: String,
    #[serde(default)]
    pub fs_id: u64,
    #[serde(default)]
    pub isdir: i64,
}

/// share/set 响应
#[derive(Debug, Deserialize)]
pub struct ShareSetResponse {
    #[serde(default = "default_errno")]
    pub errno: i64,
    /// 新分享的公开链接
    #[serde(default)]
    pub link: String,
}

/// 植入资源的解析缓存
///
/// 键为 (shareid, uk, fsidlist 字符串)，同一客户端实例内只解析一次。
#[derive(Debug, Clone)]
pub struct BaiduInjectCache {
    pub shareid: String,
    pub uk: String,
    /// 已拼好的 fsidlist 字符串，如 "[123,456]"
    pub fsid_list: String,
}
