// 夸克接口数据类型

use serde::Deserialize;
use serde_json::Value;

/// 夸克接口通用响应壳
///
/// code 字段可能是数字 0 也可能是字符串 "OK"，其余字段缺失时给默认值。
#[derive(Debug, Deserialize)]
pub struct QuarkEnvelope {
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl QuarkEnvelope {
    /// code 为 0 或 "OK" 视为成功
    pub fn is_ok(&self) -> bool {
        self.code.as_i64() == Some(0) || self.code.as_str() == Some("OK")
    }

    /// 取错误描述
    pub fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "未知错误".to_string())
    }

    /// 取 data 下的字符串字段
    pub fn data_str(&self, key: &str) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d[key].as_str())
            .map(str::to_string)
    }

    /// 取 data.list 数组
    pub fn data_list(&self) -> Vec<Value> {
        self.data
            .as_ref()
            .and_then(|d| d["list"].as_array())
            .cloned()
            .unwrap_or_default()
    }
}

/// 分享内容条目（sharepage/detail 返回）
#[derive(Debug, Clone, Deserialize)]
pub struct ShareEntry {
    #[serde(default)]
    pub fid: String,
    /// 该资源的访问令牌，转存时随 fid 一起提交
    #[serde(default)]
    pub share_fid_token: String,
    #[serde(default)]
    pub file_name: String,
}

/// 网盘目录条目（file/sort 返回）
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    #[serde(default)]
    pub fid: String,
    #[serde(default)]
    pub file_name: String,
    /// 是否为目录
    #[serde(default)]
    pub dir: bool,
}

/// 植入资源的解析缓存
///
/// 同一客户端实例内，植入资源只解析一次，之后直接复用。
#[derive(Debug, Clone)]
pub struct QuarkInjectCache {
    pub fids: Vec<String>,
    pub tokens: Vec<String>,
    pub pwd_id: String,
    pub stoken: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_code_forms() {
        let num: QuarkEnvelope = serde_json::from_str(r#"{"code":0,"data":{}}"#).unwrap();
        assert!(num.is_ok());

        let text: QuarkEnvelope = serde_json::from_str(r#"{"code":"OK"}"#).unwrap();
        assert!(text.is_ok());

        let err: QuarkEnvelope =
            serde_json::from_str(r#"{"code":31001,"message":"分享不存在"}"#).unwrap();
        assert!(!err.is_ok());
        assert_eq!(err.message(), "分享不存在");
    }

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let env: QuarkEnvelope = serde_json::from_str("{}").unwrap();
        assert!(!env.is_ok());
        assert!(env.data_str("stoken").is_none());
        assert!(env.data_list().is_empty());
    }
}
