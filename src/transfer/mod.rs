// 转存结果与错误类型定义

use thiserror::Error;

/// 单条链接转存的错误类型
///
/// 这些错误发生在文件确认转存之前，对应的链接在结果文本中保持原样。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    /// 分享链接格式错误（缺少路径分隔符等）
    #[error("链接格式错误")]
    Format,
    /// 提取码缺失、失效或错误
    #[error("提取码无效或已失效")]
    CodeInvalid,
    /// 分享内容为空
    #[error("分享内容为空")]
    EmptyShare,
    /// 分享页面解析失败（缺少必要字段）
    #[error("页面解析失败")]
    PageParse,
    /// 转存接口返回业务错误
    #[error("转存失败: {0}")]
    Transfer(String),
    /// 转存请求超时
    #[error("转存请求超时(文件可能过大)")]
    Timeout,
    /// 其他未分类错误
    #[error("{0}")]
    Unknown(String),
}

/// 单条链接转存的最终结果
///
/// 区分两层失败：`Failed` 发生在文件确认转存之前（硬失败）；
/// `Saved` 表示文件已经存入网盘，但后续定位/分享步骤失败（软失败）。
/// 只有 `Success` 才会触发文本替换。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// 转存并重新分享成功
    Success {
        /// 新的公开分享链接
        share_url: String,
        /// 转存后资源的标识（夸克为 fid，百度为目录路径），用于植入目标
        resource_id: String,
    },
    /// 植入转存完成（不重新分享，不计入成功数）
    Injected,
    /// 文件已转存，但定位或分享失败
    Saved {
        /// 展示给用户的说明文字
        detail: String,
    },
    /// 转存前失败
    Failed(TransferError),
}

impl TransferOutcome {
    /// 取出可用于文本替换的新链接（仅 Success 有）
    pub fn new_link(&self) -> Option<&str> {
        match self {
            TransferOutcome::Success { share_url, .. } => Some(share_url),
            _ => None,
        }
    }

    /// 是否为完整成功
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_link_only_for_success() {
        let ok = TransferOutcome::Success {
            share_url: "https://pan.quark.cn/s/newlink".to_string(),
            resource_id: "fid1".to_string(),
        };
        assert_eq!(ok.new_link(), Some("https://pan.quark.cn/s/newlink"));
        assert!(ok.is_success());

        let saved = TransferOutcome::Saved {
            detail: "✅ 已存入网盘（分享失败）".to_string(),
        };
        assert_eq!(saved.new_link(), None);
        assert!(!saved.is_success());

        let failed = TransferOutcome::Failed(TransferError::EmptyShare);
        assert_eq!(failed.new_link(), None);

        assert_eq!(TransferOutcome::Injected.new_link(), None);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TransferError::Format.to_string(), "链接格式错误");
        assert_eq!(
            TransferError::Transfer("容量不足".to_string()).to_string(),
            "转存失败: 容量不足"
        );
        assert_eq!(
            TransferError::Unknown("发生异常".to_string()).to_string(),
            "发生异常"
        );
    }
}
