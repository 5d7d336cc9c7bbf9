// 任务数据类型定义

use serde::{Deserialize, Serialize};

/// 任务状态
///
/// 单向流转：running -> done，不会回退。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 执行中
    Running,
    /// 已完成
    Done,
}

/// 日志条目类别，前端按类别着色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Info,
    Success,
    Error,
    Quark,
    Baidu,
}

/// 单条日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// 展示用时间（UTC+8，HH:MM:SS）
    pub time: String,
    /// 已做 HTML 转义的消息文本
    pub msg: String,
    /// 类别
    #[serde(rename = "type")]
    pub category: LogCategory,
}

/// 任务进度
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// 任务完成后的统计摘要
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSummary {
    /// 成功条数
    pub success: usize,
    /// 总条数
    pub total: usize,
    /// 总耗时（展示用）
    pub duration: String,
}

/// 一次后台转链任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 任务 ID（短随机串）
    pub id: String,
    /// 任务状态
    pub status: JobStatus,
    /// 按时间顺序追加的日志
    pub logs: Vec<LogEntry>,
    /// 进度
    pub progress: Progress,
    /// 替换完成的结果文本，完成前为空
    pub result_text: String,
    /// 完成后的统计摘要
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<JobSummary>,
    /// 创建时间（Unix 秒，仅用于过期清理）
    #[serde(skip)]
    pub created_at: i64,
}

impl Job {
    /// 创建一个新的运行中任务
    pub fn new(id: String) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            logs: Vec::new(),
            progress: Progress::default(),
            result_text: String::new(),
            summary: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// 是否已完成
    pub fn is_done(&self) -> bool {
        self.status == JobStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_running() {
        let job = Job::new("abcd1234".to_string());
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.logs.is_empty());
        assert_eq!(job.progress.current, 0);
        assert_eq!(job.progress.total, 0);
        assert!(job.result_text.is_empty());
        assert!(job.summary.is_none());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(serde_json::to_string(&JobStatus::Done).unwrap(), "\"done\"");
        assert_eq!(
            serde_json::to_string(&LogCategory::Quark).unwrap(),
            "\"quark\""
        );
    }
}
