// 任务注册表
//
// 进程级共享的任务存储：后台 worker 写入，HTTP 轮询并发读取。
// 任务只存在内存里，超过保留窗口的条目在创建新任务时顺带清理。

use crate::job::types::{Job, JobStatus, JobSummary, LogCategory, LogEntry, Progress};
use chrono::{FixedOffset, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// 任务保留窗口（秒）
const JOB_RETENTION_SECS: i64 = 24 * 3600;

/// 任务注册表
pub struct JobStore {
    jobs: DashMap<String, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    /// 创建新任务，返回任务 ID
    ///
    /// 创建前清理超过 24 小时的旧任务，防止内存无限增长。
    pub fn create(&self) -> String {
        self.sweep_expired();

        let id: String = Uuid::new_v4().to_string().chars().take(8).collect();
        self.jobs.insert(id.clone(), Job::new(id.clone()));
        info!("创建任务: {}", id);
        id
    }

    /// 查询任务（克隆返回，供轮询端序列化）
    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).map(|j| j.value().clone())
    }

    /// 追加一条日志
    ///
    /// 消息文本在这里做 HTML 转义，消费方直接渲染即可。
    /// 任务不存在或已完成时静默忽略。
    pub fn append_log(&self, id: &str, msg: &str, category: LogCategory) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.is_done() {
                debug!("任务已完成，忽略日志: {}", id);
                return;
            }
            job.logs.push(LogEntry {
                time: display_time(),
                msg: escape_html(msg),
                category,
            });
        }
    }

    /// 覆盖进度，current 不会超过 total
    pub fn set_progress(&self, id: &str, current: usize, total: usize) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.is_done() {
                return;
            }
            job.progress = Progress {
                current: current.min(total),
                total,
            };
        }
    }

    /// 完成任务，写入结果文本与统计摘要
    ///
    /// running -> done 单向流转，重复调用不生效。
    pub fn complete(&self, id: &str, result_text: String, summary: JobSummary) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.is_done() {
                return;
            }
            job.status = JobStatus::Done;
            job.result_text = result_text;
            job.summary = Some(summary);
            info!("任务完成: {}", id);
        }
    }

    /// 清理过期任务
    fn sweep_expired(&self) {
        let now = Utc::now().timestamp();
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| now - job.created_at <= JOB_RETENTION_SECS);
        let removed = before - self.jobs.len();
        if removed > 0 {
            info!("已清理 {} 个过期任务", removed);
        }
    }

    /// 测试辅助：把任务创建时间向前拨
    #[cfg(test)]
    fn backdate(&self, id: &str, secs: i64) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            job.created_at -= secs;
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 展示用时间（UTC+8）
fn display_time() -> String {
    let tz = FixedOffset::east_opt(8 * 3600).unwrap();
    Utc::now().with_timezone(&tz).format("%H:%M:%S").to_string()
}

/// HTML 转义，防止日志文本注入页面
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
