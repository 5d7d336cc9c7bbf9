// 应用状态

use crate::config::AppConfig;
use crate::job::JobStore;
use std::sync::Arc;

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 任务注册表
    pub job_store: Arc<JobStore>,
    /// 应用配置
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: AppConfig) -> Self {
        Self {
            job_store: Arc::new(JobStore::new()),
            config: Arc::new(config),
        }
    }
}
