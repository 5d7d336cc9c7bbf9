// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 夸克账号与转存配置
    #[serde(default)]
    pub quark: QuarkConfig,
    /// 百度账号与转存配置
    #[serde(default)]
    pub baidu: BaiduConfig,
    /// 推送配置
    #[serde(default)]
    pub notify: NotifyConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 从配置文件加载，不存在或解析失败时使用默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load(path).await {
            Ok(config) => config,
            Err(e) => {
                warn!("加载配置失败，使用默认配置: {}", e);
                Self::default()
            }
        }
    }

    async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {}", path))?;
        toml::from_str(&content).context("解析配置文件失败")
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8520
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 植入资源配置
///
/// 开启后，每条转存成功的链接都会向其目录里追加转存一份固定资源。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InjectConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 植入资源自身的分享链接
    #[serde(default)]
    pub url: String,
    /// 植入资源的提取码（百度需要）
    #[serde(default)]
    pub pwd: String,
}

/// 夸克账号与转存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarkConfig {
    /// 登录 Cookie，留空表示未配置该账号
    #[serde(default)]
    pub cookie: String,
    /// 转存保存目录
    #[serde(default = "default_quark_save_path")]
    pub save_path: String,
    /// 植入配置
    #[serde(default)]
    pub inject: InjectConfig,
    /// 接口域名（测试用，正常不需要改）
    #[serde(default = "default_quark_api_base")]
    pub api_base: String,
    #[serde(default = "default_quark_save_base")]
    pub save_base: String,
    #[serde(default = "default_quark_account_base")]
    pub account_base: String,
}

fn default_quark_save_path() -> String {
    "来自：分享/LinkChanger".to_string()
}

fn default_quark_api_base() -> String {
    "https://drive-pc.quark.cn".to_string()
}

fn default_quark_save_base() -> String {
    "https://drive.quark.cn".to_string()
}

fn default_quark_account_base() -> String {
    "https://pan.quark.cn".to_string()
}

impl Default for QuarkConfig {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            save_path: default_quark_save_path(),
            inject: InjectConfig::default(),
            api_base: default_quark_api_base(),
            save_base: default_quark_save_base(),
            account_base: default_quark_account_base(),
        }
    }
}

/// 百度账号与转存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaiduConfig {
    /// 登录 Cookie，留空表示未配置该账号
    #[serde(default)]
    pub cookie: String,
    /// 转存保存目录
    #[serde(default = "default_baidu_save_path")]
    pub save_path: String,
    /// 植入配置
    #[serde(default)]
    pub inject: InjectConfig,
    /// 接口域名（测试用，正常不需要改）
    #[serde(default = "default_baidu_api_base")]
    pub api_base: String,
}

fn default_baidu_save_path() -> String {
    "/我的资源/LinkChanger".to_string()
}

fn default_baidu_api_base() -> String {
    "https://pan.baidu.com".to_string()
}

impl Default for BaiduConfig {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            save_path: default_baidu_save_path(),
            inject: InjectConfig::default(),
            api_base: default_baidu_api_base(),
        }
    }
}

/// 推送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Bark 推送 key，留空不推送
    #[serde(default)]
    pub bark_key: String,
    /// PushDeer 推送 key，留空不推送
    #[serde(default)]
    pub pushdeer_key: String,
    /// Bark 服务地址
    #[serde(default = "default_bark_base")]
    pub bark_base: String,
    /// PushDeer 服务地址
    #[serde(default = "default_pushdeer_base")]
    pub pushdeer_base: String,
}

fn default_bark_base() -> String {
    "https://api.day.app".to_string()
}

fn default_pushdeer_base() -> String {
    "https://api2.pushdeer.com".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            bark_key: String::new(),
            pushdeer_key: String::new(),
            bark_base: default_bark_base(),
            pushdeer_base: default_pushdeer_base(),
        }
    }
}

impl NotifyConfig {
    /// 是否配置了任一推送渠道
    pub fn has_any(&self) -> bool {
        !self.bark_key.is_empty() || !self.pushdeer_key.is_empty()
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}
