// 夸克网盘客户端实现
//
// 基于夸克网页端私有接口的转存客户端：解析分享、批量转存到指定目录、
// 等待异步任务、重新创建公开分享。所有请求带统一的防重放参数。

use crate::quark::types::{FileEntry, QuarkEnvelope, QuarkInjectCache, ShareEntry};
use crate::transfer::{TransferError, TransferOutcome};
use anyhow::{Context, Result};
use rand::Rng;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 接口主域名（列表、分享、任务查询）
const DEFAULT_API_BASE: &str = "https://drive-pc.quark.cn";
/// 转存接口域名
const DEFAULT_SAVE_BASE: &str = "https://drive.quark.cn";
/// 账号接口域名
const DEFAULT_ACCOUNT_BASE: &str = "https://pan.quark.cn";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 转存任务完成轮询次数（每秒一次）
const TASK_POLL_ATTEMPTS: u32 = 8;

/// 夸克网盘客户端
///
/// 每次转链任务创建一个实例，实例内持有登录 Cookie 与植入缓存，
/// 不跨任务共享。
pub struct QuarkClient {
    client: Client,
    api_base: String,
    save_base: String,
    account_base: String,
    inject_cache: Option<QuarkInjectCache>,
}

impl QuarkClient {
    /// 创建客户端（线上域名）
    pub fn new(cookie: &str) -> Result<Self> {
        Self::with_bases(cookie, DEFAULT_API_BASE, DEFAULT_SAVE_BASE, DEFAULT_ACCOUNT_BASE)
    }

    /// 创建客户端并指定接口域名（测试时指向 mock 服务器）
    pub fn with_bases(
        cookie: &str,
        api_base: &str,
        save_base: &str,
        account_base: &str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
        headers.insert(
            "cookie",
            HeaderValue::from_str(cookie).context("夸克 Cookie 含非法字符")?,
        );
        headers.insert("origin", HeaderValue::from_static("https://pan.quark.cn"));
        headers.insert("referer", HeaderValue::from_static("https://pan.quark.cn/"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(45))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("创建夸克 HTTP 客户端失败")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            save_base: save_base.trim_end_matches('/').to_string(),
            account_base: account_base.trim_end_matches('/').to_string(),
            inject_cache: None,
        })
    }

    /// 每个请求都要带的防重放参数
    fn anti_replay_params(&self) -> [(String, String); 4] {
        let dt = rand::thread_rng().gen_range(100..=9999);
        [
            ("pr".to_string(), "ucpro".to_string()),
            ("fr".to_string(), "pc".to_string()),
            ("__dt".to_string(), dt.to_string()),
            (
                "__t".to_string(),
                chrono::Utc::now().timestamp_millis().to_string(),
            ),
        ]
    }

    /// 校验 Cookie 是否有效，有效时返回昵称
    pub async fn check_login(&self) -> Option<String> {
        let url = format!("{}/account/info", self.account_base);
        let resp = self
            .client
            .get(&url)
            .query(&self.anti_replay_params())
            .send()
            .await
            .ok()?;
        let env: QuarkEnvelope = resp.json().await.ok()?;
        if env.is_ok() && env.data.is_some() {
            let nickname = env.data_str("nickname").unwrap_or_else(|| "用户".to_string());
            info!("夸克登录有效: {}", nickname);
            return Some(nickname);
        }
        None
    }

    /// 逐级解析保存目录路径，缺失的层级自动创建，返回末级目录 fid
    pub async fn ensure_path(&self, path: &str) -> Result<String> {
        let mut curr_fid = "0".to_string();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let mut found: Option<String> = None;
            match self
                .list_folder(&curr_fid, 50, "file_type:asc,updated_at:desc")
                .await
            {
                Ok(entries) => {
                    for entry in entries {
                        if entry.file_name == part && entry.dir {
                            found = Some(entry.fid);
                            break;
                        }
                    }
                }
                Err(e) => debug!("目录列表失败，尝试直接创建: {}", e),
            }

            let fid = match found {
                Some(fid) => fid,
                None => self
                    .mkdir(part, &curr_fid)
                    .await
                    .with_context(|| format!("创建目录 {} 失败", part))?,
            };
            curr_fid = fid;
        }
        Ok(curr_fid)
    }

    /// 处理一条分享链接
    ///
    /// 非植入模式走完整流程：解析分享 -> 转存 -> 等待完成 -> 定位副本 ->
    /// 重新分享，返回新链接。植入模式在转存提交成功后立即返回，且同一
    /// 实例内只解析一次植入资源（见 `QuarkInjectCache`）。
    pub async fn process_url(
        &mut self,
        url: &str,
        target_fid: &str,
        is_inject: bool,
    ) -> TransferOutcome {
        // 解析分享，植入模式优先取缓存
        let (fids, tokens, pwd_id, stoken, first_name) = if is_inject && self.inject_cache.is_some()
        {
            let cache = self.inject_cache.clone().unwrap();
            debug!("复用植入缓存: pwd_id={}", cache.pwd_id);
            (
                cache.fids,
                cache.tokens,
                cache.pwd_id,
                cache.stoken,
                String::new(),
            )
        } else {
            match self.resolve_share(url).await {
                Ok(resolved) => {
                    if is_inject {
                        self.inject_cache = Some(QuarkInjectCache {
                            fids: resolved.0.clone(),
                            tokens: resolved.1.clone(),
                            pwd_id: resolved.2.clone(),
                            stoken: resolved.3.clone(),
                        });
                    }
                    resolved
                }
                Err(e) => return TransferOutcome::Failed(e),
            }
        };

        // 批量转存到目标目录
        let save_url = format!("{}/1/clouddrive/share/sharepage/save", self.save_base);
        let save_body = serde_json::json!({
            "fid_list": fids,
            "fid_token_list": tokens,
            "to_pdir_fid": target_fid,
            "pwd_id": pwd_id,
            "stoken": stoken,
            "pdir_fid": "0",
            "scene": "link",
        });
        let env = match self.post_json(&save_url, &save_body).await {
            Ok(env) => env,
            Err(e) => {
                warn!("夸克转存请求失败: {}", e);
                return TransferOutcome::Failed(TransferError::Unknown(
                    "转存请求失败".to_string(),
                ));
            }
        };
        if !env.is_ok() {
            return TransferOutcome::Failed(TransferError::Transfer(env.message()));
        }
        let task_id = env.data_str("task_id").unwrap_or_default();

        if is_inject {
            return TransferOutcome::Injected;
        }

        // 等待转存任务完成（尽力而为，超过次数后乐观继续）
        for _ in 0..TASK_POLL_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Ok(detail) = self.task_detail(&task_id, None).await {
                if detail["status"].as_i64() == Some(2) {
                    break;
                }
            }
        }
        // 列表接口有短暂的写后读延迟
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // 在目标目录定位刚转存的副本：先按名字精确匹配，否则取最新一条
        let new_fid = match self.list_folder(target_fid, 20, "updated_at:desc").await {
            Ok(entries) if !entries.is_empty() => entries
                .iter()
                .find(|e| e.file_name == first_name)
                .map(|e| e.fid.clone())
                .or_else(|| Some(entries[0].fid.clone())),
            _ => None,
        };
        let new_fid = match new_fid {
            Some(fid) => fid,
            None => {
                return TransferOutcome::Saved {
                    detail: "✅ 已存入网盘（未能定位文件，未分享）".to_string(),
                }
            }
        };

        // 为副本创建不过期的公开分享
        match self.create_share(&new_fid, &first_name).await {
            Ok(share_url) => TransferOutcome::Success {
                share_url,
                resource_id: new_fid,
            },
            Err(detail) => TransferOutcome::Saved { detail },
        }
    }

    /// 解析分享链接：提取 pwd_id/提取码，换取 stoken，拉取首页内容列表
    ///
    /// 返回 (fid 列表, token 列表, pwd_id, stoken, 首条目名称)
    async fn resolve_share(
        &self,
        url: &str,
    ) -> std::result::Result<(Vec<String>, Vec<String>, String, String, String), TransferError>
    {
        if !url.contains("/s/") {
            return Err(TransferError::Format);
        }
        let pwd_id = url
            .rsplit("/s/")
            .next()
            .unwrap_or("")
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or("")
            .to_string();
        if pwd_id.is_empty() {
            return Err(TransferError::Format);
        }
        let passcode = Regex::new(r"[?&]pwd=([a-zA-Z0-9]+)")
            .unwrap()
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        // 分享 ID + 提取码换取会话令牌
        let token_url = format!("{}/1/clouddrive/share/sharepage/token", self.api_base);
        let token_body = serde_json::json!({"pwd_id": pwd_id, "passcode": passcode});
        let env = self
            .post_json(&token_url, &token_body)
            .await
            .map_err(|e| {
                warn!("夸克 token 请求失败: {}", e);
                TransferError::Unknown("token 请求失败".to_string())
            })?;
        let stoken = match env.data_str("stoken") {
            Some(s) if !s.is_empty() => s,
            _ => return Err(TransferError::CodeInvalid),
        };

        // 拉取分享首页内容（最多 50 条）
        let detail_url = format!("{}/1/clouddrive/share/sharepage/detail", self.api_base);
        let resp = self
            .client
            .get(&detail_url)
            .query(&self.anti_replay_params())
            .query(&[
                ("pwd_id", pwd_id.as_str()),
                ("stoken", stoken.as_str()),
                ("pdir_fid", "0"),
                ("_page", "1"),
                ("_size", "50"),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("夸克分享详情请求失败: {}", e);
                TransferError::Unknown("获取分享详情失败".to_string())
            })?;
        let env: QuarkEnvelope = resp
            .json()
            .await
            .map_err(|_| TransferError::Unknown("获取分享详情失败".to_string()))?;

        let entries: Vec<ShareEntry> = env
            .data_list()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if entries.is_empty() {
            return Err(TransferError::EmptyShare);
        }

        let fids = entries.iter().map(|e| e.fid.clone()).collect();
        let tokens = entries.iter().map(|e| e.share_fid_token.clone()).collect();
        let first_name = entries[0].file_name.clone();
        Ok((fids, tokens, pwd_id, stoken, first_name))
    }

    /// 创建公开分享并取回分享链接，任一步失败返回软失败说明
    async fn create_share(
        &self,
        fid: &str,
        title: &str,
    ) -> std::result::Result<String, String> {
        let share_url = format!("{}/1/clouddrive/share", self.api_base);
        let share_body = serde_json::json!({
            "fid_list": [fid],
            "title": title,
            "url_type": 1,
            "expired_type": 1,
        });
        let env = match self.post_json(&share_url, &share_body).await {
            Ok(env) => env,
            Err(_) => return Err("✅ 已存入网盘（分享创建异常）".to_string()),
        };
        if !env.is_ok() {
            return Err(format!("✅ 已存入网盘（分享被拦截: {}）", env.message()));
        }
        let share_task_id = match env.data_str("task_id") {
            Some(id) => id,
            None => return Err("✅ 已存入网盘（分享创建异常）".to_string()),
        };

        tokio::time::sleep(Duration::from_millis(500)).await;

        // 分享也是异步任务，查询任务拿 share_id，再换取链接
        let share_id = match self.task_detail(&share_task_id, Some(0)).await {
            Ok(detail) => match detail["share_id"].as_str() {
                Some(id) => id.to_string(),
                None => return Err("✅ 已存入网盘（分享创建异常）".to_string()),
            },
            Err(_) => return Err("✅ 已存入网盘（分享创建异常）".to_string()),
        };

        let pwd_url = format!("{}/1/clouddrive/share/password", self.api_base);
        let pwd_body = serde_json::json!({"share_id": share_id});
        match self.post_json(&pwd_url, &pwd_body).await {
            Ok(env) => match env.data_str("share_url") {
                Some(link) => Ok(link),
                None => Err("✅ 已存入网盘（分享创建异常）".to_string()),
            },
            Err(_) => Err("✅ 已存入网盘（分享创建异常）".to_string()),
        }
    }

    /// 查询异步任务详情
    async fn task_detail(&self, task_id: &str, retry_index: Option<u32>) -> Result<serde_json::Value> {
        let url = format!("{}/1/clouddrive/task", self.api_base);
        let mut req = self
            .client
            .get(&url)
            .query(&self.anti_replay_params())
            .query(&[("task_id", task_id)]);
        if let Some(idx) = retry_index {
            req = req.query(&[("retry_index", idx.to_string())]);
        }
        let resp = req.send().await.context("任务状态请求失败")?;
        let env: QuarkEnvelope = resp.json().await.context("任务状态响应解析失败")?;
        Ok(env.data.unwrap_or_default())
    }

    /// 列出目录内容
    async fn list_folder(
        &self,
        pdir_fid: &str,
        size: u32,
        sort: &str,
    ) -> Result<Vec<FileEntry>> {
        let url = format!("{}/1/clouddrive/file/sort", self.api_base);
        let size_str = size.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&self.anti_replay_params())
            .query(&[
                ("pdir_fid", pdir_fid),
                ("_page", "1"),
                ("_size", size_str.as_str()),
                ("_fetch_total", "false"),
                ("_sort", sort),
            ])
            .send()
            .await
            .context("目录列表请求失败")?;
        let env: QuarkEnvelope = resp.json().await.context("目录列表响应解析失败")?;
        if !env.is_ok() {
            anyhow::bail!("目录列表返回错误: {}", env.message());
        }
        Ok(env
            .data_list()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    /// 创建目录，返回新目录 fid
    async fn mkdir(&self, name: &str, pdir_fid: &str) -> Result<String> {
        let url = format!("{}/1/clouddrive/file/mkdir", self.api_base);
        let body = serde_json::json!({
            "file_name": name,
            "pdir_fid": pdir_fid,
            "dir_init_lock": false,
        });
        let env = self.post_json(&url, &body).await?;
        if !env.is_ok() {
            anyhow::bail!("创建目录失败: {}", env.message());
        }
        env.data_str("fid").context("创建目录响应缺少 fid")
    }

    /// 发送带防重放参数的 JSON POST
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<QuarkEnvelope> {
        let resp = self
            .client
            .post(url)
            .query(&self.anti_replay_params())
            .json(body)
            .send()
            .await
            .with_context(|| format!("请求失败: {}", url))?;
        resp.json().await.context("响应解析失败")
    }
}
