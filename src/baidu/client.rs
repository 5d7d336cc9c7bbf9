// 百度网盘客户端实现
//
// 基于网页端接口的转存客户端：校验提取码、抓取分享页内嵌标识、
// 转存到指定路径、重新建立带密码的公开分享。
// Cookie 以请求头字符串形式手动管理（校验提取码后需要合并 BDCLND）。

use crate::baidu::types::{
    BaiduInjectCache, DirListResponse, ShareSetResponse, TemplateVariableResponse,
    TransferResponse, VerifyResponse,
};
use crate::transfer::{TransferError, TransferOutcome};
use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_API_BASE: &str = "https://pan.baidu.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// 转存接口的单独超时，大分享的转存会卡较久
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(20);

/// 百度网盘客户端
///
/// 每次转链任务创建一个实例，持有 Cookie、bdstoken 与植入缓存。
pub struct BaiduClient {
    client: Client,
    api_base: String,
    cookie: String,
    bdstoken: String,
    inject_cache: Option<BaiduInjectCache>,
}

impl BaiduClient {
    /// 创建客户端（线上域名）
    pub fn new(cookie: &str) -> Result<Self> {
        Self::with_base(cookie, DEFAULT_API_BASE)
    }

    /// 创建客户端并指定接口域名（测试时指向 mock 服务器）
    pub fn with_base(cookie: &str, api_base: &str) -> Result<Self> {
        // 粘贴的 Cookie 常带换行和空格，先压掉
        let cookie: String = cookie.split_whitespace().collect();

        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(45))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("创建百度 HTTP 客户端失败")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            cookie,
            bdstoken: String::new(),
            inject_cache: None,
        })
    }

    /// 构造带认证头的请求
    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("User-Agent", USER_AGENT)
            .header("Referer", "https://pan.baidu.com")
            .header("Cookie", &self.cookie)
    }

    /// 获取 bdstoken，作为登录校验（最多尝试 2 次）
    pub async fn init_token(&mut self) -> bool {
        for attempt in 1..=2 {
            match self.fetch_bdstoken().await {
                Ok(token) => {
                    info!("百度登录有效，bdstoken 已获取");
                    self.bdstoken = token;
                    return true;
                }
                Err(e) => warn!("获取 bdstoken 失败（第 {} 次）: {}", attempt, e),
            }
        }
        false
    }

    async fn fetch_bdstoken(&self) -> Result<String> {
        let url = format!("{}/api/gettemplatevariable", self.api_base);
        let resp = self
            .request(self.client.get(&url))
            .query(&[("fields", r#"["bdstoken"]"#)])
            .send()
            .await
            .context("bdstoken 请求失败")?;
        let body: TemplateVariableResponse =
            resp.json().await.context("bdstoken 响应解析失败")?;
        if body.errno != 0 {
            anyhow::bail!("bdstoken 接口返回 errno={}", body.errno);
        }
        let token = body.result.map(|r| r.bdstoken).unwrap_or_default();
        if token.is_empty() {
            anyhow::bail!("bdstoken 响应缺少 result.bdstoken");
        }
        Ok(token)
    }

    /// 把校验提取码后下发的 BDCLND 合并进 Cookie 头
    fn update_cookie_bdclnd(&mut self, bdclnd: &str) {
        let mut pairs: Vec<(String, String)> = self
            .cookie
            .split(';')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.to_string()))
            .collect();
        if let Some(pair) = pairs.iter_mut().find(|(k, _)| k == "BDCLND") {
            pair.1 = bdclnd.to_string();
        } else {
            pairs.push(("BDCLND".to_string(), bdclnd.to_string()));
        }
        self.cookie = pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";");
    }

    /// 检查保存目录是否存在
    pub async fn check_dir_exists(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let url = format!("{}/api/list", self.api_base);
        let resp = self
            .request(self.client.get(&url))
            .query(&[
                ("dir", path.as_str()),
                ("bdstoken", self.bdstoken.as_str()),
                ("start", "0"),
                ("limit", "1"),
            ])
            .send()
            .await;
        match resp {
            Ok(r) => match r.json::<DirListResponse>().await {
                Ok(body) => body.errno == 0,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// 创建目录（幂等，已存在或失败都不致命）
    pub async fn create_dir(&self, path: &str) {
        let path = normalize_path(path);
        let url = format!("{}/api/create", self.api_base);
        let result = self
            .request(self.client.post(&url))
            .query(&[("a", "commit"), ("bdstoken", self.bdstoken.as_str())])
            .form(&[
                ("path", path.as_str()),
                ("isdir", "1"),
                ("block_list", "[]"),
            ])
            .send()
            .await;
        if let Err(e) = result {
            debug!("创建目录请求失败（忽略）: {}", e);
        }
    }

    /// 处理一条分享链接
    ///
    /// 非植入模式：校验提取码 -> 抓取分享页标识 -> 建子目录（目录名 +
    /// 随机后缀防撞名）-> 转存 -> 按目录名定位 -> 建带密码的新分享。
    /// 植入模式在转存成功后立即返回，解析结果写入缓存供后续复用。
    pub async fn process_url(
        &mut self,
        url: &str,
        password: &str,
        folder_name: &str,
        root_path: &str,
        is_inject: bool,
    ) -> TransferOutcome {
        let clean_url = url.split('?').next().unwrap_or(url);

        // 解析分享页，植入模式优先取缓存
        let (shareid, uk, fsid_list) = if is_inject && self.inject_cache.is_some() {
            let cache = self.inject_cache.clone().unwrap();
            debug!("复用植入缓存: shareid={}", cache.shareid);
            (cache.shareid, cache.uk, cache.fsid_list)
        } else {
            match self.resolve_share(clean_url, password).await {
                Ok(resolved) => {
                    if is_inject {
                        self.inject_cache = Some(BaiduInjectCache {
                            shareid: resolved.0.clone(),
                            uk: resolved.1.clone(),
                            fsid_list: resolved.2.clone(),
                        });
                    }
                    resolved
                }
                Err(e) => return TransferOutcome::Failed(e),
            }
        };

        // 目标路径：植入直接进根目录，正常转存建独立子目录
        let (save_path, final_folder) = if is_inject {
            (root_path.to_string(), String::new())
        } else {
            let folder = format!("{}_{}", folder_name, random_token(4));
            let path = format!("{}/{}", root_path, folder);
            self.create_dir(&path).await;
            (path, folder)
        };

        // 转存，大文件可能卡住，单独给 20 秒超时
        let transfer_url = format!("{}/share/transfer", self.api_base);
        let resp = self
            .request(self.client.post(&transfer_url))
            .query(&[
                ("shareid", shareid.as_str()),
                ("from", uk.as_str()),
                ("bdstoken", self.bdstoken.as_str()),
            ])
            .form(&[
                ("fsidlist", fsid_list.as_str()),
                ("path", save_path.as_str()),
            ])
            .timeout(TRANSFER_TIMEOUT)
            .send()
            .await;
        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return TransferOutcome::Failed(TransferError::Timeout),
            Err(e) => {
                warn!("百度转存请求失败: {}", e);
                return TransferOutcome::Failed(TransferError::Unknown(
                    "转存请求失败".to_string(),
                ));
            }
        };
        let body: TransferResponse = match resp.json().await {
            Ok(b) => b,
            Err(_) => {
                return TransferOutcome::Failed(TransferError::Unknown(
                    "转存响应解析失败".to_string(),
                ))
            }
        };

        match body.errno {
            0 => {}
            // 已存在：植入视为成功，正常转存视为失败
            12 => {
                if is_inject {
                    return TransferOutcome::Injected;
                }
                return TransferOutcome::Failed(TransferError::Transfer(
                    "文件已存在".to_string(),
                ));
            }
            -10 => {
                return TransferOutcome::Failed(TransferError::Transfer(
                    "容量不足或文件数超限".to_string(),
                ))
            }
            -33 => {
                return TransferOutcome::Failed(TransferError::Transfer(
                    "文件数超出限制(非会员500)".to_string(),
                ))
            }
            errno => {
                return TransferOutcome::Failed(TransferError::Transfer(format!(
                    "错误码 {}",
                    errno
                )))
            }
        }

        if is_inject {
            return TransferOutcome::Injected;
        }

        // 在父目录按名字定位新建的子目录
        let target_fsid = match self.list_dir(root_path).await {
            Ok(items) => items
                .iter()
                .find(|i| i.server_filename == final_folder)
                .map(|i| i.fs_id),
            Err(e) => {
                warn!("定位转存目录失败: {}", e);
                None
            }
        };
        let target_fsid = match target_fsid {
            Some(id) => id,
            None => {
                return TransferOutcome::Saved {
                    detail: "✅ 已存入网盘（获取目录失败）".to_string(),
                }
            }
        };

        // 为子目录建新分享，提取码随机生成
        let new_pwd = random_token(4);
        let fid_list = format!("[{}]", target_fsid);
        let share_url = format!("{}/share/set", self.api_base);
        let resp = self
            .request(self.client.post(&share_url))
            .query(&[
                ("bdstoken", self.bdstoken.as_str()),
                ("channel", "chunlei"),
                ("clienttype", "0"),
                ("web", "1"),
            ])
            .form(&[
                ("period", "0"),
                ("pwd", new_pwd.as_str()),
                ("fid_list", fid_list.as_str()),
                ("schannel", "4"),
            ])
            .send()
            .await;
        let body: ShareSetResponse = match resp {
            Ok(r) => match r.json().await {
                Ok(b) => b,
                Err(_) => {
                    return TransferOutcome::Saved {
                        detail: "✅ 已存入网盘（分享失败）".to_string(),
                    }
                }
            },
            Err(_) => {
                return TransferOutcome::Saved {
                    detail: "✅ 已存入网盘（分享失败）".to_string(),
                }
            }
        };
        if body.errno == 0 && !body.link.is_empty() {
            TransferOutcome::Success {
                share_url: format!("{}?pwd={}", body.link, new_pwd),
                resource_id: save_path,
            }
        } else {
            TransferOutcome::Saved {
                detail: "✅ 已存入网盘（分享失败）".to_string(),
            }
        }
    }

    /// 校验提取码并抓取分享页内嵌标识
    ///
    /// 返回 (shareid, uk, fsidlist 字符串)
    async fn resolve_share(
        &mut self,
        clean_url: &str,
        password: &str,
    ) -> std::result::Result<(String, String, String), TransferError> {
        if !password.is_empty() {
            let surl_re = Regex::new(r"(?:surl=|/s/1|/s/)([\w\-]+)").unwrap();
            let surl = surl_re
                .captures(clean_url)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or(TransferError::Format)?;

            let verify_url = format!("{}/share/verify", self.api_base);
            let timestamp = chrono::Utc::now().timestamp_millis().to_string();
            let resp = self
                .request(self.client.post(&verify_url))
                .query(&[
                    ("surl", surl.as_str()),
                    ("t", timestamp.as_str()),
                    ("bdstoken", self.bdstoken.as_str()),
                    ("channel", "chunlei"),
                    ("web", "1"),
                    ("clienttype", "0"),
                ])
                .form(&[("pwd", password), ("vcode", ""), ("vcode_str", "")])
                .send()
                .await
                .map_err(|e| {
                    warn!("提取码校验请求失败: {}", e);
                    TransferError::Unknown("提取码校验请求失败".to_string())
                })?;
            let body: VerifyResponse = resp
                .json()
                .await
                .map_err(|_| TransferError::Unknown("提取码校验响应解析失败".to_string()))?;
            if body.errno != 0 {
                return Err(TransferError::CodeInvalid);
            }
            self.update_cookie_bdclnd(&body.randsk);
        }

        // 分享页是 HTML/JSON 混合体，直接正则抠内嵌字段
        let page_url = self.page_url(clean_url);
        let content = self
            .request(self.client.get(&page_url))
            .send()
            .await
            .map_err(|e| {
                warn!("分享页请求失败: {}", e);
                TransferError::Unknown("分享页请求失败".to_string())
            })?
            .text()
            .await
            .map_err(|_| TransferError::Unknown("分享页读取失败".to_string()))?;

        let shareid = Regex::new(r#""shareid":(\d+?),"#)
            .unwrap()
            .captures(&content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(TransferError::PageParse)?;
        let uk = Regex::new(r#""share_uk":"(\d+?)","#)
            .unwrap()
            .captures(&content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(TransferError::PageParse)?;

        let fs_id_re = Regex::new(r#""fs_id":(\d+?),"#).unwrap();
        let fs_ids: Vec<&str> = fs_id_re
            .captures_iter(&content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect();
        if fs_ids.is_empty() {
            return Err(TransferError::EmptyShare);
        }
        let fsid_list = format!("[{}]", fs_ids.join(","));

        debug!("分享页解析成功: shareid={}, uk={}", shareid, uk);
        Ok((shareid, uk, fsid_list))
    }

    /// 把分享链接的域名改写到配置的接口域名上
    fn page_url(&self, clean_url: &str) -> String {
        match clean_url.find("/s/") {
            Some(idx) => format!("{}{}", self.api_base, &clean_url[idx..]),
            None => clean_url.to_string(),
        }
    }

    /// 列出目录内容
    async fn list_dir(&self, path: &str) -> Result<Vec<crate::baidu::types::BaiduFileItem>> {
        let url = format!("{}/api/list", self.api_base);
        let resp = self
            .request(self.client.get(&url))
            .query(&[("dir", path), ("bdstoken", self.bdstoken.as_str())])
            .send()
            .await
            .context("目录列表请求失败")?;
        let body: DirListResponse = resp.json().await.context("目录列表响应解析失败")?;
        if body.errno != 0 {
            anyhow::bail!("目录列表返回 errno={}", body.errno);
        }
        Ok(body.list)
    }
}

/// 确保路径以 / 开头
fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// 随机字母数字串（目录后缀、分享密码）
fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
