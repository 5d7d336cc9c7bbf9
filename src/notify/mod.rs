// 推送通知模块
//
// 任务结束后向 Bark / PushDeer 推送结果。纯旁路功能：
// 未配置则跳过，投递失败一律吞掉，不影响任务本身。

use crate::config::NotifyConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// 推送请求超时
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Bark 推送图标
const BARK_ICON: &str = "https://cdn-icons-png.flaticon.com/512/2991/2991110.png";

/// 向所有已配置的推送渠道发送通知
pub async fn send_all(config: &NotifyConfig, title: &str, body: &str) {
    let client = match reqwest::Client::builder()
        .timeout(NOTIFY_TIMEOUT)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!("推送客户端创建失败: {}", e);
            return;
        }
    };

    if !config.bark_key.is_empty() {
        let url = format!(
            "{}/{}/{}/{}?icon={}",
            config.bark_base.trim_end_matches('/'),
            config.bark_key,
            urlencoding::encode(title),
            urlencoding::encode(body),
            BARK_ICON,
        );
        match client.get(&url).send().await {
            Ok(_) => debug!("Bark 推送已发送"),
            Err(e) => warn!("Bark 推送失败（忽略）: {}", e),
        }
    }

    if !config.pushdeer_key.is_empty() {
        let url = format!(
            "{}/message/push",
            config.pushdeer_base.trim_end_matches('/')
        );
        let result = client
            .get(&url)
            .query(&[
                ("pushkey", config.pushdeer_key.as_str()),
                ("text", title),
                ("desp", body),
                ("type", "markdown"),
            ])
            .send()
            .await;
        match result {
            Ok(_) => debug!("PushDeer 推送已发送"),
            Err(e) => warn!("PushDeer 推送失败（忽略）: {}", e),
        }
    }
}
