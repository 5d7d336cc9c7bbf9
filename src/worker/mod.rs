// 后台转链执行模块
//
// 一次任务一个 worker：短链还原 -> 扫描 -> 逐提供方批量转存 -> 文本替换，
// 最后无论成败都要把任务置为完成，不允许留下永远 running 的任务。

use crate::baidu::BaiduClient;
use crate::config::{BaiduConfig, NotifyConfig, QuarkConfig};
use crate::job::{JobStore, JobSummary, LogCategory};
use crate::notify;
use crate::quark::QuarkClient;
use crate::resolver;
use crate::scanner::{self, Provider, ShareMatch};
use crate::transfer::TransferOutcome;
use futures::FutureExt;
use rand::Rng;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// 一次转链任务的执行环境
///
/// 客户端实例与植入缓存都在任务内部创建，跨任务不共享；
/// 任务之间唯一共享的是 `JobStore`。
pub struct WorkerContext {
    pub store: Arc<JobStore>,
    pub quark: QuarkConfig,
    pub baidu: BaiduConfig,
    pub notify: NotifyConfig,
}

/// 执行一次转链任务
///
/// 主体逻辑包在 `catch_unwind` 里，即使内部 panic 也会走到
/// `complete` 和结果推送。
pub async fn run_job(ctx: Arc<WorkerContext>, job_id: String, input_text: String) {
    let started = Instant::now();

    let outcome = AssertUnwindSafe(execute(&ctx, &job_id, &input_text))
        .catch_unwind()
        .await;
    let (final_text, success) = match outcome {
        Ok(result) => result,
        Err(_) => {
            error!("任务 {} 执行中发生 panic", job_id);
            ctx.store.append_log(
                &job_id,
                "❌ 任务执行中发生未预期错误，已终止",
                LogCategory::Error,
            );
            (input_text.clone(), 0)
        }
    };

    let total = ctx
        .store
        .get(&job_id)
        .map(|j| j.progress.total)
        .unwrap_or(0);
    let duration = format_duration(started.elapsed());
    ctx.store.complete(
        &job_id,
        final_text,
        JobSummary {
            success,
            total,
            duration: duration.clone(),
        },
    );
    info!("任务 {} 完成: {}/{}, 耗时 {}", job_id, success, total, duration);

    if ctx.notify.has_any() {
        let title = if success > 0 {
            "✅ 转存完成"
        } else {
            "❌ 转存结束(无成功)"
        };
        let body = format!("成功: {}/{} | 耗时: {}", success, total, duration);
        notify::send_all(&ctx.notify, title, &body).await;
    }
}

/// 任务主体，返回 (最终文本, 成功条数)
async fn execute(ctx: &WorkerContext, job_id: &str, input_text: &str) -> (String, usize) {
    let store = &ctx.store;
    store.append_log(job_id, "正在扫描链接...", LogCategory::Info);

    // 先把可能的短链还原成真实网盘链接
    let mut text = resolver::resolve_short_links(input_text).await;

    // 同一链接粘贴多次只处理一次：替换是全文字面替换，一次就覆盖所有出现位置
    let matches = dedup_matches(scanner::scan_links(&text));
    let quark_matches: Vec<ShareMatch> = matches
        .iter()
        .filter(|m| m.provider == Provider::Quark)
        .cloned()
        .collect();
    let baidu_matches: Vec<ShareMatch> = matches
        .iter()
        .filter(|m| m.provider == Provider::Baidu)
        .cloned()
        .collect();
    let total = quark_matches.len() + baidu_matches.len();

    if total == 0 {
        store.append_log(job_id, "未检测到有效网盘链接", LogCategory::Info);
    }
    store.set_progress(job_id, 0, total);

    let mut current = 0usize;
    let mut success = 0usize;

    // 两个提供方严格串行处理：夸克批次全部结束后才轮到百度
    if !quark_matches.is_empty() {
        current = process_quark_batch(
            ctx,
            job_id,
            &quark_matches,
            total,
            current,
            &mut text,
            &mut success,
        )
        .await;
    }
    if !baidu_matches.is_empty() {
        process_baidu_batch(
            ctx,
            job_id,
            &baidu_matches,
            total,
            current,
            &mut text,
            &mut success,
        )
        .await;
    }

    (text, success)
}

/// 处理夸克批次
///
/// 登录或目录解析失败会放弃整个批次；进度仍会推进到批次末尾，
/// 保证任务结束时 current == total。
async fn process_quark_batch(
    ctx: &WorkerContext,
    job_id: &str,
    matches: &[ShareMatch],
    total: usize,
    mut current: usize,
    text: &mut String,
    success: &mut usize,
) -> usize {
    let store = &ctx.store;

    if ctx.quark.cookie.is_empty() {
        store.append_log(job_id, "❌ 夸克：未配置 Cookie，跳过", LogCategory::Error);
        current += matches.len();
        store.set_progress(job_id, current, total);
        return current;
    }

    store.append_log(job_id, "--- ☁️ 开始处理夸克链接 ---", LogCategory::Quark);

    let mut client = match QuarkClient::with_bases(
        &ctx.quark.cookie,
        &ctx.quark.api_base,
        &ctx.quark.save_base,
        &ctx.quark.account_base,
    ) {
        Ok(c) => c,
        Err(e) => {
            store.append_log(
                job_id,
                &format!("❌ 夸克客户端初始化失败: {}", e),
                LogCategory::Error,
            );
            current += matches.len();
            store.set_progress(job_id, current, total);
            return current;
        }
    };

    let t0 = Instant::now();
    let nickname = match client.check_login().await {
        Some(name) => name,
        None => {
            store.append_log(
                job_id,
                &format!("❌ 夸克登录失败，请检查 Cookie ({})", format_elapsed(t0)),
                LogCategory::Error,
            );
            current += matches.len();
            store.set_progress(job_id, current, total);
            return current;
        }
    };
    store.append_log(
        job_id,
        &format!("✅ 夸克登录成功: {} ({})", nickname, format_elapsed(t0)),
        LogCategory::Success,
    );

    let t0 = Instant::now();
    let root_fid = match client.ensure_path(&ctx.quark.save_path).await {
        Ok(fid) => fid,
        Err(e) => {
            store.append_log(
                job_id,
                &format!("❌ 保存目录不可用: {} ({})", e, format_elapsed(t0)),
                LogCategory::Error,
            );
            current += matches.len();
            store.set_progress(job_id, current, total);
            return current;
        }
    };

    for (idx, share) in matches.iter().enumerate() {
        current += 1;
        store.append_log(
            job_id,
            &format!("🔄 [{}/{}] 处理: {}", current, total, share.raw_url),
            LogCategory::Quark,
        );
        store.set_progress(job_id, current, total);

        let task_started = Instant::now();
        let outcome = client.process_url(&share.raw_url, &root_fid, false).await;
        let elapsed = format_elapsed(task_started);

        match outcome {
            TransferOutcome::Success {
                share_url,
                resource_id,
            } => {
                let mut log_msg = format!("✅ 成功 ({})", elapsed);
                if ctx.quark.inject.enabled && !ctx.quark.inject.url.is_empty() {
                    let inject_started = Instant::now();
                    let inject_outcome =
                        client.process_url(&ctx.quark.inject.url, &resource_id, true).await;
                    append_inject_result(&mut log_msg, inject_outcome, inject_started);
                }
                store.append_log(job_id, &log_msg, LogCategory::Success);
                *text = text.replace(&share.raw_url, &share_url);
                *success += 1;
            }
            TransferOutcome::Saved { detail } => {
                store.append_log(
                    job_id,
                    &format!("{} ({})", detail, elapsed),
                    LogCategory::Error,
                );
            }
            TransferOutcome::Failed(e) => {
                store.append_log(job_id, &format!("❌ {} ({})", e, elapsed), LogCategory::Error);
            }
            TransferOutcome::Injected => {
                store.append_log(job_id, "❌ 返回了意外的植入结果", LogCategory::Error);
            }
        }

        if idx + 1 < matches.len() {
            inter_match_delay().await;
        }
    }

    current
}

/// 处理百度批次，结构与夸克批次一致
async fn process_baidu_batch(
    ctx: &WorkerContext,
    job_id: &str,
    matches: &[ShareMatch],
    total: usize,
    mut current: usize,
    text: &mut String,
    success: &mut usize,
) -> usize {
    let store = &ctx.store;

    if ctx.baidu.cookie.is_empty() {
        store.append_log(job_id, "❌ 百度：未配置 Cookie，跳过", LogCategory::Error);
        current += matches.len();
        store.set_progress(job_id, current, total);
        return current;
    }

    store.append_log(job_id, "--- 🐻 开始处理百度链接 ---", LogCategory::Baidu);

    let mut client = match BaiduClient::with_base(&ctx.baidu.cookie, &ctx.baidu.api_base) {
        Ok(c) => c,
        Err(e) => {
            store.append_log(
                job_id,
                &format!("❌ 百度客户端初始化失败: {}", e),
                LogCategory::Error,
            );
            current += matches.len();
            store.set_progress(job_id, current, total);
            return current;
        }
    };

    let t0 = Instant::now();
    if !client.init_token().await {
        store.append_log(
            job_id,
            &format!("❌ 百度登录失败，请检查 Cookie ({})", format_elapsed(t0)),
            LogCategory::Error,
        );
        current += matches.len();
        store.set_progress(job_id, current, total);
        return current;
    }
    store.append_log(
        job_id,
        &format!("✅ 百度登录成功 ({})", format_elapsed(t0)),
        LogCategory::Success,
    );

    if !client.check_dir_exists(&ctx.baidu.save_path).await {
        client.create_dir(&ctx.baidu.save_path).await;
    }

    for (idx, share) in matches.iter().enumerate() {
        current += 1;
        let folder_name = share
            .folder_name
            .clone()
            .unwrap_or_else(|| "Res".to_string());
        store.append_log(
            job_id,
            &format!("🔄 [{}/{}] 处理: {}", current, total, folder_name),
            LogCategory::Baidu,
        );
        store.set_progress(job_id, current, total);

        let password = share.password.clone().unwrap_or_default();
        let task_started = Instant::now();
        let outcome = client
            .process_url(
                &share.raw_url,
                &password,
                &folder_name,
                &ctx.baidu.save_path,
                false,
            )
            .await;
        let elapsed = format_elapsed(task_started);

        match outcome {
            TransferOutcome::Success {
                share_url,
                resource_id,
            } => {
                let mut log_msg = format!("✅ 成功 ({})", elapsed);
                if ctx.baidu.inject.enabled && !ctx.baidu.inject.url.is_empty() {
                    let inject_started = Instant::now();
                    let inject_outcome = client
                        .process_url(
                            &ctx.baidu.inject.url,
                            &ctx.baidu.inject.pwd,
                            "",
                            &resource_id,
                            true,
                        )
                        .await;
                    append_inject_result(&mut log_msg, inject_outcome, inject_started);
                }
                store.append_log(job_id, &log_msg, LogCategory::Success);
                *text = text.replace(&share.raw_url, &share_url);
                *success += 1;
            }
            TransferOutcome::Saved { detail } => {
                store.append_log(
                    job_id,
                    &format!("{} ({})", detail, elapsed),
                    LogCategory::Error,
                );
            }
            TransferOutcome::Failed(e) => {
                store.append_log(job_id, &format!("❌ {} ({})", e, elapsed), LogCategory::Error);
            }
            TransferOutcome::Injected => {
                store.append_log(job_id, "❌ 返回了意外的植入结果", LogCategory::Error);
            }
        }

        if idx + 1 < matches.len() {
            inter_match_delay().await;
        }
    }

    current
}

/// 把植入结果追加到当前这条成功日志上
fn append_inject_result(log_msg: &mut String, outcome: TransferOutcome, started: Instant) {
    match outcome {
        TransferOutcome::Injected => {
            log_msg.push_str(&format!(" + 植入完成 ({})", format_elapsed(started)));
        }
        TransferOutcome::Failed(e) => {
            log_msg.push_str(&format!("（植入失败: {}）", e));
        }
        _ => log_msg.push_str("（植入失败）"),
    }
}

/// 去掉重复的原始链接，保留首次出现的顺序
fn dedup_matches(matches: Vec<ShareMatch>) -> Vec<ShareMatch> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert(m.raw_url.clone()))
        .collect()
}

/// 相邻两条转存之间随机停 2~4 秒，避免触发风控
async fn inter_match_delay() {
    let ms = rand::thread_rng().gen_range(2000..=4000);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// 单步耗时展示
fn format_elapsed(start: Instant) -> String {
    format!("{:.2}s", start.elapsed().as_secs_f64())
}

/// 总耗时展示
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}分{}秒", secs / 60, secs % 60)
    } else {
        format!("{:.1}秒", d.as_secs_f64())
    }
}
