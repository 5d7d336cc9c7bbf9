//! 网盘客户端协议级集成测试
//!
//! 用 wiremock 模拟两家网盘的私有接口，逐步校验转存协议：
//! 解析分享、转存、定位副本、重新分享，以及软/硬失败分层和植入缓存复用。

use link_changer_rust::transfer::{TransferError, TransferOutcome};
use link_changer_rust::{BaiduClient, QuarkClient};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============================================
// 夸克
// ============================================

async fn quark_client(server: &MockServer) -> QuarkClient {
    QuarkClient::with_bases("cookie=test", &server.uri(), &server.uri(), &server.uri()).unwrap()
}

/// 挂载一条成功转存所需的全部夸克接口
async fn mount_quark_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"stoken": "st-1"}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/share/sharepage/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": {"list": [{"fid": "f1", "share_fid_token": "t1", "file_name": "文件A"}]}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"task_id": "task-1"}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/task"))
        .and(query_param("task_id", "task-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"status": 2}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/file/sort"))
        .and(query_param("pdir_fid", "root1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": {"list": [{"fid": "newfid", "file_name": "文件A", "dir": false}]}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"task_id": "task-share"}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/task"))
        .and(query_param("task_id", "task-share"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"share_id": "sh-9"}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"share_url": "https://pan.quark.cn/s/newlink"}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_quark_full_success() {
    let server = MockServer::start().await;
    mount_quark_success(&server).await;

    let mut client = quark_client(&server).await;
    let outcome = client
        .process_url("https://pan.quark.cn/s/abc123?pwd=xyz9", "root1", false)
        .await;

    match outcome {
        TransferOutcome::Success {
            share_url,
            resource_id,
        } => {
            assert_eq!(share_url, "https://pan.quark.cn/s/newlink");
            assert_eq!(resource_id, "newfid");
        }
        other => panic!("应当成功，实际: {:?}", other),
    }
}

#[tokio::test]
async fn test_quark_malformed_url_fails_fast() {
    let server = MockServer::start().await;
    let mut client = quark_client(&server).await;

    let outcome = client
        .process_url("https://pan.quark.cn/x/abc123", "root1", false)
        .await;
    assert_eq!(outcome, TransferOutcome::Failed(TransferError::Format));
}

#[tokio::test]
async fn test_quark_invalid_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 41008, "message": "提取码错误"
        })))
        .mount(&server)
        .await;

    let mut client = quark_client(&server).await;
    let outcome = client
        .process_url("https://pan.quark.cn/s/abc123?pwd=bad1", "root1", false)
        .await;
    assert_eq!(outcome, TransferOutcome::Failed(TransferError::CodeInvalid));
}

#[tokio::test]
async fn test_quark_empty_share() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"stoken": "st-1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/share/sharepage/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"list": []}
        })))
        .mount(&server)
        .await;

    let mut client = quark_client(&server).await;
    let outcome = client
        .process_url("https://pan.quark.cn/s/abc123", "root1", false)
        .await;
    assert_eq!(outcome, TransferOutcome::Failed(TransferError::EmptyShare));
}

#[tokio::test]
async fn test_quark_transfer_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"stoken": "st-1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/share/sharepage/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": {"list": [{"fid": "f1", "share_fid_token": "t1", "file_name": "文件A"}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 32003, "message": "容量不足"
        })))
        .mount(&server)
        .await;

    let mut client = quark_client(&server).await;
    let outcome = client
        .process_url("https://pan.quark.cn/s/abc123", "root1", false)
        .await;
    assert_eq!(
        outcome,
        TransferOutcome::Failed(TransferError::Transfer("容量不足".to_string()))
    );
}

#[tokio::test]
async fn test_quark_locate_failure_is_soft() {
    let server = MockServer::start().await;
    // 目标目录列表为空，副本定位失败 -> 软失败，不产生新链接
    mount_quark_success_without_locate(&server).await;

    let mut client = quark_client(&server).await;
    let outcome = client
        .process_url("https://pan.quark.cn/s/abc123", "root1", false)
        .await;
    match outcome {
        TransferOutcome::Saved { detail } => {
            assert!(detail.contains("已存入网盘"), "软失败应带已存入说明: {}", detail);
        }
        other => panic!("应当是软失败，实际: {:?}", other),
    }
}

/// 与成功场景相同，但目标目录列表为空
async fn mount_quark_success_without_locate(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"stoken": "st-1"}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/share/sharepage/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": {"list": [{"fid": "f1", "share_fid_token": "t1", "file_name": "文件A"}]}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"task_id": "task-1"}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"status": 2}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/file/sort"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"list": []}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_quark_inject_cache_resolves_share_only_once() {
    let server = MockServer::start().await;

    // 解析类接口只允许被调用一次，转存接口每次植入都会调用
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"stoken": "st-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/clouddrive/share/sharepage/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": {"list": [{"fid": "f1", "share_fid_token": "t1", "file_name": "宣传图.jpg"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/clouddrive/share/sharepage/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0, "data": {"task_id": "task-1"}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = quark_client(&server).await;
    let first = client
        .process_url("https://pan.quark.cn/s/inject1", "dir-a", true)
        .await;
    let second = client
        .process_url("https://pan.quark.cn/s/inject1", "dir-b", true)
        .await;

    assert_eq!(first, TransferOutcome::Injected);
    assert_eq!(second, TransferOutcome::Injected);
}

// ============================================
// 百度
// ============================================

const BAIDU_SHARE_PAGE: &str =
    r#"<script>locals.mset({"shareid":123456,"share_uk":"778899","fs_id":111222,"isdir":1,});</script>"#;

async fn baidu_client(server: &MockServer) -> BaiduClient {
    let mut client = BaiduClient::with_base("BDUSS=test", &server.uri()).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/gettemplatevariable"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errno": 0, "result": {"bdstoken": "bd-1"}
        })))
        .mount(server)
        .await;
    assert!(client.init_token().await);
    client
}

/// 记录 create_dir 提交的目录名，之后目录列表按记录的名字回放。
/// 子目录带随机后缀，Mock 无法提前写死。
#[derive(Clone)]
struct RecordedDirList {
    folder: Arc<Mutex<Option<String>>>,
}

struct RecordCreate {
    folder: Arc<Mutex<Option<String>>>,
}

impl Respond for RecordCreate {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        for pair in body.split('&') {
            if let Some(value) = pair.strip_prefix("path=") {
                if let Ok(decoded) = urlencoding::decode(value) {
                    let name = decoded.rsplit('/').next().unwrap_or("").to_string();
                    *self.folder.lock().unwrap() = Some(name);
                }
            }
        }
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": 0}))
    }
}

impl Respond for RecordedDirList {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let name = self.folder.lock().unwrap().clone().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errno": 0,
            "list": [{"server_filename": name, "fs_id": 998877, "isdir": 1}]
        }))
    }
}

#[tokio::test]
async fn test_baidu_full_success() {
    let server = MockServer::start().await;
    let folder = Arc::new(Mutex::new(None));

    Mock::given(method("GET"))
        .and(path("/s/1abcDEFg"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BAIDU_SHARE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/create"))
        .respond_with(RecordCreate {
            folder: folder.clone(),
        })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/transfer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": 0})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/list"))
        .respond_with(RecordedDirList { folder })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/set"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errno": 0, "link": "https://pan.baidu.com/s/1newlink"
        })))
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let outcome = client
        .process_url(
            "https://pan.baidu.com/s/1abcDEFg",
            "",
            "测试资源",
            "/我的资源/LinkChanger",
            false,
        )
        .await;

    match outcome {
        TransferOutcome::Success {
            share_url,
            resource_id,
        } => {
            assert!(
                share_url.starts_with("https://pan.baidu.com/s/1newlink?pwd="),
                "分享链接应带新密码: {}",
                share_url
            );
            assert_eq!(share_url.len(), "https://pan.baidu.com/s/1newlink?pwd=".len() + 4);
            assert!(resource_id.starts_with("/我的资源/LinkChanger/测试资源_"));
        }
        other => panic!("应当成功，实际: {:?}", other),
    }
}

#[tokio::test]
async fn test_baidu_wrong_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/share/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": -9})))
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let outcome = client
        .process_url(
            "https://pan.baidu.com/s/1abcDEFg",
            "bad1",
            "名字",
            "/root",
            false,
        )
        .await;
    assert_eq!(outcome, TransferOutcome::Failed(TransferError::CodeInvalid));
}

#[tokio::test]
async fn test_baidu_page_without_identifiers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/1abcDEFg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>登录后查看</html>"))
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let outcome = client
        .process_url("https://pan.baidu.com/s/1abcDEFg", "", "名字", "/root", false)
        .await;
    assert_eq!(outcome, TransferOutcome::Failed(TransferError::PageParse));
}

#[tokio::test]
async fn test_baidu_page_without_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/1abcDEFg"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"shareid":123456,"share_uk":"778899","other":1,}"#,
        ))
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let outcome = client
        .process_url("https://pan.baidu.com/s/1abcDEFg", "", "名字", "/root", false)
        .await;
    assert_eq!(outcome, TransferOutcome::Failed(TransferError::EmptyShare));
}

#[tokio::test]
async fn test_baidu_transfer_error_codes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/1abcDEFg"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BAIDU_SHARE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": 0})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/transfer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": -10})))
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let outcome = client
        .process_url("https://pan.baidu.com/s/1abcDEFg", "", "名字", "/root", false)
        .await;
    assert_eq!(
        outcome,
        TransferOutcome::Failed(TransferError::Transfer("容量不足或文件数超限".to_string()))
    );
}

#[tokio::test]
async fn test_baidu_locate_failure_is_soft() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/1abcDEFg"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BAIDU_SHARE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": 0})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/transfer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": 0})))
        .mount(&server)
        .await;
    // 父目录里找不到刚建的子目录
    Mock::given(method("GET"))
        .and(path("/api/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errno": 0, "list": []
        })))
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let outcome = client
        .process_url("https://pan.baidu.com/s/1abcDEFg", "", "名字", "/root", false)
        .await;
    match outcome {
        TransferOutcome::Saved { detail } => assert!(detail.contains("已存入网盘")),
        other => panic!("应当是软失败，实际: {:?}", other),
    }
}

#[tokio::test]
async fn test_baidu_inject_cache_resolves_share_only_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/1inject"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BAIDU_SHARE_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/transfer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": 0})))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let first = client
        .process_url("https://pan.baidu.com/s/1inject", "", "", "/dir-a", true)
        .await;
    let second = client
        .process_url("https://pan.baidu.com/s/1inject", "", "", "/dir-b", true)
        .await;

    assert_eq!(first, TransferOutcome::Injected);
    assert_eq!(second, TransferOutcome::Injected);
}

#[tokio::test]
async fn test_baidu_inject_already_exists_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/1inject"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BAIDU_SHARE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/transfer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"errno": 12})))
        .mount(&server)
        .await;

    let mut client = baidu_client(&server).await;
    let outcome = client
        .process_url("https://pan.baidu.com/s/1inject", "", "", "/dir-a", true)
        .await;
    assert_eq!(outcome, TransferOutcome::Injected);
}
