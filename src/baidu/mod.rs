// 百度网盘客户端模块

pub mod client;
pub mod types;

pub use client::BaiduClient;
pub use types::{BaiduFileItem, BaiduInjectCache, DirListResponse};
