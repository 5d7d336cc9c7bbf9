// 夸克网盘客户端模块

pub mod client;
pub mod types;

pub use client::QuarkClient;
pub use types::{FileEntry, QuarkEnvelope, QuarkInjectCache, ShareEntry};
