use std::future::Future;
use std::pin::Pin;

use crate::model::ChatMessage;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// 会话历史存储抽象（默认内存实现，可替换为持久化存储）
pub trait SessionStore: Send + Sync {
    fn load<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Option<Vec<ChatMessage>>>;
    fn save<'a>(&'a self, session_id: &'a str, messages: Vec<ChatMessage>) -> BoxFuture<'a, ()>;
}
