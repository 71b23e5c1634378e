use std::sync::{Mutex, PoisonError};

use log::debug;
use lru::LruCache;

use crate::{config::Config, response::RenderResponse};

/// 预渲染期间的 payload 模块缓存，键为页面 URL。
///
/// 进程启动时为空，只在预渲染且开启 payload 抽取时写入，进程退出时随之丢弃。
/// 由处理器持有并注入，测试可以各自构造独立实例。
pub struct PayloadCache {
    cache: Mutex<LruCache<String, RenderResponse>>,
}

impl PayloadCache {
    // 不设上限，预渲染的页面集合是有限的
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::unbounded()),
        }
    }

    /// 只有预渲染且开启 payload 抽取时才需要缓存。
    pub fn for_config(config: &Config) -> Option<Self> {
        match config.payload_extraction() && config.prerender() {
            true => Some(Self::new()),
            false => None,
        }
    }

    // 查询
    pub fn get(&self, url: &str) -> Option<RenderResponse> {
        self.lock().get(url).cloned()
    }

    // 放入，重复写入覆盖旧值
    pub fn insert(&self, url: &str, response: RenderResponse) {
        debug!("缓存payload模块：{}", url);
        self.lock().put(url.to_string(), response);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, RenderResponse>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PayloadCache {
    fn default() -> Self {
        Self::new()
    }
}
