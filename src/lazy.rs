//! # 惰性缓存的异步工厂
//!
//! 把一个无参异步工厂包装成"进程级单例"：第一次调用启动工厂并保存进行中的 future，
//! 在它完成前到达的所有调用都等待同一个共享 future，因此工厂最多只会并发执行一次。
//! 工厂失败时会先清空缓存槽再把错误交给调用方，下一次调用从头重试。

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};

use crate::exception::Exception;

type Factory<T> = dyn Fn() -> BoxFuture<'static, Result<T, Exception>> + Send + Sync;
type Pending<T> = Shared<BoxFuture<'static, Result<Arc<T>, Exception>>>;

pub struct LazyCached<T> {
    name: &'static str,
    factory: Box<Factory<T>>,
    /// (尝试序号, 进行中或已完成的 future)
    slot: Mutex<Option<(u64, Pending<T>)>>,
    attempts: Mutex<u64>,
}

impl<T> LazyCached<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T, Exception>> + Send + Sync + 'static,
    {
        Self {
            name,
            factory: Box::new(factory),
            slot: Mutex::new(None),
            attempts: Mutex::new(0),
        }
    }

    pub async fn get(&self) -> Result<Arc<T>, Exception> {
        let (attempt, pending) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some((attempt, pending)) => (*attempt, pending.clone()),
                None => {
                    let attempt = {
                        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
                        *attempts += 1;
                        *attempts
                    };
                    debug!("{}：开始第{}次构造", self.name, attempt);
                    let pending = (self.factory)().map(|result| result.map(Arc::new)).boxed().shared();
                    *slot = Some((attempt, pending.clone()));
                    (attempt, pending)
                }
            }
        };

        let result = pending.await;
        if let Err(e) = &result {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            // 只清理本次失败的尝试，不能误删其后已经开始的新尝试
            if matches!(slot.as_ref(), Some((current, _)) if *current == attempt) {
                warn!("{}：第{}次构造失败，下次调用将重试：{}", self.name, attempt, e);
                *slot = None;
            }
        }
        result
    }

    /// 是否已经缓存了一个构造成功的值。
    pub fn is_ready(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(slot.as_ref().and_then(|(_, pending)| pending.peek()), Some(Ok(_)))
    }

    /// 工厂被启动的累计次数。
    pub fn attempts(&self) -> u64 {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
