//! # 渲染钩子
//!
//! 三个固定的扩展点，按注册顺序依次等待执行，回调通过可变引用观察并修改上下文：
//!
//! - `app_rendered`：渲染完成之后、组装响应之前
//! - `render_html`：文档片段收集完成之后
//! - `render_island`：组件岛信封构建完成之后

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::{
    context::{IslandContext, SsrContext},
    document::HtmlDocumentContext,
    exception::Exception,
    island::IslandResponse,
    request::Request,
};

#[async_trait]
pub trait RenderHook: Send + Sync {
    async fn app_rendered(&self, _ctx: &mut SsrContext<'_>) -> Result<(), Exception> {
        Ok(())
    }

    async fn render_html(&self, _html: &mut HtmlDocumentContext, _request: &Request) -> Result<(), Exception> {
        Ok(())
    }

    async fn render_island(&self, _island: &mut IslandResponse, _context: &IslandContext) -> Result<(), Exception> {
        Ok(())
    }
}

/// 有序的钩子注册表。任一回调失败即中止并返回该错误。
#[derive(Default, Clone)]
pub struct Hooks {
    hooks: Vec<Arc<dyn RenderHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register(&mut self, hook: Arc<dyn RenderHook>) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn app_rendered(&self, ctx: &mut SsrContext<'_>) -> Result<(), Exception> {
        for hook in &self.hooks {
            hook.app_rendered(ctx).await?;
        }
        Ok(())
    }

    pub async fn render_html(&self, html: &mut HtmlDocumentContext, request: &Request) -> Result<(), Exception> {
        for hook in &self.hooks {
            hook.render_html(html, request).await?;
        }
        Ok(())
    }

    pub async fn render_island(&self, island: &mut IslandResponse, context: &IslandContext) -> Result<(), Exception> {
        debug!("执行{}个render_island钩子", self.hooks.len());
        for hook in &self.hooks {
            hook.render_island(island, context).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::HttpRequestMethod;
    use std::sync::Mutex;

    struct Tagger {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl RenderHook for Tagger {
        async fn render_html(&self, html: &mut HtmlDocumentContext, _request: &Request) -> Result<(), Exception> {
            self.log.lock().unwrap().push(self.name);
            html.head.push(format!("<meta name=\"{}\">", self.name));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl RenderHook for Failing {
        async fn render_html(&self, _html: &mut HtmlDocumentContext, _request: &Request) -> Result<(), Exception> {
            Err(Exception::Hook("rejected".to_string()))
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_and_mutate() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut hooks = Hooks::new();
        hooks
            .register(Arc::new(Tagger { name: "a", log: Arc::clone(&log) }))
            .register(Arc::new(Tagger { name: "b", log: Arc::clone(&log) }));

        let mut html = HtmlDocumentContext::default();
        let request = Request::new(HttpRequestMethod::Get, "/");
        hooks.render_html(&mut html, &request).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(html.head, vec![r#"<meta name="a">"#, r#"<meta name="b">"#]);
    }

    #[tokio::test]
    async fn test_hook_failure_stops_chain() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut hooks = Hooks::new();
        hooks
            .register(Arc::new(Failing))
            .register(Arc::new(Tagger { name: "never", log: Arc::clone(&log) }));

        let mut html = HtmlDocumentContext::default();
        let request = Request::new(HttpRequestMethod::Get, "/");
        let result = hooks.render_html(&mut html, &request).await;

        assert_eq!(result, Err(Exception::Hook("rejected".to_string())));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_methods_are_noops() {
        struct Noop;
        #[async_trait]
        impl RenderHook for Noop {}

        let mut hooks = Hooks::new();
        hooks.register(Arc::new(Noop));
        let mut html = HtmlDocumentContext::default();
        let request = Request::new(HttpRequestMethod::Get, "/");

        hooks.render_html(&mut html, &request).await.unwrap();
        assert_eq!(html, HtmlDocumentContext::default());
    }
}
