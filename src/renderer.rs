//! # 渲染器缓存
//!
//! SSR 与 SPA 两个渲染器的构造代价都很高（需要加载客户端清单，SSR 还要加载服务端入口），
//! 因此各自由一个 `LazyCached` 持有：进程内只构造一次，构造失败则下次访问时重试。

use async_trait::async_trait;
use futures::future::FutureExt;
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    bundle::{build_assets_url, BundleRenderer, Rendered},
    config::RuntimeConfig,
    context::{Payload, SsrContext},
    entry::{ServerEntry, ServerEntryProvider},
    exception::Exception,
    lazy::LazyCached,
    manifest::ManifestProvider,
};

#[async_trait]
pub trait Renderer: Send + Sync {
    /// `Ok(None)` 表示本次渲染没有产出任何内容。
    async fn render_to_string(&self, ctx: &mut SsrContext<'_>) -> Result<Option<Rendered>, Exception>;
}

/// 服务端渲染器：所有请求共享同一份客户端清单。
pub struct SsrRenderer {
    entry: Arc<dyn ServerEntry>,
    bundle: BundleRenderer,
    mount_id: String,
}

impl SsrRenderer {
    pub async fn build(
        manifest: &dyn ManifestProvider,
        entry: &dyn ServerEntryProvider,
        runtime_config: &RuntimeConfig,
        mount_id: &str,
    ) -> Result<Self, Exception> {
        let manifest = manifest.load().await?.ok_or(Exception::ManifestUnavailable)?;
        let entry = entry.load().await?.ok_or(Exception::ServerBundleUnavailable)?;
        info!("SSR渲染器构造完成，清单共{}个模块", manifest.len());
        Ok(Self {
            entry,
            bundle: BundleRenderer::new(Arc::new(manifest), build_assets_url(&runtime_config.app)),
            mount_id: mount_id.to_string(),
        })
    }
}

#[async_trait]
impl Renderer for SsrRenderer {
    async fn render_to_string(&self, ctx: &mut SsrContext<'_>) -> Result<Option<Rendered>, Exception> {
        let Some(html) = self.entry.render(ctx).await? else {
            return Ok(None);
        };
        let html = format!(r#"<div id="{}">{}</div>"#, self.mount_id, html);
        Ok(Some(self.bundle.finish(html, &ctx.modules)))
    }
}

/// 仅客户端渲染器：空挂载点外壳只渲染一次，此后每个请求复用。
pub struct SpaRenderer {
    shell: Rendered,
}

impl SpaRenderer {
    pub async fn build(
        manifest: &dyn ManifestProvider,
        runtime_config: &RuntimeConfig,
        mount_id: &str,
    ) -> Result<Self, Exception> {
        let manifest = manifest.load().await?.ok_or(Exception::ManifestUnavailable)?;
        let bundle = BundleRenderer::new(Arc::new(manifest), build_assets_url(&runtime_config.app));
        let shell = bundle.finish(format!(r#"<div id="{}"></div>"#, mount_id), &BTreeSet::new());
        info!("SPA渲染器构造完成");
        Ok(Self { shell })
    }
}

#[async_trait]
impl Renderer for SpaRenderer {
    async fn render_to_string(&self, ctx: &mut SsrContext<'_>) -> Result<Option<Rendered>, Exception> {
        let mut payload = Map::new();
        payload.insert("serverRendered".to_string(), Value::Bool(false));
        payload.insert("config".to_string(), ctx.runtime_config.client_subset());
        payload.insert("data".to_string(), json!({}));
        payload.insert("state".to_string(), json!({}));
        // 错误页与预渲染时间戳在上下文构建时写入，外壳渲染不能把它们丢掉
        for key in ["error", "prerenderedAt"] {
            if let Some(value) = ctx.payload.get(key) {
                payload.insert(key.to_string(), value.clone());
            }
        }
        ctx.payload = Payload::from_map(payload);
        Ok(Some(self.shell.clone()))
    }
}

/// 进程级渲染器缓存。
pub struct RendererCache {
    ssr: LazyCached<SsrRenderer>,
    spa: LazyCached<SpaRenderer>,
}

impl RendererCache {
    pub fn new(
        manifest: Arc<dyn ManifestProvider>,
        entry: Arc<dyn ServerEntryProvider>,
        runtime_config: Arc<RuntimeConfig>,
        mount_id: &str,
    ) -> Self {
        let ssr = {
            let manifest = Arc::clone(&manifest);
            let runtime_config = Arc::clone(&runtime_config);
            let mount_id = mount_id.to_string();
            LazyCached::new("ssr-renderer", move || {
                let manifest = Arc::clone(&manifest);
                let entry = Arc::clone(&entry);
                let runtime_config = Arc::clone(&runtime_config);
                let mount_id = mount_id.clone();
                async move { SsrRenderer::build(&*manifest, &*entry, &runtime_config, &mount_id).await }.boxed()
            })
        };
        let spa = {
            let mount_id = mount_id.to_string();
            LazyCached::new("spa-renderer", move || {
                let manifest = Arc::clone(&manifest);
                let runtime_config = Arc::clone(&runtime_config);
                let mount_id = mount_id.clone();
                async move { SpaRenderer::build(&*manifest, &runtime_config, &mount_id).await }.boxed()
            })
        };
        Self { ssr, spa }
    }

    pub async fn ssr(&self) -> Result<Arc<SsrRenderer>, Exception> {
        self.ssr.get().await
    }

    pub async fn spa(&self) -> Result<Arc<SpaRenderer>, Exception> {
        self.spa.get().await
    }

    /// 按是否跳过 SSR 选择渲染器。
    pub async fn select(&self, no_ssr: bool) -> Result<Arc<dyn Renderer>, Exception> {
        if no_ssr {
            debug!("使用SPA渲染器");
            Ok(self.spa().await?)
        } else {
            Ok(self.ssr().await?)
        }
    }

    pub fn ssr_attempts(&self) -> u64 {
        self.ssr.attempts()
    }

    pub fn spa_attempts(&self) -> u64 {
        self.spa.attempts()
    }
}
