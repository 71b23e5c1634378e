//! # 渲染处理器
//!
//! 单次请求的完整管线：分类 → 构建上下文 → 渲染 → 拆分 payload 或提取组件岛 → 组装响应。
//! 进程级状态只有两个渲染器缓存与 payload 模块缓存，均由处理器持有。

use futures::future::FutureExt;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    cache::PayloadCache,
    classify::Classifier,
    config::{Config, RuntimeConfig},
    context::{IslandFormat, SsrContext},
    document::{render_html_document, HtmlDocumentContext},
    entry::{FsEntryProvider, ServerEntryProvider},
    exception::Exception,
    hooks::Hooks,
    island::IslandResponse,
    lazy::LazyCached,
    manifest::{FsManifestProvider, ManifestProvider},
    param::{PAYLOAD_FILENAME, PRERENDER_HINT_HEADER},
    payload::render_payload_response,
    renderer::RendererCache,
    request::Request,
    response::RenderResponse,
    styles::{render_inline_styles, FsStylesProvider, StyleMap, StylesProvider},
    util::join_url,
};

pub struct RenderHandler {
    config: Config,
    runtime_config: Arc<RuntimeConfig>,
    classifier: Classifier,
    renderers: RendererCache,
    payload_cache: Option<PayloadCache>,
    styles: Option<LazyCached<StyleMap>>,
    hooks: Hooks,
}

impl RenderHandler {
    pub fn new(
        config: Config,
        manifest: Arc<dyn ManifestProvider>,
        entry: Arc<dyn ServerEntryProvider>,
        styles: Arc<dyn StylesProvider>,
    ) -> Self {
        let runtime_config = Arc::new(config.runtime().clone());
        let renderers = RendererCache::new(manifest, entry, Arc::clone(&runtime_config), config.mount_id());
        let styles = match config.inline_styles() {
            true => Some(LazyCached::new("inline-styles", move || {
                let styles = Arc::clone(&styles);
                async move { styles.load().await }.boxed()
            })),
            false => None,
        };
        let payload_cache = PayloadCache::for_config(&config);
        if payload_cache.is_some() {
            info!("预渲染模式，已启用payload模块缓存");
        }

        Self {
            classifier: Classifier::new(&config),
            runtime_config,
            renderers,
            payload_cache,
            styles,
            hooks: Hooks::new(),
            config,
        }
    }

    /// 使用配置中的构建产物路径创建处理器。
    pub fn from_config(config: Config) -> Self {
        let manifest = Arc::new(FsManifestProvider::new(config.manifest_path()));
        let entry = Arc::new(FsEntryProvider::new(config.server_dir()));
        let styles = Arc::new(FsStylesProvider::new(config.styles_path()));
        Self::new(config, manifest, entry, styles)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn renderers(&self) -> &RendererCache {
        &self.renderers
    }

    pub fn payload_cache(&self) -> Option<&PayloadCache> {
        self.payload_cache.as_ref()
    }

    /// 处理一次请求。
    ///
    /// `Ok(None)` 表示渲染没有产出任何内容，调用方不应再发送响应体。
    /// 渲染失败或渲染过程中在 payload 上记录了错误时返回 `Err`，由调用方转为错误页。
    pub async fn handle(&self, request: &Request, id: u128) -> Result<Option<RenderResponse>, Exception> {
        let start_time = Instant::now();

        // 1. 分类
        let classification = self.classifier.classify(request, id);
        debug!(
            "[ID{}]请求分类：{:?}，no_ssr={}",
            id, classification.request, classification.no_ssr
        );

        // 2. payload 模块缓存命中时直接返回
        if classification.request.is_payload_module() && !classification.no_ssr {
            if let Some(cached) = self
                .payload_cache
                .as_ref()
                .and_then(|cache| cache.get(classification.request.url()))
            {
                debug!("[ID{}]payload模块缓存命中：{}", id, classification.request.url());
                return Ok(Some(cached));
            }
        }

        // 3. 构建上下文
        let mut ctx = SsrContext::build(&classification, request, Arc::clone(&self.runtime_config), &self.config);

        // 4. 渲染
        let renderer = self.renderers.select(ctx.no_ssr).await?;
        let rendered = match renderer.render_to_string(&mut ctx).await {
            Ok(rendered) => rendered,
            Err(e) if !ctx.is_error_render => {
                // 渲染过程中显式记录的错误优先于随后的渲染错误
                return Err(match ctx.payload.error() {
                    Some(error) => Exception::Payload(error.clone()),
                    None => e,
                });
            }
            Err(e) => {
                warn!("[ID{}]错误页渲染失败：{}", id, e);
                None
            }
        };
        self.hooks.app_rendered(&mut ctx).await?;

        let Some(rendered) = rendered else {
            debug!("[ID{}]渲染没有产出内容", id);
            return Ok(None);
        };
        if !ctx.is_error_render {
            if let Some(error) = ctx.payload.error() {
                warn!("[ID{}]渲染完成但payload中记录了错误：{}", id, error);
                return Err(Exception::Payload(error.clone()));
            }
        }

        // 5. payload 模块请求直接返回模块响应
        if classification.request.is_payload_module() {
            let response = render_payload_response(&ctx);
            if ctx.extracts_payload() {
                self.store_payload(&ctx.path, response.clone());
            }
            debug!("[ID{}]payload模块响应完成，用时{}ms", id, start_time.elapsed().as_millis());
            return Ok(Some(response));
        }

        let mut extra_headers = vec![];
        if ctx.extracts_payload() {
            extra_headers.push((
                PRERENDER_HINT_HEADER.to_string(),
                join_url(&[ctx.path.as_str(), PAYLOAD_FILENAME]),
            ));
            self.store_payload(&ctx.path, render_payload_response(&ctx));
        }

        // 6. 组装文档
        let inlined_styles = match &self.styles {
            Some(styles) => render_inline_styles(&*styles.get().await?, ctx.modules.iter().map(String::as_str)),
            None => String::new(),
        };
        let mut html = HtmlDocumentContext::build(&ctx, &rendered, &inlined_styles, self.config.no_scripts());
        self.hooks.render_html(&mut html, request).await?;

        // 7. 组件岛信封
        if let Some(island) = &ctx.island_context {
            if island.format != Some(IslandFormat::Html) {
                let mut envelope = IslandResponse::build(&ctx, &html.head);
                self.hooks.render_island(&mut envelope, island).await?;
                debug!("[ID{}]组件岛{}渲染完成，用时{}ms", id, island.name, start_time.elapsed().as_millis());
                return Ok(Some(self.finish(RenderResponse::json(envelope.to_json()), &ctx, &[])));
            }
        }

        // 8. 完整文档
        let response = self.finish(RenderResponse::html(render_html_document(&html)), &ctx, &extra_headers);
        debug!("[ID{}]页面渲染完成，用时{}ms", id, start_time.elapsed().as_millis());
        Ok(Some(response))
    }

    fn store_payload(&self, url: &str, response: RenderResponse) {
        if let Some(cache) = &self.payload_cache {
            cache.insert(url, response);
        }
    }

    /// 写入渲染时设置的状态码与响应头。
    fn finish(&self, response: RenderResponse, ctx: &SsrContext<'_>, extra_headers: &[(String, String)]) -> RenderResponse {
        let mut response = response.with_status(ctx.response.status_code, ctx.response.status_message.as_deref());
        for (name, value) in ctx.response.headers.iter().chain(extra_headers) {
            response.set_header(name, value);
        }
        response
    }
}
