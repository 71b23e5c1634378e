//! # 服务端渲染入口
//!
//! `ServerEntry` 是编译好的应用在服务端的渲染入口：拿到上下文，产出页面标记，
//! 并顺带填充 payload、头部元数据和 teleport 片段。
//!
//! `FsServerEntry` 是一个基于预构建片段目录的入口实现，目录结构：
//! - `index.html`、`blog/post.html`：页面片段，`/` 对应 `index.html`，`/blog/post` 对应 `blog/post.html`
//! - `blog/post.head.html`：可选，页面的 `<head>` 标签
//! - `blog/post.json`：可选，页面的 `payload.data`
//! - `islands/Counter.html`：组件岛片段
//! - `error.html`：可选，错误页片段

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{json, Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    context::SsrContext,
    exception::Exception,
    param::ISLAND_TELEPORT,
    request::split_query,
    util::escape_html,
};

#[async_trait]
pub trait ServerEntry: Send + Sync {
    /// 渲染一次请求。`Ok(None)` 表示没有可发送的内容（例如入口已自行处理了响应）。
    async fn render(&self, ctx: &mut SsrContext<'_>) -> Result<Option<String>, Exception>;
}

/// 服务端入口提供方。`Ok(None)` 表示服务端产物不存在。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerEntryProvider: Send + Sync {
    async fn load(&self) -> Result<Option<Arc<dyn ServerEntry>>, Exception>;
}

/// 直接持有一个入口实例的提供方。
pub struct StaticEntryProvider {
    entry: Arc<dyn ServerEntry>,
}

impl StaticEntryProvider {
    pub fn new(entry: Arc<dyn ServerEntry>) -> Self {
        Self { entry }
    }
}

#[async_trait]
impl ServerEntryProvider for StaticEntryProvider {
    async fn load(&self) -> Result<Option<Arc<dyn ServerEntry>>, Exception> {
        Ok(Some(Arc::clone(&self.entry)))
    }
}

/// 在目录存在时提供 `FsServerEntry`。
pub struct FsEntryProvider {
    root: PathBuf,
}

impl FsEntryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ServerEntryProvider for FsEntryProvider {
    async fn load(&self) -> Result<Option<Arc<dyn ServerEntry>>, Exception> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(Some(Arc::new(FsServerEntry::new(&self.root)))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Exception::AssetLoadFailed(format!("{}: {}", self.root.display(), e))),
        }
    }
}

pub struct FsServerEntry {
    root: PathBuf,
}

impl FsServerEntry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 页面 URL → 片段文件名（不含扩展名）。含 `..` 等越界片段时返回 `None`。
    fn page_stem(&self, url: &str) -> Option<PathBuf> {
        let path = split_query(url).0.trim_matches('/');
        if path.is_empty() {
            return Some(self.root.join("index"));
        }
        let mut stem = self.root.clone();
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return None;
            }
            stem.push(segment);
        }
        Some(stem)
    }

    async fn render_island(&self, ctx: &mut SsrContext<'_>) -> Result<Option<String>, Exception> {
        let Some(island) = ctx.island_context.clone() else {
            return Ok(None);
        };
        if island.name.is_empty() || !island.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Exception::Render(format!("invalid island name {:?}", island.name)));
        }
        let base = self.root.join("islands").join(&island.name);
        let html = read_optional(&with_suffix(&base, ".html"))
            .await?
            .ok_or_else(|| Exception::Render(format!("island {} is not available", island.name)))?;
        ctx.teleports.insert(ISLAND_TELEPORT.to_string(), html);
        ctx.payload
            .state_mut()
            .insert(format!("island:{}", island.name), Value::Object(island.props));
        if let Some(head) = read_optional(&with_suffix(&base, ".head.html")).await? {
            ctx.meta.head_tags = Some(head);
        }
        Ok(Some(String::new()))
    }

    async fn render_error(&self, ctx: &mut SsrContext<'_>) -> Result<Option<String>, Exception> {
        let error = ctx.payload.error().cloned().unwrap_or_else(|| json!({}));
        let status_code = error
            .get("statusCode")
            .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        ctx.response.status_code = status_code;
        ctx.response.status_message = error.get("statusMessage").and_then(Value::as_str).map(str::to_string);

        let message = error
            .get("message")
            .or_else(|| error.get("statusMessage"))
            .and_then(Value::as_str)
            .unwrap_or("");
        match read_optional(&self.root.join("error.html")).await? {
            Some(template) => Ok(Some(
                template
                    .replace("{{statusCode}}", &status_code.to_string())
                    .replace("{{message}}", &escape_html(message)),
            )),
            None => Ok(Some(format!("<h1>{}</h1><p>{}</p>", status_code, escape_html(message)))),
        }
    }

    async fn render_page(&self, ctx: &mut SsrContext<'_>) -> Result<Option<String>, Exception> {
        let Some(stem) = self.page_stem(&ctx.url) else {
            warn!("非法的页面路径：{}", ctx.url);
            ctx.payload.set_error(not_found(&ctx.url));
            return Ok(Some(String::new()));
        };
        let Some(html) = read_optional(&with_suffix(&stem, ".html")).await? else {
            debug!("页面片段{}不存在", stem.display());
            ctx.payload.set_error(not_found(&ctx.url));
            return Ok(Some(String::new()));
        };
        if let Some(head) = read_optional(&with_suffix(&stem, ".head.html")).await? {
            ctx.meta.head_tags = Some(head);
        }
        if let Some(data) = read_optional(&with_suffix(&stem, ".json")).await? {
            let data: Map<String, Value> = serde_json::from_str(&data)
                .map_err(|e| Exception::AssetLoadFailed(format!("{}.json: {}", stem.display(), e)))?;
            ctx.payload.data_mut().extend(data);
        }
        Ok(Some(html))
    }
}

#[async_trait]
impl ServerEntry for FsServerEntry {
    async fn render(&self, ctx: &mut SsrContext<'_>) -> Result<Option<String>, Exception> {
        if ctx.island_context.is_some() {
            self.render_island(ctx).await
        } else if ctx.is_error_render {
            self.render_error(ctx).await
        } else {
            self.render_page(ctx).await
        }
    }
}

fn not_found(url: &str) -> Value {
    json!({
        "url": url,
        "statusCode": 404,
        "statusMessage": format!("Page not found: {}", split_query(url).0),
    })
}

/// 在文件名后追加后缀。不用 `with_extension`，`/v1.2` 这类路径中的点不是扩展名。
fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut path = stem.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

async fn read_optional(path: &Path) -> Result<Option<String>, Exception> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Exception::AssetLoadFailed(format!("{}: {}", path.display(), e))),
    }
}
