//! 关键样式内联：按本次渲染用到的模块，把构建时抽取的 CSS 直接写进 `<head>`。

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::exception::Exception;

/// 模块标识 → 该模块的 CSS 文本列表。`entry` 为入口模块的样式。
pub type StyleMap = HashMap<String, Vec<String>>;

#[async_trait]
pub trait StylesProvider: Send + Sync {
    async fn load(&self) -> Result<StyleMap, Exception>;
}

pub struct FsStylesProvider {
    path: PathBuf,
}

impl FsStylesProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StylesProvider for FsStylesProvider {
    async fn load(&self) -> Result<StyleMap, Exception> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Exception::AssetLoadFailed(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StyleMap::new()),
            Err(e) => Err(Exception::AssetLoadFailed(format!("{}: {}", self.path.display(), e))),
        }
    }
}

/// 依次取 `entry` 与各个已用模块的样式，去重后拼成 `<style>` 片段。
pub fn render_inline_styles<'a>(styles: &StyleMap, used_modules: impl IntoIterator<Item = &'a str>) -> String {
    let mut rendered: Vec<String> = vec![];
    for module in std::iter::once("entry").chain(used_modules) {
        for css in styles.get(module).into_iter().flatten() {
            let tag = format!("<style>{}</style>", css);
            if !rendered.contains(&tag) {
                rendered.push(tag);
            }
        }
    }
    rendered.concat()
}
