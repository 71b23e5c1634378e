//! # 资源渲染
//!
//! 根据客户端清单，为一次渲染产出 `<link rel="modulepreload">`、样式表链接与入口脚本。

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    manifest::{collect_preloads, entry_ids, ClientManifest},
    util::{escape_html, join_url},
};

/// 构建产物文件名 → 对外可访问的 URL。
pub type AssetsUrl = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 一次渲染的结果：页面标记与三类资源片段。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub html: String,
    pub resource_hints: String,
    pub styles: String,
    pub scripts: String,
}

/// `{cdn_url 或 base_url}/{build_assets_dir}/{file}`
pub fn build_assets_url(app: &AppConfig) -> AssetsUrl {
    let public = match app.cdn_url.is_empty() {
        true => app.base_url.clone(),
        false => app.cdn_url.clone(),
    };
    let dir = app.build_assets_dir.clone();
    Arc::new(move |file: &str| join_url(&[public.as_str(), dir.as_str(), file]))
}

pub struct BundleRenderer {
    manifest: Arc<ClientManifest>,
    assets_url: AssetsUrl,
}

impl BundleRenderer {
    pub fn new(manifest: Arc<ClientManifest>, assets_url: AssetsUrl) -> Self {
        Self { manifest, assets_url }
    }

    /// 为页面标记补齐资源片段。`modules` 是渲染过程中登记的源模块。
    pub fn finish(&self, html: String, modules: &BTreeSet<String>) -> Rendered {
        let entries = entry_ids(&self.manifest);
        let preloads = collect_preloads(
            &self.manifest,
            entries.iter().copied().chain(modules.iter().map(String::as_str)),
        );

        let mut resource_hints = String::new();
        let mut stylesheets: Vec<&str> = vec![];
        for id in &preloads {
            let chunk = &self.manifest[*id];
            resource_hints.push_str(&format!(
                r#"<link rel="modulepreload" as="script" crossorigin href="{}">"#,
                self.url(&chunk.file)
            ));
            for css in &chunk.css {
                if !stylesheets.contains(&css.as_str()) {
                    stylesheets.push(css);
                }
            }
        }

        let styles: String = stylesheets
            .iter()
            .map(|css| format!(r#"<link rel="stylesheet" href="{}">"#, self.url(css)))
            .collect();
        let scripts: String = entries
            .iter()
            .map(|id| {
                format!(
                    r#"<script type="module" src="{}" crossorigin></script>"#,
                    self.url(&self.manifest[*id].file)
                )
            })
            .collect();

        Rendered {
            html,
            resource_hints,
            styles,
            scripts,
        }
    }

    fn url(&self, file: &str) -> String {
        escape_html(&(self.assets_url)(file))
    }
}
