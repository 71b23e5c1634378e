//! 客户端资源清单：源模块标识 → 构建产物（输出文件、依赖的 chunk、样式）。

use async_trait::async_trait;
use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::exception::Exception;

pub type ClientManifest = BTreeMap<String, ManifestChunk>;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestChunk {
    pub file: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub is_entry: bool,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub dynamic_imports: Vec<String>,
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub assets: Vec<String>,
}

/// 资源清单提供方。`Ok(None)` 表示清单不存在（尚未构建）。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManifestProvider: Send + Sync {
    async fn load(&self) -> Result<Option<ClientManifest>, Exception>;
}

/// 从磁盘上的 manifest JSON 读取清单。
pub struct FsManifestProvider {
    path: PathBuf,
}

impl FsManifestProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ManifestProvider for FsManifestProvider {
    async fn load(&self) -> Result<Option<ClientManifest>, Exception> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("客户端清单{}不存在", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Exception::AssetLoadFailed(format!("{}: {}", self.path.display(), e)));
            }
        };
        let manifest: ClientManifest = serde_json::from_str(&content)
            .map_err(|e| Exception::AssetLoadFailed(format!("{}: {}", self.path.display(), e)))?;
        debug!("客户端清单已载入，共{}个模块", manifest.len());
        Ok(Some(manifest))
    }
}

/// 从入口模块出发，按静态 import 收集需要预加载的模块（深度优先，去重，保持首次出现顺序）。
pub fn collect_preloads<'a>(manifest: &'a ClientManifest, roots: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&'a str> = vec![];
    let mut stack: Vec<&'a str> = roots.into_iter().collect();
    stack.reverse();
    while let Some(id) = stack.pop() {
        if seen.contains(&id) {
            continue;
        }
        let Some(chunk) = manifest.get(id) else {
            continue;
        };
        seen.push(id);
        for import in chunk.imports.iter().rev() {
            stack.push(import.as_str());
        }
    }
    seen
}

/// 清单中所有入口模块的标识。
pub fn entry_ids(manifest: &ClientManifest) -> Vec<&str> {
    manifest
        .iter()
        .filter(|(_, chunk)| chunk.is_entry)
        .map(|(id, _)| id.as_str())
        .collect()
}
