//! # 渲染上下文
//!
//! 分类器产出的 `RenderRequest` 是一个带标签的值，每个变体只携带与之相关的字段；
//! 上下文构建器再把它展开为交给渲染器与服务端入口的 `SsrContext`。

use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::{
    config::{Config, RuntimeConfig},
    param::PAYLOAD_FILENAME,
    request::{split_query, Request},
    util::join_url,
};

/// 错误页渲染携带的结构化错误：`url`、`statusCode`、`statusMessage`、`message` 等。
pub type ErrorPayload = Map<String, Value>;

/// 一次请求被分类后的渲染目标。
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    /// 普通页面
    Page { url: String },
    /// 页面对应的 payload 模块（`/foo/_payload.js`），`url` 已改写为页面路径
    PayloadModule { url: String },
    /// 组件岛
    Island { url: String, island: IslandContext },
    /// 错误页
    Error { url: String, error: ErrorPayload },
}

impl RenderRequest {
    pub fn url(&self) -> &str {
        match self {
            RenderRequest::Page { url }
            | RenderRequest::PayloadModule { url }
            | RenderRequest::Island { url, .. }
            | RenderRequest::Error { url, .. } => url,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RenderRequest::Error { .. })
    }

    pub fn is_payload_module(&self) -> bool {
        matches!(self, RenderRequest::PayloadModule { .. })
    }

    pub fn island(&self) -> Option<&IslandContext> {
        match self {
            RenderRequest::Island { island, .. } => Some(island),
            _ => None,
        }
    }
}

/// 分类结果：渲染目标与是否跳过服务端渲染。
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub request: RenderRequest,
    pub no_ssr: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum IslandFormat {
    Html,
    Json,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IslandContext {
    pub id: Option<String>,
    pub url: String,
    pub format: Option<IslandFormat>,
    pub name: String,
    pub props: Map<String, Value>,
}

/// 客户端水合数据。
///
/// 约定的键：`error`、`data`、`state`、`prerenderedAt`、`serverRendered`、`config`，
/// 其余键由应用自行定义。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.0.insert(key.to_string(), value)
    }

    pub fn error(&self) -> Option<&Value> {
        self.0.get("error").filter(|e| !e.is_null())
    }

    pub fn set_error(&mut self, error: Value) {
        self.insert("error", error);
    }

    /// `state`，不存在时视为空对象。
    pub fn state(&self) -> Value {
        self.0
            .get("state")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    pub fn state_mut(&mut self) -> &mut Map<String, Value> {
        self.object_mut("state")
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        self.object_mut("data")
    }

    pub fn prerendered_at(&self) -> Option<i64> {
        self.0.get("prerenderedAt").and_then(Value::as_i64)
    }

    pub fn set_prerendered_at(&mut self, millis: i64) {
        self.insert("prerenderedAt", Value::from(millis));
    }

    fn object_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let slot = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just replaced with an object"),
        }
    }
}

/// 渲染过程中写入的响应状态（对应入站请求的响应对象）。
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseState {
    pub status_code: u16,
    pub status_message: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status_code: 200,
            status_message: None,
            headers: vec![],
        }
    }
}

/// 服务端入口在渲染时填充的头部元数据。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMeta {
    pub html_attrs: Option<String>,
    pub head_tags: Option<String>,
    pub body_attrs: Option<String>,
    pub body_scripts_prepend: Option<String>,
    pub body_scripts: Option<String>,
}

pub struct SsrContext<'a> {
    pub url: String,
    /// 去掉查询串的页面路径，payload 模块 URL 与缓存键都以它为准
    pub path: String,
    pub request: &'a Request,
    pub response: ResponseState,
    pub runtime_config: Arc<RuntimeConfig>,
    pub no_ssr: bool,
    pub is_error_render: bool,
    pub island_context: Option<IslandContext>,
    pub payload: Payload,
    /// 开启 payload 抽取时页面引用的 payload 模块 URL
    pub payload_url: Option<String>,
    pub meta: RenderMeta,
    /// teleport 目标名 → 渲染出的片段
    pub teleports: HashMap<String, String>,
    /// 渲染过程中额外收集的 `<style>` 片段
    pub styles: Option<String>,
    /// 本次渲染用到的源模块标识，用于资源预加载与关键样式内联
    pub modules: BTreeSet<String>,
}

impl<'a> SsrContext<'a> {
    /// 根据分类结果构建本次请求的上下文。
    ///
    /// 预渲染模式下写入 `payload.prerenderedAt`；payload 抽取生效（全局开启、预渲染、
    /// 本次请求不跳过 SSR 且不是组件岛）时计算 payload 模块 URL。
    pub fn build(
        classification: &Classification,
        request: &'a Request,
        runtime_config: Arc<RuntimeConfig>,
        config: &Config,
    ) -> Self {
        let url = classification.request.url().to_string();
        let path = split_query(&url).0.to_string();
        let mut payload = Payload::new();
        if let RenderRequest::Error { error, .. } = &classification.request {
            payload.set_error(Value::Object(error.clone()));
        }
        if config.prerender() {
            payload.set_prerendered_at(chrono::Utc::now().timestamp_millis());
        }

        let extraction = config.payload_extraction()
            && config.prerender()
            && !classification.no_ssr
            && classification.request.island().is_none();
        let payload_url = match extraction {
            true => Some(join_url(&[runtime_config.app.base_url.as_str(), path.as_str(), PAYLOAD_FILENAME])),
            false => None,
        };

        Self {
            url,
            path,
            request,
            response: ResponseState::default(),
            runtime_config,
            no_ssr: classification.no_ssr,
            is_error_render: classification.request.is_error(),
            island_context: classification.request.island().cloned(),
            payload,
            payload_url,
            meta: RenderMeta::default(),
            teleports: HashMap::new(),
            styles: None,
            modules: BTreeSet::new(),
        }
    }

    pub fn extracts_payload(&self) -> bool {
        self.payload_url.is_some()
    }
}
