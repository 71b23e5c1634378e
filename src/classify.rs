//! # 请求分类
//!
//! 从路径前缀、请求头、URL 后缀与全局开关中判定一次请求的渲染目标：
//! 错误页、组件岛、payload 模块或普通页面，以及是否跳过服务端渲染。

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    config::Config,
    context::{Classification, ErrorPayload, IslandContext, IslandFormat, RenderRequest},
    param::*,
    request::{split_query, Request},
};

lazy_static! {
    /// `/_payload.js`、`/_payload.3f2a9c.js`，可带查询字符串
    static ref PAYLOAD_URL_RE: Regex = Regex::new(r"/_payload(\.[a-zA-Z0-9]+)?\.js(\?.*)?$").unwrap();
}

#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    no_ssr: bool,
    prerender: bool,
}

impl Classifier {
    pub fn new(config: &Config) -> Self {
        Self {
            no_ssr: config.no_ssr(),
            prerender: config.prerender(),
        }
    }

    pub fn classify(&self, request: &Request, id: u128) -> Classification {
        let target = request.path();

        // 1. 错误页
        let error = match target.starts_with(ERROR_PREFIX) {
            true => Some(parse_error_query(request.query())),
            false => None,
        };

        // 2. 组件岛
        let island = match error.is_none() && target.starts_with(ISLAND_PREFIX) {
            true => Some(parse_island_context(request, id)),
            false => None,
        };

        // 3. 有效 URL
        let mut url = match (&error, &island) {
            (Some(error), _) => error
                .get("url")
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .unwrap_or("/")
                .to_string(),
            (None, Some(island)) => island.url.clone(),
            (None, None) => target.to_string(),
        };

        // 4. payload 模块：改写为页面路径
        let payload_module = match payload_page_url(&url) {
            Some(page_url) => {
                debug!("[ID{}]payload模块请求：{} -> {}", id, url, page_url);
                url = page_url;
                true
            }
            None => false,
        };

        // 5. 是否跳过服务端渲染（组件岛始终需要完整组件树）
        let no_ssr = island.is_none()
            && (self.no_ssr
                || request.header(NO_SSR_HEADER).map_or(false, |v| !v.is_empty())
                || (self.prerender && PRERENDER_NO_SSR_ROUTES.contains(split_query(&url).0)));

        let request = match (error, island) {
            (Some(error), _) => RenderRequest::Error { url, error },
            (None, Some(island)) => RenderRequest::Island { url, island },
            (None, None) if payload_module => RenderRequest::PayloadModule { url },
            (None, None) => RenderRequest::Page { url },
        };
        Classification { request, no_ssr }
    }
}

/// 若 `url` 指向 payload 模块，返回其所属页面的路径（模块前的部分，为空则为 `/`）。
pub fn payload_page_url(url: &str) -> Option<String> {
    let found = PAYLOAD_URL_RE.find(url)?;
    let page = &url[..found.start()];
    Some(match page.is_empty() {
        true => "/".to_string(),
        false => page.to_string(),
    })
}

/// 查询字符串 → 结构化错误。数字形式的 `statusCode` 转为数字。
fn parse_error_query(query: &str) -> ErrorPayload {
    let mut error = Map::new();
    for (key, value) in parse_query(query) {
        let value = match key.as_str() {
            "statusCode" => match value.parse::<u16>() {
                Ok(code) => Value::from(code),
                Err(_) => Value::String(value),
            },
            _ => Value::String(value),
        };
        error.insert(key, value);
    }
    error
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!("无法解析查询字符串{:?}：{}", query, e);
            vec![]
        }
    }
}

/// 解析 `{ISLAND_PREFIX}/{componentName}:{id}?...`。
///
/// GET 从查询字符串读取上下文，其余方法读取 JSON 请求体。任何无法解析的部分都退化为默认值，
/// 不会让请求失败。
fn parse_island_context(request: &Request, id: u128) -> IslandContext {
    let (path, _) = split_query(request.path());
    let rest = path
        .strip_prefix(ISLAND_PREFIX)
        .unwrap_or("")
        .trim_start_matches('/');
    let (name, hash_id) = match rest.split_once(':') {
        Some((name, hash_id)) => (name, Some(hash_id)),
        None => (rest, None),
    };

    let context: Map<String, Value> = match request.method() {
        HttpRequestMethod::Get | HttpRequestMethod::Head => parse_query(request.query())
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
        _ => match serde_json::from_str::<Value>(request.body()) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) if request.body().trim().is_empty() => Map::new(),
            _ => {
                warn!("[ID{}]组件岛请求体不是JSON对象，按空上下文处理", id);
                Map::new()
            }
        },
    };

    let url = context
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .unwrap_or("/")
        .to_string();
    let format = match context.get("format").and_then(Value::as_str) {
        Some("html") => Some(IslandFormat::Html),
        Some("json") => Some(IslandFormat::Json),
        _ => None,
    };

    IslandContext {
        id: hash_id.filter(|h| !h.is_empty()).map(str::to_string),
        url,
        format,
        name: name.to_string(),
        props: parse_props(context.get("props")),
    }
}

/// `props` 可以是对象，也可以是序列化后的 JSON 字符串；其余情况一律视为空对象。
fn parse_props(props: Option<&Value>) -> Map<String, Value> {
    match props {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}
