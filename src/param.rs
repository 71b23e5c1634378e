// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 渲染管线协议参数与常量模块
//!
//! 该模块定义了渲染管线遵循的保留 URL 标记、请求/响应头以及 HTTP 协议相关常量，包括：
//! - 错误页、组件岛（island）与 payload 模块的保留路径。
//! - 三种响应的 `Content-Type`。
//! - 常见的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - HTTP 方法、版本的强类型枚举。

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

/// 服务器名称标识，用于 `Server` 与 `x-powered-by` 响应头
pub const SERVER_NAME: &str = "ssr-renderer";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 错误页渲染的保留路径前缀，查询参数即序列化后的错误对象
pub const ERROR_PREFIX: &str = "/__ssr_error";

/// 组件岛渲染的保留路径前缀：`{prefix}/{componentName}:{id}?...`
pub const ISLAND_PREFIX: &str = "/__ssr_island";

/// 渲染结果中组件岛片段所在的 teleport 目标名
pub const ISLAND_TELEPORT: &str = "ssr-island";

/// teleport 到 `<body>` 开头的目标名
pub const BODY_TELEPORT: &str = "body";

/// 仅客户端渲染（跳过 SSR）的请求头
pub const NO_SSR_HEADER: &str = "x-ssr-no-ssr";

/// 提示预渲染器同时抓取 payload 模块的响应头
pub const PRERENDER_HINT_HEADER: &str = "x-ssr-prerender";

/// payload 模块文件名，拼接在页面 URL 之后
pub const PAYLOAD_FILENAME: &str = "_payload.js";

/// 客户端挂载 payload 的全局变量名
pub const PAYLOAD_GLOBAL: &str = "__SSR__";

pub const CONTENT_TYPE_HTML: &str = "text/html;charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=utf-8";
pub const CONTENT_TYPE_JAVASCRIPT: &str = "text/javascript;charset=UTF-8";

lazy_static! {
    /// 预渲染时始终走客户端渲染的路由。
    ///
    /// 这些页面会被当作通用外壳（SPA fallback）使用，不能烘焙进某一次具体的渲染结果。
    pub static ref PRERENDER_NO_SSR_ROUTES: HashSet<&'static str> = {
        ["/index.html", "/200.html", "/404.html"].into_iter().collect()
    };
}

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 2xx: 成功响应 (Successful)
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");

        // 3xx: 重定向 (Redirection)
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx: 客户端错误 (Client Error)
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(406, "Not Acceptable");
        map.insert(408, "Request Timeout");
        map.insert(409, "Conflict");
        map.insert(410, "Gone");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(422, "Unprocessable Content");
        map.insert(429, "Too Many Requests");

        // 5xx: 服务端错误 (Server Error)
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(504, "Gateway Timeout");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 查询服务器支持的选项
    Options,
    /// 提交数据或执行操作（组件岛通过请求体传递 props）
    Post,
}

use std::fmt;

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}
