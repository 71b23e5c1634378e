// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了渲染管线在处理一次请求的生命周期中可能抛出的各类异常情况。
//!
//! ## 分类
//! - **协议错误**：请求字节流无法解析（仅二进制前端使用）。
//! - **构造错误**：客户端清单或服务端入口不可用。对当前请求致命，下一次请求会重新尝试构造。
//! - **渲染错误**：渲染引擎抛出的错误，或渲染过程写入 payload 的结构化错误。
//! - **扩展错误**：钩子回调失败。

use serde_json::Value;
use std::fmt;

/// 渲染管线处理请求过程中发生的异常类型。
///
/// 需要 `Clone`：构造中的渲染器通过共享 future 分发给所有并发等待者，错误同样如此。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了服务器暂不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 配置文件无法读取或解析。
    ConfigUnavailable(String),
    /// 客户端资源清单不可用。
    ManifestUnavailable,
    /// 服务端渲染入口不可用。
    ServerBundleUnavailable,
    /// 读取构建产物（清单、片段、样式）时发生 I/O 或格式错误。
    AssetLoadFailed(String),
    /// 渲染引擎抛出的非结构化错误。
    Render(String),
    /// 渲染过程写入 `payload.error` 的结构化错误，原样上抛给调用方。
    Payload(Value),
    /// 扩展钩子执行失败。
    Hook(String),
}

use Exception::*;

impl Exception {
    /// 将异常映射为 HTTP 状态码。
    ///
    /// 结构化错误优先使用其自带的 `statusCode` 字段。
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | UnSupportedRequestMethod | UnsupportedHttpVersion => 400,
            Payload(value) => value
                .get("statusCode")
                .and_then(|code| match code {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.parse::<u64>().ok(),
                    _ => None,
                })
                .and_then(|code| u16::try_from(code).ok())
                .filter(|code| (400..600).contains(code))
                .unwrap_or(500),
            _ => 500,
        }
    }

    /// 结构化错误中的 `statusMessage`，没有时返回 `None`。
    pub fn status_message(&self) -> Option<&str> {
        match self {
            Payload(value) => value.get("statusMessage").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            ConfigUnavailable(reason) => write!(f, "Config is not available: {}", reason),
            ManifestUnavailable => write!(f, "client.manifest is not available"),
            ServerBundleUnavailable => write!(f, "Server bundle is not available"),
            AssetLoadFailed(reason) => write!(f, "Failed to load build asset: {}", reason),
            Render(reason) => write!(f, "Render failed: {}", reason),
            Payload(value) => match value.get("message").and_then(Value::as_str) {
                Some(message) => write!(f, "Render recorded an error ({}): {}", self.status_code(), message),
                None => write!(f, "Render recorded an error ({})", self.status_code()),
            },
            Hook(reason) => write!(f, "Render hook failed: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_status_code_from_number() {
        let e = Payload(json!({ "statusCode": 404, "statusMessage": "Page not found" }));
        assert_eq!(e.status_code(), 404);
        assert_eq!(e.status_message(), Some("Page not found"));
    }

    #[test]
    fn test_payload_status_code_from_string() {
        let e = Payload(json!({ "statusCode": "503" }));
        assert_eq!(e.status_code(), 503);
    }

    #[test]
    fn test_payload_status_code_out_of_range_falls_back() {
        assert_eq!(Payload(json!({ "statusCode": 200 })).status_code(), 500);
        assert_eq!(Payload(json!({})).status_code(), 500);
    }

    #[test]
    fn test_protocol_errors_are_400() {
        assert_eq!(RequestIsNotUtf8.status_code(), 400);
        assert_eq!(UnsupportedHttpVersion.status_code(), 400);
        assert_eq!(ManifestUnavailable.status_code(), 500);
    }

    #[test]
    fn test_display() {
        assert_eq!(ManifestUnavailable.to_string(), "client.manifest is not available");
        let e = Payload(json!({ "statusCode": 404, "message": "missing" }));
        assert_eq!(e.to_string(), "Render recorded an error (404): missing");
    }
}
