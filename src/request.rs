// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求模块
//!
//! 渲染管线只关心请求的少数几个方面：方法、目标路径（含查询字符串）、请求头和请求体。
//! 该模块提供：
//! 1. `Request` 结构体，即管线入口接收的"类 HTTP 请求"。
//! 2. 从 TCP 流读取的原始字节解析 `Request`（二进制前端使用）。
//! 3. 路径与查询字符串的拆分。

use crate::{exception::Exception, param::*};
use log::error;

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 请求头，名称统一转为小写，保留出现顺序
    headers: Vec<(String, String)>,
    /// 请求体（UTF-8 文本）
    body: String,
}

impl Request {
    /// 直接构造请求，供嵌入方（以及测试）绕过报文解析使用。
    pub fn new(method: HttpRequestMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            version: HttpVersion::V1_1,
            headers: vec![],
            body: String::new(),
        }
    }

    /// 追加一个请求头，名称会被转为小写。
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }

    /// 设置请求体。
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：确保请求数据是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径和协议版本。
    /// 3. 迭代解析标头，直到空行为止。
    /// 4. 空行之后的内容视为请求体。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 1. 将字节流转换为字符串，读缓冲区末尾的 0 填充一并去掉
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string.trim_end_matches('\0'),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let (head, body) = match request_string.split_once("\r\n\r\n") {
            Some((head, body)) => (head, body),
            None => (request_string, ""),
        };
        let request_lines: Vec<&str> = head.split(CRLF).collect();

        // 2. 解析请求行 (e.g., "GET /index.html HTTP/1.1")
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::UnSupportedRequestMethod);
        }

        // 解析方法名
        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        // 解析协议版本
        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 解析路径（考虑到路径中可能包含空格的情况，虽然不规范但通过 join 尝试恢复）
        let path = if first_line_parts.len() == 3 {
            first_line_parts[1].to_string()
        } else {
            first_line_parts[1..first_line_parts.len() - 1].join(" ")
        };

        // 3. 迭代各行解析 Headers
        let mut headers = vec![];
        for line in &request_lines[1..] {
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_lowercase(), value.trim().to_string()));
            }
        }

        Ok(Self {
            method,
            path,
            version,
            headers,
            body: body.to_string(),
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 按名称（大小写不敏感）获取第一个匹配的请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    /// 获取请求体
    pub fn body(&self) -> &str {
        &self.body
    }

    /// 获取查询字符串（不含 `?`）
    pub fn query(&self) -> &str {
        split_query(&self.path).1
    }
}

/// 将请求目标拆分为路径与查询字符串两部分。
pub fn split_query(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(request.header("host"), Some("localhost:7878"));
        assert_eq!(request.body(), "");
    }

    /// 验证 POST 请求体被完整保留（组件岛通过请求体传递上下文）
    #[test]
    fn test_parse_post_request_with_body() {
        let request_str = "POST /__ssr_island/Counter:abc HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\r\n{\"props\":{\"start\":1}}";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.path(), "/__ssr_island/Counter:abc");
        assert_eq!(request.body(), "{\"props\":{\"start\":1}}");
    }

    /// 读缓冲区末尾的 0 填充不应进入请求体
    #[test]
    fn test_trailing_nul_padding_is_ignored() {
        let mut buffer = b"GET /about HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec();
        buffer.resize(1024, 0);
        let request = Request::try_from(&buffer, 0).unwrap();

        assert_eq!(request.path(), "/about");
        assert_eq!(request.body(), "");
    }

    /// 确保不支持的 HTTP 方法（如 DELETE）会返回错误
    #[test]
    fn test_unsupported_method() {
        let request_str = "DELETE /resource HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);

        assert_eq!(result.unwrap_err(), Exception::UnSupportedRequestMethod);
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);

        assert_eq!(result.unwrap_err(), Exception::UnsupportedHttpVersion);
    }

    /// 验证 UTF-8 编码检查
    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];
        let result = Request::try_from(&buffer, 0);

        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    /// 验证 Header 字段名是否大小写不敏感
    #[test]
    fn test_case_insensitive_headers() {
        let request_str = "GET / HTTP/1.1\r\nhost: localhost:7878\r\nX-SSR-No-SSR: true\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.header(NO_SSR_HEADER), Some("true"));
        assert_eq!(request.header("X-Ssr-No-Ssr"), Some("true"));
    }

    /// 确保带查询参数的路径能完整提取
    #[test]
    fn test_path_with_query_string() {
        let request_str = "GET /page?id=123&name=test HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.path(), "/page?id=123&name=test");
        assert_eq!(request.query(), "id=123&name=test");
    }

    /// 验证请求方法的小写兼容性处理
    #[test]
    fn test_lowercase_method() {
        let request_str = "get / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
    }

    #[test]
    fn test_builder() {
        let request = Request::new(HttpRequestMethod::Get, "/foo?x=1").with_header("Accept", "text/html");
        assert_eq!(request.header("accept"), Some("text/html"));
        assert_eq!(split_query(request.path()), ("/foo", "x=1"));
        assert_eq!(split_query("/foo"), ("/foo", ""));
    }
}
