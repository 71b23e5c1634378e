use crate::param::*;

use bytes::Bytes;
use chrono::prelude::*;
use log::error;

/// 管线对外产出的响应记录：`{body, statusCode, statusMessage?, headers}`。
///
/// 页面、组件岛 JSON 与 payload 模块三种响应共用这一结构，区别只在 `content-type`。
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResponse {
    body: String,
    status_code: u16,
    status_message: Option<String>,
    headers: Vec<(String, String)>,
}

impl RenderResponse {
    pub fn new(body: String, content_type: &str) -> Self {
        Self {
            body,
            status_code: 200,
            status_message: None,
            headers: vec![
                ("content-type".to_string(), content_type.to_string()),
                ("x-powered-by".to_string(), SERVER_NAME.to_string()),
            ],
        }
    }

    pub fn html(body: String) -> Self {
        Self::new(body, CONTENT_TYPE_HTML)
    }

    pub fn json(body: String) -> Self {
        Self::new(body, CONTENT_TYPE_JSON)
    }

    pub fn javascript(body: String) -> Self {
        Self::new(body, CONTENT_TYPE_JAVASCRIPT)
    }

    pub fn with_status(mut self, code: u16, message: Option<&str>) -> Self {
        self.status_code = code;
        self.status_message = message.map(str::to_string);
        self
    }

    /// 设置响应头；同名（大小写不敏感）的旧值会被替换。
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        let name = name.to_lowercase();
        self.headers.retain(|(key, _)| *key != name);
        self.headers.push((name, value.to_string()));
        self
    }

    /// 序列化为 HTTP/1.1 响应报文。
    ///
    /// `headonly` 为真时只写出响应头（HEAD 请求），`Content-Length` 仍为完整长度。
    pub fn as_bytes(&self, headonly: bool) -> Bytes {
        let information = self
            .status_message
            .as_deref()
            .unwrap_or_else(|| reason_phrase(self.status_code));
        let mut header = format!("HTTP/1.1 {} {}{}", self.status_code, information, CRLF);
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        header.push_str(&["Content-Length: ", &self.body.len().to_string(), CRLF].concat());
        header.push_str(&["Date: ", &format_date(&Utc::now()), CRLF].concat());
        header.push_str(&["Server: ", SERVER_NAME, CRLF].concat());
        header.push_str(CRLF);

        let body: &[u8] = if headonly { b"" } else { self.body.as_bytes() };
        Bytes::from([header.as_bytes(), body].concat())
    }
}

impl RenderResponse {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// 状态码对应的原因短语，未知状态码按其类别给出兜底短语。
pub fn reason_phrase(code: u16) -> &'static str {
    match STATUS_CODES.get(&code) {
        Some(phrase) => phrase,
        None => {
            error!("未知的状态码：{}", code);
            match code {
                200..=299 => "OK",
                400..=499 => "Bad Request",
                _ => "Internal Server Error",
            }
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}
