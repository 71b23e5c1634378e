use serde_json::Value;

use crate::param::STATUS_CODES;

/// 渲染管线自身也失败时使用的静态错误页。
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES.get(&code).copied().unwrap_or("Unknown Error"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code,
            escape_html(description)
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>{}</title>
        <style>{}</style>
    </head>
    <body>
    {}
    </body>
</html>"##,
            self.title, self.css, self.body
        )
    }
}

/// 拼接 URL 片段，片段之间恰好保留一个 `/`。
///
/// `join_url(&["/", "/blog", "_payload.js"])` → `/blog/_payload.js`
pub fn join_url(parts: &[&str]) -> String {
    let mut url = String::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if url.is_empty() {
            url.push_str(part);
            continue;
        }
        match (url.ends_with('/'), part.starts_with('/')) {
            (true, true) => url.push_str(&part[1..]),
            (false, false) => {
                url.push('/');
                url.push_str(part);
            }
            _ => url.push_str(part),
        }
    }
    if url.is_empty() {
        "/".to_string()
    } else {
        url
    }
}

/// 把 JSON 序列化为可以直接嵌入 `<script>` 的 JavaScript 表达式。
///
/// `<`、`>`、`/` 以及 U+2028/U+2029 只会出现在字符串字面量中，替换为 `\uXXXX` 转义后语义不变，
/// 但不会再提前闭合 script 标签。
pub fn serialize_for_script(value: &Value) -> String {
    let json = value.to_string();
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '/' => out.push_str("\\u002F"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
