//! # 组件岛响应
//!
//! 组件岛请求（`format` 不是 `html`）不返回完整文档，而是一个 JSON 信封：
//! 组件片段、水合状态，以及从文档 `<head>` 片段中提取出的标签列表。

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{context::SsrContext, param::ISLAND_TELEPORT};

lazy_static! {
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref OPEN_TAG_RE: Regex = Regex::new(r"<([a-z]+)( [^>]*)?>").unwrap();
    static ref ATTR_RE: Regex = Regex::new(r#"([a-z][a-z0-9-]*)="([^"]*)""#).unwrap();
}

/// `(标签名, 属性)`，标签内的文本存放在 `children` 属性中。
pub type HtmlTag = (String, BTreeMap<String, String>);

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct IslandResponse {
    pub id: Option<String>,
    pub html: String,
    pub state: Value,
    pub tags: Vec<HtmlTag>,
}

impl IslandResponse {
    /// 由渲染上下文与已归一化的 head 片段组装信封。
    pub fn build(ctx: &SsrContext<'_>, head: &[String]) -> Self {
        let fragment = ctx.teleports.get(ISLAND_TELEPORT).map(String::as_str).unwrap_or("");
        Self {
            id: ctx.island_context.as_ref().and_then(|island| island.id.clone()),
            html: strip_comments(fragment),
            state: ctx.payload.state(),
            tags: head.iter().flat_map(|chunk| extract_html_tags(chunk)).collect(),
        }
    }

    pub fn to_json(&self) -> String {
        // 字段全部是字符串与 JSON 值，序列化不会失败
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

pub fn strip_comments(html: &str) -> String {
    COMMENT_RE.replace_all(html, "").into_owned()
}

/// 尽力而为的 head 标签提取，只覆盖渲染引擎产出的扁平标签形态。
///
/// 开始标签之后若能找到同名的 `</tag`，两者之间的文本作为 `children`，并整体跳过；
/// 否则视为自闭合标签，从开始标签末尾继续扫描。
pub fn extract_html_tags(html: &str) -> Vec<HtmlTag> {
    let mut tags = vec![];
    let mut pos = 0;
    while let Some(caps) = OPEN_TAG_RE.captures_at(html, pos) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let tag = name.as_str().to_string();
        let mut attrs = BTreeMap::new();
        if let Some(raw) = caps.get(2) {
            for attr in ATTR_RE.captures_iter(raw.as_str()) {
                attrs.insert(attr[1].to_string(), attr[2].to_string());
            }
        }

        pos = whole.end();
        let closing = format!("</{}", tag);
        if let Some(offset) = html[pos..].find(&closing) {
            let children = &html[pos..pos + offset];
            if !children.is_empty() {
                attrs.insert("children".to_string(), children.to_string());
            }
            pos += offset + closing.len();
        }
        tags.push((tag, attrs));
    }
    tags
}
