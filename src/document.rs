//! # 文档组装
//!
//! 把渲染器产出的各类片段按固定顺序拼成完整的 HTML 文档。
//! 每一组片段在拼接前都会去掉缺失项并裁剪空白，缺失的片段不会以文本形式出现在文档中。

use serde_json::Value;

use crate::{
    bundle::Rendered,
    context::SsrContext,
    param::{BODY_TELEPORT, PAYLOAD_GLOBAL},
    payload::split_payload,
    util::serialize_for_script,
};

/// `render_html` 钩子可以修改的文档上下文。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlDocumentContext {
    pub island: bool,
    pub html_attrs: Vec<String>,
    pub head: Vec<String>,
    pub body_attrs: Vec<String>,
    pub body_prepend: Vec<String>,
    pub body: Vec<String>,
    pub body_append: Vec<String>,
}

impl HtmlDocumentContext {
    /// 按固定顺序收集片段：
    ///
    /// - head：头部元数据、payload 模块预加载、资源预加载、样式表、内联样式、上下文样式
    /// - body 前置：前置脚本、传送到 body 的内容
    /// - body：页面标记（组件岛为空）
    /// - body 追加：水合数据脚本（`no_scripts` 时省略）、入口脚本、其余 body 脚本
    pub fn build(ctx: &SsrContext<'_>, rendered: &Rendered, inlined_styles: &str, no_scripts: bool) -> Self {
        let island = ctx.island_context.is_some();
        let payload_hint = ctx
            .payload_url
            .as_ref()
            .map(|url| format!(r#"<link rel="modulepreload" href="{}">"#, url));
        let payload_script = match no_scripts {
            true => None,
            false => Some(payload_script(ctx)),
        };

        Self {
            island,
            html_attrs: normalize_chunks([ctx.meta.html_attrs.as_deref()]),
            head: normalize_chunks([
                ctx.meta.head_tags.as_deref(),
                payload_hint.as_deref(),
                Some(rendered.resource_hints.as_str()),
                Some(rendered.styles.as_str()),
                Some(inlined_styles),
                ctx.styles.as_deref(),
            ]),
            body_attrs: normalize_chunks([ctx.meta.body_attrs.as_deref()]),
            body_prepend: normalize_chunks([
                ctx.meta.body_scripts_prepend.as_deref(),
                ctx.teleports.get(BODY_TELEPORT).map(String::as_str),
            ]),
            body: match island {
                true => vec![],
                false => vec![rendered.html.clone()],
            },
            body_append: normalize_chunks([
                payload_script.as_deref(),
                Some(rendered.scripts.as_str()),
                ctx.meta.body_scripts.as_deref(),
            ]),
        }
    }
}

/// 抽取 payload 时只内联 `initial`，其余部分由 payload 模块导入后合并。
fn payload_script(ctx: &SsrContext<'_>) -> String {
    match &ctx.payload_url {
        Some(url) => {
            let initial = Value::Object(split_payload(&ctx.payload).initial);
            format!(
                r#"<script type="module">import p from "{}";window.{}={{...p,...({})}}</script>"#,
                url,
                PAYLOAD_GLOBAL,
                serialize_for_script(&initial)
            )
        }
        None => format!(
            "<script>window.{}={}</script>",
            PAYLOAD_GLOBAL,
            serialize_for_script(&Value::Object(ctx.payload.as_map().clone()))
        ),
    }
}

/// 去掉缺失与空白片段，其余裁剪首尾空白。
pub fn normalize_chunks<'a>(chunks: impl IntoIterator<Item = Option<&'a str>>) -> Vec<String> {
    chunks
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn render_html_document(html: &HtmlDocumentContext) -> String {
    format!(
        "<!DOCTYPE html>\n<html {}>\n<head>{}</head>\n<body {}>{}{}{}</body>\n</html>",
        html.html_attrs.join(" "),
        html.head.concat(),
        html.body_attrs.join(" "),
        html.body_prepend.concat(),
        html.body.concat(),
        html.body_append.concat()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        context::{Classification, RenderRequest},
        param::HttpRequestMethod,
        request::Request,
    };
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn rendered() -> Rendered {
        Rendered {
            html: r#"<div id="__app"><p>hi</p></div>"#.to_string(),
            resource_hints: r#"<link rel="modulepreload" as="script" crossorigin href="/_build/entry.js">"#.to_string(),
            styles: String::new(),
            scripts: r#"<script type="module" src="/_build/entry.js" crossorigin></script>"#.to_string(),
        }
    }

    fn page(url: &str) -> Classification {
        Classification {
            request: RenderRequest::Page { url: url.to_string() },
            no_ssr: false,
        }
    }

    #[test]
    fn test_empty_document_is_well_formed() {
        assert_eq!(
            render_html_document(&HtmlDocumentContext::default()),
            "<!DOCTYPE html>\n<html >\n<head></head>\n<body ></body>\n</html>"
        );
    }

    #[test]
    fn test_normalize_chunks() {
        assert_eq!(
            normalize_chunks([None, Some(""), Some("  <a>  "), Some(" \n"), Some("<b>")]),
            vec!["<a>", "<b>"]
        );
    }

    #[test]
    fn test_document_order() {
        let request = Request::new(HttpRequestMethod::Get, "/");
        let mut ctx = SsrContext::build(&page("/"), &request, Arc::default(), &Config::new());
        ctx.meta.html_attrs = Some(r#"lang="en""#.to_string());
        ctx.meta.head_tags = Some("<title>Home</title>".to_string());
        ctx.meta.body_attrs = Some(r#"class="dark""#.to_string());
        ctx.teleports.insert(BODY_TELEPORT.to_string(), "<div id=\"modal\"></div>".to_string());
        ctx.payload.state_mut().insert("n".to_string(), json!(1));

        let html = HtmlDocumentContext::build(&ctx, &rendered(), "<style>body{}</style>", false);
        let document = render_html_document(&html);

        assert!(document.starts_with("<!DOCTYPE html>\n<html lang=\"en\">\n<head><title>Home</title><link rel=\"modulepreload\""));
        assert!(document.contains("<style>body{}</style></head>"));
        assert!(document.contains(
            r#"<body class="dark"><div id="modal"></div><div id="__app"><p>hi</p></div><script>window.__SSR__={"state":{"n":1}}</script><script type="module""#
        ));
        assert!(document.ends_with("</body>\n</html>"));
    }

    #[test]
    fn test_no_scripts_omits_payload() {
        let request = Request::new(HttpRequestMethod::Get, "/");
        let ctx = SsrContext::build(&page("/"), &request, Arc::default(), &Config::new());

        let html = HtmlDocumentContext::build(&ctx, &rendered(), "", true);
        assert_eq!(html.body_append, vec![rendered().scripts]);
    }

    #[test]
    fn test_extracted_payload_script() {
        let mut config = Config::new();
        config.set_prerender(true).set_payload_extraction(true);
        let request = Request::new(HttpRequestMethod::Get, "/blog");
        let mut ctx = SsrContext::build(&page("/blog"), &request, Arc::default(), &config);
        ctx.payload.set_prerendered_at(1000);
        ctx.payload.data_mut().insert("big".to_string(), json!([1, 2, 3]));

        let html = HtmlDocumentContext::build(&ctx, &rendered(), "", false);

        assert_eq!(html.head[0], r#"<link rel="modulepreload" href="/blog/_payload.js">"#);
        assert_eq!(
            html.body_append[0],
            r#"<script type="module">import p from "/blog/_payload.js";window.__SSR__={...p,...({"prerenderedAt":1000})}</script>"#
        );
    }

    #[test]
    fn test_island_body_is_empty() {
        let request = Request::new(HttpRequestMethod::Get, "/__ssr_island/Card");
        let classification = Classification {
            request: RenderRequest::Island {
                url: "/".to_string(),
                island: crate::context::IslandContext {
                    id: None,
                    url: "/".to_string(),
                    format: None,
                    name: "Card".to_string(),
                    props: Default::default(),
                },
            },
            no_ssr: false,
        };
        let ctx = SsrContext::build(&classification, &request, Arc::default(), &Config::new());

        let html = HtmlDocumentContext::build(&ctx, &rendered(), "", false);
        assert!(html.island);
        assert!(html.body.is_empty());
    }

    proptest! {
        #[test]
        fn prop_normalized_chunks_are_trimmed_and_non_empty(
            chunks in prop::collection::vec(prop::option::of("[ \n\t]{0,2}[a-z<>]{0,6}[ \n\t]{0,2}"), 0..8)
        ) {
            let normalized = normalize_chunks(chunks.iter().map(|c| c.as_deref()));
            for chunk in &normalized {
                prop_assert!(!chunk.is_empty());
                prop_assert_eq!(chunk.trim(), chunk.as_str());
            }
            let expected = chunks.iter().flatten().filter(|c| !c.trim().is_empty()).count();
            prop_assert_eq!(normalized.len(), expected);
        }

        #[test]
        fn prop_document_never_contains_missing_markers(
            head in prop::collection::vec("[a-m]{1,5}", 0..4),
            body in prop::collection::vec("[a-m]{1,5}", 0..4),
        ) {
            let html = HtmlDocumentContext { head, body, ..Default::default() };
            let document = render_html_document(&html);
            prop_assert!(document.starts_with("<!DOCTYPE html>\n<html "));
            prop_assert!(document.ends_with("</body>\n</html>"));
            prop_assert!(!document.contains("undefined"));
            prop_assert!(!document.contains("null"));
        }
    }
}
