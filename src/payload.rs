//! # payload 拆分
//!
//! 预渲染并开启 payload 抽取时，一次渲染的水合数据被拆成两部分：
//! 首屏立即需要的 `initial` 内联进文档，体积较大的 `data` 作为独立模块按需加载。

use serde_json::{Map, Value};

use crate::{context::{Payload, SsrContext}, response::RenderResponse, util::serialize_for_script};

#[derive(Debug, Clone, PartialEq)]
pub struct SplitPayload {
    /// 除 `data` 外的全部键（保留 `prerenderedAt`）
    pub initial: Map<String, Value>,
    /// `{data, prerenderedAt}`，只包含原本存在的键
    pub deferred: Map<String, Value>,
}

pub fn split_payload(payload: &Payload) -> SplitPayload {
    let mut initial = payload.as_map().clone();
    let mut deferred = Map::new();
    if let Some(data) = initial.remove("data") {
        deferred.insert("data".to_string(), data);
    }
    if let Some(prerendered_at) = initial.get("prerenderedAt") {
        deferred.insert("prerenderedAt".to_string(), prerendered_at.clone());
    }
    SplitPayload { initial, deferred }
}

/// payload 模块响应：`export default {deferred}`。状态码沿用渲染时写入的响应状态。
pub fn render_payload_response(ctx: &SsrContext<'_>) -> RenderResponse {
    let SplitPayload { deferred, .. } = split_payload(&ctx.payload);
    let body = format!("export default {}", serialize_for_script(&Value::Object(deferred)));
    RenderResponse::javascript(body).with_status(ctx.response.status_code, ctx.response.status_message.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        context::{Classification, RenderRequest},
        param::{HttpRequestMethod, CONTENT_TYPE_JAVASCRIPT},
        request::Request,
    };
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => Payload::from_map(map),
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_split_example() {
        let split = split_payload(&payload(json!({ "data": { "x": 1 }, "state": {}, "prerenderedAt": 1000 })));

        assert_eq!(Value::Object(split.initial), json!({ "state": {}, "prerenderedAt": 1000 }));
        assert_eq!(Value::Object(split.deferred), json!({ "data": { "x": 1 }, "prerenderedAt": 1000 }));
    }

    #[test]
    fn test_split_without_data() {
        let split = split_payload(&payload(json!({ "state": { "a": 1 } })));

        assert_eq!(Value::Object(split.initial), json!({ "state": { "a": 1 } }));
        assert!(split.deferred.is_empty());
    }

    #[test]
    fn test_payload_response() {
        let request = Request::new(HttpRequestMethod::Get, "/blog/_payload.js");
        let classification = Classification {
            request: RenderRequest::PayloadModule { url: "/blog".to_string() },
            no_ssr: false,
        };
        let mut ctx = SsrContext::build(&classification, &request, Arc::default(), &Config::new());
        ctx.payload.data_mut().insert("title".to_string(), json!("</script>"));
        ctx.payload.state_mut().insert("hidden".to_string(), json!(true));

        let response = render_payload_response(&ctx);

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.content_type(), Some(CONTENT_TYPE_JAVASCRIPT));
        assert_eq!(
            response.body(),
            r#"export default {"data":{"title":"\u003C\u002Fscript\u003E"}}"#
        );
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_split_then_join_is_identity(
            extra in prop::collection::btree_map("[a-zA-Z]{1,6}", json_leaf(), 0..6),
            data in prop::option::of(prop::collection::btree_map("[a-z]{1,4}", json_leaf(), 0..4)),
            prerendered_at in prop::option::of(0i64..i64::MAX),
        ) {
            let mut map: Map<String, Value> = extra.into_iter().collect();
            match data {
                Some(data) => { map.insert("data".to_string(), Value::Object(data.into_iter().collect())); }
                None => { map.remove("data"); }
            }
            match prerendered_at {
                Some(at) => { map.insert("prerenderedAt".to_string(), Value::from(at)); }
                None => { map.remove("prerenderedAt"); }
            }
            let original = Payload::from_map(map);

            let SplitPayload { initial, deferred } = split_payload(&original);
            prop_assert!(!initial.contains_key("data"));
            prop_assert!(deferred.keys().all(|k| k == "data" || k == "prerenderedAt"));

            let mut joined = initial;
            joined.extend(deferred);
            prop_assert_eq!(Payload::from_map(joined), original);
        }
    }
}
