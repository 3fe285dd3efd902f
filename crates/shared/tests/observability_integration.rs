//! 可观测性模块集成测试
//!
//! 覆盖指标记录、追踪上下文传播与中间件组合。

use std::collections::HashMap;

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use loyalty_shared::observability::metrics::{
        record_graphql_request, record_http_request, record_points_award,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("POST", "/extensions/cart", 200, 0.05);
        record_http_request("POST", "/extensions/cart", 201, 0.02);
        record_http_request("POST", "/subscriptions/order", 409, 0.08);
        record_http_request("GET", "/ready", 503, 0.01);
    }

    #[test]
    fn test_record_points_award() {
        record_points_award("cart", "awarded", Some(510));
        record_points_award("cart", "skipped", None);
        record_points_award("order", "awarded", Some(1000));
        record_points_award("order", "conflict", None);
        record_points_award("order", "failed", None);
    }

    #[test]
    fn test_record_graphql_request() {
        record_graphql_request("customer", "ok", 0.04);
        record_graphql_request("customObjects", "ok", 0.03);
        record_graphql_request("updateCustomer", "conflict", 0.06);
        record_graphql_request("cart", "error", 10.0);
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        record_http_request("", "", 0, 0.0);

        let long_path = "/extensions/".to_string() + &"x".repeat(1000);
        record_http_request("POST", &long_path, 200, 0.01);

        record_points_award("cart", "awarded", Some(u64::MAX));
        record_graphql_request("customer", "ok", 999.99);
    }
}

// ============================================================================
// 追踪上下文传播测试
// ============================================================================

mod tracing_tests {
    use super::*;
    use loyalty_shared::observability::tracing::{
        current_trace_id, extract_from_headers, inject_to_headers, set_parent_from_headers,
    };
    use opentelemetry::trace::TraceContextExt;

    #[test]
    fn test_extract_with_tracestate() {
        let mut headers = HashMap::new();
        headers.insert(
            "traceparent".to_string(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".to_string(),
        );
        headers.insert("tracestate".to_string(), "congo=t61rcWkgMzE".to_string());

        let context = extract_from_headers(&headers);
        let span_context = context.span().span_context().clone();

        assert!(span_context.is_valid());
        assert_eq!(span_context.span_id().to_string(), "00f067aa0ba902b7");
    }

    #[test]
    fn test_extract_from_malformed_traceparent() {
        let test_cases = [
            "",
            "invalid-format",
            "00-",
            "00-0af7651916cd43dd8448eb211c80319c",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331",
            "00-invalid-b7ad6b7169203331-01",
        ];

        for invalid in test_cases {
            let mut headers = HashMap::new();
            headers.insert("traceparent".to_string(), invalid.to_string());

            let context = extract_from_headers(&headers);
            assert!(
                !context.span().span_context().is_valid(),
                "traceparent {invalid:?} 不应被接受"
            );
        }
    }

    #[test]
    fn test_set_parent_without_subscriber_does_not_panic() {
        let mut headers = HashMap::new();
        headers.insert(
            "traceparent".to_string(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01".to_string(),
        );

        let span = tracing::info_span!("test");
        set_parent_from_headers(&span, &headers);
        let _entered = span.enter();

        let mut outgoing = HashMap::new();
        inject_to_headers(&mut outgoing);
        let _ = current_trace_id();
    }
}

// ============================================================================
// 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::{
        Router,
        body::Body,
        extract::Extension,
        http::{Request, StatusCode},
        middleware,
        routing::post,
    };
    use loyalty_shared::observability::middleware::{RequestId, http_tracing, request_id};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/extensions/cart",
                post(|Extension(id): Extension<RequestId>| async move { id.as_str().to_string() }),
            )
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[tokio::test]
    async fn test_request_id_visible_to_handler() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/extensions/cart")
                    .header("x-request-id", "req-abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-abc");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"req-abc");
    }
}
