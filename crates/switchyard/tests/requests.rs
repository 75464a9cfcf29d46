use proptest::prelude::*;
use serde_json::json;
use switchyard::{Params, Request, RequestFactory, RouteDefaults};

fn params(pairs: &[(String, String)]) -> Params {
    pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect()
}

proptest! {
    #[test]
    fn post_wins_over_get(
        name in "[a-z]{1,8}",
        get_value in "[a-z0-9]{1,8}",
        post_value in "[a-z0-9]{1,8}",
    ) {
        let request = Request::builder()
            .get(params(&[(name.clone(), get_value)]))
            .post(params(&[(name.clone(), post_value.clone())]))
            .build();

        prop_assert_eq!(request.param_str(&name), Some(post_value));
        prop_assert!(request.is_post(&name));
    }

    #[test]
    fn set_get_param_never_overrides_post(
        name in "[a-z]{1,8}",
        first in "[a-z]{1,8}",
        second in "[a-z]{1,8}",
    ) {
        let mut request = Request::default();
        request.set_post_param(name.clone(), first.clone());
        request.set_get_param(name.clone(), second);

        prop_assert_eq!(request.param_str(&name), Some(first));
        prop_assert!(!request.is_get(&name));
    }

    #[test]
    fn params_are_trimmed(value in " {0,3}[a-z]{1,8} {0,3}") {
        let request = Request::builder().get_param("q", value.clone()).build();
        prop_assert_eq!(request.param_str("q"), Some(value.trim().to_string()));
        prop_assert_eq!(request.raw_param("q"), Some(&json!(value)));
    }
}

#[test]
fn test_factory_applies_route_defaults() {
    let factory = RequestFactory::new(RouteDefaults {
        module: "blog".into(),
        controller: "post".into(),
        action: "list".into(),
    });
    let request = factory.builder().uri("/").build();
    assert_eq!(request.module_name(), "blog");
    assert_eq!(request.controller_name(), "post");
    assert_eq!(request.action_name(), "list");
}

#[test]
fn test_from_http_request() {
    let (parts, ()) = http::Request::builder()
        .method("POST")
        .uri("https://shop.example.com/cart/add?sku=42")
        .header("Cookie", "session=abc; theme=dark")
        .header("X-Requested-With", "XMLHttpRequest")
        .body(())
        .unwrap()
        .into_parts();

    let request = RequestFactory::default().from_http(&parts);
    assert_eq!(request.method(), Some("POST"));
    assert_eq!(request.host(), "shop.example.com");
    assert_eq!(request.scheme(), "https");
    assert_eq!(request.path(), "/cart/add");
    assert_eq!(request.query(), "sku=42");
    assert_eq!(request.cookie("theme"), Some("dark"));
    assert!(request.is_xml_http_request());
}
