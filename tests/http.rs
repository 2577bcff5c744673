use indexmap::IndexMap;
use jspy_host::{
    HostError, Value,
    http::{decode_response, encode_body, host_functions},
};

fn helper(name: &str) -> Value {
    host_functions()
        .into_iter()
        .find(|(helper, _)| *helper == name)
        .map(|(_, function)| function)
        .expect("helper is registered")
}

#[test]
fn registers_all_four_helpers() {
    let names: Vec<&str> = host_functions().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["httpGet", "httpPost", "httpPut", "httpDelete"]);
}

#[test]
fn bodies_are_sent_verbatim_or_as_json() {
    assert_eq!(encode_body(&Value::string("raw=1")), "raw=1");

    let mut payload = IndexMap::new();
    payload.insert("id".to_string(), Value::int(7));
    payload.insert("tags".to_string(), Value::array(vec![Value::string("a")]));
    assert_eq!(encode_body(&Value::map(payload)), r#"{"id":7,"tags":["a"]}"#);
}

#[test]
fn json_responses_are_parsed() {
    let value = decode_response("application/json; charset=utf-8", r#"{"ok":true}"#.to_string());
    assert_eq!(value.get("ok"), Some(&Value::bool(true)));

    let text = decode_response("text/plain", r#"{"ok":true}"#.to_string());
    assert_eq!(text, Value::string(r#"{"ok":true}"#));

    let broken = decode_response("application/json", "not json".to_string());
    assert_eq!(broken, Value::string("not json"));
}

#[test]
fn missing_url_is_an_argument_error() {
    let function = helper("httpGet");
    let err = function
        .as_function()
        .expect("httpGet is a function")
        .call(&[])
        .expect_err("a URL is required");
    assert!(matches!(err, HostError::Runtime(_)));
}

#[test]
fn transport_failure_is_an_http_error() {
    let function = helper("httpDelete");
    let err = function
        .as_function()
        .expect("httpDelete is a function")
        .call(&[Value::string("http://127.0.0.1:1/resource")])
        .expect_err("nothing listens on port 1");
    match err {
        HostError::Http { url, .. } => assert_eq!(url, "http://127.0.0.1:1/resource"),
        other => panic!("expected http error, received {other}"),
    }
}
