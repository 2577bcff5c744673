//! Blocking HTTP helpers exposed to scripts as `httpGet`, `httpPost`, `httpPut`
//! and `httpDelete`, and as the `http`/`https` system packages.

use indexmap::IndexMap;

use crate::{
    error::{HostError, Result},
    log::SinkRef,
    value::{ModuleValue, VARIADIC, Value, ValueKind},
};

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// The four helpers keyed by the names scripts call them with.
pub fn host_functions() -> Vec<(&'static str, Value)> {
    vec![
        ("httpGet", Value::native("httpGet", VARIADIC, http_get)),
        ("httpPost", Value::native("httpPost", VARIADIC, http_post)),
        ("httpPut", Value::native("httpPut", VARIADIC, http_put)),
        (
            "httpDelete",
            Value::native("httpDelete", VARIADIC, http_delete),
        ),
    ]
}

pub(crate) fn module(_: &SinkRef) -> ModuleValue {
    ModuleValue {
        name: "http".to_string(),
        exports: [
            ("get", Value::native("get", VARIADIC, http_get)),
            ("post", Value::native("post", VARIADIC, http_post)),
            ("put", Value::native("put", VARIADIC, http_put)),
            ("delete", Value::native("delete", VARIADIC, http_delete)),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect(),
    }
}

fn http_get(args: &[Value]) -> Result<Value> {
    let url = url_arg(args, "httpGet")?;
    request(Method::Get, &url, None, headers_arg(args.get(1))?)
}

fn http_post(args: &[Value]) -> Result<Value> {
    let url = url_arg(args, "httpPost")?;
    request(Method::Post, &url, args.get(1), headers_arg(args.get(2))?)
}

fn http_put(args: &[Value]) -> Result<Value> {
    let url = url_arg(args, "httpPut")?;
    request(Method::Put, &url, args.get(1), headers_arg(args.get(2))?)
}

fn http_delete(args: &[Value]) -> Result<Value> {
    let url = url_arg(args, "httpDelete")?;
    request(Method::Delete, &url, None, headers_arg(args.get(1))?)
}

fn url_arg(args: &[Value], name: &str) -> Result<String> {
    match args.first() {
        Some(value) => value.as_str().map(str::to_string).ok_or_else(|| {
            HostError::runtime(format!(
                "`{name}` expected a URL string but found {}",
                value.type_name()
            ))
        }),
        None => Err(HostError::runtime(format!("`{name}` expected a URL"))),
    }
}

fn headers_arg(value: Option<&Value>) -> Result<IndexMap<String, String>> {
    match value.map(Value::kind) {
        None | Some(ValueKind::Null) => Ok(IndexMap::new()),
        Some(ValueKind::Map(map)) => Ok(map
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()),
        Some(_) => Err(HostError::runtime("request headers must be a map")),
    }
}

/// Serializes a request body: strings are sent verbatim, everything else as JSON.
pub fn encode_body(body: &Value) -> String {
    match body.kind() {
        ValueKind::String(text) => text.clone(),
        _ => body.to_json().to_string(),
    }
}

/// Parses JSON responses, keeping the raw text when the body is not valid JSON.
pub fn decode_response(content_type: &str, body: String) -> Value {
    if !content_type.contains(JSON_CONTENT_TYPE) {
        return Value::string(body);
    }
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(data) => Value::from(data),
        Err(err) => {
            tracing::warn!(error = %err, "response declared JSON but did not parse");
            Value::string(body)
        }
    }
}

fn request(
    method: Method,
    url: &str,
    body: Option<&Value>,
    headers: IndexMap<String, String>,
) -> Result<Value> {
    let mut req = ureq::request(method.as_str(), url);
    if body.is_some() {
        req = req.set("Content-Type", JSON_CONTENT_TYPE);
    }
    for (name, value) in &headers {
        req = req.set(name, value);
    }
    tracing::debug!(method = method.as_str(), url, "http request");

    let result = match body {
        Some(body) => req.send_string(&encode_body(body)),
        None => req.call(),
    };
    let response = match result {
        Ok(response) | Err(ureq::Error::Status(_, response)) => response,
        Err(err) => {
            return Err(HostError::Http {
                url: url.to_string(),
                message: err.to_string(),
            });
        }
    };
    let content_type = response
        .header("content-type")
        .unwrap_or_default()
        .to_string();
    let text = response
        .into_string()
        .map_err(|err| HostError::Http {
            url: url.to_string(),
            message: err.to_string(),
        })?;
    Ok(decode_response(&content_type, text))
}

