use requests_kit::{
    bail, find, find_as, header, path, Body, Client, Dict, Error, HeaderValue, InterceptorChain,
    List, Method, PathStep, Request, RequestOption, Response, Result, ResultExt, SessionOptions,
    StatusCode, Transport, Value,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Answers with a JSON document describing what it received.
struct Mirror;

impl Transport for Mirror {
    type Error = Error;

    async fn send(&self, request: &mut Request) -> Result<Response> {
        let body = request.into_string().await?;
        let cookie = request
            .get_header(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let document = json!({
            "method": request.method().as_str(),
            "uri": request.uri().to_string(),
            "cookie": cookie,
            "body": body.as_str(),
        });

        let body = Body::from_json(&document).status(StatusCode::INTERNAL_SERVER_ERROR)?;
        Ok(Response::new(StatusCode::OK, body)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(header::SET_COOKIE, HeaderValue::from_static("visits=1; Path=/")))
    }
}

#[derive(Debug, Deserialize)]
struct Echoed {
    method: String,
    uri: String,
    cookie: String,
    body: String,
}

#[tokio::test]
async fn test_client_round_trip() {
    #[derive(Serialize)]
    struct NewUser<'a> {
        name: &'a str,
    }

    let client = Client::new(Mirror);
    let mut response = client
        .post(
            "http://api.example.com/users?v=2",
            [
                RequestOption::params([("dry_run", "true")]),
                RequestOption::json(&NewUser { name: "ada" }).unwrap(),
            ],
        )
        .await
        .unwrap();

    let echoed: Echoed = response.decode().await.unwrap();
    assert_eq!(echoed.method, "POST");
    assert_eq!(echoed.uri, "http://api.example.com/users?v=2&dry_run=true");
    assert_eq!(echoed.body, r#"{"name":"ada"}"#);

    let tree = response.tree().await.unwrap();
    assert_eq!(find_as::<&str>(&tree, &path!["method"]), Some("POST"));
}

#[tokio::test]
async fn test_client_interceptors_in_order() {
    let client = Client::new(Mirror);
    let log = Arc::new(Mutex::new(Vec::new()));

    for stage in ["auth", "trace"] {
        let log = log.clone();
        client.request_interceptors().add(move |request: &mut Request| {
            log.lock().unwrap().push(stage);
            request.insert_header(
                header::HeaderName::from_static("x-stage"),
                HeaderValue::from_static(stage),
            );
            Ok(())
        });
    }
    let response_log = log.clone();
    client.response_interceptors().add(move |_: &mut Response| {
        response_log.lock().unwrap().push("response");
        Ok(())
    });

    client.get("http://example.com/", []).await.unwrap();
    assert_eq!(*log.lock().unwrap(), ["auth", "trace", "response"]);

    client.request_interceptors().clear();
    client.response_interceptors().clear();
    client.get("http://example.com/", []).await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[cfg(feature = "cookie")]
#[tokio::test]
async fn test_client_session_cookies() {
    let client = Client::with_options(Mirror, SessionOptions::default().with_cookie_jar());

    let first: Echoed = client
        .get("http://example.com/", [])
        .await
        .unwrap()
        .decode()
        .await
        .unwrap();
    assert_eq!(first.cookie, "");

    let second: Echoed = client
        .get("http://example.com/page", [])
        .await
        .unwrap()
        .decode()
        .await
        .unwrap();
    assert_eq!(second.cookie, "visits=1");
    assert_eq!(client.cookies().len(), 1);
}

#[tokio::test]
async fn test_client_short_circuit() {
    let client = Client::new(Mirror);
    let ran = Arc::new(Mutex::new(Vec::new()));

    let s1 = ran.clone();
    client.request_interceptors().add(move |_: &mut Request| {
        s1.lock().unwrap().push("s1");
        Ok(())
    });
    let s2 = ran.clone();
    client.request_interceptors().add(move |_: &mut Request| {
        s2.lock().unwrap().push("s2");
        bail!(401, "missing credentials")
    });
    let s3 = ran.clone();
    client.request_interceptors().add(move |_: &mut Request| {
        s3.lock().unwrap().push("s3");
        Ok(())
    });

    let err = client.get("http://example.com/", []).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.to_string(), "missing credentials");
    assert_eq!(*ran.lock().unwrap(), ["s1", "s2"]);
}

#[test]
fn test_chain_over_plain_payload() {
    let chain = InterceptorChain::<String>::new();
    chain.add(|text: &mut String| {
        text.push('a');
        Ok(())
    });
    chain.add(|text: &mut String| {
        text.push('b');
        Ok(())
    });

    let mut text = String::new();
    chain.run(&mut text).unwrap();
    assert_eq!(text, "ab");

    let empty = InterceptorChain::<String>::default();
    assert!(empty.run(&mut text).is_ok());
}

#[test]
fn test_find_scenarios() {
    let tree = Value::from(json!({"abc": [123, 456, 789]}));
    assert_eq!(find_as::<i64>(&tree, &path!["abc", 2]), Some(789));
    assert_eq!(find(&tree, &path!["abc", 3]), None);
    assert_eq!(find(&tree, &path!["missing"]), None);
    assert_eq!(find(&tree, &path![0]), None);

    let tree = Value::from(json!(["abc", [123, 456, 789, {"def": 111}]]));
    assert_eq!(find_as::<i64>(&tree, &path![1, 3, "def"]), Some(111));
    let nested = find_as::<&Dict>(&tree, &path![1, 3]).unwrap();
    assert_eq!(nested.get("def"), Some(&Value::from(111i64)));
    assert_eq!(find(&tree, &path!["abc"]), None);
    assert_eq!(find_as::<&List>(&tree, &path![1]).map(Vec::len), Some(4));

    assert_eq!(find(&Value::Null, &[]), Some(&Value::Null));
    assert_eq!(find(&Value::Null, &path!["a"]), None);
}

#[test]
fn test_find_as_is_exact() {
    let tree: Value = [
        ("byte", Value::from(7u8)),
        ("word", Value::from("seven")),
        ("flag", Value::from(true)),
    ]
    .into_iter()
    .collect();

    assert_eq!(tree.find_as::<u8>(&path!["byte"]), Some(7));
    assert_eq!(tree.find_as::<u16>(&path!["byte"]), None);
    assert_eq!(tree.find_as::<i32>(&path!["word"]), None);
    assert_eq!(tree.find_as::<String>(&path!["word"]), Some("seven".to_string()));
    assert_eq!(tree.find_as::<bool>(&path!["flag"]), Some(true));

    let steps: Vec<PathStep> = vec!["word".into()];
    assert_eq!(tree.find(&steps).and_then(Value::as_str), Some("seven"));
}

#[test]
fn test_error_functionality() {
    let error = Error::msg("Test error");
    assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(format!("{}", error), "Test error");

    let error_404 = Error::msg("Not found").set_status(StatusCode::NOT_FOUND);
    assert_eq!(error_404.status(), StatusCode::NOT_FOUND);
    assert_eq!(format!("{}", error_404), "Not found");

    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
    let error = Error::new(io_error, StatusCode::FORBIDDEN);
    let downcasted = error.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(downcasted.kind(), std::io::ErrorKind::PermissionDenied);
}

#[test]
fn test_result_ext_functionality() {
    fn fallible() -> Result<()> {
        Err(std::io::Error::other("permission denied")).status(StatusCode::INTERNAL_SERVER_ERROR)?;
        Ok(())
    }

    let err = fallible().unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.to_string(), "permission denied");

    let option: Option<i32> = None;
    assert_eq!(option.status(StatusCode::BAD_REQUEST).unwrap_err().status(), StatusCode::BAD_REQUEST);
    assert_eq!(Some(42).status(StatusCode::BAD_REQUEST).unwrap(), 42);
}

#[test]
fn test_request_building() {
    let request = Request::with_options(
        Method::DELETE,
        "https://example.com/items/9",
        [RequestOption::headers([("authorization", "Bearer t")])],
    )
    .unwrap();
    assert_eq!(request.method(), Method::DELETE);
    assert_eq!(request.get_header(header::AUTHORIZATION).unwrap(), "Bearer t");
}
