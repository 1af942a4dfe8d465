// End-to-end gateway tests against a mock upstream
// Author: kelexine (https://github.com/kelexine)

use bytes::Bytes;
use futures::TryStreamExt;
use mockito::Matcher;
use restgate::models::{ResponseSource, TransportErrorKind};
use restgate::{
    fallback_fn, BodyCodec, GatewayBuilder, GatewayError, HttpMethod, Interceptor,
    InterfaceDescriptor, JsonCodec, NormalizedResponse, OperationDescriptor, Outcome,
    ParameterDescriptor, Reply, Result, ReturnShape, ServiceClient, TransportError,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct Repo {
    name: String,
    stars: u32,
}

/// Typed interface over the `github-service` alias.
struct GithubApi {
    client: ServiceClient,
}

impl GithubApi {
    async fn get_repos(&self, user: &str) -> Result<Outcome<Vec<Repo>>> {
        self.client.single("getRepos", vec![json!(user)]).await
    }
}

fn get_repos() -> OperationDescriptor {
    OperationDescriptor::new("getRepos", HttpMethod::Get, "/users/${userName}/repos")
        .param(ParameterDescriptor::path("userName"))
        .default_header("Accept", "application/json")
}

fn get_org_repos() -> OperationDescriptor {
    OperationDescriptor::new("getOrgRepos", HttpMethod::Get, "/orgs/${org}/repos")
        .param(ParameterDescriptor::path("org"))
        .param(ParameterDescriptor::query("page"))
        .param(ParameterDescriptor::query("perPage"))
}

#[tokio::test]
async fn test_get_repos_typed_interface() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/octo/repos")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"name":"hello-world","stars":42},{"name":"spoon-knife","stars":7}]"#)
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(get_repos()))
        .build()
        .unwrap();
    let api = GithubApi {
        client: gateway.service("github-service").unwrap(),
    };

    let repos = api.get_repos("octo").await.unwrap().value().unwrap();

    mock.assert_async().await;
    assert_eq!(
        repos,
        vec![
            Repo { name: "hello-world".to_string(), stars: 42 },
            Repo { name: "spoon-knife".to_string(), stars: 7 },
        ]
    );
}

#[tokio::test]
async fn test_query_parameters_on_the_wire() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/orgs/rust-lang/repos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("perPage".into(), "50".into()),
        ]))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(get_org_repos()))
        .build()
        .unwrap();
    let service = gateway.service("github-service").unwrap();
    let args = vec![json!("rust-lang"), json!(2), json!(50)];

    let context = service.prepare("getOrgRepos", &args).unwrap();
    assert_eq!(
        context.url,
        format!("{}/orgs/rust-lang/repos?page=2&perPage=50", server.url())
    );

    let outcome: Outcome<Vec<Value>> = service.single("getOrgRepos", args).await.unwrap();
    mock.assert_async().await;
    assert_eq!(outcome, Outcome::Value(Vec::new()));
}

#[tokio::test]
async fn test_reserved_characters_encoded_on_the_wire() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/search/a%2Fb%3Fx")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "R&D=1".into()),
            Matcher::UrlEncoded("lang".into(), "C#".into()),
        ]))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let search = OperationDescriptor::new("search", HttpMethod::Get, "/search/${dept}")
        .param(ParameterDescriptor::path("dept"))
        .param(ParameterDescriptor::query("q"))
        .param(ParameterDescriptor::query("lang"));
    let gateway = GatewayBuilder::new()
        .route("search-service", server.url())
        .interface(InterfaceDescriptor::new("search-service").operation(search))
        .build()
        .unwrap();
    let service = gateway.service("search-service").unwrap();
    let args = vec![json!("a/b?x"), json!("R&D=1"), json!("C#")];

    let context = service.prepare("search", &args).unwrap();
    assert_eq!(
        context.url,
        format!("{}/search/a%2Fb%3Fx?q=R%26D%3D1&lang=C%23", server.url())
    );

    let outcome: Outcome<Vec<Value>> = service.single("search", args).await.unwrap();
    mock.assert_async().await;
    assert_eq!(outcome, Outcome::Value(Vec::new()));
}

#[tokio::test]
async fn test_fallback_receives_args_and_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/orgs/rust-lang/repos")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let seen: Arc<Mutex<Option<(Vec<Value>, u16, String)>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(
            InterfaceDescriptor::new("github-service")
                .operation(get_org_repos().fallback("orgReposFallback")),
        )
        .fallback_fn("orgReposFallback", move |args: &[Value], error: &TransportError| {
            *captured.lock().unwrap() =
                Some((args.to_vec(), error.status_code(), error.body.clone()));
            Ok(json!([{"name": "cached", "stars": 0}]))
        })
        .build()
        .unwrap();

    let outcome: Outcome<Vec<Repo>> = gateway
        .service("github-service")
        .unwrap()
        .single("getOrgRepos", vec![json!("rust-lang"), json!(1), json!(10)])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(
        outcome,
        Outcome::Value(vec![Repo { name: "cached".to_string(), stars: 0 }])
    );
    let (args, status, body) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(args, vec![json!("rust-lang"), json!(1), json!(10)]);
    assert_eq!(status, 503);
    assert_eq!(body, "maintenance");
}

#[tokio::test]
async fn test_failing_fallback_is_terminal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users/octo/repos")
        .with_status(500)
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(get_repos().fallback("broken")))
        .fallback_fn("broken", |_: &[Value], _: &TransportError| {
            Err(anyhow::anyhow!("cache unavailable"))
        })
        .build()
        .unwrap();

    let result = gateway
        .service("github-service")
        .unwrap()
        .invoke("getRepos", vec![json!("octo")])
        .await;
    assert!(matches!(result, Err(GatewayError::Fallback { .. })));
}

#[tokio::test]
async fn test_no_fallback_single_failure_payload() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users/ghost/repos")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(get_repos()))
        .build()
        .unwrap();

    let outcome: Outcome<Vec<Repo>> = gateway
        .service("github-service")
        .unwrap()
        .single("getRepos", vec![json!("ghost")])
        .await
        .unwrap();

    let payload = outcome.failure().unwrap();
    assert_eq!(payload.status, 404);
    assert_eq!(payload.body, r#"{"message":"Not Found"}"#);
}

#[tokio::test]
async fn test_no_fallback_stream_yields_single_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/events")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("feed", server.url())
        .interface(InterfaceDescriptor::new("feed").operation(
            OperationDescriptor::new("events", HttpMethod::Get, "/events").returns(ReturnShape::Stream),
        ))
        .build()
        .unwrap();

    let stream = gateway
        .service("feed")
        .unwrap()
        .stream::<Value>("events", vec![])
        .await
        .unwrap();
    let items: Vec<Outcome<Value>> = stream.try_collect().await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].failure().unwrap().status, 502);
    assert_eq!(items[0].failure().unwrap().body, "bad gateway");
}

#[tokio::test]
async fn test_ndjson_stream_elements() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users/octo/repos")
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body("{\"name\":\"a\",\"stars\":1}\n{\"name\":\"b\",\"stars\":2}\n")
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(
            InterfaceDescriptor::new("github-service")
                .operation(get_repos().returns(ReturnShape::Stream)),
        )
        .build()
        .unwrap();

    let repos: Vec<Outcome<Repo>> = gateway
        .service("github-service")
        .unwrap()
        .stream::<Repo>("getRepos", vec![json!("octo")])
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(
        repos,
        vec![
            Outcome::Value(Repo { name: "a".to_string(), stars: 1 }),
            Outcome::Value(Repo { name: "b".to_string(), stars: 2 }),
        ]
    );
}

struct TraceInterceptor {
    responses: Arc<Mutex<Vec<NormalizedResponse>>>,
}

impl Interceptor for TraceInterceptor {
    fn pre_handle(&self, _args: &[Value], _body: Option<&Value>, headers: &mut HeaderMap) {
        headers.insert("x-trace-id", HeaderValue::from_static("trace-1"));
    }

    fn post_handle(&self, response: &NormalizedResponse) {
        self.responses.lock().unwrap().push(response.clone());
    }
}

#[tokio::test]
async fn test_interceptor_headers_reach_the_wire() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/octo/repos")
        .match_header("x-trace-id", "trace-1")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let other = server
        .mock("GET", "/status")
        .match_header("x-trace-id", Matcher::Missing)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let responses = Arc::new(Mutex::new(Vec::new()));
    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .route("status-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(get_repos()))
        .interface(
            InterfaceDescriptor::new("status-service")
                .operation(OperationDescriptor::new("status", HttpMethod::Get, "/status")),
        )
        .interceptor(
            ["github-service"],
            TraceInterceptor {
                responses: responses.clone(),
            },
        )
        .build()
        .unwrap();

    gateway
        .service("github-service")
        .unwrap()
        .invoke("getRepos", vec![json!("octo")])
        .await
        .unwrap();
    gateway
        .service("status-service")
        .unwrap()
        .invoke("status", vec![])
        .await
        .unwrap();

    mock.assert_async().await;
    other.assert_async().await;

    let responses = responses.lock().unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].operation_id, "getRepos");
    assert_eq!(responses[0].status.as_u16(), 200);
    assert_eq!(responses[0].source, ResponseSource::Upstream);
    assert_eq!(responses[0].url, format!("{}/users/octo/repos", server.url()));
}

#[tokio::test]
async fn test_header_binding_and_default_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/user")
        .match_header("x-github-api-version", "2022-11-28")
        .match_header("accept", "application/vnd.github+json")
        .with_status(200)
        .with_body(r#"{"login":"octo"}"#)
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(
            OperationDescriptor::new("me", HttpMethod::Get, "/user")
                .param(ParameterDescriptor::header("X-GitHub-Api-Version"))
                .default_header("Accept", "application/vnd.github+json"),
        ))
        .build()
        .unwrap();

    let outcome: Outcome<Value> = gateway
        .service("github-service")
        .unwrap()
        .single("me", vec![json!("2022-11-28")])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome, Outcome::Value(json!({"login": "octo"})));
}

struct CountingCodec {
    encoded: Arc<AtomicUsize>,
}

impl BodyCodec for CountingCodec {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn encode(&self, body: &Value) -> Result<Bytes> {
        self.encoded.fetch_add(1, Ordering::SeqCst);
        JsonCodec.encode(body)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        JsonCodec.decode(bytes)
    }
}

#[tokio::test]
async fn test_body_encoded_only_when_present() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/user/repos")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"name": "hello"})))
        .with_status(201)
        .with_body(r#"{"name":"hello","stars":0}"#)
        .create_async()
        .await;
    let list = server
        .mock("GET", "/users/octo/repos")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let encoded = Arc::new(AtomicUsize::new(0));
    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(
            InterfaceDescriptor::new("github-service")
                .operation(get_repos())
                .operation(
                    OperationDescriptor::new("createRepo", HttpMethod::Post, "/user/repos")
                        .param(ParameterDescriptor::body()),
                ),
        )
        .codec(CountingCodec {
            encoded: encoded.clone(),
        })
        .build()
        .unwrap();
    let service = gateway.service("github-service").unwrap();

    service.invoke("getRepos", vec![json!("octo")]).await.unwrap();
    assert_eq!(encoded.load(Ordering::SeqCst), 0);

    let created: Outcome<Repo> = service
        .single("createRepo", vec![json!({"name": "hello"})])
        .await
        .unwrap();
    assert_eq!(encoded.load(Ordering::SeqCst), 1);
    assert_eq!(created, Outcome::Value(Repo { name: "hello".to_string(), stars: 0 }));

    list.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn test_empty_shape_send() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/repos/octo/hello")
        .with_status(204)
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(
            OperationDescriptor::new("deleteRepo", HttpMethod::Delete, "/repos/${owner}/${repo}")
                .param(ParameterDescriptor::path("owner"))
                .param(ParameterDescriptor::path("repo"))
                .returns(ReturnShape::Empty),
        ))
        .build()
        .unwrap();

    gateway
        .service("github-service")
        .unwrap()
        .send("deleteRepo", vec![json!("octo"), json!("hello")])
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_refused_yields_502_payload() {
    // Reserve a port, then close it so nothing is listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let seen_kind = Arc::new(Mutex::new(None));
    let captured = seen_kind.clone();
    let gateway = GatewayBuilder::new()
        .route("github-service", format!("http://{}", addr))
        .interface(
            InterfaceDescriptor::new("github-service")
                .operation(get_repos())
                .operation(get_org_repos().fallback("inspect")),
        )
        .fallback_fn("inspect", move |_: &[Value], error: &TransportError| {
            *captured.lock().unwrap() = Some(error.kind);
            Ok(json!([]))
        })
        .build()
        .unwrap();
    let service = gateway.service("github-service").unwrap();

    let outcome: Outcome<Value> = service.single("getRepos", vec![json!("octo")]).await.unwrap();
    assert_eq!(outcome.failure().unwrap().status, 502);

    service
        .invoke("getOrgRepos", vec![json!("rust-lang"), json!(1), json!(10)])
        .await
        .unwrap();
    assert_eq!(*seen_kind.lock().unwrap(), Some(TransportErrorKind::Connect));
}

#[tokio::test]
async fn test_cancelled_call_skips_fallback() {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = invoked.clone();
    let gateway = GatewayBuilder::new()
        .route("slow-service", format!("http://{}", addr))
        .interface(InterfaceDescriptor::new("slow-service").operation(
            OperationDescriptor::new("wait", HttpMethod::Get, "/wait").fallback("never"),
        ))
        .fallback_fn("never", move |_: &[Value], _: &TransportError| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .build()
        .unwrap();
    let service = gateway.service("slow-service").unwrap();

    let result = tokio::time::timeout(
        Duration::from_millis(200),
        service.invoke("wait", vec![]),
    )
    .await;

    assert!(result.is_err(), "call should still be pending when cancelled");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    silent.abort();
}

#[tokio::test]
async fn test_invalid_json_on_success_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users/octo/repos")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(get_repos()))
        .build()
        .unwrap();

    let result = gateway
        .service("github-service")
        .unwrap()
        .invoke("getRepos", vec![json!("octo")])
        .await;
    assert!(matches!(result, Err(GatewayError::Decode { .. })));
}

#[tokio::test]
async fn test_call_surface_errors() {
    let gateway = GatewayBuilder::new()
        .route("github-service", "http://127.0.0.1:9")
        .interface(
            InterfaceDescriptor::new("github-service")
                .operation(get_repos().returns(ReturnShape::Stream)),
        )
        .build()
        .unwrap();

    assert!(matches!(
        gateway.service("unknown"),
        Err(GatewayError::UnknownAlias(_))
    ));

    let service = gateway.service("github-service").unwrap();
    assert!(matches!(
        service.invoke("missing", vec![]).await,
        Err(GatewayError::UnknownOperation { .. })
    ));
    assert!(matches!(
        service.invoke("getRepos", vec![]).await,
        Err(GatewayError::ArgumentCount { expected: 1, actual: 0, .. })
    ));
    assert!(matches!(
        service.single::<Value>("getRepos", vec![json!("octo")]).await,
        Err(GatewayError::ShapeMismatch { declared: "stream", requested: "single", .. })
    ));
}

#[tokio::test]
async fn test_concurrent_calls_share_gateway() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Regex(r"^/users/user\d+/repos$".to_string()))
        .with_status(200)
        .with_body("[]")
        .expect(8)
        .create_async()
        .await;

    let gateway = GatewayBuilder::new()
        .route("github-service", server.url())
        .interface(InterfaceDescriptor::new("github-service").operation(get_repos()))
        .build()
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            let service = gateway.service("github-service").unwrap();
            service
                .single::<Vec<Repo>>("getRepos", vec![json!(format!("user{}", i))])
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().value().unwrap().is_empty());
    }
    mock.assert_async().await;
}
