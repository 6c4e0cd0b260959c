//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then sends typed requests through
//! a `Session` backed by `UreqAdapter`. Exercises request building, the real
//! transport, outcome classification and cancellation together.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mock_server::User;
use typed_http::{
    AdapterConfig, BodyParameters, HttpMethod, HttpRequest, HttpResponse, JsonDataParser,
    RawBodyParameters, Request, RequestError, ResponseError, Session, SessionConfig, SessionError,
    StringDataParser, TransportErrorKind, UreqAdapter,
};
use uuid::Uuid;

/// Start the mock server on a background runtime and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn session() -> Session {
    Session::new(Arc::new(UreqAdapter::default()))
}

/// Send `request` and block until its handler runs.
fn send_and_wait<R: Request>(session: &Session, request: R) -> Result<R::Response, SessionError> {
    let (tx, rx) = mpsc::channel();
    session.send(request, move |result| {
        tx.send(result).unwrap();
    });
    rx.recv_timeout(Duration::from_secs(10))
        .expect("handler was not invoked")
}

struct ListUsers {
    base_url: String,
}

impl Request for ListUsers {
    type Response = Vec<User>;
    type Parser = JsonDataParser<Vec<User>>;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/users"
    }

    fn data_parser(&self) -> Self::Parser {
        JsonDataParser::new()
    }

    fn response(&self, object: Vec<User>, _: &HttpResponse) -> Result<Vec<User>, ResponseError> {
        Ok(object)
    }
}

struct CreateUser {
    base_url: String,
    name: String,
}

impl Request for CreateUser {
    type Response = User;
    type Parser = JsonDataParser<User>;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn path(&self) -> &str {
        "/users"
    }

    fn body_parameters(&self) -> Option<Box<dyn BodyParameters>> {
        let body = serde_json::json!({ "name": self.name }).to_string();
        Some(Box::new(RawBodyParameters::new(body, "application/json")))
    }

    fn data_parser(&self) -> Self::Parser {
        JsonDataParser::new()
    }

    fn validate_response(&self, response: &HttpResponse) -> Result<(), ResponseError> {
        match response.status {
            201 => Ok(()),
            status => Err(ResponseError::UnacceptableStatusCode(status)),
        }
    }

    fn response(&self, object: User, _: &HttpResponse) -> Result<User, ResponseError> {
        Ok(object)
    }
}

struct UserById {
    base_url: String,
    method: HttpMethod,
    path: String,
}

impl UserById {
    fn get(base_url: &str, id: Uuid) -> Self {
        Self {
            base_url: base_url.to_string(),
            method: HttpMethod::Get,
            path: format!("/users/{id}"),
        }
    }

    fn delete(base_url: &str, id: Uuid) -> Self {
        Self {
            method: HttpMethod::Delete,
            ..Self::get(base_url, id)
        }
    }
}

impl Request for UserById {
    type Response = Option<User>;
    type Parser = JsonDataParser<Option<User>>;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn data_parser(&self) -> Self::Parser {
        JsonDataParser::new()
    }

    fn response(&self, object: Option<User>, _: &HttpResponse) -> Result<Option<User>, ResponseError> {
        Ok(object)
    }
}

struct Echo {
    base_url: String,
    text: String,
}

impl Request for Echo {
    type Response = String;
    type Parser = StringDataParser;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn path(&self) -> &str {
        "echo"
    }

    fn body_parameters(&self) -> Option<Box<dyn BodyParameters>> {
        Some(Box::new(RawBodyParameters::new(self.text.as_str(), "text/plain")))
    }

    fn data_parser(&self) -> Self::Parser {
        StringDataParser
    }

    fn response(&self, object: String, response: &HttpResponse) -> Result<String, ResponseError> {
        match response.header("content-type") {
            Some("text/plain") => Ok(object),
            other => Err(ResponseError::UnexpectedObject(format!("content type {other:?}"))),
        }
    }
}

/// Signs requests in `intercept_request` and reads back the headers the
/// server saw.
struct SignedHeaders {
    base_url: String,
    key: Option<&'static str>,
}

impl Request for SignedHeaders {
    type Response = HashMap<String, String>;
    type Parser = JsonDataParser<HashMap<String, String>>;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/headers"
    }

    fn header_fields(&self) -> Vec<(String, String)> {
        vec![("X-Client".to_string(), "integration".to_string())]
    }

    fn data_parser(&self) -> Self::Parser {
        JsonDataParser::new()
    }

    fn intercept_request(&self, mut request: HttpRequest) -> Result<HttpRequest, RequestError> {
        let key = self
            .key
            .ok_or_else(|| RequestError::Intercept("no signing key".into()))?;
        request.set_header("X-Signature", format!("{key}:{}", request.url));
        Ok(request)
    }

    fn response(
        &self,
        object: HashMap<String, String>,
        _: &HttpResponse,
    ) -> Result<HashMap<String, String>, ResponseError> {
        Ok(object)
    }
}

struct Search {
    base_url: String,
    parameters: Vec<(String, String)>,
}

impl Request for Search {
    type Response = Vec<(String, String)>;
    type Parser = JsonDataParser<Vec<(String, String)>>;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/query"
    }

    fn parameters(&self) -> Vec<(String, String)> {
        self.parameters.clone()
    }

    fn data_parser(&self) -> Self::Parser {
        JsonDataParser::new()
    }

    fn response(
        &self,
        object: Vec<(String, String)>,
        _: &HttpResponse,
    ) -> Result<Vec<(String, String)>, ResponseError> {
        Ok(object)
    }
}

struct Slow {
    base_url: String,
    ms: u64,
}

impl Request for Slow {
    type Response = serde_json::Value;
    type Parser = JsonDataParser<serde_json::Value>;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/slow"
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![("ms".to_string(), self.ms.to_string())]
    }

    fn data_parser(&self) -> Self::Parser {
        JsonDataParser::new()
    }

    fn response(&self, object: serde_json::Value, _: &HttpResponse) -> Result<serde_json::Value, ResponseError> {
        Ok(object)
    }
}

#[test]
fn user_lifecycle() {
    let base_url = start_server();
    let session = session();

    // Step 1: list, should be empty.
    let users = send_and_wait(&session, ListUsers { base_url: base_url.clone() }).unwrap();
    assert!(users.is_empty(), "expected empty list");

    // Step 2: create.
    let created = send_and_wait(
        &session,
        CreateUser {
            base_url: base_url.clone(),
            name: "ada".to_string(),
        },
    )
    .unwrap();
    assert_eq!(created.name, "ada");

    // Step 3: fetch it back.
    let fetched = send_and_wait(&session, UserById::get(&base_url, created.id)).unwrap();
    assert_eq!(fetched, Some(created.clone()));

    // Step 4: delete; 204 has an empty body.
    let deleted = send_and_wait(&session, UserById::delete(&base_url, created.id)).unwrap();
    assert_eq!(deleted, None);

    // Step 5: fetch after delete is a 404.
    let err = send_and_wait(&session, UserById::get(&base_url, created.id)).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Response(ResponseError::UnacceptableStatusCode(404))
    ));
}

#[test]
fn body_headers_and_query_reach_the_server() {
    let base_url = start_server();
    let session = session();

    let echoed = send_and_wait(
        &session,
        Echo {
            base_url: format!("{base_url}/"),
            text: "ping".to_string(),
        },
    )
    .unwrap();
    assert_eq!(echoed, "ping");

    let headers = send_and_wait(
        &session,
        SignedHeaders {
            base_url: base_url.clone(),
            key: Some("k1"),
        },
    )
    .unwrap();
    assert_eq!(headers["x-client"], "integration");
    assert_eq!(headers["accept"], "application/json");
    assert_eq!(headers["x-signature"], format!("k1:{base_url}/headers"));

    let pairs = send_and_wait(
        &session,
        Search {
            base_url: base_url.clone(),
            parameters: vec![
                ("q".to_string(), "rust lang".to_string()),
                ("tag".to_string(), "a&b".to_string()),
            ],
        },
    )
    .unwrap();
    assert_eq!(
        pairs,
        vec![
            ("q".to_string(), "rust lang".to_string()),
            ("tag".to_string(), "a&b".to_string()),
        ]
    );
}

#[test]
fn request_errors_never_reach_the_network() {
    let session = session();

    let err = send_and_wait(
        &session,
        SignedHeaders {
            base_url: "http://127.0.0.1:1".to_string(),
            key: None,
        },
    )
    .unwrap_err();
    assert!(matches!(err, SessionError::Request(RequestError::Intercept(_))));

    let (tx, rx) = mpsc::channel();
    let task = session.send(
        ListUsers {
            base_url: "no scheme here".to_string(),
        },
        move |result| tx.send(result).unwrap(),
    );
    assert!(task.is_none());
    assert!(matches!(
        rx.recv_timeout(Duration::from_secs(1)).unwrap(),
        Err(SessionError::Request(RequestError::InvalidBaseUrl(_)))
    ));
}

#[test]
fn refused_connection_is_connection_error() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", closed.local_addr().unwrap());
    drop(closed);

    let err = send_and_wait(&session(), ListUsers { base_url }).unwrap_err();
    match err {
        SessionError::Connection(err) => assert!(!err.is_cancelled()),
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[test]
fn timeout_is_connection_error() {
    let base_url = start_server();
    let config = SessionConfig {
        adapter: AdapterConfig {
            timeout_ms: Some(200),
            ..AdapterConfig::default()
        },
        callback_queue: Some("timeout-callbacks".to_string()),
    };
    let session = Session::from_config(&config).unwrap();

    let err = send_and_wait(&session, Slow { base_url, ms: 3_000 }).unwrap_err();
    match err {
        SessionError::Connection(err) => assert_eq!(err.kind, TransportErrorKind::Timeout),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn cancel_requests_stops_only_matching_requests() {
    let base_url = start_server();
    let session = session();
    let (tx, rx) = mpsc::channel();

    let slow_tx = tx.clone();
    let slow = session
        .send(
            Slow {
                base_url: base_url.clone(),
                ms: 5_000,
            },
            move |result| slow_tx.send(("slow", result.map(|_| ()))).unwrap(),
        )
        .unwrap();
    let quick_tx = tx.clone();
    session.send(
        Slow {
            base_url: base_url.clone(),
            ms: 300,
        },
        move |result| quick_tx.send(("quick", result.map(|_| ()))).unwrap(),
    );
    session.send(ListUsers { base_url }, move |result| {
        tx.send(("list", result.map(|_| ()))).unwrap()
    });

    let started = Instant::now();
    session.cancel_requests::<Slow, _>(|request| request.ms >= 1_000);

    let mut seen = HashMap::new();
    for _ in 0..3 {
        let (name, result) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        seen.insert(name, result);
    }
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(seen["slow"].as_ref().unwrap_err().is_cancelled());
    assert!(seen["quick"].is_ok());
    assert!(seen["list"].is_ok());
    assert!(slow.state().is_terminal());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn response_future_over_network() {
    let base_url = start_server();
    let session = session();

    let created = session
        .response(CreateUser {
            base_url: base_url.clone(),
            name: "lin".to_string(),
        })
        .await
        .unwrap();
    let users = session.response(ListUsers { base_url }).await.unwrap();
    assert_eq!(users, vec![created]);
}
