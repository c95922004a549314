//! Shared fixtures: an in-memory bunq server and scripted transports.

#![allow(dead_code)]

use async_trait::async_trait;
use bunq_sdk::{
    Config, Environment, HttpRequest, HttpResponse, KeyPair, PublicKey, SdkResult, Transport,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use tokio::time::Instant;

pub const BASE_URL: &str = "https://bunq.test/v1";
pub const API_KEY: &str = "sandbox_0123456789";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn client_keypair() -> KeyPair {
    static KEYPAIR: OnceLock<KeyPair> = OnceLock::new();
    KEYPAIR.get_or_init(|| KeyPair::generate().unwrap()).clone()
}

pub fn server_keypair() -> &'static KeyPair {
    static KEYPAIR: OnceLock<KeyPair> = OnceLock::new();
    KEYPAIR.get_or_init(|| KeyPair::generate().unwrap())
}

pub fn test_config() -> Config {
    Config::new(API_KEY, Environment::Custom(BASE_URL.to_string()))
}

pub fn response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: body.to_string().into_bytes(),
    }
}

pub fn with_header(mut response: HttpResponse, name: &'static str, value: &str) -> HttpResponse {
    response
        .headers
        .insert(HeaderName::from_static(name), HeaderValue::from_str(value).unwrap());
    response
}

pub fn error_body(message: &str) -> Value {
    json!({"Error": [{"error_description": message}]})
}

/// Path relative to the base URL, without the query string
pub fn path_of(request: &HttpRequest) -> String {
    let rest = request.url.strip_prefix(BASE_URL).unwrap_or(&request.url);
    rest.trim_start_matches('/')
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Value of a query parameter
pub fn query_param(request: &HttpRequest, name: &str) -> Option<String> {
    let url = reqwest::Url::parse(&request.url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Transport answering every request with a closure, recording call times
pub struct MockTransport {
    handler: Box<dyn Fn(usize, &HttpRequest) -> HttpResponse + Send + Sync>,
    calls: AtomicUsize,
    pub requests: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(usize, &HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> SdkResult<HttpResponse> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = (self.handler)(index, &request);
        self.requests.lock().unwrap().push((Instant::now(), request));
        Ok(response)
    }
}

/// In-memory bunq server implementing the handshake
///
/// Verifies client signatures with the installed key, signs every response
/// with the server key, and hands anything outside the handshake to
/// `resources`.
pub struct FakeBunq {
    pub user_id: u64,
    pub session_timeout: u64,
    pub omit_session_token: bool,
    pub omit_installation_token: bool,
    pub accounts: Value,
    pub device_status: u16,
    /// Responses for paths starting with this prefix get a bad signature
    pub corrupt_signature_for: Option<&'static str>,
    pub resources: Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>,
    pub(crate) client_key: Mutex<Option<PublicKey>>,
    pub(crate) session_counter: AtomicU64,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl Default for FakeBunq {
    fn default() -> Self {
        Self {
            user_id: 1,
            session_timeout: 3600,
            omit_session_token: false,
            omit_installation_token: false,
            accounts: json!({"Response": [
                {"MonetaryAccountBank": {"id": 10, "status": "CANCELLED"}},
                {"MonetaryAccountBank": {"id": 11, "status": "ACTIVE"}}
            ]}),
            device_status: 200,
            corrupt_signature_for: None,
            resources: Box::new(|_: &HttpRequest| response(404, error_body("Route not found."))),
            client_key: Mutex::new(None),
            session_counter: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBunq {
    /// Number of recorded requests to `path`
    pub fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path_of(r) == path)
            .count()
    }

    pub fn recorded(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path_of(r) == path)
            .cloned()
            .collect()
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let path = path_of(request);

        if request.header("x-bunq-client-authentication").is_some() {
            let key = self.client_key.lock().unwrap().clone();
            let signature = request.header("x-bunq-client-signature").unwrap_or_default();
            let valid = key
                .map(|k| bunq_crypto::verify(&k, &request.body, signature).is_ok())
                .unwrap_or(false);
            if !valid {
                return response(400, error_body("Request signature is invalid."));
            }
        }

        match path.as_str() {
            "installation" => self.install(request),
            "device-server" => {
                if self.device_status == 200 {
                    response(200, json!({"Response": [{"Id": {"id": 5}}]}))
                } else {
                    response(self.device_status, error_body("Device rejected."))
                }
            }
            "session-server" => self.open_session(),
            p if p == format!("user/{}/monetary-account", self.user_id) => {
                response(200, self.accounts.clone())
            }
            _ => (self.resources)(request),
        }
    }

    fn install(&self, request: &HttpRequest) -> HttpResponse {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let pem = body["client_public_key"].as_str().unwrap();
        *self.client_key.lock().unwrap() = Some(PublicKey::from_pem(pem).unwrap());

        let mut entries = vec![json!({"Id": {"id": 1}})];
        if !self.omit_installation_token {
            entries.push(json!({"Token": {"token": "installation-token"}}));
        }
        entries.push(json!({"ServerPublicKey": {
            "server_public_key": server_keypair().public_key().to_pem().unwrap()
        }}));
        response(200, json!({ "Response": entries }))
    }

    fn open_session(&self) -> HttpResponse {
        let n = self.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut entries = vec![json!({"Id": {"id": 100 + n}})];
        if !self.omit_session_token {
            entries.push(json!({"Token": {"token": format!("session-token-{n}")}}));
        }
        entries.push(json!({"UserPerson": {
            "id": self.user_id,
            "session_timeout": self.session_timeout,
            "display_name": "Test User"
        }}));
        response(200, json!({ "Response": entries }))
    }

    fn sign(&self, request: &HttpRequest, mut response: HttpResponse) -> HttpResponse {
        let corrupt = self
            .corrupt_signature_for
            .map(|prefix| path_of(request).starts_with(prefix))
            .unwrap_or(false);
        let signed: &[u8] = if corrupt { b"something else" } else { &response.body };
        let signature = bunq_crypto::sign(server_keypair(), signed).unwrap();
        response.headers.insert(
            HeaderName::from_static("x-bunq-server-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        );
        let n = self.requests.lock().unwrap().len();
        with_header(response, "x-bunq-client-response-id", &format!("resp-{n}"))
    }
}

#[async_trait]
impl Transport for FakeBunq {
    async fn send(&self, request: HttpRequest) -> SdkResult<HttpResponse> {
        let response = self.handle(&request);
        let response = self.sign(&request, response);
        self.requests.lock().unwrap().push(request);
        Ok(response)
    }
}
