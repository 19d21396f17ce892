//! Common test utilities for E2E tests
//!
//! `TestServer` runs the real router on a random port. Its GitHub endpoints
//! point at a `MockGitHub` served from another random port, so the whole
//! login flow runs over HTTP.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use octodash::{AppState, config};
use reqwest::header::{LOCATION, SET_COOKIE};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const COOKIE_NAME: &str = "octodash_session";

/// Recorded calls and canned responses of the fake GitHub
pub struct MockState {
    token_response: Mutex<(StatusCode, Value)>,
    token_delay: Mutex<Duration>,
    user_response: Mutex<(StatusCode, Value)>,
    pub token_calls: AtomicUsize,
    pub user_calls: AtomicUsize,
    pub last_token_form: Mutex<Option<HashMap<String, String>>>,
    pub last_token_accept: Mutex<Option<String>>,
    pub last_authorization: Mutex<Option<String>>,
}

/// Fake GitHub token and user endpoints
#[derive(Clone)]
pub struct MockGitHub {
    pub addr: String,
    pub state: Arc<MockState>,
}

impl MockGitHub {
    /// Start a mock that issues `tok1` and returns the octo user
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            token_response: Mutex::new((StatusCode::OK, json!({ "access_token": "tok1" }))),
            token_delay: Mutex::new(Duration::ZERO),
            user_response: Mutex::new((
                StatusCode::OK,
                json!({
                    "login": "octo",
                    "name": "Octo Cat",
                    "avatar_url": "http://x/a.png",
                    "public_repos": 8
                }),
            )),
            token_calls: AtomicUsize::new(0),
            user_calls: AtomicUsize::new(0),
            last_token_form: Mutex::new(None),
            last_token_accept: Mutex::new(None),
            last_authorization: Mutex::new(None),
        });

        let app = Router::new()
            .route("/login/oauth/access_token", post(token_endpoint))
            .route("/user", get(user_endpoint))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn set_token_response(&self, status: StatusCode, body: Value) {
        *self.state.token_response.lock().unwrap() = (status, body);
    }

    /// Make the token endpoint stall before answering
    pub fn set_token_delay(&self, delay: Duration) {
        *self.state.token_delay.lock().unwrap() = delay;
    }

    pub fn set_user_response(&self, status: StatusCode, body: Value) {
        *self.state.user_response.lock().unwrap() = (status, body);
    }

    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn user_calls(&self) -> usize {
        self.state.user_calls.load(Ordering::SeqCst)
    }

    pub fn last_token_form(&self) -> HashMap<String, String> {
        self.state
            .last_token_form
            .lock()
            .unwrap()
            .clone()
            .expect("token endpoint was called")
    }
}

async fn token_endpoint(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_token_form.lock().unwrap() = Some(form);
    *state.last_token_accept.lock().unwrap() = headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let delay = *state.token_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = state.token_response.lock().unwrap().clone();
    (status, Json(body))
}

async fn user_endpoint(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.user_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let (status, body) = state.user_response.lock().unwrap().clone();
    (status, Json(body))
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: MockGitHub,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a test server with OAuth credentials configured
    pub async fn new() -> Self {
        Self::build(true, 10).await
    }

    /// Create a test server without OAuth credentials
    pub async fn without_credentials() -> Self {
        Self::build(false, 10).await
    }

    /// Create a test server whose GitHub requests time out after `seconds`
    pub async fn with_github_timeout(seconds: u64) -> Self {
        Self::build(true, seconds).await
    }

    async fn build(with_credentials: bool, github_timeout_seconds: u64) -> Self {
        octodash::metrics::init_metrics();

        let github = MockGitHub::start().await;

        // Bind first so the public URL (the redirect URI) is known
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_url: format!("{addr}/"),
            },
            github: config::GitHubOAuthConfig {
                client_id: with_credentials.then(|| "test-client-id".to_string()),
                client_secret: with_credentials.then(|| "test-client-secret".to_string()),
                authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: format!("{}/login/oauth/access_token", github.addr),
                user_api_url: format!("{}/user", github.addr),
                scope: "read:user".to_string(),
                timeout_seconds: github_timeout_seconds,
            },
            session: config::SessionConfig {
                cookie_name: COOKIE_NAME.to_string(),
                secret: Some("test-secret-key-32-bytes-long!!!".to_string()),
                idle_timeout_seconds: 3600,
            },
            dashboard: config::DashboardConfig {
                data_ttl_seconds: 60,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        let app = octodash::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            github,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET a path, optionally with a session cookie
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// Start a login: returns the session cookie and the state GitHub would
    /// echo back
    pub async fn start_login(&self) -> (String, String) {
        let response = self.get("/auth/github", None).await;
        assert!(response.status().is_redirection());

        let cookie = session_cookie(&response).expect("session cookie is set");
        let state = query_param(&location(&response), "state").expect("state parameter");
        (cookie, state)
    }

    /// Run the whole login flow against the mock and return the cookie
    pub async fn login(&self) -> String {
        let (cookie, state) = self.start_login().await;
        let response = self
            .get(&format!("/?code=abc&state={state}"), Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        cookie
    }
}

/// `name=value` of the session cookie set by a response
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{COOKIE_NAME}=")))
        .and_then(|v| v.split(';').next())
        .map(ToString::to_string)
}

/// All Set-Cookie header values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
