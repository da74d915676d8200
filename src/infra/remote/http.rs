//! HTTP adapter for a PostgREST table API plus a GoTrue auth API.

use std::sync::Mutex;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::application::gateway::{
    AuthError, AuthGateway, AuthReason, CreatePostParams, CreateProfileParams, CreateTodoParams,
    Credentials, GatewayError, PostsGateway, ProfilesGateway, ProviderSignIn, TodosGateway,
    UpdatePostParams, UpdateTodoParams,
};
use crate::config::RemoteSettings;
use crate::domain::entities::{
    PostId, PostRecord, ProfileRecord, RemoteTodo, Session, SessionUser, TodoId,
};
use crate::infra::error::InfraError;
use crate::stores::SessionStore;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
const NO_ROWS_CODE: &str = "PGRST116";

const TODOS: &str = "rest/v1/todos";
const POSTS: &str = "rest/v1/posts";
const PROFILES: &str = "rest/v1/profiles";

pub fn user_agent() -> &'static str {
    concat!("quire/", env!("CARGO_PKG_VERSION"))
}

/// Gateway over HTTP. Requests carry the `apikey` header and the signed-in
/// user's bearer token, falling back to the api key when signed out.
pub struct RestGateway {
    client: Client,
    base: Url,
    api_key: Option<String>,
    redirect_url: Option<Url>,
    session: SessionStore,
    pkce_verifier: Mutex<Option<String>>,
}

impl RestGateway {
    pub fn new(settings: &RemoteSettings, session: SessionStore) -> Result<Self, InfraError> {
        let base = settings
            .url
            .clone()
            .ok_or_else(|| InfraError::configuration("remote.url is not set"))?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            base,
            api_key: settings.api_key.clone(),
            redirect_url: settings.redirect_url.clone(),
            session,
            pkce_verifier: Mutex::new(None),
        })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, GatewayError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| GatewayError::remote(format!("invalid endpoint `{path}`: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = self.api_key.as_deref()
            && let Ok(value) = HeaderValue::from_str(key)
        {
            headers.insert("apikey", value);
        }
        let bearer = self.session.access_token().or_else(|| self.api_key.clone());
        if let Some(token) = bearer
            && let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}"))
        {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, url = %url, "remote request");
        self.client.request(method, url).headers(self.headers())
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GatewayError> {
        let url = self.url(table, query)?;
        let response = self.request(Method::GET, url).send().await.map_err(transport)?;
        decode(response, "rows").await
    }

    async fn single<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        entity: &'static str,
    ) -> Result<T, GatewayError> {
        let url = self.url(table, query)?;
        let response = self
            .request(Method::GET, url)
            .header(ACCEPT, SINGLE_OBJECT)
            .send()
            .await
            .map_err(transport)?;
        decode(response, entity).await
    }

    async fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        query: &[(&str, String)],
        body: Value,
        entity: &'static str,
    ) -> Result<T, GatewayError> {
        let url = self.url(table, query)?;
        let response = self
            .request(method, url)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        decode(response, entity).await
    }

    async fn token(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let url = self
            .url("auth/v1/token", &[("grant_type", grant_type.to_string())])
            .map_err(|err| AuthError::new(AuthReason::Transport(err.to_string())))?;
        let response = self
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(auth_transport)?;
        let token: TokenResponse = decode_auth(response).await?;
        Ok(token.into_session(OffsetDateTime::now_utc()))
    }

    fn take_verifier(&self) -> Option<String> {
        self.pkce_verifier
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn store_verifier(&self, verifier: String) {
        *self
            .pkce_verifier
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(verifier);
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::remote(err.to_string())
}

fn auth_transport(err: reqwest::Error) -> AuthError {
    AuthError::new(AuthReason::Transport(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Map a non-success table response onto a gateway error.
fn rest_error(status: StatusCode, body: &[u8], entity: &'static str) -> GatewayError {
    let parsed: RestErrorBody = serde_json::from_slice(body).unwrap_or_default();
    if status == StatusCode::NOT_ACCEPTABLE || parsed.code.as_deref() == Some(NO_ROWS_CODE) {
        return GatewayError::not_found(entity);
    }
    let message = parsed
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    GatewayError::remote(format!("status {status}: {message}"))
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    entity: &'static str,
) -> Result<T, GatewayError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport)?;
    if !status.is_success() {
        let error = rest_error(status, &bytes, entity);
        warn!(status = %status, entity, error = %error, "remote request failed");
        return Err(error);
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| GatewayError::remote(format!("failed to parse {entity}: {err}")))
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error_code: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn auth_error(status: StatusCode, body: &[u8]) -> AuthError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return AuthReason::RateLimited.into();
    }
    let parsed: AuthErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let code = parsed.error_code.or(parsed.error).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.error_description)
        .unwrap_or_else(|| format!("status {status}"));
    AuthReason::from_code(&code, &message).into()
}

async fn decode_auth<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(auth_transport)?;
    if !status.is_success() {
        let error = auth_error(status, &bytes);
        warn!(status = %status, error = %error, "auth request failed");
        return Err(error);
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| AuthError::new(AuthReason::Other(format!("unexpected auth response: {err}"))))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: OffsetDateTime) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now + time::Duration::seconds(self.expires_in),
            user: SessionUser {
                id: self.user.id,
                email: self.user.email,
            },
        }
    }
}

/// Sign-up answers with a token pair, or with the bare user when the address
/// still has to be confirmed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    Pending(AuthUser),
}

/// PKCE `S256` challenge for `verifier`.
fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..])
}

fn new_verifier() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[async_trait]
impl TodosGateway for RestGateway {
    async fn fetch_all(&self) -> Result<Vec<RemoteTodo>, GatewayError> {
        self.rows(
            TODOS,
            &[("select", "*".to_string()), ("order", "id.asc".to_string())],
        )
        .await
    }

    async fn fetch_by_id(&self, id: TodoId) -> Result<RemoteTodo, GatewayError> {
        self.single(TODOS, &[("select", "*".to_string()), ("id", eq(id))], "todo")
            .await
    }

    async fn create(&self, params: CreateTodoParams) -> Result<RemoteTodo, GatewayError> {
        self.write(
            Method::POST,
            TODOS,
            &[],
            json!({ "title": params.title }),
            "todo",
        )
        .await
    }

    async fn update(
        &self,
        id: TodoId,
        patch: UpdateTodoParams,
    ) -> Result<RemoteTodo, GatewayError> {
        let mut body = Map::new();
        if let Some(title) = patch.title {
            body.insert("title".to_string(), Value::String(title));
        }
        if let Some(completed) = patch.completed {
            body.insert("completed".to_string(), Value::Bool(completed));
        }
        self.write(
            Method::PATCH,
            TODOS,
            &[("id", eq(id))],
            Value::Object(body),
            "todo",
        )
        .await
    }
}

#[async_trait]
impl PostsGateway for RestGateway {
    async fn fetch_all(&self) -> Result<Vec<PostRecord>, GatewayError> {
        self.rows(
            POSTS,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn create(&self, params: CreatePostParams) -> Result<PostRecord, GatewayError> {
        self.write(
            Method::POST,
            POSTS,
            &[],
            json!({
                "content": params.content,
                "image_urls": params.image_urls,
                "author_id": params.author_id,
            }),
            "post",
        )
        .await
    }

    async fn update(
        &self,
        id: PostId,
        params: UpdatePostParams,
    ) -> Result<PostRecord, GatewayError> {
        self.write(
            Method::PATCH,
            POSTS,
            &[("id", eq(id))],
            json!({
                "content": params.content,
                "image_urls": params.image_urls,
            }),
            "post",
        )
        .await
    }
}

#[async_trait]
impl ProfilesGateway for RestGateway {
    async fn fetch_by_id(&self, id: Uuid) -> Result<ProfileRecord, GatewayError> {
        self.single(
            PROFILES,
            &[("select", "*".to_string()), ("id", eq(id))],
            "profile",
        )
        .await
    }

    async fn create(&self, params: CreateProfileParams) -> Result<ProfileRecord, GatewayError> {
        self.write(
            Method::POST,
            PROFILES,
            &[],
            json!({ "id": params.id, "nickname": params.nickname }),
            "profile",
        )
        .await
    }
}

#[async_trait]
impl AuthGateway for RestGateway {
    async fn sign_in(&self, credentials: Credentials) -> Result<Session, AuthError> {
        self.token(
            "password",
            json!({ "email": credentials.email, "password": credentials.password }),
        )
        .await
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let url = self
            .url("auth/v1/signup", &[])
            .map_err(|err| AuthError::new(AuthReason::Transport(err.to_string())))?;
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "email": credentials.email, "password": credentials.password }))
            .send()
            .await
            .map_err(auth_transport)?;
        match decode_auth::<SignUpResponse>(response).await? {
            SignUpResponse::Session(token) => Ok(token.into_session(OffsetDateTime::now_utc())),
            SignUpResponse::Pending(user) => {
                debug!(user_id = %user.id, "sign-up awaits email confirmation");
                Err(AuthReason::ConfirmationRequired.into())
            }
        }
    }

    async fn sign_in_with_provider(&self, provider: &str) -> Result<ProviderSignIn, AuthError> {
        let verifier = new_verifier();
        let mut query = vec![
            ("provider", provider.to_string()),
            ("code_challenge", code_challenge(&verifier)),
            ("code_challenge_method", "s256".to_string()),
        ];
        if let Some(redirect) = self.redirect_url.as_ref() {
            query.push(("redirect_to", redirect.to_string()));
        }
        let url = self
            .url("auth/v1/authorize", &query)
            .map_err(|err| AuthError::new(AuthReason::Other(err.to_string())))?;
        self.store_verifier(verifier);
        Ok(ProviderSignIn::Redirect(url))
    }

    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let verifier = self
            .take_verifier()
            .ok_or_else(|| AuthError::new(AuthReason::CodeExchangeFailed))?;
        self.token(
            "pkce",
            json!({ "auth_code": code, "code_verifier": verifier }),
        )
        .await
    }
}
