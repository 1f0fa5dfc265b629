use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::cancel::{await_or_cancel, CancellationSignal};
use crate::config::ApiConfig;
use crate::error::{error_for_status, ApiError};
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::payload::{
    booking_download_url, redirect_url_from_response, AccessToken, Booking, ChatRequest,
    OAuthCallbackRequest, PasswordChange, PasswordGrant, SignupRequest, UserProfile,
};
use crate::url::{
    join_endpoint, normalize_base_url, PATH_BOOKINGS, PATH_CHAT, PATH_GOOGLE_CALLBACK,
    PATH_GOOGLE_LOGIN, PATH_PASSWORD, PATH_SIGNUP, PATH_TOKEN, PATH_USER,
};

/// Pull-based source of raw chat body chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

#[derive(Debug, Clone)]
pub struct ConciergeApiClient {
    http: Client,
    config: ApiConfig,
    base_url: String,
    chat_base_url: String,
}

impl ConciergeApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let chat_base_url = normalize_base_url(config.chat_base())?;
        if let Some(download) = config.download_base_url.as_deref() {
            normalize_base_url(download)?;
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if config.no_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build().map_err(ApiError::from)?;

        Ok(Self {
            http,
            config,
            base_url,
            chat_base_url,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        join_endpoint(&self.base_url, path)
    }

    pub fn chat_endpoint(&self) -> String {
        join_endpoint(&self.chat_base_url, PATH_CHAT)
    }

    /// Invoice link for a booking or transaction id, when a download host is configured.
    pub fn download_url(&self, booking_id: &str) -> Option<String> {
        let base = self.config.download_base_url.as_deref()?;
        Some(booking_download_url(base, booking_id))
    }

    pub fn build_headers(
        &self,
        token: Option<&AccessToken>,
        accept: &str,
    ) -> Result<HeaderMap, ApiError> {
        let headers = build_headers(&self.config, token, accept);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| ApiError::InvalidHeader(format!("invalid header value for {key}")))?,
            );
        }
        Ok(out)
    }

    /// Build the POST that opens the chat stream.
    pub fn build_chat_request(
        &self,
        token: &AccessToken,
        message: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let headers = self.build_headers(Some(token), ACCEPT_EVENT_STREAM)?;
        Ok(self
            .http
            .post(self.chat_endpoint())
            .headers(headers)
            .json(&ChatRequest { message }))
    }

    /// Exchange username and password for a token (`application/x-www-form-urlencoded`).
    pub async fn exchange_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AccessToken, ApiError> {
        let request = self
            .http
            .post(self.endpoint(PATH_TOKEN))
            .headers(self.build_headers(None, ACCEPT_JSON)?)
            .form(&PasswordGrant::new(username, password));
        let value = read_json(request.send().await?).await?;
        AccessToken::from_response(&value).ok_or_else(|| {
            ApiError::UnexpectedResponse("token response carries no access token".to_string())
        })
    }

    pub async fn signup(&self, record: &SignupRequest) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.endpoint(PATH_SIGNUP))
            .headers(self.build_headers(None, ACCEPT_JSON)?)
            .json(record);
        expect_success(request.send().await?).await
    }

    /// Start the Google OAuth flow and return the authorization redirect URL.
    pub async fn oauth_login_url(&self) -> Result<String, ApiError> {
        let request = self
            .http
            .get(self.endpoint(PATH_GOOGLE_LOGIN))
            .headers(self.build_headers(None, ACCEPT_JSON)?);
        let value = read_json(request.send().await?).await?;
        redirect_url_from_response(&value).ok_or_else(|| {
            ApiError::UnexpectedResponse("login response carries no redirect URL".to_string())
        })
    }

    pub async fn oauth_callback(&self, code: &str) -> Result<AccessToken, ApiError> {
        let request = self
            .http
            .post(self.endpoint(PATH_GOOGLE_CALLBACK))
            .headers(self.build_headers(None, ACCEPT_JSON)?)
            .json(&OAuthCallbackRequest { code });
        let value = read_json(request.send().await?).await?;
        AccessToken::from_response(&value).ok_or_else(|| {
            ApiError::UnexpectedResponse("callback response carries no access token".to_string())
        })
    }

    pub async fn fetch_user(&self, token: &AccessToken) -> Result<UserProfile, ApiError> {
        let request = self
            .http
            .get(self.endpoint(PATH_USER))
            .headers(self.build_headers(Some(token), ACCEPT_JSON)?);
        let value = read_json(request.send().await?).await?;
        UserProfile::from_response(value).map_err(ApiError::from)
    }

    pub async fn change_password(
        &self,
        token: &AccessToken,
        change: &PasswordChange,
    ) -> Result<(), ApiError> {
        let request = self
            .http
            .put(self.endpoint(PATH_PASSWORD))
            .headers(self.build_headers(Some(token), ACCEPT_JSON)?)
            .json(change);
        expect_success(request.send().await?).await
    }

    pub async fn fetch_bookings(&self, token: &AccessToken) -> Result<Vec<Booking>, ApiError> {
        let request = self
            .http
            .get(self.endpoint(PATH_BOOKINGS))
            .headers(self.build_headers(Some(token), ACCEPT_JSON)?);
        let value = read_json(request.send().await?).await?;
        serde_json::from_value(value).map_err(ApiError::from)
    }

    /// Open the chat stream.
    ///
    /// Non-2xx responses fail here, before any chunk is yielded. Mid-stream
    /// read failures surface as [`ApiError::StreamInterrupted`] on the next
    /// pull.
    pub async fn open_chat_stream(
        &self,
        token: &AccessToken,
        message: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ByteStream, ApiError> {
        let request = self.build_chat_request(token, message)?;
        let response = await_or_cancel(request.send(), cancellation).await??;

        let status = response.status();
        if !status.is_success() {
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_default();
            return Err(error_for_status(status, &body));
        }
        debug!(%status, endpoint = %self.chat_endpoint(), "chat stream opened");

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|error| ApiError::StreamInterrupted(error.to_string()))
            })
            .boxed())
    }
}

async fn read_json(response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(error_for_status(status, &body));
    }
    if body.trim().is_empty() {
        return Err(ApiError::UnexpectedResponse(format!(
            "empty body with status {status}"
        )));
    }
    serde_json::from_str(&body).map_err(ApiError::from)
}

async fn expect_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() || status == StatusCode::NO_CONTENT {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status, &body))
}
