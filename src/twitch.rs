//! Twitch Helix client using an app access token (client-credentials grant).

use crate::{
    live::{LiveStream, PlatformError, PlatformUser, StreamPlatform},
    log_error, log_internal,
};
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};

/// Helix accepts at most this many `login` or `user_id` parameters per request.
const MAX_IDS_PER_REQUEST: usize = 100;

/// Refresh the token this long before Twitch says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(5);

pub struct TwitchClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    api_url: String,
    token: Mutex<Option<AppToken>>,
}

struct AppToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Helix wraps every list in `{"data": [...]}`.
#[derive(serde::Deserialize)]
struct HelixPage<T> {
    data: Vec<T>,
}

impl TwitchClient {
    pub fn new(client_id: &str, client_secret: &str, auth_url: &str, api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            auth_url: auth_url.to_owned(),
            api_url: api_url.trim_end_matches('/').to_owned(),
            token: Mutex::new(None),
        }
    }

    /// Cached app token, fetching a new one when there is none or it is about to expire.
    async fn access_token(&self) -> Result<String, PlatformError> {
        let mut token = self.token.lock().await;
        if let Some(cached) = token.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.access_token.clone());
            }
        }

        *token = None;
        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *token = Some(fresh);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<AppToken, PlatformError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];
        let response = self
            .http
            .post(&self.auth_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| PlatformError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Auth(format!(
                "token request failed: {} - {}",
                status, body
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Auth(e.to_string()))?;
        log_internal!("Obtained new Twitch app access token");

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        Ok(AppToken {
            access_token: body.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }

    /// GET one Helix page with `key=value` repeated for every value.
    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        key: &str,
        values: &[String],
    ) -> Result<Vec<T>, PlatformError> {
        let token = self.access_token().await?;
        let query: Vec<(&str, &str)> = values.iter().map(|v| (key, v.as_str())).collect();
        let url = format!("{}/{}", self.api_url, endpoint);

        let response = self
            .http
            .get(&url)
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| PlatformError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Upstream(format!(
                "/{} request failed: {} - {}",
                endpoint, status, body
            )));
        }

        response
            .json::<HelixPage<T>>()
            .await
            .map(|page| page.data)
            .map_err(|e| PlatformError::Upstream(e.to_string()))
    }
}

#[serenity::async_trait]
impl StreamPlatform for TwitchClient {
    async fn resolve_users(&self, logins: &[String]) -> Result<Vec<PlatformUser>, PlatformError> {
        let mut users = Vec::new();
        for batch in logins.chunks(MAX_IDS_PER_REQUEST) {
            users.extend(self.get_page::<PlatformUser>("users", "login", batch).await?);
        }
        Ok(users)
    }

    async fn query_live_streams(
        &self,
        platform_user_ids: &[String],
    ) -> Result<Vec<LiveStream>, PlatformError> {
        let mut streams = Vec::new();
        for batch in platform_user_ids.chunks(MAX_IDS_PER_REQUEST) {
            match self.get_page::<LiveStream>("streams", "user_id", batch).await {
                Ok(page) => streams.extend(page),
                // Without a token no other batch can succeed either.
                Err(e @ PlatformError::Auth(_)) => return Err(e),
                Err(e) => log_error!("Twitch streams batch failed, skipping it: {}", e),
            }
        }
        Ok(streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> TwitchClient {
        TwitchClient::new(
            "cid",
            "secret",
            &server.url("/oauth2/token"),
            &server.url("/helix"),
        )
    }

    async fn mock_token(server: &MockServer, expires_in: u64) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth2/token")
                    .body_contains("grant_type=client_credentials")
                    .body_contains("client_id=cid");
                then.status(200).json_body(json!({
                    "access_token": "tok",
                    "expires_in": expires_in,
                    "token_type": "bearer"
                }));
            })
            .await
    }

    fn logins(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_input_makes_no_requests() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server, 3600).await;
        let twitch = client(&server);

        assert!(twitch.resolve_users(&[]).await.unwrap().is_empty());
        assert!(twitch.query_live_streams(&[]).await.unwrap().is_empty());
        assert_eq!(token.hits_async().await, 0);
    }

    #[tokio::test]
    async fn resolves_users_and_caches_token() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server, 3600).await;
        let users = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/helix/users")
                    .query_param("login", "alice")
                    .header("Client-ID", "cid")
                    .header("Authorization", "Bearer tok");
                then.status(200).json_body(json!({
                    "data": [{"id": "11", "login": "alice", "display_name": "Alice"}]
                }));
            })
            .await;
        let twitch = client(&server);

        let first = twitch.resolve_users(&logins(&["alice", "ghost"])).await.unwrap();
        let second = twitch.resolve_users(&logins(&["alice"])).await.unwrap();

        assert_eq!(
            first,
            [PlatformUser {
                platform_user_id: "11".to_owned(),
                login: "alice".to_owned()
            }]
        );
        assert_eq!(first, second);
        assert_eq!(users.hits_async().await, 2);
        assert_eq!(token.hits_async().await, 1);
    }

    #[tokio::test]
    async fn token_inside_expiry_margin_is_refreshed() {
        let server = MockServer::start_async().await;
        // Shorter than the margin, so every call re-authenticates
        let token = mock_token(&server, 3).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/helix/users");
                then.status(200).json_body(json!({"data": []}));
            })
            .await;
        let twitch = client(&server);

        twitch.resolve_users(&logins(&["alice"])).await.unwrap();
        twitch.resolve_users(&logins(&["alice"])).await.unwrap();

        assert_eq!(token.hits_async().await, 2);
    }

    #[tokio::test]
    async fn failed_grant_is_an_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                then.status(403).body("invalid client secret");
            })
            .await;
        let twitch = client(&server);

        let err = twitch.resolve_users(&logins(&["alice"])).await.unwrap_err();
        assert!(matches!(err, PlatformError::Auth(_)));
        let err = twitch
            .query_live_streams(&logins(&["11"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Auth(_)));
    }

    #[tokio::test]
    async fn failed_users_request_is_an_upstream_error() {
        let server = MockServer::start_async().await;
        mock_token(&server, 3600).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/helix/users");
                then.status(500);
            })
            .await;
        let twitch = client(&server);

        let err = twitch.resolve_users(&logins(&["alice"])).await.unwrap_err();
        assert!(matches!(err, PlatformError::Upstream(_)));
    }

    #[tokio::test]
    async fn streams_are_batched_and_failed_batches_skipped() {
        let server = MockServer::start_async().await;
        mock_token(&server, 3600).await;
        // First batch (ids 0..100) contains id 0 and succeeds
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/helix/streams")
                    .query_param("user_id", "0");
                then.status(200).json_body(json!({
                    "data": [{
                        "user_id": "0",
                        "user_login": "zero",
                        "title": "hello",
                        "game_name": "Chess",
                        "viewer_count": 5,
                        "thumbnail_url": "https://t/{width}x{height}.jpg"
                    }]
                }));
            })
            .await;
        // Second batch (ids 100..150) contains id 100 and fails
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/helix/streams")
                    .query_param("user_id", "100");
                then.status(502);
            })
            .await;
        let twitch = client(&server);
        let ids: Vec<String> = (0..150).map(|i| i.to_string()).collect();

        let streams = twitch.query_live_streams(&ids).await.unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].platform_user_id, "0");
        assert_eq!(streams[0].category, "Chess");
        assert_eq!(first.hits_async().await, 1);
        assert_eq!(second.hits_async().await, 1);
    }
}
