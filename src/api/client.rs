use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use reqwest::{Client as HttpClient, Method, RequestBuilder, header};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::error::{ApiError, FALLBACK_MESSAGE, Result};
use crate::api::models::{
    ApiResponse, ChatRoomSummary, LoginData, LoginRequest, MemberInfo, MessageQuery,
    MessageSlice, RefreshRequest, TokenInfo,
};

/// Thin wrapper over the Munglog REST API.
///
/// Tokens live only in memory; nothing is written to disk.
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    tokens: Mutex<Option<TokenInfo>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_http(HttpClient::new(), base_url)
    }

    pub fn with_http(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            tokens: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<TokenInfo>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn tokens(&self) -> Option<TokenInfo> {
        self.token_slot().clone()
    }

    pub fn set_tokens(&self, tokens: TokenInfo) {
        *self.token_slot() = Some(tokens);
    }

    pub fn access_token(&self) -> Option<String> {
        self.token_slot().as_ref().map(|t| t.access_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token_slot().is_some()
    }

    /// Forget both tokens.
    pub fn logout(&self) {
        *self.token_slot() = None;
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, endpoint))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = self.access_token() {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        req
    }

    async fn execute<T: DeserializeOwned>(req: RequestBuilder) -> Result<ApiResponse<T>> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<Value>().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| body.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or(FALLBACK_MESSAGE)
                .to_string();
            return Err(ApiError::Status { status: status.as_u16(), message });
        }
        Ok(resp.json::<ApiResponse<T>>().await?)
    }

    async fn data<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        Self::execute::<T>(req).await?.data.ok_or(ApiError::MissingData)
    }

    async fn unit(req: RequestBuilder) -> Result<()> {
        Self::execute::<Value>(req).await.map(|_| ())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginData> {
        let req = self
            .request(Method::POST, "/v1/auth/login")
            .json(&LoginRequest { email, password });
        let data: LoginData = Self::data(req).await?;
        if let Some(tokens) = &data.token_info {
            self.set_tokens(tokens.clone());
        }
        Ok(data)
    }

    /// Trade the refresh token for a new pair. Any failure from the server
    /// drops both tokens, which means the session is over.
    pub async fn refresh_token(&self) -> Result<TokenInfo> {
        let refresh = self
            .token_slot()
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .ok_or(ApiError::MissingRefreshToken)?;

        let req = self
            .request(Method::POST, "/v1/auth/refresh")
            .json(&RefreshRequest { refresh_token: &refresh });
        match Self::execute::<TokenInfo>(req).await {
            Ok(resp) => {
                let tokens = resp.data.ok_or(ApiError::MissingData)?;
                self.set_tokens(tokens.clone());
                debug!("access token refreshed");
                Ok(tokens)
            }
            Err(e) => {
                warn!("token refresh failed, clearing session: {e}");
                self.logout();
                Err(e)
            }
        }
    }

    pub async fn my_info(&self) -> Result<MemberInfo> {
        Self::data(self.request(Method::GET, "/v1/members/me")).await
    }

    /// Open a 1:1 room, or get the id of the existing one.
    pub async fn create_private_room(&self, other_member_id: i64) -> Result<i64> {
        let req = self
            .request(Method::POST, "/v1/chat/rooms/private")
            .query(&[("otherMemberId", other_member_id)]);
        Self::data(req).await
    }

    pub async fn create_group_room(&self, other_member_ids: &[i64]) -> Result<i64> {
        let params: Vec<(&str, i64)> = other_member_ids
            .iter()
            .map(|id| ("otherMemberIds", *id))
            .collect();
        let req = self
            .request(Method::POST, "/v1/chat/rooms/group")
            .query(&params);
        Self::data(req).await
    }

    pub async fn my_rooms(&self) -> Result<Vec<ChatRoomSummary>> {
        let req = self.request(Method::GET, "/v1/chat/rooms/me");
        Ok(Self::execute::<Vec<ChatRoomSummary>>(req).await?.data.unwrap_or_default())
    }

    /// Member ids taking part in a room.
    pub async fn participants(&self, room_id: i64) -> Result<Vec<i64>> {
        let req = self.request(Method::GET, &format!("/v1/chat/rooms/{room_id}/participants"));
        Ok(Self::execute::<Vec<i64>>(req).await?.data.unwrap_or_default())
    }

    pub async fn leave_room(&self, room_id: i64) -> Result<()> {
        Self::unit(self.request(Method::DELETE, &format!("/v1/chat/rooms/{room_id}"))).await
    }

    pub async fn join_group_room(&self, room_id: i64) -> Result<()> {
        Self::unit(self.request(Method::POST, &format!("/v1/chat/rooms/{room_id}"))).await
    }

    pub async fn messages(&self, room_id: i64, query: MessageQuery) -> Result<MessageSlice> {
        let mut params: Vec<(&str, i64)> = Vec::new();
        if let Some(before) = query.before_seq {
            params.push(("beforeSeq", before));
        }
        if let Some(size) = query.size {
            params.push(("size", i64::from(size)));
        }
        let mut req = self.request(Method::GET, &format!("/v1/chat/rooms/{room_id}/messages"));
        if !params.is_empty() {
            req = req.query(&params);
        }
        Ok(Self::execute::<MessageSlice>(req).await?.data.unwrap_or_default())
    }

    pub async fn unread_count(&self, room_id: i64) -> Result<u64> {
        let req = self.request(Method::GET, &format!("/v1/chat/rooms/{room_id}/unread-count"));
        Ok(Self::execute::<u64>(req).await?.data.unwrap_or(0))
    }

    pub async fn mark_read(&self, room_id: i64) -> Result<()> {
        Self::unit(self.request(Method::POST, &format!("/v1/chat/rooms/{room_id}/read"))).await
    }

    pub async fn total_unread(&self) -> Result<u64> {
        let req = self.request(Method::GET, "/v1/chat/unread-total");
        Ok(Self::execute::<u64>(req).await?.data.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn tokens(access: &str, refresh: &str) -> TokenInfo {
        TokenInfo {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    #[tokio::test]
    async fn login_stores_token_pair() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/auth/login")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"email": "a@b.c", "password": "pw"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":"SUCCESS","data":{"tokenInfo":{"accessToken":"acc","refreshToken":"ref"}}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let data = client.login("a@b.c", "pw").await.unwrap();
        mock.assert_async().await;
        assert_eq!(data.token_info, Some(tokens("acc", "ref")));
        assert_eq!(client.access_token().as_deref(), Some("acc"));
    }

    #[tokio::test]
    async fn refresh_without_token_fails_early() {
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = client.refresh_token().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingRefreshToken));
    }

    #[tokio::test]
    async fn refresh_replaces_tokens() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/auth/refresh")
            .match_header("authorization", "Bearer old")
            .match_body(Matcher::Json(json!({"refreshToken": "r1"})))
            .with_status(200)
            .with_body(r#"{"data":{"accessToken":"new","refreshToken":"r2"}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        client.set_tokens(tokens("old", "r1"));
        let fresh = client.refresh_token().await.unwrap();
        mock.assert_async().await;
        assert_eq!(fresh, tokens("new", "r2"));
        assert_eq!(client.tokens(), Some(tokens("new", "r2")));
    }

    #[tokio::test]
    async fn failed_refresh_clears_session() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/auth/refresh")
            .with_status(401)
            .with_body(r#"{"error":{"message":"expired"}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        client.set_tokens(tokens("old", "r1"));
        let err = client.refresh_token().await.unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn error_message_falls_back() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/chat/rooms/me")
            .with_status(500)
            .with_body("not json")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        match client.my_rooms().await.unwrap_err() {
            ApiError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, FALLBACK_MESSAGE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn group_room_repeats_member_param() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/rooms/group")
            .match_query(Matcher::Exact("otherMemberIds=2&otherMemberIds=3".into()))
            .with_status(200)
            .with_body(r#"{"result":"SUCCESS","data":12}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        assert_eq!(client.create_group_room(&[2, 3]).await.unwrap(), 12);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn private_room_sends_bearer_and_member() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/rooms/private")
            .match_query(Matcher::UrlEncoded("otherMemberId".into(), "4".into()))
            .match_header("authorization", "Bearer acc")
            .with_status(200)
            .with_body(r#"{"data":99}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        client.set_tokens(tokens("acc", "ref"));
        assert_eq!(client.create_private_room(4).await.unwrap(), 99);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn messages_pass_cursor_and_size() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/chat/rooms/3/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("beforeSeq".into(), "40".into()),
                Matcher::UrlEncoded("size".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"data":{"content":[{"seq":10,"roomId":3,"senderId":1,"type":"TEXT","content":"hey"}],"hasNext":true}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        let page = client
            .messages(3, MessageQuery { before_seq: Some(40), size: Some(50) })
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.next_before_seq(), Some(10));
    }

    #[tokio::test]
    async fn read_and_unread_endpoints() {
        let mut server = Server::new_async().await;
        let read = server
            .mock("POST", "/v1/chat/rooms/5/read")
            .with_status(200)
            .with_body(r#"{"result":"SUCCESS"}"#)
            .create_async()
            .await;
        let unread = server
            .mock("GET", "/v1/chat/rooms/5/unread-count")
            .with_status(200)
            .with_body(r#"{"data":4}"#)
            .create_async()
            .await;
        let total = server
            .mock("GET", "/v1/chat/unread-total")
            .with_status(200)
            .with_body(r#"{"data":11}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        client.mark_read(5).await.unwrap();
        assert_eq!(client.unread_count(5).await.unwrap(), 4);
        assert_eq!(client.total_unread().await.unwrap(), 11);
        read.assert_async().await;
        unread.assert_async().await;
        total.assert_async().await;
    }

    #[tokio::test]
    async fn my_info_without_data_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/members/me")
            .with_status(200)
            .with_body(r#"{"result":"SUCCESS"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url());
        assert!(matches!(client.my_info().await, Err(ApiError::MissingData)));
    }

    #[tokio::test]
    async fn malformed_base_url_surfaces_as_transport_error() {
        let client = ApiClient::new("not a url");
        let err = client.my_info().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref e) if e.is_builder()), "got {err:?}");
    }

    #[test]
    fn logout_forgets_tokens() {
        let client = ApiClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        client.set_tokens(tokens("a", "b"));
        client.logout();
        assert_eq!(client.tokens(), None);
    }
}
