//! Transport gateway: the backend's request/response messaging endpoints.
//!
//! The gateway is stateless and never retries; failures propagate to the
//! stores, which decide how to present them.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::config::ApiConfig;
use shared::models::{
    Conversation, ConversationKey, ErrorResponse, Message, MessageId, SendMessageRequest, UserId,
};
use tracing::debug;
use url::Url;

use crate::error::GatewayError;

/// The backend operations the synchronization core consumes.
#[async_trait]
pub trait MessagingGateway: fmt::Debug + Send + Sync {
    /// Lists every conversation of `user`, newest activity first.
    async fn fetch_conversations(&self, user: UserId) -> Result<Vec<Conversation>, GatewayError>;

    /// Lists the messages of one conversation in server order.
    ///
    /// The backend marks messages addressed to `user` as read as a side
    /// effect of this call.
    async fn fetch_thread(
        &self,
        user: UserId,
        conversation: ConversationKey,
    ) -> Result<Vec<Message>, GatewayError>;

    /// Sends a message from `user`; the backend assigns id and timestamp.
    async fn send_message(
        &self,
        user: UserId,
        request: &SendMessageRequest,
    ) -> Result<Message, GatewayError>;

    /// Authoritative unread count for `user`.
    async fn fetch_unread_count(&self, user: UserId) -> Result<i64, GatewayError>;

    /// Explicitly marks one message as read.
    async fn mark_read(&self, user: UserId, message: MessageId) -> Result<(), GatewayError>;
}

/// Gateway handle shared by the stores.
pub type SharedGateway = Arc<dyn MessagingGateway>;

/// [`MessagingGateway`] over the backend's HTTP/JSON API.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    api: ApiConfig,
    client: Client,
}

impl HttpGateway {
    /// Builds a gateway with its own HTTP client honouring the configured timeout.
    ///
    /// # Errors
    /// Returns [`GatewayError::Network`] if the HTTP client cannot be constructed.
    pub fn new(api: ApiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(api.timeout()).build()?;
        Ok(Self::with_client(api, client))
    }

    /// Builds a gateway around an existing client.
    #[must_use]
    pub fn with_client(api: ApiConfig, client: Client) -> Self {
        Self { api, client }
    }

    /// The API configuration in use.
    #[must_use]
    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.api.url_for(path)?)
    }

    async fn execute(request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Auth { status });
        }

        let body = response.text().await.unwrap_or_default();
        let message = ErrorResponse::from_body(&body).map_or_else(
            || status.canonical_reason().unwrap_or("unknown error").to_string(),
            |error| error.to_string(),
        );
        Err(GatewayError::Status { status, message })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn fetch_conversations(&self, user: UserId) -> Result<Vec<Conversation>, GatewayError> {
        let url = self.url(&self.api.endpoints.conversations)?;
        debug!(%url, user_id = %user, "fetching conversations");
        let request = self.client.get(url).query(&[("userId", user.get())]);
        let list: Option<Vec<Conversation>> = Self::decode(Self::execute(request).await?).await?;
        Ok(list.unwrap_or_default())
    }

    async fn fetch_thread(
        &self,
        user: UserId,
        conversation: ConversationKey,
    ) -> Result<Vec<Message>, GatewayError> {
        let url = self.url(&self.api.endpoints.conversation)?;
        debug!(
            %url,
            user_id = %user,
            counterpart_id = %conversation.counterpart_id,
            subject_id = %conversation.subject_id,
            "fetching thread"
        );
        let request = self.client.get(url).query(&[
            ("userId", user.get()),
            ("otherUserId", conversation.counterpart_id.get()),
            ("productId", conversation.subject_id.get()),
        ]);
        let messages: Option<Vec<Message>> = Self::decode(Self::execute(request).await?).await?;
        Ok(messages.unwrap_or_default())
    }

    async fn send_message(
        &self,
        user: UserId,
        request: &SendMessageRequest,
    ) -> Result<Message, GatewayError> {
        let url = self.url(&self.api.endpoints.send)?;
        debug!(%url, user_id = %user, receiver_id = %request.counterpart_id, "sending message");
        let builder = self
            .client
            .post(url)
            .query(&[("senderId", user.get())])
            .json(request);
        Self::decode(Self::execute(builder).await?).await
    }

    async fn fetch_unread_count(&self, user: UserId) -> Result<i64, GatewayError> {
        let url = self.url(&self.api.endpoints.unread_count)?;
        debug!(%url, user_id = %user, "fetching unread count");
        let request = self.client.get(url).query(&[("userId", user.get())]);
        let count: Option<i64> = Self::decode(Self::execute(request).await?).await?;
        Ok(count.unwrap_or(0))
    }

    async fn mark_read(&self, user: UserId, message: MessageId) -> Result<(), GatewayError> {
        let url = self.url(&self.api.endpoints.mark_read_path(message))?;
        debug!(%url, user_id = %user, message_id = %message, "marking message read");
        let request = self.client.put(url).query(&[("userId", user.get())]);
        Self::execute(request).await?;
        Ok(())
    }
}
