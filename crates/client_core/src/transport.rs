//! GraphQL transport for the hosted album API.
//!
//! Queries and mutations go over HTTP POST; the creation feed arrives over
//! a WebSocket scoped to the resolved owner.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{AlbumId, Identity},
    error::{ApiException, ErrorCode},
    protocol::{AlbumPage, AlbumRecord, CreateAlbumInput, ListAlbumsFilter, ServerEvent},
};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::warn;
use url::Url;

use crate::{config::ApiConfig, AlbumApi, AlbumStream, IdentityProvider, SubscriptionHandle};

const SUBSCRIPTION_BUFFER: usize = 64;

const LIST_ALBUMS_QUERY: &str = "query ListAlbums($filter: AlbumFilter, $limit: Int) { listAlbums(filter: $filter, limit: $limit) { items { id name year owner createdAt } nextToken } }";
const GET_ALBUM_QUERY: &str =
    "query GetAlbum($id: ID!) { getAlbum(id: $id) { id name year owner createdAt } }";
const CREATE_ALBUM_MUTATION: &str = "mutation CreateAlbum($input: CreateAlbumInput!) { createAlbum(input: $input) { id name year owner createdAt } }";

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListAlbumsData {
    #[serde(rename = "listAlbums")]
    list_albums: AlbumPage,
}

#[derive(Debug, Deserialize)]
struct GetAlbumData {
    #[serde(rename = "getAlbum")]
    get_album: Option<AlbumRecord>,
}

#[derive(Debug, Deserialize)]
struct CreateAlbumData {
    #[serde(rename = "createAlbum")]
    create_album: AlbumRecord,
}

pub struct GraphqlApi {
    http: Client,
    config: ApiConfig,
}

impl GraphqlApi {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    async fn execute<V, T>(&self, query: &str, variables: V) -> Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(&self.config.endpoint)
            .json(&GraphqlRequest { query, variables });
        if let Some(api_key) = &self.config.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response: GraphqlResponse<T> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("invalid graphql response body")?;

        if let Some(error) = response.errors.into_iter().next() {
            return Err(ApiException::new(ErrorCode::Internal, error.message).into());
        }
        response
            .data
            .ok_or_else(|| anyhow!("graphql response carried neither data nor errors"))
    }

    fn subscription_url(&self, owner: &str) -> Result<Url> {
        let ws = if self.config.endpoint.starts_with("https://") {
            self.config.endpoint.replacen("https://", "wss://", 1)
        } else if self.config.endpoint.starts_with("http://") {
            self.config.endpoint.replacen("http://", "ws://", 1)
        } else {
            return Err(anyhow!("endpoint must start with http:// or https://"));
        };

        let mut url = Url::parse(&ws).context("invalid endpoint url")?;
        url.set_path("/subscriptions");
        url.query_pairs_mut().append_pair("owner", owner);
        Ok(url)
    }
}

#[async_trait]
impl AlbumApi for GraphqlApi {
    async fn list_albums(&self, filter: ListAlbumsFilter, limit: u32) -> Result<AlbumPage> {
        let data: ListAlbumsData = self
            .execute(
                LIST_ALBUMS_QUERY,
                serde_json::json!({ "filter": filter, "limit": limit }),
            )
            .await?;
        Ok(data.list_albums)
    }

    async fn get_album(&self, id: &AlbumId) -> Result<AlbumRecord> {
        let data: GetAlbumData = self
            .execute(GET_ALBUM_QUERY, serde_json::json!({ "id": id }))
            .await?;
        data.get_album.ok_or_else(|| {
            ApiException::new(ErrorCode::NotFound, format!("album {id} not found")).into()
        })
    }

    async fn create_album(&self, input: CreateAlbumInput) -> Result<AlbumRecord> {
        let data: CreateAlbumData = self
            .execute(CREATE_ALBUM_MUTATION, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.create_album)
    }

    async fn subscribe_on_create(&self, owner: &str) -> Result<AlbumStream> {
        let url = self.subscription_url(owner)?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect subscription socket: {url}"))?;
        let (_, mut ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(ServerEvent::AlbumCreated { album }) => {
                            if tx.send(album).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerEvent::Error(err)) => {
                            warn!("albums: feed error frame: {}", err.message);
                        }
                        Err(err) => {
                            warn!("albums: invalid feed frame: {err}");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("albums: feed receive failed: {err}");
                        break;
                    }
                }
            }
        });

        Ok(AlbumStream::new(rx, SubscriptionHandle::new(task)))
    }
}

/// Resolves the caller's identity from the auth service, a backend distinct
/// from the data API.
pub struct HttpIdentityProvider {
    http: Client,
    auth_endpoint: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            http: Client::new(),
            auth_endpoint: config.auth_endpoint.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current_identity(&self) -> Result<Identity> {
        let identity: Identity = self
            .http
            .get(format!("{}/identity", self.auth_endpoint))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("invalid identity response body")?;
        Ok(identity)
    }
}
