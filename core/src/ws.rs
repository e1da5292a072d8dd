use crate::error::ClientError;
use crate::realtime::{ClientEvent, Connector, Link, LinkSignals, ServerEvent};
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens the realtime endpoint over WebSocket, authenticating the handshake
/// with the bearer token.
#[derive(Debug, Clone)]
pub struct WsConnector {
    endpoint: Url,
}

impl WsConnector {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, token: &str, signals: LinkSignals) -> Result<Box<dyn Link>, ClientError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|err| ClientError::validation(format!("invalid realtime endpoint: {err}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::validation("access token is not a valid header value"))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _) = connect_async(request).await.map_err(handshake_error)?;
        tracing::debug!(endpoint = %self.endpoint, "realtime handshake complete");
        let (sink, mut source) = stream.split();

        let open = Arc::new(AtomicBool::new(true));
        let reader_open = open.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => signals.deliver(event),
                        Err(err) => tracing::warn!(%err, "skipping unrecognized realtime frame"),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, "realtime read failed");
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            signals.mark_dropped();
        });

        Ok(Box::new(WsLink {
            sink: Mutex::new(sink),
            reader,
            open,
        }))
    }
}

fn handshake_error(err: WsError) -> ClientError {
    match err {
        WsError::Http(response) if response.status() == StatusCode::UNAUTHORIZED => {
            ClientError::unauthenticated()
        }
        WsError::Http(response) if response.status() == StatusCode::FORBIDDEN => {
            ClientError::forbidden()
        }
        other => ClientError::network(other.to_string()),
    }
}

struct WsLink {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    reader: JoinHandle<()>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl Link for WsLink {
    async fn emit(&self, event: &ClientEvent) -> Result<(), ClientError> {
        let frame = serde_json::to_string(event)?;
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(frame))
            .await
            .map_err(|err| ClientError::network(err.to_string()))
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        if let Err(err) = self.sink.lock().await.close().await {
            tracing::debug!(%err, "realtime close handshake failed");
        }
        self.reader.abort();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.reader.is_finished()
    }
}
