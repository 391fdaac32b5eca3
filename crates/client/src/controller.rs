use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use extract::Category;

use crate::session::{GenerationRequest, GenerationSession, RequestToken, StreamError};
use crate::transport::GenerationTransport;

/// Response events, each tagged with the request it belongs to
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Chunk(RequestToken, String),
    Finished(RequestToken),
    Failed(RequestToken, StreamError),
}

/// Owns a session and feeds it the events of requests running in the
/// background. Events of superseded requests are drained and dropped.
pub struct SessionController {
    session: GenerationSession,
    transport: Arc<dyn GenerationTransport>,
    tx: mpsc::UnboundedSender<StreamEvent>,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl SessionController {
    pub fn new(category: Category, transport: Arc<dyn GenerationTransport>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: GenerationSession::new(category),
            transport,
            tx,
            rx,
        }
    }

    pub fn session(&self) -> &GenerationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut GenerationSession {
        &mut self.session
    }

    /// Submit `text` and start the request in the background
    pub fn submit(&mut self, text: &str) -> Option<RequestToken> {
        let request = self.session.submit(text)?;
        let token = request.token;

        let transport = self.transport.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // A panicking transport must still settle the request
            let outcome = AssertUnwindSafe(pump(transport, request, tx.clone()))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                warn!("Generation task panicked");
                let _ = tx.send(StreamEvent::Failed(token, StreamError::Opaque(String::new())));
            }
        });

        Some(token)
    }

    /// Wait for the next event and apply it. Returns whether it changed
    /// the session; `None` only if the channel closed.
    pub async fn next_event(&mut self) -> Option<bool> {
        let event = self.rx.recv().await?;
        Some(self.apply(event))
    }

    pub fn apply(&mut self, event: StreamEvent) -> bool {
        let applied = match event {
            StreamEvent::Chunk(token, text) => self.session.apply_chunk(token, &text),
            StreamEvent::Finished(token) => self.session.finish(token),
            StreamEvent::Failed(token, error) => self.session.fail(token, error),
        };
        if !applied {
            debug!("Dropped event of a superseded request");
        }
        applied
    }

    /// Apply events until the current request settles
    pub async fn settle(&mut self) {
        while self.session.is_loading() {
            if self.next_event().await.is_none() {
                break;
            }
        }
    }
}

async fn pump(
    transport: Arc<dyn GenerationTransport>,
    request: GenerationRequest,
    tx: mpsc::UnboundedSender<StreamEvent>,
) {
    let token = request.token;
    let mut stream = match transport.open(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Generation request failed");
            let _ = tx.send(StreamEvent::Failed(token, e));
            return;
        }
    };

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(text) => StreamEvent::Chunk(token, text),
            Err(e) => {
                warn!(error = %e, "Generation stream failed");
                let _ = tx.send(StreamEvent::Failed(token, e));
                return;
            }
        };
        if tx.send(event).is_err() {
            return;
        }
    }
    let _ = tx.send(StreamEvent::Finished(token));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Phase;
    use crate::transport::TextStream;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    const ALBUM: &str = r#"{"title":"4","artist":"Beyoncé","releaseYear":2011,"genre":"R&B","tracks":[{"number":1,"title":"1+1","duration":"4:33"}]}"#;

    enum Script {
        Chunks(Vec<&'static str>, Duration),
        FailAfter(Vec<&'static str>, StreamError),
        Reject(StreamError),
        Panic,
    }

    struct FakeTransport {
        script: Script,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationTransport for FakeTransport {
        async fn open(&self, request: &GenerationRequest) -> Result<TextStream, StreamError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            match &self.script {
                Script::Chunks(chunks, delay) => {
                    let delay = *delay;
                    let chunks: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();
                    Ok(Box::pin(futures::stream::iter(chunks).then(move |c| async move {
                        tokio::time::sleep(delay).await;
                        Ok::<_, StreamError>(c)
                    })))
                }
                Script::FailAfter(chunks, error) => {
                    let mut items: Vec<Result<String, StreamError>> =
                        chunks.iter().map(|c| Ok(c.to_string())).collect();
                    items.push(Err(error.clone()));
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                Script::Reject(error) => Err(error.clone()),
                Script::Panic => panic!("transport blew up"),
            }
        }
    }

    #[tokio::test]
    async fn test_streams_to_success() {
        let transport = FakeTransport::new(Script::Chunks(
            vec![&ALBUM[..20], &ALBUM[20..80], &ALBUM[80..]],
            Duration::ZERO,
        ));
        let mut controller = SessionController::new(Category::Album, transport.clone());

        assert!(controller.submit("4 by Beyoncé").is_some());
        assert_eq!(controller.session().phase(), Phase::Generating);
        controller.settle().await;

        assert_eq!(controller.session().phase(), Phase::Success);
        let object = controller.session().usable_object().unwrap();
        assert_eq!(object["artist"], "Beyoncé");
        assert_eq!(transport.prompts.lock().unwrap().as_slice(), ["4 by Beyoncé"]);
    }

    #[tokio::test]
    async fn test_rejected_request() {
        let transport = FakeTransport::new(Script::Reject(StreamError::HasMessage(
            "RESOURCE_EXHAUSTED: limit: 20".to_string(),
        )));
        let mut controller = SessionController::new(Category::Recipe, transport);
        controller.submit("Paella");
        controller.settle().await;

        let session = controller.session();
        assert_eq!(session.phase(), Phase::Error);
        assert!(session.error_notice().unwrap().is_quota());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial() {
        let transport = FakeTransport::new(Script::FailAfter(
            vec![r#"{"title":"4","#],
            StreamError::Opaque("connection reset".to_string()),
        ));
        let mut controller = SessionController::new(Category::Album, transport);
        controller.submit("4 by Beyoncé");
        controller.settle().await;

        let session = controller.session();
        assert_eq!(session.phase(), Phase::Error);
        assert_eq!(session.display_error(), Some("connection reset"));
        assert_eq!(session.object().unwrap()["title"], "4");
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_request() {
        let transport = FakeTransport::new(Script::Chunks(vec![ALBUM], Duration::from_millis(20)));
        let mut controller = SessionController::new(Category::Album, transport);
        controller.submit("4 by Beyoncé");
        controller.session_mut().reset();

        // The old request still completes, but nothing it sends lands
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(controller.next_event().await, Some(false));
        assert_eq!(controller.next_event().await, Some(false));

        let session = controller.session();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.object().is_none());
        assert!(session.display_error().is_none());
    }

    #[tokio::test]
    async fn test_panicking_transport_settles_with_error() {
        let transport = FakeTransport::new(Script::Panic);
        let mut controller = SessionController::new(Category::Recipe, transport);
        controller.submit("Paella");

        tokio::time::timeout(Duration::from_secs(2), controller.settle())
            .await
            .expect("session should settle after a transport panic");

        let session = controller.session();
        assert_eq!(session.phase(), Phase::Error);
        assert_eq!(session.display_error(), Some(crate::session::FALLBACK_ERROR));
    }
}
