//! Message bus server.
//!
//! The server owns an injected bus client, subscribes to the planning and
//! completion subjects, and spawns one task per inbound message. Handlers
//! share only immutable state and the build store.

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::{BusError, Result};
use crate::message::Operation;

use super::completion::CompletionHandler;
use super::handler::RequestHandler;
use super::COMPLETION_SUBJECTS;

/// What an inbound subscription carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// A planning request for an operation.
    Request(Operation),
    /// A completion notification.
    Completion,
}

/// Returns every subject the server subscribes to.
#[must_use]
pub fn subscriptions() -> Vec<(String, Inbound)> {
    Operation::ALL
        .into_iter()
        .map(|op| (op.subject(), Inbound::Request(op)))
        .chain(
            COMPLETION_SUBJECTS
                .iter()
                .map(|subject| ((*subject).to_string(), Inbound::Completion)),
        )
        .collect()
}

/// Connects to the message bus.
///
/// # Errors
///
/// Returns an error if the bus cannot be reached.
pub async fn connect(url: &str) -> Result<async_nats::Client> {
    info!("Connecting to message bus at {url}");
    async_nats::connect(url).await.map_err(|e| {
        BusError::ConnectionFailed {
            url: url.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Serves planning requests and completion notifications.
#[derive(Debug)]
pub struct BusServer {
    /// Bus connection.
    client: async_nats::Client,
    /// Planning request handler.
    requests: RequestHandler,
    /// Completion handler.
    completions: CompletionHandler,
}

impl BusServer {
    /// Creates a server over an existing bus connection.
    #[must_use]
    pub const fn new(
        client: async_nats::Client,
        requests: RequestHandler,
        completions: CompletionHandler,
    ) -> Self {
        Self {
            client,
            requests,
            completions,
        }
    }

    /// Subscribes and dispatches messages until the subscriptions end.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscription cannot be set up.
    pub async fn run(&self) -> Result<()> {
        let mut streams: Vec<BoxStream<'static, (Inbound, async_nats::Message)>> = Vec::new();
        for (subject, inbound) in subscriptions() {
            let subscriber = self.client.subscribe(subject.clone()).await.map_err(|e| {
                BusError::SubscribeFailed {
                    subject: subject.clone(),
                    message: e.to_string(),
                }
            })?;
            debug!("Subscribed to {subject}");
            streams.push(subscriber.map(move |msg| (inbound, msg)).boxed());
        }

        info!("Serving {} subjects", streams.len());
        let mut inbound = stream::select_all(streams);

        while let Some((kind, msg)) = inbound.next().await {
            match kind {
                Inbound::Request(operation) => self.spawn_request(operation, msg),
                Inbound::Completion => self.spawn_completion(msg),
            }
        }

        warn!("All subscriptions closed");
        Ok(())
    }

    fn spawn_request(&self, operation: Operation, msg: async_nats::Message) {
        let handler = self.requests.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let body = handler.handle(operation, &msg.payload).await;
            let Some(reply) = msg.reply else {
                warn!("Request on {} has no reply subject", msg.subject);
                return;
            };
            if let Err(e) = client.publish(reply, body.into()).await {
                error!("{}", BusError::publish(operation.subject(), e.to_string()));
            }
        });
    }

    fn spawn_completion(&self, msg: async_nats::Message) {
        let handler = self.completions.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let publications = match handler.handle(msg.subject.as_str(), &msg.payload).await {
                Ok(publications) => publications,
                Err(e) => {
                    error!("Failed to record {}: {e}", msg.subject);
                    return;
                }
            };
            for publication in publications {
                let subject = publication.subject.clone();
                if let Err(e) = client.publish(subject, publication.payload.into()).await {
                    error!("{}", BusError::publish(publication.subject, e.to_string()));
                }
            }
        });
    }
}
