//! Change notification sources.
//!
//! The upstream bridge publishes an empty message on
//! `{prefix}.{table}.{kind}` whenever a row changes, e.g.
//! `crowdwatch.changes.zones.update`. Payloads carry no row data by
//! design: a notification only marks state dirty, and the subscriber
//! re-fetches the full snapshot. Subjects that do not parse are logged
//! and skipped so a misbehaving publisher cannot wedge the stream.

use crowdwatch_types::{ChangeEvent, ChangeKind, ChangeTable};
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info};

use crate::error::FeedError;

/// A source of row-level change notifications.
///
/// Abstracted so the subscriber can be driven by an in-memory channel in
/// tests; production uses [`NatsFeedSource`].
#[async_trait::async_trait]
pub trait ChangeFeedSource: Send + Sync {
    /// Open a notification stream.
    ///
    /// The stream ends when the underlying channel is lost; the
    /// subscriber re-subscribes after a configured delay.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Transport`] if the subscription cannot be
    /// established.
    async fn subscribe(&self) -> Result<BoxStream<'static, ChangeEvent>, FeedError>;
}

/// NATS-backed change feed.
pub struct NatsFeedSource {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsFeedSource {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Transport`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str, subject_prefix: &str) -> Result<Self, FeedError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| FeedError::Transport(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self {
            client,
            subject_prefix: subject_prefix.to_owned(),
        })
    }

    /// Build the subject a change to `table` of `kind` is published on.
    pub fn subject_for(prefix: &str, table: ChangeTable, kind: ChangeKind) -> String {
        format!("{prefix}.{}.{}", table.as_str(), kind.as_str())
    }

    /// Parse a change-feed subject back into an event.
    ///
    /// Returns `None` for subjects outside the prefix, with unknown
    /// table or kind tokens, or with trailing tokens.
    pub fn parse_subject(prefix: &str, subject: &str) -> Option<ChangeEvent> {
        let rest = subject.strip_prefix(prefix)?.strip_prefix('.')?;
        let (table, kind) = rest.split_once('.')?;
        if kind.contains('.') {
            return None;
        }
        Some(ChangeEvent {
            table: ChangeTable::parse(table)?,
            kind: ChangeKind::parse(kind)?,
        })
    }
}

#[async_trait::async_trait]
impl ChangeFeedSource for NatsFeedSource {
    async fn subscribe(&self) -> Result<BoxStream<'static, ChangeEvent>, FeedError> {
        let subject = format!("{}.>", self.subject_prefix);
        debug!(subject = subject, "subscribing to change subjects");
        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| FeedError::Transport(format!("failed to subscribe to {subject}: {e}")))?;
        info!(subject = subject, "subscribed to change feed");

        let prefix = self.subject_prefix.clone();
        let events = subscriber
            .filter_map(move |message| {
                let event = Self::parse_subject(&prefix, message.subject.as_str());
                if event.is_none() {
                    debug!(
                        subject = %message.subject,
                        "ignoring unrecognized change subject"
                    );
                }
                futures::future::ready(event)
            })
            .boxed();
        Ok(events)
    }
}

impl std::fmt::Debug for NatsFeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsFeedSource")
            .field("subject_prefix", &self.subject_prefix)
            .finish_non_exhaustive()
    }
}
