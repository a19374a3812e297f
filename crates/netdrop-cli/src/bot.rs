//! Long-polling bot loop.
//!
//! Each document message is handled on its own task. Ctrl-C stops polling;
//! deploys already in flight run to completion and still get their reply.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::{JoinError, JoinSet};

use netdrop_core::deploy::HostingBackend;
use netdrop_core::pipeline::UploadPipeline;
use netdrop_core::report::ResultReporter;

use crate::telegram::{Message, TelegramClient};

const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct Bot<B> {
    pipeline: Arc<UploadPipeline<B, TelegramClient>>,
    reporter: ResultReporter,
    processing_ack: bool,
}

impl<B: HostingBackend + 'static> Bot<B> {
    pub fn new(pipeline: UploadPipeline<B, TelegramClient>, processing_ack: bool) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            reporter: ResultReporter::new(),
            processing_ack,
        }
    }

    /// Poll until Ctrl-C, then wait for in-flight uploads.
    pub async fn run(&self) -> Result<()> {
        let telegram = self.pipeline.source();
        let mut offset: Option<i64> = None;
        let mut failed_polls = 0u32;
        let mut in_flight = JoinSet::new();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!("bot started, polling for documents");

        loop {
            let delay = if failed_polls > 0 {
                RETRY_DELAY
            } else {
                Duration::ZERO
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(in_flight = in_flight.len(), "shutdown requested");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
                polled = async move {
                    tokio::time::sleep(delay).await;
                    telegram.get_updates(offset).await
                } => match polled {
                    Ok(updates) => {
                        failed_polls = 0;
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            if let Some(message) = update.message {
                                self.dispatch(message, &mut in_flight);
                            }
                        }
                    }
                    Err(err) => {
                        failed_polls += 1;
                        tracing::warn!(attempt = failed_polls, error = %format!("{err:#}"), "polling failed");
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        tracing::info!("bot stopped");
        Ok(())
    }

    fn dispatch(&self, message: Message, in_flight: &mut JoinSet<()>) {
        let Some(event) = message.inbound_event() else {
            tracing::debug!(chat = message.chat.id, "ignoring message without a document");
            return;
        };

        let pipeline = Arc::clone(&self.pipeline);
        let reporter = self.reporter;
        let processing_ack = self.processing_ack;
        let chat = message.chat.id;
        let reply_to = Some(message.message_id);

        in_flight.spawn(async move {
            let telegram = pipeline.source();

            if processing_ack && pipeline.gate().is_member(&event.principal) {
                if let Ok(name) = pipeline
                    .validator()
                    .validate(event.document.file_name.as_deref())
                {
                    let ack = reporter.processing(Some(&name));
                    if let Err(err) = telegram.send_message(chat, &ack, reply_to).await {
                        tracing::warn!(chat, error = %format!("{err:#}"), "could not send acknowledgment");
                    }
                }
            }

            let outcome = pipeline.handle(event).await;
            let reply = reporter.report(&outcome);
            if let Err(err) = telegram.send_message(chat, &reply, reply_to).await {
                tracing::warn!(chat, error = %format!("{err:#}"), "could not send reply");
            }
        });
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        tracing::error!(error = %err, "upload task ended abnormally");
    }
}
