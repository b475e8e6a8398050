use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::error::{AppError, AppResult};
use crate::download::error::DownloadError;
use crate::download::progress::DownloadEvent;
use crate::download::resolution::ResolutionPolicy;
use crate::download::source::{DownloadOutput, DownloadRequest, DownloadSource};

/// Front of the download stack: metadata, checks, resolution choice, download.
#[derive(Clone)]
pub struct Downloader {
    source: Arc<dyn DownloadSource>,
    policy: ResolutionPolicy,
    max_duration_secs: u64,
}

impl Downloader {
    pub fn new(source: Arc<dyn DownloadSource>, policy: ResolutionPolicy, max_duration_secs: u64) -> Self {
        Self {
            source,
            policy,
            max_duration_secs,
        }
    }

    pub fn source(&self) -> &Arc<dyn DownloadSource> {
        &self.source
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Runs one download.
    ///
    /// URLs the source does not support fail with an input error before any
    /// request is made.
    ///
    /// `request.resolution` is the user's choice; when the site does not offer
    /// it, a `ResolutionFallback` event is sent and the policy's substitute is
    /// downloaded instead. With the strict policy this fails with
    /// `AppError::ResolutionUnavailable`.
    pub async fn fetch(
        &self,
        request: &DownloadRequest,
        events: mpsc::UnboundedSender<DownloadEvent>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput> {
        if !self.source.supports_url(&request.url) {
            return Err(AppError::Input(format!(
                "{} is not supported by {}",
                request.url,
                self.source.name()
            )));
        }

        let metadata = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            meta = self.source.fetch_metadata(&request.url, request.cookies_file.as_deref()) => meta?,
        };

        if metadata.is_live {
            return Err(DownloadError::Livestream.into());
        }
        if let Some(duration) = metadata.duration_secs {
            if duration > self.max_duration_secs {
                return Err(DownloadError::TooLong {
                    duration,
                    limit: self.max_duration_secs,
                }
                .into());
            }
        }

        let _ = events.send(DownloadEvent::Metadata {
            title: metadata.title.clone(),
            duration_secs: metadata.duration_secs,
        });

        let chosen = match self.policy.resolve(request.resolution, &metadata.available_heights) {
            Ok(resolution) => resolution,
            Err(unavailable) => match unavailable.fallback {
                Some(fallback) => {
                    log::info!(
                        "↘️ {} unavailable for {}, using {} ({} policy)",
                        unavailable.requested,
                        request.url,
                        fallback,
                        self.policy
                    );
                    let _ = events.send(DownloadEvent::ResolutionFallback {
                        requested: unavailable.requested,
                        chosen: fallback,
                    });
                    fallback
                }
                None => {
                    return Err(AppError::ResolutionUnavailable {
                        requested: unavailable.requested,
                        available: unavailable.available,
                    })
                }
            },
        };

        let mut effective = request.clone();
        effective.resolution = chosen;
        self.source.download(&effective, &metadata, events, cancel).await
    }
}
