mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{metadata, secs, shared, RecordingSleeper, ScriptedUpstream, Step};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tube_fetch_lib::downloader::{
    BackoffConfig, DownloadError, DownloadRequest, Downloader, ErrorCategory, Outcome,
    QualitySpec, RestrictionReason,
};

fn request(dir: &TempDir, quality: &str, max_retries: u32) -> DownloadRequest {
    DownloadRequest::new(
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        quality.parse::<QualitySpec>().unwrap(),
        dir.path(),
        max_retries,
    )
    .unwrap()
}

fn downloader(upstream: &Arc<ScriptedUpstream>, sleeper: &Arc<RecordingSleeper>) -> Downloader {
    Downloader::new(upstream.clone()).with_sleeper(sleeper.clone())
}

fn category(outcome: &Outcome) -> Option<ErrorCategory> {
    match outcome {
        Outcome::Failure { category, .. } => *category,
        Outcome::Success { .. } => None,
    }
}

#[tokio::test]
async fn test_exact_quality_downloads_without_retries() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(
        Some("Clip"),
        &["480p", "720p", "1080p"],
    ))));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "720p", 3))
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(outcome.message(), "Download complete: Clip");
    let path = outcome.path().unwrap();
    assert!(path.starts_with(dir.path()));
    assert!(path.exists());
    assert_eq!(upstream.transferred(), vec!["720p"]);
    assert_eq!(upstream.fetch_calls(), 1);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_missing_quality_falls_back_to_highest() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(
        Some("Clip"),
        &["360p"],
    ))));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "720p", 3))
        .await;

    assert!(outcome.is_success());
    assert_eq!(upstream.transferred(), vec!["360p"]);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_symbolic_quality_never_falls_back() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(
        Some("Clip"),
        &[],
    ))));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "lowest", 3))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::NoMatchingStream));
    assert!(outcome
        .message()
        .starts_with("No video stream found with resolution lowest"));
    assert_eq!(upstream.fetch_calls(), 1);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_fallback_without_streams_is_terminal() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(
        Some("Clip"),
        &[],
    ))));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "1080p", 3))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::NoMatchingStream));
    assert!(outcome
        .message()
        .starts_with("No video stream found with resolution 1080p"));
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_extremes_pick_by_rank() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(
        Some("Clip"),
        &["360p", "720p", "1080p"],
    ))));
    let sleeper = shared(RecordingSleeper::new());
    let downloader = downloader(&upstream, &sleeper);

    assert!(downloader.download(&request(&dir, "highest", 0)).await.is_success());
    assert!(downloader.download(&request(&dir, "lowest", 0)).await.is_success());
    assert_eq!(upstream.transferred(), vec!["1080p", "360p"]);
}

#[tokio::test]
async fn test_parse_failures_recover_then_back_off() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::FetchFails(DownloadError::Parse(
        "Unable to extract initial player response".to_string(),
    ))));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "highest", 2))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::ParseFailure));
    assert!(outcome
        .message()
        .starts_with("Could not parse the video page after 3 attempts"));
    assert!(outcome.message().contains("yt-dlp -U"));
    assert_eq!(upstream.recoveries(), 2);
    assert_eq!(upstream.fetch_calls(), 3);
    assert_eq!(sleeper.waits(), secs(&[1, 2]));
}

#[tokio::test]
async fn test_failed_recovery_does_not_block_retry() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(
        ScriptedUpstream::new(vec![
            Step::FetchFails(DownloadError::Parse("Invalid JSON".to_string())),
            Step::Serve(metadata(Some("Clip"), &["720p"])),
        ])
        .with_failing_recovery(),
    );
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "highest", 3))
        .await;

    assert!(outcome.is_success());
    assert_eq!(upstream.recoveries(), 1);
    assert_eq!(sleeper.waits(), secs(&[1]));
}

#[tokio::test]
async fn test_transient_rejections_exhaust_budget() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::FetchFails(DownloadError::Http {
        status: Some(429),
        message: "Too Many Requests".to_string(),
    })));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "highest", 3))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::TransientRejection));
    assert!(outcome.message().contains("after 4 attempts"));
    assert_eq!(upstream.fetch_calls(), 4);
    assert_eq!(upstream.recoveries(), 0);
    assert_eq!(sleeper.waits(), secs(&[1, 2, 4]));
}

#[tokio::test]
async fn test_transfer_failure_is_retried() {
    let dir = TempDir::new().unwrap();
    let clip = metadata(Some("Clip"), &["720p"]);
    let upstream = shared(ScriptedUpstream::new(vec![
        Step::TransferFails(
            clip.clone(),
            DownloadError::Network("connection reset by peer".to_string()),
        ),
        Step::Serve(clip),
    ]));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "720p", 3))
        .await;

    assert!(outcome.is_success());
    assert_eq!(upstream.fetch_calls(), 2);
    assert_eq!(upstream.transferred(), vec!["720p"]);
    assert_eq!(sleeper.waits(), secs(&[1]));
}

#[tokio::test]
async fn test_restricted_content_never_waits() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::FetchFails(
        DownloadError::Restricted {
            reason: RestrictionReason::AgeRestricted,
            message: "Sign in to confirm your age".to_string(),
        },
    )));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "highest", 5))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::RestrictedContent));
    assert!(outcome.message().contains("Age-restricted content"));
    assert_eq!(upstream.fetch_calls(), 1);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_unknown_error_retries_once() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::FetchFails(DownloadError::Unknown(
        "something odd happened".to_string(),
    ))));
    let sleeper = shared(RecordingSleeper::new());
    let backoff = BackoffConfig::default().with_unknown_retry_delay(Duration::from_millis(500));

    let outcome = downloader(&upstream, &sleeper)
        .with_backoff(backoff)
        .download(&request(&dir, "highest", 3))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::Unknown));
    assert_eq!(upstream.fetch_calls(), 2);
    assert_eq!(sleeper.waits(), vec![Duration::from_millis(500)]);
}

#[tokio::test]
async fn test_missing_title_uses_fallback_label() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(None, &["720p"]))));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "highest", 3))
        .await;

    assert_eq!(outcome.message(), "Download complete: video_dQw4w9WgXcQ");
    assert_eq!(upstream.fetch_calls(), 1);
}

#[tokio::test]
async fn test_progress_reaches_sink() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(
        Some("Clip"),
        &["720p"],
    ))));
    let sleeper = shared(RecordingSleeper::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = seen.clone();
        move |percentage: f64| seen.lock().unwrap().push(percentage)
    };

    let outcome = downloader(&upstream, &sleeper)
        .with_progress_sink(Arc::new(sink))
        .download(&request(&dir, "highest", 0))
        .await;

    assert!(outcome.is_success());
    assert_eq!(*seen.lock().unwrap(), vec![25.0, 100.0]);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::Serve(metadata(
        Some("Clip"),
        &["720p"],
    ))));
    let sleeper = shared(RecordingSleeper::new());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = downloader(&upstream, &sleeper)
        .with_cancel_token(token)
        .download(&request(&dir, "highest", 3))
        .await;

    assert_eq!(outcome.message(), "Download cancelled");
    assert_eq!(category(&outcome), None);
    assert!(!outcome.is_success());
    assert_eq!(upstream.fetch_calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_backoff() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::FetchFails(
        DownloadError::NetworkTimeout,
    )));
    let token = CancellationToken::new();
    let sleeper = shared(RecordingSleeper::cancelling(token.clone()));

    let outcome = downloader(&upstream, &sleeper)
        .with_cancel_token(token)
        .download(&request(&dir, "highest", 5))
        .await;

    assert_eq!(outcome.message(), "Download cancelled");
    assert_eq!(upstream.fetch_calls(), 1);
    assert_eq!(sleeper.waits(), secs(&[1]));
}

#[tokio::test]
async fn test_unknown_retry_does_not_consume_backoff_budget() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::new(vec![
        Step::FetchFails(DownloadError::Unknown("something odd happened".to_string())),
        Step::FetchFails(DownloadError::Http {
            status: Some(429),
            message: "Too Many Requests".to_string(),
        }),
    ]));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "highest", 2))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::TransientRejection));
    assert!(outcome.message().contains("after 4 attempts"));
    assert_eq!(upstream.fetch_calls(), 4);
    assert_eq!(sleeper.waits(), secs(&[1, 1, 2]));
}

#[tokio::test]
async fn test_backoff_restarts_for_each_call() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::always(Step::FetchFails(DownloadError::Http {
        status: Some(503),
        message: "Service Unavailable".to_string(),
    })));
    let sleeper = shared(RecordingSleeper::new());
    let downloader = downloader(&upstream, &sleeper);

    let first = downloader.download(&request(&dir, "highest", 2)).await;
    assert_eq!(sleeper.waits(), secs(&[1, 2]));

    let second = downloader.download(&request(&dir, "highest", 2)).await;
    assert_eq!(sleeper.waits(), secs(&[1, 2, 1, 2]));

    assert!(!first.is_success());
    assert!(!second.is_success());
    assert_eq!(upstream.fetch_calls(), 6);
}

#[tokio::test]
async fn test_fallback_stays_on_highest_after_retry() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::new(vec![
        Step::TransferFails(
            metadata(Some("Clip"), &["360p", "480p"]),
            DownloadError::Network("connection reset by peer".to_string()),
        ),
        // The requested label shows up on the retry, but the fallback holds
        Step::Serve(metadata(Some("Clip"), &["720p", "1080p"])),
    ]));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "720p", 3))
        .await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(upstream.attempted(), vec!["480p", "1080p"]);
    assert_eq!(upstream.transferred(), vec!["1080p"]);
    assert_eq!(sleeper.waits(), secs(&[1]));
}

#[tokio::test]
async fn test_fallback_is_not_repeated_when_streams_vanish() {
    let dir = TempDir::new().unwrap();
    let upstream = shared(ScriptedUpstream::new(vec![
        Step::TransferFails(
            metadata(Some("Clip"), &["360p"]),
            DownloadError::NetworkTimeout,
        ),
        Step::Serve(metadata(Some("Clip"), &[])),
    ]));
    let sleeper = shared(RecordingSleeper::new());

    let outcome = downloader(&upstream, &sleeper)
        .download(&request(&dir, "720p", 3))
        .await;

    assert_eq!(category(&outcome), Some(ErrorCategory::NoMatchingStream));
    assert!(outcome
        .message()
        .starts_with("No video stream found with resolution 720p"));
    assert_eq!(upstream.fetch_calls(), 2);
    assert_eq!(upstream.attempted(), vec!["360p"]);
}
