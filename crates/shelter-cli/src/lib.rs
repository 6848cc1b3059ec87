//! Helpers shared by the `shelter-media` binary.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use shelter_storage::OperationContext;

/// Content type for a local file, judged by its extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Operation context for one command: bounded by `timeout` and cancelled on Ctrl-C.
pub fn command_context(timeout: Duration) -> OperationContext {
    let ctx = OperationContext::with_timeout(timeout);
    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight storage operation");
            token.cancel();
        }
    });
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(&PathBuf::from("rex.JPG")), "image/jpeg");
        assert_eq!(guess_content_type(&PathBuf::from("a/b/photo.webp")), "image/webp");
        assert_eq!(guess_content_type(&PathBuf::from("intake.pdf")), "application/pdf");
        assert_eq!(
            guess_content_type(&PathBuf::from("no_extension")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_command_context_has_deadline() {
        let ctx = command_context(Duration::from_secs(5));
        assert!(ctx.deadline().is_some());
        assert!(!ctx.is_cancelled());
    }
}
