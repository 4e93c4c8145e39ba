//! Best-effort admin audit log.
//!
//! Generation outcomes (result photo or failure text) are forwarded to an
//! admin chat through a separate bot token, straight against the Telegram
//! HTTP API. The handoff is a bounded queue with no backpressure: `notify`
//! never blocks, never fails the caller, and a full queue silently drops the
//! record. Nothing here may ever affect the outcome returned to the user.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delivery timeout for one admin-log HTTP call.
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(25);

/// Queue depth before records get dropped.
const QUEUE_CAPACITY: usize = 64;

/// One generation outcome, as reported to the admin chat.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub user: u64,
    /// Selection summary, e.g. `pocket_t_shirt / black / paint`.
    pub summary: String,
    pub outcome: AuditOutcome,
}

#[derive(Debug, Clone)]
pub enum AuditOutcome {
    /// Generation succeeded; carries the result photo.
    Delivered(Vec<u8>),
    /// Generation failed; carries the error description.
    Failed(String),
}

/// Cheap cloneable handle the orchestrator notifies.
///
/// A disabled handle (no admin bot configured) swallows every record.
#[derive(Debug, Clone)]
pub struct AuditHandle {
    tx: Option<mpsc::Sender<AuditRecord>>,
}

impl AuditHandle {
    /// Handle that drops everything. Used when admin logging is off.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Queue a record for delivery. Fire-and-forget: a full or closed queue
    /// only produces a debug log line.
    pub fn notify(&self, record: AuditRecord) {
        let Some(tx) = &self.tx else { return };
        if let Err(e) = tx.try_send(record) {
            debug!(error = %e, "audit record dropped");
        }
    }
}

/// Admin-chat target.
#[derive(Debug, Clone)]
pub struct AdminLogConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Spawn the delivery worker and return its handle.
pub fn spawn_admin_logger(config: AdminLogConfig) -> AuditHandle {
    let (tx, mut rx) = mpsc::channel::<AuditRecord>(QUEUE_CAPACITY);
    let client = reqwest::Client::builder()
        .timeout(SEND_TIMEOUT)
        .build()
        .unwrap_or_default();

    info!(chat_id = %config.chat_id, "admin audit log enabled");
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            deliver(&client, &config, record).await;
        }
    });

    AuditHandle { tx: Some(tx) }
}

/// Send one record to the admin chat. All failures end here as warnings.
async fn deliver(client: &reqwest::Client, config: &AdminLogConfig, record: AuditRecord) {
    let result = match record.outcome {
        AuditOutcome::Delivered(photo) => {
            let caption = format!("user {} generated: {}", record.user, record.summary);
            let form = reqwest::multipart::Form::new()
                .text("chat_id", config.chat_id.clone())
                .text("caption", caption)
                .part(
                    "photo",
                    reqwest::multipart::Part::bytes(photo).file_name("result.jpg"),
                );
            client
                .post(api_url(&config.bot_token, "sendPhoto"))
                .multipart(form)
                .send()
                .await
        }
        AuditOutcome::Failed(error) => {
            let text = format!(
                "user {} generation failed ({}): {}",
                record.user, record.summary, error
            );
            client
                .post(api_url(&config.bot_token, "sendMessage"))
                .form(&[("chat_id", config.chat_id.as_str()), ("text", text.as_str())])
                .send()
                .await
        }
    };

    match result {
        Ok(response) if !response.status().is_success() => {
            warn!(status = %response.status(), "admin log rejected");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "admin log delivery failed"),
    }
}

fn api_url(token: &str, method: &str) -> String {
    format!("https://api.telegram.org/bot{}/{}", token, method)
}
