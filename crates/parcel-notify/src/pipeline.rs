//! The daily job: mailbox -> CSV -> notifications -> admin report
//!
//! Stages run strictly in order and each is awaited to completion before the
//! next starts. The first error ends the run; only the per-row sends inside
//! the record stage are allowed to fail without stopping it.

use chrono::NaiveDate;
use pn_core::{Config, Notifier, RunReport, SendStatus, records};
use pn_graph::{GraphClient, MessageFilter, TokenCache, TokenStore};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{JobError, Result};

/// Run the whole job once.
///
/// `today` is the local date the report message must have arrived on.
pub async fn run<S, N>(
    config: &Config,
    store: S,
    notifier: &N,
    today: NaiveDate,
) -> Result<RunReport>
where
    S: TokenStore,
    N: Notifier + ?Sized,
{
    let client = connect(config, store).await?;
    let report_file = download_report(config, &client, today).await?;
    let report = records::process(&report_file, notifier).await?;

    info!("Run complete: {}", report);
    send_admin_report(config, notifier, &report).await;

    Ok(report)
}

/// Acquire a Graph token and bind a client to the mailbox
async fn connect<S: TokenStore>(config: &Config, store: S) -> Result<GraphClient> {
    let tokens = TokenCache::new(&config.graph, store)?;
    let access_token = tokens.get_token().await?;
    Ok(GraphClient::new(&config.graph, access_token)?)
}

/// Locate today's report message, save its CSV and mark it read
async fn download_report(
    config: &Config,
    client: &GraphClient,
    today: NaiveDate,
) -> Result<PathBuf> {
    let folder_id = client.resolve_folder(&config.job.folder_path).await?;

    let filter = MessageFilter::from_job(&config.job, today);
    let message = client
        .find_target_message(&folder_id, &filter)
        .await?
        .ok_or_else(|| {
            JobError::NoMatch(format!(
                "no unread '{}' message received on {}",
                filter.subject_keyword, today
            ))
        })?;

    let path = client
        .fetch_attachment(&message.id, &config.job.download_dir)
        .await?;

    // Only after the file is on disk
    client.mark_read(&message.id).await?;

    Ok(path)
}

/// The report is best effort; the run's outcome is already decided
async fn send_admin_report<N: Notifier + ?Sized>(config: &Config, notifier: &N, report: &RunReport) {
    match notifier
        .send_report(&config.whatsapp.admin_phone, report)
        .await
    {
        SendStatus::Accepted { .. } => info!("Run report sent to administrator"),
        SendStatus::Failed { reason } => warn!("Run report not delivered: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pn_core::{GraphConfig, JobConfig, WhatsAppConfig};
    use pn_graph::{CachedCredential, MemoryTokenStore};
    use pn_whatsapp::WhatsAppClient;
    use std::path::Path;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MAILBOX: &str = "/v1.0/users/ops@example.com";
    const WHATSAPP: &str = "/v19.0/1234567890/messages";

    fn test_config(server_uri: &str, download_dir: &Path) -> Config {
        Config {
            graph: GraphConfig {
                tenant_id: "tenant-1".to_string(),
                client_id: "client-1".to_string(),
                client_secret: "secret-1".to_string(),
                user_email: "ops@example.com".to_string(),
                base_url: format!("{}/v1.0", server_uri),
                login_base_url: server_uri.to_string(),
                token_file: PathBuf::from("unused.json"),
            },
            whatsapp: WhatsAppConfig {
                token: "wa-token".to_string(),
                phone_number_id: "1234567890".to_string(),
                base_url: format!("{}/v19.0", server_uri),
                admin_phone: "6590000000".to_string(),
                test_mode: false,
                notification_template: "uparcel_delivery_reminder".to_string(),
                report_template: "messages_report".to_string(),
                report_title: "Uparcel Reminder".to_string(),
                language: "en".to_string(),
            },
            job: JobConfig {
                timezone: chrono_tz::Asia::Singapore,
                subject_keyword: "Uparcel Integration Daily Job CSV".to_string(),
                test_subject: "TEST UPARCEL CSV".to_string(),
                folder_path: vec!["Automation".to_string(), "Uparcel Notifications".to_string()],
                download_dir: download_dir.to_path_buf(),
            },
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    fn valid_token() -> MemoryTokenStore {
        MemoryTokenStore::with_credential(CachedCredential::new(
            "cached-token",
            Utc::now() + Duration::minutes(30),
        ))
    }

    async fn mount_folders(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("{}/mailFolders", MAILBOX)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "auto-id", "displayName": "Automation"}]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/mailFolders/auto-id/childFolders", MAILBOX)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "uparcel-id", "displayName": "Uparcel Notifications"}]
            })))
            .mount(server)
            .await;
    }

    async fn mount_messages(server: &MockServer, subject: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{}/mailFolders/uparcel-id/messages", MAILBOX)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{
                    "id": "msg-1",
                    "subject": subject,
                    "receivedDateTime": "2024-01-05T01:15:00Z",
                    "isRead": false
                }]
            })))
            .mount(server)
            .await;
    }

    async fn mount_attachments(server: &MockServer, name: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("{}/messages/msg-1/attachments", MAILBOX)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "att-1", "name": name, "size": 120}]
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mount_mark_read(server: &MockServer, expected_calls: u64) {
        Mock::given(method("PATCH"))
            .and(path(format!("{}/messages/msg-1", MAILBOX)))
            .and(body_json(serde_json::json!({"isRead": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg-1",
                "isRead": true
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn accepted() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [{"id": "wamid.1", "message_status": "accepted"}]
        }))
    }

    #[tokio::test]
    async fn test_full_run_reports_totals() {
        let server = MockServer::start().await;
        mount_folders(&server).await;
        mount_messages(&server, "Uparcel Integration Daily Job CSV - Jan 5").await;
        mount_attachments(&server, "jobs.csv", 1).await;
        mount_mark_read(&server, 1).await;

        Mock::given(method("GET"))
            .and(path(format!(
                "{}/messages/msg-1/attachments/att-1/$value",
                MAILBOX
            )))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "reference_number,delivery_contact_person,delivery_contact_number,delivery_time\n\
                 ORD-1,Alice,6591 234 567,10:00-12:00\n\
                 ORD-2,Bob,,14:00-16:00\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(WHATSAPP))
            .and(body_partial_json(serde_json::json!({
                "to": "6591234567",
                "template": {"name": "uparcel_delivery_reminder"}
            })))
            .respond_with(accepted())
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(WHATSAPP))
            .and(body_partial_json(serde_json::json!({
                "to": "6590000000",
                "template": {
                    "name": "messages_report",
                    "components": [{
                        "type": "body",
                        "parameters": [
                            {"type": "text", "text": "Uparcel Reminder"},
                            {"type": "text", "text": "2"},
                            {"type": "text", "text": "1"},
                            {"type": "text", "text": "1"}
                        ]
                    }]
                }
            })))
            .respond_with(accepted())
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let notifier = WhatsAppClient::new(&config.whatsapp).unwrap();

        let report = run(&config, valid_token(), &notifier, today()).await.unwrap();

        assert_eq!(
            report,
            RunReport {
                total: 2,
                success: 1,
                failed: 1
            }
        );
        assert!(dir.path().join("jobs.csv").exists());
    }

    #[tokio::test]
    async fn test_no_match_stops_before_attachments() {
        let server = MockServer::start().await;
        mount_folders(&server).await;
        mount_messages(&server, "Weekly summary").await;
        mount_attachments(&server, "jobs.csv", 0).await;
        mount_mark_read(&server, 0).await;

        Mock::given(method("POST"))
            .and(path(WHATSAPP))
            .respond_with(accepted())
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let notifier = WhatsAppClient::new(&config.whatsapp).unwrap();

        let err = run(&config, valid_token(), &notifier, today())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::NoMatch(_)));
        assert_eq!(err.exit_code(), 65);
    }

    #[tokio::test]
    async fn test_missing_csv_leaves_message_unread() {
        let server = MockServer::start().await;
        mount_folders(&server).await;
        mount_messages(&server, "TEST UPARCEL CSV").await;
        mount_attachments(&server, "jobs.xlsx", 1).await;
        mount_mark_read(&server, 0).await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let notifier = WhatsAppClient::new(&config.whatsapp).unwrap();

        let err = run(&config, valid_token(), &notifier, today())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_mark_read_stops_before_notifying() {
        let server = MockServer::start().await;
        mount_folders(&server).await;
        mount_messages(&server, "Uparcel Integration Daily Job CSV - Jan 5").await;
        mount_attachments(&server, "jobs.csv", 1).await;

        Mock::given(method("GET"))
            .and(path(format!(
                "{}/messages/msg-1/attachments/att-1/$value",
                MAILBOX
            )))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "delivery_contact_number,reference_number\n6591234567,ORD-1\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path(format!("{}/messages/msg-1", MAILBOX)))
            .respond_with(ResponseTemplate::new(500).set_body_string("mailbox busy"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(WHATSAPP))
            .respond_with(accepted())
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let notifier = WhatsAppClient::new(&config.whatsapp).unwrap();

        let err = run(&config, valid_token(), &notifier, today())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Network(_)));
        assert_eq!(err.exit_code(), 69);
        // No rollback: the download stays on disk
        assert_eq!(
            std::fs::read_to_string(dir.path().join("jobs.csv")).unwrap(),
            "delivery_contact_number,reference_number\n6591234567,ORD-1\n"
        );
    }

    #[tokio::test]
    async fn test_rejected_credentials_end_run() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "unauthorized_client",
                "error_description": "AADSTS700016: Application not found."
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let notifier = WhatsAppClient::new(&config.whatsapp).unwrap();

        let err = run(&config, MemoryTokenStore::new(), &notifier, today())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Auth(_)));
        assert_eq!(err.exit_code(), 77);
    }

    #[tokio::test]
    async fn test_empty_store_exchanges_token_once() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "fresh-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        mount_folders(&server).await;
        mount_messages(&server, "Weekly summary").await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let notifier = WhatsAppClient::new(&config.whatsapp).unwrap();
        let store = std::sync::Arc::new(MemoryTokenStore::new());

        let err = run(&config, store.clone(), &notifier, today())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::NoMatch(_)));
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.access_token, "fresh-token");
    }
}
