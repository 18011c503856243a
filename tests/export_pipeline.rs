//! End-to-end tests for the export pipeline and tenant isolation,
//! running against an in-memory SQLite database with real migrations.

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use chatlogger::config::WorkerConfig;
use chatlogger::db::api_key_repository::ApiKeyRepository;
use chatlogger::db::chat_repository::ChatRepository;
use chatlogger::db::export_repository::ExportRepository;
use chatlogger::db::message_repository::MessageRepository;
use chatlogger::db::organization_repository::OrganizationRepository;
use chatlogger::db::queue_repository::QueueRepository;
use chatlogger::db::user_repository::UserRepository;
use chatlogger::db::DbPool;
use chatlogger::jobs::processor::{process_task, ProcessOutcome};
use chatlogger::models::{
    ApiKey, Chat, CreateExportRequest, ExportFormat, ExportScope, ExportStatus, Lane, Message,
    MessageRole, Organization, Role, TaskKind, TaskStatus, User,
};
use chatlogger::services::auth::{generate_api_key, key_digest};
use chatlogger::services::ExportService;
use chatlogger::utils::AppError;

async fn setup_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

async fn seed_org(pool: &DbPool, slug: &str) -> Organization {
    let org = Organization::new(format!("{} Inc", slug), slug.to_string());
    OrganizationRepository::new(pool)
        .create(&org)
        .await
        .expect("create organization");
    org
}

async fn seed_user(pool: &DbPool, org: &Organization) -> User {
    let user = User::new(
        org.id,
        format!("user-{}@example.com", Uuid::new_v4()),
        "$2b$04$placeholderplaceholderplaceholder".to_string(),
        Role::Admin,
    );
    UserRepository::new(pool).create(&user).await.expect("create user");
    user
}

async fn seed_chat_with_messages(
    pool: &DbPool,
    org: &Organization,
    message_count: usize,
) -> Chat {
    let chat = Chat::new(org.id, None, "Session".to_string());
    ChatRepository::new(pool).create(&chat).await.expect("create chat");

    let messages = MessageRepository::new(pool);
    for i in 0..message_count {
        let message = Message::new(chat.id, MessageRole::User, format!("hello {}", i));
        messages.create(&message).await.expect("create message");
    }
    chat
}

fn worker_config() -> WorkerConfig {
    WorkerConfig::default()
}

#[tokio::test]
async fn export_job_starts_pending_with_queued_task() {
    let pool = setup_pool().await;
    let org = seed_org(&pool, "acme").await;
    let user = seed_user(&pool, &org).await;

    let service = ExportService::new(pool.clone(), &worker_config());
    let request = CreateExportRequest {
        format: ExportFormat::Json,
        scope: ExportScope::All,
    };

    let job = service.create(org.id, user.id, &request).await.expect("create export");
    assert_eq!(job.status, ExportStatus::Pending);

    let stored = service.get(org.id, job.id).await.expect("fetch export");
    assert_eq!(stored.status, ExportStatus::Pending);
    assert!(stored.file_path.is_none());

    let task = QueueRepository::new(&pool)
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task enqueued");
    assert_eq!(task.kind, TaskKind::GenerateExport);
    assert_eq!(task.export_id, job.id);
    assert_eq!(task.attempts, 1);
}

#[tokio::test]
async fn completed_export_has_artifact_with_expected_content() {
    let pool = setup_pool().await;
    let org = seed_org(&pool, "acme").await;
    let user = seed_user(&pool, &org).await;
    seed_chat_with_messages(&pool, &org, 2).await;

    let service = ExportService::new(pool.clone(), &worker_config());
    let request = CreateExportRequest {
        format: ExportFormat::Json,
        scope: ExportScope::All,
    };
    let job = service.create(org.id, user.id, &request).await.expect("create export");

    let task = QueueRepository::new(&pool)
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task present");

    let export_dir = tempfile::tempdir().expect("tempdir");
    let outcome = process_task(&pool, export_dir.path(), &task)
        .await
        .expect("process");
    assert_eq!(outcome, ProcessOutcome::Done);

    let done = service.get(org.id, job.id).await.expect("fetch export");
    assert_eq!(done.status, ExportStatus::Completed);
    assert!(done.completed_at.is_some());

    let file_path = done.file_path.expect("completed job has artifact path");
    let contents = std::fs::read_to_string(&file_path).expect("read artifact");
    let value: serde_json::Value = serde_json::from_str(&contents).expect("valid json");
    assert_eq!(value["organization_id"], org.id.to_string());
    assert_eq!(value["chats"].as_array().unwrap().len(), 1);
    assert_eq!(value["chats"][0]["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn csv_export_accounts_rows_per_message_and_placeholder() {
    let pool = setup_pool().await;
    let org = seed_org(&pool, "acme").await;
    let user = seed_user(&pool, &org).await;
    seed_chat_with_messages(&pool, &org, 3).await;
    seed_chat_with_messages(&pool, &org, 0).await;

    let service = ExportService::new(pool.clone(), &worker_config());
    let request = CreateExportRequest {
        format: ExportFormat::Csv,
        scope: ExportScope::All,
    };
    let job = service.create(org.id, user.id, &request).await.expect("create export");

    let task = QueueRepository::new(&pool)
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task present");

    let export_dir = tempfile::tempdir().expect("tempdir");
    process_task(&pool, export_dir.path(), &task).await.expect("process");

    let done = service.get(org.id, job.id).await.expect("fetch export");
    let contents = std::fs::read_to_string(done.file_path.unwrap()).expect("read artifact");

    // header + 3 message rows + 1 placeholder row for the empty chat
    assert_eq!(contents.lines().count(), 5);
    assert!(contents.lines().next().unwrap().starts_with("Chat ID,"));
}

#[tokio::test]
async fn cross_tenant_export_fetch_reads_as_not_found() {
    let pool = setup_pool().await;
    let org_a = seed_org(&pool, "acme").await;
    let org_b = seed_org(&pool, "globex").await;
    let user_a = seed_user(&pool, &org_a).await;

    let service = ExportService::new(pool.clone(), &worker_config());
    let request = CreateExportRequest {
        format: ExportFormat::Json,
        scope: ExportScope::Chats,
    };
    let job = service
        .create(org_a.id, user_a.id, &request)
        .await
        .expect("create export");

    let result = service.get(org_b.id, job.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // the owner still sees it
    assert!(service.get(org_a.id, job.id).await.is_ok());
}

#[tokio::test]
async fn enqueue_failure_settles_job_as_failed() {
    let pool = setup_pool().await;
    let org = seed_org(&pool, "acme").await;
    let user = seed_user(&pool, &org).await;

    // Sabotage the queue so enqueue cannot succeed
    sqlx::query("DROP TABLE queue_tasks")
        .execute(&pool)
        .await
        .expect("drop queue table");

    let service = ExportService::new(pool.clone(), &worker_config());
    let request = CreateExportRequest {
        format: ExportFormat::Json,
        scope: ExportScope::All,
    };

    let result = service.create(org.id, user.id, &request).await;
    assert!(result.is_err());

    // the job record exists and went straight to failed, never processing
    let jobs = ExportRepository::new(&pool)
        .list_for_organization(org.id, None, None)
        .await
        .expect("list jobs");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, ExportStatus::Failed);
    assert!(jobs[0].error.is_some());
}

#[tokio::test]
async fn processing_failure_marks_job_failed_and_schedules_retry() {
    let pool = setup_pool().await;
    let org = seed_org(&pool, "acme").await;
    let user = seed_user(&pool, &org).await;

    let service = ExportService::new(pool.clone(), &worker_config());
    let request = CreateExportRequest {
        format: ExportFormat::Json,
        scope: ExportScope::All,
    };
    let job = service.create(org.id, user.id, &request).await.expect("create export");

    let queue = QueueRepository::new(&pool);
    let task = queue
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task present");

    // Export dir path occupied by a regular file: artifact write must fail
    let blocker = tempfile::NamedTempFile::new().expect("tempfile");
    let result = process_task(&pool, blocker.path(), &task).await;
    assert!(result.is_err());

    let failed = service.get(org.id, job.id).await.expect("fetch export");
    assert_eq!(failed.status, ExportStatus::Failed);
    assert!(failed.error.is_some());
    assert!(failed.file_path.is_none());
    // completion timestamps belong to successful jobs only
    assert!(failed.completed_at.is_none());

    // retry accounting: first failure goes back to queued with backoff
    let status = queue
        .fail(&task, "write failed", 30)
        .await
        .expect("record failure");
    assert_eq!(status, TaskStatus::Queued);

    let stored = queue.get_by_id(task.id).await.expect("get").expect("present");
    assert_eq!(stored.status, TaskStatus::Queued);
    assert!(stored.available_at > Utc::now());
    assert_eq!(stored.last_error.as_deref(), Some("write failed"));

    // not claimable before the backoff elapses
    assert!(queue
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .is_none());
}

#[tokio::test]
async fn task_dies_after_exhausting_attempts() {
    let pool = setup_pool().await;
    let queue = QueueRepository::new(&pool);

    let export_id = Uuid::new_v4();
    queue
        .enqueue(TaskKind::GenerateExport, export_id, 2, 60)
        .await
        .expect("enqueue");

    let first = queue
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task present");
    assert_eq!(first.attempts, 1);
    assert_eq!(queue.fail(&first, "boom", 0).await.unwrap(), TaskStatus::Queued);

    let second = queue
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task claimable again");
    assert_eq!(second.attempts, 2);
    assert_eq!(queue.fail(&second, "boom again", 0).await.unwrap(), TaskStatus::Dead);

    let dead = queue.get_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(dead.status, TaskStatus::Dead);
    assert!(queue
        .claim(Lane::Exports, Utc::now())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn expired_lease_makes_task_claimable_again() {
    let pool = setup_pool().await;
    let queue = QueueRepository::new(&pool);

    queue
        .enqueue(TaskKind::GenerateExport, Uuid::new_v4(), 3, 60)
        .await
        .expect("enqueue");

    let task = queue
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task present");
    assert_eq!(task.status, TaskStatus::Running);

    // running task with a live lease is invisible to other claimers
    assert!(queue.claim(Lane::Exports, Utc::now()).await.unwrap().is_none());

    // but once the lease deadline passes it is handed out again
    let after_lease = Utc::now() + Duration::seconds(task.timeout_secs + 1);
    let reclaimed = queue
        .claim(Lane::Exports, after_lease)
        .await
        .expect("claim")
        .expect("reclaimable after lease expiry");
    assert_eq!(reclaimed.id, task.id);
    assert_eq!(reclaimed.attempts, 2);
}

#[tokio::test]
async fn terminal_job_is_not_resurrected_by_a_retry() {
    let pool = setup_pool().await;
    let org = seed_org(&pool, "acme").await;
    let user = seed_user(&pool, &org).await;

    let service = ExportService::new(pool.clone(), &worker_config());
    let request = CreateExportRequest {
        format: ExportFormat::Json,
        scope: ExportScope::All,
    };
    let job = service.create(org.id, user.id, &request).await.expect("create export");

    let exports = ExportRepository::new(&pool);
    assert!(exports
        .update_status(job.id, ExportStatus::Failed, Some("first attempt broke"))
        .await
        .unwrap());

    // a later transition attempt is refused
    assert!(!exports
        .update_status(job.id, ExportStatus::Processing, None)
        .await
        .unwrap());

    // and a retried task treats the settled job as a no-op
    let task = QueueRepository::new(&pool)
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task present");
    let export_dir = tempfile::tempdir().expect("tempdir");
    let outcome = process_task(&pool, export_dir.path(), &task).await.expect("process");
    assert_eq!(outcome, ProcessOutcome::Done);

    let still_failed = service.get(org.id, job.id).await.expect("fetch");
    assert_eq!(still_failed.status, ExportStatus::Failed);
    assert_eq!(still_failed.error.as_deref(), Some("first attempt broke"));
}

#[tokio::test]
async fn task_for_missing_export_is_unprocessable() {
    let pool = setup_pool().await;
    let queue = QueueRepository::new(&pool);

    queue
        .enqueue(TaskKind::GenerateExport, Uuid::new_v4(), 3, 60)
        .await
        .expect("enqueue");
    let task = queue
        .claim(Lane::Exports, Utc::now())
        .await
        .expect("claim")
        .expect("task present");

    let export_dir = tempfile::tempdir().expect("tempdir");
    let outcome = process_task(&pool, export_dir.path(), &task).await.expect("process");
    assert_eq!(outcome, ProcessOutcome::Unprocessable);
}

#[tokio::test]
async fn revoked_api_key_never_validates_again() {
    let pool = setup_pool().await;
    let org = seed_org(&pool, "acme").await;
    let keys = ApiKeyRepository::new(&pool);

    let (raw, digest) = generate_api_key();
    let key = ApiKey::new(org.id, digest.clone(), "ingest".to_string());
    keys.create(&key).await.expect("create key");

    // a fresh key resolves by digest and is live
    let live = keys
        .get_by_digest(&key_digest(&raw))
        .await
        .expect("lookup")
        .expect("key found");
    assert!(!live.is_revoked());
    assert_eq!(live.organization_id, org.id);

    assert!(keys.revoke(org.id, key.id).await.expect("revoke"));

    // the digest still resolves, but only to a tombstoned key
    let revoked = keys
        .get_by_digest(&digest)
        .await
        .expect("lookup")
        .expect("key still stored");
    assert!(revoked.is_revoked());

    // revoking twice is a no-op
    assert!(!keys.revoke(org.id, key.id).await.expect("revoke again"));
}

#[tokio::test]
async fn api_key_revocation_is_tenant_scoped() {
    let pool = setup_pool().await;
    let org_a = seed_org(&pool, "acme").await;
    let org_b = seed_org(&pool, "globex").await;
    let keys = ApiKeyRepository::new(&pool);

    let (_, digest) = generate_api_key();
    let key = ApiKey::new(org_a.id, digest, "ingest".to_string());
    keys.create(&key).await.expect("create key");

    // another tenant cannot revoke it
    assert!(!keys.revoke(org_b.id, key.id).await.expect("revoke attempt"));
    let stored = keys
        .list_for_organization(org_a.id)
        .await
        .expect("list")
        .remove(0);
    assert!(!stored.is_revoked());
}

#[tokio::test]
async fn export_listing_is_newest_first_and_tenant_scoped() {
    let pool = setup_pool().await;
    let org_a = seed_org(&pool, "acme").await;
    let org_b = seed_org(&pool, "globex").await;
    let user_a = seed_user(&pool, &org_a).await;
    let user_b = seed_user(&pool, &org_b).await;

    let exports = ExportRepository::new(&pool);
    for i in 0..3 {
        let mut job = chatlogger::models::ExportJob::new(
            org_a.id,
            user_a.id,
            ExportFormat::Json,
            ExportScope::All,
        );
        job.created_at = Utc::now() - Duration::minutes(10 - i);
        job.updated_at = job.created_at;
        exports.create(&job).await.expect("create job");
    }
    let foreign = chatlogger::models::ExportJob::new(
        org_b.id,
        user_b.id,
        ExportFormat::Csv,
        ExportScope::Chats,
    );
    exports.create(&foreign).await.expect("create foreign job");

    let listed = exports
        .list_for_organization(org_a.id, None, None)
        .await
        .expect("list");
    assert_eq!(listed.len(), 3);
    assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    assert!(listed.iter().all(|j| j.organization_id == org_a.id));
}
