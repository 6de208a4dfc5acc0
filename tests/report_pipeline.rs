mod common;

use std::sync::atomic::Ordering;

use uuid::Uuid;

use ai_medical_reports::{
    error::AppError,
    models::{CreateReportInput, SubjectInputs, UpdateReportInput},
    storage::StorageError,
};
use common::{StubProvider, harness};

fn mario_rossi() -> CreateReportInput {
    CreateReportInput {
        title: "Mario Rossi".to_string(),
        report_type: Some("REFERTO".to_string()),
        inputs: SubjectInputs {
            subject_name: "Mario Rossi".to_string(),
            subject_info: "età 54, ricovero 12/03".to_string(),
            notes: "controllo post-operatorio".to_string(),
        },
        content: None,
    }
}

#[tokio::test]
async fn test_create_generates_and_persists_verified_body() {
    let h = harness(StubProvider::replying("Referto generato."));
    let user_id = Uuid::new_v4();

    let report = tokio_test::assert_ok!(h.pipeline.create(user_id, mario_rossi()).await);

    assert_eq!(report.report_type, "REFERTO");
    assert_eq!(report.content.as_deref(), Some("Referto generato."));
    assert_eq!(
        h.blobs.content_at(&report.blob_url).as_deref(),
        Some("Referto generato.")
    );
    assert_eq!(h.provider.call_count(), 1);

    let stored = h.reports.get(report.id).unwrap();
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.blob_url, report.blob_url);
    assert!(stored.blob_key.starts_with(&format!("reports/{user_id}/")));
    assert!(stored.blob_key.ends_with("-Mario-Rossi.txt"));
}

#[tokio::test]
async fn test_create_with_unknown_type_keeps_manual_content_without_generating() {
    let h = harness(StubProvider::replying("unused"));

    let report = h
        .pipeline
        .create(
            Uuid::new_v4(),
            CreateReportInput {
                title: "Lettera".to_string(),
                report_type: Some("LETTERA".to_string()),
                inputs: SubjectInputs::default(),
                content: Some("testo scritto a mano".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(report.content.as_deref(), Some("testo scritto a mano"));
    assert_eq!(report.report_type, "LETTERA");
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_create_without_body_is_rejected() {
    let h = harness(StubProvider::replying("unused"));

    let err = h
        .pipeline
        .create(
            Uuid::new_v4(),
            CreateReportInput {
                title: "Vuoto".to_string(),
                report_type: None,
                inputs: SubjectInputs::default(),
                content: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.blobs.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_known_type_requires_subject_info() {
    let h = harness(StubProvider::replying("unused"));
    let mut input = mario_rossi();
    input.inputs.subject_info = "  ".to_string();

    let err = h.pipeline.create(Uuid::new_v4(), input).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_generation_failure_creates_nothing() {
    let h = harness(StubProvider::failing());

    let err = h
        .pipeline
        .create(Uuid::new_v4(), mario_rossi())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Generation(_)));
    assert_eq!(h.reports.len(), 0);
    assert_eq!(h.blobs.len(), 0);
}

#[tokio::test]
async fn test_unverified_create_writes_no_record() {
    let h = harness(StubProvider::replying("Referto generato."));
    h.blobs.set_mangle_reads(true);

    let err = h
        .pipeline
        .create(Uuid::new_v4(), mario_rossi())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Storage(StorageError::Unverified { attempts: 5 })
    ));
    assert_eq!(h.reports.len(), 0);
    assert_eq!(h.blobs.reads.load(Ordering::SeqCst), 5);
    assert_eq!(h.blobs.puts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_insert_removes_verified_blob() {
    let h = harness(StubProvider::replying("Referto generato."));
    h.reports.set_fail_inserts(true);

    let err = h
        .pipeline
        .create(Uuid::new_v4(), mario_rossi())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(h.blobs.puts.load(Ordering::SeqCst), 1);
    assert_eq!(h.blobs.len(), 0);
    assert_eq!(h.reports.len(), 0);
}

#[tokio::test]
async fn test_overlong_type_tag_is_rejected_before_any_write() {
    let h = harness(StubProvider::replying("unused"));

    let err = h
        .pipeline
        .create(
            Uuid::new_v4(),
            CreateReportInput {
                title: "Lettera".to_string(),
                report_type: Some("X".repeat(65)),
                inputs: SubjectInputs::default(),
                content: Some("x".to_string()),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.blobs.puts.load(Ordering::SeqCst), 0);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_failed_verification_leaves_record_untouched() {
    let h = harness(StubProvider::replying("Referto generato."));
    let user_id = Uuid::new_v4();
    let created = h.pipeline.create(user_id, mario_rossi()).await.unwrap();
    let before = h.reports.get(created.id).unwrap();

    h.blobs.set_mangle_reads(true);
    let err = h
        .pipeline
        .update(
            user_id,
            created.id,
            UpdateReportInput {
                content: Some("una versione molto più lunga del referto".to_string()),
                ..UpdateReportInput::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(StorageError::Unverified { .. })));
    let after = h.reports.get(created.id).unwrap();
    assert_eq!(after.blob_url, before.blob_url);
    assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn test_manual_update_keeps_type_and_reuses_key() {
    let h = harness(StubProvider::replying("Referto generato."));
    let user_id = Uuid::new_v4();
    let created = h.pipeline.create(user_id, mario_rossi()).await.unwrap();
    let before = h.reports.get(created.id).unwrap();

    let updated = h
        .pipeline
        .update(
            user_id,
            created.id,
            UpdateReportInput {
                content: Some("testo manuale".to_string()),
                ..UpdateReportInput::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.content.as_deref(), Some("testo manuale"));
    assert_eq!(updated.report_type, "REFERTO");
    assert_eq!(h.provider.call_count(), 1, "manual edits skip generation");

    let after = h.reports.get(created.id).unwrap();
    assert_eq!(after.blob_key, before.blob_key);
    assert_ne!(after.blob_url, before.blob_url);
    assert!(after.updated_at > before.updated_at);
    assert_eq!(
        h.blobs.content_at(&after.blob_url).as_deref(),
        Some("testo manuale")
    );
}

#[tokio::test]
async fn test_regenerate_twice_both_verified() {
    let h = harness(StubProvider::numbered("Referto"));
    let user_id = Uuid::new_v4();
    let created = h.pipeline.create(user_id, mario_rossi()).await.unwrap();
    assert_eq!(created.content.as_deref(), Some("Referto #1"));

    let regenerate = || UpdateReportInput {
        regenerate: true,
        report_type: Some("CHIRURGIA".to_string()),
        subject_name: Some("Mario Rossi".to_string()),
        subject_info: Some("età 54, intervento 14/03".to_string()),
        notes: Some("decorso regolare".to_string()),
        ..UpdateReportInput::default()
    };

    let first = h
        .pipeline
        .update(user_id, created.id, regenerate())
        .await
        .unwrap();
    let second = h
        .pipeline
        .update(user_id, created.id, regenerate())
        .await
        .unwrap();

    assert_eq!(first.content.as_deref(), Some("Referto #2"));
    assert_eq!(second.content.as_deref(), Some("Referto #3"));
    assert_eq!(
        h.blobs.content_at(&second.blob_url).as_deref(),
        Some("Referto #3")
    );

    let stored = h.reports.get(created.id).unwrap();
    assert_eq!(stored.report_type, "ESAME");
    assert_eq!(stored.subject_info, "età 54, intervento 14/03");
    assert_eq!(stored.notes, "decorso regolare");

    // each regeneration sees the body written by the one before it
    let prompts = h.provider.prompts.lock().unwrap();
    assert!(prompts[1].contains("Referto #1"));
    assert!(prompts[2].contains("Referto #2"));
}

#[tokio::test]
async fn test_regenerate_fails_when_current_body_unreadable() {
    let h = harness(StubProvider::replying("Referto generato."));
    let user_id = Uuid::new_v4();
    let created = h.pipeline.create(user_id, mario_rossi()).await.unwrap();

    h.blobs.set_fail_reads(true);
    let err = h
        .pipeline
        .update(
            user_id,
            created.id,
            UpdateReportInput {
                regenerate: true,
                ..UpdateReportInput::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(StorageError::Read(_))));
    assert_eq!(h.provider.call_count(), 1);
}

#[tokio::test]
async fn test_title_only_update_skips_blob_write() {
    let h = harness(StubProvider::replying("Referto generato."));
    let user_id = Uuid::new_v4();
    let created = h.pipeline.create(user_id, mario_rossi()).await.unwrap();
    let puts_before = h.blobs.puts.load(Ordering::SeqCst);

    let updated = h
        .pipeline
        .update(
            user_id,
            created.id,
            UpdateReportInput {
                title: Some("Mario Rossi - controllo".to_string()),
                ..UpdateReportInput::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Mario Rossi - controllo");
    assert!(updated.content.is_none());
    assert_eq!(h.blobs.puts.load(Ordering::SeqCst), puts_before);
}

#[tokio::test]
async fn test_empty_update_is_rejected() {
    let h = harness(StubProvider::replying("Referto generato."));
    let user_id = Uuid::new_v4();
    let created = h.pipeline.create(user_id, mario_rossi()).await.unwrap();

    let err = h
        .pipeline
        .update(user_id, created.id, UpdateReportInput::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_update_of_foreign_report_is_not_found() {
    let h = harness(StubProvider::replying("Referto generato."));
    let created = h
        .pipeline
        .create(Uuid::new_v4(), mario_rossi())
        .await
        .unwrap();

    let err = h
        .pipeline
        .update(
            Uuid::new_v4(),
            created.id,
            UpdateReportInput {
                content: Some("intruso".to_string()),
                ..UpdateReportInput::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.blobs.puts.load(Ordering::SeqCst), 1);
}
