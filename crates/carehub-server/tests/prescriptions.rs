mod common;

use std::sync::Arc;

use async_trait::async_trait;
use carehub_server::services::{NO_TEXT_PLACEHOLDER, OcrEngine, OcrError, OcrService};
use carehub_storage::PrescriptionStorage;
use common::{PHARMACIST_EMAIL, start_with, test_config};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

/// OCR engine that always returns the same text.
struct FixedOcr(&'static str);

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn extract_text(&self, _image: &[u8]) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

fn with_ocr(text: &'static str) -> impl FnOnce(&mut carehub_server::AppState) {
    move |state| {
        state.ocr = Arc::new(OcrService::new(Some(Arc::new(FixedOcr(text))), "fallback"));
    }
}

fn upload_form(patient_id: i64) -> Form {
    Form::new().text("patient_id", patient_id.to_string()).part(
        "file",
        Part::bytes(vec![0x89, b'P', b'N', b'G'])
            .file_name("scan.png")
            .mime_str("image/png")
            .unwrap(),
    )
}

#[tokio::test]
async fn empty_ocr_result_persists_sealed_placeholder() {
    let server = start_with(test_config(), with_ocr("")).await;
    let (patient_id, token) = server.patient("rx-empty@example.com").await;

    let resp = server
        .client
        .post(server.url("/patient/upload_prescription"))
        .bearer_auth(&token)
        .multipart(upload_form(patient_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Prescription Received");
    assert_eq!(body["extracted_preview"], "Image received, processing...");

    let stored = server
        .state
        .storage
        .list_patient_prescriptions(patient_id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    let sealed = &stored[0].extracted_data;
    assert!(!sealed.is_empty());
    assert!(!sealed.contains(NO_TEXT_PLACEHOLDER));
    assert_eq!(server.state.cipher.open(sealed).unwrap(), NO_TEXT_PLACEHOLDER);
    assert_eq!(stored[0].status.as_str(), "preparing");
    assert_eq!(stored[0].image_ref.as_deref(), Some("scan.png"));

    server.shutdown().await;
}

#[tokio::test]
async fn extracted_text_is_encrypted_at_rest_and_decrypted_for_owner() {
    let server = start_with(test_config(), with_ocr("Amoxicillin 500mg")).await;
    let (patient_id, token) = server.patient("rx-text@example.com").await;

    let body: Value = server
        .client
        .post(server.url("/patient/upload_prescription"))
        .bearer_auth(&token)
        .multipart(upload_form(patient_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["extracted_preview"], "Amoxicillin 500mg");

    let stored = server
        .state
        .storage
        .list_patient_prescriptions(patient_id)
        .await
        .unwrap();
    assert!(!stored[0].extracted_data.contains("Amoxicillin"));

    let list: Value = server
        .client
        .get(server.url(&format!("/patient/my_prescriptions/{patient_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list[0]["extracted_data"], "Amoxicillin 500mg");
    assert_eq!(list[0]["status"], "preparing");

    // Reading prescriptions is audited.
    let logs = server.state.audit.recent(10).await.unwrap();
    assert!(logs.iter().any(|l| l.action == "VIEW_PRESCRIPTIONS"));
    assert!(logs.iter().any(|l| l.action == "UPLOAD_PRESCRIPTION"));

    // The pharmacy queue shows the decrypted text to pharmacists.
    let pharmacist = server.staff_token(PHARMACIST_EMAIL).await;
    let queue: Value = server
        .client
        .get(server.url("/admin/pharmacy_queue"))
        .bearer_auth(&pharmacist)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(queue["prescriptions"][0]["extracted_data"], "Amoxicillin 500mg");
    assert_eq!(queue["prescriptions"][0]["patient_name"], "Test Patient");

    server.shutdown().await;
}

#[tokio::test]
async fn upload_requires_file_and_patient() {
    let server = start_with(test_config(), with_ocr("x")).await;
    let (patient_id, token) = server.patient("rx-missing@example.com").await;

    let resp = server
        .client
        .post(server.url("/patient/upload_prescription"))
        .bearer_auth(&token)
        .multipart(Form::new().text("patient_id", patient_id.to_string()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = server
        .client
        .post(server.url("/patient/upload_prescription"))
        .bearer_auth(&token)
        .multipart(upload_form(424242))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    server.shutdown().await;
}

#[tokio::test]
async fn uploads_are_kept_when_an_upload_dir_is_configured() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config();
    cfg.server.upload_dir = Some(dir.path().to_string_lossy().into_owned());
    let server = start_with(cfg, with_ocr("Ibuprofen")).await;
    let (patient_id, token) = server.patient("rx-dir@example.com").await;

    let resp = server
        .client
        .post(server.url("/patient/upload_prescription"))
        .bearer_auth(&token)
        .multipart(upload_form(patient_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let stored = server
        .state
        .storage
        .list_patient_prescriptions(patient_id)
        .await
        .unwrap();
    let image_ref = stored[0].image_ref.clone().unwrap();
    assert!(image_ref.ends_with("_scan.png"));
    let bytes = std::fs::read(dir.path().join(&image_ref)).unwrap();
    assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
    server.shutdown().await;
}
