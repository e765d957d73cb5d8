use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use confreg_infra::{RegistrationReadModel, SessionReadModel};
use confreg_pricing::{Grade, RegistrationPeriod};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePeriodRequest {
    pub name: String,
    /// One of: early, regular, onsite.
    pub kind: String,
    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub ends_at: chrono::DateTime<chrono::Utc>,
    /// Price map, admin-entered grade key to minor-unit amount.
    pub prices: Vec<PriceEntryRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PriceEntryRequest {
    pub key: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct GradeLabelRequest {
    pub key: String,
    pub english: String,
    pub local: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedMemberRequest {
    pub name: String,
    pub member_code: String,
    pub grade: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StartRegistrationRequest {
    pub conference_id: uuid::Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TermsRequest {
    pub terms_of_service: bool,
    pub privacy_policy: bool,
    pub third_party_sharing: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttendeeInfoRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub affiliation: String,
    pub license_number: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectGradeRequest {
    pub grade_key: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyMemberRequest {
    pub name: String,
    pub member_code: String,
    pub consent: bool,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// Provider redirect body for both the success and failure callbacks.
#[derive(Debug, Deserialize)]
pub struct PaymentCallbackRequest {
    pub society_id: uuid::Uuid,
    pub registration_id: uuid::Uuid,
    pub order_id: String,
    /// Captured amount, present on success callbacks.
    pub amount: Option<u64>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AbortUpgradeRequest {
    pub reason: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn period_to_json(period: &RegistrationPeriod) -> JsonValue {
    json!({
        "name": period.name(),
        "kind": period.kind(),
        "starts_at": period.starts_at(),
        "ends_at": period.ends_at(),
        "prices": period
            .prices()
            .iter()
            .map(|e| json!({
                "key": e.raw_key,
                "canonical_key": e.canonical_key,
                "amount": e.amount,
            }))
            .collect::<Vec<_>>(),
    })
}

pub fn grade_to_json(grade: &Grade, amount: Option<u64>) -> JsonValue {
    json!({
        "id": grade.id,
        "code": grade.code,
        "name": grade.name,
        "amount": amount,
    })
}

pub fn registration_to_json(rm: RegistrationReadModel) -> JsonValue {
    json!({
        "id": rm.registration_id.to_string(),
        "conference_id": rm.conference_id.to_string(),
        "attendee_id": rm.attendee_id.to_string(),
        "step": rm.step,
        "step_index": rm.step.index(),
        "status": rm.status,
        "payment_status": rm.payment_status,
        "agreements": {
            "terms_of_service": rm.agreements.terms_of_service,
            "privacy_policy": rm.agreements.privacy_policy,
            "third_party_sharing": rm.agreements.third_party_sharing,
        },
        "attendee": rm.attendee.map(|a| json!({
            "name": a.name,
            "email": a.email,
            "phone": a.phone,
            "affiliation": a.affiliation,
            "license_number": a.license_number,
        })),
        "grade": rm.grade.map(|g| json!({
            "id": g.grade_id,
            "code": g.grade_code,
            "amount": g.amount,
            "fallback": g.fallback,
        })),
        "order_id": rm.order_id,
        "updated_at": rm.updated_at,
    })
}

pub fn session_to_json(rm: SessionReadModel) -> JsonValue {
    json!({
        "id": rm.session_id.to_string(),
        "attendee_id": rm.attendee_id.to_string(),
        "state": rm.state,
        "email": rm.email,
        "updated_at": rm.updated_at,
    })
}
