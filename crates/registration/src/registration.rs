//! Registration aggregate: the five-step wizard as a command/event machine.
//!
//! Forward movement is gated per step; `back` is ungated and floors at
//! `Terms`. The aggregate is created as a draft at the start of the wizard so
//! abandoned guests can resume; cancellation is a status transition, never a
//! delete. `Complete` is reachable only through payment confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use confreg_core::{
    Aggregate, AggregateId, AggregateRoot, AttendeeId, ConferenceId, DomainError, SocietyId,
};
use confreg_events::Event;
use confreg_membership::VerifiedMember;

use crate::step::WizardStep;

/// Registration identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub AggregateId);

impl RegistrationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Overall registration status. Cancellation is soft (status only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Payment status, driven by the provider callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PendingPayment,
    Paid,
}

/// Agreement acceptances collected at the Terms step.
///
/// All three are required to advance; `{tos, privacy}` alone does not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Agreements {
    pub terms_of_service: bool,
    pub privacy_policy: bool,
    pub third_party_sharing: bool,
}

impl Agreements {
    pub fn all_accepted(&self) -> bool {
        self.terms_of_service && self.privacy_policy && self.third_party_sharing
    }
}

/// Attendee contact details collected at the Info step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub affiliation: String,
    pub license_number: String,
}

impl AttendeeInfo {
    fn validate(&self) -> Result<(), DomainError> {
        let fields = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("affiliation", &self.affiliation),
            ("license_number", &self.license_number),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// The grade choice recorded at the Verification step.
///
/// `amount` is the price resolved at selection time; `None` means the active
/// period has no price for this grade. A missing price blocks payment start
/// and is never treated as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeChoice {
    pub grade_id: String,
    pub grade_code: String,
    pub amount: Option<u64>,
    /// True when the grade came from a reconciliation fallback rather than a
    /// direct match; surfaced to the attendee as a warning.
    pub fallback: bool,
}

/// Audit record of a member-verification attempt, embedded in the
/// registration. Kept even when the membership was expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberVerificationRecord {
    pub member: VerifiedMember,
    pub is_expired: bool,
    pub verified_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Commands

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRegistration {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub conference_id: ConferenceId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptTerms {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub agreements: Agreements,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAttendeeInfo {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub attendee: AttendeeInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectGrade {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub choice: GradeChoice,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMemberVerification {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub record: MemberVerificationRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoBack {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginPayment {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub order_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub order_id: String,
    /// Amount the provider reports as captured, in minor units.
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayment {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub order_id: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRegistration {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationCommand {
    Start(StartRegistration),
    AcceptTerms(AcceptTerms),
    SubmitAttendeeInfo(SubmitAttendeeInfo),
    SelectGrade(SelectGrade),
    RecordMemberVerification(RecordMemberVerification),
    GoBack(GoBack),
    BeginPayment(BeginPayment),
    ConfirmPayment(ConfirmPayment),
    FailPayment(FailPayment),
    Cancel(CancelRegistration),
}

// ---------------------------------------------------------------------------
// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStarted {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub conference_id: ConferenceId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsAccepted {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub agreements: Agreements,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeInfoSubmitted {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub attendee: AttendeeInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeSelected {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub choice: GradeChoice,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberVerificationRecorded {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub record: MemberVerificationRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteppedBack {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub from: WizardStep,
    pub to: WizardStep,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStarted {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub order_id: String,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub order_id: String,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub order_id: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCancelled {
    pub society_id: SocietyId,
    pub registration_id: RegistrationId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationEvent {
    Started(RegistrationStarted),
    TermsAccepted(TermsAccepted),
    AttendeeInfoSubmitted(AttendeeInfoSubmitted),
    GradeSelected(GradeSelected),
    MemberVerificationRecorded(MemberVerificationRecorded),
    SteppedBack(SteppedBack),
    PaymentStarted(PaymentStarted),
    PaymentConfirmed(PaymentConfirmed),
    PaymentFailed(PaymentFailed),
    Cancelled(RegistrationCancelled),
}

impl Event for RegistrationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistrationEvent::Started(_) => "registration.started",
            RegistrationEvent::TermsAccepted(_) => "registration.terms_accepted",
            RegistrationEvent::AttendeeInfoSubmitted(_) => "registration.attendee_info_submitted",
            RegistrationEvent::GradeSelected(_) => "registration.grade_selected",
            RegistrationEvent::MemberVerificationRecorded(_) => {
                "registration.member_verification_recorded"
            }
            RegistrationEvent::SteppedBack(_) => "registration.stepped_back",
            RegistrationEvent::PaymentStarted(_) => "registration.payment_started",
            RegistrationEvent::PaymentConfirmed(_) => "registration.payment_confirmed",
            RegistrationEvent::PaymentFailed(_) => "registration.payment_failed",
            RegistrationEvent::Cancelled(_) => "registration.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RegistrationEvent::Started(e) => e.occurred_at,
            RegistrationEvent::TermsAccepted(e) => e.occurred_at,
            RegistrationEvent::AttendeeInfoSubmitted(e) => e.occurred_at,
            RegistrationEvent::GradeSelected(e) => e.occurred_at,
            RegistrationEvent::MemberVerificationRecorded(e) => e.occurred_at,
            RegistrationEvent::SteppedBack(e) => e.occurred_at,
            RegistrationEvent::PaymentStarted(e) => e.occurred_at,
            RegistrationEvent::PaymentConfirmed(e) => e.occurred_at,
            RegistrationEvent::PaymentFailed(e) => e.occurred_at,
            RegistrationEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    id: RegistrationId,
    society_id: Option<SocietyId>,
    conference_id: Option<ConferenceId>,
    attendee_id: Option<AttendeeId>,
    step: WizardStep,
    status: RegistrationStatus,
    payment_status: PaymentStatus,
    agreements: Agreements,
    attendee: Option<AttendeeInfo>,
    grade: Option<GradeChoice>,
    verification: Option<MemberVerificationRecord>,
    order_id: Option<String>,
    version: u64,
    created: bool,
}

impl Registration {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RegistrationId) -> Self {
        Self {
            id,
            society_id: None,
            conference_id: None,
            attendee_id: None,
            step: WizardStep::Terms,
            status: RegistrationStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            agreements: Agreements::default(),
            attendee: None,
            grade: None,
            verification: None,
            order_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RegistrationId {
        self.id
    }

    pub fn society_id(&self) -> Option<SocietyId> {
        self.society_id
    }

    pub fn conference_id(&self) -> Option<ConferenceId> {
        self.conference_id
    }

    pub fn attendee_id(&self) -> Option<AttendeeId> {
        self.attendee_id
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn agreements(&self) -> Agreements {
        self.agreements
    }

    pub fn attendee(&self) -> Option<&AttendeeInfo> {
        self.attendee.as_ref()
    }

    pub fn grade(&self) -> Option<&GradeChoice> {
        self.grade.as_ref()
    }

    pub fn verification(&self) -> Option<&MemberVerificationRecord> {
        self.verification.as_ref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }
}

impl AggregateRoot for Registration {
    type Id = RegistrationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Registration {
    type Command = RegistrationCommand;
    type Event = RegistrationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RegistrationEvent::Started(e) => {
                self.id = e.registration_id;
                self.society_id = Some(e.society_id);
                self.conference_id = Some(e.conference_id);
                self.attendee_id = Some(e.attendee_id);
                self.step = WizardStep::Terms;
                self.status = RegistrationStatus::Pending;
                self.payment_status = PaymentStatus::Unpaid;
                self.created = true;
            }
            RegistrationEvent::TermsAccepted(e) => {
                self.agreements = e.agreements;
                self.step = WizardStep::Info;
            }
            RegistrationEvent::AttendeeInfoSubmitted(e) => {
                self.attendee = Some(e.attendee.clone());
                self.step = WizardStep::Verification;
            }
            RegistrationEvent::GradeSelected(e) => {
                self.grade = Some(e.choice.clone());
                self.step = WizardStep::Payment;
            }
            RegistrationEvent::MemberVerificationRecorded(e) => {
                self.verification = Some(e.record.clone());
            }
            RegistrationEvent::SteppedBack(e) => {
                self.step = e.to;
            }
            RegistrationEvent::PaymentStarted(e) => {
                self.order_id = Some(e.order_id.clone());
                self.payment_status = PaymentStatus::PendingPayment;
            }
            RegistrationEvent::PaymentConfirmed(_) => {
                self.payment_status = PaymentStatus::Paid;
                self.status = RegistrationStatus::Confirmed;
                self.step = WizardStep::Complete;
            }
            RegistrationEvent::PaymentFailed(_) => {
                self.payment_status = PaymentStatus::Unpaid;
            }
            RegistrationEvent::Cancelled(_) => {
                self.status = RegistrationStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RegistrationCommand::Start(cmd) => self.handle_start(cmd),
            RegistrationCommand::AcceptTerms(cmd) => self.handle_accept_terms(cmd),
            RegistrationCommand::SubmitAttendeeInfo(cmd) => self.handle_submit_info(cmd),
            RegistrationCommand::SelectGrade(cmd) => self.handle_select_grade(cmd),
            RegistrationCommand::RecordMemberVerification(cmd) => self.handle_record_verify(cmd),
            RegistrationCommand::GoBack(cmd) => self.handle_go_back(cmd),
            RegistrationCommand::BeginPayment(cmd) => self.handle_begin_payment(cmd),
            RegistrationCommand::ConfirmPayment(cmd) => self.handle_confirm_payment(cmd),
            RegistrationCommand::FailPayment(cmd) => self.handle_fail_payment(cmd),
            RegistrationCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Registration {
    fn ensure_open(&self, society_id: SocietyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.society_id != Some(society_id) {
            return Err(DomainError::invariant("society mismatch"));
        }
        if self.status == RegistrationStatus::Cancelled {
            return Err(DomainError::conflict("registration is cancelled"));
        }
        Ok(())
    }

    fn ensure_step(&self, expected: WizardStep) -> Result<(), DomainError> {
        if self.step != expected {
            return Err(DomainError::conflict(format!(
                "command not valid at step {}",
                self.step.index()
            )));
        }
        Ok(())
    }

    fn handle_start(&self, cmd: &StartRegistration) -> Result<Vec<RegistrationEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("registration already exists"));
        }

        Ok(vec![RegistrationEvent::Started(RegistrationStarted {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            conference_id: cmd.conference_id,
            attendee_id: cmd.attendee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept_terms(&self, cmd: &AcceptTerms) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;
        self.ensure_step(WizardStep::Terms)?;

        if !cmd.agreements.all_accepted() {
            return Err(DomainError::validation(
                "all agreements must be accepted to continue",
            ));
        }

        Ok(vec![RegistrationEvent::TermsAccepted(TermsAccepted {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            agreements: cmd.agreements,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit_info(
        &self,
        cmd: &SubmitAttendeeInfo,
    ) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;
        self.ensure_step(WizardStep::Info)?;
        cmd.attendee.validate()?;

        Ok(vec![RegistrationEvent::AttendeeInfoSubmitted(
            AttendeeInfoSubmitted {
                society_id: cmd.society_id,
                registration_id: cmd.registration_id,
                attendee: cmd.attendee.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_select_grade(&self, cmd: &SelectGrade) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;
        self.ensure_step(WizardStep::Verification)?;

        if cmd.choice.grade_id.trim().is_empty() {
            return Err(DomainError::validation("a grade must be selected"));
        }

        Ok(vec![RegistrationEvent::GradeSelected(GradeSelected {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            choice: cmd.choice.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_verify(
        &self,
        cmd: &RecordMemberVerification,
    ) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;
        self.ensure_step(WizardStep::Verification)?;

        Ok(vec![RegistrationEvent::MemberVerificationRecorded(
            MemberVerificationRecorded {
                society_id: cmd.society_id,
                registration_id: cmd.registration_id,
                record: cmd.record.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_go_back(&self, cmd: &GoBack) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;

        let Some(to) = self.step.back() else {
            return Err(DomainError::conflict("a completed registration has no back"));
        };
        if to == self.step {
            // Already at Terms; nothing to record.
            return Ok(vec![]);
        }
        if self.payment_status == PaymentStatus::PendingPayment {
            return Err(DomainError::conflict(
                "cannot navigate back while a payment is pending",
            ));
        }

        Ok(vec![RegistrationEvent::SteppedBack(SteppedBack {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            from: self.step,
            to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_begin_payment(
        &self,
        cmd: &BeginPayment,
    ) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;
        self.ensure_step(WizardStep::Payment)?;

        if self.payment_status == PaymentStatus::Paid {
            return Err(DomainError::conflict("registration is already paid"));
        }
        // An in-flight order must be confirmed or failed before a new one can
        // replace it; otherwise the recorded order id would no longer match a
        // provider callback for the first order.
        if self.payment_status == PaymentStatus::PendingPayment {
            return Err(DomainError::conflict("a payment is already pending"));
        }
        let Some(choice) = &self.grade else {
            return Err(DomainError::invariant("no grade selected"));
        };
        // A missing price blocks payment; it is never treated as zero.
        let Some(amount) = choice.amount else {
            return Err(DomainError::invariant(
                "no price is configured for the selected grade; contact the administrator",
            ));
        };
        if cmd.order_id.trim().is_empty() {
            return Err(DomainError::validation("order_id is required"));
        }

        Ok(vec![RegistrationEvent::PaymentStarted(PaymentStarted {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            order_id: cmd.order_id.clone(),
            amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_payment(
        &self,
        cmd: &ConfirmPayment,
    ) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;

        if self.payment_status != PaymentStatus::PendingPayment {
            return Err(DomainError::conflict("no payment is pending"));
        }
        if self.order_id.as_deref() != Some(cmd.order_id.as_str()) {
            return Err(DomainError::conflict("order does not match this registration"));
        }
        let recorded = self.grade.as_ref().and_then(|g| g.amount);
        if recorded != Some(cmd.amount) {
            return Err(DomainError::invariant(format!(
                "captured amount {} does not match the registration amount",
                cmd.amount
            )));
        }

        Ok(vec![RegistrationEvent::PaymentConfirmed(PaymentConfirmed {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            order_id: cmd.order_id.clone(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fail_payment(&self, cmd: &FailPayment) -> Result<Vec<RegistrationEvent>, DomainError> {
        self.ensure_open(cmd.society_id)?;

        if self.payment_status != PaymentStatus::PendingPayment {
            return Err(DomainError::conflict("no payment is pending"));
        }
        if self.order_id.as_deref() != Some(cmd.order_id.as_str()) {
            return Err(DomainError::conflict("order does not match this registration"));
        }

        Ok(vec![RegistrationEvent::PaymentFailed(PaymentFailed {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            order_id: cmd.order_id.clone(),
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelRegistration,
    ) -> Result<Vec<RegistrationEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.society_id != Some(cmd.society_id) {
            return Err(DomainError::invariant("society mismatch"));
        }
        if self.status == RegistrationStatus::Cancelled {
            return Err(DomainError::conflict("registration is already cancelled"));
        }
        if self.payment_status == PaymentStatus::PendingPayment {
            return Err(DomainError::conflict(
                "cannot cancel while a payment is pending",
            ));
        }

        Ok(vec![RegistrationEvent::Cancelled(RegistrationCancelled {
            society_id: cmd.society_id,
            registration_id: cmd.registration_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
