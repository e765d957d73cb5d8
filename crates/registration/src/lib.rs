//! `confreg-registration` — the registration wizard aggregate.
//!
//! The wizard is a strict step machine. Advancement happens only through
//! gated, step-specific commands; `back` is ungated; completion happens only
//! through the payment confirmation callback.

pub mod registration;
pub mod step;

pub use registration::{
    AcceptTerms, Agreements, AttendeeInfo, BeginPayment, CancelRegistration, ConfirmPayment,
    FailPayment, GoBack, GradeChoice, MemberVerificationRecord, PaymentStatus,
    RecordMemberVerification, Registration, RegistrationCommand, RegistrationEvent, RegistrationId,
    RegistrationStatus, SelectGrade, StartRegistration, SubmitAttendeeInfo,
};
pub use step::WizardStep;
