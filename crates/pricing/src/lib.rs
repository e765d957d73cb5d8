//! `confreg-pricing` — registration periods, grade enumeration, and price
//! resolution.
//!
//! Grades have no independent lifecycle: they are a projection of the active
//! period's price map keys. Price keys are admin-entered and loosely typed, so
//! resolution keeps a read-time matching cascade, but keys are also
//! canonicalized once at write time so well-formed data takes the fast path.

pub mod grade;
pub mod labels;
pub mod period;
pub mod resolver;

pub use grade::Grade;
pub use labels::{BilingualLabel, GradeLabels};
pub use period::{PeriodKind, PriceEntry, RegistrationPeriod, active_period, canonical_key};
pub use resolver::{PriceResolution, resolve_price, resolve_price_key};
