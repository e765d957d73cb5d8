use serde::{Deserialize, Serialize};

/// Wizard steps, in order.
///
/// Forward movement happens only through gated commands on the aggregate;
/// there is no "set step" operation. `Complete` is reached exclusively via
/// payment confirmation and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Terms,
    Info,
    Verification,
    Payment,
    Complete,
}

impl WizardStep {
    /// Zero-based position, matching the wizard's progress indicator.
    pub fn index(self) -> u8 {
        match self {
            WizardStep::Terms => 0,
            WizardStep::Info => 1,
            WizardStep::Verification => 2,
            WizardStep::Payment => 3,
            WizardStep::Complete => 4,
        }
    }

    /// The previous step, floored at `Terms`. `Complete` has no back.
    pub fn back(self) -> Option<WizardStep> {
        match self {
            WizardStep::Terms => Some(WizardStep::Terms),
            WizardStep::Info => Some(WizardStep::Terms),
            WizardStep::Verification => Some(WizardStep::Info),
            WizardStep::Payment => Some(WizardStep::Verification),
            WizardStep::Complete => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WizardStep::Complete
    }
}
