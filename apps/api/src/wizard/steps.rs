use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Wizard progress persisted on the profile row.
///
/// The stored value is the furthest step the user may submit. Earlier steps
/// can always be revisited; later ones are rejected until reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    BasicInfo,
    Skills,
    Education,
    Experience,
    Projects,
    Achievements,
    Completed,
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        WizardStep::BasicInfo,
        WizardStep::Skills,
        WizardStep::Education,
        WizardStep::Experience,
        WizardStep::Projects,
        WizardStep::Achievements,
        WizardStep::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WizardStep::BasicInfo => "basic_info",
            WizardStep::Skills => "skills",
            WizardStep::Education => "education",
            WizardStep::Experience => "experience",
            WizardStep::Projects => "projects",
            WizardStep::Achievements => "achievements",
            WizardStep::Completed => "completed",
        }
    }

    /// The step that follows this one. `Completed` is terminal.
    pub fn next(self) -> WizardStep {
        match self {
            WizardStep::BasicInfo => WizardStep::Skills,
            WizardStep::Skills => WizardStep::Education,
            WizardStep::Education => WizardStep::Experience,
            WizardStep::Experience => WizardStep::Projects,
            WizardStep::Projects => WizardStep::Achievements,
            WizardStep::Achievements | WizardStep::Completed => WizardStep::Completed,
        }
    }

    /// Client-facing path of the step. Completion lands on the summary.
    pub fn path(self) -> &'static str {
        match self {
            WizardStep::BasicInfo => "/profile/basic-info",
            WizardStep::Skills => "/profile/skills",
            WizardStep::Education => "/profile/education",
            WizardStep::Experience => "/profile/experience",
            WizardStep::Projects => "/profile/projects",
            WizardStep::Achievements => "/profile/achievements",
            WizardStep::Completed => "/profile/summary",
        }
    }

    /// Checks that `self` may be submitted given the stored progress.
    /// `None` means no profile row exists yet.
    pub fn ensure_reachable(self, progress: Option<WizardStep>) -> Result<(), AppError> {
        let current = progress.unwrap_or(WizardStep::BasicInfo);
        if self <= current {
            Ok(())
        } else {
            Err(AppError::StepOutOfOrder {
                attempted: self,
                current,
            })
        }
    }

    /// Progress after successfully submitting `self`. Never moves backwards.
    pub fn advance(self, progress: Option<WizardStep>) -> WizardStep {
        let next = self.next();
        match progress {
            Some(current) if current > next => current,
            _ => next,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WizardStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WizardStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown wizard step '{s}'"))
    }
}
