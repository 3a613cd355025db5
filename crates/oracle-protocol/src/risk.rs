//! Ride-risk scoring contract.

use crate::error::ProtocolError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ProtocolError::InvalidValue {
                        field: stringify!($name),
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

wire_enum!(
    /// Time band of the ride.
    TimeOfDay {
        Day => "day",
        Evening => "evening",
        Night => "night",
        LateNight => "late_night",
    }
);

wire_enum!(
    /// Area classification along the route, ordered from safest to most isolated.
    AreaType {
        Urban => "urban",
        Suburban => "suburban",
        Rural => "rural",
        Highway => "highway",
    }
);

wire_enum!(
    /// Driver behaviour the rider has observed.
    BehaviourFlag {
        RouteDeviation => "route_deviation",
        DoorsLocked => "doors_locked",
        CancelApp => "cancel_app",
        Aggressive => "aggressive",
        PersonalQuestions => "personal_questions",
        PhoneDistracted => "phone_distracted",
        Speeding => "speeding",
        Uncomfortable => "uncomfortable",
    }
);

wire_enum!(
    /// Severity band of a risk score.
    RiskLevel {
        Low => "LOW",
        Moderate => "MODERATE",
        High => "HIGH",
        Critical => "CRITICAL",
    }
);

impl Default for TimeOfDay {
    fn default() -> Self {
        Self::Day
    }
}

impl Default for AreaType {
    fn default() -> Self {
        Self::Urban
    }
}

impl RiskLevel {
    /// LOW 0-25, MODERATE 26-50, HIGH 51-75, CRITICAL 76-100.
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=25 => Self::Low,
            26..=50 => Self::Moderate,
            51..=75 => Self::High,
            _ => Self::Critical,
        }
    }
}

/// Ride details captured by the assessment form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideForm {
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub vehicle_plate: String,
    #[serde(default)]
    pub pickup: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub area_type: AreaType,
}

/// Body of one stateless scoring call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessRequest {
    #[serde(flatten)]
    pub form: RideForm,
    #[serde(default)]
    pub behaviour_flags: Vec<BehaviourFlag>,
}

impl AssessRequest {
    pub fn new(form: RideForm, flags: impl IntoIterator<Item = BehaviourFlag>) -> Self {
        Self {
            form,
            behaviour_flags: flags.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeExitStrategy {
    #[serde(default)]
    pub recommended_spots: Vec<String>,
    #[serde(default)]
    pub avoid_note: String,
    #[serde(default)]
    pub timing_advice: String,
    #[serde(default)]
    pub exit_signal: String,
}

/// Scored risk for one ride snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub level: RiskLevel,
    #[serde(default)]
    pub triggered_factors: Vec<String>,
    #[serde(default)]
    pub weight_breakdown: IndexMap<String, u32>,
    #[serde(default)]
    pub safe_exit_strategy: SafeExitStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCard {
    #[serde(default)]
    pub ride_details: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub key_concern: String,
    #[serde(default)]
    pub check_in_instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationStep {
    pub step: u32,
    pub action: String,
    #[serde(default)]
    pub authority: String,
    #[serde(default)]
    pub timeline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Helpline {
    pub name: String,
    pub number: String,
    #[serde(default)]
    pub purpose: String,
}

/// Narrative guidance attached to a risk score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyAdvice {
    #[serde(default)]
    pub immediate_actions: Vec<String>,
    #[serde(default)]
    pub emergency_message: String,
    #[serde(default)]
    pub safety_card: SafetyCard,
    #[serde(default)]
    pub escalation_steps: Vec<EscalationStep>,
    #[serde(default)]
    pub helplines: Vec<Helpline>,
    #[serde(default)]
    pub complaint_draft: String,
}

/// Response of one scoring call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessResponse {
    pub risk: RiskAssessment,
    #[serde(default)]
    pub advice: SafetyAdvice,
}
