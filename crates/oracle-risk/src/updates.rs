//! Named de-escalation updates a rider can assert mid-ride.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use oracle_protocol::{AreaType, BehaviourFlag};
use serde::{Deserialize, Serialize};

use crate::error::RiskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SituationUpdate {
    BackOnRoute,
    DoorsUnlocked,
    AppTripActive,
    DriverCalm,
    DriverFocused,
    FeelingSafer,
    ReachedMainRoad,
    EnteredCity,
}

impl SituationUpdate {
    pub const ALL: &'static [SituationUpdate] = &[
        Self::BackOnRoute,
        Self::DoorsUnlocked,
        Self::AppTripActive,
        Self::DriverCalm,
        Self::DriverFocused,
        Self::FeelingSafer,
        Self::ReachedMainRoad,
        Self::EnteredCity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackOnRoute => "back_on_route",
            Self::DoorsUnlocked => "doors_unlocked",
            Self::AppTripActive => "app_trip_active",
            Self::DriverCalm => "driver_calm",
            Self::DriverFocused => "driver_focused",
            Self::FeelingSafer => "feeling_safer",
            Self::ReachedMainRoad => "reached_main_road",
            Self::EnteredCity => "entered_city",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BackOnRoute => "Driver is back on the expected route",
            Self::DoorsUnlocked => "Doors are unlocked",
            Self::AppTripActive => "Trip is still live in the app",
            Self::DriverCalm => "Driver has calmed down and stopped personal questions",
            Self::DriverFocused => "Driver is off the phone and driving normally",
            Self::FeelingSafer => "I feel safer now",
            Self::ReachedMainRoad => "Reached a busy main road",
            Self::EnteredCity => "Entered the city limits",
        }
    }

    /// Flags this update clears from the active set.
    pub fn removes(self) -> &'static [BehaviourFlag] {
        match self {
            Self::BackOnRoute => &[BehaviourFlag::RouteDeviation],
            Self::DoorsUnlocked => &[BehaviourFlag::DoorsLocked],
            Self::AppTripActive => &[BehaviourFlag::CancelApp],
            Self::DriverCalm => &[BehaviourFlag::Aggressive, BehaviourFlag::PersonalQuestions],
            Self::DriverFocused => &[BehaviourFlag::PhoneDistracted, BehaviourFlag::Speeding],
            Self::FeelingSafer => &[BehaviourFlag::Uncomfortable],
            Self::ReachedMainRoad | Self::EnteredCity => &[],
        }
    }

    /// Area classification this update asserts, if any.
    pub fn area(self) -> Option<AreaType> {
        match self {
            Self::ReachedMainRoad => Some(AreaType::Suburban),
            Self::EnteredCity => Some(AreaType::Urban),
            _ => None,
        }
    }
}

impl fmt::Display for SituationUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SituationUpdate {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|update| update.as_str() == s)
            .ok_or_else(|| RiskError::UnknownUpdate(s.to_owned()))
    }
}

/// The combined effect of a batch of updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateEffect {
    pub removed: BTreeSet<BehaviourFlag>,
    pub area: Option<AreaType>,
}

impl UpdateEffect {
    /// Union of removals; the last update naming an area wins.
    pub fn compose<'a, I>(updates: I) -> Self
    where
        I: IntoIterator<Item = &'a SituationUpdate>,
    {
        updates.into_iter().fold(Self::default(), |mut effect, update| {
            effect.removed.extend(update.removes().iter().copied());
            if let Some(area) = update.area() {
                effect.area = Some(area);
            }
            effect
        })
    }

    /// Apply to a flag set and area. The area only ever moves toward urban.
    pub fn apply(&self, flags: &mut BTreeSet<BehaviourFlag>, area: &mut AreaType) {
        flags.retain(|flag| !self.removed.contains(flag));
        if let Some(target) = self.area {
            *area = (*area).min(target);
        }
    }
}
