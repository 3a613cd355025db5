//! Deterministic weighted scorer.
//!
//! Every input maps to a fixed number of points; the score is their sum
//! capped at 100. Factors are reported in accumulation order: time band,
//! area, missing driver details, then behaviour flags in the order given.

use async_trait::async_trait;
use indexmap::IndexMap;
use oracle_protocol::{
    AreaType, AssessRequest, AssessResponse, BehaviourFlag, RideForm, RiskAssessment, RiskLevel,
    SafeExitStrategy, TimeOfDay,
};
use tracing::debug;

use crate::advice;
use crate::error::ScoreError;
use crate::scorer::RiskScorer;

pub const MAX_SCORE: u32 = 100;

pub fn time_weight(time: TimeOfDay) -> u32 {
    match time {
        TimeOfDay::Day => 0,
        TimeOfDay::Evening => 8,
        TimeOfDay::Night => 15,
        TimeOfDay::LateNight => 20,
    }
}

pub fn area_weight(area: AreaType) -> u32 {
    match area {
        AreaType::Urban => 0,
        AreaType::Suburban => 5,
        AreaType::Rural => 10,
        AreaType::Highway => 15,
    }
}

pub fn flag_weight(flag: BehaviourFlag) -> u32 {
    match flag {
        BehaviourFlag::RouteDeviation => 20,
        BehaviourFlag::DoorsLocked | BehaviourFlag::CancelApp | BehaviourFlag::Aggressive => 15,
        BehaviourFlag::PersonalQuestions => 10,
        BehaviourFlag::PhoneDistracted | BehaviourFlag::Speeding => 5,
        BehaviourFlag::Uncomfortable => 3,
    }
}

pub fn flag_label(flag: BehaviourFlag) -> &'static str {
    match flag {
        BehaviourFlag::RouteDeviation => "Driver taking wrong/unfamiliar route",
        BehaviourFlag::DoorsLocked => "Doors locked / central locking activated",
        BehaviourFlag::CancelApp => "Driver asked to cancel app or go offline",
        BehaviourFlag::Aggressive => "Driver aggressive or intoxicated",
        BehaviourFlag::PersonalQuestions => "Driver asking personal questions",
        BehaviourFlag::PhoneDistracted => "Driver distracted / on phone",
        BehaviourFlag::Speeding => "Driving erratically / speeding",
        BehaviourFlag::Uncomfortable => "General discomfort / gut feeling",
    }
}

fn time_label(time: TimeOfDay) -> &'static str {
    match time {
        TimeOfDay::Day => "Daytime ride (low baseline risk)",
        TimeOfDay::Evening => "Evening ride (moderate baseline risk)",
        TimeOfDay::Night => "Night ride (elevated baseline risk)",
        TimeOfDay::LateNight => "Late-night ride (high baseline risk)",
    }
}

fn area_label(area: AreaType) -> Option<&'static str> {
    match area {
        AreaType::Urban => None,
        AreaType::Suburban => Some("Suburban area (limited escape routes)"),
        AreaType::Rural => Some("Rural area (isolated, far from help)"),
        AreaType::Highway => Some("Highway (high-speed, difficult to exit)"),
    }
}

fn missing_driver_info(form: &RideForm) -> Option<(u32, &'static str)> {
    let name_missing = form.driver_name.trim().is_empty();
    let plate_missing = form.vehicle_plate.trim().is_empty();
    match (name_missing, plate_missing) {
        (true, true) => Some((10, "Driver name and plate number unknown (cannot report)")),
        (true, false) | (false, true) => {
            Some((5, "Driver name or plate number unknown (partial info)"))
        }
        (false, false) => None,
    }
}

fn safe_exit_spots(area: AreaType) -> &'static [&'static str] {
    match area {
        AreaType::Urban => &[
            "Petrol station or CNG pump (24-hr staff, CCTV, lit)",
            "Hospital gate or emergency entrance",
            "Police chowki or PCR van stop",
            "Shopping mall or metro station entrance",
            "Busy restaurant or dhaba with visible customers",
        ],
        AreaType::Suburban => &[
            "Petrol station on the main road",
            "Pharmacy (open late, lit, has staff)",
            "Auto stand or local taxi rank (other drivers present)",
            "Bank ATM with security guard",
            "Colony gate with guard post",
        ],
        AreaType::Rural => &[
            "Government health centre (PHC) with staff on duty",
            "Bus stand or truck stop (other people present)",
            "Any pucca shop with visible activity",
            "School or government building gate",
            "Group of people on the roadside; board any vehicle",
        ],
        AreaType::Highway => &[
            "Highway toll booth (CCTV, 24-hr staff, police patrol)",
            "Dhaba / highway restaurant with trucks parked outside",
            "CNG / petrol pump with attendants",
            "Any service area or rest stop on expressway",
            "Toll plaza emergency lane; wave down highway patrol",
        ],
    }
}

fn avoid_note(area: AreaType) -> &'static str {
    match area {
        AreaType::Urban => "Avoid dark lanes, construction sites, or isolated parking lots.",
        AreaType::Suburban => "Avoid empty plots, unlit roads, or areas with no street lights.",
        AreaType::Rural => "Avoid forested stretches, open fields, or any area with no buildings.",
        AreaType::Highway => {
            "Never exit on the highway carriageway itself; only at lit rest areas or toll plazas."
        }
    }
}

fn exit_timing(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "When convenient; no immediate need to exit.",
        RiskLevel::Moderate => "At the next well-lit stop or traffic signal with activity.",
        RiskLevel::High => {
            "At the very next opportunity: petrol pump, traffic signal, or crowded area."
        }
        RiskLevel::Critical => {
            "Exit at the next traffic light or any stop where people are present. Do not wait."
        }
    }
}

pub fn safe_exit(area: AreaType, level: RiskLevel) -> SafeExitStrategy {
    SafeExitStrategy {
        recommended_spots: safe_exit_spots(area)
            .iter()
            .map(|spot| (*spot).to_owned())
            .collect(),
        avoid_note: avoid_note(area).to_owned(),
        timing_advice: exit_timing(level).to_owned(),
        exit_signal: "At a traffic stop: unlock door, step out, walk toward lit area. \
                      Do not run; walk firmly toward people."
            .to_owned(),
    }
}

/// Score one ride snapshot.
///
/// A flag listed twice adds its weight twice, the same as the orchestrator's
/// scorer, while `weight_breakdown` keeps one entry per flag.
pub fn assess(request: &AssessRequest) -> RiskAssessment {
    let form = &request.form;
    let mut breakdown = IndexMap::new();
    let mut factors = Vec::new();

    let time_points = time_weight(form.time_of_day);
    if time_points > 0 {
        breakdown.insert("time_of_day".to_owned(), time_points);
        factors.push(time_label(form.time_of_day).to_owned());
    }

    let area_points = area_weight(form.area_type);
    if area_points > 0 {
        breakdown.insert("area_type".to_owned(), area_points);
        factors.extend(area_label(form.area_type).map(str::to_owned));
    }

    let mut raw_score = time_points + area_points;
    if let Some((points, label)) = missing_driver_info(form) {
        breakdown.insert("missing_driver_info".to_owned(), points);
        factors.push(label.to_owned());
        raw_score += points;
    }

    for flag in &request.behaviour_flags {
        let points = flag_weight(*flag);
        breakdown.insert(flag.as_str().to_owned(), points);
        factors.push(flag_label(*flag).to_owned());
        raw_score += points;
    }

    let score = raw_score.min(MAX_SCORE);
    let level = RiskLevel::from_score(score);
    RiskAssessment {
        score,
        level,
        triggered_factors: factors,
        weight_breakdown: breakdown,
        safe_exit_strategy: safe_exit(form.area_type, level),
    }
}

/// Local scorer that needs no upstream service.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl RuleBasedScorer {
    pub fn assess(&self, request: &AssessRequest) -> AssessResponse {
        let risk = assess(request);
        let advice = advice::for_level(risk.level, &request.form);
        debug!(score = risk.score, level = %risk.level, "rule-based score");
        AssessResponse { risk, advice }
    }
}

#[async_trait]
impl RiskScorer for RuleBasedScorer {
    async fn score(&self, request: &AssessRequest) -> Result<AssessResponse, ScoreError> {
        Ok(self.assess(request))
    }
}
