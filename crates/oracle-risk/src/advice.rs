//! Canned safety advice keyed by risk level, used when no narrative
//! advisor is available.

use chrono::{DateTime, Local};
use oracle_protocol::{EscalationStep, Helpline, RideForm, RiskLevel, SafetyAdvice, SafetyCard};

fn step(step: u32, action: &str, authority: &str, timeline: &str) -> EscalationStep {
    EscalationStep {
        step,
        action: action.to_owned(),
        authority: authority.to_owned(),
        timeline: timeline.to_owned(),
    }
}

fn helpline(name: &str, number: &str, purpose: &str) -> Helpline {
    Helpline {
        name: name.to_owned(),
        number: number.to_owned(),
        purpose: purpose.to_owned(),
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}

fn ride_details(form: &RideForm, fallback: &str) -> String {
    let parts: Vec<&str> = [form.driver_name.trim(), form.vehicle_plate.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        fallback.to_owned()
    } else {
        parts.join(" / ")
    }
}

fn route(form: &RideForm, fallback: &str) -> String {
    match (form.pickup.trim(), form.destination.trim()) {
        ("", "") => fallback.to_owned(),
        (from, "") => format!("From {from}"),
        ("", to) => format!("To {to}"),
        (from, to) => format!("{from} to {to}"),
    }
}

/// Advice for `level` at the current local time.
pub fn for_level(level: RiskLevel, form: &RideForm) -> SafetyAdvice {
    for_level_at(level, form, Local::now())
}

pub fn for_level_at(level: RiskLevel, form: &RideForm, now: DateTime<Local>) -> SafetyAdvice {
    let clock = now.format("%I:%M %p").to_string();
    let stamp = now.format("%d %B %Y, %I:%M %p").to_string();

    match level {
        RiskLevel::Low => SafetyAdvice {
            immediate_actions: lines(&[
                "Share your live location with a trusted contact via WhatsApp.",
                "Keep your phone charged and volume on.",
                "Note the driver's name and vehicle plate from the app.",
                "Stay alert and trust your instincts if anything feels off.",
            ]),
            emergency_message: "Hi, I'm currently in a cab. Ride details below. Please check in on me.\n\
                If I don't respond in 20 minutes, please call Police: 100 or Women Helpline: 1091."
                .to_owned(),
            safety_card: SafetyCard {
                ride_details: ride_details(form, "See booking app for driver + vehicle details"),
                route: route(form, "As booked"),
                time: clock,
                risk_level: level.to_string(),
                key_concern: "Standard precaution; stay alert".to_owned(),
                check_in_instruction: "If no reply in 20 mins, call Police: 100".to_owned(),
            },
            escalation_steps: vec![
                step(1, "Share location with trusted contact", "Trusted contact", "Now"),
                step(
                    2,
                    "Call Ola/Uber helpline if driver behaviour changes",
                    "Ola / Uber support",
                    "If needed",
                ),
                step(3, "Dial 100 in an emergency", "Police", "Emergency"),
            ],
            helplines: vec![
                helpline("Police Emergency", "100", "Immediate police assistance"),
                helpline("Women's Helpline", "1091", "Women in distress"),
                helpline("Emergency Services", "112", "All emergency services"),
            ],
            complaint_draft: format!(
                "# Cab Safety Report\n\n**Date/Time:** {stamp}\n\n\
                 **Concern:** General safety precaution raised during cab ride.\n\n\
                 No immediate incident occurred. This report is for record purposes.\n"
            ),
        },
        RiskLevel::Moderate => SafetyAdvice {
            immediate_actions: lines(&[
                "Immediately share your live location with 2-3 trusted contacts via WhatsApp.",
                "Call a contact and keep the line open; let the driver know you're on a call.",
                "Note the exact cab details (driver name, vehicle plate, cab colour).",
                "Use the SOS button in your Ola/Uber app.",
                "Stay in well-lit, populated areas if the ride stops unexpectedly.",
            ]),
            emergency_message: "I need someone to track me. I am in a cab and something feels off.\n\
                Please call me every 10 minutes. If I don't pick up, call Police 100 immediately.\n\
                I will send cab details shortly."
                .to_owned(),
            safety_card: SafetyCard {
                ride_details: ride_details(form, "Check booking app for driver and vehicle details"),
                route: route(form, "As booked; monitor for deviations"),
                time: clock,
                risk_level: level.to_string(),
                key_concern: "Situation warrants active monitoring".to_owned(),
                check_in_instruction: "If no reply in 10 mins, call Police: 100".to_owned(),
            },
            escalation_steps: vec![
                step(1, "Share live location immediately", "Trusted contacts", "Now"),
                step(2, "Keep a phone call active", "Friend/family", "Now"),
                step(3, "Use SOS in cab app", "Ola/Uber emergency", "If needed"),
                step(4, "Dial 112 or 100", "Police", "If unsafe"),
            ],
            helplines: vec![
                helpline("Police Emergency", "100", "Immediate police assistance"),
                helpline("Women's Helpline", "1091", "Women in distress"),
                helpline("Emergency Services", "112", "All emergency services"),
                helpline("Cybercrime Helpline", "1930", "For digital threats or tracking"),
            ],
            complaint_draft: format!(
                "# Cab Safety Complaint\n\n**Date/Time:** {stamp}\n\n\
                 **Concern Level:** MODERATE\n\n\
                 I am writing to report concerning behaviour during a cab ride.\n\
                 Please investigate this ride and take appropriate action.\n"
            ),
        },
        RiskLevel::High => SafetyAdvice {
            immediate_actions: lines(&[
                "CALL 112 NOW or ask someone nearby to help.",
                "Do NOT show fear. Speak loudly and firmly: 'I have shared my location. Police are aware.'",
                "Use the Emergency SOS in your Ola/Uber app immediately.",
                "If the vehicle slows down: unlock doors, prepare to exit safely.",
                "Do NOT hand over your phone or bag.",
            ]),
            emergency_message: "URGENT: I am in danger in a cab. Please call Police 100 NOW if I don't reply in 5 minutes.\n\
                I will send ride details. Call 112 if you cannot reach me."
                .to_owned(),
            safety_card: SafetyCard {
                ride_details: ride_details(form, "Get from booking app immediately"),
                route: route(form, "DEVIATION LIKELY; monitor"),
                time: clock,
                risk_level: level.to_string(),
                key_concern: "Multiple high-risk indicators present".to_owned(),
                check_in_instruction: "If no reply in 5 mins, CALL POLICE: 100".to_owned(),
            },
            escalation_steps: vec![
                step(1, "Call 112 immediately", "Emergency services", "NOW"),
                step(2, "Use SOS in cab booking app", "Ola/Uber", "NOW"),
                step(3, "Alert people nearby if vehicle stops", "Public", "If vehicle stops"),
                step(
                    4,
                    "File FIR at nearest police station after reaching safety",
                    "Police station",
                    "After reaching safety",
                ),
            ],
            helplines: vec![
                helpline("Emergency Services", "112", "ALL emergencies; call first"),
                helpline("Police Emergency", "100", "Police"),
                helpline("Women's Helpline", "1091", "Women in distress"),
            ],
            complaint_draft: format!(
                "# HIGH RISK: Cab Safety Incident Report\n\n**Date/Time:** {stamp}\n\n\
                 **Risk Level:** HIGH\n\n\
                 This is an urgent complaint regarding unsafe cab ride conditions.\n\
                 Multiple high-risk behavioural indicators were present.\n\
                 Immediate investigation and action required.\n"
            ),
        },
        RiskLevel::Critical => SafetyAdvice {
            immediate_actions: lines(&[
                "CALL 112 RIGHT NOW. Do not wait.",
                "Scream for help if anyone is nearby.",
                "Unlock doors at the next traffic stop and exit if safe.",
                "Break a window only as last resort.",
                "Do not comply with demands.",
            ]),
            emergency_message: "EMERGENCY. I am in a dangerous cab. CALL POLICE 100 / 112 NOW.\n\
                Do not wait for my reply. Send police to trace this number immediately."
                .to_owned(),
            safety_card: SafetyCard {
                ride_details: ride_details(form, "Report to police via call tracking"),
                route: route(form, "UNKNOWN; possible deviation"),
                time: clock,
                risk_level: level.to_string(),
                key_concern: "IMMEDIATE DANGER; act now".to_owned(),
                check_in_instruction: "CALL 112 NOW; do not wait".to_owned(),
            },
            escalation_steps: vec![
                step(1, "CALL 112 IMMEDIATELY", "Emergency services", "THIS SECOND"),
                step(2, "Make noise and attract attention", "Public", "NOW"),
                step(3, "Exit at next traffic stop if safe", "Self", "Next opportunity"),
                step(4, "File FIR with full evidence", "Police station", "After safety"),
            ],
            helplines: vec![
                helpline("Emergency Services", "112", "CALL FIRST; ALL emergencies"),
                helpline("Police Emergency", "100", "Police control room"),
                helpline("Women's Helpline", "1091", "Women's emergency line"),
                helpline("Women Helpline (181)", "181", "Women in danger"),
            ],
            complaint_draft: format!(
                "# CRITICAL: Emergency Cab Safety Incident\n\n**Date/Time:** {stamp}\n\n\
                 **Risk Level:** CRITICAL, IMMEDIATE DANGER REPORTED\n\n\
                 This complaint requires URGENT police attention.\n\
                 The cab driver showed multiple critical danger indicators.\n"
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn safety_card_uses_form_details_when_present() {
        let form = RideForm {
            driver_name: "Ravi".into(),
            pickup: "MG Road".into(),
            destination: "Airport".into(),
            ..RideForm::default()
        };
        let now = Local.with_ymd_and_hms(2026, 3, 14, 21, 5, 0).unwrap();
        let advice = for_level_at(RiskLevel::Moderate, &form, now);
        assert_eq!(advice.safety_card.ride_details, "Ravi");
        assert_eq!(advice.safety_card.route, "MG Road to Airport");
        assert_eq!(advice.safety_card.time, "09:05 PM");
        assert_eq!(advice.safety_card.risk_level, "MODERATE");
        assert!(advice.complaint_draft.contains("14 March 2026, 09:05 PM"));
    }

    #[test]
    fn blank_form_falls_back_to_generic_card() {
        let advice = for_level(RiskLevel::Critical, &RideForm::default());
        assert_eq!(advice.safety_card.ride_details, "Report to police via call tracking");
        assert_eq!(advice.escalation_steps.len(), 4);
        assert!(advice.helplines.iter().any(|line| line.number == "112"));
    }

    #[test]
    fn every_level_lists_the_emergency_number() {
        for level in RiskLevel::ALL {
            let advice = for_level(*level, &RideForm::default());
            assert!(!advice.immediate_actions.is_empty(), "{level}");
            assert!(advice.helplines.iter().any(|line| line.number == "112"), "{level}");
        }
    }
}
