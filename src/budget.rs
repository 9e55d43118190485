//! Derives the display-only financial figures of an event from its raw
//! rows. Everything here is pure and recomputed on every read; derived
//! values are never persisted.

use std::collections::HashSet;

use crate::models::{Participant, ParticipantType};

/// Round to cents, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Effective budget of a single participant: the custom override when one is
/// set, otherwise the event default for the participant's type.
pub fn participant_budget(participant: &Participant, adult_budget: f64, child_budget: f64) -> f64 {
    if let Some(custom) = participant.custom_budget {
        return round2(custom);
    }
    match participant.kind {
        ParticipantType::Adult => round2(adult_budget),
        ParticipantType::Child => round2(child_budget),
    }
}

/// Sum of all effective participant budgets plus the event's general costs.
pub fn total_budget(
    adult_budget: f64,
    child_budget: f64,
    general_costs: f64,
    participants: &[Participant],
) -> f64 {
    let mut total = 0.0;
    for participant in participants {
        total += participant_budget(participant, adult_budget, child_budget);
    }
    round2(total + general_costs)
}

/// Number of paying units: adults only, with a linked couple counted once.
/// An adult flagged as a couple whose partner reference is missing still
/// counts as a single unit.
pub fn number_of_payers(participants: &[Participant]) -> u32 {
    let mut count: u32 = 0;
    let mut counted: HashSet<&str> = HashSet::new();

    for payer in participants
        .iter()
        .filter(|p| p.kind == ParticipantType::Adult)
    {
        match (&payer.partner_id, payer.is_couple) {
            (Some(partner_id), _) => {
                if !counted.contains(payer.id.as_str()) && !counted.contains(partner_id.as_str()) {
                    count += 1;
                    counted.insert(payer.id.as_str());
                    counted.insert(partner_id.as_str());
                }
            }
            (None, true) => {
                if !counted.contains(payer.id.as_str()) {
                    count += 1;
                    counted.insert(payer.id.as_str());
                }
            }
            (None, false) => {
                count += 1;
            }
        }
    }

    count
}

/// Total budget divided across the paying units, 0 when nobody pays.
pub fn budget_per_payer(
    adult_budget: f64,
    child_budget: f64,
    general_costs: f64,
    participants: &[Participant],
) -> f64 {
    let payers = number_of_payers(participants);
    if payers == 0 {
        return 0.0;
    }
    let total = total_budget(adult_budget, child_budget, general_costs, participants);
    round2(total / payers as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adult(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            event_id: "e1".to_string(),
            name: id.to_string(),
            kind: ParticipantType::Adult,
            custom_budget: None,
            is_couple: false,
            partner_id: None,
            user_id: None,
        }
    }

    fn child(id: &str) -> Participant {
        Participant {
            kind: ParticipantType::Child,
            ..adult(id)
        }
    }

    fn coupled(id: &str, partner: &str) -> Participant {
        Participant {
            is_couple: true,
            partner_id: Some(partner.to_string()),
            ..adult(id)
        }
    }

    #[test]
    fn custom_budget_wins_regardless_of_type() {
        let mut a = adult("a");
        a.custom_budget = Some(80.0);
        let mut c = child("c");
        c.custom_budget = Some(80.0);
        assert_eq!(participant_budget(&a, 100.0, 50.0), 80.0);
        assert_eq!(participant_budget(&c, 100.0, 50.0), 80.0);
    }

    #[test]
    fn type_default_applies_without_custom_budget() {
        assert_eq!(participant_budget(&adult("a"), 100.0, 50.0), 100.0);
        assert_eq!(participant_budget(&child("c"), 100.0, 50.0), 50.0);
    }

    #[test]
    fn total_budget_sums_participants_and_general_costs() {
        // Event{adult:100, child:50, general:20}, one adult + one child
        let participants = vec![adult("a"), child("b")];
        assert_eq!(total_budget(100.0, 50.0, 20.0, &participants), 170.0);
        assert_eq!(number_of_payers(&participants), 1);
        assert_eq!(budget_per_payer(100.0, 50.0, 20.0, &participants), 170.0);
    }

    #[test]
    fn custom_budget_replaces_default_in_total() {
        let mut a = adult("a");
        a.custom_budget = Some(80.0);
        let participants = vec![a, child("b")];
        assert_eq!(total_budget(100.0, 50.0, 20.0, &participants), 150.0);
    }

    #[test]
    fn empty_event_totals_general_costs_only() {
        assert_eq!(total_budget(100.0, 50.0, 20.0, &[]), 20.0);
    }

    #[test]
    fn per_payer_is_zero_without_adults() {
        let participants = vec![child("a"), child("b")];
        assert_eq!(number_of_payers(&participants), 0);
        assert_eq!(budget_per_payer(100.0, 50.0, 20.0, &participants), 0.0);
    }

    #[test]
    fn children_never_count_as_payers() {
        let participants = vec![adult("a"), child("b"), child("c"), adult("d")];
        assert_eq!(number_of_payers(&participants), 2);
    }

    #[test]
    fn linked_couple_counts_as_one_payer() {
        let participants = vec![coupled("a", "b"), coupled("b", "a"), adult("c")];
        assert_eq!(number_of_payers(&participants), 2);
    }

    #[test]
    fn couple_flag_without_partner_counts_once() {
        let mut a = adult("a");
        a.is_couple = true;
        assert_eq!(number_of_payers(&[a]), 1);
    }

    #[test]
    fn per_payer_divides_across_couple_units() {
        // Couple (100 each) + single adult (100) + general 30 = 330 over 2 units
        let participants = vec![coupled("a", "b"), coupled("b", "a"), adult("c")];
        assert_eq!(total_budget(100.0, 50.0, 30.0, &participants), 330.0);
        assert_eq!(budget_per_payer(100.0, 50.0, 30.0, &participants), 165.0);
    }

    #[test]
    fn per_payer_rounds_to_cents() {
        let participants = vec![adult("a"), adult("b"), adult("c")];
        // 3 * 100 / 3 adults = 100; use general costs to force a remainder
        assert_eq!(budget_per_payer(100.0, 50.0, 0.10, &participants), 100.03);
    }
}
