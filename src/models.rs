use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantType {
    Adult,
    Child,
}

impl ParticipantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantType::Adult => "ADULT",
            ParticipantType::Child => "CHILD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADULT" => Some(ParticipantType::Adult),
            "CHILD" => Some(ParticipantType::Child),
            _ => None,
        }
    }
}

/// Event row as stored; derived figures live only on [`EventDto`].
#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub adult_budget: f64,
    pub child_budget: f64,
    pub general_costs: f64,
    pub creator_id: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventPayload {
    pub name: String,
    pub description: Option<String>,
    pub adult_budget: f64,
    pub child_budget: f64,
    pub general_costs: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub adult_budget: f64,
    pub child_budget: f64,
    pub general_costs: f64,
    pub creator_id: String,
    pub created_at: String,
    pub participants: Vec<ParticipantDto>,
    pub payments: Vec<PaymentDto>,
    pub total_budget: f64,
    pub budget_per_payer: f64,
    pub number_of_payers: u32,
}

/// Participant row as stored. `is_couple` is true iff `partner_id` is set;
/// every write path goes through the canonicalizing update in `participants`.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub kind: ParticipantType,
    pub custom_budget: Option<f64>,
    pub is_couple: bool,
    pub partner_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateParticipantPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParticipantType,
    pub custom_budget: Option<f64>,
    #[serde(default)]
    pub is_couple: bool,
    pub partner_id: Option<String>,
    pub user_id: Option<String>,
}

impl CreateParticipantPayload {
    /// Canonicalizes the couple flag before the payload leaves the client:
    /// `isCouple` is true exactly when a partner is selected, whatever the
    /// checkbox said.
    pub fn normalized(mut self) -> Self {
        self.is_couple = self.partner_id.is_some();
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub id: String,
    pub event_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParticipantType,
    pub custom_budget: Option<f64>,
    pub is_couple: bool,
    pub partner_id: Option<String>,
    pub user_id: Option<String>,
    pub calculated_budget: f64,
}

impl ParticipantDto {
    /// Display label for the partner. A partner id that no longer resolves
    /// (data from a server that tolerates dangling references) falls back to
    /// the raw id instead of failing.
    pub fn partner_label(&self, participants: &[ParticipantDto]) -> Option<String> {
        let partner_id = self.partner_id.as_ref()?;
        Some(
            participants
                .iter()
                .find(|p| &p.id == partner_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| format!("ID {}", partner_id)),
        )
    }
}

/// Payment row as stored.
#[derive(Debug, Clone)]
pub struct Payment {
    pub id: String,
    pub event_id: String,
    pub amount: f64,
    pub payer_name: Option<String>,
    pub note: Option<String>,
    pub participant_id: Option<String>,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentPayload {
    pub amount: f64,
    pub payer_name: Option<String>,
    pub participant_id: Option<String>,
    pub note: Option<String>,
}

impl CreatePaymentPayload {
    /// When the payment is attributed to a participant, the payer name is
    /// taken from that participant at submit time, overriding anything typed
    /// into the form. Unknown ids leave the payload untouched.
    pub fn with_attribution(mut self, participants: &[ParticipantDto]) -> Self {
        if let Some(ref participant_id) = self.participant_id {
            if let Some(p) = participants.iter().find(|p| &p.id == participant_id) {
                self.payer_name = Some(p.name.clone());
            }
        }
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub id: String,
    pub event_id: String,
    pub amount: f64,
    pub payer_name: Option<String>,
    pub note: Option<String>,
    pub participant_id: Option<String>,
    pub participant_name: Option<String>,
    pub partner_id: Option<String>,
    pub partner_name: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant_dto(id: &str, name: &str) -> ParticipantDto {
        ParticipantDto {
            id: id.to_string(),
            event_id: "e1".to_string(),
            name: name.to_string(),
            kind: ParticipantType::Adult,
            custom_budget: None,
            is_couple: false,
            partner_id: None,
            user_id: None,
            calculated_budget: 0.0,
        }
    }

    #[test]
    fn normalized_sets_couple_flag_from_partner() {
        let payload = CreateParticipantPayload {
            name: "Anna".to_string(),
            kind: ParticipantType::Adult,
            custom_budget: None,
            is_couple: false,
            partner_id: Some("p2".to_string()),
            user_id: None,
        };
        assert!(payload.normalized().is_couple);
    }

    #[test]
    fn normalized_clears_stale_couple_flag() {
        let payload = CreateParticipantPayload {
            name: "Anna".to_string(),
            kind: ParticipantType::Adult,
            custom_budget: None,
            is_couple: true,
            partner_id: None,
            user_id: None,
        };
        assert!(!payload.normalized().is_couple);
    }

    #[test]
    fn attribution_overrides_typed_payer_name() {
        let payload = CreatePaymentPayload {
            amount: 25.0,
            payer_name: Some("typed by hand".to_string()),
            participant_id: Some("p1".to_string()),
            note: None,
        };
        let participants = vec![participant_dto("p1", "Moritz")];
        let prepared = payload.with_attribution(&participants);
        assert_eq!(prepared.payer_name.as_deref(), Some("Moritz"));
    }

    #[test]
    fn attribution_without_participant_keeps_typed_name() {
        let payload = CreatePaymentPayload {
            amount: 25.0,
            payer_name: Some("Gast".to_string()),
            participant_id: None,
            note: None,
        };
        let prepared = payload.with_attribution(&[participant_dto("p1", "Moritz")]);
        assert_eq!(prepared.payer_name.as_deref(), Some("Gast"));
    }

    #[test]
    fn partner_label_falls_back_to_raw_id() {
        let mut anna = participant_dto("p1", "Anna");
        anna.partner_id = Some("gone".to_string());
        let others = vec![participant_dto("p2", "Ben")];
        assert_eq!(anna.partner_label(&others).as_deref(), Some("ID gone"));

        anna.partner_id = Some("p2".to_string());
        assert_eq!(anna.partner_label(&others).as_deref(), Some("Ben"));

        anna.partner_id = None;
        assert_eq!(anna.partner_label(&others), None);
    }

    #[test]
    fn participant_type_wire_format_is_uppercase() {
        let json = serde_json::to_string(&ParticipantType::Adult).unwrap();
        assert_eq!(json, "\"ADULT\"");
        let parsed: ParticipantType = serde_json::from_str("\"CHILD\"").unwrap();
        assert_eq!(parsed, ParticipantType::Child);
    }
}
