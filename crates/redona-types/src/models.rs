use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

fn unknown<T>(kind: &'static str, value: &str) -> Result<T, UnknownVariant> {
    Err(UnknownVariant {
        kind,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Donor,
    Ngo,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "DONOR",
            Role::Ngo => "NGO",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DONOR" => Ok(Role::Donor),
            "NGO" => Ok(Role::Ngo),
            "ADMIN" => Ok(Role::Admin),
            other => unknown("role", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OngStatus {
    Pending,
    Approved,
    Rejected,
}

impl OngStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OngStatus::Pending => "PENDING",
            OngStatus::Approved => "APPROVED",
            OngStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for OngStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OngStatus::Pending),
            "APPROVED" => Ok(OngStatus::Approved),
            "REJECTED" => Ok(OngStatus::Rejected),
            other => unknown("ong status", other),
        }
    }
}

/// AVAILABLE -> ASSIGNED -> DELIVERED, with ASSIGNED -> AVAILABLE on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Available,
    Assigned,
    Delivered,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Available => "AVAILABLE",
            DonationStatus::Assigned => "ASSIGNED",
            DonationStatus::Delivered => "DELIVERED",
        }
    }
}

impl FromStr for DonationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(DonationStatus::Available),
            "ASSIGNED" => Ok(DonationStatus::Assigned),
            "DELIVERED" => Ok(DonationStatus::Delivered),
            other => unknown("donation status", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeedStatus {
    Open,
    Closed,
}

impl NeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeedStatus::Open => "OPEN",
            NeedStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for NeedStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(NeedStatus::Open),
            "CLOSED" => Ok(NeedStatus::Closed),
            other => unknown("need status", other),
        }
    }
}

/// A conversation is OPEN until closed; CLOSED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    Open,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Open => "OPEN",
            ConversationStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for ConversationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(ConversationStatus::Open),
            "CLOSED" => Ok(ConversationStatus::Closed),
            other => unknown("conversation status", other),
        }
    }
}

/// The side of a conversation a caller occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Donor,
    Ong,
}

/// What a conversation is about. Rows keep two nullable columns; everything
/// above the persistence layer switches on this tag instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConversationSubject {
    #[serde(rename_all = "camelCase")]
    Donation { donation_id: String },
    #[serde(rename_all = "camelCase")]
    Need { need_id: String },
}

impl ConversationSubject {
    /// Returns `None` unless exactly one of the two columns is set.
    pub fn from_columns(donation_id: Option<String>, need_id: Option<String>) -> Option<Self> {
        match (donation_id, need_id) {
            (Some(donation_id), None) => Some(Self::Donation { donation_id }),
            (None, Some(need_id)) => Some(Self::Need { need_id }),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Donation { .. } => "donation",
            Self::Need { .. } => "need",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Donation { donation_id } => donation_id,
            Self::Need { need_id } => need_id,
        }
    }
}

/// Decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both columns must be present for a usable point.
    pub fn from_columns(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some(Self::new(lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_requires_exactly_one_column() {
        assert_eq!(
            ConversationSubject::from_columns(Some("d1".into()), None),
            Some(ConversationSubject::Donation {
                donation_id: "d1".into()
            })
        );
        assert_eq!(
            ConversationSubject::from_columns(None, Some("n1".into())),
            Some(ConversationSubject::Need {
                need_id: "n1".into()
            })
        );
        assert_eq!(ConversationSubject::from_columns(None, None), None);
        assert_eq!(
            ConversationSubject::from_columns(Some("d1".into()), Some("n1".into())),
            None
        );
    }

    #[test]
    fn subject_serializes_as_tagged_union() {
        let subject = ConversationSubject::Donation {
            donation_id: "d1".into(),
        };
        let json = serde_json::to_value(&subject).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "donation", "donationId": "d1"}));
    }

    #[test]
    fn status_labels_parse_back() {
        assert_eq!("NGO".parse::<Role>().unwrap(), Role::Ngo);
        assert_eq!(
            ConversationStatus::Closed.as_str().parse::<ConversationStatus>().unwrap(),
            ConversationStatus::Closed
        );
        assert!("open".parse::<ConversationStatus>().is_err());
    }
}
