//! Closed enumerations for request types, roles and dossier statuses.
//!
//! Every value that crosses the API boundary as a string is parsed into one of these types
//! before it reaches the store. Unrecognised strings are rejected with an `InvalidInput`-kind
//! error and are never persisted.

use crate::error::RaccordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The network(s) a permit request concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Drinking-water supply (adduction d'eau potable).
    #[serde(rename = "AEP")]
    Aep,
    /// Sanitation (assainissement).
    #[serde(rename = "ASSEU")]
    Asseu,
    /// Both networks; needs approval from both responsibles.
    #[serde(rename = "LES_DEUX")]
    LesDeux,
}

impl RequestType {
    pub const ALL: [RequestType; 3] = [Self::Aep, Self::Asseu, Self::LesDeux];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aep => "AEP",
            Self::Asseu => "ASSEU",
            Self::LesDeux => "LES_DEUX",
        }
    }

    /// Request types a listing for `self` covers.
    ///
    /// A single-network listing also shows combined requests, since those need that network's
    /// responsible too. A combined listing shows only combined requests.
    pub fn listing_types(&self) -> &'static [RequestType] {
        match self {
            Self::Aep => &[Self::Aep, Self::LesDeux],
            Self::Asseu => &[Self::Asseu, Self::LesDeux],
            Self::LesDeux => &[Self::LesDeux],
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = RaccordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "AEP" => Ok(Self::Aep),
            "ASSEU" => Ok(Self::Asseu),
            "LES_DEUX" => Ok(Self::LesDeux),
            other => Err(RaccordError::InvalidRequestType(other.to_string())),
        }
    }
}

/// Role carried by an authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "CLIENT")]
    Client,
    #[serde(rename = "RESP_AEP", alias = "RESPONSABLE_AEP")]
    RespAep,
    #[serde(rename = "RESP_ASSEU", alias = "RESPONSABLE_ASSEU")]
    RespAsseu,
    #[serde(rename = "DIRECTEUR")]
    Directeur,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::RespAep => "RESP_AEP",
            Self::RespAsseu => "RESP_ASSEU",
            Self::Directeur => "DIRECTEUR",
        }
    }

    /// Whether this role may change dossier statuses for a request of `request_type`.
    pub fn may_review(&self, request_type: RequestType) -> bool {
        match self {
            Self::RespAep => matches!(request_type, RequestType::Aep | RequestType::LesDeux),
            Self::RespAsseu => matches!(request_type, RequestType::Asseu | RequestType::LesDeux),
            Self::Client | Self::Directeur => false,
        }
    }

    /// The partial-approval marker this role records on a combined request.
    pub fn partial_marker(&self) -> Option<ExecutionStatus> {
        match self {
            Self::RespAep => Some(ExecutionStatus::AccepteeAep),
            Self::RespAsseu => Some(ExecutionStatus::AccepteeAsseu),
            Self::Client | Self::Directeur => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RaccordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Self::Client),
            "RESP_AEP" | "RESPONSABLE_AEP" => Ok(Self::RespAep),
            "RESP_ASSEU" | "RESPONSABLE_ASSEU" => Ok(Self::RespAsseu),
            "DIRECTEUR" => Ok(Self::Directeur),
            _ => Err(RaccordError::InvalidRole(s.trim().to_string())),
        }
    }
}

/// A status a responsible may submit for either dossier kind.
///
/// Partial-approval markers are computed, never submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestedStatus {
    EnCours,
    Acceptee,
    ACorriger,
}

impl RequestedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnCours => "EN_COURS",
            Self::Acceptee => "ACCEPTEE",
            Self::ACorriger => "A_CORRIGER",
        }
    }
}

impl fmt::Display for RequestedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestedStatus {
    type Err = RaccordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "EN_COURS" => Ok(Self::EnCours),
            "ACCEPTEE" => Ok(Self::Acceptee),
            "A_CORRIGER" => Ok(Self::ACorriger),
            other => Err(RaccordError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DossierKind {
    Study,
    Execution,
}

impl DossierKind {
    pub fn entity_name(&self) -> &'static str {
        match self {
            Self::Study => "study dossier",
            Self::Execution => "execution dossier",
        }
    }
}

/// Status domain of one dossier kind.
pub trait DossierStatus:
    Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + Serialize + 'static
{
    const KIND: DossierKind;

    /// Status every new dossier of this kind starts in.
    const INITIAL: Self;

    fn as_str(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyStatus {
    EnCours,
    Acceptee,
    ACorriger,
}

impl DossierStatus for StudyStatus {
    const KIND: DossierKind = DossierKind::Study;
    const INITIAL: Self = Self::EnCours;

    fn as_str(&self) -> &'static str {
        match self {
            Self::EnCours => "EN_COURS",
            Self::Acceptee => "ACCEPTEE",
            Self::ACorriger => "A_CORRIGER",
        }
    }
}

impl From<RequestedStatus> for StudyStatus {
    fn from(requested: RequestedStatus) -> Self {
        match requested {
            RequestedStatus::EnCours => Self::EnCours,
            RequestedStatus::Acceptee => Self::Acceptee,
            RequestedStatus::ACorriger => Self::ACorriger,
        }
    }
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(DossierStatus::as_str(self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    EnCours,
    AccepteeAep,
    AccepteeAsseu,
    Acceptee,
    ACorriger,
}

impl ExecutionStatus {
    /// The marker the *other* responsible records, for partial markers only.
    pub fn opposite_marker(&self) -> Option<Self> {
        match self {
            Self::AccepteeAep => Some(Self::AccepteeAsseu),
            Self::AccepteeAsseu => Some(Self::AccepteeAep),
            _ => None,
        }
    }
}

impl DossierStatus for ExecutionStatus {
    const KIND: DossierKind = DossierKind::Execution;
    const INITIAL: Self = Self::EnCours;

    fn as_str(&self) -> &'static str {
        match self {
            Self::EnCours => "EN_COURS",
            Self::AccepteeAep => "ACCEPTEE_AEP",
            Self::AccepteeAsseu => "ACCEPTEE_ASSEU",
            Self::Acceptee => "ACCEPTEE",
            Self::ACorriger => "A_CORRIGER",
        }
    }
}

impl From<RequestedStatus> for ExecutionStatus {
    fn from(requested: RequestedStatus) -> Self {
        match requested {
            RequestedStatus::EnCours => Self::EnCours,
            RequestedStatus::Acceptee => Self::Acceptee,
            RequestedStatus::ACorriger => Self::ACorriger,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(DossierStatus::as_str(self))
    }
}

/// How a status change landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The requested status was persisted as submitted.
    Direct,
    /// One of two required approvals was recorded.
    Partial,
    /// The second approval arrived; the dossier is now accepted.
    Final,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Partial => "PARTIAL",
            Self::Final => "FINAL",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network inspected during a site visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitType {
    #[serde(rename = "AEP")]
    Aep,
    #[serde(rename = "ASSEU")]
    Asseu,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aep => "AEP",
            Self::Asseu => "ASSEU",
        }
    }
}

impl FromStr for VisitType {
    type Err = RaccordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "AEP" => Ok(Self::Aep),
            "ASSEU" => Ok(Self::Asseu),
            other => Err(RaccordError::InvalidInput(format!(
                "invalid visit type: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_type_listing_includes_combined_requests() {
        assert_eq!(
            RequestType::Aep.listing_types(),
            &[RequestType::Aep, RequestType::LesDeux]
        );
        assert_eq!(
            RequestType::Asseu.listing_types(),
            &[RequestType::Asseu, RequestType::LesDeux]
        );
        assert_eq!(RequestType::LesDeux.listing_types(), &[RequestType::LesDeux]);
    }

    #[test]
    fn request_type_rejects_lowercase() {
        assert!(matches!(
            "aep".parse::<RequestType>(),
            Err(RaccordError::InvalidRequestType(_))
        ));
    }

    #[test]
    fn role_accepts_long_responsible_names() {
        assert_eq!("RESPONSABLE_AEP".parse::<Role>().unwrap(), Role::RespAep);
        assert_eq!("resp_asseu".parse::<Role>().unwrap(), Role::RespAsseu);
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn role_review_scope_follows_network() {
        assert!(Role::RespAep.may_review(RequestType::Aep));
        assert!(Role::RespAep.may_review(RequestType::LesDeux));
        assert!(!Role::RespAep.may_review(RequestType::Asseu));
        assert!(Role::RespAsseu.may_review(RequestType::Asseu));
        assert!(!Role::Directeur.may_review(RequestType::LesDeux));
        assert!(!Role::Client.may_review(RequestType::Aep));
    }

    #[test]
    fn requested_status_rejects_partial_markers() {
        assert!(matches!(
            "ACCEPTEE_AEP".parse::<RequestedStatus>(),
            Err(RaccordError::InvalidStatus(_))
        ));
        assert!("VALIDEE".parse::<RequestedStatus>().is_err());
    }

    #[test]
    fn execution_markers_are_each_others_opposite() {
        assert_eq!(
            ExecutionStatus::AccepteeAep.opposite_marker(),
            Some(ExecutionStatus::AccepteeAsseu)
        );
        assert_eq!(
            ExecutionStatus::AccepteeAsseu.opposite_marker(),
            Some(ExecutionStatus::AccepteeAep)
        );
        assert_eq!(ExecutionStatus::Acceptee.opposite_marker(), None);
    }

    #[test]
    fn status_serde_uses_wire_names() {
        assert_eq!(
            serde_yaml::to_string(&ExecutionStatus::AccepteeAsseu)
                .unwrap()
                .trim(),
            "ACCEPTEE_ASSEU"
        );
        assert_eq!(
            serde_yaml::to_string(&StudyStatus::ACorriger).unwrap().trim(),
            "A_CORRIGER"
        );
        let parsed: Role = serde_yaml::from_str("RESPONSABLE_ASSEU").unwrap();
        assert_eq!(parsed, Role::RespAsseu);
    }
}
