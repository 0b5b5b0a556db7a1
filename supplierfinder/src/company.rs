use serde::{Deserialize, Serialize};

use crate::inn;

/// Session-scoped candidate identifier, rendered as `company_<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId(u32);

impl CandidateId {
    /// First identifier handed out in a session
    pub const FIRST: CandidateId = CandidateId(1);

    pub fn next(&self) -> CandidateId {
        CandidateId(self.0 + 1)
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "company_{}", self.0)
    }
}

impl Serialize for CandidateId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fields pulled out of one page of text. Every field is optional; a page
/// only becomes a [`CandidateCompany`] once it has both a legal name and a
/// valid INN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialCandidate {
    pub legal_name: Option<String>,
    pub inn: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PartialCandidate {
    pub fn is_empty(&self) -> bool {
        self.legal_name.is_none() && self.inn.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// Whether this record satisfies the admission invariant
    pub fn is_admissible(&self) -> bool {
        let has_name = self.legal_name.as_deref().is_some_and(|n| !n.trim().is_empty());
        let has_inn = self.inn.as_deref().is_some_and(inn::validate_inn);
        has_name && has_inn
    }
}

/// Why a partial record could not become a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingLegalName,
    MissingInn,
    InvalidInn,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingLegalName => write!(f, "no legal name"),
            Rejection::MissingInn => write!(f, "no INN"),
            Rejection::InvalidInn => write!(f, "INN fails checksum"),
        }
    }
}

/// A company admitted into a search session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateCompany {
    pub id: CandidateId,
    pub legal_name: String,
    pub inn: String,
    pub website: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CandidateCompany {
    /// Build a candidate, re-checking the name and INN invariants
    pub fn from_partial(
        id: CandidateId,
        partial: PartialCandidate,
        website: &str,
    ) -> Result<Self, Rejection> {
        let legal_name = match partial.legal_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(Rejection::MissingLegalName),
        };
        let inn = partial.inn.ok_or(Rejection::MissingInn)?;
        if !inn::validate_inn(&inn) {
            return Err(Rejection::InvalidInn);
        }

        Ok(CandidateCompany {
            id,
            legal_name,
            inn,
            website: website.to_string(),
            email: partial.email,
            phone: partial.phone,
        })
    }

    pub fn inn_kind(&self) -> Option<inn::InnKind> {
        inn::classify_inn(&self.inn)
    }
}
