//! Receiver (customer) identity types
//!
//! SIFEN classifies document receivers by nature (taxpayer or not) and, for
//! non-taxpayers, by a closed identity-document catalog (v150, field
//! `iTipIDRec`). The catalog is fixed here as an enum so invalid
//! combinations are caught when a document is built, not patched in data
//! afterwards.

use serde::{Deserialize, Serialize};

/// Identity-document catalog for non-taxpayer receivers (SIFEN v150).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverIdKind {
    /// Paraguayan identity card (catalog code 1)
    NationalId,
    /// Foreign identity card (catalog code 2)
    ForeignId,
    /// Passport (catalog code 3)
    Passport,
    /// Residence permit (catalog code 4)
    ResidencePermit,
    /// Unnamed final consumer (catalog code 5)
    Unnamed,
    /// No document (catalog code 9)
    NoDocument,
}

impl ReceiverIdKind {
    /// Numeric catalog code transmitted to the authority.
    pub fn code(self) -> u8 {
        match self {
            Self::NationalId => 1,
            Self::ForeignId => 2,
            Self::Passport => 3,
            Self::ResidencePermit => 4,
            Self::Unnamed => 5,
            Self::NoDocument => 9,
        }
    }

    /// Resolve a catalog code back to a variant.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::NationalId),
            2 => Some(Self::ForeignId),
            3 => Some(Self::Passport),
            4 => Some(Self::ResidencePermit),
            5 => Some(Self::Unnamed),
            9 => Some(Self::NoDocument),
            _ => None,
        }
    }

    /// Whether the catalog entry requires an accompanying document number.
    pub fn requires_number(self) -> bool {
        !matches!(self, Self::Unnamed | Self::NoDocument)
    }
}

/// Receiver nature (SIFEN field `iNatRec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverNature {
    /// Registered taxpayer, identified by RUC (code 1)
    Taxpayer,
    /// Non-taxpayer, identified by an identity document (code 2)
    NonTaxpayer,
}

impl ReceiverNature {
    pub fn code(self) -> u8 {
        match self {
            Self::Taxpayer => 1,
            Self::NonTaxpayer => 2,
        }
    }
}

/// Receiver snapshot carried on a fiscal document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
    pub nature: ReceiverNature,
    /// RUC, required when the receiver is a taxpayer.
    pub ruc: Option<String>,
    /// Identity-document kind, required when the receiver is not a taxpayer.
    pub id_kind: Option<ReceiverIdKind>,
    /// Identity-document number, required unless the kind says otherwise.
    pub id_number: Option<String>,
}

impl Receiver {
    /// Validate the receiver against the catalog rules.
    ///
    /// Taxpayers carry a RUC and no identity-document kind; non-taxpayers
    /// carry a kind from the catalog plus a number when the kind requires
    /// one.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("receiver name is empty".into());
        }

        match self.nature {
            ReceiverNature::Taxpayer => {
                let ruc = self.ruc.as_deref().unwrap_or_default();
                if ruc.trim().is_empty() {
                    return Err("taxpayer receiver is missing a RUC".into());
                }
                if self.id_kind.is_some() {
                    return Err("taxpayer receiver must not carry an identity-document kind".into());
                }
                Ok(())
            }
            ReceiverNature::NonTaxpayer => {
                let Some(kind) = self.id_kind else {
                    return Err("non-taxpayer receiver is missing an identity-document kind".into());
                };
                let number = self.id_number.as_deref().unwrap_or_default();
                if kind.requires_number() && number.trim().is_empty() {
                    return Err(format!(
                        "identity-document kind {} requires a document number",
                        kind.code()
                    ));
                }
                Ok(())
            }
        }
    }

    /// Convenience constructor for an unnamed final consumer.
    pub fn unnamed_consumer() -> Self {
        Self {
            name: "SIN NOMBRE".to_string(),
            nature: ReceiverNature::NonTaxpayer,
            ruc: None,
            id_kind: Some(ReceiverIdKind::Unnamed),
            id_number: None,
        }
    }
}
