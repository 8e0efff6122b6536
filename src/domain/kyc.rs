//! Know-your-customer submission and review states.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::None => "none",
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }

    /// A user may (re)submit only before review or after a rejection.
    pub fn ensure_can_submit(&self) -> AppResult<()> {
        match self {
            KycStatus::None | KycStatus::Rejected => Ok(()),
            KycStatus::Pending => Err(AppError::invalid_state("KYC is already under review")),
            KycStatus::Approved => Err(AppError::invalid_state("KYC is already approved")),
        }
    }

    pub fn ensure_reviewable(&self) -> AppResult<()> {
        if *self != KycStatus::Pending {
            return Err(AppError::invalid_state("KYC is not awaiting review"));
        }
        Ok(())
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, KycStatus::Approved)
    }
}

impl From<&str> for KycStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => KycStatus::Pending,
            "approved" => KycStatus::Approved,
            "rejected" => KycStatus::Rejected,
            _ => KycStatus::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    NationalId,
    DriverLicense,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Passport => "passport",
            DocumentType::NationalId => "national_id",
            DocumentType::DriverLicense => "driver_license",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "passport" => Some(DocumentType::Passport),
            "national_id" => Some(DocumentType::NationalId),
            "driver_license" => Some(DocumentType::DriverLicense),
            _ => None,
        }
    }
}

/// Identity details submitted for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KycDetails {
    #[schema(example = "Jane Doe")]
    pub full_name: String,
    pub document_type: DocumentType,
    #[schema(example = "X1234567")]
    pub document_number: String,
    /// ISO 3166-1 alpha-2 country code
    #[schema(example = "NG")]
    pub country: String,
}

impl KycDetails {
    /// Normalise whitespace and casing before storage.
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.split_whitespace().collect::<Vec<_>>().join(" "),
            document_type: self.document_type,
            document_number: self.document_number.trim().to_ascii_uppercase(),
            country: self.country.trim().to_ascii_uppercase(),
        }
    }
}

/// KYC state of a user as exposed through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct KycRecord {
    pub status: KycStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<KycDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_rules() {
        assert!(KycStatus::None.ensure_can_submit().is_ok());
        assert!(KycStatus::Rejected.ensure_can_submit().is_ok());
        assert!(KycStatus::Pending.ensure_can_submit().is_err());
        assert!(KycStatus::Approved.ensure_can_submit().is_err());
    }

    #[test]
    fn test_review_only_from_pending() {
        assert!(KycStatus::Pending.ensure_reviewable().is_ok());
        assert!(KycStatus::None.ensure_reviewable().is_err());
        assert!(KycStatus::Approved.ensure_reviewable().is_err());
    }

    #[test]
    fn test_details_normalized() {
        let details = KycDetails {
            full_name: "  Jane   Q  Doe ".to_string(),
            document_type: DocumentType::Passport,
            document_number: " x123 ".to_string(),
            country: "ng".to_string(),
        }
        .normalized();

        assert_eq!(details.full_name, "Jane Q Doe");
        assert_eq!(details.document_number, "X123");
        assert_eq!(details.country, "NG");
    }

    #[test]
    fn test_document_type_round_trip_through_storage_names() {
        for doc in [DocumentType::Passport, DocumentType::NationalId, DocumentType::DriverLicense] {
            assert_eq!(DocumentType::parse(doc.as_str()), Some(doc));
        }
        assert_eq!(DocumentType::parse("selfie"), None);
    }
}
