use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Plan identifiers arrive as numbers from most endpoints and as strings
/// from a few older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanId {
    Number(u64),
    Text(String),
}

impl PlanId {
    pub fn is_valid(&self) -> bool {
        match self {
            PlanId::Number(n) => *n > 0,
            PlanId::Text(s) => !s.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanId::Number(n) => write!(f, "{}", n),
            PlanId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramSelection {
    pub id: PlanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSelection {
    pub id: PlanId,
    pub name: String,
    pub price: f64,
}

/// Purchase intent handed from the chat to the checkout surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingPurchase {
    pub program: ProgramSelection,
    #[serde(default)]
    pub packages: Vec<PackageSelection>,
}

#[derive(Debug, Error)]
pub enum InvalidPurchase {
    #[error("Malformed purchase record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Purchase record has an invalid program id")]
    InvalidProgramId,

    #[error("Purchase record has an invalid price for {0}")]
    InvalidPrice(String),
}

impl PendingPurchase {
    pub fn for_program(program: ProgramSelection) -> Self {
        Self {
            program,
            packages: Vec::new(),
        }
    }

    /// Parse and validate a persisted record. Anything that does not match
    /// the schema exactly is rejected.
    pub fn from_stored(json: &str) -> Result<Self, InvalidPurchase> {
        let record: PendingPurchase = serde_json::from_str(json)?;
        if !record.program.id.is_valid() {
            return Err(InvalidPurchase::InvalidProgramId);
        }
        if !is_valid_price(record.program.price) {
            return Err(InvalidPurchase::InvalidPrice(record.program.id.to_string()));
        }
        if let Some(bad) = record
            .packages
            .iter()
            .find(|p| !p.id.is_valid() || !is_valid_price(p.price))
        {
            return Err(InvalidPurchase::InvalidPrice(bad.id.to_string()));
        }
        Ok(record)
    }
}

fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_stored_accepts_minimal_record() {
        let record =
            PendingPurchase::from_stored(r#"{"program":{"id":7,"name_en":"Basic","price":99},"packages":[]}"#)
                .unwrap();
        assert_eq!(record.program.id, PlanId::Number(7));
        assert_eq!(record.program.name_en.as_deref(), Some("Basic"));
        assert!(record.packages.is_empty());
    }

    #[test]
    fn test_from_stored_rejects_unknown_fields() {
        let err = PendingPurchase::from_stored(
            r#"{"program":{"id":7,"price":99,"coupon":"FREE"},"packages":[]}"#,
        );
        assert!(matches!(err, Err(InvalidPurchase::Malformed(_))));
    }

    #[test]
    fn test_from_stored_rejects_bad_values() {
        assert!(matches!(
            PendingPurchase::from_stored(r#"{"program":{"id":0,"price":99}}"#),
            Err(InvalidPurchase::InvalidProgramId)
        ));
        assert!(matches!(
            PendingPurchase::from_stored(r#"{"program":{"id":"p1","price":-5}}"#),
            Err(InvalidPurchase::InvalidPrice(_))
        ));
        assert!(PendingPurchase::from_stored("not json").is_err());
    }

    #[test]
    fn test_serialized_shape_omits_missing_names() {
        let record = PendingPurchase::for_program(ProgramSelection {
            id: PlanId::Number(7),
            name_en: Some("Basic".to_string()),
            name_ar: None,
            price: 99.0,
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["program"]["id"], 7);
        assert!(value["program"].get("name_ar").is_none());
        assert_eq!(value["packages"], serde_json::json!([]));
    }
}
