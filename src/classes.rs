//! Static registry of the seven ISIC 2018 lesion classes.
//!
//! The registry is a fixed-size table indexed 0..6, loaded into the
//! binary at compile time and validated for completeness at startup.
//! Lookups outside the valid range fail explicitly rather than falling
//! back to a default record.

use serde::Serialize;

use crate::utils::error::{Error, Result};
use crate::NUM_CLASSES;

/// Clinical severity tier of a lesion class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Low,
    LowMedium,
    Medium,
    MediumHigh,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::LowMedium => write!(f, "Low-Medium"),
            Severity::Medium => write!(f, "Medium"),
            Severity::MediumHigh => write!(f, "Medium-High"),
            Severity::High => write!(f, "High"),
        }
    }
}

/// Immutable metadata record for one lesion class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetadata {
    /// Clinical name (e.g. "Melanoma")
    pub name: &'static str,
    /// Short code from the ISIC 2018 labels (e.g. "MEL")
    pub abbreviation: &'static str,
    /// Severity tier
    pub severity: Severity,
    /// Short clinical description
    pub description: &'static str,
    /// Recommended follow-up action
    pub recommended_action: &'static str,
    /// Body locations where the lesion typically occurs
    pub typical_locations: &'static str,
}

/// Lesion class registry, indexed by model output class (ISIC 2018 order)
const REGISTRY: [ClassMetadata; NUM_CLASSES] = [
    ClassMetadata {
        name: "Melanoma",
        abbreviation: "MEL",
        severity: Severity::High,
        description: "Most serious type of skin cancer. Requires immediate medical attention.",
        recommended_action: "Consult a dermatologist immediately",
        typical_locations: "Face, chest, legs, back",
    },
    ClassMetadata {
        name: "Nevus",
        abbreviation: "NV",
        severity: Severity::Low,
        description: "Common mole, usually benign but monitor for changes.",
        recommended_action: "Regular self-examination recommended",
        typical_locations: "Anywhere on body",
    },
    ClassMetadata {
        name: "Basal Cell Carcinoma",
        abbreviation: "BCC",
        severity: Severity::Medium,
        description: "Most common but least dangerous skin cancer. Rarely spreads.",
        recommended_action: "Schedule dermatologist appointment",
        typical_locations: "Sun-exposed areas",
    },
    ClassMetadata {
        name: "Actinic Keratoses",
        abbreviation: "AKIEC",
        severity: Severity::MediumHigh,
        description: "Pre-cancerous growths that can develop into squamous cell carcinoma.",
        recommended_action: "Consult dermatologist within 2-4 weeks",
        typical_locations: "Face, ears, scalp, hands",
    },
    ClassMetadata {
        name: "Benign Keratosis",
        abbreviation: "BKL",
        severity: Severity::Low,
        description: "Harmless skin growths, often called seborrheic keratosis.",
        recommended_action: "No immediate action needed",
        typical_locations: "Chest, back, face",
    },
    ClassMetadata {
        name: "Dermatofibroma",
        abbreviation: "DF",
        severity: Severity::Low,
        description: "Benign fibrous nodule, usually harmless.",
        recommended_action: "Monitor for changes",
        typical_locations: "Legs, arms",
    },
    ClassMetadata {
        name: "Vascular Lesions",
        abbreviation: "VASC",
        severity: Severity::LowMedium,
        description: "Blood vessel abnormalities, usually benign.",
        recommended_action: "Consult if changing appearance",
        typical_locations: "Face, neck, upper body",
    },
];

/// Get the metadata record for a class index.
///
/// Fails with `Error::ClassIndex` for indices outside [0, K-1].
pub fn class_metadata(index: usize) -> Result<&'static ClassMetadata> {
    REGISTRY.get(index).ok_or(Error::ClassIndex(index))
}

/// Get the clinical name for a class index
pub fn class_name(index: usize) -> Option<&'static str> {
    REGISTRY.get(index).map(|m| m.name)
}

/// Display name combining the clinical name and ISIC code,
/// e.g. "Melanoma (MEL)"
pub fn display_name(index: usize) -> Result<String> {
    let meta = class_metadata(index)?;
    Ok(format!("{} ({})", meta.name, meta.abbreviation))
}

/// Get the class index for an ISIC abbreviation
pub fn class_index(abbreviation: &str) -> Option<usize> {
    REGISTRY
        .iter()
        .position(|m| m.abbreviation.eq_ignore_ascii_case(abbreviation))
}

/// Validate the registry at startup: every slot populated, no empty
/// fields, no duplicate abbreviations.
pub fn validate_registry() -> Result<()> {
    for (idx, meta) in REGISTRY.iter().enumerate() {
        if meta.name.is_empty()
            || meta.abbreviation.is_empty()
            || meta.description.is_empty()
            || meta.recommended_action.is_empty()
            || meta.typical_locations.is_empty()
        {
            return Err(Error::Config(format!(
                "class registry entry {} has an empty field",
                idx
            )));
        }
    }
    for (idx, meta) in REGISTRY.iter().enumerate() {
        if REGISTRY[..idx]
            .iter()
            .any(|m| m.abbreviation == meta.abbreviation)
        {
            return Err(Error::Config(format!(
                "duplicate class abbreviation '{}'",
                meta.abbreviation
            )));
        }
    }
    Ok(())
}
