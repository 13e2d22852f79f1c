//! Fill profiles
//!
//! Everything template-specific the engine needs but cannot infer: the
//! field-name and token lookup tables, the numeric ranges that turn choice
//! tokens into named groups, auto-fill value tables, per-counterpart
//! placement corrections and extraction tuning. Profiles are plain data,
//! deserialized from JSON and handed to the resolver at construction.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{Namespace, SourceBinding, SourceRecord};
use crate::resolver::normalize_name;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read profile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid profile: {0}")]
    Invalid(String),
}

/// Uniform pixel correction for one counterpart's fields and choices
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetCorrection {
    pub dx: f32,
    pub dy: f32,
}

/// One named choice group and how to auto-select within it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioGroupRule {
    /// Group name
    pub key: String,
    /// First option number in the group (inclusive)
    pub first: u32,
    /// Last option number in the group (inclusive)
    pub last: u32,
    /// Record value that drives auto-selection
    #[serde(default)]
    pub source: Option<SourceBinding>,
    /// Record value -> option number
    #[serde(default)]
    pub values: HashMap<String, String>,
    /// Option to select when the record has no value
    #[serde(default)]
    pub default_option: Option<String>,
}

impl RadioGroupRule {
    pub fn contains(&self, option: u32) -> bool {
        (self.first..=self.last).contains(&option)
    }
}

/// Extraction tuning, in content units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionSettings {
    /// Max vertical distance between runs on the same visual line
    pub line_tolerance: f32,
    /// Gap left before the next field on the same line
    pub field_padding: f32,
    /// Gap left before the right page edge
    pub page_margin: f32,
    /// Smallest width a field may get
    pub min_field_width: f32,
    /// Horizontal window for pairing split choice-token fragments
    pub pair_max_dx: f32,
    /// Vertical window for pairing split choice-token fragments
    pub pair_max_dy: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            line_tolerance: 3.0,
            field_padding: 4.0,
            page_margin: 20.0,
            min_field_width: 30.0,
            pair_max_dx: 60.0,
            pair_max_dy: 20.0,
        }
    }
}

/// Integrator-supplied configuration for one template family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillProfile {
    #[serde(default)]
    pub name: String,
    /// Normalized interactive-field name -> binding
    #[serde(default)]
    pub field_names: HashMap<String, SourceBinding>,
    /// Token text (inside the braces) -> binding
    #[serde(default)]
    pub tokens: HashMap<String, SourceBinding>,
    #[serde(default)]
    pub radio_groups: Vec<RadioGroupRule>,
    /// Normalized counterpart last name -> correction
    #[serde(default)]
    pub offsets: HashMap<String, OffsetCorrection>,
    #[serde(default)]
    pub extraction: ExtractionSettings,
}

impl FillProfile {
    /// Parse and validate a profile
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let profile: FillProfile = serde_json::from_str(json)?;
        profile.normalized()
    }

    /// Load a profile from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Normalize table keys and check group ranges
    pub fn normalized(mut self) -> Result<Self, ProfileError> {
        self.field_names = self
            .field_names
            .into_iter()
            .map(|(name, binding)| (normalize_name(&name), binding))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        self.offsets = self
            .offsets
            .into_iter()
            .map(|(name, offset)| (normalize_name(&name), offset))
            .collect();

        for (i, rule) in self.radio_groups.iter().enumerate() {
            if rule.first > rule.last {
                return Err(ProfileError::Invalid(format!(
                    "radio group '{}' has first > last",
                    rule.key
                )));
            }
            if let Some(other) = self.radio_groups[..i]
                .iter()
                .find(|o| o.first <= rule.last && rule.first <= o.last)
            {
                return Err(ProfileError::Invalid(format!(
                    "radio groups '{}' and '{}' overlap",
                    other.key, rule.key
                )));
            }
        }

        Ok(self)
    }

    /// Placement correction for the record's counterpart
    pub fn offset_for(&self, record: &SourceRecord) -> OffsetCorrection {
        record
            .counterpart
            .get("lastName")
            .map(|name| normalize_name(name))
            .and_then(|key| self.offsets.get(&key).copied())
            .unwrap_or_default()
    }
}

impl Default for FillProfile {
    fn default() -> Self {
        let binding = |namespace: Namespace, key: &str| SourceBinding::new(namespace, key);
        let subject = |key: &str| binding(Namespace::Subject, key);
        let counterpart = |key: &str| binding(Namespace::Counterpart, key);
        let meta = |key: &str| binding(Namespace::Meta, key);

        let tokens: HashMap<String, SourceBinding> = [
            ("firstName", subject("firstName")),
            ("middleName", subject("middleName")),
            ("lastName", subject("lastName")),
            ("dateOfBirth", subject("dateOfBirth")),
            ("address", subject("address")),
            ("city", subject("city")),
            ("state", subject("state")),
            ("zip", subject("zip")),
            ("phone", subject("phone")),
            ("email", subject("email")),
            ("idNumber", subject("idNumber")),
            ("providerFirstName", counterpart("firstName")),
            ("providerLastName", counterpart("lastName")),
            ("licenseNumber", counterpart("licenseNumber")),
            ("npi", counterpart("npi")),
            ("providerPhone", counterpart("phone")),
            ("date", meta("generatedDate")),
            ("generatedDate", meta("generatedDate")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let field_names: HashMap<String, SourceBinding> = [
            ("firstname", subject("firstName")),
            ("fname", subject("firstName")),
            ("givenname", subject("firstName")),
            ("lastname", subject("lastName")),
            ("lname", subject("lastName")),
            ("surname", subject("lastName")),
            ("middlename", subject("middleName")),
            ("dob", subject("dateOfBirth")),
            ("dateofbirth", subject("dateOfBirth")),
            ("birthdate", subject("dateOfBirth")),
            ("address", subject("address")),
            ("mailingaddress", subject("address")),
            ("streetaddress", subject("address")),
            ("city", subject("city")),
            ("state", subject("state")),
            ("zip", subject("zip")),
            ("zipcode", subject("zip")),
            ("phone", subject("phone")),
            ("phonenumber", subject("phone")),
            ("email", subject("email")),
            ("idnumber", subject("idNumber")),
            ("identificationnumber", subject("idNumber")),
            ("idno", subject("idNumber")),
            ("licensenumber", counterpart("licenseNumber")),
            ("licenseno", counterpart("licenseNumber")),
            ("npi", counterpart("npi")),
            ("date", meta("generatedDate")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            name: "default".to_string(),
            field_names,
            tokens,
            radio_groups: Vec::new(),
            offsets: HashMap::new(),
            extraction: ExtractionSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROFILE: &str = r#"{
        "name": "intake",
        "fieldNames": { "Mailing Address": "subject.address" },
        "tokens": { "firstName": "subject.firstName" },
        "radioGroups": [
            {
                "key": "disability",
                "first": 7,
                "last": 12,
                "source": "subject.disabilityCondition",
                "values": { "C": "9" },
                "defaultOption": "7"
            }
        ],
        "offsets": { "O'Brien": { "dx": 2.0, "dy": -1.5 } },
        "extraction": { "lineTolerance": 2.5 }
    }"#;

    #[test]
    fn test_parse_normalizes_keys() {
        let profile = FillProfile::from_json(PROFILE).unwrap();

        assert!(profile.field_names.contains_key("mailingaddress"));
        assert!(profile.offsets.contains_key("obrien"));
        assert_eq!(profile.extraction.line_tolerance, 2.5);
        assert_eq!(profile.extraction.field_padding, 4.0);
        assert!(profile.radio_groups[0].contains(9));
        assert!(!profile.radio_groups[0].contains(13));
    }

    #[test]
    fn test_offset_for_counterpart() {
        let profile = FillProfile::from_json(PROFILE).unwrap();
        let record = SourceRecord::default().with(Namespace::Counterpart, "lastName", "O'Brien");

        assert_eq!(
            profile.offset_for(&record),
            OffsetCorrection { dx: 2.0, dy: -1.5 }
        );
        assert_eq!(
            profile.offset_for(&SourceRecord::default()),
            OffsetCorrection::default()
        );
    }

    #[test]
    fn test_rejects_overlapping_groups() {
        let json = r#"{ "radioGroups": [
            { "key": "a", "first": 1, "last": 5 },
            { "key": "b", "first": 5, "last": 9 }
        ] }"#;
        assert!(matches!(
            FillProfile::from_json(json),
            Err(ProfileError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let json = r#"{ "radioGroups": [ { "key": "a", "first": 9, "last": 1 } ] }"#;
        assert!(FillProfile::from_json(json).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROFILE.as_bytes()).unwrap();

        let profile = FillProfile::from_path(file.path()).unwrap();
        assert_eq!(profile.name, "intake");
        assert!(FillProfile::from_path("/nonexistent/profile.json").is_err());
    }

    #[test]
    fn test_default_profile_round_trips() {
        let profile = FillProfile::default();
        let json = serde_json::to_string(&profile).unwrap();
        assert_eq!(FillProfile::from_json(&json).unwrap(), profile);
    }

    #[test]
    fn test_example_profile_parses() {
        let json = include_str!("../config/profile.example.json");
        let profile = FillProfile::from_json(json).unwrap();

        assert_eq!(profile.radio_groups.len(), 2);
        assert!(profile.field_names.contains_key("mailingaddress"));
        assert!(profile.field_names.contains_key("license"));
        assert!(profile.offsets.contains_key("okafor"));
    }
}
