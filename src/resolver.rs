//! Field resolution
//!
//! Maps tokens and interactive-field names to [`SourceBinding`]s and
//! derives auto-fill values. Every lookup is pure and total: anything the
//! profile does not cover resolves to `None` (unbound).

use std::sync::Arc;

use crate::profile::{FillProfile, OffsetCorrection, RadioGroupRule};
use crate::record::{SourceBinding, SourceRecord};

/// Lowercase, ASCII-alphanumeric-only form of a name
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Resolves names against a [`FillProfile`]
#[derive(Debug, Clone)]
pub struct FieldResolver {
    profile: Arc<FillProfile>,
}

impl FieldResolver {
    pub fn new(profile: Arc<FillProfile>) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &FillProfile {
        &self.profile
    }

    /// Binding for a bracket token, by exact token text
    pub fn resolve_token(&self, token: &str) -> Option<SourceBinding> {
        self.profile.tokens.get(token).cloned()
    }

    /// Binding for an interactive field name
    ///
    /// Fully qualified names (`form.section.field`) are tried whole first,
    /// then by their terminal segment.
    pub fn resolve_field_name(&self, name: &str) -> Option<SourceBinding> {
        let lookup = |n: &str| self.profile.field_names.get(&normalize_name(n)).cloned();
        lookup(name).or_else(|| {
            name.rsplit_once('.')
                .and_then(|(_, terminal)| lookup(terminal))
        })
    }

    pub fn is_known_field_name(&self, name: &str) -> bool {
        self.resolve_field_name(name).is_some()
    }

    /// Token names the profile knows, in no particular order
    pub fn known_tokens(&self) -> impl Iterator<Item = &str> {
        self.profile.tokens.keys().map(String::as_str)
    }

    /// Initial value of a field: the bound record value or blank
    pub fn value_for(&self, binding: Option<&SourceBinding>, record: &SourceRecord) -> String {
        binding
            .and_then(|b| record.get(b))
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Configured group containing option number `option`
    pub fn rule_for_option(&self, option: u32) -> Option<&RadioGroupRule> {
        self.profile.radio_groups.iter().find(|r| r.contains(option))
    }

    pub fn rule(&self, group_key: &str) -> Option<&RadioGroupRule> {
        self.profile
            .radio_groups
            .iter()
            .find(|r| r.key == group_key)
    }

    /// Group key for a choice token
    ///
    /// Configured numeric ranges win. Otherwise a literal group label from
    /// the token (`{radio_sex_2}` -> `sex`) is used, and bare `id` tokens
    /// fall into a group of their own.
    pub fn group_for_option(&self, label: &str, option: u32) -> String {
        if let Some(rule) = self.rule_for_option(option) {
            return rule.key.clone();
        }
        let label = label.trim();
        if !label.is_empty() && !label.eq_ignore_ascii_case("id") {
            return label.to_string();
        }
        format!("option_{}", option)
    }

    /// Option a group should start with, from the record or the default
    pub fn autoselect_option(&self, rule: &RadioGroupRule, record: &SourceRecord) -> Option<String> {
        let value = rule.source.as_ref().and_then(|b| record.get(b));
        match value {
            Some(value) => rule
                .values
                .get(value)
                .or_else(|| rule.values.get(value.trim()))
                .cloned()
                .or_else(|| {
                    // A record may already carry the option number itself
                    value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| rule.contains(*n))
                        .map(|n| n.to_string())
                }),
            None => rule.default_option.clone(),
        }
    }

    pub fn offset_for(&self, record: &SourceRecord) -> OffsetCorrection {
        self.profile.offset_for(record)
    }
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self::new(Arc::new(FillProfile::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Namespace;
    use std::collections::HashMap;

    fn resolver_with_group() -> FieldResolver {
        let mut profile = FillProfile::default();
        profile.radio_groups.push(RadioGroupRule {
            key: "disability".to_string(),
            first: 7,
            last: 12,
            source: Some(SourceBinding::new(Namespace::Subject, "disabilityCondition")),
            values: HashMap::from([("C".to_string(), "9".to_string())]),
            default_option: Some("7".to_string()),
        });
        FieldResolver::new(Arc::new(profile))
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Mailing Address"), "mailingaddress");
        assert_eq!(normalize_name("I.D. No_"), "idno");
        assert_eq!(normalize_name("--"), "");
    }

    #[test]
    fn test_spellings_share_a_binding() {
        let resolver = FieldResolver::default();
        let expected = Some(SourceBinding::new(Namespace::Subject, "idNumber"));

        assert_eq!(resolver.resolve_field_name("ID Number"), expected);
        assert_eq!(resolver.resolve_field_name("Identification Number"), expected);
        assert_eq!(resolver.resolve_field_name("id_no"), expected);
    }

    #[test]
    fn test_qualified_name_falls_back_to_terminal() {
        let resolver = FieldResolver::default();
        assert_eq!(
            resolver.resolve_field_name("form1.page1.First Name"),
            Some(SourceBinding::new(Namespace::Subject, "firstName"))
        );
    }

    #[test]
    fn test_unbound_is_total() {
        let resolver = FieldResolver::default();
        assert_eq!(resolver.resolve_token("favoriteColor"), None);
        assert_eq!(resolver.resolve_field_name("Signature"), None);
        assert_eq!(resolver.value_for(None, &SourceRecord::default()), "");
    }

    #[test]
    fn test_token_lookup_is_exact() {
        let resolver = FieldResolver::default();
        assert!(resolver.resolve_token("firstName").is_some());
        assert!(resolver.resolve_token("firstname").is_none());
    }

    #[test]
    fn test_group_for_option() {
        let resolver = resolver_with_group();
        assert_eq!(resolver.group_for_option("id", 9), "disability");
        assert_eq!(resolver.group_for_option("sex", 2), "sex");
        assert_eq!(resolver.group_for_option("id", 30), "option_30");
    }

    #[test]
    fn test_autoselect_from_value_table() {
        let resolver = resolver_with_group();
        let rule = resolver.rule("disability").unwrap();
        let record = SourceRecord::default().with(Namespace::Subject, "disabilityCondition", "C");

        assert_eq!(resolver.autoselect_option(rule, &record), Some("9".to_string()));
    }

    #[test]
    fn test_autoselect_default_when_absent() {
        let resolver = resolver_with_group();
        let rule = resolver.rule("disability").unwrap();

        assert_eq!(
            resolver.autoselect_option(rule, &SourceRecord::default()),
            Some("7".to_string())
        );
    }

    #[test]
    fn test_autoselect_unmapped_value() {
        let resolver = resolver_with_group();
        let rule = resolver.rule("disability").unwrap();
        let record = SourceRecord::default().with(Namespace::Subject, "disabilityCondition", "Z");

        assert_eq!(resolver.autoselect_option(rule, &record), None);
    }
}
