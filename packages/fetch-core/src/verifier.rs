//! Content verification (spec §4.9). Runs after extraction, before a tier's
//! result is accepted by the Executor; `critical` failures can trigger
//! escalation to the next tier, `warning`s never fail the fetch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::walk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Assertion {
    FieldExists { fields: Vec<String> },
    FieldMatches { field: String, #[serde(with = "regex_as_str")] regex: regex::Regex },
    MinLength { field: String, min: usize },
    ExcludesText { field: String, text: String },
}

mod regex_as_str {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(re: &Regex, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(re.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Regex, D::Error> {
        let raw = String::deserialize(d)?;
        Regex::new(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub assertion: Assertion,
    pub severity: Severity,
    pub retryable: bool,
}

impl Check {
    pub fn field_exists(fields: impl IntoIterator<Item = impl Into<String>>, severity: Severity, retryable: bool) -> Self {
        Self {
            assertion: Assertion::FieldExists {
                fields: fields.into_iter().map(Into::into).collect(),
            },
            severity,
            retryable,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    pub errors: Vec<String>,
    pub confidence: f32,
    pub checked_fields: Vec<String>,
    pub missing_fields: Vec<String>,
}

/// Outcome class the Executor's `Validate` state switches on (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Pass,
    Escalate,
    Fail,
}

fn eval_one(content: &Value, check: &Check, checked: &mut Vec<String>, missing: &mut Vec<String>) -> Option<String> {
    match &check.assertion {
        Assertion::FieldExists { fields } => {
            let mut failed = Vec::new();
            for f in fields {
                checked.push(f.clone());
                if walk::walk(content, f).is_none() {
                    missing.push(f.clone());
                    failed.push(f.clone());
                }
            }
            if failed.is_empty() {
                None
            } else {
                Some(format!("missing required field(s): {}", failed.join(", ")))
            }
        }
        Assertion::FieldMatches { field, regex } => {
            checked.push(field.clone());
            match walk::walk_str(content, field) {
                Some(s) if regex.is_match(s) => None,
                Some(s) => Some(format!("field '{field}' value '{s}' did not match pattern")),
                None => {
                    missing.push(field.clone());
                    Some(format!("field '{field}' missing, cannot match pattern"))
                }
            }
        }
        Assertion::MinLength { field, min } => {
            checked.push(field.clone());
            match walk::walk_str(content, field) {
                Some(s) if s.len() >= *min => None,
                Some(s) => Some(format!("field '{field}' length {} below minimum {min}", s.len())),
                None => {
                    missing.push(field.clone());
                    Some(format!("field '{field}' missing, cannot check length"))
                }
            }
        }
        Assertion::ExcludesText { field, text } => {
            checked.push(field.clone());
            match walk::walk_str(content, field) {
                Some(s) if !s.contains(text.as_str()) => None,
                Some(_) => Some(format!("field '{field}' contains excluded text '{text}'")),
                None => None,
            }
        }
    }
}

/// Run every check against `content`, returning the aggregate result plus
/// the escalation/fail classification the Executor needs.
pub fn verify(content: &Value, checks: &[Check], tiers_remaining: bool) -> (CheckResult, ValidationOutcome) {
    if checks.is_empty() {
        return (
            CheckResult {
                passed: true,
                errors: vec![],
                confidence: 1.0,
                checked_fields: vec![],
                missing_fields: vec![],
            },
            ValidationOutcome::Pass,
        );
    }

    let mut errors = Vec::new();
    let mut checked_fields = Vec::new();
    let mut missing_fields = Vec::new();
    let mut pass_count = 0usize;
    let mut has_critical_failure = false;
    let mut has_fatal_error = false;

    for check in checks {
        match eval_one(content, check, &mut checked_fields, &mut missing_fields) {
            None => pass_count += 1,
            Some(msg) => {
                errors.push(msg);
                match check.severity {
                    Severity::Warning => {}
                    Severity::Critical => has_critical_failure = true,
                    Severity::Error => {
                        if !check.retryable {
                            has_fatal_error = true;
                        }
                    }
                }
            }
        }
    }

    let confidence = pass_count as f32 / checks.len() as f32;
    let passed = errors.is_empty();

    // an error-severity check only fails the fetch once there's no tier left
    // to retry with; while tiers remain it escalates like a critical failure.
    let outcome = if passed {
        ValidationOutcome::Pass
    } else if !tiers_remaining {
        ValidationOutcome::Fail
    } else if has_critical_failure || has_fatal_error {
        ValidationOutcome::Escalate
    } else {
        // only warnings triggered: never fails the fetch.
        ValidationOutcome::Pass
    };

    checked_fields.sort();
    checked_fields.dedup();
    missing_fields.sort();
    missing_fields.dedup();

    (
        CheckResult {
            passed,
            errors,
            confidence,
            checked_fields,
            missing_fields,
        },
        outcome,
    )
}

/// Shipped check bundles callers reference by topic id instead of building
/// `Check` lists inline (spec §6: "Callers may pass a preset id instead of
/// inline checks").
pub fn preset(id: &str) -> Option<Vec<Check>> {
    let checks = match id {
        "government_portal" => vec![
            Check::field_exists(["title"], Severity::Error, true),
            Check {
                assertion: Assertion::MinLength { field: "markdown".to_string(), min: 200 },
                severity: Severity::Warning,
                retryable: true,
            },
            Check {
                assertion: Assertion::ExcludesText { field: "markdown".to_string(), text: "please enable javascript".to_string() },
                severity: Severity::Critical,
                retryable: true,
            },
        ],
        "visa_immigration" => vec![
            Check::field_exists(["title", "markdown"], Severity::Error, true),
            Check {
                assertion: Assertion::ExcludesText { field: "markdown".to_string(), text: "access denied".to_string() },
                severity: Severity::Critical,
                retryable: true,
            },
        ],
        "legal_document" => vec![
            Check::field_exists(["title", "markdown"], Severity::Error, false),
            Check {
                assertion: Assertion::MinLength { field: "markdown".to_string(), min: 500 },
                severity: Severity::Error,
                retryable: true,
            },
        ],
        "tax_finance" => vec![
            Check::field_exists(["title", "markdown"], Severity::Error, true),
            Check {
                assertion: Assertion::MinLength { field: "markdown".to_string(), min: 150 },
                severity: Severity::Warning,
                retryable: true,
            },
        ],
        "general_research" => vec![
            Check::field_exists(["title"], Severity::Warning, true),
            Check {
                assertion: Assertion::MinLength { field: "markdown".to_string(), min: 100 },
                severity: Severity::Warning,
                retryable: true,
            },
        ],
        _ => return None,
    };
    Some(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_presets_resolve_to_nonempty_check_bundles() {
        for id in ["government_portal", "visa_immigration", "legal_document", "tax_finance", "general_research"] {
            assert!(!preset(id).unwrap().is_empty(), "{id} should resolve");
        }
    }

    #[test]
    fn unknown_preset_id_resolves_to_none() {
        assert!(preset("not_a_real_preset").is_none());
    }

    #[test]
    fn passes_when_all_checks_satisfied() {
        let content = json!({"title": "hello", "body": "a long enough body"});
        let checks = vec![
            Check::field_exists(["title", "body"], Severity::Error, false),
            Check {
                assertion: Assertion::MinLength { field: "body".into(), min: 5 },
                severity: Severity::Warning,
                retryable: false,
            },
        ];
        let (result, outcome) = verify(&content, &checks, true);
        assert!(result.passed);
        assert_eq!(outcome, ValidationOutcome::Pass);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn critical_failure_escalates_when_tiers_remain() {
        let content = json!({});
        let checks = vec![Check::field_exists(["title"], Severity::Critical, true)];
        let (result, outcome) = verify(&content, &checks, true);
        assert!(!result.passed);
        assert_eq!(outcome, ValidationOutcome::Escalate);
        assert_eq!(result.missing_fields, vec!["title".to_string()]);
    }

    #[test]
    fn critical_failure_fails_when_no_tiers_remain() {
        let content = json!({});
        let checks = vec![Check::field_exists(["title"], Severity::Critical, true)];
        let (_, outcome) = verify(&content, &checks, false);
        assert_eq!(outcome, ValidationOutcome::Fail);
    }

    #[test]
    fn warning_never_fails_the_fetch() {
        let content = json!({});
        let checks = vec![Check::field_exists(["subtitle"], Severity::Warning, false)];
        let (_, outcome) = verify(&content, &checks, true);
        assert_eq!(outcome, ValidationOutcome::Pass);
    }

    #[test]
    fn nonretryable_error_escalates_while_tiers_remain() {
        let content = json!({});
        let checks = vec![Check::field_exists(["title"], Severity::Error, false)];
        let (_, outcome) = verify(&content, &checks, true);
        assert_eq!(outcome, ValidationOutcome::Escalate);
    }

    #[test]
    fn nonretryable_error_fails_once_tiers_exhausted() {
        let content = json!({});
        let checks = vec![Check::field_exists(["title"], Severity::Error, false)];
        let (_, outcome) = verify(&content, &checks, false);
        assert_eq!(outcome, ValidationOutcome::Fail);
    }
}
