//! The rules engine (C5): JSON-driven include/exclude filtering over
//! `(operation, resourceType, name)` triples, per §4.5.

mod glob;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use pie4k_types::{PieError, PieResult};
use serde::Deserialize;

/// One rule record, as it appears in a rules JSON file (§3 "Rule").
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(rename = "resourceType", default = "default_wildcard")]
    pub resource_type: String,
    #[serde(default)]
    pub operations: BTreeSet<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_wildcard() -> String {
    "*".to_string()
}

/// A rule JSON file's top level is either a single rule object or an array
/// of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleFile {
    One(Rule),
    Many(Vec<Rule>),
}

/// A rule plus the filename-derived context it loaded with (§4.5 "Filename
/// stem encodes default context"). `name_filter` is `Some` only for
/// resource-level files (`<NAME>.<TYPE>.json`), gating applicability to
/// that one resource name regardless of the rule's own include/exclude
/// globs.
struct LoadedRule {
    rule: Rule,
    name_filter: Option<String>,
}

impl LoadedRule {
    fn applicable(&self, operation: &str, resource_type: &str, name: &str) -> bool {
        let type_ok = self.rule.resource_type == "*"
            || self.rule.resource_type.eq_ignore_ascii_case(resource_type);
        let op_ok = self.rule.operations.is_empty()
            || self
                .rule
                .operations
                .iter()
                .any(|o| o == "*" || o.eq_ignore_ascii_case(operation));
        let name_ok = match &self.name_filter {
            Some(filter) => filter.eq_ignore_ascii_case(name),
            None => true,
        };
        type_ok && op_ok && name_ok
    }

    /// `None` means this rule did not render a verdict for this query
    /// (§4.5 "no decision from this rule").
    fn verdict(&self, name: &str, resource_type: &str) -> Option<bool> {
        let with_ext = format!("{name}.{resource_type}");
        let candidates = [name, with_ext.as_str()];

        if self
            .rule
            .exclude
            .iter()
            .any(|pat| candidates.iter().any(|c| glob::matches(pat, c)))
        {
            return Some(false);
        }
        if self.rule.include.is_empty()
            || self
                .rule
                .include
                .iter()
                .any(|pat| candidates.iter().any(|c| glob::matches(pat, c)))
        {
            return Some(true);
        }
        None
    }
}

/// The full set of rules loaded for a run, in file-then-array order (§4.5
/// "Load order").
pub struct RuleSet {
    rules: Vec<LoadedRule>,
}

impl RuleSet {
    pub fn empty() -> RuleSet {
        RuleSet { rules: Vec::new() }
    }

    /// Load order (§4.5): an explicit path if given, else a root-level
    /// `rules.json`, else every `*.json` under `rules/` sorted
    /// lexicographically. A malformed file is logged and skipped
    /// (`RulesParseError`, fail-open per §7).
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> PieResult<RuleSet> {
        if let Some(path) = explicit_path {
            return Ok(RuleSet { rules: load_file(path)? });
        }

        let root_rules = root.join("rules.json");
        if root_rules.is_file() {
            return Ok(RuleSet { rules: load_file(&root_rules)? });
        }

        let rules_dir = root.join("rules");
        if !rules_dir.is_dir() {
            return Ok(RuleSet::empty());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&rules_dir)
            .map_err(|e| PieError::io(rules_dir.display().to_string(), e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut rules = Vec::new();
        for path in paths {
            match load_file(&path) {
                Ok(mut loaded) => rules.append(&mut loaded),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping malformed rules file"),
            }
        }
        Ok(RuleSet { rules })
    }

    /// §4.5 "Rule match"/"Last decision wins": walk applicable rules in
    /// order, keep the last verdict any of them renders. Deny if at least
    /// one rule applied but none rendered a verdict; allow (fail-open) if
    /// no rule applied at all.
    pub fn allows(&self, operation: &str, resource_type: &str, name: &str) -> bool {
        let mut any_applicable = false;
        let mut decision = None;

        for loaded in &self.rules {
            if !loaded.applicable(operation, resource_type, name) {
                continue;
            }
            any_applicable = true;
            if let Some(verdict) = loaded.verdict(name, resource_type) {
                decision = Some(verdict);
            }
        }

        decision.unwrap_or(!any_applicable)
    }
}

fn load_file(path: &Path) -> PieResult<Vec<LoadedRule>> {
    let raw = std::fs::read_to_string(path).map_err(|e| PieError::io(path.display().to_string(), e))?;
    let parsed: RuleFile = serde_json::from_str(&raw)
        .map_err(|e| PieError::RulesParseError(format!("{}: {e}", path.display())))?;
    let rules = match parsed {
        RuleFile::One(r) => vec![r],
        RuleFile::Many(rs) => rs,
    };

    let name_filter = filename_name_filter(path);
    Ok(rules.into_iter().map(|rule| LoadedRule { rule, name_filter: name_filter.clone() }).collect())
}

/// `<TYPE>.json` has a one-component stem (type-level, no name filter);
/// `<NAME>.<TYPE>.json` has two (resource-level, filters to `NAME`).
fn filename_name_filter(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let parts: Vec<&str> = stem.split('.').collect();
    match parts.as_slice() {
        [_type] => None,
        [name, _type] => Some(name.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_scenario_last_rule_wins_after_both_match() {
        let json = r#"[
            {"resourceType":"2DA","operations":["upscale"],"include":["START"],"exclude":[]},
            {"resourceType":"2DA","operations":["upscale"],"include":[],"exclude":["START"]}
        ]"#;
        let rules: Vec<Rule> = serde_json::from_str(json).unwrap();
        let loaded: Vec<LoadedRule> =
            rules.into_iter().map(|rule| LoadedRule { rule, name_filter: None }).collect();
        let set = RuleSet { rules: loaded };

        assert!(!set.allows("upscale", "2DA", "START"));
        assert!(set.allows("extract", "2DA", "START"));
    }

    #[test]
    fn p3_exclude_wins_over_include_within_the_same_rule() {
        let rule = Rule {
            resource_type: "*".into(),
            operations: BTreeSet::new(),
            include: vec!["*".into()],
            exclude: vec!["BAD*".into()],
        };
        let set = RuleSet { rules: vec![LoadedRule { rule, name_filter: None }] };
        assert!(!set.allows("extract", "BMP", "BADNAME"));
        assert!(set.allows("extract", "BMP", "GOODNAME"));
    }

    #[test]
    fn no_applicable_rule_is_fail_open() {
        let rule = Rule {
            resource_type: "BAM".into(),
            operations: BTreeSet::new(),
            include: vec![],
            exclude: vec![],
        };
        let set = RuleSet { rules: vec![LoadedRule { rule, name_filter: None }] };
        assert!(set.allows("extract", "BMP", "ANYTHING"));
    }

    #[test]
    fn b1_type_file_loads_before_resource_file() {
        let tmp = tempfile::tempdir().unwrap();
        let rules_dir = tmp.path().join("rules");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(
            rules_dir.join("2DA.json"),
            r#"{"resourceType":"2DA","operations":["upscale"],"include":[],"exclude":["START"]}"#,
        )
        .unwrap();
        std::fs::write(
            rules_dir.join("START.2DA.json"),
            r#"{"resourceType":"2DA","operations":["upscale"],"include":["*"],"exclude":[]}"#,
        )
        .unwrap();

        let set = RuleSet::load(None, tmp.path()).unwrap();
        // Resource-level file loads second (lexicographically after the
        // type-level file) and wins the last-decision-wins tiebreak.
        assert!(set.allows("upscale", "2DA", "START"));
    }

    #[test]
    fn resource_level_name_filter_does_not_apply_to_other_names() {
        let tmp = tempfile::tempdir().unwrap();
        let rules_dir = tmp.path().join("rules");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(
            rules_dir.join("START.2DA.json"),
            r#"{"resourceType":"2DA","operations":["upscale"],"include":[],"exclude":["*"]}"#,
        )
        .unwrap();

        let set = RuleSet::load(None, tmp.path()).unwrap();
        assert!(!set.allows("upscale", "2DA", "START"));
        // The rule only loaded for START; OTHER falls through to fail-open.
        assert!(set.allows("upscale", "2DA", "OTHER"));
    }

    #[test]
    fn malformed_file_is_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let rules_dir = tmp.path().join("rules");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(rules_dir.join("BROKEN.json"), "{not valid json").unwrap();
        let set = RuleSet::load(None, tmp.path()).unwrap();
        assert!(set.allows("extract", "BMP", "ANY"));
    }
}
