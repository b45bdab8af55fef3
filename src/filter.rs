use std::collections::HashSet;

use crate::config::FilterRules;
use crate::entity::EntityId;

/// Compiled half of the include/exclude filter.
#[derive(Debug, Default, Clone)]
struct Rules {
    domains: HashSet<String>,
    entities: HashSet<String>,
    globs: Vec<String>,
}

impl Rules {
    fn new(rules: &FilterRules) -> Self {
        Self {
            domains: rules.domains.iter().cloned().collect(),
            entities: rules.entities.iter().cloned().collect(),
            globs: rules.entity_globs.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.entities.is_empty() && self.globs.is_empty()
    }

    fn matches(&self, entity_id: &EntityId) -> bool {
        let full = entity_id.to_string();
        self.entities.contains(&full)
            || self.domains.contains(entity_id.domain())
            || self.globs.iter().any(|glob| glob_match(glob, &full))
    }
}

/// Decides which entities are published.
///
/// An entity passes when no include rule is configured or one of them
/// matches, and no exclude rule matches. Exclusion wins.
#[derive(Debug, Default, Clone)]
pub struct EntityFilter {
    include: Rules,
    exclude: Rules,
}

impl EntityFilter {
    pub fn new(include: &FilterRules, exclude: &FilterRules) -> Self {
        Self {
            include: Rules::new(include),
            exclude: Rules::new(exclude),
        }
    }

    /// Accepts every entity.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn has_includes(&self) -> bool {
        !self.include.is_empty()
    }

    pub fn matches(&self, entity_id: &EntityId) -> bool {
        if self.exclude.matches(entity_id) {
            return false;
        }
        !self.has_includes() || self.include.matches(entity_id)
    }
}

/// Shell-style match: `*` is any run of characters, `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Last `*` seen and the text position it currently absorbs up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, absorbed)) = backtrack {
            p = star + 1;
            t = absorbed + 1;
            backtrack = Some((star, absorbed + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        raw.parse().unwrap()
    }

    fn rules(domains: &[&str], entities: &[&str], globs: &[&str]) -> FilterRules {
        FilterRules {
            domains: domains.iter().map(|s| s.to_string()).collect(),
            entities: entities.iter().map(|s| s.to_string()).collect(),
            entity_globs: globs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("sensor.*", "sensor.temp"));
        assert!(glob_match("*_temp", "sensor.kitchen_temp"));
        assert!(glob_match("light.?itchen", "light.kitchen"));
        assert!(glob_match("*.*a*b", "x.aab"));
        assert!(!glob_match("sensor.*", "light.temp"));
        assert!(!glob_match("light.?", "light.ab"));
    }

    #[test]
    fn test_no_rules_allows_everything() {
        let filter = EntityFilter::allow_all();
        assert!(!filter.has_includes());
        assert!(filter.matches(&id("light.kitchen")));
        assert!(filter.matches(&id("sensor.temp")));
    }

    #[test]
    fn test_include_only() {
        let filter = EntityFilter::new(
            &rules(&["light"], &["switch.pump"], &["sensor.*_temp"]),
            &FilterRules::default(),
        );
        assert!(filter.has_includes());
        assert!(filter.matches(&id("light.kitchen")));
        assert!(filter.matches(&id("switch.pump")));
        assert!(filter.matches(&id("sensor.garden_temp")));
        assert!(!filter.matches(&id("switch.fan")));
        assert!(!filter.matches(&id("sensor.garden_humidity")));
    }

    #[test]
    fn test_exclude_only() {
        let filter = EntityFilter::new(&FilterRules::default(), &rules(&["sensor"], &[], &[]));
        assert!(!filter.has_includes());
        assert!(!filter.matches(&id("sensor.temp")));
        assert!(filter.matches(&id("light.kitchen")));
    }

    #[test]
    fn test_exclude_wins() {
        let filter = EntityFilter::new(
            &rules(&["light"], &[], &[]),
            &rules(&[], &["light.porch"], &[]),
        );
        assert!(filter.matches(&id("light.kitchen")));
        assert!(!filter.matches(&id("light.porch")));
    }
}
