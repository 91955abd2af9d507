//! Hand-rolled robots.txt parser.
//!
//! Parse errors never propagate — a malformed file just yields
//! [`RobotsRules::empty`] (an empty ruleset, meaning every path is allowed to
//! every UA), per the gate's "parser error → empty rules" failure mode.

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    disallow: Vec<String>,
    allow: Vec<String>,
}

impl Group {
    fn is_path_allowed(&self, path: &str) -> bool {
        let mut best_len: i64 = -1;
        let mut allowed = true;

        for rule in &self.disallow {
            if !rule.is_empty() && path.starts_with(rule.as_str()) && rule.len() as i64 > best_len {
                best_len = rule.len() as i64;
                allowed = false;
            }
        }
        for rule in &self.allow {
            if path.starts_with(rule.as_str()) && rule.len() as i64 > best_len {
                best_len = rule.len() as i64;
                allowed = true;
            }
        }
        allowed
    }
}

/// Process-wide read-only snapshot of parsed robots.txt rules. Reloads build
/// a fresh `RobotsRules` and swap the `Arc` atomically — this value itself
/// is never mutated in place (see `SPEC_FULL.md` §5).
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

impl RobotsRules {
    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;
        let mut last_was_agent = false;

        for raw_line in content.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else { continue };
            let key = key.trim().to_lowercase();
            let value = value.trim().to_string();

            match key.as_str() {
                "user-agent" => {
                    if !last_was_agent {
                        if let Some(g) = current.take() {
                            groups.push(g);
                        }
                        current = Some(Group::default());
                    }
                    current.get_or_insert_with(Group::default).agents.push(value.to_lowercase());
                    last_was_agent = true;
                }
                "disallow" => {
                    if let Some(g) = current.as_mut() {
                        g.disallow.push(value);
                    }
                    last_was_agent = false;
                }
                "allow" => {
                    if let Some(g) = current.as_mut() {
                        g.allow.push(value);
                    }
                    last_was_agent = false;
                }
                _ => last_was_agent = false,
            }
        }
        if let Some(g) = current.take() {
            groups.push(g);
        }

        Self { groups }
    }

    fn matching_group(&self, user_agent: &str) -> Option<&Group> {
        let ua_lower = user_agent.to_lowercase();
        let mut best: Option<&Group> = None;
        let mut best_specificity = 0usize;

        for g in &self.groups {
            for agent in &g.agents {
                if agent == "*" {
                    continue;
                }
                if ua_lower.contains(agent.as_str()) && agent.len() > best_specificity {
                    best_specificity = agent.len();
                    best = Some(g);
                }
            }
        }

        best.or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }

    /// Whether `path` is allowed for `user_agent`. No matching group at all
    /// (including an empty ruleset) means unrestricted.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        match self.matching_group(user_agent) {
            Some(g) => g.is_path_allowed(path),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ruleset_allows_everything() {
        let rules = RobotsRules::empty();
        assert!(rules.is_allowed("Googlebot", "/private"));
    }

    #[test]
    fn specific_group_disallow_is_honored() {
        let rules = RobotsRules::parse(
            "User-agent: Googlebot\nDisallow: /private\n\nUser-agent: *\nDisallow: /admin\n",
        );
        assert!(!rules.is_allowed("Googlebot/2.1", "/private/data"));
        assert!(rules.is_allowed("Googlebot/2.1", "/public"));
    }

    #[test]
    fn wildcard_group_applies_when_no_specific_match() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /admin\n");
        assert!(!rules.is_allowed("SomeOtherBot", "/admin/panel"));
        assert!(rules.is_allowed("SomeOtherBot", "/"));
    }

    #[test]
    fn allow_overrides_disallow_when_more_specific() {
        let rules = RobotsRules::parse(
            "User-agent: *\nDisallow: /docs\nAllow: /docs/public\n",
        );
        assert!(rules.is_allowed("anything", "/docs/public/page"));
        assert!(!rules.is_allowed("anything", "/docs/secret"));
    }

    #[test]
    fn malformed_lines_are_skipped_without_panicking() {
        let rules = RobotsRules::parse("not a valid line\nUser-agent: *\nDisallow: /x\n");
        assert!(!rules.is_allowed("anyone", "/x/y"));
    }

    #[test]
    fn comments_are_stripped() {
        let rules = RobotsRules::parse("User-agent: * # applies to all\nDisallow: /secret # no crawling\n");
        assert!(!rules.is_allowed("anyone", "/secret"));
    }
}
