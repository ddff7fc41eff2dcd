//! Rule matching: file path -> ordered stages.

use std::path::Path;

use path_clean::PathClean;
use tote_config::{Rule, StageRef};

use crate::paths::to_slash;

/// Everything the matching rules say about one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMatch {
    /// Stages of every matching rule, concatenated in declaration order
    pub stages: Vec<StageRef>,
    /// Output template of the last matching rule that declares one
    pub output: Option<String>,
}

impl RuleMatch {
    /// No rule matched; the file is copied through unchanged.
    pub fn is_pass_through(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Stages for `file` (relative to the project root). Empty means pass-through.
pub fn resolve(file: &Path, rules: &[Rule]) -> Vec<StageRef> {
    match_file(file, rules).stages
}

pub fn match_file(file: &Path, rules: &[Rule]) -> RuleMatch {
    let file = file.clean();
    let slash = to_slash(&file);

    let mut result = RuleMatch::default();
    for rule in rules.iter().filter(|rule| applies(rule, &file, &slash)) {
        result.stages.extend(rule.stages.iter().cloned());
        if let Some(output) = &rule.output {
            result.output = Some(output.clone());
        }
    }
    result
}

fn applies(rule: &Rule, file: &Path, slash: &str) -> bool {
    if !rule.test.is_match(slash) {
        return false;
    }
    if !rule.include.is_empty() && !rule.include.iter().any(|prefix| under(file, prefix)) {
        return false;
    }
    !rule.exclude.iter().any(|prefix| under(file, prefix))
}

// Component-wise: `src` covers `src/a.js` but not `srcx/a.js`.
fn under(file: &Path, prefix: &Path) -> bool {
    file.starts_with(prefix.clean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tote_config::MatchPattern;

    fn rule(test: &str) -> Rule {
        Rule::new(MatchPattern::new(test).unwrap())
    }

    fn names(stages: &[StageRef]) -> Vec<&str> {
        stages.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn scss_rule_resolves_stages_in_order() {
        let rules = vec![
            rule(r"\.scss$")
                .include("src")
                .exclude("node_modules")
                .stage(StageRef::new("sass-compile"))
                .stage(StageRef::new("autoprefix"))
                .output("css/[name].css"),
        ];

        let matched = match_file(Path::new("src/x.scss"), &rules);
        assert_eq!(names(&matched.stages), vec!["sass-compile", "autoprefix"]);
        assert_eq!(matched.output.as_deref(), Some("css/[name].css"));
    }

    #[test]
    fn unmatched_file_passes_through() {
        let rules = vec![rule(r"\.js$").stage(StageRef::new("babel"))];
        let matched = match_file(Path::new("src/README.md"), &rules);
        assert!(matched.is_pass_through());
        assert_eq!(matched.output, None);
    }

    #[test]
    fn multiple_rules_concatenate_in_declaration_order() {
        let rules = vec![
            rule(r"\.css$").stage(StageRef::new("extract")),
            rule(r"\.(css|scss)$").stage(StageRef::new("css-loader")).output("a/[name].css"),
            rule(r"\.css$").stage(StageRef::new("minify")).output("b/[name].css"),
        ];
        let matched = match_file(Path::new("src/site.css"), &rules);
        assert_eq!(names(&matched.stages), vec!["extract", "css-loader", "minify"]);
        assert_eq!(matched.output.as_deref(), Some("b/[name].css"));
    }

    #[test]
    fn include_is_a_path_prefix_not_a_string_prefix() {
        let rules = vec![rule(r"\.js$").include("./src").stage(StageRef::new("babel"))];
        assert_eq!(resolve(Path::new("src/app.js"), &rules).len(), 1);
        assert!(resolve(Path::new("srcx/app.js"), &rules).is_empty());
    }

    #[test]
    fn exclude_wins_over_pattern() {
        let rules = vec![
            rule(r"\.js$")
                .exclude("node_modules")
                .stage(StageRef::new("babel")),
        ];
        assert!(resolve(Path::new("node_modules/vue/index.js"), &rules).is_empty());
        assert_eq!(resolve(Path::new("lib/index.js"), &rules).len(), 1);
    }

    #[test]
    fn resolve_is_stable() {
        let rules = vec![
            rule(r"\.vue$").stage(StageRef::new("vue")),
            rule(r".*").stage(StageRef::new("identity")),
        ];
        let file = Path::new("src/App.vue");
        assert_eq!(resolve(file, &rules), resolve(file, &rules));
    }
}
