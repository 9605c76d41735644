//! Built-in product-management framework catalog
//!
//! The store seeds these into its tables on first run and restores them on
//! reset; the sidecar serves them when no frameworks directory is configured.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkDefinition {
    pub id: String,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub system_prompt: String,
    #[serde(default)]
    pub guiding_questions: Vec<String>,
    #[serde(default)]
    pub example_output: String,
    #[serde(default)]
    pub supports_visuals: bool,
    #[serde(default)]
    pub visual_instructions: Option<String>,
}

impl FrameworkDefinition {
    /// System prompt with guiding questions appended
    pub fn full_system_prompt(&self) -> String {
        if self.guiding_questions.is_empty() {
            return self.system_prompt.clone();
        }
        let questions: Vec<String> =
            self.guiding_questions.iter().map(|q| format!("- {}", q)).collect();
        format!(
            "{}\n\nWork through these questions:\n{}",
            self.system_prompt,
            questions.join("\n")
        )
    }
}

fn category(id: &str, name: &str, description: &str, icon: &str, sort_order: i64) -> FrameworkCategory {
    FrameworkCategory {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        sort_order,
    }
}

pub fn builtin_categories() -> Vec<FrameworkCategory> {
    vec![
        category("strategy", "Strategy", "Vision, positioning and business model", "compass", 0),
        category("prioritization", "Prioritization", "Decide what to build next", "list-ordered", 1),
        category("discovery", "Discovery", "Understand customers and their needs", "search", 2),
        category("requirements", "Requirements", "Specify what to build", "file-text", 3),
        category("metrics", "Metrics", "Goals and measures of success", "bar-chart", 4),
    ]
}

struct Def<'a> {
    id: &'a str,
    category: &'a str,
    name: &'a str,
    description: &'a str,
    icon: &'a str,
    system_prompt: &'a str,
    questions: &'a [&'a str],
    example_output: &'a str,
    visuals: Option<&'a str>,
}

impl Def<'_> {
    fn build(self) -> FrameworkDefinition {
        FrameworkDefinition {
            id: self.id.to_string(),
            category: self.category.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            system_prompt: self.system_prompt.to_string(),
            guiding_questions: self.questions.iter().map(|q| q.to_string()).collect(),
            example_output: self.example_output.to_string(),
            supports_visuals: self.visuals.is_some(),
            visual_instructions: self.visuals.map(str::to_string),
        }
    }
}

pub fn builtin_frameworks() -> Vec<FrameworkDefinition> {
    vec![
        Def {
            id: "rice",
            category: "prioritization",
            name: "RICE Scoring",
            description: "Score initiatives by Reach, Impact, Confidence and Effort",
            icon: "calculator",
            system_prompt: "You are a senior product manager. Produce a RICE prioritization table for the \
                initiatives described. For each item estimate Reach (users per quarter), Impact \
                (0.25, 0.5, 1, 2, 3), Confidence (percentage) and Effort (person-months), compute \
                RICE = Reach x Impact x Confidence / Effort, and sort by score. State every assumption.",
            questions: &[
                "Which initiatives are being compared?",
                "How many users does each reach per quarter?",
                "What evidence supports the confidence level?",
            ],
            example_output: "| Initiative | Reach | Impact | Confidence | Effort | RICE |\n|---|---|---|---|---|---|\n| Bulk export | 2000 | 1 | 80% | 2 | 800 |",
            visuals: Some("Render the ranking as a horizontal bar chart of RICE scores."),
        },
        Def {
            id: "moscow",
            category: "prioritization",
            name: "MoSCoW",
            description: "Sort requirements into Must, Should, Could and Won't",
            icon: "layers",
            system_prompt: "Classify the requirements into Must have, Should have, Could have and Won't have \
                (this time). Justify each placement in one sentence and flag dependencies between items.",
            questions: &["What is the release or time box?", "Which constraints are fixed?"],
            example_output: "## Must have\n- SSO login: contractual requirement for enterprise tier",
            visuals: None,
        },
        Def {
            id: "kano",
            category: "prioritization",
            name: "Kano Model",
            description: "Classify features by how they affect satisfaction",
            icon: "smile",
            system_prompt: "Analyze the features with the Kano model. Place each in Basic, Performance, \
                Delighter, Indifferent or Reverse, explain the expected satisfaction curve, and \
                recommend which to invest in.",
            questions: &["Who is the target customer segment?", "Which features are candidates?"],
            example_output: "| Feature | Category | Rationale |\n|---|---|---|\n| Offline mode | Delighter | Unexpected for web tools |",
            visuals: Some("Plot features on a satisfaction vs. functionality chart."),
        },
        Def {
            id: "prd",
            category: "requirements",
            name: "Product Requirements Document",
            description: "A complete PRD from problem statement to release plan",
            icon: "file-text",
            system_prompt: "Write a product requirements document with these sections: Problem, Goals and \
                Non-goals, Users and Personas, User Stories, Functional Requirements, Non-functional \
                Requirements, Success Metrics, Risks and Open Questions, Release Plan. Be specific and \
                testable.",
            questions: &[
                "What problem are we solving and for whom?",
                "How will we know it worked?",
                "What is explicitly out of scope?",
            ],
            example_output: "# PRD: Team Workspaces\n## Problem\nTeams cannot share drafts...",
            visuals: None,
        },
        Def {
            id: "user-stories",
            category: "requirements",
            name: "User Stories",
            description: "Stories with acceptance criteria in Given/When/Then form",
            icon: "user",
            system_prompt: "Break the feature into user stories in the form 'As a <persona>, I want <goal> so \
                that <benefit>'. Give each story acceptance criteria in Given/When/Then form and an \
                estimate in story points.",
            questions: &["Which personas are involved?", "What is the smallest valuable slice?"],
            example_output: "**As a** team admin **I want** to invite members by email **so that** onboarding is fast.",
            visuals: None,
        },
        Def {
            id: "jtbd",
            category: "discovery",
            name: "Jobs To Be Done",
            description: "Frame needs as the jobs customers hire a product to do",
            icon: "briefcase",
            system_prompt: "Identify the core functional, emotional and social jobs for the customer described. \
                Write job statements as 'When <situation>, I want to <motivation>, so I can <outcome>'. \
                List current solutions hired for each job and where they fall short.",
            questions: &["In what situation does the need arise?", "What do customers use today?"],
            example_output: "When I close the books each month, I want to reconcile accounts quickly, so I can report on time.",
            visuals: None,
        },
        Def {
            id: "opportunity-solution-tree",
            category: "discovery",
            name: "Opportunity Solution Tree",
            description: "Connect a desired outcome to opportunities, solutions and experiments",
            icon: "git-branch",
            system_prompt: "Build an opportunity solution tree. Start from the desired outcome, branch into \
                customer opportunities (needs, pains, desires), list candidate solutions under each, and \
                propose one assumption test per solution.",
            questions: &["What outcome are we driving?", "What have we learned from interviews?"],
            example_output: "Outcome: Increase week-2 retention\n- Opportunity: users forget to return\n  - Solution: digest email\n    - Test: fake-door toggle",
            visuals: Some("Render the tree as a nested mermaid graph."),
        },
        Def {
            id: "okrs",
            category: "metrics",
            name: "OKRs",
            description: "Objectives with measurable key results",
            icon: "target",
            system_prompt: "Draft 2-3 objectives for the period, each with 3-4 measurable key results that have \
                a baseline and a target. Objectives are qualitative and inspiring; key results are \
                quantitative outcomes, not tasks.",
            questions: &["What period do these cover?", "Which company goals do they ladder to?"],
            example_output: "**O1:** Make onboarding effortless\n- KR1: Time to first value from 3 days to 1 day",
            visuals: None,
        },
        Def {
            id: "north-star",
            category: "metrics",
            name: "North Star Metric",
            description: "One metric that captures delivered customer value",
            icon: "star",
            system_prompt: "Propose a North Star metric for the product, explain why it reflects customer value \
                and predicts revenue, and break it into 3-5 input metrics teams can move directly.",
            questions: &["What value does the product deliver?", "How does the business make money?"],
            example_output: "North Star: weekly active collaborating teams\nInputs: invites sent, docs shared, comments posted",
            visuals: Some("Draw the metric tree with the North Star at the root."),
        },
        Def {
            id: "swot",
            category: "strategy",
            name: "SWOT Analysis",
            description: "Strengths, weaknesses, opportunities and threats",
            icon: "grid",
            system_prompt: "Produce a SWOT analysis as a 2x2 grid. Internal factors go in Strengths and \
                Weaknesses, external ones in Opportunities and Threats. Finish with three strategic \
                implications that combine quadrants.",
            questions: &["What product or business unit is in scope?", "Who are the main competitors?"],
            example_output: "| Strengths | Weaknesses |\n|---|---|\n| Fast onboarding | Limited integrations |",
            visuals: None,
        },
        Def {
            id: "lean-canvas",
            category: "strategy",
            name: "Lean Canvas",
            description: "One-page business model for a new product",
            icon: "layout",
            system_prompt: "Fill in a Lean Canvas: Problem, Customer Segments, Unique Value Proposition, \
                Solution, Channels, Revenue Streams, Cost Structure, Key Metrics, Unfair Advantage. \
                Mark the riskiest assumption.",
            questions: &["Who is the early adopter?", "What is the riskiest assumption?"],
            example_output: "**Problem:** Small clinics lose 20% of appointments to no-shows",
            visuals: None,
        },
    ]
    .into_iter()
    .map(Def::build)
    .collect()
}

/// Look up a shipped framework by id
pub fn builtin_framework(id: &str) -> Option<FrameworkDefinition> {
    builtin_frameworks().into_iter().find(|f| f.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let frameworks = builtin_frameworks();
        let ids: HashSet<&str> = frameworks.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids.len(), frameworks.len());
    }

    #[test]
    fn test_every_framework_has_a_known_category() {
        let categories: HashSet<String> = builtin_categories().into_iter().map(|c| c.id).collect();
        for framework in builtin_frameworks() {
            assert!(categories.contains(&framework.category), "{} has unknown category", framework.id);
        }
    }

    #[test]
    fn test_visual_flag_tracks_instructions() {
        let rice = builtin_framework("rice").unwrap();
        assert!(rice.supports_visuals);
        let prd = builtin_framework("prd").unwrap();
        assert!(!prd.supports_visuals);
        assert!(prd.visual_instructions.is_none());
    }

    #[test]
    fn test_full_system_prompt_lists_questions() {
        let jtbd = builtin_framework("jtbd").unwrap();
        let prompt = jtbd.full_system_prompt();
        assert!(prompt.starts_with(&jtbd.system_prompt));
        assert!(prompt.contains("- What do customers use today?"));
    }

    #[test]
    fn test_definition_deserializes_with_defaults() {
        let def: FrameworkDefinition = serde_json::from_str(
            r#"{"id":"x","category":"strategy","name":"X","system_prompt":"Do X"}"#,
        )
        .unwrap();
        assert!(def.guiding_questions.is_empty());
        assert!(!def.supports_visuals);
    }
}
