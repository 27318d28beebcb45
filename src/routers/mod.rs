use std::fmt::Debug;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::Exit;
use crate::run::RunContext;
use crate::waits::Wait;

/// A named routing outcome. Categories with no exit terminate the run when
/// picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub uuid: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_uuid: Option<Uuid>,
}

/// The outcome of routing: the picked category plus the operand value and
/// text that drove the pick, recorded as the node's result when the router
/// names one.
#[derive(Debug, Clone)]
pub struct Route {
    pub category_uuid: Uuid,
    pub value: String,
    pub operand: Option<String>,
}

/// Chooses which exit a run leaves a node through. Routers are total: every
/// routable value lands in some category.
#[typetag::serde(tag = "type")]
pub trait Router: Debug + Send + Sync {
    fn categories(&self) -> &[Category];

    /// The wait this router suspends on before routing, if any.
    fn wait(&self) -> Option<&Wait> {
        None
    }

    /// When set, the picked category is saved as a run result under this name.
    fn result_name(&self) -> Option<&str> {
        None
    }

    fn validate(&self, exits: &[Exit]) -> Result<(), String> {
        if self.categories().is_empty() {
            return Err("router has no categories".to_string());
        }
        for category in self.categories() {
            if let Some(exit_uuid) = category.exit_uuid {
                if !exits.iter().any(|e| e.uuid == exit_uuid) {
                    return Err(format!("category '{}' references unknown exit {exit_uuid}", category.name));
                }
            }
        }
        Ok(())
    }

    fn route(&self, ctx: &mut RunContext) -> Route;

    fn clone_box(&self) -> Box<dyn Router>;
}

impl Clone for Box<dyn Router> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseTest {
    HasAnyWord,
    HasAllWords,
    HasText,
    HasNumber,
    HasPhrase,
}

impl CaseTest {
    /// Runs the test against an operand value. On a match, returns the
    /// matched portion of the operand to record as the route value.
    fn test(self, operand: &str, arguments: &[String]) -> Option<String> {
        match self {
            CaseTest::HasText => {
                let trimmed = operand.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            CaseTest::HasNumber => operand
                .split_whitespace()
                .find_map(|token| token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-').parse::<f64>().ok().map(|n| n.to_string())),
            CaseTest::HasAnyWord => {
                let words = tokenize(operand);
                let matched: Vec<&str> = words
                    .iter()
                    .filter(|word| {
                        arguments
                            .iter()
                            .flat_map(|a| tokenize(a))
                            .any(|arg| arg.eq_ignore_ascii_case(word))
                    })
                    .copied()
                    .collect();
                (!matched.is_empty()).then(|| matched.join(" "))
            }
            CaseTest::HasAllWords => {
                let words = tokenize(operand);
                let wanted: Vec<String> = arguments.iter().flat_map(|a| tokenize(a)).map(|w| w.to_string()).collect();
                if !wanted.is_empty()
                    && wanted.iter().all(|w| words.iter().any(|word| word.eq_ignore_ascii_case(w)))
                {
                    Some(wanted.join(" "))
                } else {
                    None
                }
            }
            CaseTest::HasPhrase => {
                let haystack = operand.to_lowercase();
                arguments
                    .iter()
                    .map(|a| a.to_lowercase())
                    .find(|phrase| !phrase.is_empty() && haystack.contains(phrase.as_str()))
            }
        }
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub test: CaseTest,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub category_uuid: Uuid,
}

/// Evaluates an operand template and picks the category of the first case
/// that matches it, falling back to the default category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchRouter {
    pub operand: String,
    #[serde(default)]
    pub cases: Vec<Case>,
    pub categories: Vec<Category>,
    pub default_category_uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<Wait>,
}

#[typetag::serde(name = "switch")]
impl Router for SwitchRouter {
    fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn wait(&self) -> Option<&Wait> {
        self.wait.as_ref()
    }

    fn result_name(&self) -> Option<&str> {
        self.result_name.as_deref()
    }

    fn validate(&self, exits: &[Exit]) -> Result<(), String> {
        for case in &self.cases {
            if !self.categories.iter().any(|c| c.uuid == case.category_uuid) {
                return Err(format!("case {} references unknown category {}", case.uuid, case.category_uuid));
            }
        }
        if !self.categories.iter().any(|c| c.uuid == self.default_category_uuid) {
            return Err(format!("unknown default category {}", self.default_category_uuid));
        }
        for category in &self.categories {
            if let Some(exit_uuid) = category.exit_uuid {
                if !exits.iter().any(|e| e.uuid == exit_uuid) {
                    return Err(format!("category '{}' references unknown exit {exit_uuid}", category.name));
                }
            }
        }
        Ok(())
    }

    fn route(&self, ctx: &mut RunContext) -> Route {
        let operand = ctx.evaluate_logged(&self.operand);

        for case in &self.cases {
            let arguments = ctx.translate(case.uuid, "arguments", &case.arguments);
            let arguments: Vec<String> = arguments.iter().map(|a| ctx.evaluate_logged(a)).collect();
            if let Some(matched) = case.test.test(&operand, &arguments) {
                return Route {
                    category_uuid: case.category_uuid,
                    value: matched,
                    operand: Some(operand),
                };
            }
        }

        Route {
            category_uuid: self.default_category_uuid,
            value: operand.clone(),
            operand: Some(operand),
        }
    }

    fn clone_box(&self) -> Box<dyn Router> {
        Box::new(self.clone())
    }
}

/// Picks a category uniformly at random. Used for A/B splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomRouter {
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
}

#[typetag::serde(name = "random")]
impl Router for RandomRouter {
    fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn result_name(&self) -> Option<&str> {
        self.result_name.as_deref()
    }

    fn route(&self, _ctx: &mut RunContext) -> Route {
        let index = rand::rng().random_range(0..self.categories.len());
        Route {
            category_uuid: self.categories[index].uuid,
            value: index.to_string(),
            operand: None,
        }
    }

    fn clone_box(&self) -> Box<dyn Router> {
        Box::new(self.clone())
    }
}
