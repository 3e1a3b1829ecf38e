use serde::{Deserialize, Serialize};

/// A parsed feature: a titled list of scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub title: String,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One step line, keyword included (`When I click "Search"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub text: String,
}

impl Feature {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), scenarios: Vec::new() }
    }

    #[must_use]
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }
}

impl Scenario {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), steps: Vec::new() }
    }

    #[must_use]
    pub fn step(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::new(text));
        self
    }
}

impl Step {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
