//! Built-in research prompts.

use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Missing required argument '{argument}' for prompt {prompt}")]
    MissingArgument { prompt: String, argument: String },
}

/// A prompt template with `{argument}` placeholders
#[derive(Debug, Clone)]
pub struct Prompt {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [&'static str],
    template: &'static str,
}

const DEEP_PAPER_ANALYSIS: Prompt = Prompt {
    name: "deep-paper-analysis",
    description: "Analyze a single arXiv paper in depth",
    arguments: &["paper_id"],
    template: "Analyze the arXiv paper {paper_id} in depth.

1. If the paper is not in the local library yet, call download_paper with paper_id \"{paper_id}\" \
and poll it with check_status until the status is success.
2. Read the full text with read_paper.
3. Summarize the problem the paper addresses and its main contributions.
4. Describe the methodology, including datasets, models and experimental setup.
5. Assess the results: what is convincing, what is weak, and which claims lack evidence.
6. Place the work in context using search_papers to find closely related papers.
7. List open questions and promising directions for follow-up work.",
};

const LITERATURE_SURVEY: Prompt = Prompt {
    name: "literature-survey",
    description: "Survey recent arXiv literature on a topic",
    arguments: &["topic"],
    template: "Prepare a literature survey on {topic}.

1. Call search_papers for \"{topic}\" sorted by date, then again sorted by relevance.
2. Pick the most relevant papers and download them with download_paper.
3. Read each paper with read_paper once its conversion has finished.
4. Group the papers by approach and summarize each group.
5. Compare the approaches: assumptions, evaluation, and reported results.
6. Close with the open problems in {topic} and where the field is heading.",
};

/// Fixed catalog of prompts offered by the server
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    prompts: Vec<Prompt>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self {
            prompts: vec![DEEP_PAPER_ANALYSIS, LITERATURE_SURVEY],
        }
    }
}

impl PromptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.prompts.iter().map(|p| p.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.name == name)
    }

    /// Fill in a prompt's placeholders; every declared argument is required
    pub fn render(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<String, PromptError> {
        let prompt = self
            .get(name)
            .ok_or_else(|| PromptError::NotFound(name.to_string()))?;

        let mut text = prompt.template.to_string();
        for argument in prompt.arguments {
            let value = arguments
                .get(*argument)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PromptError::MissingArgument {
                    prompt: prompt.name.to_string(),
                    argument: argument.to_string(),
                })?;
            text = text.replace(&format!("{{{}}}", argument), value);
        }
        Ok(text)
    }
}
