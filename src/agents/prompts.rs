// Prompt templates for LLM interactions
//
// Templates are versioned so a logged plan can be traced back to the
// prompt that produced it.

use std::collections::HashMap;

/// Prompt template structure
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub system: String,
    pub user_template: String,
}

impl PromptTemplate {
    /// Render the user template, replacing each `{{key}}` with its value
    ///
    /// Placeholders without a matching variable are left in place.
    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        let mut rendered = self.user_template.clone();
        for (key, value) in variables {
            rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
        }
        rendered
    }
}

pub mod library {
    use super::PromptTemplate;

    pub fn task_decomposition() -> PromptTemplate {
        PromptTemplate {
            name: "task_decomposition".to_string(),
            version: "2.0.0".to_string(),
            system: "You are breaking down a task into sub-tasks for registered agents. \
                     Respond with a JSON object with keys thought, action and observation. \
                     The action must itself be a JSON string containing the plan."
                .to_string(),
            user_template: "Task: {{description}}\n\
                            Priority: {{priority}}\n\
                            Available agents: {{agents}}\n\n\
                            Produce {\"subtasks\": [...]} where every entry has:\n\
                            - key (unique short name)\n\
                            - description\n\
                            - agent_id (one of the available agents)\n\
                            - depends_on (keys that must complete first)\n\
                            Return an empty list if no agent is needed."
                .to_string(),
        }
    }
}
