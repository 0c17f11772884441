/// One backend agent, in the order the backend runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// Used for progress display only; status transitions come from the backend.
pub static AGENTS: &[AgentDescriptor] = &[
    AgentDescriptor {
        name: "requirement",
        display_name: "Extracting Keywords",
        description: "Parsing requirement text",
    },
    AgentDescriptor {
        name: "historical_match",
        display_name: "Finding Historical Matches",
        description: "Searching similar projects",
    },
    AgentDescriptor {
        name: "auto_select",
        display_name: "Selecting Matches",
        description: "Auto-selecting top matches",
    },
    AgentDescriptor {
        name: "impacted_modules",
        display_name: "Analyzing Impacted Modules",
        description: "Identifying affected modules",
    },
    AgentDescriptor {
        name: "estimation_effort",
        display_name: "Generating Estimation",
        description: "Calculating effort hours",
    },
    AgentDescriptor {
        name: "tdd",
        display_name: "Creating TDD",
        description: "Generating technical design",
    },
    AgentDescriptor {
        name: "jira_stories",
        display_name: "Generating Jira Stories",
        description: "Creating user stories",
    },
    AgentDescriptor {
        name: "code_impact",
        display_name: "Analyzing Code Impact",
        description: "Identifying code changes",
    },
    AgentDescriptor {
        name: "risks",
        display_name: "Assessing Risks",
        description: "Evaluating project risks",
    },
];

pub fn agent_position(name: &str) -> Option<usize> {
    AGENTS.iter().position(|a| a.name == name)
}

/// Human label for an agent name, falling back to the raw name.
pub fn display_name(name: &str) -> &str {
    AGENTS
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.display_name)
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_lookup() {
        assert_eq!(agent_position("requirement"), Some(0));
        assert_eq!(agent_position("risks"), Some(AGENTS.len() - 1));
        assert_eq!(agent_position("unknown"), None);
        assert_eq!(display_name("tdd"), "Creating TDD");
        assert_eq!(display_name("custom_agent"), "custom_agent");
    }
}
