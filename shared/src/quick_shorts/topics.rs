//! Keyword rules for the quick learning feed. Matching is plain substring search on the
//! lower-cased title.

const BLOCKED_KEYWORDS: [&str; 19] = [
    "interview",
    "mock interview",
    "resume",
    "cv",
    "salary",
    "negotiat",
    "hiring",
    "recruit",
    "business idea",
    "startup",
    "side hustle",
    "entrepreneur",
    "marketing",
    "sales",
    "dropshipping",
    "passive income",
    "make money",
    "crypto",
    "real estate",
];

const ALLOWED_KEYWORDS: [&str; 22] = [
    "llm",
    "large language model",
    "agentic",
    "agent",
    "agents",
    "prompt engineering",
    "prompt",
    "genai",
    "generative ai",
    "transformer",
    "transformers",
    "neural network",
    "neural networks",
    "deep learning",
    "machine learning",
    "ml",
    "python",
    "react",
    "html",
    "n8n",
    "claude code",
    "claude",
];

/// First matching rule wins.
const TOPIC_RULES: &[(&str, &[&str])] = &[
    ("Excel", &["excel", "vlookup", "pivot", "pivot table", "power query"]),
    ("Power BI", &["power bi", "powerbi", "dax"]),
    ("SQL", &["sql", "postgres", "mysql", "sql server", "query", "joins"]),
    ("Python", &["python", "pandas", "numpy"]),
    ("Web", &["html", "css", "web development"]),
    ("JavaScript", &["javascript", " js", "node", "npm"]),
    ("TypeScript", &["typescript", " ts"]),
    ("React", &["react", "next.js", "nextjs"]),
    ("Automation", &["n8n", "workflow automation", "automation workflow"]),
    ("Cloud", &["aws", "azure", "gcp", "google cloud", "cloud"]),
    ("DevOps", &["docker", "kubernetes", "k8s", "ci/cd", "cicd", "devops"]),
    ("Git", &["git", "github", "pull request", "merge"]),
    ("Security", &["security", "cyber", "owasp", "vulnerability"]),
    (
        "AI",
        &[
            "ai",
            "machine learning",
            "ml",
            "llm",
            "prompt",
            "prompt engineering",
            "transformer",
            "transformers",
            "neural network",
            "deep learning",
            "genai",
            "generative ai",
            "agentic",
            "claude",
        ],
    ),
    ("Communication", &["communication", "presentation", "writing", "email"]),
    ("Leadership", &["leadership", "management", "team", "stakeholder"]),
];

/// Keeps the feed technical. A missing title is not blocked.
pub fn is_desired_title(title: &str) -> bool {
    let t = title.trim().to_lowercase();
    if t.is_empty() {
        return true;
    }
    if BLOCKED_KEYWORDS.iter().any(|k| t.contains(k)) {
        return false;
    }
    ALLOWED_KEYWORDS.iter().any(|k| t.contains(k))
}

/// Topic label for a title, or "" when no rule matches.
pub fn derive_topic(title: &str) -> &'static str {
    let t = title.trim().to_lowercase();
    if t.is_empty() {
        return "";
    }
    TOPIC_RULES
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| t.contains(k)))
        .map(|(topic, _)| *topic)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_filtered() {
        assert!(is_desired_title(""));
        assert!(is_desired_title("Build an LLM agent in Python"));
        assert!(!is_desired_title("Python interview questions"));
        assert!(!is_desired_title("AI side hustle ideas"));
        assert!(!is_desired_title("AI will change everything"));
        assert!(!is_desired_title("Cooking pasta"));
    }

    #[test]
    fn first_rule_wins() {
        assert_eq!(derive_topic("Pivot tables in Excel"), "Excel");
        assert_eq!(derive_topic("SQL joins for Python devs"), "SQL");
        assert_eq!(derive_topic("React hooks"), "React");
        assert_eq!(derive_topic("n8n in 60 seconds"), "Automation");
        assert_eq!(derive_topic("Prompt engineering tips"), "AI");
        assert_eq!(derive_topic("Docker basics"), "DevOps");
        assert_eq!(derive_topic("Lofi beats"), "");
        assert_eq!(derive_topic(""), "");
    }
}
