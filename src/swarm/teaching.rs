//! The six-agent tutoring swarm

use super::agent::{AgentProfile, Capability, Participant};
use super::registry::{AgentRegistry, RegistryError};

pub const MASTER_AGENT: &str = "master_agent";
pub const WEB_SCRAPING_AGENT: &str = "web_scraping_agent";
pub const DATA_CLEANING_AGENT: &str = "data_cleaning_agent";
pub const COURSE_OUTLINE_AGENT: &str = "course_outline_agent";
pub const TOPIC_EXPLAINER: &str = "topic_explainer";
pub const QUIZ_AGENT: &str = "quiz_agent";

const MASTER_PROMPT: &str = "\
You open every learning session. Welcome the learner and tell them you can help them \
study any topic from material on the web.
Ask for the URL of the page they want to learn from, then transfer to the user.
As soon as the learner supplies a URL, transfer to web_scraping_agent and pass the URL along.
If the learner asks about something else, gently bring them back to sharing a URL and transfer to the user.";

const WEB_SCRAPING_PROMPT: &str = "\
You retrieve page text. Use fetch_page_text on the URL the learner provided.
Return the fetched text as-is, without summary or commentary, then transfer to data_cleaning_agent.
If the URL is unusable or the page cannot be fetched, explain the problem plainly and include TERMINATE.";

const DATA_CLEANING_PROMPT: &str = "\
You clean scraped page text. Strip advertising, navigation, button labels, unrelated links \
and anything else that does not teach.
Keep the educational material concise and readable.
When the text is clean, transfer to course_outline_agent.";

const COURSE_OUTLINE_PROMPT: &str = "\
You are an instructional designer. Turn the cleaned material into a course outline made of \
chapters and sub-chapters that build on each other and suit the learner's goals.

Show the learner every new or revised outline and ask whether they want changes, then transfer to the user.
Once the learner is happy with the outline, transfer to topic_explainer.

Hand off to one participant at a time, and always reply before handing off.";

const TOPIC_EXPLAINER_PROMPT: &str = "\
You explain the course outline one chapter at a time. Break each topic into steps and use \
concrete examples. Adapt your explanations to the learner's feedback.

After each explanation ask whether anything is unclear, then transfer to the user.
When the learner understands the chapter or wants to continue, transfer to quiz_agent. \
The learner must finish the quiz before the next chapter starts.

Hand off to one participant at a time, and always reply before handing off.";

const QUIZ_PROMPT: &str = "\
You write multiple-choice quizzes on the chapter the topic explainer just covered and grade \
the learner's answers. Explain briefly why wrong answers are wrong, and adjust the questions \
if the learner is struggling.

After presenting a quiz, transfer to the user and wait for answers.
If some questions are unanswered, ask the learner to complete them and transfer to the user.
When every answer is correct, give feedback and transfer to topic_explainer for the next chapter.

Hand off to one participant at a time, and always give feedback before handing off.";

/// Build the tutoring topology. New sessions start at [`MASTER_AGENT`].
pub fn teaching_swarm() -> Result<AgentRegistry, RegistryError> {
    AgentRegistry::builder(MASTER_AGENT)
        .register(
            AgentProfile::new(
                MASTER_AGENT,
                "Greets the learner and collects the URL to study",
                MASTER_PROMPT,
            ),
            [Participant::agent(WEB_SCRAPING_AGENT), Participant::User],
        )
        .register(
            AgentProfile::new(
                WEB_SCRAPING_AGENT,
                "Fetches the raw text of a web page",
                WEB_SCRAPING_PROMPT,
            )
            .with_capability(Capability::FetchPage),
            [Participant::agent(DATA_CLEANING_AGENT)],
        )
        .register(
            AgentProfile::new(
                DATA_CLEANING_AGENT,
                "Removes non-educational noise from scraped text",
                DATA_CLEANING_PROMPT,
            ),
            [Participant::agent(COURSE_OUTLINE_AGENT)],
        )
        .register(
            AgentProfile::new(
                COURSE_OUTLINE_AGENT,
                "Builds a chapter outline from cleaned material",
                COURSE_OUTLINE_PROMPT,
            ),
            [Participant::agent(TOPIC_EXPLAINER), Participant::User],
        )
        .register(
            AgentProfile::new(
                TOPIC_EXPLAINER,
                "Explains the outline chapter by chapter",
                TOPIC_EXPLAINER_PROMPT,
            ),
            [Participant::User, Participant::agent(QUIZ_AGENT)],
        )
        .register(
            AgentProfile::new(
                QUIZ_AGENT,
                "Quizzes the learner on the last chapter",
                QUIZ_PROMPT,
            ),
            [Participant::User, Participant::agent(TOPIC_EXPLAINER)],
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::AgentName;

    fn targets(registry: &AgentRegistry, name: &str) -> Vec<String> {
        registry
            .resolve(&AgentName::new(name))
            .unwrap()
            .handoffs
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_topology_matches_tutoring_flow() {
        let registry = teaching_swarm().unwrap();

        assert_eq!(registry.entry().as_str(), MASTER_AGENT);
        assert_eq!(registry.agents().count(), 6);
        assert_eq!(targets(&registry, MASTER_AGENT), ["web_scraping_agent", "user"]);
        assert_eq!(targets(&registry, WEB_SCRAPING_AGENT), ["data_cleaning_agent"]);
        assert_eq!(targets(&registry, DATA_CLEANING_AGENT), ["course_outline_agent"]);
        assert_eq!(targets(&registry, COURSE_OUTLINE_AGENT), ["topic_explainer", "user"]);
        assert_eq!(targets(&registry, TOPIC_EXPLAINER), ["user", "quiz_agent"]);
        assert_eq!(targets(&registry, QUIZ_AGENT), ["user", "topic_explainer"]);
    }

    #[test]
    fn test_only_scraper_fetches_pages() {
        let registry = teaching_swarm().unwrap();
        let fetchers: Vec<_> = registry
            .agents()
            .filter(|a| a.has_capability(Capability::FetchPage))
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(fetchers, vec![WEB_SCRAPING_AGENT]);
    }

    #[test]
    fn test_pipeline_agents_cannot_return_to_user() {
        let registry = teaching_swarm().unwrap();
        for name in [WEB_SCRAPING_AGENT, DATA_CLEANING_AGENT] {
            assert!(matches!(
                registry.validate_handoff(&AgentName::new(name), &Participant::User),
                Err(RegistryError::InvalidHandoffTarget { .. })
            ));
        }
    }
}
