//! First-layer decision making: label a query with intent tags.
//!
//! One model call returns a comma-separated list such as
//! `"open chrome, general how are you"`. Entries that do not start with a
//! known function word are dropped.

use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, ChatModel, CompletionRequest};

/// Function words the classifier may emit, in vocabulary order.
pub const FUNCS: &[&str] = &[
    "exit",
    "general",
    "realtime",
    "open",
    "close",
    "play",
    "generate image",
    "system",
    "content",
    "google search",
    "youtube search",
    "reminder",
];

/// Tags handled by the automation layer.
pub const AUTOMATION_FUNCS: &[&str] = &[
    "open",
    "close",
    "play",
    "system",
    "content",
    "google search",
    "youtube search",
];

const MAX_ATTEMPTS: usize = 3;

const PREAMBLE: &str = r#"You are a very accurate Decision-Making Model which decides what kind of a query is given to you.
You will decide whether a query is a 'general' query, a 'realtime' query, or is asking to perform any task or automation like 'open facebook, instagram', 'can you write an application and open it in notepad'.
*** Do not answer any query, just decide what kind of query is given to you. ***
-> Respond with 'general ( query )' if a query can be answered by an llm model (conversational ai chatbot) and doesn't require any up to date information, or if the query has a pronoun without a proper noun, or if it asks for the time, day or date. Example: 'who was akbar?' -> 'general who was akbar?', 'how can i study more effectively?' -> 'general how can i study more effectively?'.
-> Respond with 'realtime ( query )' if a query can not be answered by an llm model without up to date information, or asks about an individual or thing, or current events. Example: 'what is today's news?' -> 'realtime what is today's news?', 'who is the indian prime minister' -> 'realtime who is the indian prime minister?'.
-> Respond with 'open (application name or website name)' if a query asks to open any application like 'open facebook'. For multiple applications respond with 'open 1st application name, open 2nd application name' and so on.
-> Respond with 'close (application name)' if a query asks to close any application like 'close notepad'. For multiple applications respond with 'close 1st application name, close 2nd application name' and so on.
-> Respond with 'play (song name)' if a query asks to play any song like 'play afsanay by ys'. For multiple songs respond with 'play 1st song name, play 2nd song name' and so on.
-> Respond with 'generate image (image prompt)' if a query is requesting to generate an image with a given prompt like 'generate image of a lion'.
-> Respond with 'reminder (datetime with message)' if a query is requesting to set a reminder like 'set a reminder at 9:00pm on 25th june for my business meeting.' -> 'reminder 9:00pm 25th june business meeting'.
-> Respond with 'system (task name)' if a query is asking to mute, unmute, volume up, volume down, etc. For multiple tasks respond with 'system 1st task, system 2nd task' and so on.
-> Respond with 'content (topic)' if a query is asking to write any type of content like an application, code, an email or anything else about a specific topic.
-> Respond with 'google search (topic)' if a query is asking to search a specific topic on google.
-> Respond with 'youtube search (topic)' if a query is asking to search a specific topic on youtube.
*** If the query is asking to perform multiple tasks like 'open facebook, telegram and close whatsapp' respond with 'open facebook, open telegram, close whatsapp' ***
*** If the user is saying goodbye or wants to end the conversation like 'bye jarvis.' respond with 'exit' ***
*** Respond with 'general (query)' if you can't decide the kind of query or if a query is asking to perform a task which is not mentioned above. ***"#;

/// Few-shot examples sent as prior chat turns.
const EXAMPLES: &[(&str, &str)] = &[
    ("how are you?", "general how are you?"),
    ("do you like pizza?", "general do you like pizza?"),
    (
        "open chrome and tell me about mahatma gandhi.",
        "open chrome, general tell me about mahatma gandhi.",
    ),
    ("open chrome and firefox", "open chrome, open firefox"),
    (
        "what is today's date and by the way remind me that i have a dancing performance on 5th aug at 11pm",
        "general what is today's date, reminder 11:00pm 5th aug dancing performance",
    ),
    ("chat with me.", "general chat with me."),
];

/// Ordered intent tags for one query, e.g. `["open chrome", "general hi"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision(pub Vec<String>);

impl Decision {
    pub fn tags(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_general(&self) -> bool {
        self.0.iter().any(|t| t.starts_with("general"))
    }

    pub fn has_realtime(&self) -> bool {
        self.0.iter().any(|t| t.starts_with("realtime"))
    }

    pub fn has_automation(&self) -> bool {
        self.0
            .iter()
            .any(|t| AUTOMATION_FUNCS.iter().any(|f| t.starts_with(f)))
    }

    /// General and realtime tags with their function word dropped, joined
    /// with `" and "`, so one search can answer all of them.
    pub fn merged_query(&self) -> String {
        self.0
            .iter()
            .filter(|t| t.starts_with("general") || t.starts_with("realtime"))
            .map(|t| t.split_whitespace().skip(1).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(" and ")
    }

    /// Prompt of the last `generate image` tag, if any.
    pub fn image_prompt(&self) -> Option<String> {
        self.0
            .iter()
            .filter(|t| t.contains("generate image"))
            .last()
            .map(|t| t.replace("generate image", "").trim().to_string())
    }
}

/// Split a raw model reply into known tags.
pub fn parse_response(raw: &str) -> Decision {
    let flat = raw.replace(['\n', '\r'], "");
    let tags = flat
        .split(',')
        .map(str::trim)
        .filter(|t| FUNCS.iter().any(|f| t.starts_with(f)))
        .map(str::to_string)
        .collect();
    Decision(tags)
}

/// The model echoed the instruction placeholder instead of the query.
fn is_placeholder(decision: &Decision) -> bool {
    decision.0.iter().any(|t| t.contains("(query)") || t.contains("( query )"))
}

fn build_messages(query: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(EXAMPLES.len() * 2 + 2);
    messages.push(ChatMessage::system(PREAMBLE));
    for (user, reply) in EXAMPLES {
        messages.push(ChatMessage::user(*user));
        messages.push(ChatMessage::assistant(*reply));
    }
    messages.push(ChatMessage::user(query));
    messages
}

/// Classify a query. Never returns an empty decision: when nothing usable
/// comes back the query is treated as `general`.
pub async fn classify(model: &dyn ChatModel, model_name: &str, query: &str) -> anyhow::Result<Decision> {
    for attempt in 1..=MAX_ATTEMPTS {
        let request = CompletionRequest::new(model_name, build_messages(query)).max_tokens(256);
        let raw = model.complete(request).await?;
        let decision = parse_response(&raw);
        debug!(attempt, raw = %raw, tags = ?decision.tags(), "Classifier reply");

        if is_placeholder(&decision) {
            warn!(attempt, "Classifier returned placeholder tags, retrying");
            continue;
        }
        if decision.is_empty() {
            break;
        }
        info!(tags = ?decision.tags(), "Decision");
        return Ok(decision);
    }

    let fallback = Decision(vec![format!("general {}", query.trim())]);
    info!(tags = ?fallback.tags(), "Decision (fallback)");
    Ok(fallback)
}
