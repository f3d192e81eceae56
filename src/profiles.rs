//! Static per-host-application profiles.
//!
//! A profile is the set of selector heuristics tuned for one host chat
//! application. Profiles are plain static data; the registry picks one from
//! the page location and falls back to a broad generic profile when no host
//! matches. Host UIs change without notice, so every selector list is an
//! ordered cascade of guesses, not a schema.

use url::Url;

/// Content-subtype selector lists, tried code → markdown → plain text
#[derive(Debug, Clone, Copy)]
pub struct ContentSelectors {
    pub code: &'static [&'static str],
    pub markdown: &'static [&'static str],
    pub text: &'static [&'static str],
}

/// Selector heuristics for one host application
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    /// Host application name
    pub host: &'static str,
    /// Domains this profile applies to (substring match on the page host)
    pub domains: &'static [&'static str],
    /// Conversation root candidates, in priority order
    pub root_selectors: &'static [&'static str],
    /// Message-node candidates under the root
    pub message_selectors: &'static [&'static str],
    /// Indicators that a node (or ancestor) is a human turn
    pub human_selectors: &'static [&'static str],
    /// Indicators that a node (or ancestor) is an agent turn
    pub agent_selectors: &'static [&'static str],
    /// Loading/typing indicators marking a turn as still streaming
    pub streaming_selectors: &'static [&'static str],
    /// Content extraction selectors by subtype
    pub content: ContentSelectors,
    /// Attribute encoding an explicit turn ordinal, as (attr, value prefix);
    /// when present the ordinal overrides sibling-index positioning
    pub turn_ordinal: Option<(&'static str, &'static str)>,
}

pub static CHATGPT: Profile = Profile {
    host: "chatgpt",
    domains: &["chat.openai.com", "chatgpt.com"],
    root_selectors: &[
        "div[data-testid=\"conversation-turn-list\"]",
        "div[role=\"presentation\"]",
        "main div.flex-1.overflow-hidden",
        "div.flex-1.overflow-hidden",
        "main",
    ],
    message_selectors: &[
        "article[data-testid^=\"conversation-turn-\"]",
        "div[data-message-author-role]",
        "div[data-testid=\"conversation-turn\"]",
        "div[data-message-id]",
        "div.group.w-full",
    ],
    human_selectors: &[
        "[data-message-author-role=\"user\"]",
        "[data-user-message=\"true\"]",
        ".user-message",
        ".human-message",
    ],
    agent_selectors: &[
        "[data-message-author-role=\"assistant\"]",
        "[data-assistant-message=\"true\"]",
        ".assistant-message",
        ".ai-message",
    ],
    streaming_selectors: &[
        ".result-streaming",
        "[data-is-streaming=\"true\"]",
        ".text-token-streaming",
    ],
    content: ContentSelectors {
        code: &["pre[class*=\"language-\"]", "pre code", "pre[class*=\"hljs\"]"],
        markdown: &[".markdown.prose", ".markdown", ".prose"],
        text: &[".whitespace-pre-wrap", ".text-base", ".text-message-content"],
    },
    turn_ordinal: Some(("data-testid", "conversation-turn-")),
};

pub static CLAUDE: Profile = Profile {
    host: "claude",
    domains: &["claude.ai", "anthropic.com"],
    root_selectors: &[
        "div.conversation-container",
        "div.prose.w-full",
        "main.flex-1",
        "div[role=\"main\"]",
        "main",
    ],
    message_selectors: &[
        "div.conversation-turn",
        "div[data-message-id]",
        "div.message",
        "div.message-container",
        "div[role=\"listitem\"]",
    ],
    human_selectors: &[".human", ".human-message", ".user", "[data-author=\"human\"]"],
    agent_selectors: &[".assistant", ".assistant-message", ".ai", "[data-author=\"assistant\"]"],
    streaming_selectors: &["[data-is-streaming=\"true\"]", ".typing-indicator", ".animate-pulse"],
    content: ContentSelectors {
        code: &["pre[class*=\"language-\"]", "pre code"],
        markdown: &[".prose", ".message-content"],
        text: &[".whitespace-pre-wrap", "p"],
    },
    turn_ordinal: None,
};

pub static GEMINI: Profile = Profile {
    host: "gemini",
    domains: &["gemini.google.com", "bard.google.com"],
    root_selectors: &[
        "div[role=\"log\"]",
        "div.chat-history",
        "div[role=\"main\"]",
        "main",
    ],
    message_selectors: &[
        "div[role=\"listitem\"]",
        "div.chat-turn",
        "div.message-content",
    ],
    human_selectors: &[
        "div[data-test-id=\"user-input\"]",
        "div[data-message-type=\"user\"]",
        ".user-message",
    ],
    agent_selectors: &[
        "div[data-test-id=\"response\"]",
        "div[data-message-type=\"model\"]",
        ".model-response",
    ],
    streaming_selectors: &[".loading", ".typing-indicator"],
    content: ContentSelectors {
        code: &["pre code", "code"],
        markdown: &[
            ".ProseMirror",
            "div[data-test-id=\"response-text\"]",
            "div[data-test-id=\"query-text\"]",
        ],
        text: &["p"],
    },
    turn_ordinal: None,
};

/// Broad cross-application fallback used when no host matches
pub static GENERIC: Profile = Profile {
    host: "generic",
    domains: &[],
    root_selectors: &[
        "div[role=\"main\"]",
        "div[role=\"log\"]",
        "main",
        ".chat-container",
        ".conversation-container",
        ".conversation",
        ".chat",
    ],
    message_selectors: &[
        "div[data-message-author-role]",
        "div[role=\"listitem\"]",
        ".message",
        ".chat-message",
        ".chat-turn",
        "div[data-message-id]",
        ".chat-entry",
        ".turn",
    ],
    human_selectors: &["[data-message-author-role=\"user\"]", ".user", ".human"],
    agent_selectors: &["[data-message-author-role=\"assistant\"]", ".assistant", ".ai"],
    streaming_selectors: &[".typing-indicator", ".loading", "[data-is-streaming=\"true\"]"],
    content: ContentSelectors {
        code: &["pre code", "code"],
        markdown: &[".markdown", ".prose", ".message-content"],
        text: &["p"],
    },
    turn_ordinal: None,
};

static PROFILES: &[&Profile] = &[&CHATGPT, &CLAUDE, &GEMINI];

/// Pure lookup from an identity hint to the matching profile
pub struct ProfileRegistry {
    profiles: &'static [&'static Profile],
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self { profiles: PROFILES }
    }

    /// Resolve the profile for a page location. No match → generic profile;
    /// there is no failure mode.
    pub fn for_location(&self, url: Option<&Url>) -> &'static Profile {
        let Some(host) = url.and_then(|u| u.host_str()) else {
            return &GENERIC;
        };
        self.for_host(host)
    }

    /// Resolve by bare hostname
    pub fn for_host(&self, host: &str) -> &'static Profile {
        for profile in self.profiles {
            if profile.domains.iter().any(|d| host.contains(d)) {
                return profile;
            }
        }
        &GENERIC
    }

    pub fn profiles(&self) -> &'static [&'static Profile] {
        self.profiles
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}
