use crate::config::ConversationConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Greeting,
    Start,
    Cancel,
    Finish,
}

/// Case-insensitive keyword table. Cancel wins over finish, finish over
/// start, start over greeting when a word appears in more than one list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordSet {
    greeting: Vec<String>,
    start: Vec<String>,
    cancel: Vec<String>,
    finish: Vec<String>,
}

impl KeywordSet {
    pub fn new<S: AsRef<str>>(greeting: &[S], start: &[S], cancel: &[S], finish: &[S]) -> Self {
        Self {
            greeting: normalize_all(greeting),
            start: normalize_all(start),
            cancel: normalize_all(cancel),
            finish: normalize_all(finish),
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(
            &config.greeting_keywords,
            &config.start_keywords,
            &config.cancel_keywords,
            &config.finish_keywords,
        )
    }

    pub fn classify(&self, input: &str) -> Option<Keyword> {
        let normalized = normalize(input);
        if normalized.is_empty() {
            return None;
        }

        [
            (Keyword::Cancel, &self.cancel),
            (Keyword::Finish, &self.finish),
            (Keyword::Start, &self.start),
            (Keyword::Greeting, &self.greeting),
        ]
        .into_iter()
        .find(|(_, words)| words.iter().any(|word| *word == normalized))
        .map(|(keyword, _)| keyword)
    }

    /// First configured word for `keyword`, used when replies mention it.
    pub fn primary(&self, keyword: Keyword) -> &str {
        let words = match keyword {
            Keyword::Greeting => &self.greeting,
            Keyword::Start => &self.start,
            Keyword::Cancel => &self.cancel,
            Keyword::Finish => &self.finish,
        };
        words.first().map(String::as_str).unwrap_or_default()
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self::from_config(&ConversationConfig::default())
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalize_all<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .map(|value| normalize(value.as_ref()))
        .filter(|value| !value.is_empty())
        .collect()
}
