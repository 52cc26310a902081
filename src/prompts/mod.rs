//! Prompt Catalog
//!
//! Information Hiding:
//! - Instruction texts live in `templates` and never leave this module raw
//! - Slot syntax (`{name}`) and substitution are internal
//! - Callers only see kinds, parameter maps and resolved payloads

mod templates;

use crate::error::PromptError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

static SLOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("slot pattern is a valid regex"));

/// Parameter name to value; ordered so resolution is deterministic
pub type PromptParams = BTreeMap<String, String>;

/// Build a parameter map from `(name, value)` pairs.
pub fn params<I, K, V>(pairs: I) -> PromptParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Conversation,
    Grammar,
    Translate,
    Summarize,
    Paraphrase,
}

impl PromptKind {
    pub const ALL: [PromptKind; 5] = [
        PromptKind::Conversation,
        PromptKind::Grammar,
        PromptKind::Translate,
        PromptKind::Summarize,
        PromptKind::Paraphrase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Grammar => "grammar",
            Self::Translate => "translate",
            Self::Summarize => "summarize",
            Self::Paraphrase => "paraphrase",
        }
    }

    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::Conversation => &["language"],
            Self::Grammar | Self::Summarize | Self::Paraphrase => &["text", "language"],
            Self::Translate => &["text", "source_language", "target_language"],
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptKind {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(Self::Conversation),
            "grammar" => Ok(Self::Grammar),
            "translate" | "translator" => Ok(Self::Translate),
            "summarize" | "summarise" | "summariser" => Ok(Self::Summarize),
            "paraphrase" | "paraphraser" => Ok(Self::Paraphrase),
            other => Err(PromptError::UnknownKind(other.to_string())),
        }
    }
}

/// Immutable instruction template for one kind
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    kind: PromptKind,
    system: &'static str,
    user: Option<&'static str>,
    required: BTreeSet<String>,
}

impl PromptTemplate {
    /// The required parameter set is every slot referenced by either text.
    pub fn new(kind: PromptKind, system: &'static str, user: Option<&'static str>) -> Self {
        let required = std::iter::once(system)
            .chain(user)
            .flat_map(|text| SLOT.captures_iter(text).map(|c| c[1].to_string()))
            .collect();

        Self {
            kind,
            system,
            user,
            required,
        }
    }

    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// Conversation prompts carry the thread history instead of a fixed user message.
    pub fn takes_history(&self) -> bool {
        self.user.is_none()
    }
}

/// Fully substituted instruction payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub kind: PromptKind,
    pub system: String,
    /// Fixed user message for one-shot kinds; `None` where the history goes
    pub user_message: Option<String>,
    pub with_history: bool,
}

#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: HashMap<PromptKind, PromptTemplate>,
}

impl PromptCatalog {
    pub fn new() -> Self {
        let templates = [
            PromptTemplate::new(PromptKind::Conversation, templates::CONVERSATION_SYSTEM, None),
            PromptTemplate::new(
                PromptKind::Grammar,
                templates::GRAMMAR_SYSTEM,
                Some(templates::GRAMMAR_USER),
            ),
            PromptTemplate::new(
                PromptKind::Translate,
                templates::TRANSLATE_SYSTEM,
                Some(templates::TRANSLATE_USER),
            ),
            PromptTemplate::new(
                PromptKind::Summarize,
                templates::SUMMARIZE_SYSTEM,
                Some(templates::SUMMARIZE_USER),
            ),
            PromptTemplate::new(
                PromptKind::Paraphrase,
                templates::PARAPHRASE_SYSTEM,
                Some(templates::PARAPHRASE_USER),
            ),
        ]
        .into_iter()
        .map(|t| (t.kind, t))
        .collect();

        Self { templates }
    }

    pub fn template(&self, kind: PromptKind) -> &PromptTemplate {
        // every kind is registered in `new`
        &self.templates[&kind]
    }

    /// Substitute `params` into the template for `kind`.
    ///
    /// Fails with `MissingParameter` naming the first absent slot (in
    /// alphabetical order). Extra parameters are ignored.
    pub fn resolve(
        &self,
        kind: PromptKind,
        params: &PromptParams,
    ) -> Result<ResolvedPrompt, PromptError> {
        let template = self.template(kind);

        if let Some(missing) = template.required.iter().find(|name| !params.contains_key(*name)) {
            return Err(PromptError::MissingParameter {
                kind,
                name: missing.clone(),
            });
        }

        Ok(ResolvedPrompt {
            kind,
            system: fill(template.system, params),
            user_message: template.user.map(|text| fill(text, params)),
            with_history: template.takes_history(),
        })
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn fill(text: &str, params: &PromptParams) -> String {
    SLOT.replace_all(text, |caps: &Captures| {
        params.get(&caps[1]).cloned().unwrap_or_default()
    })
    .into_owned()
}
