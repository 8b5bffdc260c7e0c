//! Character registry
//!
//! A character is a named persona whose system prompt steers the reply
//! generator. The set is fixed at process start.

use std::collections::HashSet;

use serde::Serialize;

use crate::{Error, Result};

/// Key of the character used when none is selected or the selection is unknown
pub const DEFAULT_CHARACTER_KEY: &str = "sonic";

/// A companion persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Character {
    /// Unique identifier (e.g. "pirate-girl")
    pub key: String,
    /// Human readable name shown on selection screens
    pub display_name: String,
    /// System-level instruction sent ahead of the conversation
    #[serde(skip)]
    pub system_prompt: String,
}

impl Character {
    /// Create a character
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

/// Built-in roster: (key, display name, system prompt)
const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "ganesh",
        "Lord Ganesh",
        "You are the God, Lord Ganesh or Ganapati from Hindu Mythology. Your role is to be a children's companion. You will give sage advise and answer any questions related to Ganesh stories. You should only respond with one short sentence at a time and no more.",
    ),
    (
        "sonic",
        "Sonic the Hedgehog",
        "You are Sonic, the world's fastest hedgehog. Your role is to be a children's companion. You will tell funny jokes and quips about your adventures, try to keep the kid engaged. You should only respond with one short sentence at a time and no more.",
    ),
    (
        "penny",
        "Penny the Princess",
        "You are Penny, a princess from a faraway mystical land. Your role is to be a childrens companion. You will tell tales and interesting facts from your homeland. You will say a lot of oohs and ahhs in your speech. Try to keep the kid engaged. You should only respond with one short sentence at a time and no more.",
    ),
    (
        "eric",
        "Eric the Explorer",
        "You are Eric, an explorer boy scout Your role is to be a childrens companion. You will tell tales from your exploration. Inspire children to love the outdoors and be curious. Try to keep the kid engaged. You should only respond with one short sentence at a time and no more",
    ),
    (
        "pirate-boy",
        "JollyBeard the Pirate",
        "You are a JollyBeard, a fun loving pirate  . Your role is to take children on imaginary treasure hunts and nautical adventures. Keep them engaged with exciting stories. You will use a lot of pirate slang and arrrgghhs in your response. You should only respond with one short sentence at a time and no more",
    ),
    (
        "pirate-girl",
        "Piper the girl Pirate",
        "You are a Piper, a fearless girl pirate. Share tales of your adventures on the high seas and encourage children to be brave and resourceful. You should only respond with one short sentence at a time and no more",
    ),
    (
        "bookworm",
        "Bookworm",
        "You are Bookworm, a lover of literature. Your role is to inspire children to read more. Recommend good books and share stories. You should only respond with one short sentence at a time and no more",
    ),
];

/// Immutable lookup from character key to persona
#[derive(Debug, Clone)]
pub struct CharacterRegistry {
    characters: Vec<Character>,
    default_index: usize,
}

impl CharacterRegistry {
    /// Build a registry from an explicit roster
    ///
    /// # Errors
    ///
    /// Returns error if keys are duplicated, the roster is empty, or
    /// `default_key` is not part of the roster
    pub fn new(characters: Vec<Character>, default_key: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        for character in &characters {
            if !seen.insert(character.key.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate character key: {}",
                    character.key
                )));
            }
        }

        let default_index = characters
            .iter()
            .position(|c| c.key == default_key)
            .ok_or_else(|| {
                Error::Config(format!("default character not registered: {default_key}"))
            })?;

        Ok(Self {
            characters,
            default_index,
        })
    }

    /// Registry holding the built-in roster with the given default
    ///
    /// # Errors
    ///
    /// Returns error if `default_key` is not a built-in character
    pub fn builtin_with_default(default_key: &str) -> Result<Self> {
        let characters = BUILTIN
            .iter()
            .map(|(key, name, prompt)| Character::new(*key, *name, *prompt))
            .collect();
        Self::new(characters, default_key)
    }

    /// Registry holding the built-in roster, defaulting to [`DEFAULT_CHARACTER_KEY`]
    #[must_use]
    pub fn builtin() -> Self {
        let characters = BUILTIN
            .iter()
            .map(|(key, name, prompt)| Character::new(*key, *name, *prompt))
            .collect::<Vec<_>>();
        let default_index = characters
            .iter()
            .position(|c| c.key == DEFAULT_CHARACTER_KEY)
            .unwrap_or(0);
        Self {
            characters,
            default_index,
        }
    }

    /// Exact lookup
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.key == key)
    }

    /// Lookup that falls back to the default character on a miss
    #[must_use]
    pub fn lookup(&self, key: &str) -> &Character {
        if let Some(character) = self.get(key) {
            return character;
        }
        tracing::debug!(
            key,
            fallback = %self.default_character().key,
            "unknown character, using default"
        );
        self.default_character()
    }

    /// Character used when nothing (or something unknown) is selected
    #[must_use]
    pub fn default_character(&self) -> &Character {
        &self.characters[self.default_index]
    }

    /// Display name for a key, or the key itself when it is not registered
    #[must_use]
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).map_or(key, |c| c.display_name.as_str())
    }

    /// Characters in roster order
    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    /// Number of registered characters
    #[must_use]
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Whether the registry is empty (never true for a constructed registry)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

impl Default for CharacterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
