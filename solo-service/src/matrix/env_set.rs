// Environment Set Parser
// Parses `NAME=VALUE NAME2="quoted value"` strings into ordered assignment sets

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

/// Errors raised while parsing an environment set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvSetError {
    #[error("invalid environment assignment {token:?}: expected NAME=VALUE")]
    MissingEquals { token: String },

    #[error("invalid environment assignment {token:?}: empty variable name")]
    EmptyName { token: String },

    #[error("unterminated {quote} quote starting at position {position} in {input:?}")]
    UnterminatedQuote {
        quote: char,
        position: usize,
        input: String,
    },
}

/// A single `NAME=VALUE` assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvAssignment {
    pub name: String,
    pub value: String,
}

impl EnvAssignment {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered sequence of assignments, compared by value and order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EnvironmentSet {
    assignments: Vec<EnvAssignment>,
}

impl EnvironmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whitespace-delimited list of assignments using shell quoting rules.
    ///
    /// Each word is split at its first `=`, so values may contain `=` themselves.
    /// Blank input yields an empty set.
    pub fn parse(text: &str) -> Result<Self, EnvSetError> {
        let words = WordSplitter::new(text).split()?;

        let assignments = words
            .into_iter()
            .map(|word| {
                let Some((name, value)) = word.split_once('=') else {
                    return Err(EnvSetError::MissingEquals { token: word.clone() });
                };
                if name.is_empty() {
                    return Err(EnvSetError::EmptyName { token: word.clone() });
                }
                Ok(EnvAssignment::new(name, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { assignments })
    }

    /// Add an assignment at the end of the set
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.assignments.push(EnvAssignment::new(name, value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvAssignment> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Materialize the set as a mapping (last assignment of a name wins)
    pub fn to_variables(&self) -> Variables {
        self.iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect()
    }
}

/// Environment variables of a build configuration.
///
/// Keys are unique and rendering keeps insertion order, but equality and hashing
/// ignore order so that `A=a B=b` and `B=b A=a` identify the same configuration.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    entries: Vec<(String, String)>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable; a replaced key keeps its original position
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sorted(&self) -> Vec<&(String, String)> {
        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort();
        sorted
    }
}

impl PartialEq for Variables {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Variables {}

impl Hash for Variables {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted().hash(state);
    }
}

impl FromIterator<(String, String)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut variables = Variables::new();
        for (name, value) in iter {
            variables.insert(name, value);
        }
        variables
    }
}

impl From<&EnvironmentSet> for Variables {
    fn from(set: &EnvironmentSet) -> Self {
        set.to_variables()
    }
}

impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Splits input into words the way a POSIX shell would (no expansions)
struct WordSplitter<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> WordSplitter<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn split(mut self) -> Result<Vec<String>, EnvSetError> {
        let mut words = Vec::new();

        loop {
            self.skip_whitespace();
            if self.chars.peek().is_none() {
                break;
            }
            words.push(self.next_word()?);
        }

        Ok(words)
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }

    fn next_word(&mut self) -> Result<String, EnvSetError> {
        let mut word = String::new();

        while let Some(&(pos, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            self.chars.next();

            match ch {
                '\'' => self.read_single_quoted(pos, &mut word)?,
                '"' => self.read_double_quoted(pos, &mut word)?,
                '\\' => match self.chars.next() {
                    // Line continuation
                    Some((_, '\n')) => {}
                    Some((_, escaped)) => word.push(escaped),
                    None => word.push('\\'),
                },
                _ => word.push(ch),
            }
        }

        Ok(word)
    }

    fn read_single_quoted(&mut self, start: usize, word: &mut String) -> Result<(), EnvSetError> {
        for (_, ch) in self.chars.by_ref() {
            if ch == '\'' {
                return Ok(());
            }
            word.push(ch);
        }
        Err(self.unterminated('\'', start))
    }

    fn read_double_quoted(&mut self, start: usize, word: &mut String) -> Result<(), EnvSetError> {
        while let Some((_, ch)) = self.chars.next() {
            match ch {
                '"' => return Ok(()),
                '\\' => match self.chars.peek() {
                    Some(&(_, '\n')) => {
                        self.chars.next();
                    }
                    Some(&(_, escaped @ ('"' | '\\' | '$' | '`'))) => {
                        self.chars.next();
                        word.push(escaped);
                    }
                    _ => word.push('\\'),
                },
                _ => word.push(ch),
            }
        }
        Err(self.unterminated('"', start))
    }

    fn unterminated(&self, quote: char, position: usize) -> EnvSetError {
        EnvSetError::UnterminatedQuote {
            quote,
            position,
            input: self.input.to_string(),
        }
    }
}
