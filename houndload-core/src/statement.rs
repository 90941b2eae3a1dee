//! Parameterized write statements and the parameters bound to them.
//!
//! Statements are plain Cypher text with `$name` placeholders. The only dynamic pieces ever
//! spliced into statement text are labels and relationship types, and those only as a validated
//! [`Identifier`]. Everything else travels as [`Params`].
use std::{fmt, sync::OnceLock};

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StatementError;

/// A node label or relationship type that is safe to splice into a statement
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validates `name` as a label or relationship type.
    ///
    /// # Errors
    ///
    /// Errors if the name is empty, longer than 64 characters, or contains anything besides ascii
    /// letters, digits and underscores, or starts with a digit.
    pub fn new(name: impl Into<String>) -> Result<Self, StatementError> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(StatementError::InvalidIdentifier(name))
        }
    }

    /// Wraps a label known at compile time. Invalid literals are a programming error.
    pub fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::is_valid(name), "invalid static identifier {name}");
        Self(name.to_string())
    }

    pub fn is_valid(name: &str) -> bool {
        static REGEX: OnceLock<regex::Regex> = OnceLock::new();

        let re = REGEX.get_or_init(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
        name.len() <= 64 && re.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins identifiers into a relationship type alternation, e.g. `AZAddSecret|AZOwns`
    pub fn alternation<'a>(identifiers: impl IntoIterator<Item = &'a Identifier>) -> String {
        identifiers.into_iter().map(Identifier::as_str).join("|")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = StatementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = StatementError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// A parameterized write or read statement
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statement(String);

impl Statement {
    /// Creates a statement from text.
    ///
    /// # Errors
    ///
    /// Errors if the text is blank.
    pub fn new(text: impl Into<String>) -> Result<Self, StatementError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(StatementError::Empty);
        }
        Ok(Self(text))
    }

    /// Wraps a statement literal. Blank literals are a programming error.
    pub fn from_static(text: &'static str) -> Self {
        debug_assert!(!text.trim().is_empty(), "empty static statement");
        Self(text.to_string())
    }

    /// Builds a statement from static text and validated identifiers only.
    ///
    /// ```
    /// # use houndload_core::{Fragment, Identifier, Statement};
    /// let label = Identifier::new("User").unwrap();
    /// let statement = Statement::compose(&[
    ///     Fragment::Text("MATCH (n:"),
    ///     Fragment::Ident(&label),
    ///     Fragment::Text(") RETURN count(n)"),
    /// ]);
    ///
    /// assert_eq!(statement.as_str(), "MATCH (n:User) RETURN count(n)");
    /// ```
    pub fn compose(fragments: &[Fragment<'_>]) -> Self {
        let text = fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Text(text) => (*text).to_string(),
                Fragment::Ident(identifier) => identifier.to_string(),
                Fragment::Alternation(identifiers) => Identifier::alternation(*identifiers),
                Fragment::Integer(value) => value.to_string(),
            })
            .collect::<String>();
        debug_assert!(!text.trim().is_empty(), "composed an empty statement");

        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Statement")
            .field(&crate::util::debug_long_utf8(&self.0, 120))
            .finish()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Statement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A piece of a composed [`Statement`]
#[derive(Clone, Copy, Debug)]
pub enum Fragment<'a> {
    Text(&'static str),
    Ident(&'a Identifier),
    /// Relationship types joined with `|`
    Alternation(&'a [Identifier]),
    Integer(u64),
}

/// Named parameters bound to a [`Statement`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    /// The key upload statements read their rows from
    pub const PROPS: &'static str = "props";

    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for an upload statement, one parameter object per row
    pub fn props(rows: Vec<Value>) -> Self {
        Self::new().with(Self::PROPS, rows)
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rows bound under [`Params::PROPS`], if any
    pub fn rows(&self) -> &[Value] {
        self.0
            .get(Self::PROPS)
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}
