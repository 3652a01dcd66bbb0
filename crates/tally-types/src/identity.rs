use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::temporal::BlockTime;

/// A name and email pair, as written on author and committer lines.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    /// Create a person. Call [`validate`](Self::validate) before using
    /// values that came from configuration.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Reject values that would corrupt the block text format.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.trim().is_empty() {
            return Err(TypeError::InvalidPerson("name must not be empty".into()));
        }
        for (field, value) in [("name", &self.name), ("email", &self.email)] {
            if value.contains(['<', '>', '\n', '\r']) {
                return Err(TypeError::InvalidPerson(format!(
                    "{field} contains a reserved character: {value:?}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A person plus the time they acted: one author or committer line.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub person: Person,
    pub time: BlockTime,
}

impl Signature {
    pub fn new(person: Person, time: BlockTime) -> Self {
        Self { person, time }
    }

    /// Git-style line body: `Name <email> <seconds> <tz>`.
    pub fn encode(&self) -> String {
        format!("{} {}", self.person, self.time.encode())
    }

    /// Parse a line body produced by [`encode`](Self::encode) or by git.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let open = s
            .rfind('<')
            .ok_or_else(|| TypeError::InvalidSignature(s.to_string()))?;
        let close = s
            .rfind('>')
            .filter(|close| *close > open)
            .ok_or_else(|| TypeError::InvalidSignature(s.to_string()))?;

        let name = s[..open].trim_end();
        let email = &s[open + 1..close];
        let time = BlockTime::parse(&s[close + 1..])?;

        Ok(Self::new(Person::new(name, email), time))
    }
}

/// The identity every block of a chain is authored and committed with.
///
/// Passed explicitly into block creation; it is never read from or written
/// to process-wide state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIdentity {
    pub author: Person,
    pub committer: Person,
}

impl ChainIdentity {
    pub fn new(author: Person, committer: Person) -> Self {
        Self { author, committer }
    }

    /// Same person on both lines.
    pub fn single(person: Person) -> Self {
        Self::new(person.clone(), person)
    }

    pub fn sign_author(&self, time: BlockTime) -> Signature {
        Signature::new(self.author.clone(), time)
    }

    pub fn sign_committer(&self, time: BlockTime) -> Signature {
        Signature::new(self.committer.clone(), time)
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        self.author.validate()?;
        self.committer.validate()
    }
}
