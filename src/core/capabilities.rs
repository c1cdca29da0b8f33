//! Purpose: Path-scoped read/write grants carried by auth tokens and sessions.
//! Exports: `Action`, `Capability`, `Capabilities`.
//! Invariants: Text form is `<scope>:<actions>`; scopes start with `/`; actions are `r`/`w`.
//! Invariants: Binary form is the text form; a list decodes leniently, skipping bad entries.
use crate::core::error::{Error, ErrorKind};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
}

impl Action {
    fn as_char(self) -> char {
        match self {
            Action::Read => 'r',
            Action::Write => 'w',
        }
    }

    fn from_char(ch: char) -> Option<Self> {
        match ch {
            'r' => Some(Action::Read),
            'w' => Some(Action::Write),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Capability {
    pub scope: String,
    pub actions: Vec<Action>,
}

impl Capability {
    /// Full read/write access to every path.
    pub fn root() -> Self {
        Self {
            scope: "/".to_string(),
            actions: vec![Action::Read, Action::Write],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scope)?;
        f.write_str(":")?;
        for action in &self.actions {
            write!(f, "{}", action.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (scope, actions) = input.rsplit_once(':').ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("Invalid capability format in '{input}'"))
        })?;
        if !scope.starts_with('/') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("capability scope must start with '/': '{input}'")));
        }
        let mut parsed = Vec::with_capacity(actions.len());
        for ch in actions.chars() {
            let action = Action::from_char(ch).ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("unknown capability action '{ch}' in '{input}'"))
            })?;
            if !parsed.contains(&action) {
                parsed.push(action);
            }
        }
        Ok(Self {
            scope: scope.to_string(),
            actions: parsed,
        })
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(pub Vec<Capability>);

impl Capabilities {
    pub fn root() -> Self {
        Self(vec![Capability::root()])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Capability> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, capability) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{capability}")?;
        }
        Ok(())
    }
}

impl FromStr for Capabilities {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        input
            .split(',')
            .map(|item| item.trim().parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl Serialize for Capabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Capabilities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self(
            text.split(',')
                .filter_map(|item| item.parse().ok())
                .collect(),
        ))
    }
}
