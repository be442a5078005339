use std::fmt;

use util::ArcStr;

use crate::error::SipParseError;

/// A single `;name[=value]` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// The parameter name.
    pub name: ArcStr,
    /// The parameter value, if any.
    pub value: Option<ArcStr>,
}

impl Param {
    /// Creates a new parameter.
    pub fn new(name: impl Into<ArcStr>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }

    pub(crate) fn parse(segment: &str) -> Result<Self, SipParseError> {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(SipParseError::new("Empty parameter"));
        }
        match segment.split_once('=') {
            Some((name, value)) => Ok(Self::new(name.trim(), Some(value.trim()))),
            None => Ok(Self::new(segment, None)),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An ordered collection of `;name[=value]` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params(Vec<Param>);

impl Params {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a parameter.
    pub fn push(&mut self, param: Param) {
        self.0.push(param);
    }

    /// Returns the value of the parameter with the given name.
    ///
    /// Valueless parameters yield `None` from [`Params::get`] as well; use
    /// [`Params::contains`] to test for their presence.
    pub fn get(&self, name: &str) -> Option<&ArcStr> {
        self.0
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.value.as_ref())
    }

    /// Returns `true` if a parameter with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Replaces the parameter with the given name, or appends it.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        match self.0.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(param) => param.value = value.map(Into::into),
            None => self.push(Param::new(name, value)),
        }
    }

    /// Removes the parameter with the given name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Param> {
        let index = self.0.iter().position(|p| p.name.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(index))
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in &self.0 {
            write!(f, ";{}", param)?;
        }
        Ok(())
    }
}
