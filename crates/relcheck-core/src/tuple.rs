use std::fmt;
use std::str::FromStr;

/// Subject id that stands for every subject of a type (`user:*`).
pub const WILDCARD_ID: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefParseError {
    #[error("'{0}' is not of the form type:id")]
    MissingSeparator(String),
    #[error("'{0}' has an empty type, id or relation")]
    EmptyComponent(String),
    #[error("'{0}' contains a reserved character")]
    ReservedCharacter(String),
    #[error("wildcard '{0}' cannot be used as an object")]
    WildcardObject(String),
    #[error("wildcard '{0}' cannot carry a relation")]
    WildcardUserset(String),
    #[error("'{0}' is not of the form object#relation@user")]
    MalformedTuple(String),
}

fn split_type_id(input: &str) -> Result<(&str, &str), RefParseError> {
    let (type_name, id) = input
        .split_once(':')
        .ok_or_else(|| RefParseError::MissingSeparator(input.to_string()))?;
    if type_name.is_empty() || id.is_empty() {
        return Err(RefParseError::EmptyComponent(input.to_string()));
    }
    let reserved = |c: char| c == '#' || c == '@' || c.is_whitespace();
    if type_name.contains(reserved) || type_name.contains(':') || id.contains(reserved) {
        return Err(RefParseError::ReservedCharacter(input.to_string()));
    }
    Ok((type_name, id))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

impl FromStr for ObjectRef {
    type Err = RefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object_type, object_id) = split_type_id(s)?;
        if object_id == WILDCARD_ID {
            return Err(RefParseError::WildcardObject(s.to_string()));
        }
        Ok(Self::new(object_type, object_id))
    }
}

/// The user side of a tuple: a concrete subject, a userset
/// (`group:eng#member`) or a type wildcard (`user:*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectRef {
    pub subject_type: String,
    pub subject_id: String,
    pub subject_relation: Option<String>,
}

impl SubjectRef {
    pub fn direct(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            subject_relation: None,
        }
    }

    pub fn userset(
        subject_type: impl Into<String>,
        subject_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            subject_relation: Some(relation.into()),
        }
    }

    pub fn wildcard(subject_type: impl Into<String>) -> Self {
        Self::direct(subject_type, WILDCARD_ID)
    }

    pub fn is_wildcard(&self) -> bool {
        self.subject_id == WILDCARD_ID && self.subject_relation.is_none()
    }

    pub fn is_userset(&self) -> bool {
        self.subject_relation.is_some()
    }

    /// The object part of the subject, for usersets and plain subjects alike.
    pub fn as_object(&self) -> ObjectRef {
        ObjectRef::new(&self.subject_type, &self.subject_id)
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type, self.subject_id)?;
        if let Some(ref rel) = self.subject_relation {
            write!(f, "#{rel}")?;
        }
        Ok(())
    }
}

impl FromStr for SubjectRef {
    type Err = RefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('#') {
            Some((object, relation)) => {
                if relation.is_empty() {
                    return Err(RefParseError::EmptyComponent(s.to_string()));
                }
                if relation.contains(['#', '@', ':']) || relation.contains(char::is_whitespace) {
                    return Err(RefParseError::ReservedCharacter(s.to_string()));
                }
                let (subject_type, subject_id) = split_type_id(object)?;
                if subject_id == WILDCARD_ID {
                    return Err(RefParseError::WildcardUserset(s.to_string()));
                }
                Ok(Self::userset(subject_type, subject_id, relation))
            }
            None => {
                let (subject_type, subject_id) = split_type_id(s)?;
                Ok(Self::direct(subject_type, subject_id))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tuple {
    pub object: ObjectRef,
    pub relation: String,
    pub subject: SubjectRef,
}

impl Tuple {
    pub fn new(object: ObjectRef, relation: impl Into<String>, subject: SubjectRef) -> Self {
        Self {
            object,
            relation: relation.into(),
            subject,
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.subject)
    }
}

impl FromStr for Tuple {
    type Err = RefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RefParseError::MalformedTuple(s.to_string());
        let (object_relation, subject) = s.split_once('@').ok_or_else(malformed)?;
        let (object, relation) = object_relation.split_once('#').ok_or_else(malformed)?;
        if relation.is_empty() {
            return Err(malformed());
        }
        Ok(Self::new(object.parse()?, relation, subject.parse()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleFilter {
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub relation: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    pub subject_relation: Option<Option<String>>,
}

impl TupleFilter {
    /// Filter selecting every tuple of one `(object, relation)` pair.
    pub fn object_relation(object: &ObjectRef, relation: &str) -> Self {
        Self {
            object_type: Some(object.object_type.clone()),
            object_id: Some(object.object_id.clone()),
            relation: Some(relation.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        if let Some(ref ot) = self.object_type
            && ot != &tuple.object.object_type
        {
            return false;
        }
        if let Some(ref oi) = self.object_id
            && oi != &tuple.object.object_id
        {
            return false;
        }
        if let Some(ref r) = self.relation
            && r != &tuple.relation
        {
            return false;
        }
        if let Some(ref st) = self.subject_type
            && st != &tuple.subject.subject_type
        {
            return false;
        }
        if let Some(ref si) = self.subject_id
            && si != &tuple.subject.subject_id
        {
            return false;
        }
        if let Some(ref sr) = self.subject_relation
            && sr != &tuple.subject.subject_relation
        {
            return false;
        }
        true
    }

    /// Returns the single `(object, relation)` key this filter pins, if any.
    pub fn exact_object_relation(&self) -> Option<(ObjectRef, &str)> {
        match (&self.object_type, &self.object_id, &self.relation) {
            (Some(ot), Some(oi), Some(r)) => Some((ObjectRef::new(ot, oi), r.as_str())),
            _ => None,
        }
    }
}

/// Monotonic tuple-store revision. Every committed write batch gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
    pub const ZERO: Revision = Revision(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
