use crate::tuple::SubjectRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationModel {
    pub types: Vec<TypeDefinition>,
}

impl AuthorizationModel {
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn get_relation(&self, type_name: &str, relation: &str) -> Option<&RelationDef> {
        self.get_type(type_name)?.get_relation(relation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub relations: Vec<RelationDef>,
}

impl TypeDefinition {
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub rewrite: Rewrite,
}

/// One entry of a `[...]` type restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectType {
    pub type_name: String,
    pub relation: Option<String>,
    pub wildcard: bool,
}

impl DirectType {
    pub fn plain(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: None,
            wildcard: false,
        }
    }

    pub fn userset(type_name: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: Some(relation.into()),
            wildcard: false,
        }
    }

    pub fn wildcard(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: None,
            wildcard: true,
        }
    }

    /// Whether a tuple naming `subject` is allowed by this restriction.
    pub fn admits(&self, subject: &SubjectRef) -> bool {
        if self.type_name != subject.subject_type {
            return false;
        }
        if self.wildcard {
            return subject.is_wildcard();
        }
        !subject.is_wildcard() && self.relation == subject.subject_relation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    Direct(Vec<DirectType>),
    Computed(String),
    Union(Vec<Rewrite>),
    Intersection(Vec<Rewrite>),
    Exclusion(Box<Rewrite>, Box<Rewrite>),
    TupleToUserset { tupleset: String, computed: String },
}

impl Rewrite {
    /// Every direct type restriction reachable without leaving the relation.
    pub fn direct_types(&self) -> Vec<&DirectType> {
        let mut out = Vec::new();
        self.collect_direct_types(&mut out);
        out
    }

    fn collect_direct_types<'a>(&'a self, out: &mut Vec<&'a DirectType>) {
        match self {
            Rewrite::Direct(types) => out.extend(types.iter()),
            Rewrite::Union(children) | Rewrite::Intersection(children) => {
                for child in children {
                    child.collect_direct_types(out);
                }
            }
            Rewrite::Exclusion(base, subtract) => {
                base.collect_direct_types(out);
                subtract.collect_direct_types(out);
            }
            Rewrite::Computed(_) | Rewrite::TupleToUserset { .. } => {}
        }
    }

    /// Whether a tuple naming `subject` may be stored under this relation.
    pub fn admits(&self, subject: &SubjectRef) -> bool {
        self.direct_types().iter().any(|d| d.admits(subject))
    }
}
