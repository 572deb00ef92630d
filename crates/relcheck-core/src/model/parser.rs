use std::collections::HashSet;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::types::{AuthorizationModel, DirectType, RelationDef, Rewrite, TypeDefinition};

#[derive(Parser)]
#[grammar = "model/grammar.pest"]
struct ModelParser;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("mixed operators in rewrite: use only one of or, and, but not per level and group with parentheses")]
    MixedOperators,
    #[error("exclusion (but not) supports exactly two operands: base but not subtracted")]
    MultipleExclusions,
    #[error("duplicate type: {0}")]
    DuplicateType(String),
    #[error("duplicate relation '{relation}' in type '{type_name}'")]
    DuplicateRelation { type_name: String, relation: String },
}

pub fn parse_model(input: &str) -> Result<AuthorizationModel, ParseError> {
    let pairs =
        ModelParser::parse(Rule::model, input).map_err(|e| ParseError::Syntax(e.to_string()))?;

    let mut types = Vec::new();
    let mut seen_types = HashSet::new();

    for pair in pairs {
        if pair.as_rule() != Rule::model {
            continue;
        }
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::type_def {
                let type_def = parse_type_def(inner)?;
                if !seen_types.insert(type_def.name.clone()) {
                    return Err(ParseError::DuplicateType(type_def.name));
                }
                types.push(type_def);
            }
        }
    }

    Ok(AuthorizationModel { types })
}

fn unexpected_rule(rule: Rule) -> ParseError {
    ParseError::Syntax(format!("unexpected rule: {rule:?}"))
}

fn missing_token(context: &str) -> ParseError {
    ParseError::Syntax(format!("missing token: {context}"))
}

fn first_identifier(pair: Pair<'_, Rule>, context: &str) -> Result<String, ParseError> {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| missing_token(context))
}

fn parse_type_def(pair: Pair<'_, Rule>) -> Result<TypeDefinition, ParseError> {
    let mut inner = pair.into_inner();
    let name = first_identifier(
        inner.next().ok_or_else(|| missing_token("type name"))?,
        "type name",
    )?;

    let mut relations = Vec::new();
    let mut seen_relations = HashSet::new();

    if let Some(body) = inner.next() {
        for item in body.into_inner() {
            if item.as_rule() != Rule::relation_def {
                continue;
            }
            let rel = parse_relation_def(item)?;
            if !seen_relations.insert(rel.name.clone()) {
                return Err(ParseError::DuplicateRelation {
                    type_name: name,
                    relation: rel.name,
                });
            }
            relations.push(rel);
        }
    }

    Ok(TypeDefinition { name, relations })
}

fn parse_relation_def(pair: Pair<'_, Rule>) -> Result<RelationDef, ParseError> {
    let mut inner = pair.into_inner();
    let name = first_identifier(
        inner.next().ok_or_else(|| missing_token("relation name"))?,
        "relation name",
    )?;
    let rewrite = parse_rewrite(inner.next().ok_or_else(|| missing_token("rewrite"))?)?;

    Ok(RelationDef { name, rewrite })
}

fn parse_rewrite(pair: Pair<'_, Rule>) -> Result<Rewrite, ParseError> {
    let mut inner = pair.into_inner();
    let first = parse_term(inner.next().ok_or_else(|| missing_token("rewrite term"))?)?;

    let mut ops_and_terms: Vec<(Rule, Rewrite)> = Vec::new();

    while let Some(op) = inner.next() {
        let term = parse_term(
            inner
                .next()
                .ok_or_else(|| missing_token("rewrite term after operator"))?,
        )?;
        ops_and_terms.push((op.as_rule(), term));
    }

    if ops_and_terms.is_empty() {
        return Ok(first);
    }

    let first_op = ops_and_terms[0].0;
    if ops_and_terms.iter().any(|(op, _)| *op != first_op) {
        return Err(ParseError::MixedOperators);
    }

    match first_op {
        Rule::union_op => {
            let mut children = vec![first];
            children.extend(ops_and_terms.into_iter().map(|(_, t)| t));
            Ok(Rewrite::Union(children))
        }
        Rule::intersection_op => {
            let mut children = vec![first];
            children.extend(ops_and_terms.into_iter().map(|(_, t)| t));
            Ok(Rewrite::Intersection(children))
        }
        Rule::exclusion_op => {
            if ops_and_terms.len() != 1 {
                return Err(ParseError::MultipleExclusions);
            }
            let (_, subtract) = ops_and_terms
                .into_iter()
                .next()
                .ok_or_else(|| missing_token("exclusion operand"))?;
            Ok(Rewrite::Exclusion(Box::new(first), Box::new(subtract)))
        }
        _ => Err(unexpected_rule(first_op)),
    }
}

fn parse_term(pair: Pair<'_, Rule>) -> Result<Rewrite, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing_token("term content"))?;
    match inner.as_rule() {
        Rule::direct => inner
            .into_inner()
            .map(parse_direct_type)
            .collect::<Result<Vec<_>, _>>()
            .map(Rewrite::Direct),
        Rule::tuple_to_userset => {
            let mut parts = inner.into_inner();
            let computed = parts
                .next()
                .ok_or_else(|| missing_token("tuple-to-userset relation"))?
                .as_str()
                .to_string();
            let tupleset = parts
                .next()
                .ok_or_else(|| missing_token("tuple-to-userset tupleset"))?
                .as_str()
                .to_string();
            Ok(Rewrite::TupleToUserset { tupleset, computed })
        }
        Rule::rewrite => parse_rewrite(inner),
        Rule::computed => Ok(Rewrite::Computed(first_identifier(inner, "relation")?)),
        other => Err(unexpected_rule(other)),
    }
}

fn parse_direct_type(pair: Pair<'_, Rule>) -> Result<DirectType, ParseError> {
    match pair.as_rule() {
        Rule::identifier => Ok(DirectType::plain(pair.as_str())),
        Rule::wildcard_type => Ok(DirectType::wildcard(first_identifier(pair, "wildcard type")?)),
        Rule::userset_type => {
            let mut parts = pair.into_inner();
            let type_name = parts
                .next()
                .ok_or_else(|| missing_token("userset type"))?
                .as_str();
            let relation = parts
                .next()
                .ok_or_else(|| missing_token("userset relation"))?
                .as_str();
            Ok(DirectType::userset(type_name, relation))
        }
        other => Err(unexpected_rule(other)),
    }
}
