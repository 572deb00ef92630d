use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::model::{DirectType, Rewrite};
use crate::tuple::{ObjectRef, Revision, SubjectRef, TupleFilter};

use super::{Decision, EngineConfig, EvalError, FailClosed, RelationResolver, TupleReader};

#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub user: SubjectRef,
    pub relation: String,
    pub object: ObjectRef,
    pub revision: Option<Revision>,
}

/// Result of one branch. `Halt` is a deny that carries a fail-closed signal.
#[derive(Debug)]
enum Outcome {
    Allow(Vec<String>),
    Deny,
    Halt(FailClosed),
}

/// Per-check state: the `(object, relation)` pairs on the active call path.
struct EvalContext {
    user: SubjectRef,
    revision: Option<Revision>,
    in_flight: HashSet<(ObjectRef, String)>,
}

type EvalFuture<'a> = Pin<Box<dyn Future<Output = Result<Outcome, EvalError>> + Send + 'a>>;

pub struct GraphEvaluator<T: TupleReader> {
    reader: Arc<T>,
    resolver: RelationResolver,
    config: EngineConfig,
}

impl<T: TupleReader> GraphEvaluator<T> {
    pub fn new(reader: Arc<T>, resolver: RelationResolver, config: EngineConfig) -> Self {
        Self {
            reader,
            resolver,
            config,
        }
    }

    pub fn resolver(&self) -> &RelationResolver {
        &self.resolver
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(super) fn reader(&self) -> &T {
        &self.reader
    }

    pub async fn check(&self, request: &CheckRequest) -> Result<Decision, EvalError> {
        self.resolver
            .expression_for(&request.object.object_type, &request.relation)?;

        match tokio::time::timeout(self.config.check_timeout, self.check_unbounded(request)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    object = %request.object,
                    relation = %request.relation,
                    user = %request.user,
                    timeout_ms = self.config.check_timeout.as_millis() as u64,
                    "check timed out"
                );
                Ok(Decision::halted(FailClosed::Timeout))
            }
        }
    }

    async fn check_unbounded(&self, request: &CheckRequest) -> Result<Decision, EvalError> {
        let mut ctx = EvalContext {
            user: request.user.clone(),
            revision: request.revision,
            in_flight: HashSet::new(),
        };

        let outcome = self
            .resolve(
                &request.object,
                &request.relation,
                self.config.max_depth,
                &mut ctx,
            )
            .await?;

        Ok(match outcome {
            Outcome::Allow(mut path) => {
                path.reverse();
                Decision::allow(path)
            }
            Outcome::Deny => Decision::deny(),
            Outcome::Halt(signal) => {
                tracing::debug!(
                    object = %request.object,
                    relation = %request.relation,
                    user = %request.user,
                    signal = %signal,
                    "check failed closed"
                );
                Decision::halted(signal)
            }
        })
    }

    fn resolve<'a>(
        &'a self,
        object: &'a ObjectRef,
        relation: &'a str,
        remaining: usize,
        ctx: &'a mut EvalContext,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            let key = (object.clone(), relation.to_string());
            if ctx.in_flight.contains(&key) {
                return Ok(Outcome::Halt(FailClosed::CycleDetected));
            }
            let rewrite = self
                .resolver
                .expression_for(&object.object_type, relation)?;

            ctx.in_flight.insert(key.clone());
            let outcome = self
                .evaluate(rewrite, object, relation, remaining, ctx)
                .await;
            ctx.in_flight.remove(&key);

            Ok(match outcome? {
                Outcome::Allow(mut path) => {
                    path.push(format!("{object}#{relation}"));
                    Outcome::Allow(path)
                }
                other => other,
            })
        })
    }

    /// One hop through the graph. Spends a unit of depth.
    fn descend<'a>(
        &'a self,
        object: &'a ObjectRef,
        relation: &'a str,
        remaining: usize,
        ctx: &'a mut EvalContext,
    ) -> EvalFuture<'a> {
        match remaining.checked_sub(1) {
            Some(rest) => self.resolve(object, relation, rest, ctx),
            None => Box::pin(async { Ok(Outcome::Halt(FailClosed::DepthExceeded)) }),
        }
    }

    fn evaluate<'a>(
        &'a self,
        rewrite: &'a Rewrite,
        object: &'a ObjectRef,
        relation: &'a str,
        remaining: usize,
        ctx: &'a mut EvalContext,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            match rewrite {
                Rewrite::Direct(types) => {
                    self.evaluate_direct(types, object, relation, remaining, ctx)
                        .await
                }
                Rewrite::Computed(name) => self.descend(object, name, remaining, ctx).await,
                Rewrite::Union(children) => {
                    let mut halted = None;
                    for child in children {
                        match self
                            .evaluate(child, object, relation, remaining, ctx)
                            .await?
                        {
                            Outcome::Allow(path) => return Ok(Outcome::Allow(path)),
                            Outcome::Deny => {}
                            Outcome::Halt(signal) => {
                                halted.get_or_insert(signal);
                            }
                        }
                    }
                    Ok(halted.map_or(Outcome::Deny, Outcome::Halt))
                }
                Rewrite::Intersection(children) => {
                    let mut halted = None;
                    let mut paths = Vec::with_capacity(children.len());
                    for child in children {
                        match self
                            .evaluate(child, object, relation, remaining, ctx)
                            .await?
                        {
                            Outcome::Allow(path) => paths.push(path),
                            Outcome::Deny => return Ok(Outcome::Deny),
                            Outcome::Halt(signal) => {
                                halted.get_or_insert(signal);
                            }
                        }
                    }
                    if let Some(signal) = halted {
                        return Ok(Outcome::Halt(signal));
                    }
                    Ok(Outcome::Allow(paths.into_iter().rev().flatten().collect()))
                }
                Rewrite::Exclusion(base, subtract) => {
                    // Both sides always run, even when the base denies.
                    let base_outcome = self
                        .evaluate(base, object, relation, remaining, ctx)
                        .await?;
                    let subtract_outcome = self
                        .evaluate(subtract, object, relation, remaining, ctx)
                        .await?;
                    Ok(match (base_outcome, subtract_outcome) {
                        (_, Outcome::Allow(_)) => Outcome::Deny,
                        (Outcome::Allow(path), Outcome::Deny) => Outcome::Allow(path),
                        (Outcome::Halt(signal), _) | (_, Outcome::Halt(signal)) => {
                            Outcome::Halt(signal)
                        }
                        (Outcome::Deny, Outcome::Deny) => Outcome::Deny,
                    })
                }
                Rewrite::TupleToUserset { tupleset, computed } => {
                    self.evaluate_tuple_to_userset(tupleset, computed, object, remaining, ctx)
                        .await
                }
            }
        })
    }

    async fn evaluate_direct(
        &self,
        types: &[DirectType],
        object: &ObjectRef,
        relation: &str,
        remaining: usize,
        ctx: &mut EvalContext,
    ) -> Result<Outcome, EvalError> {
        let filter = TupleFilter::object_relation(object, relation);
        let tuples = self.reader.read_tuples(&filter, ctx.revision).await?;
        let admitted: Vec<_> = tuples
            .iter()
            .filter(|t| types.iter().any(|d| d.admits(&t.subject)))
            .collect();

        let user = &ctx.user;
        let granted = admitted.iter().find(|t| {
            t.subject == *user
                || (t.subject.is_wildcard()
                    && !user.is_userset()
                    && t.subject.subject_type == user.subject_type)
        });
        if let Some(tuple) = granted {
            return Ok(Outcome::Allow(vec![tuple.to_string()]));
        }

        let mut halted = None;
        for tuple in admitted {
            let Some(ref inner) = tuple.subject.subject_relation else {
                continue;
            };
            let target = tuple.subject.as_object();
            if !self.resolver.defines(&target.object_type, inner) {
                continue;
            }
            match self.descend(&target, inner, remaining, ctx).await? {
                Outcome::Allow(mut path) => {
                    path.push(tuple.to_string());
                    return Ok(Outcome::Allow(path));
                }
                Outcome::Deny => {}
                Outcome::Halt(signal) => {
                    halted.get_or_insert(signal);
                }
            }
        }
        Ok(halted.map_or(Outcome::Deny, Outcome::Halt))
    }

    async fn evaluate_tuple_to_userset(
        &self,
        tupleset: &str,
        computed: &str,
        object: &ObjectRef,
        remaining: usize,
        ctx: &mut EvalContext,
    ) -> Result<Outcome, EvalError> {
        let filter = TupleFilter::object_relation(object, tupleset);
        let tuples = self.reader.read_tuples(&filter, ctx.revision).await?;

        let mut halted = None;
        for tuple in &tuples {
            if tuple.subject.is_userset() || tuple.subject.is_wildcard() {
                continue;
            }
            let target = tuple.subject.as_object();
            if !self.resolver.defines(&target.object_type, computed) {
                continue;
            }
            match self.descend(&target, computed, remaining, ctx).await? {
                Outcome::Allow(mut path) => {
                    path.push(tuple.to_string());
                    return Ok(Outcome::Allow(path));
                }
                Outcome::Deny => {}
                Outcome::Halt(signal) => {
                    halted.get_or_insert(signal);
                }
            }
        }
        Ok(halted.map_or(Outcome::Deny, Outcome::Halt))
    }
}
