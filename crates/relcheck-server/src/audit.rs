use relcheck_core::engine::FailClosed;
use relcheck_core::model::ModelId;
use relcheck_core::tuple::Revision;

pub fn audit_model_registered(model_id: &ModelId, type_count: usize) {
    tracing::info!(
        target: "audit",
        event = "model_registered",
        model_id = %model_id,
        type_count = type_count,
        "authorization model registered"
    );
}

pub fn audit_tuples_written(write_count: usize, delete_count: usize, revision: Revision) {
    tracing::info!(
        target: "audit",
        event = "tuples_written",
        write_count = write_count,
        delete_count = delete_count,
        revision = revision.value(),
        "tuples written"
    );
}

pub fn audit_decision_fail_closed(user: &str, relation: &str, object: &str, signal: FailClosed) {
    tracing::warn!(
        target: "audit",
        event = "decision_fail_closed",
        user = user,
        relation = relation,
        object = object,
        signal = signal.code(),
        "check denied by evaluation-safety signal"
    );
}

pub fn audit_auth_success(key_id: &str) {
    tracing::info!(
        target: "audit",
        event = "auth_success",
        key_id = key_id,
        "authentication succeeded"
    );
}

pub fn audit_auth_failure(reason: &str, key_id: Option<&str>) {
    tracing::warn!(
        target: "audit",
        event = "auth_failure",
        reason = reason,
        key_id = key_id.unwrap_or("unknown"),
        "authentication failed"
    );
}
