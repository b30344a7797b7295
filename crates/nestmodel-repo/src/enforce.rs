//! Decorator/validation enforcement.
//!
//! The enforcer applies, in order, the value-generation stamps scoped to the
//! operation, the structural checks declared on the model's rules, and the
//! cross-field readonly check against the prior persisted state. It then
//! recurses into every populated relation field, accumulating all violations
//! with their dotted paths instead of failing fast.
//!
//! Enforcement mutates the record in place (stamped fields) and performs no
//! I/O; a non-empty violation set short-circuits persistence before any row
//! is written.

use nestmodel_core::record::{FieldValue, Record};
use nestmodel_core::rule::{Check, matches_pattern};
use nestmodel_core::{OpContext, Operation, Stamp, ValidationError, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in microseconds since epoch.
pub(crate) fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as i64)
}

/// Validate and stamp a record graph for the given operation.
///
/// `old` is the previously persisted state, present for UPDATE operations.
/// A nested branch with no corresponding old value is enforced as CREATE
/// for that branch only, so a brand-new nested object attached during an
/// update is validated as a creation.
pub fn enforce(
    record: &mut Record,
    ctx: &OpContext,
    operation: Operation,
    old: Option<&Record>,
) -> Result<(), ValidationError> {
    debug_assert!(
        !matches!(operation, Operation::Delete),
        "enforce only runs for create/update"
    );
    let mut errors = ValidationError::new();
    enforce_node(record, ctx, operation, old, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn enforce_node(
    record: &mut Record,
    ctx: &OpContext,
    operation: Operation,
    old: Option<&Record>,
    errors: &mut ValidationError,
) {
    let meta = record.meta();

    apply_stamps(record, operation);

    for rule in meta.rules {
        if ctx.is_ignored(rule.field) {
            continue;
        }
        for check in rule.checks {
            apply_check(record, rule.field, check, operation, old, errors);
        }
    }

    for relation in meta.relations {
        if !relation.populate {
            continue;
        }
        match record.field_mut(relation.name) {
            Some(FieldValue::One(child)) => {
                let old_child = old.and_then(|o| o.one(relation.name));
                let child_op = narrow(operation, old_child.is_some());
                let mut nested = ValidationError::new();
                enforce_node(child, ctx, child_op, old_child, &mut nested);
                errors.absorb(relation.name, nested);
            }
            Some(FieldValue::Many(children)) => {
                let old_children = old.and_then(|o| o.many(relation.name));
                for (index, child) in children.iter_mut().enumerate() {
                    let old_child = old_children.and_then(|list| list.get(index));
                    let child_op = narrow(operation, old_child.is_some());
                    let mut nested = ValidationError::new();
                    enforce_node(child, ctx, child_op, old_child, &mut nested);
                    errors.absorb(&format!("{}[{index}]", relation.name), nested);
                }
            }
            _ => {}
        }
    }
}

/// Downgrade UPDATE to CREATE when the branch has no prior value.
fn narrow(operation: Operation, has_old: bool) -> Operation {
    match operation {
        Operation::Update if !has_old => Operation::Create,
        other => other,
    }
}

fn apply_stamps(record: &mut Record, operation: Operation) {
    let meta = record.meta();
    for field in meta.fields {
        match field.stamp {
            Stamp::CreatedAt => {
                let already = record
                    .scalar(field.name)
                    .is_some_and(|v| !v.is_null());
                if matches!(operation, Operation::Create) && !already {
                    record.set_scalar(field.name, Value::Timestamp(now_micros()));
                }
            }
            Stamp::UpdatedAt => {
                record.set_scalar(field.name, Value::Timestamp(now_micros()));
            }
            Stamp::None => {}
        }
    }
}

fn apply_check(
    record: &Record,
    field: &'static str,
    check: &Check,
    operation: Operation,
    old: Option<&Record>,
    errors: &mut ValidationError,
) {
    let value = record.field(field);
    match check {
        Check::Required => {
            let present = match value {
                FieldValue::Unset => false,
                FieldValue::Scalar(v) => !v.is_null(),
                FieldValue::One(_) => true,
                FieldValue::Many(items) => !items.is_empty(),
            };
            if !present {
                errors.add_required(field);
            }
        }
        Check::MinLength(min) => {
            if let Some(text) = scalar_str(value) {
                if text.chars().count() < *min {
                    errors.add_min_length(field, *min, text.chars().count());
                }
            }
        }
        Check::MaxLength(max) => {
            if let Some(text) = scalar_str(value) {
                if text.chars().count() > *max {
                    errors.add_max_length(field, *max, text.chars().count());
                }
            }
        }
        Check::Pattern(pattern) => {
            if let Some(text) = scalar_str(value) {
                if !matches_pattern(text, pattern) {
                    errors.add_pattern(field, pattern);
                }
            }
        }
        Check::Min(min) => {
            if let Some(number) = scalar_f64(value) {
                if number < *min {
                    errors.add_min(field, min, number);
                }
            }
        }
        Check::Max(max) => {
            if let Some(number) = scalar_f64(value) {
                if number > *max {
                    errors.add_max(field, max, number);
                }
            }
        }
        Check::Readonly => {
            if matches!(operation, Operation::Update) {
                if let Some(old_record) = old {
                    let old_value = old_record.field(field);
                    if old_value.is_set() && value.is_set() && old_value != value {
                        errors.add_readonly(field);
                    }
                }
            }
        }
    }
}

fn scalar_str(value: &FieldValue) -> Option<&str> {
    match value {
        FieldValue::Scalar(v) => v.as_str(),
        _ => None,
    }
}

fn scalar_f64(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Scalar(v) if !v.is_null() => v.as_f64(),
        _ => None,
    }
}
