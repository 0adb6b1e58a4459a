//! Task lists: action items and checklists.

use super::{Step, unsupported};
use crate::config::LimitsConfig;
use crate::error::Rejection;
use crate::model::payload::{TaskItem, TaskPayload};
use crate::model::{ItemId, Operation};
use crate::registry::check_text;

pub(super) fn validate(
    payload: &TaskPayload,
    operation: &Operation,
    limits: &LimitsConfig,
) -> Result<(), Rejection> {
    match operation {
        Operation::AddItem {
            target,
            text,
            attrs,
        } => {
            check_text("text", text, limits)?;
            if target.is_some() {
                return Err(Rejection::invalid("task lists have no columns"));
            }
            if attrs.parent_id.is_some() || attrs.builds_on.is_some() {
                return Err(Rejection::invalid("task items take no parent or builds_on"));
            }
            if let Some(assignee) = &attrs.assigned_to {
                check_text("assigned_to", assignee, limits)?;
            }
            if payload.items.len() >= limits.max_items {
                return Err(Rejection::invalid(format!(
                    "list already holds {} items",
                    limits.max_items
                )));
            }
            Ok(())
        }
        Operation::DeleteItem { item_id } | Operation::ToggleComplete { item_id } => {
            existing(payload, item_id).map(|_| ())
        }
        other => Err(unsupported(other)),
    }
}

fn existing<'a>(payload: &'a TaskPayload, item_id: &ItemId) -> Result<&'a TaskItem, Rejection> {
    payload
        .item(item_id)
        .ok_or_else(|| Rejection::invalid(format!("unknown item '{item_id}'")))
}

pub(super) fn apply(
    payload: &mut TaskPayload,
    operation: &Operation,
    step: &Step<'_>,
) -> Result<(), Rejection> {
    match operation {
        Operation::AddItem { text, attrs, .. } => {
            payload.items.push(TaskItem {
                entry: step.entry(text),
                assigned_to: attrs.assigned_to.as_deref().map(|a| a.trim().to_string()),
                due_date: attrs.due_date,
                completed: false,
                completed_at: None,
                completed_by: None,
            });
            Ok(())
        }
        Operation::DeleteItem { item_id } => {
            step.ensure_may_delete(&existing(payload, item_id)?.entry)?;
            payload.items.retain(|item| &item.entry.id != item_id);
            Ok(())
        }
        Operation::ToggleComplete { item_id } => {
            let item = payload
                .items
                .iter_mut()
                .find(|item| &item.entry.id == item_id)
                .ok_or_else(|| Rejection::invalid(format!("unknown item '{item_id}'")))?;
            item.completed = !item.completed;
            if item.completed {
                item.completed_at = Some(step.now);
                item.completed_by = Some(step.actor.id.clone());
            } else {
                item.completed_at = None;
                item.completed_by = None;
            }
            Ok(())
        }
        other => Err(unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{doc, run, user};
    use crate::error::Rejection;
    use crate::model::{ItemAttrs, Operation, Setup, WidgetDocument, WidgetKind};
    use chrono::NaiveDate;

    fn with_item(kind: WidgetKind) -> WidgetDocument {
        let d = doc(kind, &Setup::tasks("Follow-ups"));
        let op = Operation::AddItem {
            target: None,
            text: "Write notes".into(),
            attrs: ItemAttrs {
                assigned_to: Some(" Sam ".into()),
                due_date: NaiveDate::from_ymd_opt(2026, 11, 2),
                ..ItemAttrs::default()
            },
        };
        run(&d, &op, &user("u1")).expect("add")
    }

    #[test]
    fn add_keeps_assignee_and_due_date() {
        let d = with_item(WidgetKind::ActionItems);
        let item = &d.payload.as_tasks().expect("tasks").items[0];
        assert_eq!(item.assigned_to.as_deref(), Some("Sam"));
        assert_eq!(item.due_date, NaiveDate::from_ymd_opt(2026, 11, 2));
        assert!(!item.completed);
    }

    #[test]
    fn toggle_complete_is_an_involution() {
        let d = with_item(WidgetKind::Checklist);
        let id = d.payload.as_tasks().expect("tasks").items[0].entry.id.clone();
        let op = Operation::ToggleComplete { item_id: id };

        let done = run(&d, &op, &user("u2")).expect("complete");
        let item = &done.payload.as_tasks().expect("tasks").items[0];
        assert!(item.completed);
        assert_eq!(item.completed_by.as_ref().map(|a| a.as_str()), Some("u2"));
        assert!(item.completed_at.is_some());

        let undone = run(&done, &op, &user("u2")).expect("reopen");
        assert_eq!(undone.payload, d.payload);
        assert_eq!(undone.version, d.version + 2);
    }

    #[test]
    fn tasks_reject_columns() {
        let d = doc(WidgetKind::ActionItems, &Setup::tasks("t"));
        assert!(matches!(
            run(&d, &Operation::add_to("todo", "x"), &user("u1")),
            Err(Rejection::InvalidArgument(_))
        ));
    }

    #[test]
    fn anyone_may_close_a_checklist() {
        let d = with_item(WidgetKind::Checklist);
        assert!(run(&d, &Operation::Close, &user("u7")).is_ok());
        let actions = with_item(WidgetKind::ActionItems);
        assert!(matches!(
            run(&actions, &Operation::Close, &user("u7")),
            Err(Rejection::Forbidden { .. })
        ));
    }
}
