//! ============================================================================
//! Optimistic Assignment - Local-first lead assignment and reconciliation
//! ============================================================================
//! Both transforms are pure: they rewrite leads in place and never touch the
//! network. Reconciliation only drops the provisional flag; authoritative
//! data arrives with the next refresh.
//! ============================================================================

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::types::{AssignMeta, AssignTarget, Lead, TimelineAction, TimelineEntry};

/// Apply an assignment to every lead in `lead_ids`; returns how many changed
pub fn apply_optimistic_assignment(
    leads: &mut [Lead],
    lead_ids: &[String],
    target: Option<&AssignTarget>,
    meta: &AssignMeta,
    now: DateTime<Utc>,
) -> usize {
    if lead_ids.is_empty() {
        return 0;
    }
    let wanted: HashSet<&str> = lead_ids.iter().map(String::as_str).collect();
    let notes = assignment_note(target, meta);

    let mut changed = 0;
    for lead in leads.iter_mut().filter(|l| wanted.contains(l.id.as_str())) {
        let previous = lead.assignment.assigned_to.take();
        let next = target.map(|t| t.email.clone());
        let action = TimelineAction::classify(previous.as_deref(), next.as_deref());

        lead.timeline.push(TimelineEntry {
            id: Uuid::new_v4().to_string(),
            action,
            from: previous.clone(),
            to: next.clone(),
            performed_by: meta.assigned_by.clone(),
            description: describe(action, previous.as_deref(), target),
            at: now,
        });

        let assignment = &mut lead.assignment;
        assignment.assigned_to = next;
        assignment.assigned_to_name = target.map(|t| t.name.clone());
        assignment.assigned_by = meta.assigned_by.clone();
        assignment.assigned_by_name = meta.assigned_by_name.clone();
        assignment.assigned_at = Some(now);
        assignment.previous_assignee = previous;
        assignment.notes = Some(notes.clone());

        lead.optimistic = true;
        changed += 1;
    }
    changed
}

/// Drop the provisional flag on every lead in `lead_ids`; returns how many were flagged
pub fn clear_optimistic(leads: &mut [Lead], lead_ids: &[String]) -> usize {
    if lead_ids.is_empty() {
        return 0;
    }
    let wanted: HashSet<&str> = lead_ids.iter().map(String::as_str).collect();

    let mut cleared = 0;
    for lead in leads.iter_mut().filter(|l| wanted.contains(l.id.as_str())) {
        if lead.optimistic {
            cleared += 1;
        }
        lead.optimistic = false;
    }
    cleared
}

/// Caller's note, or a generated one describing the target
pub fn assignment_note(target: Option<&AssignTarget>, meta: &AssignMeta) -> String {
    if let Some(notes) = meta.notes.as_ref().filter(|n| !n.trim().is_empty()) {
        return notes.clone();
    }
    match target {
        Some(t) => format!("Bulk assigned to {}", t.name),
        None => "Bulk unassigned".to_string(),
    }
}

fn describe(action: TimelineAction, previous: Option<&str>, target: Option<&AssignTarget>) -> String {
    match (action, target) {
        (TimelineAction::Assigned, Some(t)) => format!("Assigned to {}", t.name),
        (TimelineAction::Reassigned, Some(t)) => {
            format!("Reassigned from {} to {}", previous.unwrap_or("unknown"), t.name)
        }
        _ => format!("Unassigned from {}", previous.unwrap_or("nobody")),
    }
}
