//! Display-label classification.
//!
//! Picker labels carry a bracketed type tag and an optional trailing address,
//! e.g. `Sales Team [Distribution List] - sales@contoso.com`. This module is
//! the boundary between those labels and typed [`AssignmentRequest`] values.

use tenantdesk_core::{AppError, AppResult};

use crate::assignment::{AssignmentRequest, TargetKind};

/// Tags checked in priority order; first match wins.
const KIND_TAGS: &[(&str, TargetKind)] = &[
    ("[Distribution List]", TargetKind::DistributionList),
    ("[Shared Mailbox]", TargetKind::SharedMailbox),
    ("[Mail-Enabled Security]", TargetKind::MailEnabledSecurityGroup),
    ("[Microsoft 365 Group]", TargetKind::M365Group),
];

const NAME_TAG_MARKER: &str = " [";
const SEPARATOR_RUN_LENGTH: usize = 3;

/// Result of classifying one display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelClassification {
    /// Label describes an assignment target.
    Assignment(AssignmentRequest),
    /// Label is a section header and yields no request.
    Separator,
}

/// Classifies one picker label into an assignment request.
///
/// Empty labels and labels without a target name are validation errors that
/// callers skip; section headers such as `=== SECURITY GROUPS ===` classify as
/// [`LabelClassification::Separator`].
pub fn classify_label(label: &str) -> AppResult<LabelClassification> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "assignment label must not be empty".to_owned(),
        ));
    }

    if is_separator(trimmed) {
        return Ok(LabelClassification::Separator);
    }

    let target_kind = KIND_TAGS
        .iter()
        .find(|(tag, _)| trimmed.contains(tag))
        .map_or(TargetKind::SecurityGroup, |(_, kind)| *kind);

    let target_name = name_portion(trimmed).trim();

    if target_name.is_empty() {
        return Err(AppError::Validation(format!(
            "assignment label '{trimmed}' has no target name"
        )));
    }

    let request = AssignmentRequest::new(target_name, target_kind)?.with_source_label(label);
    Ok(LabelClassification::Assignment(request))
}

/// Text before the first tag; a label that opens with its tag has none.
fn name_portion(label: &str) -> &str {
    if label.starts_with('[') {
        return "";
    }

    label
        .split_once(NAME_TAG_MARKER)
        .map_or(label, |(name, _)| name)
}

fn is_separator(label: &str) -> bool {
    let has_bracket_tag = label
        .find('[')
        .is_some_and(|open| label[open..].contains(']'));
    if has_bracket_tag {
        return false;
    }

    has_run(label, '=') || has_run(label, '-')
}

fn has_run(label: &str, marker: char) -> bool {
    let mut run = 0_usize;
    for character in label.chars() {
        if character == marker {
            run += 1;
            if run >= SEPARATOR_RUN_LENGTH {
                return true;
            }
        } else {
            run = 0;
        }
    }

    false
}
