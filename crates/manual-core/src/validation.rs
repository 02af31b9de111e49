//! Presence and range checks applied before any write touches the database.
//!
//! Checks accumulate into [`Violations`] so a rejected write reports every
//! problem at once.

use crate::error::{ManualError, Result};

/// Accumulated validation messages.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Violations {
    messages: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(ManualError::Validation(self.messages))
        }
    }
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn check_manual_title(title: &str, violations: &mut Violations) {
    if is_blank(title) {
        violations.add("Title can't be blank");
    }
}

pub fn check_tag_names(names: &[String], violations: &mut Violations) {
    if names.iter().any(|name| is_blank(name)) {
        violations.add("Tag name can't be blank");
    }
}

/// Check the effective title and position of the step at `index`.
pub fn check_step(index: usize, title: &str, position: Option<i64>, violations: &mut Violations) {
    if is_blank(title) {
        violations.add(format!("Steps[{}] title can't be blank", index));
    }
    match position {
        None => violations.add(format!("Steps[{}] position can't be blank", index)),
        Some(p) if p <= 0 => {
            violations.add(format!("Steps[{}] position must be greater than 0", index))
        }
        Some(_) => {}
    }
}

pub fn foreign_step(index: usize, step_id: i64, violations: &mut Violations) {
    violations.add(format!(
        "Steps[{}] id {} does not belong to this manual",
        index, step_id
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_title_is_reported() {
        let mut violations = Violations::new();
        check_manual_title("   ", &mut violations);
        assert_eq!(violations.messages(), ["Title can't be blank"]);
    }

    #[test]
    fn test_every_step_violation_is_collected() {
        let mut violations = Violations::new();
        check_step(0, "", None, &mut violations);
        check_step(1, "Ok", Some(0), &mut violations);
        check_step(2, "Ok", Some(-3), &mut violations);
        check_step(3, "Ok", Some(2), &mut violations);

        assert_eq!(
            violations.messages(),
            [
                "Steps[0] title can't be blank",
                "Steps[0] position can't be blank",
                "Steps[1] position must be greater than 0",
                "Steps[2] position must be greater than 0",
            ]
        );
    }

    #[test]
    fn test_into_result() {
        assert!(Violations::new().into_result().is_ok());

        let mut violations = Violations::new();
        check_tag_names(&["ok".to_string(), " ".to_string()], &mut violations);
        let err = violations.into_result().unwrap_err();
        assert_eq!(
            err.validation_messages().unwrap(),
            ["Tag name can't be blank".to_string()]
        );
    }
}
