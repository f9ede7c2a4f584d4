use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::ValidationError;

/// Trimmed `value`, rejected when nothing is left.
pub fn validate_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(value.to_string())
}

pub fn validate_interval(
    clock_in: DateTime<Utc>,
    clock_out: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if clock_out < clock_in {
        return Err(ValidationError::ClockOutBeforeClockIn {
            clock_in: clock_in.to_rfc3339_opts(SecondsFormat::Secs, true),
            clock_out: clock_out.to_rfc3339_opts(SecondsFormat::Secs, true),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOutEdit {
    At(DateTime<Utc>),
    /// Clears clock-out so the entry is running again.
    Reopen,
}

/// Manual correction of an entry. Fields left `None` are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEdit {
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<ClockOutEdit>,
    pub notes: Option<String>,
}

impl EntryEdit {
    pub fn is_empty(&self) -> bool {
        self.clock_in.is_none() && self.clock_out.is_none() && self.notes.is_none()
    }

    /// Interval the entry would have after this edit, validated.
    pub fn resulting_interval(
        &self,
        clock_in: DateTime<Utc>,
        clock_out: Option<DateTime<Utc>>,
    ) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), ValidationError> {
        let clock_in = self.clock_in.unwrap_or(clock_in);
        let clock_out = match self.clock_out {
            Some(ClockOutEdit::At(v)) => Some(v),
            Some(ClockOutEdit::Reopen) => None,
            None => clock_out,
        };
        if let Some(clock_out) = clock_out {
            validate_interval(clock_in, clock_out)?;
        }
        Ok((clock_in, clock_out))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::error::ValidationError;

    use super::{validate_interval, validate_name, ClockOutEdit, EntryEdit};

    #[test]
    fn names_are_trimmed() {
        assert_eq!(validate_name("Project name", "  Thesis "), Ok("Thesis".into()));
        assert_eq!(
            validate_name("Project name", " \t"),
            Err(ValidationError::Empty {
                field: "Project name"
            })
        );
    }

    #[test]
    fn clock_out_may_not_precede_clock_in() {
        let nine = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let ten = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert!(validate_interval(nine, ten).is_ok());
        assert!(validate_interval(nine, nine).is_ok());
        assert_eq!(
            validate_interval(ten, nine),
            Err(ValidationError::ClockOutBeforeClockIn {
                clock_in: "2024-01-15T10:00:00Z".into(),
                clock_out: "2024-01-15T09:00:00Z".into(),
            })
        );

        // moving clock-in past the stored clock-out is caught too
        let edit = EntryEdit {
            clock_in: Some(ten + chrono::Duration::minutes(1)),
            ..Default::default()
        };
        assert!(edit.resulting_interval(nine, Some(ten)).is_err());

        let reopen = EntryEdit {
            clock_in: Some(ten + chrono::Duration::minutes(1)),
            clock_out: Some(ClockOutEdit::Reopen),
            notes: None,
        };
        assert_eq!(
            reopen.resulting_interval(nine, Some(ten)),
            Ok((ten + chrono::Duration::minutes(1), None))
        );
    }
}
