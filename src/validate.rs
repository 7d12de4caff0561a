use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;

use crate::error::{ValidationErrors, ValidationWarning};
use crate::model::{Attributes, Node, NodeId, SessionAttrs, SessionStatus};
use crate::settings::Settings;

const TIME_FORMATS: [&str; 3] = ["%H:%M", "%H:%M:%S", "%I:%M %p"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(trimmed, f).ok())
}

/// Start of a session. A date without a time starts at midnight.
pub fn session_schedule(session: &SessionAttrs) -> Option<NaiveDateTime> {
    let date = parse_date(session.date.as_deref()?)?;
    let time = match session.time.as_deref() {
        Some(t) => parse_time(t)?,
        None => NaiveTime::MIN,
    };
    Some(date.and_time(time))
}

/// Upcoming or completed relative to `now`. A session is completed once its
/// end (start plus duration) is not after `now`; unscheduled sessions stay
/// upcoming.
pub fn classify_session(session: &SessionAttrs, now: NaiveDateTime) -> SessionStatus {
    let Some(start) = session_schedule(session) else {
        return SessionStatus::Upcoming;
    };
    let minutes = session.duration_minutes.unwrap_or(0).clamp(0, i64::from(i32::MAX));
    let end = start
        .checked_add_signed(ChronoDuration::minutes(minutes))
        .unwrap_or(NaiveDateTime::MAX);
    if end <= now {
        SessionStatus::Completed
    } else {
        SessionStatus::Upcoming
    }
}

pub fn shift_iso_date(value: Option<String>, day_offset: i64) -> Option<String> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if day_offset == 0 {
        return Some(trimmed.to_string());
    }
    let shifted = parse_date(trimmed)
        .and_then(|date| ChronoDuration::try_days(day_offset).and_then(|d| date.checked_add_signed(d)));
    match shifted {
        Some(date) => Some(date.format("%Y-%m-%d").to_string()),
        None => Some(trimmed.to_string()),
    }
}

fn clean_opt(value: &mut Option<String>) {
    if let Some(s) = value.take() {
        let s = s.trim().to_string();
        if !s.is_empty() {
            *value = Some(s);
        }
    }
}

/// Trim the display name and drop blank optional strings.
pub fn normalize(attributes: &mut Attributes) {
    let name = attributes.display_name().trim().to_string();
    attributes.set_display_name(name);
    match attributes {
        Attributes::Board(a) => {
            clean_opt(&mut a.code);
            clean_opt(&mut a.description);
            clean_opt(&mut a.icon);
        }
        Attributes::Grade(a) => {
            clean_opt(&mut a.code);
            clean_opt(&mut a.description);
            clean_opt(&mut a.icon);
        }
        Attributes::Subject(a) => {
            clean_opt(&mut a.code);
            clean_opt(&mut a.instructor);
            clean_opt(&mut a.language);
            clean_opt(&mut a.icon);
        }
        Attributes::Chapter(a) => {
            clean_opt(&mut a.description);
        }
        Attributes::Session(a) => {
            clean_opt(&mut a.instructor);
            clean_opt(&mut a.date);
            clean_opt(&mut a.time);
            clean_opt(&mut a.language);
            clean_opt(&mut a.video_url);
        }
    }
}

fn non_negative(errors: &mut ValidationErrors, field: &str, value: Option<i64>) {
    if matches!(value, Some(v) if v < 0) {
        errors.push(field, "must be >= 0");
    }
}

fn check_fields(attributes: &Attributes, errors: &mut ValidationErrors) {
    if attributes.display_name().trim().is_empty() {
        errors.push(attributes.level().name_field(), "must not be empty");
    }
    non_negative(errors, "order", attributes.order());
    match attributes {
        Attributes::Board(_) | Attributes::Grade(_) => {}
        Attributes::Subject(a) => {
            if let Some(price) = a.price {
                if !price.is_finite() || price < 0.0 {
                    errors.push("price", "must be >= 0");
                } else if a.is_free && price > 0.0 {
                    errors.push("price", "a free subject cannot carry a price");
                }
            }
        }
        Attributes::Chapter(a) => {
            non_negative(errors, "plannedSessions", a.planned_sessions);
        }
        Attributes::Session(a) => {
            non_negative(errors, "durationMinutes", a.duration_minutes);
            if matches!(a.date.as_deref(), Some(d) if parse_date(d).is_none()) {
                errors.push("date", "must be a date in YYYY-MM-DD form");
            }
            if matches!(a.time.as_deref(), Some(t) if parse_time(t).is_none()) {
                errors.push("time", "must be a time such as 14:30 or 2:30 PM");
            }
        }
    }
}

/// Field rules for `attributes` as a child among `siblings`. `exclude` is the
/// node being edited, which must not count as its own sibling.
pub fn validate(
    attributes: &Attributes,
    siblings: &[Arc<Node>],
    exclude: Option<&NodeId>,
    settings: &Settings,
) -> Result<Vec<ValidationWarning>, ValidationErrors> {
    let level = attributes.level();
    let mut errors = ValidationErrors::new();
    check_fields(attributes, &mut errors);

    let others: Vec<&Arc<Node>> = siblings
        .iter()
        .filter(|s| Some(s.id()) != exclude)
        .collect();
    if let Some(max) = settings.limits.for_level(level) {
        if others.len() + 1 > max {
            errors.push(
                "limit",
                format!("at most {} {} entries allowed under one parent", max, level),
            );
        }
    }
    errors.into_result()?;

    let mut warnings = Vec::new();
    if settings.warn_on_duplicate_names {
        let name = attributes.display_name().trim().to_lowercase();
        if let Some(dup) = others
            .iter()
            .find(|s| s.display_name().trim().to_lowercase() == name)
        {
            warnings.push(ValidationWarning {
                field: level.name_field().to_string(),
                reason: format!("duplicate name among siblings (same as {})", dup.id()),
            });
        }
    }
    Ok(warnings)
}

/// Field rules only, for loading snapshots where sibling checks do not apply.
pub fn validate_fields(attributes: &Attributes) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_fields(attributes, &mut errors);
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChapterAttrs, SubjectAttrs};

    fn session(date: Option<&str>, time: Option<&str>, minutes: Option<i64>) -> SessionAttrs {
        SessionAttrs {
            title: "Intro".to_string(),
            date: date.map(str::to_string),
            time: time.map(str::to_string),
            duration_minutes: minutes,
            ..SessionAttrs::default()
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("datetime")
    }

    fn subject_node(id: &str, name: &str) -> Arc<Node> {
        Arc::new(Node::new(
            NodeId::from(id),
            Attributes::Subject(SubjectAttrs {
                name: name.to_string(),
                ..SubjectAttrs::default()
            }),
            Vec::new(),
        ))
    }

    #[test]
    fn blank_name_and_negative_numbers_fail() {
        let attrs = Attributes::Chapter(ChapterAttrs {
            title: "   ".to_string(),
            planned_sessions: Some(-1),
            order: Some(-2),
            ..ChapterAttrs::default()
        });
        let errs = validate(&attrs, &[], None, &Settings::default()).expect_err("invalid");
        assert!(errs.has_field("title"));
        assert!(errs.has_field("plannedSessions"));
        assert!(errs.has_field("order"));
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn session_date_and_time_must_parse() {
        let bad = Attributes::Session(session(Some("15/10/2025"), Some("25:99"), Some(60)));
        let errs = validate_fields(&bad).expect_err("invalid");
        assert!(errs.has_field("date"));
        assert!(errs.has_field("time"));

        let good = Attributes::Session(session(Some("2025-10-15"), Some("2:30 PM"), Some(60)));
        assert!(validate_fields(&good).is_ok());
    }

    #[test]
    fn duplicate_sibling_name_is_only_a_warning() {
        let siblings = vec![subject_node("s1", "Mathematics")];
        let attrs = Attributes::Subject(SubjectAttrs {
            name: "mathematics ".to_string(),
            ..SubjectAttrs::default()
        });
        let warnings = validate(&attrs, &siblings, None, &Settings::default()).expect("valid");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "name");

        // Editing the node itself is not a duplicate of itself.
        let own = validate(&attrs, &siblings, Some(&NodeId::from("s1")), &Settings::default())
            .expect("valid");
        assert!(own.is_empty());
    }

    #[test]
    fn sibling_limit_comes_from_settings() {
        let mut settings = Settings::default();
        settings.limits.subject = Some(1);
        let siblings = vec![subject_node("s1", "Mathematics")];
        let attrs = Attributes::Subject(SubjectAttrs {
            name: "Physics".to_string(),
            ..SubjectAttrs::default()
        });
        let errs = validate(&attrs, &siblings, None, &settings).expect_err("over limit");
        assert!(errs.has_field("limit"));
        assert!(validate(&attrs, &siblings, Some(&NodeId::from("s1")), &settings).is_ok());
    }

    #[test]
    fn free_subject_with_price_is_rejected() {
        let attrs = Attributes::Subject(SubjectAttrs {
            name: "Physics".to_string(),
            is_free: true,
            price: Some(499.0),
            ..SubjectAttrs::default()
        });
        let errs = validate_fields(&attrs).expect_err("free with price");
        assert!(errs.has_field("price"));

        let zero = Attributes::Subject(SubjectAttrs {
            name: "Physics".to_string(),
            is_free: true,
            price: Some(0.0),
            ..SubjectAttrs::default()
        });
        assert!(validate_fields(&zero).is_ok());
    }

    #[test]
    fn classify_uses_end_of_session() {
        let s = session(Some("2025-10-15"), Some("10:00"), Some(60));
        assert_eq!(classify_session(&s, dt("2025-10-15 10:30")), SessionStatus::Upcoming);
        assert_eq!(classify_session(&s, dt("2025-10-15 11:00")), SessionStatus::Completed);
        let unscheduled = session(None, Some("10:00"), None);
        assert_eq!(classify_session(&unscheduled, dt("2030-01-01 00:00")), SessionStatus::Upcoming);
        let date_only = session(Some("2025-10-15"), None, None);
        assert_eq!(classify_session(&date_only, dt("2025-10-15 00:00")), SessionStatus::Completed);
    }

    #[test]
    fn shift_iso_date_moves_valid_dates_only() {
        assert_eq!(
            shift_iso_date(Some("2025-10-30".to_string()), 7).as_deref(),
            Some("2025-11-06")
        );
        assert_eq!(shift_iso_date(Some("next week".to_string()), 7).as_deref(), Some("next week"));
        assert_eq!(shift_iso_date(Some("  ".to_string()), 7), None);
        assert_eq!(shift_iso_date(None, 7), None);
    }
}
