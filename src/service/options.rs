use crate::core::ExportSwitch;
use crate::error::OptionError;

/// Key toggling user event export.
pub const EVENTS_KEY: &str = "events";

/// Unary response of `set_option`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionResult {
    pub successful: bool,
    pub errstr: Option<String>,
}

impl From<Result<(), OptionError>> for OptionResult {
    fn from(res: Result<(), OptionError>) -> Self {
        match res {
            Ok(()) => OptionResult {
                successful: true,
                errstr: None,
            },
            Err(e) => OptionResult {
                successful: false,
                errstr: Some(e.to_string()),
            },
        }
    }
}

/// Applies one option; nothing changes when the key or value is rejected.
pub(crate) fn apply(export: &ExportSwitch, key: &str, value: &str) -> Result<(), OptionError> {
    if key != EVENTS_KEY {
        return Err(OptionError::UnknownOption {
            key: key.to_string(),
        });
    }
    match value {
        "start" => export.set(true),
        "stop" => export.set(false),
        other => {
            return Err(OptionError::UnknownValue {
                key: key.to_string(),
                value: other.to_string(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_start_and_stop() {
        let export = ExportSwitch::new(false);
        apply(&export, "events", "start").expect("start");
        assert!(export.is_enabled());
        apply(&export, "events", "stop").expect("stop");
        assert!(!export.is_enabled());
    }

    #[test]
    fn rejections_leave_export_alone() {
        let export = ExportSwitch::new(true);

        let err = apply(&export, "events", "pause").unwrap_err();
        assert_eq!(err.to_string(), "Unknown value pause for key events");

        let res = OptionResult::from(apply(&export, "bogus", "start"));
        assert!(!res.successful);
        assert_eq!(res.errstr.as_deref(), Some("Unknown key bogus"));

        assert!(export.is_enabled());
    }
}
