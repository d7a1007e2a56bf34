// src/analysis/classifier.rs

use crate::types::ActionKind;

pub const STOP_THRESHOLD: f64 = 85.0;
pub const WARN_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Option<ActionKind>,
    pub message: String,
}

impl Decision {
    pub fn is_stop(&self) -> bool {
        self.action == Some(ActionKind::Stop)
    }
}

/// Map a risk score to an operator action. First matching band wins.
pub fn classify(risk: f64, has_phone: bool) -> Decision {
    if risk > STOP_THRESHOLD {
        Decision {
            action: Some(ActionKind::Stop),
            message: format!("🚨 EMERGENCY: risk {:.1}%", risk),
        }
    } else if risk > WARN_THRESHOLD {
        Decision {
            action: Some(ActionKind::Warn),
            message: format!("⚠️ ALERT: risk {:.1}%", risk),
        }
    } else if has_phone {
        Decision {
            action: None,
            message: "📱 DISTRACTION DETECTED".to_string(),
        }
    } else {
        Decision {
            action: None,
            message: "NOMINAL OPERATION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_band() {
        let decision = classify(92.34, false);
        assert_eq!(decision.action, Some(ActionKind::Stop));
        assert!(decision.message.contains("92.3"));
        assert!(decision.is_stop());
    }

    #[test]
    fn test_warn_band() {
        let decision = classify(55.0, true);
        assert_eq!(decision.action, Some(ActionKind::Warn));
        assert!(decision.message.contains("55.0"));
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        assert_eq!(classify(85.0, false).action, Some(ActionKind::Warn));
        assert_eq!(classify(40.0, false).action, None);
    }

    #[test]
    fn test_distraction_without_action() {
        let decision = classify(12.0, true);
        assert_eq!(decision.action, None);
        assert!(decision.message.contains("DISTRACTION"));

        let nominal = classify(12.0, false);
        assert_eq!(nominal.action, None);
        assert_eq!(nominal.message, "NOMINAL OPERATION");
    }
}
