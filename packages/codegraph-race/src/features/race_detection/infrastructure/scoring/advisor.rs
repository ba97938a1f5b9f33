/// Testing advice per severity
///
/// | Severity | Requirement   | Priority |
/// |----------|---------------|----------|
/// | critical | mandatory     | P0       |
/// | high     | recommended   | P1       |
/// | medium   | optional      | P2       |
/// | low      | documentation | P3       |
use crate::features::race_detection::domain::{
    Severity, TestPriority, TestingAdvice, TestingRequirement,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestingAdvisor;

impl TestingAdvisor {
    pub fn advise(&self, severity: Severity) -> TestingAdvice {
        let (requirement, priority) = match severity {
            Severity::Critical => (TestingRequirement::Mandatory, TestPriority::P0),
            Severity::High => (TestingRequirement::Recommended, TestPriority::P1),
            Severity::Medium => (TestingRequirement::Optional, TestPriority::P2),
            Severity::Low => (TestingRequirement::Documentation, TestPriority::P3),
        };
        TestingAdvice {
            requirement,
            priority,
        }
    }

    /// Unknown labels get the `low` advice
    pub fn advise_label(&self, label: &str) -> TestingAdvice {
        self.advise(Severity::from_label(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advice_matrix() {
        let advisor = TestingAdvisor;
        let critical = advisor.advise(Severity::Critical);
        assert_eq!(critical.requirement, TestingRequirement::Mandatory);
        assert_eq!(critical.priority, TestPriority::P0);

        let medium = advisor.advise_label("medium");
        assert_eq!(medium.requirement, TestingRequirement::Optional);
        assert_eq!(medium.priority, TestPriority::P2);
    }

    #[test]
    fn test_unknown_label_defaults_to_low() {
        let advisor = TestingAdvisor;
        assert_eq!(advisor.advise_label("severe"), advisor.advise(Severity::Low));
        assert_eq!(advisor.advise_label(""), advisor.advise(Severity::Low));
    }
}
