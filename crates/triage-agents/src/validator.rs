use std::sync::Arc;

use triage_core::{
    is_read_only_command, matches_destructive_pattern, AllowList, Inventory, ResolutionPlan,
    ValidationResult,
};

const ADVISORY_CONFIDENCE_PENALTY: f64 = 0.15;
const MIN_APPROVED_CONFIDENCE: f64 = 0.1;

/// Decides whether a plan may be offered for human approval.
pub trait Validator: Send + Sync {
    fn validate(&self, plan: &ResolutionPlan) -> ValidationResult;
}

/// Deterministic checks against the inventory and the rendered allow-list.
///
/// Any rejection reason denies the plan. Advisories only lower confidence.
pub struct PolicyValidator {
    inventory: Arc<Inventory>,
    allow_list: Arc<AllowList>,
}

impl PolicyValidator {
    pub fn new(inventory: Arc<Inventory>, allow_list: Arc<AllowList>) -> Self {
        Self {
            inventory,
            allow_list,
        }
    }

    fn rejections(&self, plan: &ResolutionPlan) -> Vec<String> {
        let mut reasons = Vec::new();
        if plan.resolution_steps.is_empty() {
            reasons.push("plan has no steps".to_string());
        }
        let Some(spec) = self.inventory.get(&plan.server) else {
            reasons.push(format!("unknown server '{}'", plan.server));
            return reasons;
        };
        if !spec.hosts_service(&plan.service)
            || self.allow_list.playbook(&plan.server, &plan.service).is_none()
        {
            reasons.push(format!(
                "service '{}' is not managed on '{}'",
                plan.service, plan.server
            ));
            return reasons;
        }

        for (index, step) in plan.resolution_steps.iter().enumerate() {
            let number = index + 1;
            let Some(entry) = self
                .allow_list
                .lookup(&plan.server, &plan.service, &step.step)
            else {
                reasons.push(format!(
                    "step {number} action '{}' is not allow-listed for {} on {}",
                    step.step, plan.service, plan.server
                ));
                continue;
            };
            let destructive = entry.destructive || matches_destructive_pattern(&step.step);
            if destructive && step.rollback.is_none() {
                reasons.push(format!("step {number} is destructive and has no rollback"));
            }
            if !entry.idempotent {
                reasons.push(format!("step {number} is not idempotent"));
            }
            if !is_read_only_command(&step.validation) {
                reasons.push(format!(
                    "step {number} validation '{}' is not read-only",
                    step.validation
                ));
            } else if !self.allow_list.permits(&plan.server, &step.validation) {
                reasons.push(format!(
                    "step {number} validation '{}' is not allow-listed",
                    step.validation
                ));
            }
            if let Some(rollback) = &step.rollback {
                if !self.allow_list.permits(&plan.server, rollback) {
                    reasons.push(format!(
                        "step {number} rollback '{rollback}' is not allow-listed"
                    ));
                }
            }
        }
        reasons
    }

    fn advisories(plan: &ResolutionPlan) -> (Vec<String>, Vec<String>) {
        let mut risks = Vec::new();
        let mut suggestions = Vec::new();
        for (index, step) in plan.resolution_steps.iter().enumerate() {
            if step.rollback.is_none() && !is_read_only_command(&step.step) {
                risks.push(format!(
                    "step {} '{}' changes state and cannot be rolled back",
                    index + 1,
                    step.step
                ));
                suggestions.push(format!(
                    "add a rollback for step {} or confirm the change is acceptable",
                    index + 1
                ));
            }
        }
        (risks, suggestions)
    }
}

impl Validator for PolicyValidator {
    fn validate(&self, plan: &ResolutionPlan) -> ValidationResult {
        let rejections = self.rejections(plan);
        let (mut risks, suggestions) = Self::advisories(plan);
        if !rejections.is_empty() {
            tracing::info!(
                server = %plan.server,
                service = %plan.service,
                rejections = rejections.len(),
                "plan rejected"
            );
            risks.extend(rejections.iter().cloned());
            return ValidationResult {
                approved: false,
                confidence: 0.0,
                reason: rejections.join("; "),
                risks_identified: risks,
                suggested_modifications: suggestions,
            };
        }

        let confidence = (1.0 - ADVISORY_CONFIDENCE_PENALTY * risks.len() as f64)
            .clamp(MIN_APPROVED_CONFIDENCE, 1.0);
        let reason = if risks.is_empty() {
            "all steps are allow-listed with read-only validation".to_string()
        } else {
            format!(
                "all steps are allow-listed; {} advisory risk(s) noted",
                risks.len()
            )
        };
        ValidationResult {
            approved: true,
            confidence,
            reason,
            risks_identified: risks,
            suggested_modifications: suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{CommandCatalog, CommandSpec, Severity, Step, StepPhase};

    fn validator_with(catalog: &CommandCatalog) -> PolicyValidator {
        let inventory = Arc::new(Inventory::default());
        let allow_list = Arc::new(AllowList::build(&inventory, catalog));
        PolicyValidator::new(inventory, allow_list)
    }

    fn nginx_plan(steps: Vec<Step>) -> ResolutionPlan {
        ResolutionPlan {
            issue_summary: "502".to_string(),
            service: "nginx".to_string(),
            server: "web01".to_string(),
            severity: Severity::High,
            resolution_steps: steps,
            risks: Vec::new(),
            prerequisites: Vec::new(),
        }
    }

    fn step(action: &str, validation: &str, rollback: Option<&str>) -> Step {
        Step {
            step: action.to_string(),
            intent: None,
            phase: StepPhase::Remediate,
            purpose: "test".to_string(),
            validation: validation.to_string(),
            rollback: rollback.map(str::to_string),
        }
    }

    #[test]
    fn unit_playbook_plan_is_approved() {
        let validator = validator_with(&CommandCatalog::default());
        let result = validator.validate(&nginx_plan(vec![
            step(
                "systemctl show nginx --property=ActiveState,SubState,NRestarts",
                "systemctl show nginx --property=LoadState",
                None,
            ),
            step(
                "sudo systemctl restart nginx",
                "systemctl is-active nginx",
                Some("sudo cp -p /etc/nginx/nginx.conf.bak /etc/nginx/nginx.conf && sudo systemctl restart nginx"),
            ),
            step("curl -fsS -I http://localhost/", "systemctl is-active nginx", None),
        ]));
        assert!(result.approved, "{}", result.reason);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unit_empty_plan_is_rejected() {
        let result = validator_with(&CommandCatalog::default()).validate(&nginx_plan(Vec::new()));
        assert!(!result.approved);
        assert!(result.reason.contains("no steps"));
    }

    #[test]
    fn unit_unlisted_action_and_unknown_target_are_rejected() {
        let validator = validator_with(&CommandCatalog::default());
        let result = validator.validate(&nginx_plan(vec![step(
            "sudo rm -rf /var/www",
            "systemctl is-active nginx",
            None,
        )]));
        assert!(!result.approved);
        assert!(result.reason.contains("not allow-listed"));

        let mut plan = nginx_plan(vec![step("uptime", "uptime", None)]);
        plan.server = "web99".to_string();
        let result = validator.validate(&plan);
        assert!(!result.approved);
        assert!(result.reason.contains("unknown server 'web99'"));
    }

    #[test]
    fn unit_mutating_validation_and_unlisted_rollback_are_rejected() {
        let validator = validator_with(&CommandCatalog::default());
        let result = validator.validate(&nginx_plan(vec![step(
            "sudo systemctl restart nginx",
            "sudo systemctl restart nginx",
            Some("sudo reboot"),
        )]));
        assert!(!result.approved);
        assert!(result.reason.contains("is not read-only"));
        assert!(result.reason.contains("rollback 'sudo reboot' is not allow-listed"));
    }

    #[test]
    fn unit_destructive_or_non_idempotent_entries_are_rejected() {
        let mut catalog = CommandCatalog::default();
        let nginx = catalog.services.get_mut("nginx").expect("nginx");
        nginx.playbook.push(CommandSpec {
            intent: "purge_cache".to_string(),
            phase: StepPhase::Remediate,
            purpose: "purge".to_string(),
            action: "sudo find /var/cache/nginx -type f -delete".to_string(),
            validation: "systemctl is-active {unit}".to_string(),
            rollback: None,
            idempotent: false,
            destructive: true,
        });
        let validator = validator_with(&catalog);
        let result = validator.validate(&nginx_plan(vec![step(
            "sudo find /var/cache/nginx -type f -delete",
            "systemctl is-active nginx",
            None,
        )]));
        assert!(!result.approved);
        assert!(result.reason.contains("destructive and has no rollback"));
        assert!(result.reason.contains("not idempotent"));
    }

    #[test]
    fn unit_mutating_step_without_rollback_is_advisory() {
        let validator = validator_with(&CommandCatalog::default());
        let mut plan = nginx_plan(Vec::new());
        plan.server = "app01".to_string();
        plan.service = "tomcat".to_string();
        plan.resolution_steps = vec![step(
            "sudo systemctl restart tomcat",
            "systemctl is-active tomcat",
            None,
        )];
        let result = validator.validate(&plan);
        assert!(result.approved, "{}", result.reason);
        assert_eq!(result.risks_identified.len(), 1);
        assert_eq!(result.suggested_modifications.len(), 1);
        assert!(result.confidence < 1.0);
    }
}
