use std::fs;
use std::path::Path;

use compline_core::domain::approval::{
    ApprovalLineTemplate, ApproverRule, StepType, TemplateId, TemplateStep,
};
use compline_db::SqlTemplateRepository;
use serde::Deserialize;

use crate::commands::{with_database, CommandResult, StepFailure};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateFile {
    id: String,
    work_type: String,
    name: String,
    #[serde(default)]
    steps: Vec<StepEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepEntry {
    order: u32,
    name: String,
    step_type: StepType,
    #[serde(default = "fixed_user")]
    approver_rule: ApproverRule,
    #[serde(default)]
    approver_ref: String,
    #[serde(default = "required_by_default")]
    required: bool,
}

fn fixed_user() -> ApproverRule {
    ApproverRule::FixedUser
}

fn required_by_default() -> bool {
    true
}

pub fn import(path: &Path) -> CommandResult {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "template_import",
                "template_invalid",
                format!("failed to read `{}`: {error}", path.display()),
                6,
            );
        }
    };

    let template = match parse_template(&raw) {
        Ok(template) => template,
        Err(message) => {
            return CommandResult::failure(
                "template_import",
                "template_invalid",
                format!("`{}`: {message}", path.display()),
                6,
            );
        }
    };

    with_database("template_import", |pool| async move {
        SqlTemplateRepository::new(pool)
            .save_template(&template)
            .await
            .map_err(|error| StepFailure::new("storage", error.to_string(), 7))?;
        Ok(format!(
            "imported template `{}` ({}) with {} step(s)",
            template.id,
            template.work_type,
            template.step_count()
        ))
    })
}

/// Parses and validates a template file without touching storage.
pub fn parse_template(raw: &str) -> Result<ApprovalLineTemplate, String> {
    let file: TemplateFile = toml::from_str(raw).map_err(|error| error.to_string())?;

    for (field, value) in [("id", &file.id), ("work_type", &file.work_type), ("name", &file.name)] {
        if value.trim().is_empty() {
            return Err(format!("`{field}` must not be blank"));
        }
    }

    let template = ApprovalLineTemplate {
        id: TemplateId(file.id.trim().to_string()),
        work_type: file.work_type.trim().to_string(),
        name: file.name.trim().to_string(),
        steps: file
            .steps
            .into_iter()
            .map(|step| TemplateStep {
                order: step.order,
                name: step.name,
                step_type: step.step_type,
                approver_rule: step.approver_rule,
                approver_ref: step.approver_ref.trim().to_string(),
                required: step.required,
            })
            .collect(),
    };
    template.validate().map_err(|violation| violation.to_string())?;

    if let Some(step) = template
        .steps
        .iter()
        .find(|step| step.step_type != StepType::Draft && step.approver_ref.is_empty())
    {
        return Err(format!("step {} (`{}`) has no approver_ref", step.order, step.name));
    }

    Ok(template)
}
