use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::context::ToolContext;
use super::schema::{FieldSpec, InputSchema};
use super::types::{handler, NoArgs, ToolDefinition};
use crate::error::ToolError;
use crate::store::PROFILE_SECTIONS;

#[derive(Debug, Deserialize)]
struct UpdateProfileArgs {
    content: String,
    section: Option<String>,
}

async fn read_user_profile(_: NoArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let content = ctx.profile.read().await?;
    Ok(json!({ "content": content }))
}

async fn update_user_profile(args: UpdateProfileArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    match args.section.as_deref() {
        Some(section) => {
            ctx.profile.write_section(section, &args.content).await?;
            info!(section, "update_user_profile: section replaced");
        }
        None => {
            ctx.profile.write(&args.content).await?;
            info!("update_user_profile: full profile replaced");
        }
    }
    let content = ctx.profile.read().await?;
    Ok(json!({ "content": content }))
}

pub fn tools() -> Vec<ToolDefinition> {
    let sections = PROFILE_SECTIONS.join(", ");
    vec![
        ToolDefinition::new(
            "read_user_profile",
            &format!(
                "Read the user's job search profile. Returns the full markdown content with sections: {}.",
                sections
            ),
            InputSchema::new(),
            handler(read_user_profile),
        ),
        ToolDefinition::new(
            "update_user_profile",
            "Update the user's job search profile. Provide 'section' to update only that section without overwriting the rest. Omit 'section' to replace the entire profile.",
            InputSchema::new()
                .field(
                    FieldSpec::string(
                        "content",
                        "New markdown content for the section (or full profile if section is omitted)",
                    )
                    .required(),
                )
                .field(
                    FieldSpec::string("section", "Profile section to update. Omit to replace the entire profile.")
                        .one_of(&PROFILE_SECTIONS),
                ),
            handler(update_user_profile),
        ),
    ]
}
