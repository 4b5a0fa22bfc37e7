use super::registry::ToolRegistry;
use super::{job_search, jobs, profile, resume, search_results, web};
use crate::error::RegistryError;

/// Every tool the agent exposes, composed in catalog order.
pub fn build_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register_all(job_search::tools())?;
    registry.register_all(web::tools())?;
    registry.register_all(jobs::tools())?;
    registry.register_all(profile::tools())?;
    registry.register_all(resume::tools())?;
    registry.register_all(search_results::tools())?;
    Ok(registry)
}
