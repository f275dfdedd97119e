use regex::Regex;

use crate::error::{PreviewError, Result, Stage};
use crate::railway::Platform;

/// Return the public domain of a service, generating one when none is attached.
///
/// Domains are taken in the order the platform lists them. With a `pattern`,
/// the first matching domain is preferred over the first overall.
pub async fn resolve_domain(
    api: &dyn Platform,
    project_id: &str,
    environment_id: &str,
    service_id: &str,
    service_name: &str,
    pattern: Option<&Regex>,
) -> Result<String> {
    let domains = api
        .domains(project_id, environment_id, service_id)
        .await
        .map_err(|e| {
            PreviewError::transport(
                Stage::Domain,
                format!("failed to list domains of service {service_name}"),
                e,
            )
        })?;

    if let Some(domain) = choose_domain(&domains, pattern) {
        tracing::info!(service = %service_name, domain = %domain, "domain: using existing domain");
        return Ok(domain.to_string());
    }

    tracing::info!(service = %service_name, "domain: no domain attached, generating one");
    let created = api
        .create_service_domain(environment_id, service_id)
        .await
        .map_err(|e| {
            PreviewError::transport(
                Stage::Domain,
                format!("failed to create a domain for service {service_name}"),
                e,
            )
        })?;

    if created.trim().is_empty() {
        return Err(PreviewError::DomainUnavailable {
            service: service_name.to_string(),
            environment_id: environment_id.to_string(),
        });
    }
    Ok(created)
}

fn choose_domain<'a>(domains: &'a [String], pattern: Option<&Regex>) -> Option<&'a str> {
    let usable = move || domains.iter().map(String::as_str).filter(|d| !d.is_empty());
    pattern
        .and_then(|re| usable().find(|d| re.is_match(d)))
        .or_else(|| usable().next())
}
