//! The function-app stack
//!
//! Resource group, storage account, telemetry, a Linux consumption plan, a
//! function app with a staging slot, and a key vault the app's identity can
//! read secrets from.

use stackflow_core::kinds::{
    AppServicePlan, AppServicePlanArgs, Component, ComponentArgs, ManagedServiceIdentity,
    ResourceGroup, ResourceGroupArgs, SiteConfig, SkuDescription, StorageAccount,
    StorageAccountArgs, StorageKind, StorageSku, Vault, VaultArgs, VaultProperties, WebApp,
    WebAppArgs, WebAppSlot, WebAppSlotArgs,
};
use stackflow_core::{ConfigurationError, DeploymentContext, Permissions, SecretPermission, Stack};

const FUNCTION_KIND: &str = "FunctionApp";

/// Declare every resource of the stack for `context`
pub fn build(context: DeploymentContext) -> Result<Stack, ConfigurationError> {
    let mut stack = Stack::new(context.clone());

    let group = ResourceGroup::new(
        &mut stack,
        context.resource_name(""),
        ResourceGroupArgs {
            resource_group_name: None,
            location: Some(context.location.clone().into()),
        },
    )?;

    let storage = StorageAccount::new(
        &mut stack,
        context.compact_name(),
        StorageAccountArgs {
            sku: StorageSku::StandardLrs,
            kind: StorageKind::StorageV2,
            ..StorageAccountArgs::new(&group.name)
        },
    )?;

    let insights = Component::new(&mut stack, "appInsights", ComponentArgs::web(&group.name))?;

    let plan = AppServicePlan::new(
        &mut stack,
        context.resource_name("plan"),
        AppServicePlanArgs {
            resource_group_name: (&group.name).into(),
            kind: "Linux".to_string(),
            sku: SkuDescription::consumption(),
            reserved: true,
            location: None,
        },
    )?;

    let site_config = SiteConfig::new()
        .setting("AzureWebJobsStorage", storage.connection_string())
        .setting("FUNCTIONS_WORKER_RUNTIME", "dotnet")
        .setting("FUNCTIONS_EXTENSION_VERSION", "~4")
        .setting("SCM_DO_BUILD_DURING_DEPLOYMENT", "FALSE")
        .setting("APPINSIGHTS_INSTRUMENTATIONKEY", &insights.instrumentation_key);

    let app_name = context.resource_name("function");
    let app = WebApp::new(
        &mut stack,
        app_name.clone(),
        WebAppArgs {
            name: Some(app_name.into()),
            kind: FUNCTION_KIND.to_string(),
            resource_group_name: (&group.name).into(),
            server_farm_id: (&plan.id).into(),
            site_config: site_config.clone(),
            identity: Some(ManagedServiceIdentity::system_assigned()),
        },
    )?;

    WebAppSlot::new(
        &mut stack,
        "staging",
        WebAppSlotArgs {
            name: (&app.name).into(),
            slot: "staging".to_string(),
            kind: FUNCTION_KIND.to_string(),
            resource_group_name: (&group.name).into(),
            server_farm_id: (&plan.id).into(),
            site_config,
            identity: Some(ManagedServiceIdentity::system_assigned()),
        },
    )?;

    let mut properties = VaultProperties::new(context.tenant_id.clone());
    properties.enabled_for_deployment = true;
    properties.enabled_for_disk_encryption = true;
    properties.enabled_for_template_deployment = true;
    let mut vault = VaultArgs {
        vault_name: Some(context.resource_name("vault").into()),
        location: Some((&group.location).into()),
        resource_group_name: (&group.name).into(),
        properties,
    };
    stackflow_core::bind(
        &mut vault,
        &app.principal_id,
        Permissions::secrets([SecretPermission::Get]),
    )?;
    Vault::new(&mut stack, "vault", vault)?;

    stack.export("primaryStorageKey", &storage.primary_key);

    Ok(stack)
}
