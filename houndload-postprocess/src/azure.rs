//! Post-processing for cloud directory data.
//!
//! Most steps turn a role assignment into a direct edge from the role holder to whatever that
//! role lets them abuse. Roles are picked by template id, see [`crate::role_templates`].
use houndload_core::{Fragment, Identifier, Params, QueryResult, Statement};
use indoc::indoc;

use crate::{PostProcessStep, role_templates as roles};

/// Rows per inner transaction for batched cloud steps
pub const BATCH_SIZE: u64 = 1000;

/// Relationship types derived by the steps below and removed before they are derived again
pub const DERIVED_RELATIONSHIPS: [&str; 7] = [
    "AZAddSecret",
    "AZExecuteCommand",
    "AZResetPassword",
    "AZAddMembers",
    "AZGlobalAdmin",
    "AZPrivilegedAuthAdmin",
    "AZPrivilegedRoleAdmin",
];

/// Appends the batch size to a statement ending in `IN TRANSACTIONS OF `
fn batched(body: &'static str) -> Statement {
    Statement::compose(&[
        Fragment::Text(body),
        Fragment::Integer(BATCH_SIZE),
        Fragment::Text(" ROWS"),
    ])
}

fn created(result: &QueryResult, relationship: &str) -> String {
    format!(
        "Created {} {relationship} Edges",
        result.counters.relationships_created
    )
}

fn roles_param(name: &str, templates: &[&str]) -> Params {
    Params::new().with(name, templates)
}

fn high_value_role_holders(name: &'static str, template: &str) -> PostProcessStep {
    PostProcessStep::query(
        name,
        Statement::from_static(indoc! {"
            MATCH (n:AZRole {templateid: $templateid})
            OPTIONAL MATCH (g:AZGroup)-[:AZHasRole]->(n)
            OPTIONAL MATCH (i)-[:AZMemberOf]->(g) WHERE i:AZUser OR i:AZServicePrincipal OR i:AZDevice
            OPTIONAL MATCH (p)-[:AZHasRole]->(n) WHERE p:AZUser OR p:AZServicePrincipal OR p:AZDevice
            CALL {
                WITH g, i, p
                SET g.highvalue = true, i.highvalue = true, p.highvalue = true
            } IN TRANSACTIONS OF 500 ROWS"}),
    )
    .with_params(Params::new().with("templateid", template))
}

fn tenant_role_edge(name: &'static str, template: &str, body: &'static str) -> PostProcessStep {
    PostProcessStep::query(name, batched(body))
        .with_params(Params::new().with("templateid", template))
}

/// Password reset rights held by one admin role over holders of the `$targets` roles, as long as
/// the target holds no role outside that list
fn scoped_reset(template: &str, targets: &[&str], description: &'static str) -> PostProcessStep {
    PostProcessStep::query(
        "createAZResetPasswordEdges",
        batched(indoc! {"
            MATCH (at:AZTenant)-[:AZContains]->(admin)-[:AZHasRole]->(:AZRole {templateid: $templateid})
            MATCH (nonTargets:AZUser)-[:AZHasRole]->(ar:AZRole)
            WHERE NOT ar.templateid IN $targets
            WITH COLLECT(nonTargets) AS nonTargets, at, admin
            MATCH (at)-[:AZContains]->(target:AZUser)-[:AZHasRole]->(targetRole)
            WHERE NOT target IN nonTargets AND targetRole.templateid IN $targets
            CALL {
                WITH admin, target
                MERGE (admin)-[:AZResetPassword]->(target)
            } IN TRANSACTIONS OF "}),
    )
    .with_description(description)
    .with_params(
        Params::new()
            .with("templateid", template)
            .with("targets", targets),
    )
    .with_log(|result| Ok(created(result, "AZResetPassword")))
}

/// The cloud step list, in execution order
#[allow(clippy::too_many_lines)]
pub fn steps() -> Vec<PostProcessStep> {
    let derived = DERIVED_RELATIONSHIPS
        .into_iter()
        .map(Identifier::from_static)
        .collect::<Vec<_>>();

    vec![
        PostProcessStep::query(
            "setTenantsHighValue",
            Statement::from_static("MATCH (n:AZTenant) SET n.highvalue = true"),
        )
        .with_description("Mark all tenants as high value"),
        high_value_role_holders("setGlobalAdminHighValue", roles::GLOBAL_ADMIN)
            .with_description("Mark all global admins as high value"),
        high_value_role_holders("setPrivRoleAdminHighValue", roles::PRIVILEGED_ROLE_ADMIN)
            .with_description("Mark all privileged role admins as high value"),
        PostProcessStep::query(
            "clearPostProcessedRels",
            Statement::compose(&[
                Fragment::Text("MATCH (:AZBase)-[r:"),
                Fragment::Alternation(&derived),
                Fragment::Text("]->() CALL { WITH r DELETE r } IN TRANSACTIONS OF "),
                Fragment::Integer(BATCH_SIZE),
                Fragment::Text(" ROWS"),
            ]),
        )
        .with_description("Remove every previously derived relationship")
        .with_log(|result| {
            Ok(format!(
                "Deleted {} post-processed rels",
                result.counters.relationships_deleted
            ))
        }),
        tenant_role_edge(
            "createAZGlobalAdminEdges",
            roles::GLOBAL_ADMIN,
            indoc! {"
                MATCH (n)-[:AZHasRole]->(m)<-[:AZContains]-(t:AZTenant)
                WHERE m.templateid = $templateid
                CALL {
                    WITH n, t
                    MERGE (n)-[:AZGlobalAdmin]->(t)
                } IN TRANSACTIONS OF "},
        )
        .with_description("Global admins get a direct edge to the tenant they hold the role in")
        .with_log(|result| Ok(created(result, "AZGlobalAdmin"))),
        tenant_role_edge(
            "createAZPrivilegedRoleAdminEdges",
            roles::PRIVILEGED_ROLE_ADMIN,
            indoc! {"
                MATCH (n)-[:AZHasRole]->(m)<-[:AZContains]-(t:AZTenant)
                WHERE m.templateid = $templateid
                CALL {
                    WITH n, t
                    MERGE (n)-[:AZPrivilegedRoleAdmin]->(t)
                } IN TRANSACTIONS OF "},
        )
        .with_description(
            "Privileged role admins get a direct edge to the tenant they hold the role in",
        )
        .with_log(|result| Ok(created(result, "AZPrivilegedRoleAdmin"))),
        PostProcessStep::query(
            "createAZResetPasswordEdges",
            batched(indoc! {"
                MATCH (n)-[:AZHasRole]->(m)
                WHERE m.templateid IN $roles
                WITH n
                MATCH (at:AZTenant)-[:AZContains]->(n)
                WITH at, n
                MATCH (at)-[:AZContains]->(u:AZUser)
                WHERE NOT (u)-[:AZHasRole]->()
                CALL {
                    WITH n, u
                    MERGE (n)-[:AZResetPassword]->(u)
                } IN TRANSACTIONS OF "}),
        )
        .with_description(
            "Password reset roles can reset cloud users of the same tenant that hold no admin role",
        )
        .with_params(roles_param("roles", &roles::PASSWORD_RESET_ROLES))
        .with_log(|result| Ok(created(result, "AZResetPassword"))),
        PostProcessStep::query(
            "createAZResetPasswordEdges",
            batched(indoc! {"
                MATCH (n)-[:AZHasRole]->(m)
                WHERE m.templateid IN $roles
                MATCH (at:AZTenant)-[:AZContains]->(n)
                MATCH (at)-[:AZContains]->(u:AZUser)
                CALL {
                    WITH n, u
                    MERGE (n)-[:AZResetPassword]->(u)
                } IN TRANSACTIONS OF "}),
        )
        .with_description(
            "Global admins and privileged authentication admins can reset any user of the same tenant",
        )
        .with_params(roles_param("roles", &roles::RESET_ANY_PASSWORD_ROLES))
        .with_log(|result| Ok(created(result, "AZResetPassword"))),
        scoped_reset(
            roles::AUTHENTICATION_ADMIN,
            &roles::AUTHENTICATION_ADMIN_TARGETS,
            "Authentication admins can reset holders of reader, inviter and lower admin roles",
        ),
        scoped_reset(
            roles::HELPDESK_ADMIN,
            &roles::HELPDESK_ADMIN_TARGETS,
            "Helpdesk admins can reset holders of reader, inviter and lower admin roles",
        ),
        scoped_reset(
            roles::PASSWORD_ADMIN,
            &roles::PASSWORD_ADMIN_TARGETS,
            "Password admins can reset directory readers, guest inviters and other password admins",
        ),
        scoped_reset(
            roles::USER_ADMIN,
            &roles::USER_ADMIN_TARGETS,
            "User admins can reset holders of reader, inviter, helpdesk and user admin roles",
        ),
        PostProcessStep::query(
            "createAZAddSecretEdges",
            batched(indoc! {"
                MATCH (at:AZTenant)
                MATCH (at)-[:AZContains]->(principal)-[:AZHasRole]->(role)<-[:AZContains]-(at)
                WHERE role.templateid IN $roles
                MATCH (at)-[:AZContains]->(target)
                WHERE target:AZApp OR target:AZServicePrincipal
                WITH principal, target
                CALL {
                    WITH principal, target
                    MERGE (principal)-[:AZAddSecret]->(target)
                } IN TRANSACTIONS OF "}),
        )
        .with_description(
            "Application admins can add secrets to any app or service principal of their tenant",
        )
        .with_params(roles_param("roles", &roles::ADD_SECRET_ROLES))
        .with_log(|result| Ok(created(result, "AZAddSecret"))),
        PostProcessStep::query(
            "createAZExecuteCommandEdges",
            batched(indoc! {"
                MATCH (azt:AZTenant)
                MATCH (azt)-[:AZContains]->(admin)-[:AZHasRole]->(:AZRole {templateid: $templateid})
                MATCH (azt)-[:AZContains]->(azd:AZDevice)
                WHERE toUpper(azd.operatingsystem) CONTAINS 'WINDOWS' AND azd.mdmappid IN $mdmappids
                CALL {
                    WITH admin, azd
                    MERGE (admin)-[:AZExecuteCommand]->(azd)
                } IN TRANSACTIONS OF "}),
        )
        .with_description(
            "Intune admins can run commands as SYSTEM on managed Windows devices of their tenant",
        )
        .with_params(
            Params::new()
                .with("templateid", roles::INTUNE_ADMIN)
                .with("mdmappids", roles::INTUNE_MDM_APP_IDS.as_slice()),
        )
        .with_log(|result| Ok(created(result, "AZExecuteCommand"))),
        PostProcessStep::query(
            "createAZAddMembersEdges",
            batched(indoc! {"
                MATCH (n)-[:AZHasRole]->(m)
                WHERE m.templateid IN $roles
                MATCH (at:AZTenant)-[:AZContains]->(n)
                MATCH (at)-[:AZContains]->(azg:AZGroup)
                WHERE azg.isassignabletorole IS NULL OR azg.isassignabletorole = false
                CALL {
                    WITH n, azg
                    MERGE (n)-[:AZAddMembers]->(azg)
                } IN TRANSACTIONS OF "}),
        )
        .with_description("These roles can change members of groups that cannot hold roles")
        .with_params(roles_param("roles", &roles::ADD_MEMBERS_ROLES))
        .with_log(|result| Ok(created(result, "AZAddMembers"))),
        PostProcessStep::query(
            "createAZAddMembersEdges",
            batched(indoc! {"
                MATCH (n)-[:AZHasRole]->(m)
                WHERE m.templateid IN $roles
                MATCH (at:AZTenant)-[:AZContains]->(n)
                MATCH (at)-[:AZContains]->(azg:AZGroup {isassignabletorole: true})
                CALL {
                    WITH n, azg
                    MERGE (n)-[:AZAddMembers]->(azg)
                } IN TRANSACTIONS OF "}),
        )
        .with_description("Global admins and privileged role admins can change members of role assignable groups")
        .with_params(roles_param("roles", &roles::ADD_ROLE_ASSIGNABLE_MEMBERS_ROLES))
        .with_log(|result| Ok(created(result, "AZAddMembers"))),
        PostProcessStep::query(
            "createAZAddOwnerEdges",
            batched(indoc! {"
                MATCH (n)-[:AZHasRole]->(m)
                WHERE m.templateid IN $roles
                MATCH (at:AZTenant)-[:AZContains]->(n)
                MATCH (at)-[:AZContains]->(aza:AZApp)
                CALL {
                    WITH n, aza
                    MERGE (n)-[:AZAddOwner]->(aza)
                } IN TRANSACTIONS OF "}),
        )
        .with_description("These roles can change the owner of any app of their tenant")
        .with_params(roles_param("roles", &roles::ADD_OWNER_ROLES))
        .with_log(|result| Ok(created(result, "AZAddOwner"))),
        PostProcessStep::query(
            "createAZAddOwnerEdges",
            batched(indoc! {"
                MATCH (n)-[:AZHasRole]->(m)
                WHERE m.templateid IN $roles
                MATCH (at:AZTenant)-[:AZContains]->(n)
                MATCH (at)-[:AZContains]->(azsp:AZServicePrincipal)
                CALL {
                    WITH n, azsp
                    MERGE (n)-[:AZAddOwner]->(azsp)
                } IN TRANSACTIONS OF "}),
        )
        .with_description("These roles can change the owner of any service principal of their tenant")
        .with_params(roles_param("roles", &roles::ADD_OWNER_ROLES))
        .with_log(|result| Ok(created(result, "AZAddOwner"))),
    ]
}
