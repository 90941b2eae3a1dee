//! Maps cloud identity records (`{"kind": .., "data": {..}}`) into the three cloud unit groups.
//!
//! Cloud objects land in the cloud group, the on-premises principals they are synchronised from in
//! the on-premises group, and every relationship in the relationship group. The uploader writes the
//! groups in that order, so relationship statements can rely on both ends existing.
use houndload_core::{CloudUnits, Statement};
use serde_json::{Map, Value, json};

use super::units::{Edge, NodeLabel, Units, object_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
enum AzureKind {
    #[strum(serialize = "AZApp")]
    App,
    #[strum(serialize = "AZAppOwner")]
    AppOwner,
    #[strum(serialize = "AZDevice")]
    Device,
    #[strum(serialize = "AZDeviceOwner")]
    DeviceOwner,
    #[strum(serialize = "AZGroup")]
    Group,
    #[strum(serialize = "AZGroupMember")]
    GroupMember,
    #[strum(serialize = "AZGroupOwner")]
    GroupOwner,
    #[strum(serialize = "AZKeyVault")]
    KeyVault,
    #[strum(serialize = "AZManagementGroup")]
    ManagementGroup,
    #[strum(serialize = "AZResourceGroup")]
    ResourceGroup,
    #[strum(serialize = "AZRole")]
    Role,
    #[strum(serialize = "AZRoleAssignment")]
    RoleAssignment,
    #[strum(serialize = "AZServicePrincipal")]
    ServicePrincipal,
    #[strum(serialize = "AZServicePrincipalOwner")]
    ServicePrincipalOwner,
    #[strum(serialize = "AZSubscription")]
    Subscription,
    #[strum(serialize = "AZTenant")]
    Tenant,
    #[strum(serialize = "AZUser")]
    User,
    #[strum(serialize = "AZVM")]
    Vm,
}

/// A property copied from the record data onto the node
struct Field {
    from: &'static str,
    to: &'static str,
    upper: bool,
}

const fn field(from: &'static str, to: &'static str) -> Field {
    Field {
        from,
        to,
        upper: false,
    }
}

const fn upper(from: &'static str, to: &'static str) -> Field {
    Field {
        from,
        to,
        upper: true,
    }
}

const USER_FIELDS: &[Field] = &[
    field("accountEnabled", "enabled"),
    field("userPrincipalName", "userprincipalname"),
    upper("onPremisesSecurityIdentifier", "onpremisesecurityidentifier"),
    field("userType", "usertype"),
];
const GROUP_FIELDS: &[Field] = &[
    field("isAssignableToRole", "isassignabletorole"),
    field("securityEnabled", "securityenabled"),
    upper("onPremisesSecurityIdentifier", "onpremisesecurityidentifier"),
];
const DEVICE_FIELDS: &[Field] = &[
    field("operatingSystem", "operatingsystem"),
    field("operatingSystemVersion", "operatingsystemversion"),
    upper("mdmAppId", "mdmappid"),
    upper("deviceId", "deviceid"),
];
const ROLE_FIELDS: &[Field] = &[
    upper("templateId", "templateid"),
    field("isBuiltIn", "isbuiltin"),
];
const SERVICE_PRINCIPAL_FIELDS: &[Field] = &[
    upper("appId", "appid"),
    field("servicePrincipalType", "serviceprincipaltype"),
];
const APP_FIELDS: &[Field] = &[upper("appId", "appid")];
const RESOURCE_FIELDS: &[Field] = &[
    upper("subscriptionId", "subscriptionid"),
    upper("resourceGroupId", "resourcegroupid"),
];

#[derive(Debug, Default)]
struct CloudCollector {
    cloud: Units,
    on_prem: Units,
    relationships: Units,
}

pub(crate) fn map(records: Vec<Value>) -> CloudUnits {
    let mut collector = CloudCollector::default();

    for record in records {
        let kind = record
            .get("kind")
            .and_then(Value::as_str)
            .and_then(|kind| kind.parse::<AzureKind>().ok());
        let (Some(kind), Some(data)) = (kind, record.get("data")) else {
            tracing::debug!(kind = ?record.get("kind"), "Skipping unsupported cloud record");
            continue;
        };

        collector.record(kind, data);
    }

    CloudUnits {
        cloud: collector.cloud.into_inner(),
        on_prem: collector.on_prem.into_inner(),
        relationships: collector.relationships.into_inner(),
    }
}

impl CloudCollector {
    fn record(&mut self, kind: AzureKind, data: &Value) {
        match kind {
            AzureKind::Tenant => {
                self.object(NodeLabel::AzTenant, data, &[]);
            }
            AzureKind::User => {
                if let Some(objectid) = self.object(NodeLabel::AzUser, data, USER_FIELDS) {
                    self.synced_from(
                        &objectid,
                        data,
                        NodeLabel::AzUser,
                        NodeLabel::User,
                        "SyncedToADUser",
                    );
                }
            }
            AzureKind::Group => {
                if let Some(objectid) = self.object(NodeLabel::AzGroup, data, GROUP_FIELDS) {
                    self.synced_from(
                        &objectid,
                        data,
                        NodeLabel::AzGroup,
                        NodeLabel::Group,
                        "SyncedToADGroup",
                    );
                }
            }
            AzureKind::Device => {
                self.object(NodeLabel::AzDevice, data, DEVICE_FIELDS);
            }
            AzureKind::Role => {
                self.object(NodeLabel::AzRole, data, ROLE_FIELDS);
            }
            AzureKind::ServicePrincipal => {
                if let Some(objectid) =
                    self.object(NodeLabel::AzServicePrincipal, data, SERVICE_PRINCIPAL_FIELDS)
                {
                    self.runs_as(&objectid, data);
                }
            }
            AzureKind::App => {
                self.object(NodeLabel::AzApp, data, APP_FIELDS);
            }
            AzureKind::Subscription => {
                self.object(NodeLabel::AzSubscription, data, RESOURCE_FIELDS);
            }
            AzureKind::ManagementGroup => {
                self.object(NodeLabel::AzManagementGroup, data, &[]);
            }
            AzureKind::ResourceGroup => self.resource(
                NodeLabel::AzResourceGroup,
                data,
                NodeLabel::AzSubscription,
                "subscriptionId",
            ),
            AzureKind::KeyVault => self.resource(
                NodeLabel::AzKeyVault,
                data,
                NodeLabel::AzResourceGroup,
                "resourceGroupId",
            ),
            AzureKind::Vm => self.resource(
                NodeLabel::AzVm,
                data,
                NodeLabel::AzResourceGroup,
                "resourceGroupId",
            ),
            AzureKind::GroupMember => self.group_members(data),
            AzureKind::GroupOwner => self.owners(data, "groupId", NodeLabel::AzGroup),
            AzureKind::AppOwner => self.owners(data, "appId", NodeLabel::AzApp),
            AzureKind::ServicePrincipalOwner => {
                self.owners(data, "servicePrincipalId", NodeLabel::AzServicePrincipal);
            }
            AzureKind::DeviceOwner => self.owners(data, "deviceId", NodeLabel::AzDevice),
            AzureKind::RoleAssignment => self.role_assignments(data),
        }
    }

    /// Adds a cloud node and its tenant containment. Returns the node's object id.
    fn object(&mut self, label: NodeLabel, data: &Value, fields: &[Field]) -> Option<String> {
        let tenant = object_id(data.get("tenantId"));
        let objectid = match label {
            // Role definitions share ids across tenants
            NodeLabel::AzRole => object_id(data.get("id"))
                .zip(tenant.clone())
                .map(|(id, tenant)| format!("{id}@{tenant}")),
            _ => object_id(data.get("id")),
        };
        let Some(objectid) = objectid else {
            tracing::debug!(%label, "Skipping cloud object without an id");
            return None;
        };

        let mut map = Map::new();
        let name = ["userPrincipalName", "displayName", "name"]
            .into_iter()
            .find_map(|key| data.get(key).and_then(Value::as_str));
        if let Some(name) = name {
            map.insert("name".into(), name.to_uppercase().into());
        }
        if let Some(display_name) = data.get("displayName") {
            map.insert("displayname".into(), display_name.clone());
        }
        match (&tenant, label) {
            (_, NodeLabel::AzTenant) => {
                map.insert("tenantid".into(), objectid.clone().into());
            }
            (Some(tenant), _) => {
                map.insert("tenantid".into(), tenant.clone().into());
            }
            (None, _) => {}
        }
        for field in fields {
            let value = match data.get(field.from) {
                Some(Value::String(value)) if field.upper => Value::String(value.to_uppercase()),
                Some(Value::Null) | None => continue,
                Some(value) => value.clone(),
            };
            map.insert(field.to.into(), value);
        }

        self.cloud.node(label, &objectid, Value::Object(map));

        if let (Some(tenant), false) = (tenant, label == NodeLabel::AzTenant) {
            self.relationships.edge(
                &Edge::new(NodeLabel::AzTenant, "AZContains", label),
                &tenant,
                &objectid,
                json!({}),
            );
        }

        Some(objectid)
    }

    /// Adds a subscription resource, contained in its parent when the parent is known
    fn resource(&mut self, label: NodeLabel, data: &Value, parent: NodeLabel, parent_key: &str) {
        let Some(objectid) = self.object(label, data, RESOURCE_FIELDS) else {
            return;
        };

        if let Some(parent_id) = object_id(data.get(parent_key)) {
            self.relationships.edge(
                &Edge::new(parent, "AZContains", label),
                &parent_id,
                &objectid,
                json!({}),
            );
        }
    }

    /// Links a cloud principal to the on-premises principal it is synchronised from
    fn synced_from(
        &mut self,
        objectid: &str,
        data: &Value,
        cloud: NodeLabel,
        on_prem: NodeLabel,
        rel: &'static str,
    ) {
        let Some(sid) = object_id(data.get("onPremisesSecurityIdentifier")) else {
            return;
        };

        self.on_prem.node(on_prem, &sid, json!({}));
        self.relationships
            .edge(&Edge::new(cloud, rel, on_prem), objectid, &sid, json!({}));
    }

    /// Applications run as the service principals carrying their application id
    fn runs_as(&mut self, objectid: &str, data: &Value) {
        let Some(app_id) = object_id(data.get("appId")) else {
            return;
        };

        self.relationships.custom(
            "rels/AZApp-AZRunsAs-AZServicePrincipal",
            || {
                Statement::from_static(
                    "UNWIND $props AS prop MATCH (a:AZApp {appid: prop.appid}) MATCH (s:AZBase {objectid: prop.target}) MERGE (a)-[:AZRunsAs]->(s)",
                )
            },
            json!({"appid": app_id, "target": objectid}),
        );
    }

    fn group_members(&mut self, data: &Value) {
        let Some(group) = object_id(data.get("groupId")) else {
            return;
        };

        for member in members(data, "members", "member") {
            let Some(member_id) = object_id(member.get("id")) else {
                continue;
            };
            self.relationships.edge(
                &Edge::new(principal_label(member), "AZMemberOf", NodeLabel::AzGroup),
                &member_id,
                &group,
                json!({}),
            );
        }
    }

    fn owners(&mut self, data: &Value, key: &str, target: NodeLabel) {
        let Some(owned) = object_id(data.get(key)) else {
            return;
        };

        for owner in members(data, "owners", "owner") {
            let Some(owner_id) = object_id(owner.get("id")) else {
                continue;
            };
            self.relationships.edge(
                &Edge::new(principal_label(owner), "AZOwns", target),
                &owner_id,
                &owned,
                json!({}),
            );
        }
    }

    /// Tenant wide role assignments become `AZHasRole` edges
    fn role_assignments(&mut self, data: &Value) {
        let Some(tenant) = object_id(data.get("tenantId")) else {
            return;
        };
        let Some(assignments) = data.get("roleAssignments").and_then(Value::as_array) else {
            return;
        };

        for assignment in assignments {
            let scope = assignment
                .get("directoryScopeId")
                .and_then(Value::as_str)
                .unwrap_or("/");
            if scope != "/" {
                continue;
            }

            let (Some(principal), Some(role)) = (
                object_id(assignment.get("principalId")),
                object_id(
                    assignment
                        .get("roleDefinitionId")
                        .or_else(|| data.get("roleDefinitionId")),
                ),
            ) else {
                continue;
            };

            self.relationships.edge(
                &Edge::new(NodeLabel::AzBase, "AZHasRole", NodeLabel::AzRole),
                &principal,
                &format!("{role}@{tenant}"),
                json!({}),
            );
        }
    }
}

/// Entries of `list_key`, each unwrapped from its `item_key` envelope
fn members<'a>(
    data: &'a Value,
    list_key: &str,
    item_key: &'a str,
) -> impl Iterator<Item = &'a Value> {
    data.get(list_key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(move |entry| entry.get(item_key))
}

fn principal_label(principal: &Value) -> NodeLabel {
    match principal.get("@odata.type").and_then(Value::as_str) {
        Some("#microsoft.graph.user") => NodeLabel::AzUser,
        Some("#microsoft.graph.group") => NodeLabel::AzGroup,
        Some("#microsoft.graph.servicePrincipal") => NodeLabel::AzServicePrincipal,
        Some("#microsoft.graph.device") => NodeLabel::AzDevice,
        _ => NodeLabel::AzBase,
    }
}
