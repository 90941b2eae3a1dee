//! Maps on-premises directory records (SharpHound v4+) into upload units.
use houndload_core::{Identifier, RecordType, UnitMap};
use serde_json::{Map, Value, json};

use super::units::{Edge, NodeLabel, Units, entries, object_id};

/// Local group memberships on a computer and the edge each one grants
const LOCAL_GROUPS: [(&str, &str); 4] = [
    ("LocalAdmins", "AdminTo"),
    ("RemoteDesktopUsers", "CanRDP"),
    ("DcomUsers", "ExecuteDCOM"),
    ("PSRemoteUsers", "CanPSRemote"),
];

const SESSION_KINDS: [&str; 3] = ["Sessions", "PrivilegedSessions", "RegistrySessions"];

/// Node label for the objects in a file of the given type
pub(crate) fn label_for(record_type: RecordType) -> Option<NodeLabel> {
    match record_type {
        RecordType::Computers => Some(NodeLabel::Computer),
        RecordType::Groups => Some(NodeLabel::Group),
        RecordType::Users => Some(NodeLabel::User),
        RecordType::Domains => Some(NodeLabel::Domain),
        RecordType::Ous => Some(NodeLabel::Ou),
        RecordType::Gpos => Some(NodeLabel::Gpo),
        RecordType::Containers => Some(NodeLabel::Container),
        RecordType::Azure => None,
    }
}

pub(crate) fn map(label: NodeLabel, records: Vec<Value>) -> UnitMap {
    let mut units = Units::default();

    for record in records {
        let Some(objectid) = object_id(record.get("ObjectIdentifier"))
            .or_else(|| object_id(record.pointer("/Properties/objectid")))
        else {
            tracing::debug!(%label, "Skipping record without an object identifier");
            continue;
        };

        let properties = match record.get("Properties") {
            Some(Value::Object(properties)) => properties.clone(),
            _ => Map::new(),
        };
        units.node(label, &objectid, Value::Object(properties));

        map_aces(&mut units, label, &objectid, &record);
        map_primary_group(&mut units, label, &objectid, &record);
        map_members(&mut units, label, &objectid, &record);
        map_child_objects(&mut units, label, &objectid, &record);
        map_links(&mut units, label, &objectid, &record);
        map_delegation(&mut units, label, &objectid, &record);
        map_local_groups(&mut units, &objectid, &record);
        map_sessions(&mut units, &record);
        map_gpo_changes(&mut units, &record);
        map_trusts(&mut units, &objectid, &record);
    }

    units.into_inner()
}

/// Every ACE grants its principal an edge named after the right
fn map_aces(units: &mut Units, label: NodeLabel, objectid: &str, record: &Value) {
    for ace in entries(record.get("Aces")) {
        let Some(principal) = object_id(ace.get("PrincipalSID")) else {
            continue;
        };
        let Some(right) = ace
            .get("RightName")
            .and_then(Value::as_str)
            .and_then(|right| Identifier::new(right).ok())
        else {
            tracing::debug!(ace = %ace, "Skipping ACE with an unusable right name");
            continue;
        };

        let edge = Edge::with_identifier(
            NodeLabel::from_object_type(ace.get("PrincipalType")),
            right,
            label,
        );
        let inherited = ace
            .get("IsInherited")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        units.edge(
            &edge,
            &principal,
            objectid,
            json!({"isacl": true, "isinherited": inherited}),
        );
    }
}

fn map_primary_group(units: &mut Units, label: NodeLabel, objectid: &str, record: &Value) {
    if let Some(group) = object_id(record.get("PrimaryGroupSID")) {
        units.edge(
            &Edge::new(label, "MemberOf", NodeLabel::Group),
            objectid,
            &group,
            json!({"isacl": false}),
        );
    }
}

fn map_members(units: &mut Units, label: NodeLabel, objectid: &str, record: &Value) {
    if label != NodeLabel::Group {
        return;
    }

    for member in entries(record.get("Members")) {
        let Some(member_id) = object_id(member.get("ObjectIdentifier")) else {
            continue;
        };
        let edge = Edge::new(
            NodeLabel::from_object_type(member.get("ObjectType")),
            "MemberOf",
            NodeLabel::Group,
        );
        units.edge(&edge, &member_id, objectid, json!({"isacl": false}));
    }
}

fn map_child_objects(units: &mut Units, label: NodeLabel, objectid: &str, record: &Value) {
    for child in entries(record.get("ChildObjects")) {
        let Some(child_id) = object_id(child.get("ObjectIdentifier")) else {
            continue;
        };
        let edge = Edge::new(
            label,
            "Contains",
            NodeLabel::from_object_type(child.get("ObjectType")),
        );
        units.edge(&edge, objectid, &child_id, json!({"isacl": false}));
    }
}

fn map_links(units: &mut Units, label: NodeLabel, objectid: &str, record: &Value) {
    for link in entries(record.get("Links")) {
        let Some(gpo) = object_id(link.get("GUID")) else {
            continue;
        };
        let enforced = link
            .get("IsEnforced")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        units.edge(
            &Edge::new(NodeLabel::Gpo, "GPLink", label),
            &gpo,
            objectid,
            json!({"isacl": false, "enforced": enforced}),
        );
    }
}

fn map_delegation(units: &mut Units, label: NodeLabel, objectid: &str, record: &Value) {
    for target in entries(record.get("AllowedToDelegate")) {
        // Older collectors list bare identifiers
        let target_id = object_id(target.get("ObjectIdentifier")).or_else(|| object_id(Some(target)));
        let Some(target_id) = target_id else {
            continue;
        };
        let target_label = match target.get("ObjectType") {
            Some(object_type) => NodeLabel::from_object_type(Some(object_type)),
            None => NodeLabel::Computer,
        };

        units.edge(
            &Edge::new(label, "AllowedToDelegate", target_label),
            objectid,
            &target_id,
            json!({"isacl": false}),
        );
    }

    for principal in entries(record.get("AllowedToAct")) {
        let Some(principal_id) = object_id(principal.get("ObjectIdentifier")) else {
            continue;
        };
        units.edge(
            &Edge::new(
                NodeLabel::from_object_type(principal.get("ObjectType")),
                "AllowedToAct",
                label,
            ),
            &principal_id,
            objectid,
            json!({"isacl": false}),
        );
    }

    for previous in entries(record.get("HasSIDHistory")) {
        let Some(previous_id) = object_id(previous.get("ObjectIdentifier")) else {
            continue;
        };
        units.edge(
            &Edge::new(
                label,
                "HasSIDHistory",
                NodeLabel::from_object_type(previous.get("ObjectType")),
            ),
            objectid,
            &previous_id,
            json!({"isacl": false}),
        );
    }
}

fn local_group_edges(
    units: &mut Units,
    computer: &str,
    collection: Option<&Value>,
    rel: &'static str,
    fromgpo: bool,
) {
    for principal in entries(collection) {
        let Some(principal_id) = object_id(principal.get("ObjectIdentifier")) else {
            continue;
        };
        units.edge(
            &Edge::new(
                NodeLabel::from_object_type(principal.get("ObjectType")),
                rel,
                NodeLabel::Computer,
            ),
            &principal_id,
            computer,
            json!({"isacl": false, "fromgpo": fromgpo}),
        );
    }
}

fn map_local_groups(units: &mut Units, objectid: &str, record: &Value) {
    for (key, rel) in LOCAL_GROUPS {
        local_group_edges(units, objectid, record.get(key), rel, false);
    }
}

/// Group policy derived local group memberships apply to every affected computer
fn map_gpo_changes(units: &mut Units, record: &Value) {
    let Some(changes) = record.get("GPOChanges") else {
        return;
    };

    for computer in entries(changes.get("AffectedComputers")) {
        let Some(computer_id) = object_id(computer.get("ObjectIdentifier")) else {
            continue;
        };
        for (key, rel) in LOCAL_GROUPS {
            local_group_edges(units, &computer_id, changes.get(key), rel, true);
        }
    }
}

fn map_sessions(units: &mut Units, record: &Value) {
    for kind in SESSION_KINDS {
        for session in entries(record.get(kind)) {
            let (Some(computer), Some(user)) = (
                object_id(session.get("ComputerSID")),
                object_id(session.get("UserSID")),
            ) else {
                continue;
            };
            units.edge(
                &Edge::new(NodeLabel::Computer, "HasSession", NodeLabel::User),
                &computer,
                &user,
                json!({"isacl": false}),
            );
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrustDirection {
    Disabled,
    Inbound,
    Outbound,
    Bidirectional,
}

impl TrustDirection {
    fn parse(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Number(n) => match n.as_u64()? {
                0 => Some(Self::Disabled),
                1 => Some(Self::Inbound),
                2 => Some(Self::Outbound),
                3 => Some(Self::Bidirectional),
                _ => None,
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "disabled" => Some(Self::Disabled),
                "inbound" => Some(Self::Inbound),
                "outbound" => Some(Self::Outbound),
                "bidirectional" => Some(Self::Bidirectional),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Inbound trusts mean the other domain trusts this one; outbound the reverse
fn map_trusts(units: &mut Units, objectid: &str, record: &Value) {
    let trusted_by = Edge::new(NodeLabel::Domain, "TrustedBy", NodeLabel::Domain);

    for trust in entries(record.get("Trusts")) {
        let Some(target) = object_id(trust.get("TargetDomainSid")) else {
            continue;
        };
        let direction = TrustDirection::parse(trust.get("TrustDirection"));
        if matches!(direction, None | Some(TrustDirection::Disabled)) {
            continue;
        }

        if let Some(name) = trust.get("TargetDomainName").and_then(Value::as_str) {
            units.node(
                NodeLabel::Domain,
                &target,
                json!({"name": name.to_uppercase()}),
            );
        }

        let props = json!({
            "isacl": false,
            "sidfiltering": trust.get("SidFilteringEnabled").cloned().unwrap_or(Value::Null),
            "transitive": trust.get("IsTransitive").cloned().unwrap_or(Value::Null),
            "trusttype": trust.get("TrustType").cloned().unwrap_or(Value::Null),
        });

        if matches!(
            direction,
            Some(TrustDirection::Inbound | TrustDirection::Bidirectional)
        ) {
            units.edge(&trusted_by, objectid, &target, props.clone());
        }
        if matches!(
            direction,
            Some(TrustDirection::Outbound | TrustDirection::Bidirectional)
        ) {
            units.edge(&trusted_by, &target, objectid, props);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn rows<'a>(units: &'a UnitMap, name: &str) -> &'a [Value] {
        &units
            .get(name)
            .unwrap_or_else(|| panic!("missing unit {name}, have {:?}", units.keys()))
            .props
    }

    #[test]
    fn test_users_map_to_nodes_primary_groups_and_aces() {
        let records = vec![
            json!({
                "ObjectIdentifier": "S-1-5-21-1-1104",
                "Properties": {"name": "ALICE@CORP.LOCAL", "enabled": true},
                "PrimaryGroupSID": "S-1-5-21-1-513",
                "Aces": [
                    {"PrincipalSID": "S-1-5-21-1-512", "PrincipalType": "Group", "RightName": "GenericAll", "IsInherited": true},
                    {"PrincipalSID": "S-1-5-21-1-519", "PrincipalType": "Group", "RightName": "Owns; DROP", "IsInherited": false}
                ]
            }),
            json!({
                "ObjectIdentifier": "S-1-5-21-1-1105",
                "Properties": {"name": "BOB@CORP.LOCAL"}
            }),
        ];

        let units = map(NodeLabel::User, records);

        assert_eq!(
            units.keys().collect::<Vec<_>>(),
            vec![
                "nodes/User",
                "rels/Group-GenericAll-User",
                "rels/User-MemberOf-Group"
            ]
        );
        assert_eq!(
            rows(&units, "nodes/User")[0],
            json!({"objectid": "S-1-5-21-1-1104", "map": {"name": "ALICE@CORP.LOCAL", "enabled": true}})
        );
        assert_eq!(rows(&units, "nodes/User").len(), 2);
        assert_eq!(
            rows(&units, "rels/Group-GenericAll-User"),
            [json!({"source": "S-1-5-21-1-512", "target": "S-1-5-21-1-1104", "props": {"isacl": true, "isinherited": true}})]
        );
    }

    #[test]
    fn test_records_without_identifier_are_skipped() {
        let units = map(
            NodeLabel::User,
            vec![json!({"Properties": {"name": "GHOST"}}), json!({"ObjectIdentifier": ""})],
        );

        assert!(units.is_empty());
    }

    #[test]
    fn test_group_members() {
        let units = map(
            NodeLabel::Group,
            vec![json!({
                "ObjectIdentifier": "S-1-5-21-1-512",
                "Properties": {"name": "DOMAIN ADMINS@CORP.LOCAL"},
                "Members": [
                    {"ObjectIdentifier": "S-1-5-21-1-1104", "ObjectType": "User"},
                    {"ObjectIdentifier": "S-1-5-21-1-1000", "ObjectType": "Computer"}
                ]
            })],
        );

        assert_eq!(
            rows(&units, "rels/User-MemberOf-Group"),
            [json!({"source": "S-1-5-21-1-1104", "target": "S-1-5-21-1-512", "props": {"isacl": false}})]
        );
        assert_eq!(rows(&units, "rels/Computer-MemberOf-Group").len(), 1);
    }

    #[test]
    fn test_computer_local_groups_and_sessions() {
        let units = map(
            NodeLabel::Computer,
            vec![json!({
                "ObjectIdentifier": "S-1-5-21-1-1000",
                "Properties": {"name": "WS01.CORP.LOCAL"},
                "LocalAdmins": {"Collected": true, "Results": [{"ObjectIdentifier": "S-1-5-21-1-512", "ObjectType": "Group"}]},
                "RemoteDesktopUsers": [{"ObjectIdentifier": "S-1-5-21-1-1104", "ObjectType": "User"}],
                "Sessions": {"Collected": true, "Results": [{"UserSID": "S-1-5-21-1-1104", "ComputerSID": "S-1-5-21-1-1000"}]},
                "AllowedToDelegate": [{"ObjectIdentifier": "S-1-5-21-1-1001", "ObjectType": "Computer"}]
            })],
        );

        assert_eq!(
            rows(&units, "rels/Group-AdminTo-Computer"),
            [json!({"source": "S-1-5-21-1-512", "target": "S-1-5-21-1-1000", "props": {"isacl": false, "fromgpo": false}})]
        );
        assert_eq!(rows(&units, "rels/User-CanRDP-Computer").len(), 1);
        assert_eq!(
            rows(&units, "rels/Computer-HasSession-User"),
            [json!({"source": "S-1-5-21-1-1000", "target": "S-1-5-21-1-1104", "props": {"isacl": false}})]
        );
        assert_eq!(rows(&units, "rels/Computer-AllowedToDelegate-Computer").len(), 1);
    }

    #[test]
    fn test_ou_links_children_and_gpo_changes() {
        let units = map(
            NodeLabel::Ou,
            vec![json!({
                "ObjectIdentifier": "2a374493-816a-4193-bee3-9ba8a5f1d4cc",
                "Properties": {"name": "WORKSTATIONS@CORP.LOCAL"},
                "Links": [{"IsEnforced": true, "GUID": "31b2f340-016d-11d2-945f-00c04fb984f9"}],
                "ChildObjects": [{"ObjectIdentifier": "S-1-5-21-1-1000", "ObjectType": "Computer"}],
                "GPOChanges": {
                    "AffectedComputers": [{"ObjectIdentifier": "S-1-5-21-1-1000", "ObjectType": "Computer"}],
                    "LocalAdmins": [{"ObjectIdentifier": "S-1-5-21-1-1106", "ObjectType": "User"}]
                }
            })],
        );

        assert_eq!(
            rows(&units, "rels/GPO-GPLink-OU"),
            [json!({
                "source": "31B2F340-016D-11D2-945F-00C04FB984F9",
                "target": "2A374493-816A-4193-BEE3-9BA8A5F1D4CC",
                "props": {"isacl": false, "enforced": true}
            })]
        );
        assert_eq!(rows(&units, "rels/OU-Contains-Computer").len(), 1);
        assert_eq!(
            rows(&units, "rels/User-AdminTo-Computer"),
            [json!({"source": "S-1-5-21-1-1106", "target": "S-1-5-21-1-1000", "props": {"isacl": false, "fromgpo": true}})]
        );
    }

    #[test]
    fn test_domain_trusts_follow_direction() {
        let units = map(
            NodeLabel::Domain,
            vec![json!({
                "ObjectIdentifier": "S-1-5-21-1",
                "Properties": {"name": "CORP.LOCAL"},
                "Trusts": [
                    {"TargetDomainSid": "S-1-5-21-2", "TargetDomainName": "lab.local", "TrustDirection": 3, "IsTransitive": true, "SidFilteringEnabled": false, "TrustType": "ParentChild"},
                    {"TargetDomainSid": "S-1-5-21-3", "TargetDomainName": "old.local", "TrustDirection": "Disabled"},
                    {"TargetDomainSid": "S-1-5-21-4", "TrustDirection": "Outbound"}
                ]
            })],
        );

        let trusts = rows(&units, "rels/Domain-TrustedBy-Domain")
            .iter()
            .map(|row| (row["source"].as_str().unwrap(), row["target"].as_str().unwrap()))
            .collect::<Vec<_>>();
        assert_eq!(
            trusts,
            vec![
                ("S-1-5-21-1", "S-1-5-21-2"),
                ("S-1-5-21-2", "S-1-5-21-1"),
                ("S-1-5-21-4", "S-1-5-21-1")
            ]
        );
        assert_eq!(rows(&units, "nodes/Domain").len(), 2);
    }

    #[test]
    fn test_label_for_every_directory_type() {
        use strum::IntoEnumIterator as _;

        for record_type in RecordType::iter() {
            assert_eq!(label_for(record_type).is_none(), record_type.is_cloud());
        }
    }
}
