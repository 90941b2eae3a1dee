//! Building blocks shared by the record mappers: node labels, edge shapes and a unit collector.
use houndload_core::{Fragment, Identifier, Statement, UnitMap, UploadUnit};
use serde_json::{Value, json};

/// Every node label the mappers emit
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum NodeLabel {
    Base,
    User,
    Computer,
    Group,
    Domain,
    #[strum(serialize = "OU")]
    Ou,
    #[strum(serialize = "GPO")]
    Gpo,
    Container,
    #[strum(serialize = "AZBase")]
    AzBase,
    #[strum(serialize = "AZTenant")]
    AzTenant,
    #[strum(serialize = "AZUser")]
    AzUser,
    #[strum(serialize = "AZGroup")]
    AzGroup,
    #[strum(serialize = "AZRole")]
    AzRole,
    #[strum(serialize = "AZServicePrincipal")]
    AzServicePrincipal,
    #[strum(serialize = "AZApp")]
    AzApp,
    #[strum(serialize = "AZDevice")]
    AzDevice,
    #[strum(serialize = "AZSubscription")]
    AzSubscription,
    #[strum(serialize = "AZResourceGroup")]
    AzResourceGroup,
    #[strum(serialize = "AZKeyVault")]
    AzKeyVault,
    #[strum(serialize = "AZVM")]
    AzVm,
    #[strum(serialize = "AZManagementGroup")]
    AzManagementGroup,
}

impl NodeLabel {
    pub fn is_cloud(self) -> bool {
        matches!(
            self,
            NodeLabel::AzBase
                | NodeLabel::AzTenant
                | NodeLabel::AzUser
                | NodeLabel::AzGroup
                | NodeLabel::AzRole
                | NodeLabel::AzServicePrincipal
                | NodeLabel::AzApp
                | NodeLabel::AzDevice
                | NodeLabel::AzSubscription
                | NodeLabel::AzResourceGroup
                | NodeLabel::AzKeyVault
                | NodeLabel::AzVm
                | NodeLabel::AzManagementGroup
        )
    }

    /// The label every node of this family is merged on
    pub fn base(self) -> NodeLabel {
        if self.is_cloud() {
            NodeLabel::AzBase
        } else {
            NodeLabel::Base
        }
    }

    pub fn identifier(self) -> Identifier {
        Identifier::from_static(self.into())
    }

    /// Parses a SharpHound `ObjectType`, falling back to the base label for anything unknown
    pub(crate) fn from_object_type(object_type: Option<&Value>) -> NodeLabel {
        object_type
            .and_then(Value::as_str)
            .and_then(|name| name.parse::<NodeLabel>().ok())
            .filter(|label| !label.is_cloud())
            .unwrap_or(NodeLabel::Base)
    }
}

/// The shape of a relationship: source label, type, target label
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Edge {
    pub source: NodeLabel,
    pub rel: Identifier,
    pub target: NodeLabel,
}

impl Edge {
    pub fn new(source: NodeLabel, rel: &'static str, target: NodeLabel) -> Self {
        Self::with_identifier(source, Identifier::from_static(rel), target)
    }

    pub fn with_identifier(source: NodeLabel, rel: Identifier, target: NodeLabel) -> Self {
        Self {
            source,
            rel,
            target,
        }
    }

    fn unit_name(&self) -> String {
        format!("rels/{}-{}-{}", self.source, self.rel, self.target)
    }

    fn statement(&self) -> Statement {
        let (source_base, source) = (self.source.base().identifier(), self.source.identifier());
        let (target_base, target) = (self.target.base().identifier(), self.target.identifier());

        Statement::compose(&[
            Fragment::Text("UNWIND $props AS prop MERGE (n:"),
            Fragment::Ident(&source_base),
            Fragment::Text(" {objectid: prop.source}) SET n:"),
            Fragment::Ident(&source),
            Fragment::Text(" MERGE (m:"),
            Fragment::Ident(&target_base),
            Fragment::Text(" {objectid: prop.target}) SET m:"),
            Fragment::Ident(&target),
            Fragment::Text(" MERGE (n)-[r:"),
            Fragment::Ident(&self.rel),
            Fragment::Text("]->(m) SET r += prop.props"),
        ])
    }
}

fn node_statement(label: NodeLabel) -> Statement {
    let (base, label) = (label.base().identifier(), label.identifier());

    Statement::compose(&[
        Fragment::Text("UNWIND $props AS prop MERGE (n:"),
        Fragment::Ident(&base),
        Fragment::Text(" {objectid: prop.objectid}) SET n:"),
        Fragment::Ident(&label),
        Fragment::Text(" SET n += prop.map"),
    ])
}

/// Collects rows into named units. Node units sort before relationship units.
#[derive(Debug, Default)]
pub(crate) struct Units(UnitMap);

impl Units {
    pub fn node(&mut self, label: NodeLabel, objectid: &str, map: Value) {
        self.0
            .entry(format!("nodes/{label}"))
            .or_insert_with(|| UploadUnit::new(node_statement(label)))
            .push(json!({"objectid": objectid, "map": map}));
    }

    pub fn edge(&mut self, edge: &Edge, source: &str, target: &str, props: Value) {
        self.0
            .entry(edge.unit_name())
            .or_insert_with(|| UploadUnit::new(edge.statement()))
            .push(json!({"source": source, "target": target, "props": props}));
    }

    /// A unit with a hand-written statement, for links that are not keyed on `objectid`
    pub fn custom(&mut self, name: &str, statement: impl FnOnce() -> Statement, row: Value) {
        self.0
            .entry(name.to_string())
            .or_insert_with(|| UploadUnit::new(statement()))
            .push(row);
    }

    pub fn into_inner(self) -> UnitMap {
        self.0
    }
}

/// Object identifiers are compared case-insensitively by the collectors, so they are stored upper
/// case. Blank identifiers are treated as missing.
pub(crate) fn object_id(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_uppercase)
}

/// Entries of a collection that is either a plain array or a `{"Collected": .., "Results": [..]}`
/// envelope
pub(crate) fn entries(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        Some(Value::Object(envelope)) => envelope
            .get("Results")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice),
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator as _;

    use super::*;

    #[test]
    fn test_every_label_is_a_valid_identifier() {
        for label in NodeLabel::iter() {
            assert!(Identifier::is_valid(label.into()), "{label}");
        }
    }

    #[test]
    fn test_object_type_parsing() {
        assert_eq!(NodeLabel::from_object_type(Some(&json!("OU"))), NodeLabel::Ou);
        assert_eq!(NodeLabel::from_object_type(Some(&json!("computer"))), NodeLabel::Computer);
        assert_eq!(NodeLabel::from_object_type(Some(&json!("LocalGroup"))), NodeLabel::Base);
        assert_eq!(NodeLabel::from_object_type(Some(&json!("AZUser"))), NodeLabel::Base);
        assert_eq!(NodeLabel::from_object_type(None), NodeLabel::Base);
    }

    #[test]
    fn test_edge_statement_merges_both_ends() {
        let edge = Edge::new(NodeLabel::AzUser, "SyncedToADUser", NodeLabel::User);

        assert_eq!(
            edge.statement().as_str(),
            "UNWIND $props AS prop MERGE (n:AZBase {objectid: prop.source}) SET n:AZUser MERGE (m:Base {objectid: prop.target}) SET m:User MERGE (n)-[r:SyncedToADUser]->(m) SET r += prop.props"
        );
        assert_eq!(edge.unit_name(), "rels/AZUser-SyncedToADUser-User");
    }

    #[test]
    fn test_nodes_sort_before_relationships() {
        let mut units = Units::default();
        units.edge(
            &Edge::new(NodeLabel::User, "MemberOf", NodeLabel::Group),
            "A",
            "B",
            json!({}),
        );
        units.node(NodeLabel::User, "A", json!({"name": "ALICE"}));

        let names = units.into_inner().into_keys().collect::<Vec<_>>();
        assert_eq!(names, vec!["nodes/User", "rels/User-MemberOf-Group"]);
    }

    #[test]
    fn test_entries_accept_both_shapes() {
        let plain = json!([{"ObjectIdentifier": "A"}]);
        let envelope = json!({"Collected": true, "Results": [{"ObjectIdentifier": "A"}, {"ObjectIdentifier": "B"}]});

        assert_eq!(entries(Some(&plain)).len(), 1);
        assert_eq!(entries(Some(&envelope)).len(), 2);
        assert!(entries(Some(&json!(null))).is_empty());
        assert!(entries(None).is_empty());
    }

    #[test]
    fn test_object_ids_are_normalized() {
        assert_eq!(object_id(Some(&json!("s-1-5-21-1"))), Some("S-1-5-21-1".to_string()));
        assert_eq!(object_id(Some(&json!("  "))), None);
        assert_eq!(object_id(Some(&json!(12))), None);
    }
}
