//! Record mappers for collector exports.
//!
//! [`BloodHoundMapper`] understands SharpHound v4+ directory exports and AzureHound cloud exports.
//! Mapping is pure: records go in, upload units come out, nothing touches the store.
use houndload_core::{MappingResult, RecordBatch, RecordMapper, RecordType};

mod ad;
mod azure;
mod units;

pub use units::NodeLabel;

/// Maps every known record type with the statements BloodHound expects
#[derive(Debug, Default, Clone, Copy)]
pub struct BloodHoundMapper;

impl RecordMapper for BloodHoundMapper {
    fn map(&self, record_type: RecordType, records: RecordBatch) -> MappingResult {
        match ad::label_for(record_type) {
            Some(label) => MappingResult::Flat(ad::map(label, records)),
            None => MappingResult::Cloud(azure::map(records)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_dispatch_by_record_type() {
        let mapper = BloodHoundMapper;

        let flat = mapper.map(
            RecordType::Gpos,
            vec![json!({"ObjectIdentifier": "31b2f340-016d-11d2-945f-00c04fb984f9", "Properties": {"name": "DEFAULT DOMAIN POLICY@CORP.LOCAL"}})],
        );
        let MappingResult::Flat(units) = flat else {
            panic!("directory records must map flat");
        };
        assert!(units.contains_key("nodes/GPO"));

        let cloud = mapper.map(
            RecordType::Azure,
            vec![json!({"kind": "AZTenant", "data": {"id": "t1", "displayName": "Corp"}})],
        );
        let MappingResult::Cloud(units) = cloud else {
            panic!("cloud records must map into groups");
        };
        assert!(units.cloud.contains_key("nodes/AZTenant"));
        assert!(units.relationships.is_empty());
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let records = vec![
            json!({"ObjectIdentifier": "S-1-5-21-1-1104", "Properties": {"name": "ALICE"}, "PrimaryGroupSID": "S-1-5-21-1-513"}),
            json!({"ObjectIdentifier": "S-1-5-21-1-1105", "Properties": {"name": "BOB"}, "PrimaryGroupSID": "S-1-5-21-1-513"}),
        ];

        assert_eq!(
            BloodHoundMapper.map(RecordType::Users, records.clone()),
            BloodHoundMapper.map(RecordType::Users, records)
        );
    }
}
