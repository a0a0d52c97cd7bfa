use crate::rule::{as_remote_scan, Pattern, Rule};
use common::logical_plan::{DelegatedScanNode, RemoteCall, RemoteScanNode};
use common::{MedError, RelNode};

/// Delegated scan issuing `call` over every column of `scan`.
pub(crate) fn delegate_with(scan: &RemoteScanNode, call: RemoteCall) -> RelNode {
    RelNode::DelegatedScan(DelegatedScanNode {
        source: scan.source.clone(),
        call,
        requested_fields: scan.source.fields.clone(),
        requested_types: scan.source.types.clone(),
        schema: scan.schema.clone(),
    })
}

/// Delegated scan issuing the scan's own call.
pub(crate) fn delegate(scan: &RemoteScanNode) -> RelNode {
    delegate_with(scan, scan.call.clone())
}

/// Turns any remote scan the other rules left alone into a delegated scan
/// with its original call.
#[derive(Debug, Default)]
pub struct RemoteScanConversionRule;

impl Rule for RemoteScanConversionRule {
    fn name(&self) -> &str {
        "RemoteScanConversion"
    }

    fn pattern(&self) -> Pattern {
        Pattern::RemoteScan
    }

    fn on_match(&self, rel: &RelNode) -> Result<Option<RelNode>, MedError> {
        Ok(as_remote_scan(rel).map(delegate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;

    #[test]
    fn test_convert() {
        let scan = account_scan();
        let out = RemoteScanConversionRule.on_match(&scan).unwrap().unwrap();
        match (&scan, &out) {
            (RelNode::RemoteScan(before), RelNode::DelegatedScan(after)) => {
                assert_eq!(before.call, after.call);
                assert_eq!(before.schema, after.schema);
                assert_eq!(vec!["Id", "Name", "Email"], after.requested_fields);
            }
            _ => panic!("Expected a delegated scan, got {:?}", out),
        }
        assert_eq!(None, RemoteScanConversionRule.on_match(&out).unwrap());
    }
}
