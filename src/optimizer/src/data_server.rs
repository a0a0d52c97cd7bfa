use crate::delete_rule::DeletedRangeRule;
use crate::planner::Planner;
use crate::projection::valid_projection;
use crate::pushdown::{PushdownRule, PushdownShape};
use crate::scan_rule::RemoteScanConversionRule;
use common::catalog::{RemoteCatalog, DELETED_SUFFIX, LOV_SUFFIX};
use common::config::{MedConfig, PushdownConfig};
use common::logical_plan::{RemoteCall, RemoteScanNode, SourceDescriptor, SourceKind};
use common::{Attribute, DataType, MedError, RelNode, TableSchema};

/// Base precision of picklist values.
pub const MAX_PRECISION: u32 = 256;
/// Base precision of record ids and field names in the pseudo-tables.
pub const ID_PRECISION: u32 = 25;

/// Kind of an object name, from its suffix.
pub fn source_kind(object: &str) -> SourceKind {
    if object.ends_with(DELETED_SUFFIX) {
        SourceKind::Deleted
    } else if object.ends_with(LOV_SUFFIX) {
        SourceKind::Lov
    } else {
        SourceKind::Query
    }
}

/// Keeps the declared fields the remote object has with a castable type,
/// in declared order, typed as the remote side types them.
///
/// # Arguments
///
/// * `declared` - Row type the scan was declared with.
/// * `remote` - Row type of the remote object.
pub fn update_row_type(declared: &TableSchema, remote: &TableSchema) -> TableSchema {
    let mut attrs = Vec::new();
    for attr in declared.attributes() {
        let remote_attr = remote
            .attributes()
            .find(|r| r.name() == attr.name());
        if let Some(r) = remote_attr {
            if attr.dtype().can_cast_from(r.dtype()) {
                attrs.push(Attribute::new(attr.name().to_string(), r.dtype().clone()));
            }
        }
    }
    TableSchema::new(attrs)
}

/// Resolves remote objects into scans and registers the planning rules.
pub struct MedDataServer<C: RemoteCatalog> {
    catalog: C,
    varchar_precision: u32,
    pushdown: PushdownConfig,
}

impl<C: RemoteCatalog> MedDataServer<C> {
    /// Creates a data server.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Describes remote objects.
    /// * `varchar_precision` - Extra precision of the pseudo-tables' VARCHAR columns.
    /// * `pushdown` - Pushdown switches.
    pub fn new(catalog: C, varchar_precision: u32, pushdown: PushdownConfig) -> Self {
        Self {
            catalog,
            varchar_precision,
            pushdown,
        }
    }

    /// Creates a data server from a configuration.
    pub fn from_config(catalog: C, config: &MedConfig) -> Self {
        Self::new(catalog, config.varchar_precision, config.pushdown.clone())
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn varchar_precision(&self) -> u32 {
        self.varchar_precision
    }

    /// Full row type of an object or pseudo-table.
    ///
    /// # Arguments
    ///
    /// * `object` - Object name, possibly with a pseudo-table suffix.
    pub fn derive_row_type(&self, object: &str) -> Result<TableSchema, MedError> {
        let p = self.varchar_precision;
        match source_kind(object) {
            SourceKind::Deleted => Ok(TableSchema::from_vecs(
                vec!["Id", "DeleteStamp"],
                vec![DataType::Varchar(ID_PRECISION + p), DataType::Timestamp],
            )),
            SourceKind::Lov => Ok(TableSchema::from_vecs(
                vec!["Field", "Value"],
                vec![
                    DataType::Varchar(ID_PRECISION + p),
                    DataType::Varchar(MAX_PRECISION + p),
                ],
            )),
            SourceKind::Query => Ok(TableSchema::new(
                self.catalog
                    .describe(object)?
                    .into_iter()
                    .map(|f| Attribute::new(f.name, f.dtype))
                    .collect(),
            )),
        }
    }

    /// Creates the unplanned scan of an object.
    ///
    /// A declared row type narrows a regular object's scan to the declared
    /// fields, unless the narrowed field list could not be requested
    /// remotely; then every field is scanned.
    ///
    /// # Arguments
    ///
    /// * `object` - Object name, possibly with a pseudo-table suffix.
    /// * `declared` - Row type the scan was declared with, if any.
    pub fn new_column_set(
        &self,
        object: &str,
        declared: Option<&TableSchema>,
    ) -> Result<RelNode, MedError> {
        let kind = source_kind(object);
        let schema = self.derive_row_type(object)?;
        let (schema, call) = match kind {
            SourceKind::Query => {
                let schema = match declared {
                    Some(declared) => {
                        let updated = update_row_type(declared, &schema);
                        if valid_projection(&updated.names()) {
                            updated
                        } else {
                            debug!("Scanning all fields of {}", object);
                            schema
                        }
                    }
                    None => schema,
                };
                let types: Vec<String> = schema.dtypes().iter().map(|t| t.to_string()).collect();
                let call = RemoteCall::Query {
                    query: format!("SELECT {} FROM {}", schema.names().join(", "), object),
                    types: types.join(","),
                };
                (schema, call)
            }
            SourceKind::Deleted | SourceKind::Lov => {
                let suffix = if kind == SourceKind::Deleted {
                    DELETED_SUFFIX
                } else {
                    LOV_SUFFIX
                };
                let base = &object[..object.len() - suffix.len()];
                if !self.catalog.is_valid_object(base) {
                    return Err(MedError::ValidationError(format!(
                        "Invalid object {}",
                        base
                    )));
                }
                let call = if kind == SourceKind::Deleted {
                    RemoteCall::GetDeleted {
                        object: base.to_string(),
                        start: None,
                        end: None,
                    }
                } else {
                    RemoteCall::Lov {
                        object: base.to_string(),
                    }
                };
                (schema, call)
            }
        };
        Ok(RelNode::RemoteScan(RemoteScanNode {
            source: SourceDescriptor {
                object: object.to_string(),
                kind,
                fields: schema.names(),
                types: schema.dtypes(),
            },
            call,
            schema,
        }))
    }

    /// Registers the deleted-records rules, the pushdown rules when enabled,
    /// and the scan conversion rule, in that order.
    pub fn register_rules(&self, planner: &mut Planner) {
        planner.add_rule(Box::new(DeletedRangeRule::over_project()));
        planner.add_rule(Box::new(DeletedRangeRule::over_scan()));
        if self.pushdown.enabled {
            for shape in PushdownShape::ALL.iter() {
                planner.add_rule(Box::new(PushdownRule::new(*shape, &self.pushdown)));
            }
        }
        planner.add_rule(Box::new(RemoteScanConversionRule));
    }

    /// A planner with this server's rules.
    pub fn planner(&self) -> Planner {
        let mut planner = Planner::new();
        self.register_rules(&mut planner);
        planner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::catalog::MemCatalog;
    use common::logical_plan::DelegatedScanNode;
    use common::testutil::*;
    use common::{RexNode, RexOp};

    fn server() -> MedDataServer<MemCatalog> {
        MedDataServer::new(
            MemCatalog::new(vec![account_object(), opportunity_object()]),
            128,
            PushdownConfig::default(),
        )
    }

    fn leaf(rel: &RelNode) -> &DelegatedScanNode {
        match rel {
            RelNode::DelegatedScan(node) => node,
            other => leaf(other.child().unwrap()),
        }
    }

    fn project(child: RelNode, cols: &[usize], names: &[&str]) -> RelNode {
        RelNode::project(
            child,
            cols.iter().map(|c| RexNode::input_ref(*c)).collect(),
            names.iter().map(|n| n.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_column_set() {
        let s = server();
        assert_eq!(account_scan(), s.new_column_set("Account", None).unwrap());
        assert!(matches!(
            s.new_column_set("Nope", None),
            Err(MedError::ValidationError(_))
        ));
    }

    #[test]
    fn test_declared_row_type() {
        let s = server();
        let declared = TableSchema::from_vecs(
            vec!["Email", "Name", "Missing"],
            vec![DataType::Varchar(10), DataType::Varchar(10), DataType::Integer],
        );
        let scan = s.new_column_set("Account", Some(&declared)).unwrap();
        match &scan {
            RelNode::RemoteScan(node) => {
                assert_eq!(
                    RemoteCall::Query {
                        query: String::from("SELECT Email, Name FROM Account"),
                        types: String::from("VARCHAR(80),VARCHAR(255)"),
                    },
                    node.call
                );
                assert_eq!(vec!["Email", "Name"], node.source.fields);
            }
            other => panic!("Expected a remote scan, got {:?}", other),
        }

        let id_last = TableSchema::from_vecs(
            vec!["Name", "Id"],
            vec![DataType::Varchar(10), DataType::Varchar(10)],
        );
        assert_eq!(account_scan(), s.new_column_set("Account", Some(&id_last)).unwrap());
    }

    #[test]
    fn test_update_row_type_casts() {
        let remote = opportunity_object().schema();
        let declared = TableSchema::from_vecs(
            vec!["Amount", "IsWon", "CloseDate"],
            vec![DataType::Boolean, DataType::Boolean, DataType::Timestamp],
        );
        let updated = update_row_type(&declared, &remote);
        assert_eq!(vec!["IsWon", "CloseDate"], updated.names());
        assert_eq!(vec![DataType::Boolean, DataType::Date], updated.dtypes());
    }

    #[test]
    fn test_pseudo_tables() {
        let s = server();
        let deleted = s.derive_row_type("Account_deleted").unwrap();
        assert_eq!(
            vec![DataType::Varchar(153), DataType::Timestamp],
            deleted.dtypes()
        );
        let lov = s.derive_row_type("Account_LOV").unwrap();
        assert_eq!(vec!["Field", "Value"], lov.names());
        assert_eq!(
            vec![DataType::Varchar(153), DataType::Varchar(384)],
            lov.dtypes()
        );
        match s.new_column_set("Account_LOV", None).unwrap() {
            RelNode::RemoteScan(node) => {
                assert_eq!(SourceKind::Lov, node.source.kind);
                assert_eq!(
                    RemoteCall::Lov {
                        object: String::from("Account")
                    },
                    node.call
                );
            }
            other => panic!("Expected a remote scan, got {:?}", other),
        }
        assert!(s.new_column_set("Nope_deleted", None).is_err());
    }

    #[test]
    fn test_rule_order() {
        let names = server().planner().rule_names();
        assert_eq!(8, names.len());
        assert_eq!("DeletedRange(Filter(Project(scan)))", names[0]);
        assert_eq!("Pushdown(Project(Filter(Project(scan))))", names[2]);
        assert_eq!("RemoteScanConversion", names[7]);

        let off = MedDataServer::new(
            MemCatalog::new(vec![account_object()]),
            0,
            PushdownConfig {
                enabled: false,
                partial_filter_pushdown: false,
            },
        );
        assert_eq!(3, off.planner().rule_names().len());
    }

    #[test]
    fn test_plan_filter_on_account() {
        init();
        let s = server();
        let scan = s.new_column_set("Account", None).unwrap();
        let tree = RelNode::filter(scan, cmp(2, RexOp::Eq, string_lit("x@y.com")));
        let planned = s.planner().optimize(tree).unwrap();
        match &planned {
            RelNode::DelegatedScan(node) => assert_eq!(
                RemoteCall::Query {
                    query: String::from(
                        "SELECT Id, Name, Email FROM Account WHERE Email = 'x@y.com'"
                    ),
                    types: String::from("VARCHAR(18),VARCHAR(255),VARCHAR(80)"),
                },
                node.call
            ),
            other => panic!("Expected a delegated scan, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_id_not_first() {
        let s = server();
        let scan = s.new_column_set("Account", None).unwrap();
        let tree = RelNode::filter(
            project(scan, &[1, 0], &["Name", "Id"]),
            cmp(0, RexOp::Eq, string_lit("Acme")),
        );
        let planned = s.planner().optimize(tree.clone()).unwrap();
        assert_eq!("Filter", planned.op_name());
        assert_eq!(
            RemoteCall::Query {
                query: String::from("SELECT Id, Name, Email FROM Account"),
                types: String::from("VARCHAR(18),VARCHAR(255),VARCHAR(80)"),
            },
            leaf(&planned).call
        );
        assert_eq!(tree.schema(), planned.schema());
    }

    #[test]
    fn test_plan_deleted_range() {
        let s = server();
        let scan = s.new_column_set("Account_deleted", None).unwrap();
        let cond = RexNode::call(
            RexOp::And,
            vec![
                cmp(1, RexOp::Ge, ts_lit("2020-01-01 00:00:00")),
                cmp(1, RexOp::Le, ts_lit("2020-02-01 00:00:00")),
            ],
        );
        let planned = s.planner().optimize(RelNode::filter(scan, cond)).unwrap();
        assert_eq!(
            RemoteCall::GetDeleted {
                object: String::from("Account"),
                start: Some(String::from("2020-01-01T00:00:00")),
                end: Some(String::from("2020-02-01T00:00:00")),
            },
            leaf(&planned).call
        );

        let open = RelNode::filter(
            s.new_column_set("Account_deleted", None).unwrap(),
            cmp(1, RexOp::Ge, ts_lit("2020-01-01 00:00:00")),
        );
        assert!(matches!(
            s.planner().optimize(open),
            Err(MedError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_plan_lov_and_plain_scan() {
        let s = server();
        let lov = RelNode::filter(
            s.new_column_set("Account_LOV", None).unwrap(),
            cmp(0, RexOp::Eq, string_lit("Industry")),
        );
        let planned = s.planner().optimize(lov).unwrap();
        assert_eq!("Filter", planned.op_name());
        assert!(matches!(leaf(&planned).call, RemoteCall::Lov { .. }));

        let plain = s.planner().optimize(account_scan()).unwrap();
        assert_eq!("DelegatedScan", plain.op_name());
    }
}
