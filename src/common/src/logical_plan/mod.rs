use crate::{Attribute, DataType, MedError, TableSchema};
pub use rex::{RexLiteral, RexNode, RexOp};
use std::fmt;

pub mod rex;

/// Kind of remote object behind a scan.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A regular object answered by the generic query call.
    Query,
    /// The `<object>_deleted` pseudo-table of deleted records.
    Deleted,
    /// The `<object>_LOV` pseudo-table of picklist values.
    Lov,
}

/// Remote object a scan reads, with the full field list the remote side knows.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourceDescriptor {
    /// Object name as referenced in the query, e.g. `Account_deleted`.
    pub object: String,
    pub kind: SourceKind,
    /// Remote field name of each scan column, in column order.
    pub fields: Vec<String>,
    /// Resolved types of `fields`.
    pub types: Vec<DataType>,
}

impl SourceDescriptor {
    /// Name of the underlying remote object, without any pseudo-table suffix.
    pub fn base_object(&self) -> &str {
        let suffix = match self.kind {
            SourceKind::Query => return &self.object,
            SourceKind::Deleted => crate::catalog::DELETED_SUFFIX,
            SourceKind::Lov => crate::catalog::LOV_SUFFIX,
        };
        self.object
            .strip_suffix(suffix)
            .unwrap_or_else(|| self.object.as_str())
    }
}

/// Call handed to the remote connector.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum RemoteCall {
    /// Generic query: the query text and the comma-joined type list of its fields.
    Query { query: String, types: String },
    /// Deleted records of an object between two `yyyy-MM-ddTHH:mm:ss` bounds.
    GetDeleted {
        object: String,
        start: Option<String>,
        end: Option<String>,
    },
    /// Picklist values of an object.
    Lov { object: String },
}

impl fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCall::Query { query, types } => write!(f, "query('{}', '{}')", query, types),
            RemoteCall::GetDeleted { object, start, end } => write!(
                f,
                "getDeleted('{}', '{}', '{}')",
                object,
                start.as_deref().unwrap_or(""),
                end.as_deref().unwrap_or("")
            ),
            RemoteCall::Lov { object } => write!(f, "getLov('{}')", object),
        }
    }
}

/// Filter node.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FilterNode {
    pub child: Box<RelNode>,
    /// Boolean condition over the child's row type.
    pub condition: RexNode,
}

/// Projection node.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProjectNode {
    pub child: Box<RelNode>,
    /// Output expressions over the child's row type.
    pub exprs: Vec<RexNode>,
    /// Output row type; names are the output names.
    pub schema: TableSchema,
}

impl ProjectNode {
    /// Returns true when every output expression is a plain field reference.
    pub fn is_column_only(&self) -> bool {
        self.exprs.iter().all(|e| e.as_input_ref().is_some())
    }
}

/// Leaf over a remote object that the remote rules have not planned yet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RemoteScanNode {
    pub source: SourceDescriptor,
    /// The call the scan would issue without any pushdown.
    pub call: RemoteCall,
    /// Row type of the scan.
    pub schema: TableSchema,
}

/// Leaf that issues a call to the remote system and returns its rows.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DelegatedScanNode {
    pub source: SourceDescriptor,
    pub call: RemoteCall,
    /// Remote fields requested by the call, in order.
    pub requested_fields: Vec<String>,
    /// Types of `requested_fields`.
    pub requested_types: Vec<DataType>,
    /// Row type of the rows the call returns.
    pub schema: TableSchema,
}

/// Relational expression tree. Each node owns its child.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum RelNode {
    Filter(FilterNode),
    Project(ProjectNode),
    RemoteScan(RemoteScanNode),
    DelegatedScan(DelegatedScanNode),
}

impl RelNode {
    /// Creates a filter over `child`.
    ///
    /// # Arguments
    ///
    /// * `child` - Input of the filter.
    /// * `condition` - Condition over the child's row type.
    pub fn filter(child: RelNode, condition: RexNode) -> Self {
        RelNode::Filter(FilterNode {
            child: Box::new(child),
            condition,
        })
    }

    /// Creates a projection over `child`, deriving the output types.
    ///
    /// # Arguments
    ///
    /// * `child` - Input of the projection.
    /// * `exprs` - Output expressions.
    /// * `names` - Output names, one per expression.
    pub fn project(child: RelNode, exprs: Vec<RexNode>, names: Vec<String>) -> Result<Self, MedError> {
        if exprs.len() != names.len() {
            return Err(MedError::ValidationError(format!(
                "Projection has {} expressions but {} names",
                exprs.len(),
                names.len()
            )));
        }
        let mut attrs = Vec::new();
        for (expr, name) in exprs.iter().zip(names.into_iter()) {
            attrs.push(Attribute::new(name, expr.derive_type(child.schema())?));
        }
        Ok(RelNode::Project(ProjectNode {
            child: Box::new(child),
            exprs,
            schema: TableSchema::new(attrs),
        }))
    }

    /// Creates a projection with an already known output row type.
    pub fn project_with_schema(child: RelNode, exprs: Vec<RexNode>, schema: TableSchema) -> Self {
        RelNode::Project(ProjectNode {
            child: Box::new(child),
            exprs,
            schema,
        })
    }

    /// Row type produced by the node.
    pub fn schema(&self) -> &TableSchema {
        match self {
            RelNode::Filter(node) => node.child.schema(),
            RelNode::Project(node) => &node.schema,
            RelNode::RemoteScan(node) => &node.schema,
            RelNode::DelegatedScan(node) => &node.schema,
        }
    }

    /// Input of the node, if it has one.
    pub fn child(&self) -> Option<&RelNode> {
        match self {
            RelNode::Filter(node) => Some(&node.child),
            RelNode::Project(node) => Some(&node.child),
            _ => None,
        }
    }

    /// Returns the node with its input replaced. Leaves are returned unchanged.
    pub fn with_child(&self, child: RelNode) -> RelNode {
        match self {
            RelNode::Filter(node) => RelNode::filter(child, node.condition.clone()),
            RelNode::Project(node) => {
                RelNode::project_with_schema(child, node.exprs.clone(), node.schema.clone())
            }
            leaf => leaf.clone(),
        }
    }

    /// Name of the operator for explain output.
    pub fn op_name(&self) -> &'static str {
        match self {
            RelNode::Filter(_) => "Filter",
            RelNode::Project(_) => "Project",
            RelNode::RemoteScan(_) => "RemoteScan",
            RelNode::DelegatedScan(_) => "DelegatedScan",
        }
    }

    /// Indented, one node per line description of the tree.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(0, &mut out);
        out
    }

    fn explain_into(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let detail = match self {
            RelNode::Filter(node) => format!("condition=[{}]", node.condition),
            RelNode::Project(node) => {
                let items: Vec<String> = node
                    .exprs
                    .iter()
                    .zip(node.schema.attributes())
                    .map(|(e, a)| format!("{}=[{}]", a.name(), e))
                    .collect();
                items.join(", ")
            }
            RelNode::RemoteScan(node) => {
                format!("object=[{}], call=[{}]", node.source.object, node.call)
            }
            RelNode::DelegatedScan(node) => format!(
                "fields=[{}], call=[{}]",
                node.requested_fields.join(", "),
                node.call
            ),
        };
        out.push_str(&format!("{}({})\n", self.op_name(), detail));
        if let Some(child) = self.child() {
            child.explain_into(depth + 1, out);
        }
    }

    /// Serializes the tree as json.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }

    /// De-Serializes a json representation of the tree created in to_json
    pub fn from_json(json: &str) -> Result<Self, MedError> {
        serde_json::from_str(json)
            .map_err(|_| MedError::MedError(String::from("Malformatted logical plan json")))
    }
}

impl fmt::Display for RelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.explain())
    }
}
