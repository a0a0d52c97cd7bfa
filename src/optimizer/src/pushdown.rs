//! Delegates projections and filters over a remote scan to the remote query.
//!
//! Each `PushdownRule` handles one tree shape. Over a scan of a regular
//! object it narrows the remote select list to the columns the plan needs,
//! prints the filter into a WHERE clause, and re-applies locally whatever
//! could not be delegated. When the select list would be rejected remotely
//! the rule falls back to the original scan with the plan kept on top.

use crate::filter_printer::FilterPrinter;
use crate::projection::{validate_projection, ProjectionViolation, PushProjector};
use crate::query_text::{QueryTextBuilder, SplicingQueryBuilder};
use crate::rule::{as_filter, as_project, as_remote_scan, Pattern, Rule};
use crate::sarg::SargAnalysis;
use crate::scan_rule::delegate;
use common::config::PushdownConfig;
use common::logical_plan::{
    DelegatedScanNode, FilterNode, ProjectNode, RemoteCall, RemoteScanNode, SourceKind,
};
use common::{Attribute, MedError, RelNode, RexNode, TableSchema};
use std::fmt;
use std::iter;

/// Tree shapes the pushdown rules match, named top-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushdownShape {
    ProjectFilterProject,
    ProjectFilter,
    FilterProject,
    Filter,
    Project,
}

impl PushdownShape {
    /// All shapes, in the order their rules are registered.
    pub const ALL: [PushdownShape; 5] = [
        PushdownShape::ProjectFilterProject,
        PushdownShape::ProjectFilter,
        PushdownShape::FilterProject,
        PushdownShape::Filter,
        PushdownShape::Project,
    ];

    pub fn pattern(&self) -> Pattern {
        let scan = Pattern::RemoteScan;
        match self {
            PushdownShape::ProjectFilterProject => {
                Pattern::project(Pattern::filter(Pattern::project(scan)))
            }
            PushdownShape::ProjectFilter => Pattern::project(Pattern::filter(scan)),
            PushdownShape::FilterProject => Pattern::filter(Pattern::project(scan)),
            PushdownShape::Filter => Pattern::filter(scan),
            PushdownShape::Project => Pattern::project(scan),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PushdownShape::ProjectFilterProject => "Pushdown(Project(Filter(Project(scan))))",
            PushdownShape::ProjectFilter => "Pushdown(Project(Filter(scan)))",
            PushdownShape::FilterProject => "Pushdown(Filter(Project(scan)))",
            PushdownShape::Filter => "Pushdown(Filter(scan))",
            PushdownShape::Project => "Pushdown(Project(scan))",
        }
    }
}

/// Why a match was planned without delegating anything.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The projection below the filter computes expressions.
    NonColumnProjection,
    InvalidProjection(ProjectionViolation),
    /// The filter cannot be printed and there is no projection to delegate.
    UnprintableFilter,
    /// The query text has no FROM clause to splice onto.
    NoFromClause(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NonColumnProjection => write!(f, "projection is not column-only"),
            FallbackReason::InvalidProjection(v) => write!(f, "invalid projection: {}", v),
            FallbackReason::UnprintableFilter => write!(f, "filter cannot be printed remotely"),
            FallbackReason::NoFromClause(q) => write!(f, "no FROM clause in query {}", q),
        }
    }
}

/// Result of a pushdown attempt on a matched tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PushdownOutcome {
    Pushed(RelNode),
    /// The original tree over a delegated scan of the original call.
    Fallback { rel: RelNode, reason: FallbackReason },
}

impl PushdownOutcome {
    pub fn is_pushed(&self) -> bool {
        matches!(self, PushdownOutcome::Pushed(_))
    }

    pub fn into_rel(self) -> RelNode {
        match self {
            PushdownOutcome::Pushed(rel) | PushdownOutcome::Fallback { rel, .. } => rel,
        }
    }
}

/// Nodes of a matched tree, top-down.
struct Matched<'a> {
    top: Option<&'a ProjectNode>,
    filter: Option<&'a FilterNode>,
    bottom: Option<&'a ProjectNode>,
    scan: &'a RemoteScanNode,
}

/// What to delegate for a match.
struct Delegation {
    /// Scan columns to request, in request order.
    columns: Vec<usize>,
    /// Condition over the requested columns.
    condition: Option<RexNode>,
    /// Projection over the filtered columns to re-apply locally.
    top: Option<(Vec<RexNode>, TableSchema)>,
}

/// Pushdown rule for one tree shape.
pub struct PushdownRule {
    shape: PushdownShape,
    partial_filter_pushdown: bool,
    builder: Box<dyn QueryTextBuilder>,
}

impl PushdownRule {
    /// Creates a rule splicing query texts.
    ///
    /// # Arguments
    ///
    /// * `shape` - Tree shape the rule matches.
    /// * `config` - Pushdown switches.
    pub fn new(shape: PushdownShape, config: &PushdownConfig) -> Self {
        Self::with_builder(shape, config, Box::new(SplicingQueryBuilder))
    }

    /// Creates a rule with a custom query text builder.
    pub fn with_builder(
        shape: PushdownShape,
        config: &PushdownConfig,
        builder: Box<dyn QueryTextBuilder>,
    ) -> Self {
        Self {
            shape,
            partial_filter_pushdown: config.partial_filter_pushdown,
            builder,
        }
    }

    pub fn shape(&self) -> PushdownShape {
        self.shape
    }

    fn decompose<'a>(&self, rel: &'a RelNode) -> Option<Matched<'a>> {
        let m = match self.shape {
            PushdownShape::ProjectFilterProject => {
                let top = as_project(rel)?;
                let filter = as_filter(&top.child)?;
                let bottom = as_project(&filter.child)?;
                Matched {
                    top: Some(top),
                    filter: Some(filter),
                    bottom: Some(bottom),
                    scan: as_remote_scan(&bottom.child)?,
                }
            }
            PushdownShape::ProjectFilter => {
                let top = as_project(rel)?;
                let filter = as_filter(&top.child)?;
                Matched {
                    top: Some(top),
                    filter: Some(filter),
                    bottom: None,
                    scan: as_remote_scan(&filter.child)?,
                }
            }
            PushdownShape::FilterProject => {
                let filter = as_filter(rel)?;
                let bottom = as_project(&filter.child)?;
                Matched {
                    top: None,
                    filter: Some(filter),
                    bottom: Some(bottom),
                    scan: as_remote_scan(&bottom.child)?,
                }
            }
            PushdownShape::Filter => {
                let filter = as_filter(rel)?;
                Matched {
                    top: None,
                    filter: Some(filter),
                    bottom: None,
                    scan: as_remote_scan(&filter.child)?,
                }
            }
            PushdownShape::Project => {
                let top = as_project(rel)?;
                Matched {
                    top: Some(top),
                    filter: None,
                    bottom: None,
                    scan: as_remote_scan(&top.child)?,
                }
            }
        };
        Some(m)
    }

    /// Attempts the pushdown.
    ///
    /// Returns Ok(None) when `rel` does not have the rule's shape or the scan
    /// is not over a regular object.
    ///
    /// # Arguments
    ///
    /// * `rel` - Root of the tree to rewrite.
    pub fn push_down(&self, rel: &RelNode) -> Result<Option<PushdownOutcome>, MedError> {
        let m = match self.decompose(rel) {
            Some(m) => m,
            None => return Ok(None),
        };
        if m.scan.source.kind != SourceKind::Query {
            return Ok(None);
        }
        let all_columns: Vec<usize> = (0..m.scan.schema.size()).collect();
        let delegation = match (self.shape, m.top, m.filter, m.bottom) {
            (PushdownShape::ProjectFilterProject, _, _, Some(bottom))
            | (PushdownShape::FilterProject, _, _, Some(bottom)) => {
                if !bottom.is_column_only() {
                    return Ok(Some(self.fallback(&m, FallbackReason::NonColumnProjection)));
                }
                Delegation {
                    columns: bottom.exprs.iter().filter_map(|e| e.as_input_ref()).collect(),
                    condition: m.filter.map(|f| f.condition.clone()),
                    top: m.top.map(|t| (t.exprs.clone(), t.schema.clone())),
                }
            }
            (PushdownShape::ProjectFilter, Some(top), Some(filter), _) => {
                let projector =
                    PushProjector::new(top.exprs.iter().chain(iter::once(&filter.condition)));
                if projector.is_identity(m.scan.schema.size()) {
                    Delegation {
                        columns: all_columns,
                        condition: Some(filter.condition.clone()),
                        top: Some((top.exprs.clone(), top.schema.clone())),
                    }
                } else {
                    Delegation {
                        columns: projector.columns().to_vec(),
                        condition: Some(projector.remap(&filter.condition)),
                        top: Some((
                            top.exprs.iter().map(|e| projector.remap(e)).collect(),
                            top.schema.clone(),
                        )),
                    }
                }
            }
            (PushdownShape::Filter, _, Some(filter), _) => Delegation {
                columns: all_columns,
                condition: Some(filter.condition.clone()),
                top: None,
            },
            (PushdownShape::Project, Some(top), _, _) => {
                if top.is_column_only() {
                    Delegation {
                        columns: top.exprs.iter().filter_map(|e| e.as_input_ref()).collect(),
                        condition: None,
                        top: None,
                    }
                } else {
                    let projector = PushProjector::new(&top.exprs);
                    Delegation {
                        columns: projector.columns().to_vec(),
                        condition: None,
                        top: Some((
                            top.exprs.iter().map(|e| projector.remap(e)).collect(),
                            top.schema.clone(),
                        )),
                    }
                }
            }
            _ => return Ok(None),
        };
        self.push(&m, delegation, rel.schema()).map(Some)
    }

    fn push(
        &self,
        m: &Matched,
        delegation: Delegation,
        row_type: &TableSchema,
    ) -> Result<PushdownOutcome, MedError> {
        let source = &m.scan.source;
        let mut attrs = Vec::with_capacity(delegation.columns.len());
        for c in delegation.columns.iter() {
            let name = source.fields.get(*c).ok_or_else(|| {
                MedError::InternalError(format!(
                    "Column {} out of range for remote object {}",
                    c, source.object
                ))
            })?;
            let dtype = source.types.get(*c).ok_or_else(|| {
                MedError::InternalError(format!(
                    "Column {} has no type in remote object {}",
                    c, source.object
                ))
            })?;
            attrs.push(Attribute::new(name.clone(), dtype.clone()));
        }
        let field_names: Vec<String> = attrs.iter().map(|a| a.name().to_string()).collect();
        if let Err(violation) = validate_projection(&field_names) {
            return Ok(self.fallback(m, FallbackReason::InvalidProjection(violation)));
        }

        let full_scan = self.shape == PushdownShape::Filter;
        let schema = if full_scan {
            m.scan.schema.clone()
        } else {
            TableSchema::new(attrs)
        };

        let printer = FilterPrinter::new(&field_names);
        let (predicate, local_condition) = match &delegation.condition {
            None => (None, None),
            Some(cond) => match printer.print(cond) {
                Some(text) => (Some(text), None),
                None => {
                    let (pushed, rest) = if self.partial_filter_pushdown {
                        push_sargable(cond, &printer, &schema)
                    } else {
                        (None, Some(cond.clone()))
                    };
                    if pushed.is_none() && full_scan {
                        return Ok(self.fallback(m, FallbackReason::UnprintableFilter));
                    }
                    debug!("Filter {} kept local over {}", cond, source.object);
                    (pushed, rest)
                }
            },
        };

        let (original_query, original_types) = match &m.scan.call {
            RemoteCall::Query { query, types } => (query, types),
            other => {
                return Err(MedError::InternalError(format!(
                    "Cannot push into remote call {}",
                    other
                )))
            }
        };
        let query = match self
            .builder
            .build(original_query, &field_names, predicate.as_deref())
        {
            Some(q) => q,
            None => {
                return Ok(self.fallback(m, FallbackReason::NoFromClause(original_query.clone())))
            }
        };
        let types = if full_scan {
            original_types.clone()
        } else {
            schema
                .dtypes()
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<String>>()
                .join(",")
        };
        debug!("Delegating {} as {}", source.object, query);

        let mut rel = RelNode::DelegatedScan(DelegatedScanNode {
            source: source.clone(),
            call: RemoteCall::Query { query, types },
            requested_fields: field_names,
            requested_types: schema.dtypes(),
            schema,
        });
        if let Some(cond) = local_condition {
            rel = RelNode::filter(rel, cond);
        }
        if let Some((exprs, top_schema)) = delegation.top {
            rel = RelNode::project_with_schema(rel, exprs, top_schema);
        }
        Ok(PushdownOutcome::Pushed(with_row_type(rel, row_type)))
    }

    /// The matched tree unchanged over a delegated scan of the original call.
    fn fallback(&self, m: &Matched, reason: FallbackReason) -> PushdownOutcome {
        let mut rel = delegate(m.scan);
        if let Some(bottom) = m.bottom {
            rel = RelNode::project_with_schema(rel, bottom.exprs.clone(), bottom.schema.clone());
        }
        if let Some(filter) = m.filter {
            rel = RelNode::filter(rel, filter.condition.clone());
        }
        if let Some(top) = m.top {
            rel = RelNode::project_with_schema(rel, top.exprs.clone(), top.schema.clone());
        }
        PushdownOutcome::Fallback { rel, reason }
    }
}

/// Pushes the printable sargable conjuncts of `cond`. Returns the printed
/// predicate and what remains to apply locally.
fn push_sargable(
    cond: &RexNode,
    printer: &FilterPrinter,
    input: &TableSchema,
) -> (Option<String>, Option<RexNode>) {
    let analysis = SargAnalysis::analyze(cond, input);
    let mut pushed = Vec::new();
    let mut consumed = Vec::new();
    for (i, binding) in analysis.bindings.iter().enumerate() {
        if !binding.is_analyzable() {
            continue;
        }
        let rex = binding.to_rex();
        if printer.print(&rex).is_some() {
            pushed.push(rex);
            consumed.push(i);
        }
    }
    match RexNode::and(pushed).and_then(|p| printer.print(&p)) {
        Some(text) => (Some(text), analysis.remaining(&consumed)),
        None => (None, Some(cond.clone())),
    }
}

/// Renames the output of `rel` to `row_type` when the names differ.
fn with_row_type(rel: RelNode, row_type: &TableSchema) -> RelNode {
    if rel.schema().names() == row_type.names() {
        return rel;
    }
    let exprs = (0..row_type.size()).map(RexNode::input_ref).collect();
    RelNode::project_with_schema(rel, exprs, row_type.clone())
}

impl Rule for PushdownRule {
    fn name(&self) -> &str {
        self.shape.name()
    }

    fn pattern(&self) -> Pattern {
        self.shape.pattern()
    }

    fn on_match(&self, rel: &RelNode) -> Result<Option<RelNode>, MedError> {
        let outcome = match self.push_down(rel)? {
            Some(outcome) => outcome,
            None => return Ok(None),
        };
        if let PushdownOutcome::Fallback { reason, .. } = &outcome {
            info!("{} fell back to local processing: {}", self.name(), reason);
        }
        Ok(Some(outcome.into_rel()))
    }
}
