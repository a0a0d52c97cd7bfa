use crate::rule::{as_filter, as_project, as_remote_scan, Pattern, Rule};
use crate::sarg::{Bound, SargAnalysis};
use crate::scan_rule::delegate_with;
use chrono::NaiveDateTime;
use common::logical_plan::{ProjectNode, RemoteCall, RemoteScanNode, SourceKind};
use common::{DataType, Field, MedError, RelNode, RexNode, REMOTE_TIMESTAMP_FORMAT};

/// Plans filters over an `<object>_deleted` scan as a getDeleted call over
/// the time range the filter selects. The filter must select exactly one
/// bounded range of the timestamp column.
#[derive(Debug)]
pub struct DeletedRangeRule {
    /// Match `Filter(Project(scan))` instead of `Filter(scan)`.
    over_project: bool,
}

impl DeletedRangeRule {
    pub fn over_project() -> Self {
        Self { over_project: true }
    }

    pub fn over_scan() -> Self {
        Self {
            over_project: false,
        }
    }

    fn decompose<'a>(
        &self,
        rel: &'a RelNode,
    ) -> Option<(&'a RexNode, Option<&'a ProjectNode>, &'a RemoteScanNode)> {
        let filter = as_filter(rel)?;
        if self.over_project {
            let project = as_project(&filter.child)?;
            Some((
                &filter.condition,
                Some(project),
                as_remote_scan(&project.child)?,
            ))
        } else {
            Some((&filter.condition, None, as_remote_scan(&filter.child)?))
        }
    }
}

fn bound_timestamp(bound: &Bound, object: &str) -> Result<NaiveDateTime, MedError> {
    let lit = bound.literal().ok_or_else(|| {
        MedError::InvalidRange(format!("Unbounded time range for {}", object))
    })?;
    match &lit.value {
        Field::TimestampField(t) => Ok(*t),
        Field::DateField(d) => d.and_hms_opt(0, 0, 0).ok_or_else(|| {
            MedError::InvalidRange(format!("Invalid date {} for {}", d, object))
        }),
        other => Err(MedError::InvalidRange(format!(
            "Time range bound {} for {} is not a timestamp",
            other, object
        ))),
    }
}

impl Rule for DeletedRangeRule {
    fn name(&self) -> &str {
        if self.over_project {
            "DeletedRange(Filter(Project(scan)))"
        } else {
            "DeletedRange(Filter(scan))"
        }
    }

    fn pattern(&self) -> Pattern {
        if self.over_project {
            Pattern::filter(Pattern::project(Pattern::RemoteScan))
        } else {
            Pattern::filter(Pattern::RemoteScan)
        }
    }

    fn on_match(&self, rel: &RelNode) -> Result<Option<RelNode>, MedError> {
        let (condition, project, scan) = match self.decompose(rel) {
            Some(parts) => parts,
            None => return Ok(None),
        };
        if scan.source.kind != SourceKind::Deleted {
            return Ok(None);
        }
        let object = scan.source.base_object();

        let input = match project {
            Some(p) => &p.schema,
            None => &scan.schema,
        };
        let analysis = SargAnalysis::analyze(condition, input);
        let timestamps: Vec<usize> = analysis
            .bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.dtype == DataType::Timestamp)
            .map(|(i, _)| i)
            .collect();
        let index = match timestamps.as_slice() {
            [i] => *i,
            _ => {
                return Err(MedError::InvalidRange(format!(
                    "Expected one time range on deleted records of {}, found {}",
                    object,
                    timestamps.len()
                )))
            }
        };
        let binding = &analysis.bindings[index];
        let range = match binding.single_range() {
            Some(range) if range.is_bounded() => range,
            _ => {
                return Err(MedError::InvalidRange(format!(
                    "Deleted records of {} need a time range bounded on both ends, got {}",
                    object,
                    binding.to_rex()
                )))
            }
        };
        let start = bound_timestamp(&range.lower, object)?;
        let end = bound_timestamp(&range.upper, object)?;
        info!("Deleted records of {} between {} and {}", object, start, end);

        let call = RemoteCall::GetDeleted {
            object: object.to_string(),
            start: Some(start.format(REMOTE_TIMESTAMP_FORMAT).to_string()),
            end: Some(end.format(REMOTE_TIMESTAMP_FORMAT).to_string()),
        };
        let mut new_rel = delegate_with(scan, call);
        if let Some(p) = project {
            new_rel = RelNode::project_with_schema(new_rel, p.exprs.clone(), p.schema.clone());
        }
        // The remote range is inclusive on both ends.
        let mut local = Vec::new();
        if range.lower.is_strict() || range.upper.is_strict() {
            local.push(binding.to_rex());
        }
        local.extend(analysis.remaining(&[index]));
        if let Some(cond) = RexNode::and(local) {
            new_rel = RelNode::filter(new_rel, cond);
        }
        Ok(Some(new_rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::logical_plan::SourceDescriptor;
    use common::testutil::*;
    use common::{RexOp, TableSchema};

    fn deleted_scan() -> RelNode {
        let schema = TableSchema::from_vecs(
            vec!["Id", "DeleteStamp"],
            vec![DataType::Varchar(153), DataType::Timestamp],
        );
        RelNode::RemoteScan(RemoteScanNode {
            source: SourceDescriptor {
                object: String::from("Account_deleted"),
                kind: SourceKind::Deleted,
                fields: schema.names(),
                types: schema.dtypes(),
            },
            call: RemoteCall::GetDeleted {
                object: String::from("Account"),
                start: None,
                end: None,
            },
            schema,
        })
    }

    fn between(lo: &str, hi: &str) -> RexNode {
        RexNode::call(
            RexOp::And,
            vec![cmp(1, RexOp::Ge, ts_lit(lo)), cmp(1, RexOp::Le, ts_lit(hi))],
        )
    }

    fn call_of(rel: &RelNode) -> RemoteCall {
        match rel {
            RelNode::DelegatedScan(node) => node.call.clone(),
            other => call_of(other.child().unwrap()),
        }
    }

    #[test]
    fn test_range_becomes_call() {
        init();
        let tree = RelNode::filter(
            deleted_scan(),
            between("2020-01-01 00:00:00", "2020-02-01 00:00:00"),
        );
        let rel = DeletedRangeRule::over_scan().on_match(&tree).unwrap().unwrap();
        assert!(matches!(rel, RelNode::DelegatedScan(_)));
        assert_eq!(
            RemoteCall::GetDeleted {
                object: String::from("Account"),
                start: Some(String::from("2020-01-01T00:00:00")),
                end: Some(String::from("2020-02-01T00:00:00")),
            },
            call_of(&rel)
        );
    }

    #[test]
    fn test_residual_layered() {
        let id = cmp(0, RexOp::Eq, string_lit("001"));
        let cond = RexNode::call(
            RexOp::And,
            vec![
                id.clone(),
                cmp(1, RexOp::Gt, date_lit("2020-01-01")),
                cmp(1, RexOp::Le, ts_lit("2020-01-15 12:00:00")),
            ],
        );
        let rel = DeletedRangeRule::over_scan()
            .on_match(&RelNode::filter(deleted_scan(), cond))
            .unwrap()
            .unwrap();
        assert_eq!(
            RemoteCall::GetDeleted {
                object: String::from("Account"),
                start: Some(String::from("2020-01-01T00:00:00")),
                end: Some(String::from("2020-01-15T12:00:00")),
            },
            call_of(&rel)
        );
        match &rel {
            RelNode::Filter(f) => {
                let terms = f.condition.conjunctions();
                assert_eq!(3, terms.len());
                assert_eq!(cmp(1, RexOp::Gt, date_lit("2020-01-01")), terms[0]);
                assert_eq!(id, terms[2]);
            }
            other => panic!("Expected a filter, got {:?}", other),
        }
    }

    #[test]
    fn test_over_project() {
        let proj = RelNode::project(
            deleted_scan(),
            vec![RexNode::input_ref(1), RexNode::input_ref(0)],
            vec![String::from("DeleteStamp"), String::from("Id")],
        )
        .unwrap();
        let cond = RexNode::call(
            RexOp::And,
            vec![
                cmp(0, RexOp::Ge, ts_lit("2020-03-01 00:00:00")),
                cmp(0, RexOp::Le, ts_lit("2020-03-02 00:00:00")),
            ],
        );
        let tree = RelNode::filter(proj, cond);
        assert_eq!(None, DeletedRangeRule::over_scan().on_match(&tree).unwrap());
        let rel = DeletedRangeRule::over_project()
            .on_match(&tree)
            .unwrap()
            .unwrap();
        assert!(matches!(rel, RelNode::Project(_)));
        assert_eq!(tree.schema(), rel.schema());
    }

    #[test]
    fn test_invalid_ranges() {
        let rule = DeletedRangeRule::over_scan();
        let open = RelNode::filter(
            deleted_scan(),
            cmp(1, RexOp::Ge, ts_lit("2020-01-01 00:00:00")),
        );
        assert!(matches!(rule.on_match(&open), Err(MedError::InvalidRange(_))));

        let union = RelNode::filter(
            deleted_scan(),
            RexNode::call(
                RexOp::Or,
                vec![
                    between("2020-01-01 00:00:00", "2020-01-02 00:00:00"),
                    between("2020-02-01 00:00:00", "2020-02-02 00:00:00"),
                ],
            ),
        );
        assert!(matches!(rule.on_match(&union), Err(MedError::InvalidRange(_))));

        let no_time = RelNode::filter(deleted_scan(), cmp(0, RexOp::Eq, string_lit("001")));
        assert!(matches!(rule.on_match(&no_time), Err(MedError::InvalidRange(_))));
    }

    #[test]
    fn test_declines_other_kinds() {
        let tree = RelNode::filter(account_scan(), cmp(0, RexOp::Eq, string_lit("001")));
        assert_eq!(None, DeletedRangeRule::over_scan().on_match(&tree).unwrap());
    }
}
