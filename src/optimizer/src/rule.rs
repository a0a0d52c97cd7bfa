use common::logical_plan::{FilterNode, ProjectNode, RemoteScanNode};
use common::{MedError, RelNode};

/// Shape of a plan fragment a rule fires on.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Filter(Box<Pattern>),
    Project(Box<Pattern>),
    /// A scan not yet planned.
    RemoteScan,
    Any,
}

impl Pattern {
    pub fn filter(child: Pattern) -> Self {
        Pattern::Filter(Box::new(child))
    }

    pub fn project(child: Pattern) -> Self {
        Pattern::Project(Box::new(child))
    }

    /// Checks whether the tree rooted at `rel` has this shape.
    pub fn matches(&self, rel: &RelNode) -> bool {
        match (self, rel) {
            (Pattern::Any, _) => true,
            (Pattern::RemoteScan, RelNode::RemoteScan(_)) => true,
            (Pattern::Filter(child), RelNode::Filter(node)) => child.matches(&node.child),
            (Pattern::Project(child), RelNode::Project(node)) => child.matches(&node.child),
            _ => false,
        }
    }
}

/// A rewrite of a plan fragment.
pub trait Rule {
    /// Name used in log output.
    fn name(&self) -> &str;

    fn pattern(&self) -> Pattern;

    /// Rewrites a fragment that matches `pattern`.
    ///
    /// Returns Ok(None) when the rule declines.
    ///
    /// # Arguments
    ///
    /// * `rel` - Root of the matched fragment.
    fn on_match(&self, rel: &RelNode) -> Result<Option<RelNode>, MedError>;
}

pub(crate) fn as_filter(rel: &RelNode) -> Option<&FilterNode> {
    match rel {
        RelNode::Filter(node) => Some(node),
        _ => None,
    }
}

pub(crate) fn as_project(rel: &RelNode) -> Option<&ProjectNode> {
    match rel {
        RelNode::Project(node) => Some(node),
        _ => None,
    }
}

pub(crate) fn as_remote_scan(rel: &RelNode) -> Option<&RemoteScanNode> {
    match rel {
        RelNode::RemoteScan(node) => Some(node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;
    use common::RexOp;

    #[test]
    fn test_matches() {
        let scan = account_scan();
        let filter = RelNode::filter(scan.clone(), cmp(1, RexOp::Eq, string_lit("a")));
        let proj = RelNode::project(
            filter.clone(),
            vec![common::RexNode::input_ref(0)],
            vec![String::from("Id")],
        )
        .unwrap();

        let p = Pattern::project(Pattern::filter(Pattern::RemoteScan));
        assert!(p.matches(&proj));
        assert!(!p.matches(&filter));
        assert!(Pattern::filter(Pattern::RemoteScan).matches(&filter));
        assert!(Pattern::filter(Pattern::Any).matches(&filter));
        assert!(!Pattern::filter(Pattern::project(Pattern::Any)).matches(&filter));
        assert!(Pattern::Any.matches(&scan));
    }
}
