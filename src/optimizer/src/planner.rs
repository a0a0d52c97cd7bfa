use crate::rule::Rule;
use common::{MedError, RelNode};

/// Upper bound on rule firings for one plan.
pub const DEFAULT_MAX_FIRINGS: usize = 1000;

/// Rewrites a plan with registered rules until none applies.
///
/// Each step walks the tree top-down and, at every node, tries the rules in
/// registration order; the first rule that returns a replacement fires and
/// the walk restarts from the root.
pub struct Planner {
    rules: Vec<Box<dyn Rule>>,
    max_firings: usize,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            max_firings: DEFAULT_MAX_FIRINGS,
        }
    }

    pub fn with_max_firings(mut self, max_firings: usize) -> Self {
        self.max_firings = max_firings;
        self
    }

    /// Registers a rule after the already registered ones.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        debug!("Registered rule {}", rule.name());
        self.rules.push(rule);
    }

    /// Names of the registered rules, in order.
    pub fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name().to_string()).collect()
    }

    /// Plans `rel` to fixpoint.
    ///
    /// # Arguments
    ///
    /// * `rel` - Tree to rewrite.
    pub fn optimize(&self, rel: RelNode) -> Result<RelNode, MedError> {
        let mut current = rel;
        let mut firings = 0;
        while let Some(next) = self.step(&current)? {
            firings += 1;
            if firings > self.max_firings {
                return Err(MedError::InternalError(format!(
                    "Planning did not reach a fixpoint after {} rule firings",
                    self.max_firings
                )));
            }
            current = next;
        }
        debug!("Planning finished after {} rule firings", firings);
        Ok(current)
    }

    /// Fires the first applicable rule, top-down.
    fn step(&self, rel: &RelNode) -> Result<Option<RelNode>, MedError> {
        for rule in self.rules.iter() {
            if !rule.pattern().matches(rel) {
                continue;
            }
            if let Some(replacement) = rule.on_match(rel)? {
                debug!("Rule {} fired on {}", rule.name(), rel.op_name());
                return Ok(Some(replacement));
            }
        }
        match rel.child() {
            Some(child) => Ok(self.step(child)?.map(|c| rel.with_child(c))),
            None => Ok(None),
        }
    }
}
