/// Builds the remote query text for a narrowed, filtered scan.
pub trait QueryTextBuilder {
    /// Returns the new query text, or None if `original` cannot be rewritten.
    ///
    /// # Arguments
    ///
    /// * `original` - Query text the scan was created with.
    /// * `fields` - Remote fields to select, in order.
    /// * `filter` - Printed remote predicate, if any.
    fn build(&self, original: &str, fields: &[String], filter: Option<&str>) -> Option<String>;
}

/// Rewrites the query text by keeping everything from the last ` from` on
/// and replacing the select list in front of it.
///
/// A ` from` inside a string literal after the real FROM keyword is taken as
/// the keyword. Initial query texts are generated without a WHERE clause, so
/// this only matters for hand-written texts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplicingQueryBuilder;

impl SplicingQueryBuilder {
    /// Byte offset of the last case-insensitive ` from` in `query`.
    fn from_offset(query: &str) -> Option<usize> {
        query.to_ascii_lowercase().rfind(" from")
    }
}

impl QueryTextBuilder for SplicingQueryBuilder {
    fn build(&self, original: &str, fields: &[String], filter: Option<&str>) -> Option<String> {
        let offset = Self::from_offset(original)?;
        let mut query = format!("SELECT {}{}", fields.join(", "), &original[offset..]);
        if let Some(predicate) = filter {
            query.push_str(" WHERE ");
            query.push_str(predicate);
        }
        Some(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build() {
        let b = SplicingQueryBuilder;
        let original = "SELECT Id, Name, Email FROM Account";
        assert_eq!(
            Some(String::from("SELECT Name, Email FROM Account")),
            b.build(original, &fields(&["Name", "Email"]), None)
        );
        assert_eq!(
            Some(String::from(
                "SELECT Id, Name, Email FROM Account WHERE Email = 'x@y.com'"
            )),
            b.build(original, &fields(&["Id", "Name", "Email"]), Some("Email = 'x@y.com'"))
        );
    }

    #[test]
    fn test_lowercase_from() {
        let b = SplicingQueryBuilder;
        assert_eq!(
            Some(String::from("SELECT Id from Contact")),
            b.build("select Id, LastName from Contact", &fields(&["Id"]), None)
        );
    }

    #[test]
    fn test_no_from() {
        assert_eq!(None, SplicingQueryBuilder.build("SELECT 1", &fields(&["Id"]), None));
    }

    #[test]
    fn test_known_limitation_from_inside_literal() {
        // Known limitation: a ` from` inside a literal is mistaken for the
        // keyword and produces a broken query. Callers only pass generated
        // texts, which carry no literals.
        let b = SplicingQueryBuilder;
        assert_eq!(
            Some(String::from("SELECT Id from x'")),
            b.build(
                "SELECT Id FROM Account WHERE Name = 'a from x'",
                &fields(&["Id"]),
                None
            )
        );
    }
}
