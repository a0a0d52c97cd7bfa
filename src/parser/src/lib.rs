#[macro_use]
extern crate log;

pub mod node;
pub mod operator;
pub mod pos;
pub mod reducer;
pub mod sql_parser;

pub use node::{SqlLiteral, SqlNode};
pub use operator::{OperatorSyntax, OperatorTable, SqlKind, SqlOperator};
pub use pos::ParserPos;
pub use reducer::{to_tree, to_tree_ex, TreeListItem};
pub use sql_parser::{parse_expression, parse_query, SelectItem, SqlParser, SqlSelect};
