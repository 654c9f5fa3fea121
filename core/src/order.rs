use crate::sql::{Sql, SqlParam};

/// Sort direction for ORDER BY clauses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderBy {
    Asc,
    Desc,
}

impl OrderBy {
    /// Appends the direction keyword to a rendered expression: "expr ASC"
    ///
    /// The explicit space matters when the expression ends in `)`, which the
    /// word-boundary spacing treats as a non-word character.
    pub fn append_to<V: SqlParam>(self, expr: Sql<V>) -> Sql<V> {
        let expr = expr.append_raw(" ");
        match self {
            OrderBy::Asc => expr.append_raw("ASC"),
            OrderBy::Desc => expr.append_raw("DESC"),
        }
    }
}
