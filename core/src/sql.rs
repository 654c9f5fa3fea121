use compact_str::{CompactString, ToCompactString};
use smallvec::{SmallVec, smallvec};
use std::fmt::Display;

/// Marker trait for dialect parameter value types.
pub trait SqlParam: Clone + std::fmt::Debug {}

/// A SQL chunk represents a part of an SQL statement.
#[derive(Clone)]
pub enum SqlChunk<V: SqlParam> {
    Text(CompactString),
    Param(V),
}

impl<V: SqlParam> SqlChunk<V> {
    /// Write chunk to buffer (zero-allocation internal method)
    pub(crate) fn write_to_buffer(&self, buf: &mut CompactString) {
        match self {
            SqlChunk::Text(text) => buf.push_str(text),
            SqlChunk::Param(_) => buf.push('?'),
        }
    }
}

impl<V: SqlParam> std::fmt::Debug for SqlChunk<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlChunk::Text(text) => f.debug_tuple("Text").field(text).finish(),
            SqlChunk::Param(value) => f.debug_tuple("Param").field(value).finish(),
        }
    }
}

/// A SQL statement or fragment with parameters.
///
/// This type is used to build SQL statements with proper parameter handling.
/// It keeps track of both the SQL text and the parameters to be bound.
#[derive(Debug, Clone)]
pub struct Sql<V: SqlParam> {
    /// The chunks that make up this SQL statement or fragment.
    pub chunks: SmallVec<[SqlChunk<V>; 3]>,
}

impl<V: SqlParam> Sql<V> {
    /// Creates a new empty SQL fragment.
    pub const fn empty() -> Self {
        Sql {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates a new SQL fragment from a raw string.
    ///
    /// The string is treated as literal SQL text, not a parameter.
    pub fn raw<T: AsRef<str>>(sql: T) -> Self {
        Self {
            chunks: smallvec![SqlChunk::Text(sql.as_ref().to_compact_string())],
        }
    }

    /// Creates a new SQL fragment representing a parameter.
    ///
    /// A positional placeholder ('?') is rendered and the provided value is
    /// stored for later binding.
    pub fn parameter(value: V) -> Self {
        Self {
            chunks: smallvec![SqlChunk::Param(value)],
        }
    }

    /// Creates a comma-separated list of parameter placeholders: "?, ?, ?"
    pub fn parameters<I>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
    {
        let mut chunks = SmallVec::new();
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                chunks.push(SqlChunk::Text(CompactString::const_new(", ")));
            }
            chunks.push(SqlChunk::Param(value));
        }
        Sql { chunks }
    }

    /// Creates a quoted identifier fragment: `"name"`.
    ///
    /// Embedded double quotes are doubled, so any runtime name renders as a
    /// single identifier token.
    pub fn ident(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let mut buf = CompactString::with_capacity(name.len() + 2);
        push_quoted(&mut buf, name);
        Sql {
            chunks: smallvec![SqlChunk::Text(buf)],
        }
    }

    /// Creates a qualified column fragment: `"table"."column"`.
    ///
    /// Each part is quoted on its own, so dotted names stay inside one pair
    /// of quotes instead of splitting into extra qualifiers.
    pub fn column(table: impl AsRef<str>, column: impl AsRef<str>) -> Self {
        let (table, column) = (table.as_ref(), column.as_ref());
        let mut buf = CompactString::with_capacity(table.len() + column.len() + 5);
        push_quoted(&mut buf, table);
        buf.push('.');
        push_quoted(&mut buf, column);
        Sql {
            chunks: smallvec![SqlChunk::Text(buf)],
        }
    }

    /// Appends a raw string to this SQL fragment.
    ///
    /// The string is treated as literal SQL text, not a parameter.
    pub fn append_raw(mut self, sql: impl AsRef<str>) -> Self {
        self.chunks
            .push(SqlChunk::Text(sql.as_ref().to_compact_string()));
        self
    }

    /// Appends another SQL fragment to this one.
    ///
    /// Both the SQL text and parameters are merged.
    pub fn append(mut self, other: impl Into<Sql<V>>) -> Self {
        let other_sql = other.into();
        self.chunks.extend(other_sql.chunks);
        self
    }

    /// Joins multiple SQL fragments with a separator.
    ///
    /// The separator is inserted between each fragment, but not before the first or after the last.
    pub fn join<T>(sqls: T, separator: &'static str) -> Sql<V>
    where
        T: IntoIterator<Item = Sql<V>>,
    {
        let sqls: Vec<_> = sqls.into_iter().collect();

        if sqls.is_empty() {
            return Sql::empty();
        }

        if sqls.len() == 1 {
            return sqls.into_iter().next().unwrap();
        }

        let total_chunks =
            sqls.iter().map(|sql| sql.chunks.len()).sum::<usize>() + (sqls.len() - 1);
        let mut chunks = SmallVec::with_capacity(total_chunks);

        let separator_chunk = SqlChunk::Text(CompactString::const_new(separator));

        for (i, sql) in sqls.into_iter().enumerate() {
            if i > 0 {
                chunks.push(separator_chunk.clone());
            }
            chunks.extend(sql.chunks);
        }

        Sql { chunks }
    }

    /// Returns references to parameter values from this SQL fragment in the correct order.
    pub fn params(&self) -> Vec<&V> {
        let mut params_vec = Vec::with_capacity(self.chunks.len().min(8));
        for chunk in &self.chunks {
            if let SqlChunk::Param(value) = chunk {
                params_vec.push(value);
            }
        }
        params_vec
    }

    /// Consumes this fragment and returns its parameter values in placeholder order.
    pub fn into_params(self) -> Vec<V> {
        let mut params_vec = Vec::with_capacity(self.chunks.len().min(8));
        for chunk in self.chunks {
            if let SqlChunk::Param(value) = chunk {
                params_vec.push(value);
            }
        }
        params_vec
    }

    /// Returns the SQL string represented by this SQL fragment, using placeholders for parameters.
    pub fn sql(&self) -> String {
        let mut buf = CompactString::with_capacity(self.estimate_capacity());
        self.write_sql(&mut buf);
        buf.into()
    }

    /// Renders this fragment and collects its bind values.
    pub fn compile(self) -> CompiledQuery<V> {
        let sql = self.sql();
        CompiledQuery {
            sql,
            params: self.into_params(),
        }
    }

    fn write_sql(&self, buf: &mut CompactString) {
        for i in 0..self.chunks.len() {
            self.chunks[i].write_to_buffer(buf);

            if self.needs_space(i) {
                buf.push(' ');
            }
        }
    }

    fn estimate_capacity(&self) -> usize {
        let chunk_content_size: usize = self
            .chunks
            .iter()
            .map(|chunk| match chunk {
                SqlChunk::Text(t) => t.len(),
                SqlChunk::Param(_) => 1,
            })
            .sum();

        // Add space for potential spaces between chunks
        chunk_content_size + self.chunks.len()
    }

    pub(crate) fn needs_space(&self, index: usize) -> bool {
        if index + 1 >= self.chunks.len() {
            return false;
        }

        let current = &self.chunks[index];

        // Find next non-empty chunk
        let mut next_index = index + 1;
        let next = loop {
            if next_index >= self.chunks.len() {
                return false;
            }

            let candidate = &self.chunks[next_index];
            if let SqlChunk::Text(t) = candidate
                && t.is_empty()
            {
                next_index += 1;
                continue;
            }
            break candidate;
        };

        let ends_word = chunk_ends_word(current);
        let starts_word = chunk_starts_word(next);

        ends_word && starts_word
    }
}

fn push_quoted(buf: &mut CompactString, name: &str) {
    buf.push('"');
    for ch in name.chars() {
        buf.push(ch);
        if ch == '"' {
            buf.push('"');
        }
    }
    buf.push('"');
}

/// Helper function to determine if a chunk ends with a word character
fn chunk_ends_word<V: SqlParam>(chunk: &SqlChunk<V>) -> bool {
    match chunk {
        SqlChunk::Text(t) => {
            let last = t.chars().last().unwrap_or(' ');
            !last.is_whitespace() && !['(', ',', '.', ')'].contains(&last)
        }
        SqlChunk::Param(_) => true,
    }
}

/// Helper function to determine if a chunk starts with a word character
fn chunk_starts_word<V: SqlParam>(chunk: &SqlChunk<V>) -> bool {
    match chunk {
        SqlChunk::Text(t) => {
            let first = t.chars().next().unwrap_or(' ');
            !first.is_whitespace() && !['(', ',', ')', ';'].contains(&first)
        }
        SqlChunk::Param(_) => true,
    }
}

impl<V: SqlParam> Default for Sql<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V: SqlParam> Display for Sql<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql())
    }
}

/// A fully rendered statement with its bind values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery<V> {
    pub sql: String,
    pub params: Vec<V>,
}
