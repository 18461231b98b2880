//! REST query builder
//!
//! Builds the query string understood by the backend's table API:
//! `?select=a,b&col=eq.value&col=in.(x,y)&order=col.desc&limit=5`.

use std::fmt::Display;

/// A read query against one table
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    columns: String,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<u32>,
}

impl Select {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    /// `column = value`
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// `column IN (values)`
    pub fn is_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let list = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.filters
            .push((column.to_string(), format!("in.({})", list)));
        self
    }

    /// Newest first on `column`
    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(format!("{}.desc", column));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Query string pairs, in a stable order
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 3);
        pairs.push(("select".to_string(), self.columns.clone()));
        pairs.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}
