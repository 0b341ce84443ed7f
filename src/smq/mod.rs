//! SMQ wire format and the per-layer intermediate representation.

pub mod parse;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::sql::expr::Expr;
use crate::sql::query::{JoinSpine, OrderByExpr};

/// Semantic Model Query: the structured input to the compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Smq {
    pub metrics: Vec<String>,
    #[serde(default, alias = "groupBy")]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default, alias = "orderBy")]
    pub order_by: Vec<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub joins: Vec<String>,
}

fn non_empty(values: &[String]) -> Vec<&str> {
    values
        .iter()
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .collect()
}

impl Smq {
    /// Structural validation: empty metrics, joins arity, negative limit.
    pub fn validate(&self) -> Result<(), CompileError> {
        if non_empty(&self.metrics).is_empty() {
            return Err(CompileError::InputValidation(
                "no metrics specified in request".into(),
            ));
        }
        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(CompileError::InputValidation(format!(
                    "limit must be a non-negative integer, got {limit}"
                )));
            }
        }
        if non_empty(&self.joins).len() > 1 {
            return Err(CompileError::InputValidation(
                "the joins array accepts a single element; put every join of the query \
                 into one clause, e.g. [\"FROM a LEFT JOIN b ON a.id = b.id\"]"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn metrics(&self) -> Vec<&str> {
        non_empty(&self.metrics)
    }

    pub fn group_by(&self) -> Vec<&str> {
        non_empty(&self.group_by)
    }

    pub fn filters(&self) -> Vec<&str> {
        non_empty(&self.filters)
    }

    pub fn order_by(&self) -> Vec<&str> {
        non_empty(&self.order_by)
    }

    pub fn joins(&self) -> Vec<&str> {
        non_empty(&self.joins)
    }

    /// Every clause entry except limit, keyed for table extraction.
    pub fn textual_entries(&self) -> Vec<&str> {
        let mut out = self.metrics();
        out.extend(self.group_by());
        out.extend(self.filters());
        out.extend(self.order_by());
        out
    }
}

// =============================================================================
// Per-layer IR
// =============================================================================

/// A layer of the rewritten query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerId {
    /// One projection layer per referenced semantic model.
    Projection(String),
    /// The synthetic aggregation layer.
    Agg,
    /// The synthetic derivation layer.
    Deriv,
}

impl LayerId {
    pub fn projection(name: impl Into<String>) -> Self {
        LayerId::Projection(name.into())
    }

    pub fn as_projection(&self) -> Option<&str> {
        match self {
            LayerId::Projection(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerId::Projection(name) => write!(f, "{name}"),
            LayerId::Agg => write!(f, "agg"),
            LayerId::Deriv => write!(f, "deriv"),
        }
    }
}

/// Clause lists of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerBody {
    pub metrics: Vec<Expr>,
    pub filters: Vec<Expr>,
    pub groups: Vec<Expr>,
    pub orders: Vec<OrderByExpr>,
    pub join: Option<JoinSpine>,
    pub limit: Option<u64>,
}

impl LayerBody {
    /// Output name a select-list node would take: alias, else column name.
    fn output_name(expr: &Expr) -> Option<&str> {
        expr.alias_name().or_else(|| expr.name())
    }

    fn push_deduped(list: &mut Vec<Expr>, node: Expr) {
        let node_name = Self::output_name(&node).map(str::to_owned);
        let node_sql = node.sql_text();
        for existing in list.iter() {
            if let (Some(a), Some(b)) = (&node_name, Self::output_name(existing)) {
                if a == b {
                    return;
                }
            }
            if existing.sql_text() == node_sql {
                return;
            }
        }
        list.push(node);
    }

    pub fn append_metric(&mut self, node: Expr) {
        Self::push_deduped(&mut self.metrics, node);
    }

    pub fn append_filter(&mut self, node: Expr) {
        Self::push_deduped(&mut self.filters, node);
    }

    pub fn append_group(&mut self, node: Expr) {
        Self::push_deduped(&mut self.groups, node);
    }

    pub fn append_order(&mut self, order: OrderByExpr) {
        let sql = order.expr.sql_text();
        if self.orders.iter().any(|o| o.expr.sql_text() == sql) {
            return;
        }
        self.orders.push(order);
    }

    /// Names and aliases exposed by this layer's select list.
    pub fn exposed_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in &self.metrics {
            if let Some(name) = node.name() {
                out.push(name);
            }
            if let Some(alias) = node.alias_name() {
                out.push(alias);
            }
        }
        out
    }
}

/// The per-layer IR: insertion-ordered layers keyed by [`LayerId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryIr {
    layers: Vec<(LayerId, LayerBody)>,
}

impl QueryIr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.layers.iter().any(|(key, _)| key == id)
    }

    pub fn body(&self, id: &LayerId) -> Option<&LayerBody> {
        self.layers
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, body)| body)
    }

    /// The layer body, created empty on first touch.
    pub fn body_mut(&mut self, id: &LayerId) -> &mut LayerBody {
        if !self.contains(id) {
            self.layers.push((id.clone(), LayerBody::default()));
        }
        let idx = self
            .layers
            .iter()
            .position(|(key, _)| key == id)
            .expect("just inserted");
        &mut self.layers[idx].1
    }

    pub fn layers(&self) -> impl Iterator<Item = (&LayerId, &LayerBody)> {
        self.layers.iter().map(|(id, body)| (id, body))
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = (&LayerId, &mut LayerBody)> {
        self.layers.iter_mut().map(|(id, body)| (&*id, body))
    }

    /// Projection-layer names in insertion order.
    pub fn projection_names(&self) -> Vec<String> {
        self.layers
            .iter()
            .filter_map(|(id, _)| id.as_projection().map(str::to_owned))
            .collect()
    }

    /// The layer the final SELECT is built from.
    pub fn uppermost(&self) -> LayerId {
        if self.contains(&LayerId::Deriv) {
            LayerId::Deriv
        } else {
            LayerId::Agg
        }
    }
}
