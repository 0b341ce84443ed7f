//! The composer's rewrite passes, one module per pass, in pipeline order.

pub mod move_dimension_exprs;
pub mod push_down_aggregates;
pub mod move_groups_to_select;
pub mod include_original_metrics;
pub mod resolve_anonymous_functions;
pub mod inline_subquery_tables;
pub mod complete_deriv_inputs;
pub mod group_select_parity;
pub mod complete_agg_inputs;
pub mod add_default_join;
pub mod alias_bare_expressions;
pub mod quote_identifiers;
