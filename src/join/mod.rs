//! Join path planner.
//!
//! Builds an undirected entity graph over the requested semantic models:
//! an edge exists where one model's foreign entity names another model's
//! primary entity. A connected graph yields a LEFT-JOIN spine spanning
//! the models; a disconnected one is a [`JoinError`] carrying the
//! component sets so the caller can split the query.

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use crate::error::{CompileError, CompileResult, JoinError};
use crate::manifest::model::SemanticModel;
use crate::manifest::Manifest;
use crate::sql::expr::{binop, table_col, BinaryOperator};
use crate::sql::query::{Join, JoinKind, JoinSpine, TableFactor, TableRef};

/// One planned join step: left model, right model, and the matched
/// `(left_column, right_column)` key pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub left: String,
    pub right: String,
    pub keys: Vec<(String, String)>,
}

/// Matched entity key pairs between two models, oriented so the model
/// holding the foreign entities comes first.
pub fn find_join_keys(a: &SemanticModel, b: &SemanticModel) -> Option<JoinStep> {
    let pairs_from = |foreign_side: &SemanticModel, primary_side: &SemanticModel| {
        let primaries: HashMap<&str, &str> = primary_side
            .primary_entities()
            .map(|e| (e.name.as_str(), e.expr_or_name()))
            .collect();
        let keys: Vec<(String, String)> = foreign_side
            .foreign_entities()
            .filter_map(|e| {
                primaries
                    .get(e.name.as_str())
                    .map(|primary_expr| (e.expr_or_name().to_owned(), (*primary_expr).to_owned()))
            })
            .collect();
        keys
    };

    let forward = pairs_from(a, b);
    if !forward.is_empty() {
        return Some(JoinStep {
            left: a.name.clone(),
            right: b.name.clone(),
            keys: forward,
        });
    }
    let backward = pairs_from(b, a);
    if !backward.is_empty() {
        return Some(JoinStep {
            left: b.name.clone(),
            right: a.name.clone(),
            keys: backward,
        });
    }
    None
}

/// Plan the LEFT-JOIN spine for the given projection-layer models.
#[tracing::instrument(skip_all, fields(models = ?models))]
pub fn plan_join(manifest: &Manifest, models: &[String]) -> CompileResult<JoinSpine> {
    if models.is_empty() {
        return Err(CompileError::ManifestViolation(
            "join planning requires at least one semantic model".into(),
        ));
    }
    if models.len() == 1 {
        return Ok(JoinSpine {
            from: TableFactor::Table(TableRef::new(models[0].clone())),
            joins: vec![],
        });
    }

    let resolved: Vec<&SemanticModel> = models
        .iter()
        .map(|name| {
            manifest.model(name).ok_or_else(|| {
                CompileError::ManifestViolation(format!(
                    "model '{name}' not found in the semantic manifest"
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    // Entity graph: nodes are models, edges the viable key matches.
    let mut graph: UnGraph<String, JoinStep> = UnGraph::new_undirected();
    let indices: Vec<NodeIndex> = resolved
        .iter()
        .map(|m| graph.add_node(m.name.clone()))
        .collect();
    for i in 0..resolved.len() {
        for j in (i + 1)..resolved.len() {
            if let Some(step) = find_join_keys(resolved[i], resolved[j]) {
                graph.add_edge(indices[i], indices[j], step);
            }
        }
    }

    let components = connected_components(&graph, &indices);
    if components.len() > 1 {
        return Err(JoinError {
            message: "multiple disjoint model sets detected; cannot generate a JOIN clause"
                .into(),
            model_sets: components,
        }
        .into());
    }

    let steps = join_sequence(&graph, &indices)?;
    Ok(build_spine(steps))
}

fn connected_components(
    graph: &UnGraph<String, JoinStep>,
    indices: &[NodeIndex],
) -> Vec<Vec<String>> {
    let mut seen: Vec<NodeIndex> = Vec::new();
    let mut components = Vec::new();
    for &start in indices {
        if seen.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut bfs = Bfs::new(graph, start);
        while let Some(node) = bfs.next(graph) {
            seen.push(node);
            component.push(graph[node].clone());
        }
        components.push(component);
    }
    components
}

/// BFS from the first model, orienting each edge so the already-joined
/// side is on the left.
fn join_sequence(
    graph: &UnGraph<String, JoinStep>,
    indices: &[NodeIndex],
) -> CompileResult<Vec<JoinStep>> {
    let mut sequence: Vec<JoinStep> = Vec::new();
    let mut joined: Vec<NodeIndex> = vec![indices[0]];
    let mut queue: Vec<NodeIndex> = vec![indices[0]];

    while let Some(current) = queue.first().copied() {
        queue.remove(0);
        let mut neighbors: Vec<NodeIndex> = graph.neighbors(current).collect();
        neighbors.sort_by_key(|n| indices.iter().position(|i| i == n));
        for neighbor in neighbors {
            if joined.contains(&neighbor) {
                continue;
            }
            let edge = graph
                .find_edge(current, neighbor)
                .expect("neighbor implies edge");
            let step = graph[edge].clone();

            let current_name = &graph[current];
            let oriented = if &step.left == current_name {
                step
            } else {
                JoinStep {
                    left: step.right,
                    right: step.left,
                    keys: step.keys.into_iter().map(|(l, r)| (r, l)).collect(),
                }
            };
            sequence.push(oriented);
            joined.push(neighbor);
            queue.push(neighbor);
        }
        if joined.len() == indices.len() {
            break;
        }
    }

    if joined.len() < indices.len() {
        let unjoined: Vec<String> = indices
            .iter()
            .filter(|i| !joined.contains(i))
            .map(|i| graph[*i].clone())
            .collect();
        let all: Vec<String> = indices.iter().map(|i| graph[*i].clone()).collect();
        return Err(JoinError {
            message: format!("cannot join all models; unjoined: {}", unjoined.join(", ")),
            model_sets: vec![all],
        }
        .into());
    }
    Ok(sequence)
}

/// `FROM L LEFT JOIN R ON L.a = R.b AND L.c = R.d ...`
fn build_spine(steps: Vec<JoinStep>) -> JoinSpine {
    let first = steps
        .first()
        .map(|s| s.left.clone())
        .expect("sequence is non-empty for >= 2 models");
    let joins = steps
        .into_iter()
        .map(|step| {
            let on = step
                .keys
                .iter()
                .map(|(left_key, right_key)| {
                    binop(
                        table_col(&step.left, left_key),
                        BinaryOperator::Eq,
                        table_col(&step.right, right_key),
                    )
                })
                .reduce(|acc, pair| binop(acc, BinaryOperator::And, pair));
            Join {
                kind: JoinKind::Left,
                relation: TableFactor::Table(TableRef::new(step.right)),
                on,
            }
        })
        .collect();
    JoinSpine {
        from: TableFactor::Table(TableRef::new(first)),
        joins,
    }
}
