//! Job dependency graph construction and cycle detection.
//!
//! Builds an adjacency structure from declared `dependsOn` edges and
//! verifies the relation is a DAG. Detected cycles are reported as the
//! ordered list of participating job ids, not merely "a cycle exists".
//! The builder never inspects job payloads.

use std::collections::HashMap;

use serde::Serialize;

use crate::manifest::Job;

// ---------------------------------------------------------------------------
// Build errors
// ---------------------------------------------------------------------------

/// One structural defect found while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JobGraphError {
    /// Two jobs declare the same id.
    DuplicateJobId { job_id: String },
    /// A `dependsOn` entry names a job that does not exist.
    UnknownDependency { job_id: String, depends_on: String },
    /// A dependency cycle. `path` lists the ids in dependency order:
    /// `path[0]` depends on `path[1]`, ..., and the last depends on `path[0]`.
    Cycle { path: Vec<String> },
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// An acyclic job dependency graph, indexed both ways.
///
/// Node indices follow the declared job order, so traversals and the
/// topological order are deterministic for a given job list.
#[derive(Debug, Clone)]
pub struct JobGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Edges `job -> jobs it depends on`.
    dependencies: Vec<Vec<usize>>,
    /// Reverse edges `job -> jobs that depend on it`.
    dependents: Vec<Vec<usize>>,
}

impl JobGraph {
    /// Build and verify the graph for a job list.
    ///
    /// All defects are collected before returning: duplicate ids, unknown
    /// dependency targets, and every dependency cycle. Unknown edges are
    /// left out of the adjacency, so cycle detection still runs on the
    /// well-formed remainder.
    pub fn build(jobs: &[Job]) -> Result<JobGraph, Vec<JobGraphError>> {
        let mut errors = Vec::new();

        let mut ids = Vec::with_capacity(jobs.len());
        let mut index: HashMap<String, usize> = HashMap::with_capacity(jobs.len());
        for job in jobs {
            if index.contains_key(&job.id) {
                errors.push(JobGraphError::DuplicateJobId {
                    job_id: job.id.clone(),
                });
                continue;
            }
            index.insert(job.id.clone(), ids.len());
            ids.push(job.id.clone());
        }

        let mut dependencies = vec![Vec::new(); ids.len()];
        let mut dependents = vec![Vec::new(); ids.len()];
        for job in jobs {
            let Some(&from) = index.get(&job.id) else {
                continue;
            };
            for dep in &job.depends_on {
                match index.get(dep) {
                    Some(&to) => {
                        // Repeated edges collapse to one.
                        if !dependencies[from].contains(&to) {
                            dependencies[from].push(to);
                            dependents[to].push(from);
                        }
                    }
                    None => errors.push(JobGraphError::UnknownDependency {
                        job_id: job.id.clone(),
                        depends_on: dep.clone(),
                    }),
                }
            }
        }

        let graph = JobGraph {
            ids,
            index,
            dependencies,
            dependents,
        };
        errors.extend(graph.find_cycles());

        if errors.is_empty() {
            Ok(graph)
        } else {
            Err(errors)
        }
    }

    /// Iterative three-color DFS over the dependency edges.
    ///
    /// On a back edge the current gray path is sliced from the revisited
    /// node, yielding the exact cycle.
    fn find_cycles(&self) -> Vec<JobGraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let n = self.ids.len();
        let mut color = vec![Color::White; n];
        let mut cycles = Vec::new();

        for start in 0..n {
            if color[start] != Color::White {
                continue;
            }
            // (node, next outgoing edge to explore)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            let mut path: Vec<usize> = vec![start];
            color[start] = Color::Gray;

            while let Some((node, edge)) = stack.last_mut() {
                let node = *node;
                if *edge < self.dependencies[node].len() {
                    let next = self.dependencies[node][*edge];
                    *edge += 1;
                    match color[next] {
                        Color::White => {
                            color[next] = Color::Gray;
                            path.push(next);
                            stack.push((next, 0));
                        }
                        Color::Gray => {
                            if let Some(pos) = path.iter().position(|&p| p == next) {
                                cycles.push(JobGraphError::Cycle {
                                    path: path[pos..]
                                        .iter()
                                        .map(|&i| self.ids[i].clone())
                                        .collect(),
                                });
                            }
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    path.pop();
                    stack.pop();
                }
            }
        }

        cycles
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Job ids in declared order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn index_of(&self, job_id: &str) -> Option<usize> {
        self.index.get(job_id).copied()
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    /// Nodes this job depends on.
    pub fn dependency_indices(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    /// Nodes that depend on this job.
    pub fn dependent_indices(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    /// Jobs with no dependencies, in declared order.
    pub fn roots(&self) -> Vec<&str> {
        (0..self.ids.len())
            .filter(|&i| self.dependencies[i].is_empty())
            .map(|i| self.ids[i].as_str())
            .collect()
    }

    /// A topological order over all jobs (Kahn's algorithm).
    ///
    /// Well-defined because `build` rejects cyclic inputs; dependency-free
    /// jobs come first, seeded in declared order.
    pub fn topological_order(&self) -> Vec<&str> {
        let n = self.ids.len();
        let mut remaining: Vec<usize> = (0..n).map(|i| self.dependencies[i].len()).collect();
        let mut queue: std::collections::VecDeque<usize> =
            (0..n).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(self.ids[node].as_str());
            for &dependent in &self.dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        order
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
