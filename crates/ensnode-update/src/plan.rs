use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::thread;

use ensnode_error::{EnsError, Result};
use ensnode_node::{Node, NodeConfig};
use ensnode_types::{ActiveList, EnsMatrix};
use tracing::{debug, error, info};

/// Lookup of one member's nodes by parameter name.
pub trait MemberNodes {
    fn node(&self, parameter: &str) -> Option<&Node>;
}

/// Mutable counterpart of [`MemberNodes`], used by gather.
pub trait MemberNodesMut {
    fn node_mut(&mut self, parameter: &str) -> Option<&mut Node>;
}

impl MemberNodes for BTreeMap<String, Node> {
    fn node(&self, parameter: &str) -> Option<&Node> {
        self.get(parameter)
    }
}

impl MemberNodesMut for BTreeMap<String, Node> {
    fn node_mut(&mut self, parameter: &str) -> Option<&mut Node> {
        self.get_mut(parameter)
    }
}

impl<S: BuildHasher> MemberNodes for HashMap<String, Node, S> {
    fn node(&self, parameter: &str) -> Option<&Node> {
        self.get(parameter)
    }
}

impl<S: BuildHasher> MemberNodesMut for HashMap<String, Node, S> {
    fn node_mut(&mut self, parameter: &str) -> Option<&mut Node> {
        self.get_mut(parameter)
    }
}

impl MemberNodes for Vec<Node> {
    fn node(&self, parameter: &str) -> Option<&Node> {
        self.iter().find(|node| node.name() == parameter)
    }
}

impl MemberNodesMut for Vec<Node> {
    fn node_mut(&mut self, parameter: &str) -> Option<&mut Node> {
        self.iter_mut().find(|node| node.name() == parameter)
    }
}

/// One parameter's row block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    parameter: String,
    active: ActiveList,
    data_size: usize,
    row_offset: usize,
    rows: usize,
}

impl PlanEntry {
    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    #[must_use]
    pub const fn active(&self) -> &ActiveList {
        &self.active
    }

    #[must_use]
    pub const fn data_size(&self) -> usize {
        self.data_size
    }

    #[must_use]
    pub const fn row_offset(&self) -> usize {
        self.row_offset
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    fn node_in<'a, M: MemberNodes>(&self, nodes: &'a M, member: usize) -> Result<&'a Node> {
        let node = nodes
            .node(&self.parameter)
            .ok_or_else(|| missing_node(&self.parameter, member))?;
        self.check_size(node, member)?;
        Ok(node)
    }

    fn node_in_mut<'a, M: MemberNodesMut>(
        &self,
        nodes: &'a mut M,
        member: usize,
    ) -> Result<&'a mut Node> {
        let node = nodes
            .node_mut(&self.parameter)
            .ok_or_else(|| missing_node(&self.parameter, member))?;
        self.check_size(node, member)?;
        Ok(node)
    }

    fn check_size(&self, node: &Node, member: usize) -> Result<()> {
        let size = node.config().data_size();
        if size == self.data_size {
            Ok(())
        } else {
            Err(EnsError::dimension(format!(
                "member {member} parameter {} has {size} elements, plan expects {}",
                self.parameter, self.data_size
            )))
        }
    }

    fn check_rows(&self, rows: usize, member: usize) -> Result<()> {
        if rows == self.rows {
            return Ok(());
        }
        error!(
            parameter = %self.parameter,
            member,
            rows,
            planned = self.rows,
            "row accounting mismatch"
        );
        Err(EnsError::internal(format!(
            "member {member} parameter {} moved {rows} rows, plan expects {}",
            self.parameter, self.rows
        )))
    }
}

fn missing_node(parameter: &str, member: usize) -> EnsError {
    EnsError::invalid_state(format!("member {member} has no node for {parameter}"))
}

/// Ordered row layout of every parameter taking part in an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    entries: Vec<PlanEntry>,
    total_rows: usize,
}

struct ScatterJob<'a, M> {
    member: usize,
    nodes: &'a M,
    column: &'a mut [f64],
}

struct GatherJob<'a, M> {
    member: usize,
    nodes: &'a mut M,
    column: &'a [f64],
}

impl UpdatePlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter; its row block starts where the previous one
    /// ended.
    pub fn push(
        &mut self,
        parameter: impl Into<String>,
        active: ActiveList,
        data_size: usize,
    ) -> Result<&PlanEntry> {
        let parameter = parameter.into();
        if self.entry(&parameter).is_some() {
            return Err(EnsError::config(format!(
                "parameter {parameter} is already part of the update"
            )));
        }
        active.validate(data_size)?;
        let rows = active.active_size(data_size);
        let row_offset = self.total_rows;
        self.total_rows = row_offset
            .checked_add(rows)
            .ok_or_else(|| EnsError::dimension("update plan row count overflows"))?;
        self.entries.push(PlanEntry {
            parameter,
            active,
            data_size,
            row_offset,
            rows,
        });
        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Append a configured parameter with its element count.
    pub fn push_config(&mut self, config: &NodeConfig, active: ActiveList) -> Result<&PlanEntry> {
        self.push(config.name(), active, config.data_size())
    }

    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, parameter: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.parameter == parameter)
    }

    #[must_use]
    pub const fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Zeroed matrix with one column per member.
    pub fn alloc_matrix(&self, ens_size: usize) -> Result<EnsMatrix> {
        EnsMatrix::zeros(self.total_rows, ens_size)
    }

    /// Serialize every member's nodes into that member's column.
    pub fn scatter<M: MemberNodes + Sync>(
        &self,
        members: &[M],
        matrix: &mut EnsMatrix,
        workers: usize,
    ) -> Result<()> {
        self.check_shape(matrix, members.len())?;
        let mut jobs: Vec<ScatterJob<'_, M>> = members
            .iter()
            .zip(matrix.columns_mut())
            .enumerate()
            .map(|(member, (nodes, column))| ScatterJob {
                member,
                nodes,
                column,
            })
            .collect();
        run_chunked(&mut jobs, workers, |job| self.scatter_member(job))?;
        info!(
            members = members.len(),
            rows = self.total_rows,
            workers,
            "ensemble scattered"
        );
        Ok(())
    }

    /// Deserialize every member's column back into its nodes.
    pub fn gather<M: MemberNodesMut + Send>(
        &self,
        members: &mut [M],
        matrix: &EnsMatrix,
        workers: usize,
    ) -> Result<()> {
        self.check_shape(matrix, members.len())?;
        let count = members.len();
        let mut jobs: Vec<GatherJob<'_, M>> = members
            .iter_mut()
            .zip(matrix.columns_ref())
            .enumerate()
            .map(|(member, (nodes, column))| GatherJob {
                member,
                nodes,
                column,
            })
            .collect();
        run_chunked(&mut jobs, workers, |job| self.gather_member(job))?;
        info!(
            members = count,
            rows = self.total_rows,
            workers,
            "ensemble gathered"
        );
        Ok(())
    }

    fn scatter_member<M: MemberNodes>(&self, job: &mut ScatterJob<'_, M>) -> Result<()> {
        for entry in &self.entries {
            let node = entry.node_in(job.nodes, job.member)?;
            let rows = node.serialize_into(&entry.active, job.column, entry.row_offset)?;
            entry.check_rows(rows, job.member)?;
        }
        debug!(member = job.member, rows = self.total_rows, "member scattered");
        Ok(())
    }

    fn gather_member<M: MemberNodesMut>(&self, job: &mut GatherJob<'_, M>) -> Result<()> {
        for entry in &self.entries {
            let node = entry.node_in_mut(job.nodes, job.member)?;
            let rows = node.deserialize_from(&entry.active, job.column, entry.row_offset)?;
            entry.check_rows(rows, job.member)?;
        }
        debug!(member = job.member, rows = self.total_rows, "member gathered");
        Ok(())
    }

    fn check_shape(&self, matrix: &EnsMatrix, members: usize) -> Result<()> {
        if matrix.rows() != self.total_rows || matrix.columns() != members {
            return Err(EnsError::dimension(format!(
                "matrix is {}x{}, plan needs {}x{members}",
                matrix.rows(),
                matrix.columns(),
                self.total_rows
            )));
        }
        Ok(())
    }
}

/// Run `work` over `jobs` split into at most `workers` contiguous chunks.
/// Every chunk runs to completion; the first error in job order wins.
fn run_chunked<J, F>(jobs: &mut [J], workers: usize, work: F) -> Result<()>
where
    J: Send,
    F: Fn(&mut J) -> Result<()> + Sync,
{
    if jobs.is_empty() {
        return Ok(());
    }
    let workers = workers.clamp(1, jobs.len());
    if workers == 1 {
        return jobs.iter_mut().try_for_each(&work);
    }
    let chunk = jobs.len().div_ceil(workers);
    thread::scope(|scope| {
        let work = &work;
        let handles: Vec<_> = jobs
            .chunks_mut(chunk)
            .map(|part| scope.spawn(move || part.iter_mut().try_for_each(work)))
            .collect();
        let mut first_error = None;
        for handle in handles {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(EnsError::internal("update worker panicked")));
            if let Err(err) = outcome {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate() {
        let mut plan = UpdatePlan::new();
        assert_eq!(plan.push("A", ActiveList::all(), 10).unwrap().row_offset(), 0);
        let b = plan.push("B", ActiveList::from_indices([1, 3]), 4).unwrap();
        assert_eq!((b.row_offset(), b.rows()), (10, 2));
        let c = plan.push("C", ActiveList::inactive(), 7).unwrap();
        assert_eq!((c.row_offset(), c.rows()), (12, 0));
        assert_eq!(plan.push("D", ActiveList::all(), 3).unwrap().row_offset(), 12);
        assert_eq!(plan.total_rows(), 15);
        assert_eq!(plan.alloc_matrix(5).unwrap().columns(), 5);
        assert_eq!(plan.alloc_matrix(5).unwrap().rows(), 15);
    }

    #[test]
    fn duplicate_and_out_of_range_rejected() {
        let mut plan = UpdatePlan::new();
        plan.push("A", ActiveList::all(), 2).unwrap();
        assert!(matches!(
            plan.push("A", ActiveList::all(), 2),
            Err(EnsError::Config { .. })
        ));
        assert!(matches!(
            plan.push("B", ActiveList::from_indices([2]), 2),
            Err(EnsError::DimensionMismatch { .. })
        ));
        assert_eq!(plan.total_rows(), 2);
    }

    #[test]
    fn run_chunked_visits_every_job_once() {
        for workers in [0, 1, 3, 8, 64] {
            let mut jobs = vec![0u32; 17];
            run_chunked(&mut jobs, workers, |j| {
                *j += 1;
                Ok(())
            })
            .unwrap();
            assert!(jobs.iter().all(|&j| j == 1), "workers={workers}");
        }
    }

    #[test]
    fn run_chunked_reports_first_error() {
        let mut jobs: Vec<usize> = (0..10).collect();
        let err = run_chunked(&mut jobs, 4, |j| {
            if *j % 4 == 3 {
                Err(EnsError::invalid_state(format!("job {j}")))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid node state: job 3");
    }
}
