//! Frame graph: derived cross-stage dependencies
//!
//! wgpu inserts the actual GPU barriers, but the ordering requirements of
//! the cull → render → reduce → cull pipeline are still real: a pass that
//! reads a buffer an earlier pass wrote must be recorded after it, and a
//! pass that deliberately consumes *last* frame's contents (the early cull
//! reading the stale pyramid) must say so. This module makes those
//! requirements explicit data. Each frame phase declares its per-resource
//! accesses; `edges()` derives every write→read dependency and
//! `validate()` rejects a sequence in which any same-frame read is not
//! preceded by the write that feeds it. The scheduler asserts validity in
//! debug builds, and the unit tests pin the derived edge set to the
//! documented data flow.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    TaskCommands,
    TaskCounter,
    MeshletDraws,
    MeshletCounter,
    DrawVisibility,
    MeshletVisibility,
    DepthTarget,
    DepthPyramid,
    Gbuffer,
    SurfaceImage,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    TransferWrite,
    ComputeRead,
    ComputeWrite,
    /// Indirect argument fetch by draw/dispatch
    IndirectRead,
    VertexRead,
    FragmentRead,
    ColorWrite,
    DepthWrite,
    DepthRead,
}

impl Access {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Access::TransferWrite | Access::ComputeWrite | Access::ColorWrite | Access::DepthWrite
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecl {
    pub resource: ResourceId,
    pub access: Access,
    /// Read of the resource's previous-frame contents; legal without a
    /// same-frame writer (persistent state only)
    pub history: bool,
}

/// One frame phase and its declared resource accesses, in recording order
#[derive(Debug, Clone)]
pub struct PassNode {
    pub name: &'static str,
    pub accesses: Vec<AccessDecl>,
}

impl PassNode {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            accesses: Vec::new(),
        }
    }

    /// Same-frame read: an earlier write this frame must feed it
    pub fn reads(mut self, resource: ResourceId, access: Access) -> Self {
        debug_assert!(!access.is_write());
        self.accesses.push(AccessDecl {
            resource,
            access,
            history: false,
        });
        self
    }

    /// Cross-frame read of persistent state (previous frame's contents)
    pub fn reads_history(mut self, resource: ResourceId, access: Access) -> Self {
        debug_assert!(!access.is_write());
        self.accesses.push(AccessDecl {
            resource,
            access,
            history: true,
        });
        self
    }

    pub fn writes(mut self, resource: ResourceId, access: Access) -> Self {
        debug_assert!(access.is_write());
        self.accesses.push(AccessDecl {
            resource,
            access,
            history: false,
        });
        self
    }
}

/// A derived write→read dependency. `src` is None for a declared history
/// read: the source is the previous frame's last writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub resource: ResourceId,
    pub src: Option<(&'static str, Access)>,
    pub dst: (&'static str, Access),
}

#[derive(Debug, PartialEq, Eq)]
pub enum SyncError {
    /// A same-frame read has no earlier write feeding it
    ReadBeforeWrite {
        resource: ResourceId,
        pass: &'static str,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::ReadBeforeWrite { resource, pass } => {
                write!(f, "pass '{}' reads {} before any write", pass, resource)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameGraph {
    passes: Vec<PassNode>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(mut self, node: PassNode) -> Self {
        self.passes.push(node);
        self
    }

    pub fn passes(&self) -> &[PassNode] {
        &self.passes
    }

    fn last_write_before(
        &self,
        resource: ResourceId,
        pass_index: usize,
        access_index: usize,
    ) -> Option<(&'static str, Access)> {
        let mut found = None;
        for (pi, pass) in self.passes.iter().enumerate().take(pass_index + 1) {
            for (ai, decl) in pass.accesses.iter().enumerate() {
                if pi == pass_index && ai >= access_index {
                    break;
                }
                if decl.resource == resource && decl.access.is_write() {
                    found = Some((pass.name, decl.access));
                }
            }
        }
        found
    }

    /// Derive every write→read dependency in recording order.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges = Vec::new();
        for (pi, pass) in self.passes.iter().enumerate() {
            for (ai, decl) in pass.accesses.iter().enumerate() {
                if decl.access.is_write() {
                    continue;
                }
                let src = if decl.history {
                    None
                } else {
                    self.last_write_before(decl.resource, pi, ai)
                };
                let edge = DependencyEdge {
                    resource: decl.resource,
                    src,
                    dst: (pass.name, decl.access),
                };
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
        edges
    }

    /// Every same-frame read must be fed by an earlier write; history reads
    /// are exempt by declaration.
    pub fn validate(&self) -> Result<(), SyncError> {
        for (pi, pass) in self.passes.iter().enumerate() {
            for (ai, decl) in pass.accesses.iter().enumerate() {
                if decl.access.is_write() || decl.history {
                    continue;
                }
                if self.last_write_before(decl.resource, pi, ai).is_none() {
                    return Err(SyncError::ReadBeforeWrite {
                        resource: decl.resource,
                        pass: pass.name,
                    });
                }
            }
        }
        Ok(())
    }

    /// The derived source pass for a given read, used by tests to pin the
    /// data flow (e.g. the late cull's pyramid read must resolve to the
    /// pyramid build, not the previous frame).
    pub fn source_of(&self, pass: &str, resource: ResourceId) -> Option<(&'static str, Access)> {
        self.edges()
            .into_iter()
            .find(|e| e.dst.0 == pass && e.resource == resource)
            .and_then(|e| e.src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Access::*;
    use ResourceId::*;

    #[test]
    fn derives_write_to_read_edge() {
        let graph = FrameGraph::new()
            .pass(PassNode::new("produce").writes(TaskCounter, ComputeWrite))
            .pass(PassNode::new("finalize").reads(TaskCounter, ComputeRead));

        let edges = graph.edges();
        assert_eq!(
            edges,
            vec![DependencyEdge {
                resource: TaskCounter,
                src: Some(("produce", ComputeWrite)),
                dst: ("finalize", ComputeRead),
            }]
        );
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn same_frame_read_without_writer_fails_validation() {
        let graph = FrameGraph::new()
            .pass(PassNode::new("raster").reads(TaskCommands, VertexRead));

        assert_eq!(
            graph.validate(),
            Err(SyncError::ReadBeforeWrite {
                resource: TaskCommands,
                pass: "raster",
            })
        );
    }

    #[test]
    fn history_read_is_exempt() {
        let graph = FrameGraph::new()
            .pass(PassNode::new("early-cull").reads_history(DepthPyramid, ComputeRead));

        assert!(graph.validate().is_ok());
        assert_eq!(graph.edges()[0].src, None);
    }

    #[test]
    fn read_resolves_to_most_recent_write() {
        let graph = FrameGraph::new()
            .pass(PassNode::new("a").writes(DepthPyramid, ComputeWrite))
            .pass(PassNode::new("b").writes(DepthPyramid, ComputeWrite))
            .pass(PassNode::new("c").reads(DepthPyramid, ComputeRead));

        assert_eq!(graph.source_of("c", DepthPyramid), Some(("b", ComputeWrite)));
    }

    #[test]
    fn write_then_read_within_one_pass_is_ordered() {
        // a phase that zeroes a counter then dispatches against it depends
        // on its own transfer write, not the previous frame
        let graph = FrameGraph::new().pass(
            PassNode::new("cull")
                .writes(TaskCounter, TransferWrite)
                .reads(TaskCounter, ComputeRead),
        );
        assert_eq!(graph.edges()[0].src, Some(("cull", TransferWrite)));
    }
}
