//! Preconditions evaluated before every convergence attempt

use tracing::debug;

use crate::relations::{missing_relations, RelationSource};
use crate::status::{messages, ControllerStatus};
use crate::supervisor::Supervisor;
use crate::workload::{classify, WorkloadKind};

/// Outcome of the precondition checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Everything needed to converge is available
    Proceed,
    /// Not yet; show the status and retry the trigger later
    Defer(ControllerStatus),
    /// Cannot converge; show the status and drop the trigger
    Block(ControllerStatus),
}

/// Guard verdict plus any classification made while checking
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardReport {
    /// What the pass should do
    pub precondition: Precondition,
    /// Workload kind derived during this check, to be memoized by the caller
    pub classified: Option<WorkloadKind>,
}

/// Precondition checks over relations and workload classification
pub struct Guard<'a> {
    relations: &'a dyn RelationSource,
    supervisor: &'a dyn Supervisor,
    metadata_path: &'a str,
}

impl<'a> Guard<'a> {
    /// Guard reading relations from `relations` and classifying through `supervisor`
    pub fn new(
        relations: &'a dyn RelationSource,
        supervisor: &'a dyn Supervisor,
        metadata_path: &'a str,
    ) -> Self {
        Self {
            relations,
            supervisor,
            metadata_path,
        }
    }

    /// Run the checks in order: relations, classification, packaging
    ///
    /// `known` is the memoized workload kind; classification only runs when
    /// it is unset. The guard never writes state itself.
    pub async fn check(&self, known: Option<WorkloadKind>) -> GuardReport {
        let missing = missing_relations(self.relations);
        if !missing.is_empty() {
            debug!(missing = ?missing, "required relations missing");
            return GuardReport {
                precondition: Precondition::Defer(ControllerStatus::blocked(format!(
                    "{}: {}",
                    messages::MISSING_RELATIONS,
                    missing.join(", ")
                ))),
                classified: None,
            };
        }

        let (kind, classified) = match known {
            Some(kind) => (kind, None),
            None => match classify(self.supervisor, self.metadata_path).await {
                Some(kind) => (kind, Some(kind)),
                None => {
                    return GuardReport {
                        precondition: Precondition::Defer(ControllerStatus::maintenance(
                            messages::WAITING_FOR_SUPERVISOR,
                        )),
                        classified: None,
                    };
                }
            },
        };

        let precondition = if kind == WorkloadKind::NotPackaged {
            Precondition::Block(ControllerStatus::blocked(messages::NOT_PACKAGED))
        } else {
            Precondition::Proceed
        };

        GuardReport {
            precondition,
            classified,
        }
    }
}
