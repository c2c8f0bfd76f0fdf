//! Health probe definitions.

/// Probe of the local storage's reachability.
#[derive(Clone, Copy, Debug)]
pub struct Storage;

/// Health of a single external collaborator.
#[derive(Clone, Debug)]
pub struct Component {
    /// Indicator whether the collaborator is reachable.
    pub ok: bool,

    /// Description of the failure, if the collaborator is not reachable.
    pub error: Option<String>,
}

/// Health report of the system's external collaborators.
///
/// The storage and the ledger are probed independently, since the two can
/// fail independently.
#[derive(Clone, Debug)]
pub struct Report {
    /// Health of the local storage.
    pub storage: Component,

    /// Health of the settlement ledger.
    pub ledger: Component,
}
