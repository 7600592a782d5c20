//! acctest-harness - Acceptance tests for a permissioned Ethereum cluster.
//!
//! This crate drives a running cluster over JSON-RPC: public and private
//! transfers between every pair of nodes, contract event visibility, private
//! state isolation through storage roots, locally signed and asynchronous
//! submissions.

mod error;
pub use error::{
    ErrorKind, HarnessError, HarnessResult, INVALID_ADDRESS, PRIVATE_VALUE_REJECTION, ensure_eq,
    ensure_ne,
};

mod config;
pub use config::{
    CONFIG_FILENAME, ENV_PREFIX, HarnessConfig, NodeConfig, ScenarioConfig, TimingConfig,
};

mod registry;
pub use registry::{ClusterRegistry, NodeDescriptor, NodeId};

pub mod rpc;

mod context;
pub use context::HarnessContext;

mod finality;
pub use finality::{FinalityPolicy, wait_for_receipt};

pub mod contract;

mod scenario;
pub use scenario::{
    ExecutionStrategy, RejectionOutcome, ScenarioEngine, TransactionOutcome, TransferKind,
    random_amount,
};

pub mod signed;
pub use signed::{KeystoreSigner, TransactionSigner, legacy_transfer};

pub mod visibility;
pub use visibility::{Visibility, VisibilityReport};

pub mod storage_root;
pub use storage_root::{RootProbe, StorageRootReport};

mod callback;
pub use callback::{CallbackListener, CallbackPayload};

pub mod async_submit;

mod suite;
pub use suite::{Suite, SuiteOutcome, SuiteReport, SuiteRunner};
